//! Static HTML report: expected values, a sample of decoded frames and the
//! comparison table.

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;

use crate::compare::{self, ComparisonRow, Verdict};
use crate::error::BenchError;
use crate::parsers::capl::ExpectedValues;
use crate::parsers::Log;
use crate::signals::{self, Signal};

const STYLE: &str = r#"
body { font-family: "Segoe UI", Helvetica, Arial, sans-serif; margin: 2em; color: #222; }
h1 { margin-bottom: 0.2em; }
table { border-collapse: collapse; margin: 1em 0 2em; }
th, td { border: 1px solid #ccc; padding: 4px 10px; text-align: right; }
th { background: #f0f0f0; }
td.text { text-align: left; font-family: monospace; }
td.missing { color: #999; font-style: italic; }
.pass { background: #d9f2d9; color: #1e6b1e; font-weight: bold; }
.fail { background: #f7d4d4; color: #8b1a1a; font-weight: bold; }
.meta td { text-align: left; }
"#;

/// Everything the report shows
pub struct ReportContext<'a> {
    pub log_path: &'a Path,
    pub log: &'a Log,
    pub expected: &'a ExpectedValues,
    pub rows: &'a [ComparisonRow],
    pub message_id: Option<u32>,
    pub sample_rows: usize,
    pub generated_at: NaiveDateTime,
}

/// Escape text for use in HTML content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn verdict_cell(verdict: Verdict) -> String {
    let class = match verdict {
        Verdict::Pass => "pass",
        Verdict::Fail => "fail",
    };
    format!("<td class=\"{}\">{}</td>", class, verdict)
}

fn value_cell(value: Option<String>) -> String {
    match value {
        Some(v) => format!("<td>{}</td>", escape(&v)),
        None => "<td class=\"missing\">missing</td>".to_string(),
    }
}

fn run_section(ctx: &ReportContext) -> String {
    let overall = if compare::any_failed(ctx.rows) {
        Verdict::Fail
    } else {
        Verdict::Pass
    };
    let filter = ctx
        .message_id
        .map_or("all frames".to_string(), |id| format!("{:#x}", id));
    let start = ctx
        .log
        .meta
        .start_time()
        .map_or("unknown".to_string(), |t| t.to_string());

    let mut html = String::from("<h2>Run</h2>\n<table class=\"meta\">\n");
    for (label, value) in [
        ("Log file", ctx.log_path.display().to_string()),
        ("Measurement start", start),
        ("Frames decoded", ctx.log.frames.len().to_string()),
        ("Message filter", filter),
        ("Generated", ctx.generated_at.format("%Y-%m-%d %H:%M:%S").to_string()),
    ] {
        html.push_str(&format!(
            "<tr><th>{}</th><td>{}</td></tr>\n",
            label,
            escape(&value)
        ));
    }
    html.push_str(&format!("<tr><th>Result</th>{}</tr>\n", verdict_cell(overall)));
    html.push_str("</table>\n");
    html
}

fn expected_section(expected: &ExpectedValues) -> String {
    let mut html = String::from("<h2>Expected values</h2>\n");
    let stats = expected.stats();
    if stats.is_empty() {
        html.push_str("<p>No expected values were found in the test definitions.</p>\n");
        return html;
    }
    html.push_str("<table>\n<tr><th>Signal</th><th>Min</th><th>Max</th><th>Mid</th><th>Literals</th></tr>\n");
    for (signal, s) in &stats {
        html.push_str(&format!(
            "<tr><td class=\"text\">{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>\n",
            signal,
            s.min,
            s.max,
            s.mid,
            expected.count(*signal)
        ));
    }
    html.push_str("</table>\n");
    html
}

fn sample_section(ctx: &ReportContext) -> String {
    let shown = ctx.sample_rows.min(ctx.log.frames.len());
    let mut html = format!(
        "<h2>Decoded frames</h2>\n<p>First {} of {} frames.</p>\n",
        shown,
        ctx.log.frames.len()
    );
    html.push_str("<table>\n<tr><th>Time [s]</th><th>ID</th><th>Ch</th><th>Dir</th><th>Data</th>");
    for signal in Signal::ORDER {
        html.push_str(&format!("<th>{} [{}]</th>", signal, escape(signal.unit())));
    }
    html.push_str("</tr>\n");

    for frame in ctx.log.frames.iter().take(shown) {
        html.push_str(&format!(
            "<tr><td>{:.6}</td><td class=\"text\">{}</td><td>{}</td><td>{}</td><td class=\"text\">{}</td>",
            frame.timestamp,
            frame.id_hex(),
            frame.channel,
            frame.direction,
            frame.data_hex()
        ));
        for value in signals::decode_frame(frame) {
            html.push_str(&value_cell(value.map(|v| v.to_string())));
        }
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}

fn comparison_section(rows: &[ComparisonRow]) -> String {
    let mut html = String::from("<h2>Comparison</h2>\n");
    if rows.is_empty() {
        html.push_str("<p>Nothing to compare.</p>\n");
        return html;
    }
    html.push_str(
        "<table>\n<tr><th>Signal</th><th>Expected min</th><th>Expected max</th><th>Expected mid</th>\
         <th>Actual min</th><th>Actual max</th><th>Actual mid</th><th>Result</th></tr>\n",
    );
    for row in rows {
        html.push_str(&format!(
            "<tr><td class=\"text\">{}</td><td>{}</td><td>{}</td><td>{}</td>",
            row.signal, row.expected.min, row.expected.max, row.expected.mid
        ));
        html.push_str(&value_cell(row.actual.map(|a| a.min.to_string())));
        html.push_str(&value_cell(row.actual.map(|a| a.max.to_string())));
        html.push_str(&value_cell(row.actual.map(|a| a.mid.to_string())));
        html.push_str(&verdict_cell(row.verdict));
        html.push_str("</tr>\n");
    }
    html.push_str("</table>\n");
    html
}

/// Render the full page
pub fn render_html(ctx: &ReportContext) -> String {
    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    html.push_str("<title>CAN signal report</title>\n");
    html.push_str(&format!("<style>{}</style>\n", STYLE));
    html.push_str("</head>\n<body>\n<h1>CAN signal report</h1>\n");
    html.push_str(&run_section(ctx));
    html.push_str(&expected_section(ctx.expected));
    html.push_str(&sample_section(ctx));
    html.push_str(&comparison_section(ctx.rows));
    html.push_str("</body>\n</html>\n");
    html
}

pub fn save_html(path: &Path, ctx: &ReportContext) -> Result<(), BenchError> {
    let output_error = |source| BenchError::Output {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(output_error)?;
    }
    fs::write(path, render_html(ctx)).map_err(output_error)?;
    tracing::info!("Wrote HTML report to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::NaiveDate;

    use super::*;
    use crate::config::SignalVariables;
    use crate::parsers::capl::AssignmentPattern;
    use crate::parsers::{Direction, Frame, Meta};
    use crate::signals::SignalStats;

    fn frame(data: &[u8]) -> Frame {
        Frame {
            timestamp: 0.25,
            id: 0x123,
            is_extended: false,
            is_remote: false,
            is_fd: false,
            channel: 0,
            direction: Direction::Rx,
            dlc: data.len() as u8,
            data: data.to_vec(),
        }
    }

    fn generated_at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15)
            .and_then(|d| d.and_hms_opt(12, 0, 0))
            .unwrap()
    }

    fn render(log: &Log, expected: &ExpectedValues, rows: &[ComparisonRow], sample_rows: usize) -> String {
        render_html(&ReportContext {
            log_path: Path::new("logs/<bench>.blf"),
            log,
            expected,
            rows,
            message_id: Some(0x123),
            sample_rows,
            generated_at: generated_at(),
        })
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("a<b & \"c\"'"), "a&lt;b &amp; &quot;c&quot;&#39;");
    }

    #[test]
    fn test_report_contains_all_sections() {
        let log = Log {
            meta: Meta::Empty,
            frames: vec![frame(&[0x0B, 0xB8, 0x01, 0x2C, 0x5A]), frame(&[0x01])],
        };
        let mut expected = ExpectedValues::default();
        let pattern = AssignmentPattern::new(&SignalVariables::default()).unwrap();
        expected.extend_from_text(
            &pattern,
            "engineSpeed = 3000; torque = 300; coolantTemp = 90;",
            Path::new("tc.can"),
        );
        let rows = vec![
            ComparisonRow::new(
                Signal::EngineSpeed,
                SignalStats::new(3000, 3000),
                Some(SignalStats::new(3000, 3000)),
            ),
            ComparisonRow::new(Signal::CoolantTemp, SignalStats::new(90, 90), None),
        ];

        let html = render(&log, &expected, &rows, 20);
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("logs/&lt;bench&gt;.blf"));
        assert!(html.contains("<h2>Expected values</h2>"));
        assert!(html.contains("<td>3000</td><td>3000</td><td>3000</td><td>1</td>"));
        assert!(html.contains("First 2 of 2 frames."));
        assert!(html.contains("0B B8 01 2C 5A"));
        assert!(html.contains("<td class=\"missing\">missing</td>"));
        assert!(html.contains("<td class=\"pass\">Pass</td>"));
        assert!(html.contains("<td class=\"fail\">Fail</td>"));
        assert!(html.contains("0x123"));
        assert!(html.contains("2024-03-15 12:00:00"));
    }

    #[test]
    fn test_report_sample_is_limited() {
        let log = Log {
            meta: Meta::Empty,
            frames: vec![frame(&[1, 2, 3, 4, 5]); 50],
        };
        let html = render(&log, &ExpectedValues::default(), &[], 5);
        assert!(html.contains("First 5 of 50 frames."));
        assert_eq!(html.matches("<td>0.250000</td>").count(), 5);
        assert!(html.contains("No expected values were found"));
        assert!(html.contains("Nothing to compare."));
    }

    #[test]
    fn test_save_html() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports/report.html");
        let log = Log::default();
        let expected = ExpectedValues {
            samples: BTreeMap::new(),
        };
        let ctx = ReportContext {
            log_path: Path::new("x.blf"),
            log: &log,
            expected: &expected,
            rows: &[],
            message_id: None,
            sample_rows: 20,
            generated_at: generated_at(),
        };
        save_html(&path, &ctx).unwrap();
        let html = fs::read_to_string(&path).unwrap();
        assert!(html.contains("all frames"));
    }
}
