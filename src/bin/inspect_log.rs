use std::collections::BTreeMap;
use std::env;
use std::path::Path;

use canbench::parsers::{self, Meta, ReadOptions};
use canbench::signals::{self, Signal};

fn main() {
    let args: Vec<String> = env::args().collect();
    let path = if args.len() > 1 {
        &args[1]
    } else {
        "logs/SignalReport.blf"
    };
    let path = Path::new(path);

    println!("Reading file: {}", path.display());
    let log = match parsers::decode_file(path, &ReadOptions::default()) {
        Ok(log) => log,
        Err(e) => {
            eprintln!("Decode error: {}", e);
            std::process::exit(1);
        }
    };

    println!("\n=== Format ===");
    match &log.meta {
        Meta::Blf(blf) => {
            println!("BLF, application {} v{}", blf.application_id, blf.application_version);
            println!("Binlog version: {}", blf.binlog_version);
            println!(
                "File size: {} bytes ({} uncompressed)",
                blf.file_size, blf.uncompressed_size
            );
            println!("Objects: {} in {} containers", blf.object_count, blf.containers);
            if blf.skipped > 0 {
                println!("Skipped while recovering: {}", blf.skipped);
            }
            if let (Some(start), Some(stop)) = (blf.start_time, blf.stop_time) {
                println!("Measurement: {} to {}", start, stop);
            }
        }
        Meta::Asc(asc) => {
            println!("ASC, base {}", if asc.base == 16 { "hex" } else { "dec" });
            println!(
                "Timestamps: {}",
                if asc.timestamps_absolute { "absolute" } else { "relative" }
            );
            if let Some(start) = asc.start_time {
                println!("Measurement start: {}", start);
            }
            println!("Skipped lines: {}", asc.skipped_lines);
        }
        Meta::Empty => println!("No metadata"),
    }

    println!("\n=== Frames ===");
    println!("Total: {}", log.frames.len());
    if let Some((start, end)) = log.time_range() {
        println!("Time range: {:.6} to {:.6} seconds", start, end);
    }

    let mut per_id: BTreeMap<u32, usize> = BTreeMap::new();
    for frame in &log.frames {
        *per_id.entry(frame.id).or_default() += 1;
    }
    println!("\n=== Frames per ID ===");
    for (id, count) in &per_id {
        println!("  {:>#10x}: {}", id, count);
    }

    println!("\n=== First 10 Frames ===");
    let header: Vec<String> = Signal::ORDER
        .iter()
        .map(|s| format!("{:>12}", s.to_string()))
        .collect();
    println!(
        "  {:>12} | {:>10} | {:<23} | {}",
        "Time",
        "ID",
        "Data",
        header.join(" | ")
    );
    for frame in log.frames.iter().take(10) {
        let values: Vec<String> = signals::decode_frame(frame)
            .iter()
            .map(|v| match v {
                Some(v) => format!("{:>12}", v),
                None => format!("{:>12}", "missing"),
            })
            .collect();
        println!(
            "  {:>12.6} | {:>10} | {:<23} | {}",
            frame.timestamp,
            frame.id_hex(),
            frame.data_hex(),
            values.join(" | ")
        );
    }
}
