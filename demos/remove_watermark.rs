//! Remove the Gemini overlay from a single image.
//!
//! Usage:
//! ```sh
//! cargo run --example remove_watermark -- <calibration_dir> input.jpg output.png
//! ```

use std::env;
use std::process;

use gemini_unblend::{DirectorySource, ProcessOptions, WatermarkEngine};

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() < 4 {
        eprintln!("Usage: {} <calibration_dir> <input> <output>", args[0]);
        process::exit(1);
    }

    let engine = WatermarkEngine::from_source(&DirectorySource::new(&args[1]));
    let opts = ProcessOptions::default();
    let result = engine.process_file(args[2].as_ref(), args[3].as_ref(), &opts);

    if result.skipped {
        println!("Skipped: {}", result.message);
    } else if result.success {
        println!("Done: {}", result.message);
    } else {
        eprintln!("Error: {}", result.message);
        process::exit(1);
    }
}
