//! Capture calibration tool
//!
//! Ingests capture CSV files, recovers the frame header offset, and fits
//! the accumulated bit-planes to a sinusoid of known frequency and sample
//! interval.
//!
//! Usage:
//!   cargo run --bin adccal -- [OPTIONS] -f <Hz> -t <sec> <capture.csv> [more.csv ...]
//!   adccal [OPTIONS] -f <Hz> -t <sec> <capture.csv> [more.csv ...]
//!
//! Options:
//!   -f, --freq <Hz>       Stimulus frequency (required)
//!   -t, --tstep <sec>     Sample interval (required)
//!   -c, --channels <n>    Channel columns per capture (default: 3)
//!       --stage1          Fit the first SAR stage only (9 bits)
//!       --channel <c>     Fit a single channel instead of the pooled model
//!       --cond-limit <x>  Condition number limit (default: 1e8)
//!       --reverify        Re-verify the header offset on every file
//!   -h, --help            Show this help message

use sarcal::tracing_init::init_tracing;
use sarcal::{
    sine_calibration, CalibrationConfig, CalibrationScope, Dataset, DatasetConfig, WeightSpan,
};

struct CalArgs {
    files: Vec<String>,
    frequency: f64,
    time_step: f64,
    channels: usize,
    stage1: bool,
    channel: Option<usize>,
    condition_limit: f64,
    reverify: bool,
}

impl CalArgs {
    fn parse_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();

        let mut frequency = None;
        let mut time_step = None;
        let mut channels = 3;
        let mut stage1 = false;
        let mut channel = None;
        let mut condition_limit = 1e8;
        let mut reverify = false;
        let mut files = Vec::new();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-f" | "--freq" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --freq".to_string());
                    }
                    frequency = Some(
                        args[i]
                            .parse()
                            .map_err(|_| format!("Invalid frequency: {}", args[i]))?,
                    );
                }
                "-t" | "--tstep" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --tstep".to_string());
                    }
                    time_step = Some(
                        args[i]
                            .parse()
                            .map_err(|_| format!("Invalid sample interval: {}", args[i]))?,
                    );
                }
                "-c" | "--channels" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --channels".to_string());
                    }
                    channels = args[i]
                        .parse()
                        .map_err(|_| format!("Invalid channel count: {}", args[i]))?;
                }
                "--stage1" => {
                    stage1 = true;
                }
                "--channel" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --channel".to_string());
                    }
                    channel = Some(
                        args[i]
                            .parse()
                            .map_err(|_| format!("Invalid channel index: {}", args[i]))?,
                    );
                }
                "--cond-limit" => {
                    i += 1;
                    if i >= args.len() {
                        return Err("Missing value for --cond-limit".to_string());
                    }
                    condition_limit = args[i]
                        .parse()
                        .map_err(|_| format!("Invalid condition limit: {}", args[i]))?;
                }
                "--reverify" => {
                    reverify = true;
                }
                "-h" | "--help" => {
                    print_help(&args[0]);
                    std::process::exit(0);
                }
                arg if !arg.starts_with('-') => {
                    files.push(arg.to_string());
                }
                arg => return Err(format!("Unknown option: {}", arg)),
            }
            i += 1;
        }

        let frequency = frequency.ok_or("Missing required option --freq")?;
        let time_step = time_step.ok_or("Missing required option --tstep")?;
        if files.is_empty() {
            return Err("No capture files given".to_string());
        }

        Ok(Self {
            files,
            frequency,
            time_step,
            channels,
            stage1,
            channel,
            condition_limit,
            reverify,
        })
    }
}

fn print_help(program: &str) {
    eprintln!("Usage: {} [OPTIONS] -f <Hz> -t <sec> <capture.csv> [more.csv ...]", program);
    eprintln!();
    eprintln!("Recovers per-bit weights and stimulus parameters from raw ADC captures.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -f, --freq <Hz>       Stimulus frequency (required)");
    eprintln!("  -t, --tstep <sec>     Sample interval (required)");
    eprintln!("  -c, --channels <n>    Channel columns per capture (default: 3)");
    eprintln!("      --stage1          Fit the first SAR stage only (9 bits)");
    eprintln!("      --channel <c>     Fit a single channel instead of the pooled model");
    eprintln!("      --cond-limit <x>  Condition number limit (default: 1e8)");
    eprintln!("      --reverify        Re-verify the header offset on every file");
    eprintln!("  -h, --help            Show this help message");
}

fn main() {
    init_tracing();

    let args = match CalArgs::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help("adccal");
            std::process::exit(1);
        }
    };

    let mut dataset = Dataset::new(DatasetConfig {
        channels: args.channels,
        reverify_offset: args.reverify,
        ..DatasetConfig::default()
    });

    for file in &args.files {
        print!("Ingesting {} ... ", file);
        match dataset.ingest_file(file) {
            Ok(frames) => {
                println!(
                    "{} frames (header offset {})",
                    frames,
                    dataset.header_offset().unwrap_or(0)
                );
            }
            Err(e) => {
                println!("failed");
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
    }

    println!();
    println!("Accumulated frames: {}", dataset.len());

    let config = CalibrationConfig {
        span: if args.stage1 {
            WeightSpan::Stage1
        } else {
            WeightSpan::Full
        },
        scope: match args.channel {
            Some(c) => CalibrationScope::PerChannel(c),
            None => CalibrationScope::Pooled,
        },
        condition_limit: args.condition_limit,
    };

    let model = match sine_calibration(&dataset, args.frequency, args.time_step, &config) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Calibration failed: {}", e);
            std::process::exit(1);
        }
    };

    println!(
        "Fit: {} frames, {} unknowns, condition {:.3e}, residual rms {:.3e}",
        model.rows, model.cols, model.condition, model.residual_rms
    );
    println!();
    println!("Stimulus:");
    println!("  dc        = {:.9}", model.dc);
    println!("  amplitude = {:.9}", model.amplitude);
    println!("  phase     = {:.9} rad", model.phase);
    println!();
    println!("Bit weights (w1 normalized to 1):");
    for (i, w) in model.weights.iter().enumerate() {
        println!("  w{:<2} = {:.9}", i + 1, w);
    }
}
