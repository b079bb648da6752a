//! Synthetic capture generator
//!
//! Writes a capture CSV shaped like the converter's framed output: a
//! sinusoid SAR-converted against an ideal binary weight ladder, framed
//! with the alternating header at a chosen offset, optionally disturbed
//! with Gaussian noise.
//!
//! Usage:
//!   cargo run --bin adcsim -- [OPTIONS] <output.csv>
//!   adcsim [OPTIONS] <output.csv>
//!
//! Options:
//!   -f, --freq <Hz>       Stimulus frequency (default: 12937)
//!   -t, --tstep <sec>     Sample interval (default: 1e-6)
//!   -n, --frames <n>      Complete frames per channel (default: 1024)
//!   -o, --offset <k>      Header offset inside the frame (default: 3)
//!   -c, --channels <n>    Channels to write (default: 3)
//!       --dc <v>          Stimulus dc level (default: 0.93)
//!       --amp <v>         Stimulus amplitude (default: 0.41)
//!       --phase <rad>     Stimulus phase (default: 0.7)
//!       --noise <rms>     Gaussian noise rms added before conversion
//!       --seed <n>        Noise seed (default: 1)
//!   -h, --help            Show this help message

use sarcal::simulate::{binary_weights, CaptureSim, Stimulus};
use sarcal::sync::SAR_LEN;
use sarcal::tracing_init::init_tracing;
use std::path::Path;

struct SimArgs {
    output_path: String,
    frequency: f64,
    time_step: f64,
    frames: usize,
    offset: usize,
    channels: usize,
    dc: f64,
    amplitude: f64,
    phase: f64,
    noise_rms: f64,
    seed: u64,
}

impl SimArgs {
    fn parse_args() -> Result<Self, String> {
        let args: Vec<String> = std::env::args().collect();

        let mut frequency = 12937.0;
        let mut time_step = 1e-6;
        let mut frames = 1024;
        let mut offset = 3;
        let mut channels = 3;
        let mut dc = 0.93;
        let mut amplitude = 0.41;
        let mut phase = 0.7;
        let mut noise_rms = 0.0;
        let mut seed = 1;
        let mut output_path = None;

        fn value<'a>(args: &'a [String], i: &mut usize, name: &str) -> Result<&'a str, String> {
            *i += 1;
            args.get(*i)
                .map(String::as_str)
                .ok_or_else(|| format!("Missing value for {}", name))
        }

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "-f" | "--freq" => {
                    frequency = value(&args, &mut i, "--freq")?
                        .parse()
                        .map_err(|_| "Invalid frequency".to_string())?;
                }
                "-t" | "--tstep" => {
                    time_step = value(&args, &mut i, "--tstep")?
                        .parse()
                        .map_err(|_| "Invalid sample interval".to_string())?;
                }
                "-n" | "--frames" => {
                    frames = value(&args, &mut i, "--frames")?
                        .parse()
                        .map_err(|_| "Invalid frame count".to_string())?;
                }
                "-o" | "--offset" => {
                    offset = value(&args, &mut i, "--offset")?
                        .parse()
                        .map_err(|_| "Invalid offset".to_string())?;
                    if offset >= 20 {
                        return Err("Offset must be in 0..20".to_string());
                    }
                }
                "-c" | "--channels" => {
                    channels = value(&args, &mut i, "--channels")?
                        .parse()
                        .map_err(|_| "Invalid channel count".to_string())?;
                }
                "--dc" => {
                    dc = value(&args, &mut i, "--dc")?
                        .parse()
                        .map_err(|_| "Invalid dc level".to_string())?;
                }
                "--amp" => {
                    amplitude = value(&args, &mut i, "--amp")?
                        .parse()
                        .map_err(|_| "Invalid amplitude".to_string())?;
                }
                "--phase" => {
                    phase = value(&args, &mut i, "--phase")?
                        .parse()
                        .map_err(|_| "Invalid phase".to_string())?;
                }
                "--noise" => {
                    noise_rms = value(&args, &mut i, "--noise")?
                        .parse()
                        .map_err(|_| "Invalid noise rms".to_string())?;
                }
                "--seed" => {
                    seed = value(&args, &mut i, "--seed")?
                        .parse()
                        .map_err(|_| "Invalid seed".to_string())?;
                }
                "-h" | "--help" => {
                    print_help(&args[0]);
                    std::process::exit(0);
                }
                arg if !arg.starts_with('-') => {
                    if output_path.is_none() {
                        output_path = Some(arg.to_string());
                    } else {
                        return Err(format!("Unexpected argument: {}", arg));
                    }
                }
                arg => return Err(format!("Unknown option: {}", arg)),
            }
            i += 1;
        }

        let output_path = output_path.ok_or("Missing output path")?;
        Ok(Self {
            output_path,
            frequency,
            time_step,
            frames,
            offset,
            channels,
            dc,
            amplitude,
            phase,
            noise_rms,
            seed,
        })
    }
}

fn print_help(program: &str) {
    eprintln!("Usage: {} [OPTIONS] <output.csv>", program);
    eprintln!();
    eprintln!("Writes a synthetic ADC capture with a known stimulus and weight ladder.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -f, --freq <Hz>       Stimulus frequency (default: 12937)");
    eprintln!("  -t, --tstep <sec>     Sample interval (default: 1e-6)");
    eprintln!("  -n, --frames <n>      Complete frames per channel (default: 1024)");
    eprintln!("  -o, --offset <k>      Header offset inside the frame (default: 3)");
    eprintln!("  -c, --channels <n>    Channels to write (default: 3)");
    eprintln!("      --dc <v>          Stimulus dc level (default: 0.93)");
    eprintln!("      --amp <v>         Stimulus amplitude (default: 0.41)");
    eprintln!("      --phase <rad>     Stimulus phase (default: 0.7)");
    eprintln!("      --noise <rms>     Gaussian noise rms added before conversion");
    eprintln!("      --seed <n>        Noise seed (default: 1)");
    eprintln!("  -h, --help            Show this help message");
}

fn main() {
    init_tracing();

    let args = match SimArgs::parse_args() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            print_help("adcsim");
            std::process::exit(1);
        }
    };

    let sim = CaptureSim {
        stimulus: Stimulus {
            frequency: args.frequency,
            time_step: args.time_step,
            dc: args.dc,
            amplitude: args.amplitude,
            phase: args.phase,
        },
        weights: binary_weights(SAR_LEN),
        channels: args.channels,
        header_offset: args.offset,
        frames: args.frames,
        noise_rms: args.noise_rms,
        seed: args.seed,
    };

    if let Err(e) = sim.write_csv(Path::new(&args.output_path)) {
        eprintln!("Error writing {}: {}", args.output_path, e);
        std::process::exit(1);
    }

    println!(
        "Wrote {}: {} channels x {} frames, header offset {}",
        args.output_path, args.channels, args.frames, args.offset
    );
}
