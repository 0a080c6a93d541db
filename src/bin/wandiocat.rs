//! `wandiocat`: the concatenation driver from spec section 6. Reads one or
//! more input streams and writes them, in order, to a single output
//! stream, optionally (re)compressing. Exit code is the count of inputs
//! that failed to open.

use std::io;
use std::process::ExitCode;

use clap::Parser;
use wandio::{Codec, Sink, Source};

/// Returned for a fatal I/O failure (a read or the final close, as opposed
/// to a per-input open failure, which the exit code counts instead).
const FATAL_EXIT_CODE: u8 = 255;

#[derive(Parser)]
#[command(
    name = "wandiocat",
    about = "Concatenate streams through wandio, with transparent (de)compression"
)]
struct Args {
    /// Output codec: gzip|bzip2|lzo|lzma|zstd|lz4
    #[arg(short = 'Z', long = "codec")]
    codec: Option<String>,

    /// Compression level, 0..9
    #[arg(short = 'z', long = "level", default_value_t = 6)]
    level: u32,

    /// Output file ("-" for stdout)
    #[arg(short = 'o', long = "output", default_value = "-")]
    output: String,

    /// Input files ("-" for stdin); defaults to stdin if none given
    inputs: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    let codec = match args.codec.as_deref() {
        Some(name) => match Codec::from_name(name) {
            Some(c) => c,
            None => {
                eprintln!("wandiocat: unknown codec {name:?}");
                return ExitCode::from(1);
            }
        },
        None => Codec::None,
    };

    let mut sink = match wandio::open_write(&args.output, codec, args.level, false) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("wandiocat: failed to open output {:?}: {e}", args.output);
            return ExitCode::from(1);
        }
    };

    let inputs = if args.inputs.is_empty() {
        vec!["-".to_string()]
    } else {
        args.inputs
    };

    // Exit code is the count of inputs that failed to open (spec section
    // 6); a read or close failure is a different, fatal kind of error and
    // is reported via a fixed sentinel code instead of folding into that
    // count.
    let mut failures: u8 = 0;
    for input in &inputs {
        match wandio::open_read(input) {
            Ok(mut source) => {
                let result = io::copy(&mut source, &mut sink);
                let _ = source.close();
                if let Err(e) = result {
                    eprintln!("wandiocat: error reading {input:?}: {e}");
                    return ExitCode::from(FATAL_EXIT_CODE);
                }
            }
            Err(e) => {
                eprintln!("wandiocat: failed to open {input:?}: {e}");
                failures = failures.saturating_add(1);
            }
        }
    }

    if let Err(e) = sink.close() {
        eprintln!("wandiocat: error closing output: {e}");
        return ExitCode::from(FATAL_EXIT_CODE);
    }

    ExitCode::from(failures)
}
