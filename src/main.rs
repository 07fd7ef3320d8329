//! # Voxel Streaming Entry Point
//!
//! Runs the streaming engine headlessly with a wandering observer.
//!
//! ## Usage
//!
//! ```bash
//! RUST_LOG=info cargo run --release -- [CONFIG_PATH] [FRAMES] [--no-gpu]
//! ```

use std::process::ExitCode;

use voxel_streaming::DemoOptions;

fn main() -> ExitCode {
    let mut options = DemoOptions::default();
    let mut positional = 0;

    for arg in std::env::args().skip(1) {
        if arg == "--no-gpu" {
            options.use_gpu = false;
            continue;
        }
        match positional {
            0 => options.config_path = Some(arg.into()),
            1 => match arg.parse() {
                Ok(frames) => options.frames = frames,
                Err(_) => {
                    eprintln!("FRAMES must be a non-negative integer, got '{arg}'");
                    return ExitCode::FAILURE;
                }
            },
            _ => {
                eprintln!("usage: voxel-streaming [CONFIG_PATH] [FRAMES] [--no-gpu]");
                return ExitCode::FAILURE;
            }
        }
        positional += 1;
    }

    match voxel_streaming::run(&options) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{}", err);
            ExitCode::FAILURE
        }
    }
}
