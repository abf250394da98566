//! prendr - command-line front end for the pixelrendr sprite codec

use std::process::ExitCode;

use pixelrendr::cli;

fn main() -> ExitCode {
    env_logger::init();
    cli::run()
}
