//! Samosa - task automation with aliasable commands

use std::process::ExitCode;

fn main() -> ExitCode {
    match samosa::cli::run() {
        Ok(code) => code,
        Err(e) => samosa::cli::report(&e),
    }
}
