//! Binary entrypoint for the `jamie` terminal chat client.

use std::process::ExitCode;

use jamie_client::start_jamie_client;

/// Sign in and chat with the Jamie backend from the terminal.
fn main() -> ExitCode {
    start_jamie_client::run()
}
