//! leetstats.
//!
//! A small web service that keeps the public statistics of one LeetCode profile cached in
//! memory. The profile is refreshed in the background on a fixed interval and served as JSON,
//! so that a portfolio page never has to wait on the upstream.

#![warn(
    missing_debug_implementations,
    unused_crate_dependencies,
    clippy::all
)]

mod cli;
mod endpoints;
mod fetch;
mod healthcheck;
mod logging;
mod server;


fn main() {
    match cli::execute() {
        Ok(()) => std::process::exit(0),
        Err(error) => {
            logging::ensure_log_error(&error);
            std::process::exit(1);
        }
    }
}
