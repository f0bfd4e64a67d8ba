//! Portfolio CMS - binary entry point
//! Delegates to the library for all app logic.

use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match portfolio_cms::run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("portfolio-cms failed to start: {e}");
            ExitCode::FAILURE
        }
    }
}
