//! Entry point for the command-line interface.
#![forbid(unsafe_code)]

use pointzero_cli::CliError;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    match pointzero_cli::run().await {
        Ok(()) => {}
        Err(CliError::ArgumentParsing(err)) => err.exit(),
        Err(err) => {
            eprintln!("pointzero: {err}");
            std::process::exit(1);
        }
    }
}
