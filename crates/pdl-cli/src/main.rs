use pdl_core::{logging, DownloadState};

mod cli;

#[tokio::main]
async fn main() {
    // Initialize logging as early as possible.
    if let Err(err) = logging::init_logging() {
        logging::init_logging_stderr();
        tracing::warn!(error = %err, "log file unavailable, logging to stderr");
    }

    match cli::Cli::run_from_args().await {
        Ok(DownloadState::Complete) => {}
        Ok(state) => {
            eprintln!("pdl: download {}", state);
            std::process::exit(1);
        }
        Err(err) => {
            eprintln!("pdl error: {:#}", err);
            std::process::exit(1);
        }
    }
}
