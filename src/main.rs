// src/main.rs

use std::process::ExitCode;

use buildflow::{cli, error_exit_code, logging, run};

#[tokio::main]
async fn main() -> ExitCode {
    let args = cli::parse();
    if let Err(err) = logging::init_logging(args.log_level) {
        eprintln!("buildflow error: {err:?}");
        return ExitCode::from(1);
    }

    match run(args).await {
        Ok(outcome) => ExitCode::from(outcome.exit_code()),
        Err(err) => {
            eprintln!("buildflow error: {err}");
            ExitCode::from(error_exit_code(&err))
        }
    }
}
