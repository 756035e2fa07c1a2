// src/main.rs

use std::process::ExitCode;

use borgkeeper::{cli, logging, run, signals};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let arguments = match cli::parse() {
        Ok(arguments) => arguments,
        Err(err) => err.exit(),
    };

    match run_main(arguments).await {
        Ok(code) => code,
        Err(err) => {
            eprintln!("borgkeeper error: {err:?}");
            ExitCode::FAILURE
        }
    }
}

async fn run_main(arguments: cli::Arguments) -> anyhow::Result<ExitCode> {
    let global = &arguments.global;
    logging::init_logging(
        global.verbosity,
        global.log_file.as_deref(),
        global.log_file_verbosity,
    )?;
    signals::configure_signals()?;
    run(arguments).await
}
