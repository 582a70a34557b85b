#[path = "alertfeed/app.rs"]
mod app;
#[path = "alertfeed/cli.rs"]
mod cli;
#[path = "alertfeed/console.rs"]
mod console;
#[path = "alertfeed/notifier/mod.rs"]
mod notifier;

use std::error::Error as StdError;
use std::time::Duration;

/// Blocking desktop listeners get this long to wind down before exit.
const RUNTIME_GRACE: Duration = Duration::from_secs(3);

fn main() -> std::process::ExitCode {
    let cli = cli::Cli::parse_args();
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("Error: failed to start the async runtime: {err}");
            return std::process::ExitCode::from(1);
        }
    };
    let outcome = runtime.block_on(app::run(cli));
    runtime.shutdown_timeout(RUNTIME_GRACE);

    match outcome {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(err) => {
            report_error(&err);
            std::process::ExitCode::from(1)
        }
    }
}

fn report_error(err: &alertfeed::error::Error) {
    eprintln!("Error: {err}");
    let mut source: Option<&dyn StdError> = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {cause}");
        source = cause.source();
    }
}
