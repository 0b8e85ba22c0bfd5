mod app;
mod domain;
mod infra;
mod util;

use std::process::ExitCode;

use crate::util::persistence::load_settings;

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries command output, so logging stays on stderr and quiet by default.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp(None)
        .init();

    let invocation = match app::parse_args(std::env::args().skip(1)) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("{e}\n\n{}", app::USAGE);
            return ExitCode::from(2);
        }
    };

    let settings = load_settings();
    log::debug!("Using backend at {}", settings.api_base_url);

    match app::run(invocation, settings).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) if e.is_usage() => {
            eprintln!("{e}\n\n{}", app::USAGE);
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
