use std::process::ExitCode;

use clap::Parser;
use tokio::signal;

use docqa::cli::Cli;
use docqa::cli::commands::handle_run;
use docqa::cli::output::get_formatter;

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let formatter = get_formatter(cli.format);

    tokio::select! {
        result = handle_run(cli) => match result {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                let message = format!("{e:#}");
                tracing::error!("{message}");
                eprintln!("{}", formatter.format_error(&message).trim_end());
                ExitCode::FAILURE
            }
        },
        _ = shutdown_signal() => {
            tracing::warn!("received shutdown signal; files in flight stay unmarked");
            eprintln!(
                "\n{}",
                formatter
                    .format_message("Received shutdown signal, stopping...")
                    .trim_end()
            );
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            ExitCode::SUCCESS
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            eprintln!("failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                eprintln!("failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
