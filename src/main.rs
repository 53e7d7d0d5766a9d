use std::fmt::{Debug, Display};
use std::time::Duration;

use colored::*;
use thesis_vault::core::{get_subscriber, init_subscriber, AppConfig};
use thesis_vault::jobs::borrow_expiry::start_borrow_expiry_reconciler;
use thesis_vault::thesis_vault_web_server::ThesisVaultWebServer;
use tokio::task::JoinError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let file_appender = tracing_appender::rolling::daily("/var/tmp/log/thesis_vault", "app");

    let subscriber = get_subscriber("thesis_vault".into(), "info".into(), file_appender);
    init_subscriber(subscriber)?;

    let config = AppConfig::new()?;

    let thesis_vault_web_server = ThesisVaultWebServer::build(config.clone()).await?;

    if let Some(seconds) = config.borrowing.reconcile_interval_seconds {
        start_borrow_expiry_reconciler(
            thesis_vault_web_server.context(),
            Duration::from_secs(seconds),
        );
    }

    let server_task = tokio::spawn(thesis_vault_web_server.run_until_stopped());

    println!("{}", "-----------------------------------------".green());
    println!(
        "🚀 Server started on Addr: {}:{}",
        config.thesis_vault_server_config.host, config.thesis_vault_server_config.port
    );
    println!("{}", "-----------------------------------------".green());

    tokio::select! {
        outcome = server_task => { report_exit("API server", outcome); }
    }
    Ok(())
}

fn report_exit(task_name: &str, outcome: Result<Result<(), impl Debug + Display>, JoinError>) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{} has exited", task_name)
        }
        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{} failed",
                task_name
            )
        }
        Err(e) => {
            tracing::error!(
                error.cause_chain = ?e,
                error.message = %e,
                "{}' task failed to complete",
                task_name
            )
        }
    }
}
