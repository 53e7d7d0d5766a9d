use chrono::Utc;
use std::time::Duration;
use tracing::{error, info};

use crate::core::AppError;
use crate::db::borrow_transactions;
use crate::services::AppContext;

/// Periodically fail pending borrow transactions whose QR code has lapsed.
///
/// Redemption already rejects lapsed codes on its own; this only keeps the
/// table from accumulating stale pending rows.
pub fn start_borrow_expiry_reconciler(ctx: AppContext, every: Duration) {
    info!(interval_seconds = every.as_secs(), "Starting borrow expiry reconciler");

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);

        loop {
            interval.tick().await;

            if let Err(e) = fail_lapsed_transactions(&ctx).await {
                error!(error.cause = ?e.cause, "Failed to reconcile lapsed borrow transactions: {}", e);
            }
        }
    });
}

/// Returns how many transactions were failed.
pub async fn fail_lapsed_transactions(ctx: &AppContext) -> Result<usize, AppError> {
    let failed = borrow_transactions::fail_lapsed_transactions(ctx.gateway.as_ref(), Utc::now()).await?;

    if failed > 0 {
        info!("Failed {} lapsed borrow transaction(s)", failed);
    }

    Ok(failed)
}
