use chrono::Utc;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::core::config::ScannerConfig;
use crate::core::AppError;
use crate::db::{scans, theses};
use crate::models::qr::{QrAction, ThesisKind, ThesisQrPayload, THESIS_QR_VERSION};
use crate::models::scans::{RecentScan, ScanResponse, ScanSource};
use crate::models::theses::Thesis;
use crate::models::users::CurrentUser;
use crate::services::AppContext;

const NO_MATCH: &str = "No thesis found for this QR code";

/// Map a raw scanned string to a catalogued thesis.
///
/// Tried in order: structured thesis QR (JSON), storage PDF URL, bare integer
/// id. Whatever fails to match the first two falls through to the last.
#[tracing::instrument(name = "Resolve scanned payload", skip(ctx))]
pub async fn resolve(ctx: &AppContext, raw: &str) -> Result<(Thesis, ScanSource), AppError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(AppError::invalid_format("QR code is empty"));
    }

    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(raw) {
        let thesis = resolve_structured(ctx, &fields).await?;
        return Ok((thesis, ScanSource::QrPayload));
    }

    if let Some(file_name) = storage_pdf_file_name(raw, &ctx.settings.storage.url_marker) {
        let thesis = theses::get_thesis_by_file_name(ctx.gateway.as_ref(), file_name)
            .await?
            .ok_or_else(|| AppError::not_found("This PDF file is not linked to any thesis"))?;
        return Ok((thesis, ScanSource::StorageUrl));
    }

    let thesis_id: i64 = raw.parse().map_err(|_| AppError::not_found(NO_MATCH))?;
    let thesis = theses::get_thesis_by_id(ctx.gateway.as_ref(), thesis_id)
        .await?
        .ok_or_else(|| AppError::not_found(NO_MATCH))?;
    Ok((thesis, ScanSource::RawIdentifier))
}

async fn resolve_structured(ctx: &AppContext, fields: &Map<String, Value>) -> Result<Thesis, AppError> {
    if fields.get("type").and_then(Value::as_str) != Some("thesis") {
        return Err(AppError::invalid_format("This QR code is not a thesis QR code"));
    }

    let thesis_id = match fields.get("thesis_id") {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .ok_or_else(|| AppError::invalid_format("Thesis QR code is missing its thesis id"))?;

    theses::get_thesis_by_id(ctx.gateway.as_ref(), thesis_id)
        .await?
        .ok_or_else(|| AppError::not_found("Thesis not found"))
}

/// The last path segment of a storage URL pointing at a PDF.
fn storage_pdf_file_name<'a>(raw: &'a str, marker: &str) -> Option<&'a str> {
    if !raw.contains(marker) {
        return None;
    }
    let path = raw.split(|c: char| c == '?' || c == '#').next()?;
    if !path.to_ascii_lowercase().ends_with(".pdf") {
        return None;
    }
    path.rsplit('/').next().filter(|name| !name.is_empty())
}

/// Resolve a scan and record it in the user's history.
///
/// The history write is best-effort; the scan succeeds even if it fails.
#[tracing::instrument(name = "Scan thesis", skip(ctx, user), fields(user_id = user.id))]
pub async fn scan(ctx: &AppContext, user: &CurrentUser, raw: &str) -> Result<ScanResponse, AppError> {
    let (thesis, source) = resolve(ctx, raw).await?;

    let gateway = ctx.gateway.clone();
    let (user_id, thesis_id, scanned_at) = (user.id, thesis.thesis_id, Utc::now());
    ctx.side_effects.submit("scan_history", async move {
        scans::upsert_scan(gateway.as_ref(), user_id, thesis_id, scanned_at).await
    });

    tracing::info!(thesis_id, ?source, "scan resolved");
    Ok(ScanResponse {
        thesis,
        source,
        scanned_at,
    })
}

/// Most recent scans, newest first, one entry per thesis.
pub async fn recent_scans(ctx: &AppContext, user: &CurrentUser) -> Result<Vec<RecentScan>, AppError> {
    let limit = ctx.settings.scanner.recent_scans_limit;
    let rows = scans::get_recent_scans(ctx.gateway.as_ref(), user.id, limit).await?;

    let mut seen = HashSet::new();
    let rows: Vec<_> = rows
        .into_iter()
        .filter(|row| seen.insert(row.thesis_id))
        .collect();

    let ids: Vec<i64> = rows.iter().map(|row| row.thesis_id).collect();
    let catalogue = theses::get_theses_by_ids(ctx.gateway.as_ref(), &ids).await?;

    // Theses deleted since the scan are skipped.
    Ok(rows
        .into_iter()
        .filter_map(|row| {
            catalogue
                .iter()
                .find(|thesis| thesis.thesis_id == row.thesis_id)
                .map(|thesis| RecentScan {
                    scanned_at: row.scanned_at,
                    thesis: thesis.clone(),
                })
        })
        .collect())
}

/// The payload printed on a thesis label.
pub fn thesis_qr_payload(thesis_id: i64, action: QrAction) -> ThesisQrPayload {
    ThesisQrPayload {
        kind: ThesisKind::Thesis,
        thesis_id,
        action,
        timestamp: Utc::now().timestamp_millis(),
        version: THESIS_QR_VERSION.to_string(),
    }
}

/// Client-side scan admission: one scan in flight at a time, and the same
/// payload is ignored if it repeats within the debounce window.
pub struct ScanGate {
    window: Duration,
    busy: AtomicBool,
    last: Mutex<Option<(String, Instant)>>,
}

/// Held while a scan is processed; dropping it reopens the gate.
pub struct ScanPermit<'a> {
    gate: &'a ScanGate,
}

impl Drop for ScanPermit<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}

impl ScanGate {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            busy: AtomicBool::new(false),
            last: Mutex::new(None),
        }
    }

    pub fn try_begin(&self, payload: &str) -> Option<ScanPermit<'_>> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        let permit = ScanPermit { gate: self };

        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let now = Instant::now();
        if let Some((previous, at)) = last.as_ref() {
            if previous == payload && now.duration_since(*at) < self.window {
                return None;
            }
        }
        *last = Some((payload.to_string(), now));
        drop(last);

        Some(permit)
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

impl From<&ScannerConfig> for ScanGate {
    fn from(config: &ScannerConfig) -> Self {
        Self::new(Duration::from_millis(config.debounce_millis))
    }
}
