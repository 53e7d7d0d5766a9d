//! Secure viewing of a full thesis document.
//!
//! A session downloads the PDF to a private temporary file, shows it only
//! while the app is in the foreground, and deletes the file when closed or
//! dropped. Viewing is gated on live access, re-checked on every download.

use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use uuid::Uuid;

use crate::core::AppError;
use crate::db::{storage, views};
use crate::models::theses::Thesis;
use crate::models::users::CurrentUser;
use crate::models::views::ThesisView;
use crate::services::access_requests::require_access;
use crate::services::AppContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct DownloadProgress {
    pub received: u64,
    pub total: Option<u64>,
}

impl DownloadProgress {
    pub fn percent(&self) -> Option<u8> {
        match self.total {
            Some(0) | None => None,
            Some(total) => Some((self.received.min(total) * 100 / total) as u8),
        }
    }
}

/// Streams a document from a URL into a local file, reporting progress.
#[async_trait]
pub trait DocumentFetcher: Send + Sync {
    /// Returns the number of bytes written to `destination`.
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &watch::Sender<DownloadProgress>,
    ) -> Result<u64, AppError>;
}

pub struct HttpDocumentFetcher {
    client: reqwest::Client,
}

impl HttpDocumentFetcher {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(AppError::internal_error)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DocumentFetcher for HttpDocumentFetcher {
    async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        progress: &watch::Sender<DownloadProgress>,
    ) -> Result<u64, AppError> {
        let mut response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(AppError::gateway_error)?;
        if !response.status().is_success() {
            return Err(AppError::gateway_error(format!(
                "Download failed with status: {}",
                response.status()
            )));
        }

        let total = response.content_length();
        let mut received = 0u64;
        progress.send_replace(DownloadProgress { received, total });

        let mut file = tokio::fs::File::create(destination).await?;
        while let Some(chunk) = response.chunk().await.map_err(AppError::gateway_error)? {
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            progress.send_replace(DownloadProgress { received, total });
        }
        file.flush().await?;

        Ok(received)
    }
}

/// A downloaded document on local disk. The file goes away with the value.
#[derive(Debug)]
pub struct LocalDocument {
    path: Option<PathBuf>,
}

impl LocalDocument {
    fn new(path: PathBuf) -> Self {
        Self { path: Some(path) }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub async fn delete(mut self) -> Result<(), AppError> {
        if let Some(path) = self.path.take() {
            match tokio::fs::remove_file(&path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
                _ => tracing::debug!(path = %path.display(), "deleted local document"),
            }
        }
        Ok(())
    }
}

impl Drop for LocalDocument {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            if let Err(e) = std::fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %path.display(), error = %e, "failed to delete local document");
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Active,
    Inactive,
    Background,
}

/// What the document surface lets the reader do with the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExtractionPolicy {
    pub allow_copy: bool,
    pub allow_text_selection: bool,
    pub allow_save: bool,
    pub allow_share: bool,
    pub allow_print: bool,
    pub allow_context_menu: bool,
    pub allow_zoom: bool,
}

impl ExtractionPolicy {
    pub const fn locked_down() -> Self {
        Self {
            allow_copy: false,
            allow_text_selection: false,
            allow_save: false,
            allow_share: false,
            allow_print: false,
            allow_context_menu: false,
            allow_zoom: false,
        }
    }

    pub fn permits_extraction(&self) -> bool {
        self.allow_copy
            || self.allow_text_selection
            || self.allow_save
            || self.allow_share
            || self.allow_print
    }
}

pub struct ViewerSession {
    ctx: AppContext,
    user: CurrentUser,
    thesis: Thesis,
    document: Option<LocalDocument>,
    app_state: AppState,
    visible: bool,
    progress: watch::Sender<DownloadProgress>,
}

impl std::fmt::Debug for ViewerSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewerSession")
            .field("user_id", &self.user.id)
            .field("thesis_id", &self.thesis.thesis_id)
            .field("document", &self.document)
            .field("app_state", &self.app_state)
            .field("visible", &self.visible)
            .finish_non_exhaustive()
    }
}

impl ViewerSession {
    /// Open a viewer for `thesis`. Fails unless the user currently has access.
    #[tracing::instrument(
        name = "Begin viewer session",
        skip(ctx, user, thesis),
        fields(user_id = user.id, thesis_id = thesis.thesis_id)
    )]
    pub async fn begin(ctx: &AppContext, user: &CurrentUser, thesis: Thesis) -> Result<Self, AppError> {
        require_access(ctx, user, thesis.thesis_id).await?;
        let (progress, _) = watch::channel(DownloadProgress::default());

        Ok(Self {
            ctx: ctx.clone(),
            user: user.clone(),
            thesis,
            document: None,
            app_state: AppState::Active,
            visible: false,
            progress,
        })
    }

    pub fn thesis(&self) -> &Thesis {
        &self.thesis
    }

    pub fn policy(&self) -> ExtractionPolicy {
        ExtractionPolicy::locked_down()
    }

    pub fn progress(&self) -> watch::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    /// Download the document to a fresh private file and display it.
    ///
    /// A previously downloaded copy is deleted first. A failed download leaves
    /// no file behind.
    #[tracing::instrument(name = "Open thesis document", skip(self), fields(thesis_id = self.thesis.thesis_id))]
    pub async fn open_document(&mut self) -> Result<PathBuf, AppError> {
        require_access(&self.ctx, &self.user, self.thesis.thesis_id).await?;

        let file_url = self
            .thesis
            .file_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| AppError::not_found("No PDF file available for this thesis"))?
            .to_string();
        let url = self.retrieval_url(&file_url).await?;

        self.discard_document().await;

        let download_dir = &self.ctx.settings.viewer.download_dir;
        tokio::fs::create_dir_all(download_dir).await?;
        let path = download_dir.join(format!(
            "thesis_{}_{}_{}.pdf",
            self.thesis.thesis_id,
            Utc::now().timestamp_millis(),
            Uuid::new_v4().simple()
        ));

        let document = LocalDocument::new(path.clone());
        self.progress.send_replace(DownloadProgress::default());
        let bytes = self.ctx.fetcher.fetch(&url, &path, &self.progress).await?;
        tracing::info!(bytes, "document downloaded");

        self.document = Some(document);
        self.visible = self.app_state == AppState::Active;
        self.record_view();

        Ok(path)
    }

    /// Signed URL for storage-held documents; other absolute URLs as they are.
    async fn retrieval_url(&self, file_url: &str) -> Result<String, AppError> {
        let storage_config = &self.ctx.settings.storage;
        let is_http = file_url.starts_with("http://") || file_url.starts_with("https://");
        if is_http && !file_url.contains(&storage_config.url_marker) {
            return Ok(file_url.to_string());
        }

        match storage::signed_document_url(self.ctx.gateway.as_ref(), storage_config, file_url).await {
            Ok(url) => Ok(url),
            Err(e) if is_http => {
                tracing::warn!(error.cause = ?e.cause, "could not sign document URL, using stored URL");
                Ok(file_url.to_string())
            }
            Err(e) => Err(e),
        }
    }

    fn record_view(&self) {
        let gateway = self.ctx.gateway.clone();
        let view = ThesisView {
            user_id: self.user.id,
            thesis_id: self.thesis.thesis_id,
            viewed_at: Utc::now(),
        };
        self.ctx.side_effects.submit("thesis_view", async move {
            views::insert_view(gateway.as_ref(), &view).await
        });
    }

    /// The document is hidden whenever the app leaves the foreground. Coming
    /// back does not reveal it again; the reader has to ask.
    pub fn handle_app_state(&mut self, state: AppState) {
        if state != AppState::Active && self.visible {
            tracing::debug!(?state, "hiding document");
            self.visible = false;
        }
        self.app_state = state;
    }

    pub fn show(&mut self) -> Result<(), AppError> {
        if self.app_state != AppState::Active {
            return Err(AppError::permission_denied(
                "The document can only be shown while the app is in the foreground",
            ));
        }
        if self.document.is_none() {
            return Err(AppError::not_found("The document has not been downloaded"));
        }
        self.visible = true;
        Ok(())
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Path of the document currently on screen, if any.
    pub fn visible_document(&self) -> Option<&Path> {
        if !self.visible {
            return None;
        }
        self.document.as_ref().and_then(LocalDocument::path)
    }

    pub fn document_path(&self) -> Option<&Path> {
        self.document.as_ref().and_then(LocalDocument::path)
    }

    pub async fn close(&mut self) {
        self.visible = false;
        self.discard_document().await;
    }

    async fn discard_document(&mut self) {
        if let Some(document) = self.document.take() {
            if let Err(e) = document.delete().await {
                tracing::warn!(error.cause = ?e.cause, "failed to delete local document");
            }
        }
    }
}
