//! Report Export Poller
//!
//! Create-then-poll-then-download workflow for asynchronous report exports:
//!
//! ```text
//! Idle ──request──▶ Requesting ──export_id──▶ Polling ──success──▶ download ─▶ Idle
//!                        │                     │  ▲
//!                        │ error               │  │ pending / GET error
//!                        ▼                     ▼  │ (retry_count < max_retries)
//!                   notice ─▶ Idle        wait interval
//!                                              │ retries exhausted
//!                                              ▼
//!                                            Idle
//! ```
//!
//! Polling runs on a single spawned task, so at most one timer is outstanding
//! and polls never overlap. [`ReportExport::unmount`] (or dropping the poller)
//! cancels it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::ApiFetch;
use crate::download::{download_href, Downloader};
use crate::error::{ExportError, Result};
use crate::lock;
use crate::notice::{Notices, DOWNLOAD_ERROR_NOTICE, EXPORT_ERROR_NOTICE};

const SUCCESS_STATUS: &str = "success";

/// Poller tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerConfig {
    /// Delay before each availability check
    pub interval: Duration,

    /// Availability checks before giving up
    pub max_retries: u32,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            max_retries: 5,
        }
    }
}

/// One export to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Creation endpoint, including any report filters in its query
    pub export_request_url: String,

    /// Availability endpoint; the export id is appended as a path segment
    pub export_file_availability_endpoint: String,

    /// Recipient for the emailed copy
    pub user_email: Option<String>,
}

impl ExportRequest {
    pub fn new(
        export_request_url: impl Into<String>,
        export_file_availability_endpoint: impl Into<String>,
    ) -> Self {
        Self {
            export_request_url: export_request_url.into(),
            export_file_availability_endpoint: export_file_availability_endpoint.into(),
            user_email: None,
        }
    }

    pub fn with_user_email(mut self, email: impl Into<String>) -> Self {
        self.user_email = Some(email.into());
        self
    }

    fn body(&self) -> Value {
        match &self.user_email {
            Some(email) => json!({ "user_email": email }),
            None => json!({}),
        }
    }

    fn availability_path(&self, export_id: &str) -> String {
        format!(
            "{}/{}",
            self.export_file_availability_endpoint.trim_end_matches('/'),
            export_id
        )
    }
}

/// Where the poller is in the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportState {
    Idle,
    Requesting,
    Polling { export_id: String, retry_count: u32 },
}

#[derive(Debug, Default, Deserialize)]
struct Availability {
    #[serde(default)]
    status: Option<String>,

    #[serde(default)]
    download_url: Option<String>,
}

struct Inner {
    api: Arc<dyn ApiFetch>,
    downloader: Arc<dyn Downloader>,
    notices: Arc<dyn Notices>,
    config: PollerConfig,
    state: watch::Sender<ExportState>,
}

/// Export requestor and poller
pub struct ReportExport {
    inner: Arc<Inner>,
    timer: Mutex<Option<JoinHandle<()>>>,
    // Bumped by every request and by unmount; a request whose generation is
    // stale once its POST resolves must not start polling
    generation: AtomicU64,
}

impl ReportExport {
    pub fn new(
        api: Arc<dyn ApiFetch>,
        downloader: Arc<dyn Downloader>,
        notices: Arc<dyn Notices>,
    ) -> Self {
        Self::with_config(api, downloader, notices, PollerConfig::default())
    }

    pub fn with_config(
        api: Arc<dyn ApiFetch>,
        downloader: Arc<dyn Downloader>,
        notices: Arc<dyn Notices>,
        config: PollerConfig,
    ) -> Self {
        let (state, _) = watch::channel(ExportState::Idle);
        Self {
            inner: Arc::new(Inner {
                api,
                downloader,
                notices,
                config,
                state,
            }),
            timer: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> PollerConfig {
        self.inner.config
    }

    pub fn state(&self) -> ExportState {
        self.inner.state.borrow().clone()
    }

    pub fn is_export_in_progress(&self) -> bool {
        *self.inner.state.borrow() != ExportState::Idle
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<ExportState> {
        self.inner.state.subscribe()
    }

    /// Resolve once the poller is back to idle
    pub async fn wait_until_idle(&self) {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|state| *state == ExportState::Idle).await;
    }

    /// Create an export job and start polling for its file
    ///
    /// Returns the export id once polling is scheduled. A failed creation
    /// request is reported through [`Notices`] and yields `None`; nothing
    /// after that point is reported to the caller.
    pub async fn request_report_export(&self, request: ExportRequest) -> Option<String> {
        self.cancel_timer();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.set_state(ExportState::Requesting);

        let created = self.inner.create_export(&request).await;
        if !self.is_current(generation) {
            tracing::debug!("Report export request superseded before it completed");
            return None;
        }

        let export_id = match created {
            Ok(export_id) => export_id,
            Err(err) => {
                tracing::warn!(
                    error = %err,
                    path = %request.export_request_url,
                    "Report export request failed"
                );
                self.inner.notices.error(EXPORT_ERROR_NOTICE);
                self.inner.set_state(ExportState::Idle);
                return None;
            }
        };

        tracing::info!(export_id = %export_id, "Report export created");
        self.inner.set_state(ExportState::Polling {
            export_id: export_id.clone(),
            retry_count: 0,
        });

        let inner = Arc::clone(&self.inner);
        let path = request.availability_path(&export_id);
        let id = export_id.clone();
        let timer = tokio::spawn(async move { inner.poll(&id, &path).await });
        if let Some(previous) = lock(&self.timer).replace(timer) {
            previous.abort();
        }

        Some(export_id)
    }

    /// Cancel any pending poll; the poller is idle afterwards
    ///
    /// A creation request still in flight resolves without starting to poll.
    pub fn unmount(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        if self.cancel_timer() {
            tracing::debug!("Report export polling cancelled");
        }
        self.inner.set_state(ExportState::Idle);
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) == generation
    }

    fn cancel_timer(&self) -> bool {
        match lock(&self.timer).take() {
            Some(timer) => {
                timer.abort();
                true
            }
            None => false,
        }
    }
}

impl Drop for ReportExport {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

impl Inner {
    fn set_state(&self, state: ExportState) {
        self.state.send_replace(state);
    }

    async fn create_export(&self, request: &ExportRequest) -> Result<String> {
        let response = self
            .api
            .post(&request.export_request_url, &request.body())
            .await?;

        match response.get("export_id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(ExportError::MissingExportId),
        }
    }

    /// Download URL once the file is ready
    async fn check_availability(&self, path: &str) -> Result<Option<String>> {
        let availability: Availability = serde_json::from_value(self.api.get(path).await?)?;
        if availability.status.as_deref() != Some(SUCCESS_STATUS) {
            return Ok(None);
        }
        Ok(availability.download_url.filter(|url| !url.is_empty()))
    }

    async fn poll(&self, export_id: &str, path: &str) {
        let mut retry_count = 0;

        loop {
            tokio::time::sleep(self.config.interval).await;
            retry_count += 1;
            self.set_state(ExportState::Polling {
                export_id: export_id.to_string(),
                retry_count,
            });

            match self.check_availability(path).await {
                Ok(Some(download_url)) => {
                    self.download(export_id, &download_url).await;
                    self.set_state(ExportState::Idle);
                    return;
                }
                Ok(None) => {
                    tracing::debug!(export_id, retry_count, "Export file not ready");
                }
                // Any failed check counts as "not ready"; an export that may
                // still succeed is never aborted by one bad response
                Err(err) if err.is_retryable() => {
                    tracing::debug!(export_id, retry_count, error = %err, "Transient export availability failure");
                }
                Err(err) => {
                    tracing::warn!(export_id, retry_count, error = %err, "Export availability check failed");
                }
            }

            if retry_count >= self.config.max_retries {
                tracing::info!(
                    export_id,
                    retry_count,
                    "Export file not ready after final check; it will be emailed instead"
                );
                self.set_state(ExportState::Idle);
                return;
            }
        }
    }

    async fn download(&self, export_id: &str, download_url: &str) {
        let href = download_href(download_url);
        match self.downloader.download(&href).await {
            Ok(()) => tracing::info!(export_id, href = %href, "Export downloaded"),
            Err(err) => {
                tracing::warn!(export_id, error = %err, "Export download failed");
                self.notices.error(DOWNLOAD_ERROR_NOTICE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{export_ready, server_error, MockApiFetch};
    use async_trait::async_trait;

    const REQUEST_URL: &str = "/payments/transactions/download?date_after=2024-01-01";
    const AVAILABILITY: &str = "/payments/transactions/download";

    #[derive(Default)]
    struct RecordingDownloader {
        hrefs: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl Downloader for RecordingDownloader {
        async fn download(&self, href: &str) -> Result<()> {
            lock(&self.hrefs).push(href.to_string());
            if self.fail {
                return Err(ExportError::Download("disk full".into()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotices {
        errors: Mutex<Vec<String>>,
    }

    impl Notices for RecordingNotices {
        fn error(&self, message: &str) {
            lock(&self.errors).push(message.to_string());
        }
    }

    struct Harness {
        api: Arc<MockApiFetch>,
        downloader: Arc<RecordingDownloader>,
        notices: Arc<RecordingNotices>,
        export: ReportExport,
    }

    fn harness_with(api: MockApiFetch, downloader: RecordingDownloader) -> Harness {
        let api = Arc::new(api);
        let downloader = Arc::new(downloader);
        let notices = Arc::new(RecordingNotices::default());
        let export = ReportExport::new(api.clone(), downloader.clone(), notices.clone());
        Harness {
            api,
            downloader,
            notices,
            export,
        }
    }

    fn harness(api: MockApiFetch) -> Harness {
        harness_with(api, RecordingDownloader::default())
    }

    fn request() -> ExportRequest {
        ExportRequest::new(REQUEST_URL, AVAILABILITY)
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_max_retries() {
        let h = harness(MockApiFetch::new());

        let export_id = h.export.request_report_export(request()).await;
        assert_eq!(export_id.as_deref(), Some("123"));
        assert!(h.export.is_export_in_progress());

        h.export.wait_until_idle().await;

        let calls = h.api.calls();
        assert_eq!(calls.len(), 6);
        assert_eq!(calls[0].method, "POST");
        assert!(calls[1..]
            .iter()
            .all(|call| call.method == "GET" && call.path == "/payments/transactions/download/123"));
        assert!(!h.export.is_export_in_progress());
        assert!(lock(&h.downloader.hrefs).is_empty());
        assert!(lock(&h.notices.errors).is_empty());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.api.call_count(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_downloads_when_ready() {
        let h = harness(MockApiFetch::new().then_get(export_ready("https://x/file.csv")));

        h.export.request_report_export(request()).await;
        h.export.wait_until_idle().await;

        assert_eq!(
            *lock(&h.downloader.hrefs),
            vec!["https://x/file.csv?force_download=true".to_string()]
        );

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.api.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_on_interval() {
        let h = harness(MockApiFetch::new());
        let started = tokio::time::Instant::now();

        h.export.request_report_export(request()).await;
        h.export.wait_until_idle().await;

        assert_eq!(started.elapsed(), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_get_errors_count_as_not_ready() {
        let h = harness(
            MockApiFetch::new()
                .then_get(server_error(AVAILABILITY))
                .then_get(Ok(json!("garbage")))
                .then_get(export_ready("https://x/file.csv?sig=1")),
        );

        h.export.request_report_export(request()).await;
        h.export.wait_until_idle().await;

        assert_eq!(h.api.call_count(), 4);
        assert_eq!(
            *lock(&h.downloader.hrefs),
            vec!["https://x/file.csv?sig=1&force_download=true".to_string()]
        );
        assert!(lock(&h.notices.errors).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_failure_notifies() {
        let h = harness(
            MockApiFetch::new().with_post_response(Err(ExportError::Network("refused".into()))),
        );

        let export_id = h.export.request_report_export(request()).await;

        assert_eq!(export_id, None);
        assert!(!h.export.is_export_in_progress());
        assert_eq!(*lock(&h.notices.errors), vec![EXPORT_ERROR_NOTICE.to_string()]);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.api.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_export_id_notifies() {
        let h = harness(MockApiFetch::new().with_post_response(Ok(json!({ "success": true }))));

        assert_eq!(h.export.request_report_export(request()).await, None);
        assert_eq!(h.export.state(), ExportState::Idle);
        assert_eq!(lock(&h.notices.errors).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_numeric_export_id() {
        let h = harness(MockApiFetch::new().with_post_response(Ok(json!({ "export_id": 77 }))));

        assert_eq!(
            h.export.request_report_export(request()).await.as_deref(),
            Some("77")
        );
        h.export.unmount();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_cancels_pending_poll() {
        let h = harness(MockApiFetch::new().then_get(export_ready("https://x/file.csv")));

        h.export.request_report_export(request()).await;
        tokio::time::sleep(Duration::from_millis(500)).await;
        h.export.unmount();

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.api.call_count(), 1);
        assert!(lock(&h.downloader.hrefs).is_empty());
        assert!(!h.export.is_export_in_progress());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels_pending_poll() {
        let h = harness(MockApiFetch::new().then_get(export_ready("https://x/file.csv")));

        h.export.request_report_export(request()).await;
        let Harness { api, downloader, export, .. } = h;
        drop(export);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.call_count(), 1);
        assert!(lock(&downloader.hrefs).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sends_user_email() {
        let h = harness(MockApiFetch::new());

        h.export
            .request_report_export(request().with_user_email("owner@shop.example"))
            .await;
        h.export.unmount();

        assert_eq!(
            h.api.calls()[0].body,
            Some(json!({ "user_email": "owner@shop.example" }))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_download_failure_notifies() {
        let h = harness_with(
            MockApiFetch::new().then_get(export_ready("https://x/file.csv")),
            RecordingDownloader {
                fail: true,
                ..Default::default()
            },
        );

        h.export.request_report_export(request()).await;
        h.export.wait_until_idle().await;

        assert_eq!(*lock(&h.notices.errors), vec![DOWNLOAD_ERROR_NOTICE.to_string()]);
        assert_eq!(h.api.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_transitions() {
        let h = harness(MockApiFetch::new().then_get(export_ready("https://x/file.csv")));
        let mut rx = h.export.subscribe();
        assert_eq!(*rx.borrow_and_update(), ExportState::Idle);

        h.export.request_report_export(request()).await;
        assert_eq!(
            *rx.borrow_and_update(),
            ExportState::Polling {
                export_id: "123".into(),
                retry_count: 0
            }
        );

        h.export.wait_until_idle().await;
        assert_eq!(*rx.borrow_and_update(), ExportState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_during_request_prevents_polling() {
        let h = harness(MockApiFetch::new().with_post_delay(Duration::from_millis(300)));

        let (export_id, ()) = tokio::join!(h.export.request_report_export(request()), async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            h.export.unmount();
        });

        assert_eq!(export_id, None);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.api.call_count(), 1);
        assert!(!h.export.is_export_in_progress());
        assert!(lock(&h.notices.errors).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlapping_requests_leave_one_poller() {
        let h = harness(MockApiFetch::new().with_post_delay(Duration::from_millis(300)));

        let (first, second) = tokio::join!(
            h.export.request_report_export(request()),
            h.export.request_report_export(request()),
        );
        assert_eq!(first, None);
        assert_eq!(second.as_deref(), Some("123"));

        // Both POSTs plus one availability check from the surviving poller
        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(h.api.call_count(), 3);

        h.export.unmount();
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.api.call_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_still_count_as_not_ready() {
        let h = harness(
            MockApiFetch::new()
                .then_get(Err(ExportError::Http {
                    status: 404,
                    path: AVAILABILITY.into(),
                }))
                .then_get(export_ready("https://x/file.csv")),
        );

        h.export.request_report_export(request()).await;
        h.export.wait_until_idle().await;

        assert_eq!(h.api.call_count(), 3);
        assert_eq!(lock(&h.downloader.hrefs).len(), 1);
    }
}
