//! # report-export
//!
//! Asynchronous report exports against the payments REST API.
//!
//! The server generates export files in the background. [`ReportExport`]
//! creates the job, polls its availability endpoint on a fixed interval with a
//! bounded number of checks, and hands the finished file's URL to a
//! [`Downloader`]. When the file is not ready in time the poller stops quietly;
//! the server emails the export instead.
//!
//! ```text
//! POST {export_request_url}                ─▶ { "export_id": "123" }
//! GET  {availability_endpoint}/123   (×≤5) ─▶ { "status": "success", "download_url": ".." }
//! download {download_url}?force_download=true
//! ```

pub mod api;
pub mod download;
pub mod error;
pub mod notice;
pub mod poller;

pub use api::{ApiFetch, HttpApiFetch, MockApiFetch};
pub use download::{download_href, Downloader, FORCE_DOWNLOAD_PARAM};
pub use error::{ExportError, Result};
pub use notice::{Notices, TracingNotices, DOWNLOAD_ERROR_NOTICE, EXPORT_ERROR_NOTICE};
pub use poller::{ExportRequest, ExportState, PollerConfig, ReportExport};

use std::sync::{Mutex, MutexGuard, PoisonError};

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
