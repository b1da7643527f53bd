//! User Notices

/// Shown when the export could not be created
pub const EXPORT_ERROR_NOTICE: &str = "There was a problem generating your export.";

/// Shown when a finished export could not be downloaded
pub const DOWNLOAD_ERROR_NOTICE: &str = "There was a problem downloading your export.";

/// Sink for user-visible notices
pub trait Notices: Send + Sync {
    fn error(&self, message: &str);
}

/// Notices written to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotices;

impl Notices for TracingNotices {
    fn error(&self, message: &str) {
        tracing::error!(notice = message, "Export notice");
    }
}
