//! Download Trigger

use async_trait::async_trait;

use crate::error::Result;

/// Query flag asking the server to send the file as an attachment
pub const FORCE_DOWNLOAD_PARAM: &str = "force_download=true";

/// Whatever turns a signed download URL into a file for the user
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, href: &str) -> Result<()>;
}

/// The URL handed to the downloader for a finished export
pub fn download_href(download_url: &str) -> String {
    let separator = if download_url.contains('?') { '&' } else { '?' };
    format!("{download_url}{separator}{FORCE_DOWNLOAD_PARAM}")
}
