//! File Downloader
//!
//! Fetches a finished export and writes it into the export directory.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use report_export::{Downloader, ExportError, Result};

const FALLBACK_FILE_NAME: &str = "export.csv";

pub struct FileDownloader {
    client: reqwest::Client,
    dir: PathBuf,
    saved: Mutex<Vec<PathBuf>>,
}

impl FileDownloader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            client: reqwest::Client::new(),
            dir: dir.into(),
            saved: Mutex::new(Vec::new()),
        }
    }

    /// Files written so far
    pub fn saved(&self) -> Vec<PathBuf> {
        lock(&self.saved).clone()
    }

    async fn save(&self, href: &str, contents: &[u8]) -> Result<PathBuf> {
        let path = self.dir.join(file_name_for(href));
        write_file(&self.dir, &path, contents)
            .await
            .map_err(|e| ExportError::Download(format!("{}: {e}", path.display())))?;

        lock(&self.saved).push(path.clone());
        Ok(path)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

async fn write_file(dir: &Path, path: &Path, contents: &[u8]) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(path, contents).await
}

/// Last path segment of the download URL, ignoring the query
fn file_name_for(href: &str) -> String {
    reqwest::Url::parse(href)
        .ok()
        .and_then(|url| {
            url.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string())
}

#[async_trait]
impl Downloader for FileDownloader {
    async fn download(&self, href: &str) -> Result<()> {
        let response = self.client.get(href).send().await?;
        if !response.status().is_success() {
            return Err(ExportError::Download(format!(
                "HTTP {} fetching export file",
                response.status()
            )));
        }

        let contents = response.bytes().await?;
        let path = self.save(href, &contents).await?;
        tracing::info!(path = %path.display(), bytes = contents.len(), "Export file saved");
        Ok(())
    }
}
