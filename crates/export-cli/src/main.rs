//! wcpay-export
//!
//! Runs one payments report export against a store's REST API: creates the
//! export, polls until the file is ready, and saves it to the export directory.
//! Configuration comes from `WCPAY_*` environment variables (a `.env` file is
//! honored).

mod config;
mod download;

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use report_export::{ExportRequest, HttpApiFetch, PollerConfig, ReportExport, TracingNotices};

use crate::config::ExportCliConfig;
use crate::download::FileDownloader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ExportCliConfig::from_env()?;

    let mut api = HttpApiFetch::new(&config.api_base);
    if let Some(nonce) = &config.api_nonce {
        api = api.with_nonce(nonce);
    }

    let downloader = Arc::new(FileDownloader::new(&config.export_dir));
    let export = ReportExport::with_config(
        Arc::new(api),
        downloader.clone(),
        Arc::new(TracingNotices),
        PollerConfig {
            interval: config.poll_interval,
            ..PollerConfig::default()
        },
    );

    let mut request = ExportRequest::new(&config.export_request_path, &config.availability_endpoint);
    if let Some(email) = &config.user_email {
        request = request.with_user_email(email);
    }

    tracing::info!(api = %config.api_base, path = %config.export_request_path, "Requesting export");
    let Some(export_id) = export.request_report_export(request).await else {
        anyhow::bail!("export request failed");
    };

    export.wait_until_idle().await;

    match downloader.saved().first() {
        Some(path) => tracing::info!(export_id = %export_id, path = %path.display(), "Export complete"),
        None => tracing::info!(
            export_id = %export_id,
            "Export file was not ready in time; it will be emailed instead"
        ),
    }

    Ok(())
}
