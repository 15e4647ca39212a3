use anyhow::{Context, Result};
use axum::Router;
use std::{io::ErrorKind, sync::Arc};
use tokio::{net::TcpListener, sync::broadcast::error::RecvError};
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;

#[cfg(test)]
mod test_support;

use client::{
    http_transport::HttpTransport,
    orchestrator::{OrchestratorConfig, UploadOrchestrator},
    tracker::TaskEvent,
};
use config::{AppConfig, Command, UploadArgs};
use models::upload::{LocalFile, UploaderInfo};
use services::{cloudinary::CloudinaryClient, upload_service::UploadService};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + command ---
    let (cfg, command) = AppConfig::from_env_and_args()?;

    match command {
        Command::Serve => serve(cfg).await,
        Command::Upload(args) => upload(args).await,
    }
}

async fn serve(cfg: AppConfig) -> Result<()> {
    tracing::info!("Starting event-upload with config: {:?}", cfg);

    if !cfg.cloudinary.is_configured() {
        tracing::warn!("Cloudinary credentials are missing; uploads will fail until they are set");
    }

    // --- Initialize core service ---
    let policy = cfg.policy();
    let max_file_bytes = policy.max_bytes();
    let host = CloudinaryClient::new(cfg.cloudinary.clone())
        .context("building Cloudinary HTTP client")?;
    let service = UploadService::new(policy, Arc::new(host));

    // --- Build router ---
    let app: Router = routes::routes::routes(max_file_bytes).with_state(service);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Upload local files through the orchestrator and print the batch result as JSON.
async fn upload(args: UploadArgs) -> Result<()> {
    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let file = LocalFile::from_path(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        files.push(file);
    }

    let transport = HttpTransport::new(&args.endpoint, args.timeout())?;
    let orchestrator = UploadOrchestrator::new(
        Arc::new(transport),
        OrchestratorConfig {
            max_files: args.max_files,
            policy: args.policy(),
            clear_after: args.clear_after(),
        },
    );

    // Mirror the live progress view into the log.
    let mut events = orchestrator.tracker().subscribe();
    let progress_log = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(TaskEvent::Started { id }) => tracing::info!("task {} uploading", id),
                Ok(TaskEvent::Progress { id, percent }) => {
                    tracing::debug!("task {} at {}%", id, percent)
                }
                Ok(TaskEvent::Completed { id }) => tracing::info!("task {} completed", id),
                Ok(TaskEvent::Failed { id, error }) => {
                    tracing::warn!("task {} failed: {}", id, error)
                }
                Ok(TaskEvent::Cleared) | Err(RecvError::Closed) => break,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!("progress log skipped {} events", skipped)
                }
            }
        }
    });

    let uploader = UploaderInfo::new(args.name.clone(), args.email.clone());
    let result = orchestrator.upload_batch(files, uploader).await?;
    // The process exits right away, so close the view now; the logger stops at `Cleared`.
    if orchestrator.tracker().is_empty() {
        progress_log.abort();
    } else {
        for task in orchestrator.tracker().snapshot() {
            tracing::info!(
                "{}: {:?} at {}%{}",
                task.filename,
                task.status,
                task.progress,
                task.error.map(|e| format!(" ({})", e)).unwrap_or_default()
            );
        }
        orchestrator.tracker().clear();
        let _ = progress_log.await;
    }

    if result.records.is_empty() {
        tracing::warn!("No files were uploaded successfully");
    } else if result.is_partial() {
        tracing::warn!(
            "{} of {} files uploaded",
            result.records.len(),
            result.submitted()
        );
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
