//! Fakes shared by unit and end-to-end tests.

use crate::{
    models::media::MediaKind,
    routes::routes::routes,
    services::{
        hosting::{HostError, HostUpload, HostedAsset, MediaHost},
        media_policy::MediaPolicy,
        upload_service::UploadService,
    },
};
use async_trait::async_trait;
use std::{
    collections::HashSet,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::net::TcpListener;

/// In-memory media host that counts calls and fails for chosen filenames.
#[derive(Default)]
pub struct FakeHost {
    calls: AtomicUsize,
    uploads: Mutex<Vec<(String, MediaKind)>>,
    fail: HashSet<String>,
    unconfigured: bool,
}

impl FakeHost {
    pub fn failing_for<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fail: names.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            unconfigured: true,
            ..Self::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn kinds(&self) -> Vec<MediaKind> {
        self.uploads.lock().unwrap().iter().map(|(_, k)| *k).collect()
    }

    pub fn filenames(&self) -> Vec<String> {
        self.uploads
            .lock()
            .unwrap()
            .iter()
            .map(|(name, _)| name.clone())
            .collect()
    }
}

#[async_trait]
impl MediaHost for FakeHost {
    async fn upload(&self, upload: HostUpload) -> Result<HostedAsset, HostError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.uploads
            .lock()
            .unwrap()
            .push((upload.filename.clone(), upload.kind));
        if self.fail.contains(&upload.filename) {
            return Err(HostError::Rejected {
                status: 500,
                message: "simulated outage".into(),
            });
        }
        let public_id = format!("memories-app/{}", upload.filename);
        Ok(HostedAsset {
            secure_url: format!("https://cdn.test/{}", public_id),
            public_id,
        })
    }

    fn rendition_url(&self, public_id: &str, _kind: MediaKind) -> Option<String> {
        Some(format!("https://cdn.test/thumb/{}", public_id))
    }

    fn is_configured(&self) -> bool {
        !self.unconfigured
    }
}

/// Serve the real router on an ephemeral local port.
pub async fn spawn_server(host: Arc<FakeHost>, max_file_size_mb: u64) -> SocketAddr {
    let policy = MediaPolicy::with_defaults(max_file_size_mb);
    let app = routes(policy.max_bytes()).with_state(UploadService::new(policy, host));
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}
