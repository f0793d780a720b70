//! Shared helpers for client integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use hpc_client::ClientConfig;
use hpc_core::job::{FileUploadJob, JobStatus};
use hpc_store::JobStore;
use tokio::net::TcpListener;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{body_string_contains, BodyContainsMatcher};

// ---------------------------------------------------------------------------
// Files and config
// ---------------------------------------------------------------------------

/// Write `contents` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write test file");
    path
}

/// Config pointing at the given mock endpoints.
pub fn test_config(upload_url: String, progress_url: String, chunk_size: u64) -> ClientConfig {
    ClientConfig {
        upload_url,
        progress_url,
        chunk_size,
        upload_workers: 1,
        request_timeout: Duration::from_secs(5),
        feed_idle_timeout: Some(Duration::from_secs(5)),
        max_batch_files: Some(10),
        any_type: false,
    }
}

// ---------------------------------------------------------------------------
// Multipart matchers
// ---------------------------------------------------------------------------

/// Matches a multipart text field with the given name and value.
pub fn form_field(name: &str, value: &str) -> BodyContainsMatcher {
    body_string_contains(format!("name=\"{name}\"\r\n\r\n{value}\r\n"))
}

pub fn chunk_index_is(index: u64) -> BodyContainsMatcher {
    form_field("chunkIndex", &index.to_string())
}

pub fn file_name_is(file_name: &str) -> BodyContainsMatcher {
    form_field("fileName", file_name)
}

// ---------------------------------------------------------------------------
// Progress-feed server
// ---------------------------------------------------------------------------

/// One scripted action of the fake progress feed.
#[derive(Debug, Clone)]
pub enum FeedStep {
    /// Send a text frame.
    Send(String),
    /// Wait before the next step.
    Pause(Duration),
    /// Close the connection from the server side.
    Close,
}

pub fn send_json(value: serde_json::Value) -> FeedStep {
    FeedStep::Send(value.to_string())
}

/// A local WebSocket server that plays the same script to every client.
///
/// After the script runs out the connection stays open until the client
/// closes it.
pub struct FeedServer {
    /// Base address to use as `progress_url`.
    pub url: String,
    paths: Arc<Mutex<Vec<String>>>,
}

impl FeedServer {
    pub async fn start(steps: Vec<FeedStep>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let paths = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&paths);

        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let steps = steps.clone();
                let recorded = Arc::clone(&recorded);

                tokio::spawn(async move {
                    let callback =
                        move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                            recorded
                                .lock()
                                .unwrap()
                                .push(req.uri().path().to_string());
                            Ok(resp)
                        };
                    let Ok(mut ws) = accept_hdr_async(stream, callback).await else {
                        return;
                    };

                    for step in steps {
                        match step {
                            FeedStep::Send(text) => {
                                if ws.send(Message::Text(text)).await.is_err() {
                                    return;
                                }
                            }
                            FeedStep::Pause(d) => tokio::time::sleep(d).await,
                            FeedStep::Close => {
                                let _ = ws.close(None).await;
                                return;
                            }
                        }
                    }

                    while let Some(Ok(_)) = ws.next().await {}
                });
            }
        });

        Self {
            url: format!("ws://{addr}/ws/"),
            paths,
        }
    }

    /// Request paths of every connection accepted so far.
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }
}

// ---------------------------------------------------------------------------
// Store polling
// ---------------------------------------------------------------------------

/// Poll until `file_name` reaches `status`, panicking after `limit`.
pub async fn wait_for_status(
    store: &JobStore,
    file_name: &str,
    status: JobStatus,
    limit: Duration,
) -> FileUploadJob {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if let Some(job) = store.get(file_name).await {
            if job.status == status {
                return job;
            }
        }
        if tokio::time::Instant::now() >= deadline {
            panic!(
                "{file_name} did not reach {status} in {limit:?}; last: {:?}",
                store.get(file_name).await
            );
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
