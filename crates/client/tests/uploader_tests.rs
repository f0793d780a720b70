//! Chunk uploader against a mocked ingestion endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use hpc_client::api::{UploadApi, UploadApiError};
use hpc_client::uploader::{ChunkUploader, UploadError};
use hpc_core::job::{FileUploadJob, JobStatus};
use hpc_store::JobStore;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{chunk_index_is, form_field, write_file};

fn uploader_for(server: &MockServer, store: Arc<JobStore>, chunk_size: u64) -> ChunkUploader {
    let api = UploadApi::new(format!("{}/upload", server.uri()), Duration::from_secs(5))
        .expect("build client");
    ChunkUploader::new(Arc::new(api), store, chunk_size)
}

fn ack() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"status": "chunk received"}))
}

fn final_ack(job_id: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"job_id": job_id}))
}

// ---------------------------------------------------------------------------
// Happy path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_chunks_sent_in_order_and_final_ack_yields_job_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(chunk_index_is(2))
        .respond_with(final_ack("job-25"))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ack())
        .expect(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "data.txt", b"aaaaaaaaaabbbbbbbbbbccccc");

    let store = Arc::new(JobStore::default());
    store.upsert(FileUploadJob::new("data.txt")).await;
    let mut changes = store.subscribe();

    let uploader = uploader_for(&server, Arc::clone(&store), 10);
    let job_id = uploader.upload(&file, "data.txt").await.unwrap();
    assert_eq!(job_id, "job-25");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 3);
    let expected_payloads = ["aaaaaaaaaa", "bbbbbbbbbb", "ccccc"];
    for (i, request) in requests.iter().enumerate() {
        let body = String::from_utf8_lossy(&request.body);
        assert!(body.contains(&format!("name=\"chunkIndex\"\r\n\r\n{i}\r\n")));
        assert!(body.contains("name=\"totalChunks\"\r\n\r\n3\r\n"));
        assert!(body.contains("name=\"fileName\"\r\n\r\ndata.txt\r\n"));
        assert!(body.contains(expected_payloads[i]));
    }

    let mut progress = Vec::new();
    while let Ok(change) = changes.try_recv() {
        assert_eq!(change.job.status, JobStatus::Uploading);
        progress.push(change.job.progress);
    }
    assert_eq!(progress, vec![34, 67, 100]);
}

#[tokio::test]
async fn empty_file_sends_one_empty_chunk() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(chunk_index_is(0))
        .and(form_field("totalChunks", "1"))
        .respond_with(final_ack("job-empty"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "empty.txt", b"");

    let store = Arc::new(JobStore::default());
    store.upsert(FileUploadJob::new("empty.txt")).await;

    let uploader = uploader_for(&server, Arc::clone(&store), 10);
    let job_id = uploader.upload(&file, "empty.txt").await.unwrap();
    assert_eq!(job_id, "job-empty");
    assert_eq!(store.get("empty.txt").await.unwrap().progress, 100);
}

#[tokio::test]
async fn intermediate_acks_of_any_json_shape_are_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(chunk_index_is(0))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": 1, "received": true})),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(chunk_index_is(1))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(chunk_index_is(2))
        .respond_with(final_ack("j"))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "data.txt", b"aaaaaaaaaabbbbbbbbbbccccc");

    let store = Arc::new(JobStore::default());
    store.upsert(FileUploadJob::new("data.txt")).await;

    let uploader = uploader_for(&server, Arc::clone(&store), 10);
    assert_eq!(uploader.upload(&file, "data.txt").await.unwrap(), "j");
    assert_eq!(store.get("data.txt").await.unwrap().progress, 100);
}

#[tokio::test]
async fn job_id_on_an_intermediate_ack_is_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(chunk_index_is(0))
        .respond_with(final_ack("too-early"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(chunk_index_is(1))
        .respond_with(ack())
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "data.txt", b"aaaaaaaaaabb");

    let store = Arc::new(JobStore::default());
    store.upsert(FileUploadJob::new("data.txt")).await;

    let uploader = uploader_for(&server, store, 10);
    assert_matches!(
        uploader.upload(&file, "data.txt").await,
        Err(UploadError::MissingJobId)
    );
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn rejected_chunk_aborts_without_sending_the_rest() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(chunk_index_is(1))
        .respond_with(ResponseTemplate::new(500).set_body_string("Failed to write chunk"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ack())
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "data.txt", b"aaaaaaaaaabbbbbbbbbbccccc");

    let store = Arc::new(JobStore::default());
    store.upsert(FileUploadJob::new("data.txt")).await;

    let uploader = uploader_for(&server, Arc::clone(&store), 10);
    let err = uploader.upload(&file, "data.txt").await.unwrap_err();

    assert_matches!(
        err,
        UploadError::Chunk {
            chunk_index: 1,
            source: UploadApiError::Rejected { status: 500, ref body },
        } if body == "Failed to write chunk"
    );
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    // Only the first chunk was acknowledged.
    let job = store.get("data.txt").await.unwrap();
    assert_eq!(job.progress, 34);
    assert!(job.job_id.is_none());
}

#[tokio::test]
async fn final_ack_without_job_id_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ack())
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let file = write_file(dir.path(), "data.txt", b"hello");

    let store = Arc::new(JobStore::default());
    store.upsert(FileUploadJob::new("data.txt")).await;

    let uploader = uploader_for(&server, store, 10);
    assert_matches!(
        uploader.upload(&file, "data.txt").await,
        Err(UploadError::MissingJobId)
    );
}

#[tokio::test]
async fn missing_file_is_io_error() {
    let server = MockServer::start().await;
    let store = Arc::new(JobStore::default());
    let uploader = uploader_for(&server, store, 10);

    let dir = tempfile::tempdir().unwrap();
    assert_matches!(
        uploader
            .upload(&dir.path().join("absent.txt"), "absent.txt")
            .await,
        Err(UploadError::Io(_))
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}
