//! Integration tests for the HTTP gateway against a local stub server.
//!
//! The stub accepts one connection per scripted response, records the raw
//! request, and answers with `Connection: close`, so every request the
//! gateway makes shows up as one entry in the returned transcript.

use docintelli::{
    App, Backend, ClientConfig, DocIntelliError, HttpGateway, MemoryStorage, PdfFile,
    StepPacing,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing_subscriber::EnvFilter;

// ── Stub server ──────────────────────────────────────────────────────────────

struct Reply {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Reply {
    Reply {
        status: 200,
        content_type,
        body: body.into(),
    }
}

fn status(status: u16, body: &str) -> Reply {
    Reply {
        status,
        content_type: "text/plain",
        body: body.as_bytes().to_vec(),
    }
}

/// Serve `replies` in order; resolves to the raw requests received.
async fn serve(replies: Vec<Reply>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let mut seen = Vec::new();
        for reply in replies {
            let (mut socket, _) = listener.accept().await.unwrap();
            seen.push(read_request(&mut socket).await);

            let head = format!(
                "HTTP/1.1 {} Stub\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                reply.status,
                reply.content_type,
                reply.body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&reply.body).await.unwrap();
            socket.shutdown().await.ok();
        }
        seen
    });
    (base, handle)
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = socket.read(&mut chunk).await.unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        if request_complete(&buf) {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request_complete(buf: &[u8]) -> bool {
    let text = String::from_utf8_lossy(buf);
    let Some(header_end) = text.find("\r\n\r\n") else {
        return false;
    };
    let head = text[..header_end].to_ascii_lowercase();
    let body_len = buf.len() - (header_end + 4);

    if let Some(len) = head
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok())
    {
        return body_len >= len;
    }
    if head.contains("transfer-encoding: chunked") {
        return text.ends_with("0\r\n\r\n");
    }
    true
}

/// Route gateway logs to the test harness; `RUST_LOG` narrows them.
fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("docintelli=debug")),
        )
        .with_test_writer()
        .try_init();
}

fn gateway(base: &str) -> HttpGateway {
    init_logs();
    let config = ClientConfig::builder()
        .base_url(base)
        .request_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    HttpGateway::new(config).unwrap()
}

fn sample_pdf() -> PdfFile {
    PdfFile::from_bytes("paper.pdf", b"%PDF-1.4 stub body".to_vec(), 1 << 20).unwrap()
}

// ── Conversion ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn convert_uploads_file_and_ocr_field() {
    let (base, server) = serve(vec![ok("text/markdown", "# Title\n\nBody\n")]).await;

    let md = gateway(&base)
        .convert(&sample_pdf(), true, true)
        .await
        .unwrap();
    assert_eq!(md, "# Title\n\nBody\n");

    let requests = server.await.unwrap();
    let req = &requests[0];
    assert!(req.starts_with("POST /convert HTTP/1.1"), "got: {req}");
    assert!(req.contains("multipart/form-data"));
    assert!(req.contains("name=\"file\"; filename=\"paper.pdf\""));
    assert!(req.contains("%PDF-1.4 stub body"));
    assert!(req.contains("name=\"ocr\"\r\n\r\ntrue\r\n"));
}

#[tokio::test]
async fn convert_without_ai_uses_raw_endpoint() {
    let (base, server) = serve(vec![ok("text/markdown", "raw")]).await;

    let md = gateway(&base)
        .convert(&sample_pdf(), false, false)
        .await
        .unwrap();
    assert_eq!(md, "raw");

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("POST /convert_raw HTTP/1.1"));
    assert!(requests[0].contains("name=\"ocr\"\r\n\r\nfalse\r\n"));
}

#[tokio::test]
async fn prefixed_base_keeps_its_path() {
    let (base, server) = serve(vec![ok("text/markdown", "ok"), ok("application/pdf", "%PDF-1.4")]).await;
    let gw = gateway(&format!("{base}/api/"));

    gw.convert(&sample_pdf(), false, true).await.unwrap();
    gw.fetch_pdf("/download_pdf?path=temp_sessions/a.pdf")
        .await
        .unwrap();

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("POST /api/convert HTTP/1.1"), "got: {}", requests[0]);
    assert!(
        requests[1].starts_with("GET /api/download_pdf?path=temp_sessions/a.pdf HTTP/1.1"),
        "got: {}",
        requests[1]
    );
}

#[tokio::test]
async fn non_utf8_markdown_is_decoded_lossily() {
    let (base, _server) = serve(vec![ok("text/markdown", b"ok \xFF".to_vec())]).await;
    let md = gateway(&base)
        .convert(&sample_pdf(), false, true)
        .await
        .unwrap();
    assert_eq!(md, "ok \u{FFFD}");
}

#[tokio::test]
async fn server_error_is_request_failed() {
    let (base, _server) = serve(vec![status(500, "model crashed")]).await;

    let err = gateway(&base)
        .convert(&sample_pdf(), false, true)
        .await
        .unwrap_err();
    match err {
        DocIntelliError::RequestFailed {
            endpoint,
            status,
            body,
            ..
        } => {
            assert_eq!(endpoint, "/convert");
            assert_eq!(status, 500);
            assert_eq!(body, "model crashed");
        }
        other => panic!("expected RequestFailed, got {other:?}"),
    }
}

// ── DOCX ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn docx_uploads_markdown_as_file() {
    let (base, server) = serve(vec![ok(
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        b"PK\x03\x04docx".to_vec(),
    )])
    .await;

    let bytes = gateway(&base)
        .convert_to_docx("# Notes\n\n$x^2$")
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"PK\x03\x04docx");

    let requests = server.await.unwrap();
    let req = &requests[0];
    assert!(req.starts_with("POST /convert_md_to_docx HTTP/1.1"));
    assert!(req.contains("filename=\"document.md\""));
    assert!(req.contains("# Notes\n\n$x^2$"));
}

// ── History ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn history_decodes_entries_in_service_order() {
    let body = r#"[
        {"session_id":"a","timestamp":"2024-06-01T10:00:00Z","input_pdf":"a.pdf","output_md":"a.md","filename":"a.pdf","ocr":false},
        {"session_id":"b","timestamp":"2024-06-02T10:00:00Z","filename":"notes.md","type":"md_to_docx"}
    ]"#;
    let (base, server) = serve(vec![ok("application/json", body)]).await;

    let entries = gateway(&base).list_history().await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].session_id, "a");
    assert!(entries[0].is_pdf_conversion());
    assert_eq!(entries[1].kind.as_deref(), Some("md_to_docx"));
    assert!(!entries[1].ocr);

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("GET /history HTTP/1.1"));
}

#[tokio::test]
async fn undecodable_history_is_invalid_response() {
    let (base, _server) = serve(vec![ok("application/json", "<html>nope</html>")]).await;
    let err = gateway(&base).list_history().await.unwrap_err();
    assert!(
        matches!(err, DocIntelliError::InvalidResponse { ref endpoint, .. } if endpoint == "/history"),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn get_file_encodes_filename_query() {
    let body = r##"{"filename":"My Paper.pdf","markdown_content":"# Hi","pdf_url":"/files/My%20Paper.pdf"}"##;
    let (base, server) = serve(vec![ok("application/json", body)]).await;

    let file = gateway(&base)
        .fetch_history_file("My Paper.pdf")
        .await
        .unwrap();
    assert_eq!(file.markdown_content, "# Hi");
    assert_eq!(file.pdf_url, "/files/My%20Paper.pdf");

    let requests = server.await.unwrap();
    assert!(
        requests[0].starts_with("GET /get_file?filename=My+Paper.pdf HTTP/1.1"),
        "got: {}",
        requests[0]
    );
}

#[tokio::test]
async fn fetch_pdf_resolves_against_base() {
    let (base, server) = serve(vec![ok("application/pdf", b"%PDF-1.7".to_vec())]).await;

    let bytes = gateway(&base).fetch_pdf("/files/a.pdf").await.unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.7");

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("GET /files/a.pdf HTTP/1.1"));
}

#[tokio::test]
async fn missing_pdf_is_request_failed() {
    let (base, _server) = serve(vec![status(404, "")]).await;
    let err = gateway(&base).fetch_pdf("/files/gone.pdf").await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

// ── Through the app shell ────────────────────────────────────────────────────

fn app(base: &str) -> App {
    let config = ClientConfig::builder()
        .base_url(base)
        .pacing(StepPacing::immediate())
        .build()
        .unwrap();
    App::new(
        config.clone(),
        Arc::new(HttpGateway::new(config).unwrap()),
        Arc::new(MemoryStorage::new()),
    )
}

#[tokio::test]
async fn app_converts_over_http() {
    let (base, server) = serve(vec![ok("text/markdown", "# Converted\n\n$x$\n")]).await;
    let mut app = app(&base);

    app.select_file(sample_pdf());
    let md = app
        .process(&docintelli::NoopObserver)
        .await
        .unwrap()
        .to_string();
    assert_eq!(md, "# Converted\n\n$x$\n");
    assert!(app.rendered().html.contains("<h1>Converted</h1>"));
    assert!(app.conversion().steps().all_done());

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("POST /convert HTTP/1.1"));
}

#[tokio::test]
async fn app_opens_history_item_over_http() {
    let file = r##"{"filename":"a.pdf","markdown_content":"# Stored","pdf_url":"/files/a.pdf"}"##;
    let (base, server) = serve(vec![
        ok("application/json", file),
        ok("application/pdf", b"%PDF-1.5 stored".to_vec()),
    ])
    .await;
    let mut app = app(&base);

    app.load_history_item("a.pdf").await.unwrap();
    let doc = app.display().unwrap();
    assert_eq!(doc.filename, "a.pdf");
    assert_eq!(doc.markdown, Some("# Stored"));
    let url = doc.pdf_url.clone().unwrap();
    let (bytes, mime) = app.registry().resolve(&url).unwrap();
    assert_eq!(&bytes[..], b"%PDF-1.5 stored");
    assert_eq!(mime, "application/pdf");

    let requests = server.await.unwrap();
    assert!(requests[0].starts_with("GET /get_file?filename=a.pdf HTTP/1.1"));
    assert!(requests[1].starts_with("GET /files/a.pdf HTTP/1.1"));
}

#[tokio::test]
async fn app_keeps_previous_document_when_history_load_fails() {
    let (base, _server) = serve(vec![
        ok("text/markdown", "# Upload\n"),
        status(500, "db down"),
    ])
    .await;
    let mut app = app(&base);
    app.select_file(sample_pdf());
    app.process(&docintelli::NoopObserver).await.unwrap();

    assert!(app.load_history_item("a.pdf").await.is_err());
    assert!(app.notice().is_some());
    let doc = app.display().unwrap();
    assert_eq!(doc.filename, "paper.pdf");
    assert_eq!(doc.markdown, Some("# Upload\n"));
}
