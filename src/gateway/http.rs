//! reqwest implementation of [`Backend`].
//!
//! ## Why read conversion results as bytes?
//!
//! `/convert` streams the generated `.md` file back as a file download. The
//! body is read as raw bytes and decoded lossily so a stray non-UTF-8 byte
//! in OCR output degrades to U+FFFD instead of failing the whole conversion.

use super::{convert_path, Backend, DOCX_PATH, GET_FILE_PATH, HISTORY_PATH};
use crate::config::ClientConfig;
use crate::error::DocIntelliError;
use crate::history::{HistoryEntry, HistoryFile};
use crate::input::PdfFile;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info};

/// Filename given to the virtual Markdown upload for DOCX conversion.
pub const DOCX_UPLOAD_NAME: &str = "document.md";

/// HTTP gateway to the conversion service.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    client: Client,
    config: ClientConfig,
}

impl HttpGateway {
    /// Create a gateway with its own connection pool.
    pub fn new(config: ClientConfig) -> Result<Self, DocIntelliError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| DocIntelliError::Internal(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Create a gateway around an existing client (shared pool, custom TLS…).
    pub fn with_client(client: Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> Result<Url, DocIntelliError> {
        self.config.endpoint(path)
    }

    async fn send(
        &self,
        endpoint: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<Response, DocIntelliError> {
        let response = request.send().await.map_err(|source| {
            error!("Network error calling {}: {}", endpoint, source);
            DocIntelliError::Network {
                endpoint: endpoint.to_string(),
                source,
            }
        })?;
        ensure_success(endpoint, response).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        url: Url,
    ) -> Result<T, DocIntelliError> {
        let response = self.send(endpoint, self.client.get(url)).await?;
        let body = read_bytes(endpoint, response).await?;
        serde_json::from_slice(&body).map_err(|e| {
            error!("Undecodable JSON from {}: {}", endpoint, e);
            DocIntelliError::InvalidResponse {
                endpoint: endpoint.to_string(),
                detail: e.to_string(),
            }
        })
    }
}

#[async_trait]
impl Backend for HttpGateway {
    async fn convert(
        &self,
        file: &PdfFile,
        ocr: bool,
        use_ai: bool,
    ) -> Result<String, DocIntelliError> {
        let endpoint = convert_path(use_ai);
        info!(
            "Uploading '{}' ({} bytes) to {} (ocr={})",
            file.name(),
            file.len(),
            endpoint,
            ocr
        );

        let part = Part::bytes(file.bytes().to_vec())
            .file_name(file.name().to_string())
            .mime_str("application/pdf")
            .map_err(|e| DocIntelliError::Internal(format!("multipart: {e}")))?;
        let form = Form::new().part("file", part).text("ocr", ocr.to_string());

        let request = self.client.post(self.url(endpoint)?).multipart(form);
        let response = self.send(endpoint, request).await?;
        let body = read_bytes(endpoint, response).await?;
        debug!("{} returned {} bytes of Markdown", endpoint, body.len());
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn convert_to_docx(&self, markdown: &str) -> Result<Bytes, DocIntelliError> {
        let part = Part::bytes(markdown.as_bytes().to_vec())
            .file_name(DOCX_UPLOAD_NAME)
            .mime_str("text/markdown")
            .map_err(|e| DocIntelliError::Internal(format!("multipart: {e}")))?;
        let form = Form::new().part("file", part);

        let request = self.client.post(self.url(DOCX_PATH)?).multipart(form);
        let response = self.send(DOCX_PATH, request).await?;
        let body = read_bytes(DOCX_PATH, response).await?;
        info!("DOCX generated: {} bytes", body.len());
        Ok(body)
    }

    async fn list_history(&self) -> Result<Vec<HistoryEntry>, DocIntelliError> {
        let url = self.url(HISTORY_PATH)?;
        let entries: Vec<HistoryEntry> = self.get_json(HISTORY_PATH, url).await?;
        debug!("History lists {} entries", entries.len());
        Ok(entries)
    }

    async fn fetch_history_file(&self, filename: &str) -> Result<HistoryFile, DocIntelliError> {
        let mut url = self.url(GET_FILE_PATH)?;
        url.query_pairs_mut().append_pair("filename", filename);
        self.get_json(GET_FILE_PATH, url).await
    }

    async fn fetch_pdf(&self, pdf_url: &str) -> Result<Bytes, DocIntelliError> {
        let url = self.url(pdf_url)?;
        let response = self.send(pdf_url, self.client.get(url)).await?;
        read_bytes(pdf_url, response).await
    }
}

/// Turn a non-2xx response into [`DocIntelliError::RequestFailed`].
async fn ensure_success(endpoint: &str, response: Response) -> Result<Response, DocIntelliError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let status_text = status.canonical_reason().unwrap_or("").to_string();
    let body = response.text().await.unwrap_or_default();
    error!(
        "{} responded {} {}: {}",
        endpoint,
        status.as_u16(),
        status_text,
        body
    );
    Err(DocIntelliError::RequestFailed {
        endpoint: endpoint.to_string(),
        status: status.as_u16(),
        status_text,
        body,
    })
}

async fn read_bytes(endpoint: &str, response: Response) -> Result<Bytes, DocIntelliError> {
    response.bytes().await.map_err(|source| {
        error!("Failed reading body from {}: {}", endpoint, source);
        DocIntelliError::Network {
            endpoint: endpoint.to_string(),
            source,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn builds_with_timeout() {
        let config = ClientConfig::builder()
            .request_timeout(Duration::from_secs(5))
            .build()
            .unwrap();
        let gw = HttpGateway::new(config).unwrap();
        assert_eq!(gw.config().request_timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn resolves_endpoints_against_base() {
        let config = ClientConfig::builder()
            .base_url("http://10.0.0.5:8080")
            .build()
            .unwrap();
        let gw = HttpGateway::new(config).unwrap();
        assert_eq!(
            gw.url("/convert_raw").unwrap().as_str(),
            "http://10.0.0.5:8080/convert_raw"
        );

        let prefixed = ClientConfig::builder()
            .base_url("http://10.0.0.5:8080/docintelli")
            .build()
            .unwrap();
        let gw = HttpGateway::new(prefixed).unwrap();
        assert_eq!(
            gw.url("/convert").unwrap().as_str(),
            "http://10.0.0.5:8080/docintelli/convert"
        );
        assert_eq!(
            gw.url("/download_pdf?path=temp_sessions/x.pdf").unwrap().as_str(),
            "http://10.0.0.5:8080/docintelli/download_pdf?path=temp_sessions/x.pdf"
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_network_error() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ClientConfig::builder()
            .base_url(format!("http://127.0.0.1:{port}"))
            .request_timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let gw = HttpGateway::new(config).unwrap();
        let err = gw.list_history().await.unwrap_err();
        assert!(
            matches!(err, DocIntelliError::Network { .. }),
            "got: {err:?}"
        );
    }
}
