use async_trait::async_trait;
use reqwest::{multipart, Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use super::types::{
    AskRequest, DocumentSummary, Metric, MetricInput, QaInteraction, UploadResponse,
    ValidationRequest,
};
use super::EsgApi;
use crate::config::{RequestConfig, ServiceConfig};
use crate::error::{ApiError, ApiResult};

/// Client for the ESG analysis service
#[derive(Clone)]
pub struct EsgClient {
    client: Client,
    base_url: Url,
    request_config: RequestConfig,
}

impl EsgClient {
    /// Create a new service client
    pub fn new(config: &ServiceConfig, request_config: RequestConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(request_config.timeout_ms))
            .build()
            .map_err(ApiError::Http)?;

        let base_url = Url::parse(&config.base_url).map_err(|e| ApiError::InvalidResponse {
            message: format!("Invalid base URL '{}': {}", config.base_url, e),
        })?;

        Ok(Self {
            client,
            base_url,
            request_config,
        })
    }

    /// Get the base URL (for testing)
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Build an endpoint URL; each segment is percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> ApiResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidResponse {
                message: format!("Base URL cannot carry a path: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, segments: &[&str]) -> ApiResult<RequestBuilder> {
        Ok(self.client.request(method, self.endpoint(segments)?))
    }

    /// Send a request and turn transport failures and non-2xx statuses into errors.
    async fn send(&self, call: &'static str, builder: RequestBuilder) -> ApiResult<Response> {
        let start = Instant::now();

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                ApiError::Timeout {
                    timeout_ms: self.request_config.timeout_ms,
                }
            } else {
                ApiError::Http(e)
            }
        });

        let latency = start.elapsed();
        let response = match response {
            Ok(r) => r,
            Err(e) => {
                error!(
                    call,
                    error = %e,
                    latency_ms = latency.as_millis(),
                    "Service call failed"
                );
                return Err(e);
            }
        };

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            error!(
                call,
                status = status.as_u16(),
                latency_ms = latency.as_millis(),
                "Service call returned error status"
            );
            return Err(ApiError::Api {
                status: status.as_u16(),
                message: error_body,
            });
        }

        debug!(
            call,
            status = status.as_u16(),
            latency_ms = latency.as_millis(),
            "Service call succeeded"
        );
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(call: &'static str, response: Response) -> ApiResult<T> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse {
                message: format!("Failed to parse {} response: {}", call, e),
            })
    }
}

#[async_trait]
impl EsgApi for EsgClient {
    async fn upload_document(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> ApiResult<UploadResponse> {
        info!(file_name, size = bytes.len(), "Uploading document");

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(mime_type)
            .map_err(ApiError::Http)?;
        let form = multipart::Form::new().part("file", part);

        let builder = self
            .request(Method::POST, &["documents", "upload"])?
            .multipart(form);
        let response = self.send("upload", builder).await?;
        let upload: UploadResponse = Self::read_json("upload", response).await?;

        info!(document_id = %upload.document_id, "Document uploaded");
        Ok(upload)
    }

    async fn list_documents(&self) -> ApiResult<Vec<DocumentSummary>> {
        let builder = self.request(Method::GET, &["documents", "list"])?;
        let response = self.send("list_documents", builder).await?;
        Self::read_json("list_documents", response).await
    }

    async fn list_metrics(&self, document_id: &str) -> ApiResult<Vec<Metric>> {
        let builder = self.request(Method::GET, &["metrics", document_id])?;
        let response = self.send("list_metrics", builder).await?;
        let metrics: Vec<Metric> = Self::read_json("list_metrics", response).await?;

        debug!(document_id, count = metrics.len(), "Metrics fetched");
        Ok(metrics)
    }

    async fn extract_metrics(&self, document_id: &str) -> ApiResult<()> {
        info!(document_id, "Requesting metric extraction");

        let builder = self.request(Method::POST, &["metrics", "extract", document_id])?;
        self.send("extract_metrics", builder).await?;
        Ok(())
    }

    async fn create_metric(&self, document_id: &str, input: &MetricInput) -> ApiResult<Metric> {
        let builder = self
            .request(Method::POST, &["metrics", document_id])?
            .json(input);
        let response = self.send("create_metric", builder).await?;
        Self::read_json("create_metric", response).await
    }

    async fn update_metric(&self, metric_id: &str, input: &MetricInput) -> ApiResult<Metric> {
        let builder = self.request(Method::PUT, &["metrics", metric_id])?.json(input);
        let response = self.send("update_metric", builder).await?;
        Self::read_json("update_metric", response).await
    }

    async fn qa_history(&self, document_id: &str) -> ApiResult<Vec<QaInteraction>> {
        let builder = self.request(Method::GET, &["qa", "history", document_id])?;
        let response = self.send("qa_history", builder).await?;
        let raw: Value = Self::read_json("qa_history", response).await?;
        let history = QaInteraction::list_from_response(&raw)?;

        debug!(document_id, count = history.len(), "History fetched");
        Ok(history)
    }

    async fn ask(&self, request: &AskRequest) -> ApiResult<QaInteraction> {
        info!(document_id = %request.document_id, "Asking question");

        let builder = self.request(Method::POST, &["qa", "ask"])?.json(request);
        let response = self.send("ask", builder).await?;
        let raw: Value = Self::read_json("ask", response).await?;
        QaInteraction::from_response(&raw)
    }

    async fn validate(&self, request: &ValidationRequest) -> ApiResult<()> {
        let builder = self.request(Method::POST, &["qa", "validate"])?.json(request);
        self.send("validate", builder).await?;

        info!(
            interaction_id = %request.interaction_id,
            is_valid = request.is_valid,
            "Validation recorded"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> EsgClient {
        let config = ServiceConfig::new(base_url).unwrap();
        EsgClient::new(&config, RequestConfig::default()).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client("http://localhost:8000");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let client = client("http://localhost:8000");
        let url = client.endpoint(&["metrics", "doc 1/2"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/metrics/doc%201%2F2");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let client = client("http://localhost:8000/api");
        let url = client.endpoint(&["qa", "ask"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/qa/ask");
    }
}
