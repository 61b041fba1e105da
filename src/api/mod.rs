//! Analysis service client and wire types.
//!
//! Every panel talks to the service through the [`EsgApi`] trait so the
//! view-models can be exercised without a live server.

mod client;
mod types;


pub use client::EsgClient;
pub use types::*;

use async_trait::async_trait;

use crate::error::ApiResult;

/// Operations offered by the remote analysis service.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EsgApi: Send + Sync {
    /// Upload one document as multipart field `file`.
    async fn upload_document(
        &self,
        file_name: &str,
        mime_type: &str,
        bytes: Vec<u8>,
    ) -> ApiResult<UploadResponse>;

    /// List documents known to the service.
    async fn list_documents(&self) -> ApiResult<Vec<DocumentSummary>>;

    /// Fetch the metrics extracted for a document.
    async fn list_metrics(&self, document_id: &str) -> ApiResult<Vec<Metric>>;

    /// Ask the service to (re-)extract metrics; the body is ignored.
    async fn extract_metrics(&self, document_id: &str) -> ApiResult<()>;

    /// Manually add a metric to a document.
    async fn create_metric(&self, document_id: &str, input: &MetricInput) -> ApiResult<Metric>;

    /// Replace the fields of an existing metric.
    async fn update_metric(&self, metric_id: &str, input: &MetricInput) -> ApiResult<Metric>;

    /// Full question/answer history for a document, oldest first.
    async fn qa_history(&self, document_id: &str) -> ApiResult<Vec<QaInteraction>>;

    /// Ask a question; the response is normalized into an interaction.
    async fn ask(&self, request: &AskRequest) -> ApiResult<QaInteraction>;

    /// Record a user verdict on an answer; the body is ignored.
    async fn validate(&self, request: &ValidationRequest) -> ApiResult<()>;
}
