//! Page-level controller.
//!
//! Owns the active view and the current document id, the only state shared
//! between panels. Without a document only the upload panel is reachable;
//! with one, a tab strip switches between the three views.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::{debug, info};

use crate::api::EsgApi;
use crate::error::{PanelError, PanelResult};
use crate::panels::{MetricsPanel, QaPanel, UploadPanel};

/// Named views of the tab strip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Upload,
    Qa,
    Metrics,
}

/// What is actually rendered, after document gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    /// No document yet: the upload panel alone, whatever the active view.
    Upload,
    /// Upload tab with a document loaded: offer to clear it.
    ClearDocument,
    Qa,
    Metrics,
}

impl View {
    /// All views in tab order
    pub const ALL: [View; 3] = [View::Upload, View::Qa, View::Metrics];

    /// Tab caption
    pub fn title(self) -> &'static str {
        match self {
            View::Upload => "Document Analysis",
            View::Qa => "ESG Reports",
            View::Metrics => "ESG Performance Dashboard",
        }
    }

    /// Short name used in commands
    pub fn as_str(self) -> &'static str {
        match self {
            View::Upload => "upload",
            View::Qa => "qa",
            View::Metrics => "metrics",
        }
    }
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for View {
    type Err = PanelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upload" | "document" => Ok(View::Upload),
            "qa" | "questions" => Ok(View::Qa),
            "metrics" | "dashboard" => Ok(View::Metrics),
            other => Err(PanelError::Validation {
                field: "view".to_string(),
                reason: format!("Unknown view '{}' (expected upload, qa or metrics)", other),
            }),
        }
    }
}

/// Page state machine: `upload -> analyze -> clear -> upload`.
pub struct PageController {
    active: View,
    document_id: Option<String>,
    upload: UploadPanel,
    qa: QaPanel,
    metrics: MetricsPanel,
}

impl PageController {
    /// Start with no document and the upload view active
    pub fn new(api: Arc<dyn EsgApi>) -> Self {
        Self {
            active: View::Upload,
            document_id: None,
            upload: UploadPanel::new(api.clone()),
            qa: QaPanel::new(api.clone()),
            metrics: MetricsPanel::new(api),
        }
    }

    /// Selected tab
    pub fn active_view(&self) -> View {
        self.active
    }

    /// Current document, if any
    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    /// What should be rendered now
    pub fn screen(&self) -> Screen {
        match (&self.document_id, self.active) {
            (None, _) => Screen::Upload,
            (Some(_), View::Upload) => Screen::ClearDocument,
            (Some(_), View::Qa) => Screen::Qa,
            (Some(_), View::Metrics) => Screen::Metrics,
        }
    }

    /// Upload panel handle
    pub fn upload_panel(&self) -> &UploadPanel {
        &self.upload
    }

    /// Question answering panel handle
    pub fn qa_panel(&self) -> &QaPanel {
        &self.qa
    }

    /// Metrics panel handle
    pub fn metrics_panel(&self) -> &MetricsPanel {
        &self.metrics
    }

    /// Upload a file from the upload screen; on success switch to Q&A.
    pub async fn upload(&mut self, paths: &[PathBuf]) -> PanelResult<Option<String>> {
        if self.document_id.is_some() {
            return Err(PanelError::Validation {
                field: "document".to_string(),
                reason: "Clear the current document before uploading another".to_string(),
            });
        }

        let document_id = self.upload.upload(paths).await?;
        if let Some(id) = &document_id {
            self.on_upload_success(id.clone()).await;
        }
        Ok(document_id)
    }

    /// Adopt a freshly uploaded document and show its Q&A view.
    pub async fn on_upload_success(&mut self, document_id: String) {
        info!(document_id = %document_id, "Document ready");
        self.upload.reset().await;
        self.document_id = Some(document_id);
        self.active = View::Qa;
        self.enter(View::Qa).await;
    }

    /// Switch to an existing document (e.g. from the document list).
    pub async fn open_document(&mut self, document_id: impl Into<String>) {
        self.leave(self.active).await;
        self.on_upload_success(document_id.into()).await;
    }

    /// Select a tab. Requires a document.
    pub async fn select_tab(&mut self, view: View) -> PanelResult<()> {
        if self.document_id.is_none() {
            return Err(PanelError::NoDocument);
        }
        if view == self.active {
            return Ok(());
        }

        debug!(from = %self.active, to = %view, "Switching view");
        self.leave(self.active).await;
        self.active = view;
        self.enter(view).await;
        Ok(())
    }

    /// Forget the current document and return to the upload screen.
    pub async fn clear_document(&mut self) {
        info!(document_id = ?self.document_id, "Clearing document");
        self.qa.unmount().await;
        self.metrics.unmount().await;
        self.upload.reset().await;
        self.document_id = None;
        self.active = View::Upload;
    }

    async fn enter(&self, view: View) {
        let Some(document_id) = self.document_id.clone() else {
            return;
        };

        // Failures are shown by the panel itself.
        let result = match view {
            View::Upload => Ok(()),
            View::Qa => self.qa.mount(document_id).await,
            View::Metrics => self.metrics.mount(document_id).await,
        };
        if let Err(e) = result {
            debug!(view = %view, error = %e, "Panel mounted with error");
        }
    }

    async fn leave(&self, view: View) {
        match view {
            View::Upload => {}
            View::Qa => self.qa.unmount().await,
            View::Metrics => self.metrics.unmount().await,
        }
    }
}
