use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{request_failed, CancelScope};
use crate::api::{EsgApi, DOCX_MIME, PDF_MIME};
use crate::error::{PanelError, PanelResult};

/// What the upload view shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UploadState {
    /// A request is in flight.
    pub uploading: bool,
    /// Inline error from the last selection or upload.
    pub error: Option<String>,
    /// Name of the file most recently accepted for upload.
    pub file_name: Option<String>,
}

/// A file that passed the type and count filter
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub mime_type: &'static str,
}

impl SelectedFile {
    /// Accept a single PDF or DOCX path.
    pub fn from_path(path: &Path) -> PanelResult<Self> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let mime_type = match extension.as_str() {
            "pdf" => PDF_MIME,
            "docx" => DOCX_MIME,
            _ => return Err(PanelError::UnsupportedFile { file_name }),
        };

        Ok(Self {
            path: path.to_path_buf(),
            file_name,
            mime_type,
        })
    }
}

/// Apply the selection filter: no paths selects nothing, more than one is refused.
pub fn accept_selection(paths: &[PathBuf]) -> PanelResult<Option<SelectedFile>> {
    match paths {
        [] => Ok(None),
        [path] => SelectedFile::from_path(path).map(Some),
        _ => Err(PanelError::TooManyFiles { count: paths.len() }),
    }
}

struct UploadInner {
    view: UploadState,
    scope: CancelScope,
}

/// Document upload view-model
#[derive(Clone)]
pub struct UploadPanel {
    api: Arc<dyn EsgApi>,
    inner: Arc<RwLock<UploadInner>>,
}

impl UploadPanel {
    /// Create an idle upload panel
    pub fn new(api: Arc<dyn EsgApi>) -> Self {
        Self {
            api,
            inner: Arc::new(RwLock::new(UploadInner {
                view: UploadState::default(),
                scope: CancelScope::new(),
            })),
        }
    }

    /// Current view state
    pub async fn snapshot(&self) -> UploadState {
        self.inner.read().await.view.clone()
    }

    /// Upload the selected file and return the new document id.
    ///
    /// Returns `Ok(None)` without any request when nothing was selected.
    pub async fn upload(&self, paths: &[PathBuf]) -> PanelResult<Option<String>> {
        let file = match accept_selection(paths) {
            Ok(Some(file)) => file,
            Ok(None) => {
                debug!("Upload skipped, no file selected");
                return Ok(None);
            }
            Err(e) => {
                let mut inner = self.inner.write().await;
                if inner.view.uploading {
                    return Err(PanelError::Busy {
                        operation: "Upload".to_string(),
                    });
                }
                inner.view.error = Some(e.user_message());
                return Err(e);
            }
        };

        let scope = {
            let mut inner = self.inner.write().await;
            if inner.view.uploading {
                return Err(PanelError::Busy {
                    operation: "Upload".to_string(),
                });
            }
            inner.view.uploading = true;
            inner.view.error = None;
            inner.view.file_name = Some(file.file_name.clone());
            inner.scope.clone()
        };

        let result = self.send(&scope, &file).await;

        let mut inner = self.inner.write().await;
        if scope.is_cancelled() {
            return Err(PanelError::Superseded);
        }
        inner.view.uploading = false;

        match result {
            Ok(document_id) => {
                inner.view.error = None;
                info!(document_id = %document_id, file_name = %file.file_name, "Upload complete");
                Ok(Some(document_id))
            }
            Err(e) => {
                warn!(file_name = %file.file_name, error = %e, "Upload failed");
                inner.view.error = Some(e.user_message());
                Err(e)
            }
        }
    }

    async fn send(&self, scope: &CancelScope, file: &SelectedFile) -> PanelResult<String> {
        let bytes = tokio::fs::read(&file.path)
            .await
            .map_err(|source| PanelError::Io {
                path: file.path.clone(),
                source,
            })?;

        let response = scope
            .run(
                self.api
                    .upload_document(&file.file_name, file.mime_type, bytes),
            )
            .await
            .map_err(|e| request_failed(e, "Upload failed"))?;

        Ok(response.document_id)
    }

    /// Abandon any in-flight upload and return to the idle state.
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.scope.cancel();
        inner.scope = CancelScope::new();
        inner.view = UploadState::default();
    }
}
