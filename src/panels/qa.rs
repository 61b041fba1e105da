use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{request_failed, CancelScope, RequestGeneration};
use crate::api::{AskRequest, EsgApi, QaInteraction, ValidationRequest, ValidationSync};
use crate::error::{PanelError, PanelResult};

/// What the question answering view shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QaState {
    /// Document the history belongs to; `None` while unmounted.
    pub document_id: Option<String>,
    /// Interactions in the order they were created.
    pub history: Vec<QaInteraction>,
    pub loading_history: bool,
    /// A question is in flight; further submits are refused.
    pub asking: bool,
    pub error: Option<String>,
}

struct QaInner {
    view: QaState,
    scope: CancelScope,
    history_generation: RequestGeneration,
    /// Latest validation token per interaction id.
    validations: HashMap<String, u64>,
    validation_seq: u64,
    /// Last verdict the service accepted, per interaction validated since load.
    acknowledged: HashMap<String, Option<bool>>,
}

/// Question answering view-model
#[derive(Clone)]
pub struct QaPanel {
    api: Arc<dyn EsgApi>,
    inner: Arc<RwLock<QaInner>>,
}

impl QaPanel {
    /// Create an unmounted panel
    pub fn new(api: Arc<dyn EsgApi>) -> Self {
        Self {
            api,
            inner: Arc::new(RwLock::new(QaInner {
                view: QaState::default(),
                scope: CancelScope::new(),
                history_generation: RequestGeneration::default(),
                validations: HashMap::new(),
                validation_seq: 0,
                acknowledged: HashMap::new(),
            })),
        }
    }

    /// Current view state
    pub async fn snapshot(&self) -> QaState {
        self.inner.read().await.view.clone()
    }

    /// Show the history of `document_id`, discarding everything held for a
    /// previous document and abandoning its in-flight calls.
    pub async fn mount(&self, document_id: impl Into<String>) -> PanelResult<()> {
        let document_id = document_id.into();
        {
            let mut inner = self.inner.write().await;
            inner.scope.cancel();
            inner.scope = CancelScope::new();
            inner.validations.clear();
            inner.acknowledged.clear();
            inner.view = QaState {
                document_id: Some(document_id.clone()),
                ..QaState::default()
            };
        }

        debug!(document_id = %document_id, "QA panel mounted");
        self.load_history().await
    }

    /// Drop all state and cancel in-flight calls.
    pub async fn unmount(&self) {
        let mut inner = self.inner.write().await;
        inner.scope.cancel();
        inner.scope = CancelScope::new();
        inner.validations.clear();
        inner.acknowledged.clear();
        inner.view = QaState::default();
    }

    /// Replace the history with the service's full listing.
    ///
    /// A failure leaves the history empty. Responses overtaken by a newer
    /// load or a re-mount are discarded.
    pub async fn load_history(&self) -> PanelResult<()> {
        let (document_id, scope, token) = {
            let mut inner = self.inner.write().await;
            let document_id = inner
                .view
                .document_id
                .clone()
                .ok_or(PanelError::NoDocument)?;
            let token = inner.history_generation.issue();
            inner.view.loading_history = true;
            (document_id, inner.scope.clone(), token)
        };

        let result = scope.run(self.api.qa_history(&document_id)).await;

        let mut inner = self.inner.write().await;
        if scope.is_cancelled() || !inner.history_generation.is_current(token) {
            debug!(document_id = %document_id, token, "Discarding stale history response");
            return Err(PanelError::Superseded);
        }
        inner.view.loading_history = false;

        match result {
            Ok(history) => {
                debug!(document_id = %document_id, count = history.len(), "History loaded");
                inner.view.history = history;
                inner.acknowledged.clear();
                Ok(())
            }
            Err(e) => {
                let err = request_failed(e, "Failed to fetch history");
                warn!(document_id = %document_id, error = %err, "History fetch failed");
                inner.view.history.clear();
                inner.view.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Ask a question about the mounted document and append the answer.
    ///
    /// Blank questions are rejected without a request.
    pub async fn submit(&self, question: &str) -> PanelResult<QaInteraction> {
        let question = question.trim();
        if question.is_empty() {
            return Err(PanelError::Validation {
                field: "question".to_string(),
                reason: "Question cannot be empty".to_string(),
            });
        }

        let (document_id, scope) = {
            let mut inner = self.inner.write().await;
            let document_id = inner
                .view
                .document_id
                .clone()
                .ok_or(PanelError::NoDocument)?;
            if inner.view.asking {
                return Err(PanelError::Busy {
                    operation: "Question".to_string(),
                });
            }
            inner.view.asking = true;
            inner.view.error = None;
            (document_id, inner.scope.clone())
        };

        let request = AskRequest::new(&document_id, question);
        let result = scope.run(self.api.ask(&request)).await;

        let mut inner = self.inner.write().await;
        if scope.is_cancelled() || inner.view.document_id.as_deref() != Some(document_id.as_str())
        {
            return Err(PanelError::Superseded);
        }
        inner.view.asking = false;

        match result {
            Ok(interaction) => {
                info!(
                    document_id = %document_id,
                    interaction_id = %interaction.id,
                    citations = interaction.citations.len(),
                    "Answer received"
                );
                inner.view.history.push(interaction.clone());
                Ok(interaction)
            }
            Err(e) => {
                let err = request_failed(e, "Failed to get answer");
                warn!(document_id = %document_id, error = %err, "Question failed");
                inner.view.error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Mark an answer correct or incorrect.
    ///
    /// The verdict is shown immediately as pending, then confirmed when the
    /// service acknowledges it. On failure the interaction falls back to the
    /// last verdict the service accepted and is flagged as failed.
    /// Acknowledgments overtaken by a newer verdict on the same interaction
    /// do not change what is displayed.
    pub async fn validate(&self, interaction_id: &str, is_valid: bool) -> PanelResult<()> {
        let (scope, token) = {
            let mut guard = self.inner.write().await;
            let inner = &mut *guard;

            let interaction = inner
                .view
                .history
                .iter_mut()
                .find(|i| i.id == interaction_id)
                .ok_or_else(|| PanelError::InteractionNotFound {
                    interaction_id: interaction_id.to_string(),
                })?;

            // Nothing in flight: the displayed verdict is the service's.
            if !inner.validations.contains_key(interaction_id) {
                inner
                    .acknowledged
                    .insert(interaction_id.to_string(), interaction.validated);
            }
            interaction.validated = Some(is_valid);
            interaction.sync = ValidationSync::Pending;

            inner.validation_seq += 1;
            let token = inner.validation_seq;
            inner.validations.insert(interaction_id.to_string(), token);
            (inner.scope.clone(), token)
        };

        let request = ValidationRequest::new(interaction_id, is_valid);
        let result = scope.run(self.api.validate(&request)).await;

        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if scope.is_cancelled() {
            return Err(PanelError::Superseded);
        }
        if result.is_ok() {
            inner
                .acknowledged
                .insert(interaction_id.to_string(), Some(is_valid));
        }
        if inner.validations.get(interaction_id) != Some(&token) {
            debug!(interaction_id, token, "Ignoring overtaken validation");
            return Err(PanelError::Superseded);
        }
        inner.validations.remove(interaction_id);

        let interaction = inner
            .view
            .history
            .iter_mut()
            .find(|i| i.id == interaction_id)
            .ok_or(PanelError::Superseded)?;

        match result {
            Ok(()) => {
                interaction.sync = ValidationSync::Synced;
                Ok(())
            }
            Err(e) => {
                let err = request_failed(e, "Failed to validate answer");
                let accepted = inner
                    .acknowledged
                    .get(interaction_id)
                    .copied()
                    .flatten();
                warn!(interaction_id, error = %err, "Validation not recorded, rolling back");
                interaction.validated = accepted;
                interaction.sync = ValidationSync::Failed;
                inner.view.error = Some(err.user_message());
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Citation, MockEsgApi};
    use crate::error::ApiError;
    use pretty_assertions::assert_eq;

    fn interaction(id: &str, question: &str) -> QaInteraction {
        QaInteraction {
            id: id.to_string(),
            question: question.to_string(),
            answer: format!("answer to {}", question),
            citations: Vec::new(),
            validated: None,
            created_at: None,
            sync: ValidationSync::Synced,
        }
    }

    fn mock_with_history(history: Vec<QaInteraction>) -> MockEsgApi {
        let mut mock = MockEsgApi::new();
        mock.expect_qa_history()
            .returning(move |_| Ok(history.clone()));
        mock
    }

    #[tokio::test]
    async fn test_mount_loads_history() {
        let panel = QaPanel::new(Arc::new(mock_with_history(vec![
            interaction("1", "a"),
            interaction("2", "b"),
        ])));

        panel.mount("doc-1").await.unwrap();
        let state = panel.snapshot().await;
        assert_eq!(state.document_id.as_deref(), Some("doc-1"));
        assert_eq!(state.history.len(), 2);
        assert!(!state.loading_history);
    }

    #[tokio::test]
    async fn test_mount_failure_leaves_history_empty() {
        let mut mock = MockEsgApi::new();
        mock.expect_qa_history().returning(|_| {
            Err(ApiError::Api {
                status: 404,
                message: "missing".to_string(),
            })
        });

        let panel = QaPanel::new(Arc::new(mock));
        assert!(panel.mount("doc-1").await.is_err());

        let state = panel.snapshot().await;
        assert!(state.history.is_empty());
        assert_eq!(state.error.as_deref(), Some("Failed to fetch history"));
    }

    #[tokio::test]
    async fn test_blank_question_sends_nothing() {
        let mut mock = mock_with_history(Vec::new());
        mock.expect_ask().never();

        let panel = QaPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();

        let err = panel.submit("   \n\t ").await.unwrap_err();
        assert!(matches!(err, PanelError::Validation { .. }));
        assert!(panel.snapshot().await.history.is_empty());
    }

    #[tokio::test]
    async fn test_submit_without_document_is_rejected() {
        let mut mock = MockEsgApi::new();
        mock.expect_ask().never();

        let panel = QaPanel::new(Arc::new(mock));
        let err = panel.submit("What are the targets?").await.unwrap_err();
        assert!(matches!(err, PanelError::NoDocument));
    }

    #[tokio::test]
    async fn test_submit_appends_in_order_without_dedup() {
        let mut mock = mock_with_history(vec![interaction("1", "first")]);
        let mut seq = 1;
        mock.expect_ask()
            .withf(|req| req.document_id == "doc-1" && req.question == "Scope 2?")
            .times(2)
            .returning(move |req| {
                seq += 1;
                Ok(interaction(&seq.to_string(), &req.question))
            });

        let panel = QaPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();
        panel.submit("  Scope 2?  ").await.unwrap();
        panel.submit("Scope 2?").await.unwrap();

        let state = panel.snapshot().await;
        let ids: Vec<&str> = state.history.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert!(!state.asking);
    }

    #[tokio::test]
    async fn test_submit_failure_keeps_history() {
        let mut mock = mock_with_history(vec![interaction("1", "first")]);
        mock.expect_ask().returning(|_| {
            Err(ApiError::Api {
                status: 500,
                message: "llm down".to_string(),
            })
        });

        let panel = QaPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();
        assert!(panel.submit("anything").await.is_err());

        let state = panel.snapshot().await;
        assert_eq!(state.history.len(), 1);
        assert_eq!(state.error.as_deref(), Some("Failed to get answer"));
        assert!(!state.asking);
    }

    #[tokio::test]
    async fn test_validate_last_verdict_wins_and_touches_one_interaction() {
        let mut mock = mock_with_history(vec![
            interaction("1", "a"),
            interaction("2", "b"),
        ]);
        mock.expect_validate().times(2).returning(|_| Ok(()));

        let panel = QaPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();
        let before = panel.snapshot().await.history[1].clone();

        panel.validate("1", true).await.unwrap();
        panel.validate("1", false).await.unwrap();

        let state = panel.snapshot().await;
        assert_eq!(state.history[0].validated, Some(false));
        assert_eq!(state.history[0].sync, ValidationSync::Synced);
        assert_eq!(state.history[1], before);
    }

    #[tokio::test]
    async fn test_validate_failure_rolls_back() {
        let mut mock = mock_with_history(vec![interaction("1", "a")]);
        mock.expect_validate()
            .returning(|_| Err(ApiError::Timeout { timeout_ms: 100 }));

        let panel = QaPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();

        assert!(panel.validate("1", true).await.is_err());
        let state = panel.snapshot().await;
        assert_eq!(state.history[0].validated, None);
        assert_eq!(state.history[0].sync, ValidationSync::Failed);
        assert_eq!(state.error.as_deref(), Some("Request timeout after 100ms"));
    }

    #[tokio::test]
    async fn test_validate_failure_restores_accepted_verdict() {
        let mut mock = mock_with_history(vec![interaction("1", "a")]);
        let mut seq = mockall::Sequence::new();
        mock.expect_validate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        mock.expect_validate()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| {
                Err(ApiError::Api {
                    status: 500,
                    message: "db locked".to_string(),
                })
            });

        let panel = QaPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();

        panel.validate("1", true).await.unwrap();
        assert!(panel.validate("1", false).await.is_err());

        let state = panel.snapshot().await;
        assert_eq!(state.history[0].validated, Some(true));
        assert_eq!(state.history[0].sync, ValidationSync::Failed);
    }

    #[tokio::test]
    async fn test_validate_unknown_interaction() {
        let mut mock = mock_with_history(Vec::new());
        mock.expect_validate().never();

        let panel = QaPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();
        let err = panel.validate("nope", true).await.unwrap_err();
        assert!(matches!(err, PanelError::InteractionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unmount_discards_state() {
        let mut with_citation = interaction("1", "a");
        with_citation.citations.push(Citation {
            text: Some("page 3".to_string()),
            chunk_index: Some(3),
        });

        let panel = QaPanel::new(Arc::new(mock_with_history(vec![with_citation])));
        panel.mount("doc-1").await.unwrap();
        assert_eq!(panel.snapshot().await.history[0].citations.len(), 1);

        panel.unmount().await;
        assert_eq!(panel.snapshot().await, QaState::default());
    }
}
