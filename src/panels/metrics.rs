use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{request_failed, CancelScope, RequestGeneration};
use crate::api::{EsgApi, Metric, MetricInput};
use crate::error::{PanelError, PanelResult};

/// Dataset label shown on the radar chart.
pub const CHART_LABEL: &str = "ESG Performance";

/// Presentation mode of the metrics view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MetricsView {
    #[default]
    Table,
    Chart,
}

/// What the metrics view shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsState {
    pub document_id: Option<String>,
    pub metrics: Vec<Metric>,
    /// The metric list is being fetched.
    pub loading: bool,
    /// The last fetch failed; the view shows only this message.
    pub load_error: Option<String>,
    pub extracting: bool,
    /// Failure of an extraction or manual edit; metrics stay visible.
    pub action_error: Option<String>,
    pub view: MetricsView,
}

/// One radar axis
#[derive(Debug, Clone, PartialEq)]
pub struct RadarAxis {
    pub category: String,
    /// Goal achievement in percent; `None` when it cannot be computed.
    pub value: Option<f64>,
}

/// Radar chart data: one axis per metric.
///
/// The 0..100 range is only a suggestion; values above 100 extend the
/// scale rather than being clamped.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarChart {
    pub label: &'static str,
    pub axes: Vec<RadarAxis>,
    pub suggested_min: f64,
    pub suggested_max: f64,
}

impl RadarChart {
    /// Build chart data from a metric list
    pub fn from_metrics(metrics: &[Metric]) -> Self {
        let axes = metrics
            .iter()
            .map(|m| {
                let percent = m.achievement_percent();
                RadarAxis {
                    category: m.category.clone(),
                    value: percent.is_finite().then_some(percent),
                }
            })
            .collect();

        Self {
            label: CHART_LABEL,
            axes,
            suggested_min: 0.0,
            suggested_max: 100.0,
        }
    }

    /// Upper bound of the drawn scale: the suggested max or the largest value.
    pub fn scale_max(&self) -> f64 {
        self.axes
            .iter()
            .filter_map(|a| a.value)
            .fold(self.suggested_max, f64::max)
    }
}

struct MetricsInner {
    view: MetricsState,
    scope: CancelScope,
    generation: RequestGeneration,
}

/// ESG metrics view-model
#[derive(Clone)]
pub struct MetricsPanel {
    api: Arc<dyn EsgApi>,
    inner: Arc<RwLock<MetricsInner>>,
}

impl MetricsPanel {
    /// Create an unmounted panel
    pub fn new(api: Arc<dyn EsgApi>) -> Self {
        Self {
            api,
            inner: Arc::new(RwLock::new(MetricsInner {
                view: MetricsState::default(),
                scope: CancelScope::new(),
                generation: RequestGeneration::default(),
            })),
        }
    }

    /// Current view state
    pub async fn snapshot(&self) -> MetricsState {
        self.inner.read().await.view.clone()
    }

    /// Chart data for the metrics currently held.
    pub async fn chart(&self) -> RadarChart {
        RadarChart::from_metrics(&self.inner.read().await.view.metrics)
    }

    /// Show the metrics of `document_id`, abandoning calls for any previous one.
    pub async fn mount(&self, document_id: impl Into<String>) -> PanelResult<()> {
        let document_id = document_id.into();
        {
            let mut inner = self.inner.write().await;
            inner.scope.cancel();
            inner.scope = CancelScope::new();
            inner.view = MetricsState {
                document_id: Some(document_id.clone()),
                loading: true,
                ..MetricsState::default()
            };
        }

        debug!(document_id = %document_id, "Metrics panel mounted");
        self.load_metrics().await
    }

    /// Drop all state and cancel in-flight calls.
    pub async fn unmount(&self) {
        let mut inner = self.inner.write().await;
        inner.scope.cancel();
        inner.scope = CancelScope::new();
        inner.view = MetricsState::default();
    }

    /// Switch between table and chart presentation.
    pub async fn set_view(&self, view: MetricsView) {
        self.inner.write().await.view.view = view;
    }

    /// Re-fetch the metric list. A failure clears the list and sets the load error.
    pub async fn load_metrics(&self) -> PanelResult<()> {
        let (document_id, scope, token) = {
            let mut inner = self.inner.write().await;
            let document_id = inner
                .view
                .document_id
                .clone()
                .ok_or(PanelError::NoDocument)?;
            let token = inner.generation.issue();
            inner.view.loading = true;
            (document_id, inner.scope.clone(), token)
        };

        let result = scope.run(self.api.list_metrics(&document_id)).await;

        let mut inner = self.inner.write().await;
        if scope.is_cancelled() || !inner.generation.is_current(token) {
            debug!(document_id = %document_id, token, "Discarding stale metrics response");
            return Err(PanelError::Superseded);
        }
        inner.view.loading = false;

        match result {
            Ok(metrics) => {
                debug!(document_id = %document_id, count = metrics.len(), "Metrics loaded");
                inner.view.metrics = metrics;
                inner.view.load_error = None;
                Ok(())
            }
            Err(e) => {
                let err = request_failed(e, "Failed to fetch metrics");
                warn!(document_id = %document_id, error = %err, "Metrics fetch failed");
                inner.view.metrics.clear();
                inner.view.load_error = Some(err.user_message());
                Err(err)
            }
        }
    }

    /// Trigger extraction on the service, then refresh the list.
    ///
    /// If extraction fails the metrics already shown stay in place.
    pub async fn extract(&self) -> PanelResult<()> {
        let (document_id, scope) = {
            let mut inner = self.inner.write().await;
            let document_id = inner
                .view
                .document_id
                .clone()
                .ok_or(PanelError::NoDocument)?;
            if inner.view.extracting {
                return Err(PanelError::Busy {
                    operation: "Extraction".to_string(),
                });
            }
            inner.view.extracting = true;
            inner.view.action_error = None;
            (document_id, inner.scope.clone())
        };

        info!(document_id = %document_id, "Extracting metrics");
        let result = scope.run(self.api.extract_metrics(&document_id)).await;

        if let Err(e) = result {
            let mut inner = self.inner.write().await;
            if scope.is_cancelled() {
                return Err(PanelError::Superseded);
            }
            let err = request_failed(e, "Failed to extract metrics");
            warn!(document_id = %document_id, error = %err, "Extraction failed");
            inner.view.extracting = false;
            inner.view.action_error = Some(err.user_message());
            return Err(err);
        }

        let refreshed = self.load_metrics().await;

        let mut inner = self.inner.write().await;
        if !scope.is_cancelled() {
            inner.view.extracting = false;
        }
        refreshed
    }

    /// Add a metric by hand, then refresh the list.
    pub async fn create_metric(&self, input: MetricInput) -> PanelResult<Metric> {
        validate_input(&input)?;
        let (document_id, scope) = self.mounted().await?;

        let created = scope
            .run(self.api.create_metric(&document_id, &input))
            .await
            .map_err(|e| request_failed(e, "Failed to save metric"));

        self.finish_edit(&scope, created).await
    }

    /// Replace a metric's fields, then refresh the list.
    pub async fn update_metric(&self, metric_id: &str, input: MetricInput) -> PanelResult<Metric> {
        validate_input(&input)?;
        let (_, scope) = self.mounted().await?;

        let updated = scope
            .run(self.api.update_metric(metric_id, &input))
            .await
            .map_err(|e| request_failed(e, "Failed to save metric"));

        self.finish_edit(&scope, updated).await
    }

    async fn mounted(&self) -> PanelResult<(String, CancelScope)> {
        let mut inner = self.inner.write().await;
        let document_id = inner
            .view
            .document_id
            .clone()
            .ok_or(PanelError::NoDocument)?;
        inner.view.action_error = None;
        Ok((document_id, inner.scope.clone()))
    }

    async fn finish_edit(
        &self,
        scope: &CancelScope,
        result: PanelResult<Metric>,
    ) -> PanelResult<Metric> {
        if scope.is_cancelled() {
            return Err(PanelError::Superseded);
        }

        match result {
            Ok(metric) => {
                info!(metric_id = %metric.id, category = %metric.category, "Metric saved");
                self.load_metrics().await?;
                Ok(metric)
            }
            Err(err) => {
                self.inner.write().await.view.action_error = Some(err.user_message());
                Err(err)
            }
        }
    }
}

fn validate_input(input: &MetricInput) -> PanelResult<()> {
    if input.category.trim().is_empty() {
        return Err(PanelError::Validation {
            field: "category".to_string(),
            reason: "Category cannot be empty".to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockEsgApi;
    use crate::error::ApiError;
    use pretty_assertions::assert_eq;

    fn metric(id: &str, category: &str, goal: &str, actual: &str, rag: &str) -> Metric {
        Metric {
            id: id.to_string(),
            category: category.to_string(),
            goal: goal.to_string(),
            actual: actual.to_string(),
            rag_status: rag.to_string(),
            extracted_by: "LLM".to_string(),
        }
    }

    #[test]
    fn test_radar_chart_values() {
        let chart = RadarChart::from_metrics(&[
            metric("1", "Emissions", "100%", "50%", "amber"),
            metric("2", "Water", "0", "5", "red"),
            metric("3", "Diversity", "40", "60", "green"),
        ]);

        assert_eq!(chart.label, CHART_LABEL);
        assert_eq!(chart.axes[0].value, Some(50.0));
        assert_eq!(chart.axes[1].value, None);
        assert_eq!(chart.axes[2].value, Some(150.0));
        assert_eq!(chart.suggested_max, 100.0);
        assert_eq!(chart.scale_max(), 150.0);
    }

    #[test]
    fn test_radar_chart_empty() {
        let chart = RadarChart::from_metrics(&[]);
        assert!(chart.axes.is_empty());
        assert_eq!(chart.scale_max(), 100.0);
    }

    #[tokio::test]
    async fn test_mount_loads_metrics() {
        let mut mock = MockEsgApi::new();
        mock.expect_list_metrics()
            .withf(|doc| doc == "doc-1")
            .returning(|_| Ok(vec![metric("1", "Energy", "10", "9", "green")]));

        let panel = MetricsPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();

        let state = panel.snapshot().await;
        assert!(!state.loading);
        assert_eq!(state.metrics.len(), 1);
        assert_eq!(state.view, MetricsView::Table);
    }

    #[tokio::test]
    async fn test_mount_failure_shows_error_only() {
        let mut mock = MockEsgApi::new();
        mock.expect_list_metrics().returning(|_| {
            Err(ApiError::Api {
                status: 500,
                message: "db".to_string(),
            })
        });

        let panel = MetricsPanel::new(Arc::new(mock));
        assert!(panel.mount("doc-1").await.is_err());

        let state = panel.snapshot().await;
        assert!(!state.loading);
        assert!(state.metrics.is_empty());
        assert_eq!(state.load_error.as_deref(), Some("Failed to fetch metrics"));
    }

    #[tokio::test]
    async fn test_extract_refreshes_list() {
        let mut mock = MockEsgApi::new();
        let mut calls = 0;
        mock.expect_list_metrics().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Ok(Vec::new())
            } else {
                Ok(vec![metric("1", "Energy", "10", "9", "green")])
            }
        });
        mock.expect_extract_metrics()
            .withf(|doc| doc == "doc-1")
            .times(1)
            .returning(|_| Ok(()));

        let panel = MetricsPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();
        panel.extract().await.unwrap();

        let state = panel.snapshot().await;
        assert_eq!(state.metrics.len(), 1);
        assert!(!state.extracting);
        assert!(state.action_error.is_none());
    }

    #[tokio::test]
    async fn test_failed_extraction_keeps_metrics() {
        let mut mock = MockEsgApi::new();
        mock.expect_list_metrics()
            .times(1)
            .returning(|_| Ok(vec![metric("1", "Energy", "10", "9", "green")]));
        mock.expect_extract_metrics().returning(|_| {
            Err(ApiError::Api {
                status: 500,
                message: "llm".to_string(),
            })
        });

        let panel = MetricsPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();
        assert!(panel.extract().await.is_err());

        let state = panel.snapshot().await;
        assert_eq!(state.metrics.len(), 1);
        assert!(!state.extracting);
        assert!(state.load_error.is_none());
        assert_eq!(state.action_error.as_deref(), Some("Failed to extract metrics"));
    }

    #[tokio::test]
    async fn test_set_view_switches_mode() {
        let mut mock = MockEsgApi::new();
        mock.expect_list_metrics().returning(|_| Ok(Vec::new()));

        let panel = MetricsPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();
        panel.set_view(MetricsView::Chart).await;
        assert_eq!(panel.snapshot().await.view, MetricsView::Chart);
    }

    #[tokio::test]
    async fn test_create_metric_refreshes() {
        let mut mock = MockEsgApi::new();
        mock.expect_list_metrics().times(2).returning(|_| Ok(Vec::new()));
        mock.expect_create_metric()
            .withf(|doc, input| doc == "doc-1" && input.category == "Waste")
            .times(1)
            .returning(|_, input| {
                Ok(Metric {
                    id: "m-9".to_string(),
                    category: input.category.clone(),
                    goal: input.goal.clone(),
                    actual: input.actual.clone(),
                    rag_status: input.rag_status.clone(),
                    extracted_by: "Manual".to_string(),
                })
            });

        let panel = MetricsPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();
        let created = panel
            .create_metric(MetricInput::new("Waste", "50t", "40t", "green"))
            .await
            .unwrap();
        assert_eq!(created.extracted_by, "Manual");
    }

    #[tokio::test]
    async fn test_create_metric_requires_category() {
        let mut mock = MockEsgApi::new();
        mock.expect_create_metric().never();

        let panel = MetricsPanel::new(Arc::new(mock));
        let err = panel
            .create_metric(MetricInput::new(" ", "1", "1", "red"))
            .await
            .unwrap_err();
        assert!(matches!(err, PanelError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_metric_failure_sets_action_error() {
        let mut mock = MockEsgApi::new();
        mock.expect_list_metrics()
            .times(1)
            .returning(|_| Ok(vec![metric("1", "Energy", "10", "9", "green")]));
        mock.expect_update_metric().returning(|_, _| {
            Err(ApiError::Api {
                status: 404,
                message: "Metric not found".to_string(),
            })
        });

        let panel = MetricsPanel::new(Arc::new(mock));
        panel.mount("doc-1").await.unwrap();
        assert!(panel
            .update_metric("1", MetricInput::new("Energy", "10", "10", "green"))
            .await
            .is_err());

        let state = panel.snapshot().await;
        assert_eq!(state.metrics.len(), 1);
        assert_eq!(state.action_error.as_deref(), Some("Failed to save metric"));
    }
}
