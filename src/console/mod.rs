//! Interactive line-oriented console.
//!
//! Each input line is one [`Command`]; after every command the console
//! prints any message followed by the current screen.

mod command;

pub use command::*;

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use crate::api::EsgApi;
use crate::error::{PanelError, PanelResult};
use crate::page::{PageController, Screen};
use crate::render;

/// Whether the loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line
    Continue,
    /// Stop the session
    Quit,
}

/// Console session around one page
pub struct Console {
    api: Arc<dyn EsgApi>,
    page: PageController,
}

impl Console {
    /// Create a console with a fresh page
    pub fn new(api: Arc<dyn EsgApi>) -> Self {
        Self {
            page: PageController::new(api.clone()),
            api,
        }
    }

    /// The page being driven
    pub fn page(&self) -> &PageController {
        &self.page
    }

    /// Mutable access, e.g. to open a document before the loop starts
    pub fn page_mut(&mut self) -> &mut PageController {
        &mut self.page
    }

    /// Read commands until EOF or `quit`.
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        output.write_all(self.render().await.as_bytes()).await?;
        output.write_all(b"> ").await?;
        output.flush().await?;

        while let Some(line) = lines.next_line().await? {
            debug!(command = %line.trim(), "Received command");

            let (flow, message) = match Command::parse(&line) {
                Ok(command) => self.execute(command).await,
                Err(e) => (Flow::Continue, Some(e.user_message())),
            };

            if let Some(message) = message {
                output.write_all(message.as_bytes()).await?;
                output.write_all(b"\n").await?;
            }
            if flow == Flow::Quit {
                break;
            }

            output.write_all(self.render().await.as_bytes()).await?;
            output.write_all(b"> ").await?;
            output.flush().await?;
        }

        info!("Console session ended");
        output.flush().await
    }

    /// Execute one command. Returns the flow and an optional message to print.
    pub async fn execute(&mut self, command: Command) -> (Flow, Option<String>) {
        match self.dispatch(command).await {
            Ok(result) => result,
            // Panel state already carries the message for these.
            Err(PanelError::Request { .. }) => (Flow::Continue, None),
            Err(e) if e.is_superseded() => (Flow::Continue, None),
            Err(e) => (Flow::Continue, Some(e.user_message())),
        }
    }

    async fn dispatch(&mut self, command: Command) -> PanelResult<(Flow, Option<String>)> {
        let message = match command {
            Command::Show => None,
            Command::Help => Some(HELP.to_string()),
            Command::Quit => return Ok((Flow::Quit, None)),
            Command::Upload(paths) => {
                if paths.is_empty() {
                    Some("No file selected.".to_string())
                } else {
                    self.page.upload(&paths).await?;
                    None
                }
            }
            Command::Tab(view) => {
                self.page.select_tab(view).await?;
                None
            }
            Command::Clear => {
                self.page.clear_document().await;
                None
            }
            Command::Documents => {
                let documents = self
                    .api
                    .list_documents()
                    .await
                    .map_err(|e| PanelError::Request {
                        message: format!("Failed to list documents: {}", e),
                        source: e,
                    });
                match documents {
                    Ok(documents) => Some(render::render_documents(&documents)),
                    Err(e) => Some(e.user_message()),
                }
            }
            Command::Open(document_id) => {
                self.page.open_document(document_id).await;
                None
            }
            Command::Ask(question) => {
                self.page.qa_panel().submit(&question).await?;
                None
            }
            Command::Validate { target, is_valid } => {
                let interaction_id = self.resolve(target).await?;
                self.page.qa_panel().validate(&interaction_id, is_valid).await?;
                None
            }
            Command::Refresh => {
                match self.page.screen() {
                    Screen::Qa => self.page.qa_panel().load_history().await?,
                    Screen::Metrics => self.page.metrics_panel().load_metrics().await?,
                    Screen::Upload | Screen::ClearDocument => {}
                }
                None
            }
            Command::Extract => {
                self.require(Screen::Metrics)?;
                self.page.metrics_panel().extract().await?;
                None
            }
            Command::SetView(view) => {
                self.require(Screen::Metrics)?;
                self.page.metrics_panel().set_view(view).await;
                None
            }
            Command::AddMetric(input) => {
                self.require(Screen::Metrics)?;
                let metric = self.page.metrics_panel().create_metric(input).await?;
                Some(format!("Added metric {} ({})", metric.id, metric.category))
            }
            Command::EditMetric { metric_id, input } => {
                self.require(Screen::Metrics)?;
                self.page
                    .metrics_panel()
                    .update_metric(&metric_id, input)
                    .await?;
                Some(format!("Updated metric {}", metric_id))
            }
        };
        Ok((Flow::Continue, message))
    }

    fn require(&self, screen: Screen) -> PanelResult<()> {
        if self.page.document_id().is_none() {
            return Err(PanelError::NoDocument);
        }
        if self.page.screen() != screen {
            return Err(PanelError::Validation {
                field: "view".to_string(),
                reason: "Open the metrics tab first (`tab metrics`)".to_string(),
            });
        }
        Ok(())
    }

    async fn resolve(&self, target: InteractionRef) -> PanelResult<String> {
        self.require(Screen::Qa).map_err(|e| match e {
            PanelError::Validation { field, .. } => PanelError::Validation {
                field,
                reason: "Open the Q&A tab first (`tab qa`)".to_string(),
            },
            other => other,
        })?;

        match target {
            InteractionRef::Id(id) => Ok(id),
            InteractionRef::Position(position) => {
                let state = self.page.qa_panel().snapshot().await;
                position
                    .checked_sub(1)
                    .and_then(|index| state.history.get(index))
                    .map(|i| i.id.clone())
                    .ok_or_else(|| PanelError::InteractionNotFound {
                        interaction_id: format!("#{}", position),
                    })
            }
        }
    }

    /// Render the whole page as it currently stands.
    pub async fn render(&self) -> String {
        let screen = self.page.screen();
        let mut output = render::render_header();
        output.push_str(&render::render_tabs(self.page.active_view(), screen));
        output.push('\n');

        let body = match screen {
            Screen::Upload => render::render_upload(&self.page.upload_panel().snapshot().await),
            Screen::ClearDocument => {
                render::render_clear_prompt(self.page.document_id().unwrap_or_default())
            }
            Screen::Qa => render::render_qa(&self.page.qa_panel().snapshot().await),
            Screen::Metrics => render::render_metrics(&self.page.metrics_panel().snapshot().await),
        };
        output.push_str(&body);
        output
    }
}
