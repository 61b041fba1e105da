//! # ESG Analysis Console
//!
//! A terminal front-end for an ESG (Environmental, Social, Governance)
//! document analysis service. Upload a report, ask questions about it, and
//! review the performance metrics the service extracts.
//!
//! ## Features
//!
//! - **Upload**: single PDF or DOCX document, sent as multipart form data
//! - **Question Answering**: running history of answers with citations and
//!   correct/incorrect validation
//! - **Metrics Dashboard**: extracted metrics as a RAG-status table or a
//!   goal-achievement radar chart, with on-demand re-extraction
//!
//! ## Architecture
//!
//! ```text
//! Console → PageController → Upload / QA / Metrics panels → EsgClient (HTTP) → Analysis service
//! ```
//!
//! The service is the system of record; panels only hold view state for the
//! document currently open.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use esg_console::{Config, Console};
//! use esg_console::api::EsgClient;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let client = EsgClient::new(&config.service, config.request.clone())?;
//!     let mut console = Console::new(Arc::new(client));
//!     console.run(tokio::io::BufReader::new(tokio::io::stdin()), tokio::io::stdout()).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Analysis service client and wire types.
pub mod api;
/// Configuration management.
pub mod config;
/// Interactive console and command parsing.
pub mod console;
/// Error types and result aliases for the application.
pub mod error;
/// Page-level view switching.
pub mod page;
/// Upload, question answering, and metrics view-models.
pub mod panels;
/// Plain-text rendering of panel state.
pub mod render;

pub use config::Config;
pub use console::Console;
pub use error::{AppError, AppResult};
pub use page::{PageController, Screen, View};
