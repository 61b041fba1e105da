use std::path::PathBuf;

use crate::api::MetricInput;
use crate::error::{PanelError, PanelResult};
use crate::page::View;
use crate::panels::MetricsView;

/// Reference to an interaction: its 1-based position or its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteractionRef {
    Position(usize),
    Id(String),
}

/// One console command
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Redraw the current screen.
    Show,
    Help,
    Quit,
    Upload(Vec<PathBuf>),
    Tab(View),
    Clear,
    Documents,
    Open(String),
    Ask(String),
    Validate {
        target: InteractionRef,
        is_valid: bool,
    },
    Refresh,
    Extract,
    SetView(MetricsView),
    AddMetric(MetricInput),
    EditMetric {
        metric_id: String,
        input: MetricInput,
    },
}

/// Console usage text
pub const HELP: &str = "\
Commands:
  upload <path>                      Upload a PDF or DOCX document
  documents                          List documents on the service
  open <document-id>                 Analyze an existing document
  tab <upload|qa|metrics>            Switch view
  clear                              Forget the current document
  ask <question>                     Ask a question about the document
  correct <n|id>                     Mark answer n (or id) correct
  incorrect <n|id>                   Mark answer n (or id) incorrect
  refresh                            Reload the current view
  extract                            Extract metrics from the document
  view <table|chart>                 Metrics presentation
  add-metric <category> <goal> <actual> <status>
  edit-metric <id> <category> <goal> <actual> <status>
  help                               Show this help
  quit                               Exit
Arguments containing spaces can be wrapped in double quotes.";

impl Command {
    /// Parse one input line.
    pub fn parse(line: &str) -> PanelResult<Self> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name.to_lowercase().as_str() {
            "" | "show" => Command::Show,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "upload" => Command::Upload(split_args(rest)?.into_iter().map(PathBuf::from).collect()),
            "tab" => Command::Tab(rest.parse()?),
            "qa" => Command::Tab(View::Qa),
            "metrics" => Command::Tab(View::Metrics),
            "clear" => Command::Clear,
            "documents" | "docs" => Command::Documents,
            "open" => Command::Open(single_arg("open", rest)?),
            "ask" => Command::Ask(rest.to_string()),
            "correct" => Command::Validate {
                target: interaction_ref(rest)?,
                is_valid: true,
            },
            "incorrect" => Command::Validate {
                target: interaction_ref(rest)?,
                is_valid: false,
            },
            "refresh" => Command::Refresh,
            "extract" => Command::Extract,
            "view" => Command::SetView(match rest.to_lowercase().as_str() {
                "table" => MetricsView::Table,
                "chart" | "radar" => MetricsView::Chart,
                other => return Err(invalid("view", format!("expected table or chart, got '{}'", other))),
            }),
            "add-metric" => Command::AddMetric(metric_input(&split_args(rest)?, "add-metric")?),
            "edit-metric" => {
                let args = split_args(rest)?;
                let (metric_id, fields) = args
                    .split_first()
                    .ok_or_else(|| invalid("edit-metric", "missing metric id".to_string()))?;
                Command::EditMetric {
                    metric_id: metric_id.clone(),
                    input: metric_input(fields, "edit-metric")?,
                }
            }
            other => {
                return Err(invalid(
                    "command",
                    format!("Unknown command '{}', type `help`", other),
                ))
            }
        };
        Ok(command)
    }
}

/// Split arguments on whitespace, honouring double quotes.
pub fn split_args(input: &str) -> PanelResult<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut has_token = false;

    for c in input.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                has_token = true;
            }
            c if c.is_whitespace() && !in_quotes => {
                if has_token {
                    args.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }

    if in_quotes {
        return Err(invalid("arguments", "unterminated quote".to_string()));
    }
    if has_token {
        args.push(current);
    }
    Ok(args)
}

fn single_arg(command: &str, rest: &str) -> PanelResult<String> {
    match split_args(rest)?.as_slice() {
        [arg] => Ok(arg.clone()),
        _ => Err(invalid(command, "expected exactly one argument".to_string())),
    }
}

fn interaction_ref(rest: &str) -> PanelResult<InteractionRef> {
    let arg = rest.trim();
    if arg.is_empty() {
        return Err(invalid("interaction", "missing answer number or id".to_string()));
    }
    Ok(match arg.parse::<usize>() {
        Ok(position) if position > 0 => InteractionRef::Position(position),
        _ => InteractionRef::Id(arg.to_string()),
    })
}

fn metric_input(args: &[String], command: &str) -> PanelResult<MetricInput> {
    match args {
        [category, goal, actual, status] => Ok(MetricInput::new(
            category.as_str(),
            goal.as_str(),
            actual.as_str(),
            status.as_str(),
        )),
        _ => Err(invalid(
            command,
            "expected <category> <goal> <actual> <status>".to_string(),
        )),
    }
}

fn invalid(field: &str, reason: String) -> PanelError {
    PanelError::Validation {
        field: field.to_string(),
        reason,
    }
}
