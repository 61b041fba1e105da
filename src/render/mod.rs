//! Plain-text rendering of the page and its panels.
//!
//! Every function here is pure: it takes a panel snapshot and returns the
//! text to print.

use crate::api::{DocumentSummary, Metric, QaInteraction, StatusStyle, ValidationSync};
use crate::page::{Screen, View};
use crate::panels::{MetricsState, MetricsView, QaState, RadarChart, UploadState};

const RULE: &str = "═══════════════════════════════════════════════════════════════════════════════";
const BAR_WIDTH: usize = 40;

/// Page header
pub fn render_header() -> String {
    format!("\nESG AI Analysis Platform\n{}\n", RULE)
}

/// Tab strip; the active tab is bracketed. Hidden until a document exists.
pub fn render_tabs(active: View, screen: Screen) -> String {
    if screen == Screen::Upload {
        return String::new();
    }

    let tabs: Vec<String> = View::ALL
        .iter()
        .map(|view| {
            if *view == active {
                format!("[{}]", view.title())
            } else {
                format!(" {} ", view.title())
            }
        })
        .collect();
    format!("{}\n", tabs.join("  "))
}

/// Upload screen
pub fn render_upload(state: &UploadState) -> String {
    let mut output = String::new();
    output.push_str("Upload your ESG document: upload <path>\n");
    output.push_str("(PDF or DOCX files only, one file at a time)\n");

    if state.uploading {
        let name = state.file_name.as_deref().unwrap_or("document");
        output.push_str(&format!("\nUploading {}...\n", name));
    }
    if let Some(error) = &state.error {
        output.push_str(&format!("\nError: {}\n", error));
    }
    output
}

/// Upload tab while a document is loaded
pub fn render_clear_prompt(document_id: &str) -> String {
    format!(
        "Current document: {}\n\nUpload New Document: run `clear` to start over.\n",
        document_id
    )
}

/// Question answering view
pub fn render_qa(state: &QaState) -> String {
    let mut output = String::new();

    if state.asking {
        output.push_str("Asking...\n");
    } else {
        output.push_str("Ask a question about the document: ask <question>\n");
    }
    if let Some(error) = &state.error {
        output.push_str(&format!("Error: {}\n", error));
    }
    if state.loading_history {
        output.push_str("Loading history...\n");
    }

    for (index, interaction) in state.history.iter().enumerate() {
        output.push('\n');
        output.push_str(&render_interaction(index + 1, interaction));
    }
    output
}

/// One interaction card; `number` is its 1-based position in the history.
pub fn render_interaction(number: usize, interaction: &QaInteraction) -> String {
    let mut output = String::new();
    output.push_str(&format!("#{} ({})\n", number, interaction.id));
    output.push_str(&format!("Q: {}\n", interaction.question));
    output.push_str(&format!("A: {}\n", interaction.answer));

    if !interaction.citations.is_empty() {
        output.push_str("Sources:\n");
        for (i, citation) in interaction.citations.iter().enumerate() {
            output.push_str(&format!("  - {}\n", citation.label(i)));
        }
    }

    output.push_str(&render_validation(interaction.validated, interaction.sync));
    output.push('\n');
    output
}

/// Tri-state correct/incorrect toggle with its sync marker
pub fn render_validation(validated: Option<bool>, sync: ValidationSync) -> String {
    let mark = |on: bool| if on { "x" } else { " " };
    let toggle = format!(
        "({}) ✓ Correct  ({}) ✗ Incorrect",
        mark(validated == Some(true)),
        mark(validated == Some(false))
    );

    match sync {
        ValidationSync::Synced => toggle,
        ValidationSync::Pending => format!("{}  … saving", toggle),
        ValidationSync::Failed => format!("{}  ! not saved", toggle),
    }
}

/// Metrics view in its selected mode
pub fn render_metrics(state: &MetricsState) -> String {
    if state.loading && !state.extracting {
        return "Loading metrics...\n".to_string();
    }
    if let Some(error) = &state.load_error {
        return format!("Error: {}\n", error);
    }

    let mut output = String::new();
    let mode = |view: MetricsView, label: &str| {
        if state.view == view {
            format!("[{}]", label)
        } else {
            format!(" {} ", label)
        }
    };
    output.push_str(&format!(
        "{} {}    {}\n",
        mode(MetricsView::Table, "Table View"),
        mode(MetricsView::Chart, "Chart View"),
        if state.extracting {
            "Extracting..."
        } else {
            "Extract Metrics: extract"
        }
    ));
    if let Some(error) = &state.action_error {
        output.push_str(&format!("Error: {}\n", error));
    }
    output.push('\n');

    match state.view {
        MetricsView::Table => output.push_str(&render_metrics_table(&state.metrics)),
        MetricsView::Chart => {
            output.push_str(&render_radar(&RadarChart::from_metrics(&state.metrics)))
        }
    }
    output
}

/// Status badge, e.g. `[Red|danger]`
pub fn status_badge(status: &str) -> String {
    let label = if status.trim().is_empty() { "-" } else { status };
    format!("[{}|{}]", label, StatusStyle::for_status(status).as_str())
}

/// Table with one row per metric
pub fn render_metrics_table(metrics: &[Metric]) -> String {
    if metrics.is_empty() {
        return "No metrics extracted yet.\n".to_string();
    }

    let headers = ["CATEGORY", "TARGET/GOAL", "ACTUAL", "STATUS"];
    let rows: Vec<[String; 4]> = metrics
        .iter()
        .map(|m| {
            [
                m.category.clone(),
                m.goal.clone(),
                m.actual.clone(),
                status_badge(&m.rag_status),
            ]
        })
        .collect();

    let mut widths = headers.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row.iter()) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |cells: &[String]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths.iter())
            .map(|(cell, width)| pad(cell, *width))
            .collect();
        format!("{}\n", padded.join("  ").trim_end())
    };

    let header_cells = headers.map(String::from);
    let mut output = line(&header_cells[..]);
    let total: usize = widths.iter().sum::<usize>() + 2 * (widths.len() - 1);
    output.push_str(&format!("{}\n", "─".repeat(total)));
    for row in &rows {
        output.push_str(&line(&row[..]));
    }
    output
}

/// Radar chart as horizontal bars, one per axis.
///
/// Bars scale to [`RadarChart::scale_max`]; `|` marks the suggested maximum
/// when a value exceeds it. Axes without a value show `n/a`.
pub fn render_radar(chart: &RadarChart) -> String {
    if chart.axes.is_empty() {
        return "No metrics extracted yet.\n".to_string();
    }

    let label_width = chart
        .axes
        .iter()
        .map(|a| a.category.chars().count())
        .max()
        .unwrap_or(0);
    let scale = chart.scale_max();
    let marker = if scale > chart.suggested_max {
        Some(((chart.suggested_max / scale) * BAR_WIDTH as f64).round() as usize)
    } else {
        None
    };

    let mut output = format!("{} (% of goal)\n", chart.label);
    for axis in &chart.axes {
        let label = pad(&axis.category, label_width);
        match axis.value {
            Some(value) => {
                let filled = ((value.max(0.0) / scale) * BAR_WIDTH as f64).round() as usize;
                let mut bar: Vec<char> = (0..BAR_WIDTH)
                    .map(|i| if i < filled { '█' } else { '░' })
                    .collect();
                if let Some(at) = marker {
                    if at < BAR_WIDTH {
                        bar[at] = '|';
                    }
                }
                let bar: String = bar.into_iter().collect();
                output.push_str(&format!("{}  {} {:>7.1}%\n", label, bar, value));
            }
            None => {
                output.push_str(&format!("{}  {}     n/a\n", label, " ".repeat(BAR_WIDTH)));
            }
        }
    }
    output
}

/// Document listing
pub fn render_documents(documents: &[DocumentSummary]) -> String {
    if documents.is_empty() {
        return "No documents uploaded yet.\n".to_string();
    }

    let mut output = String::from("Documents\n");
    for doc in documents {
        let status = match doc.processed {
            Some(true) => "processed",
            Some(false) => "processing",
            None => "unknown",
        };
        output.push_str(&format!(
            "  {}  {} ({}) {} {}\n",
            doc.id,
            doc.file_name,
            doc.file_type,
            status,
            doc.uploaded_at.as_deref().unwrap_or("")
        ));
    }
    output
}

fn pad(text: &str, width: usize) -> String {
    let len = text.chars().count();
    format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
}
