use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use esg_console::{
    api::{EsgApi, EsgClient},
    config::{Config, LogFormat},
    console::Console,
    panels::{MetricsPanel, MetricsView, QaPanel, UploadPanel},
    render,
};

/// Terminal front-end for the ESG document analysis service
#[derive(Parser, Debug)]
#[command(name = "esg-console", version, about)]
struct Cli {
    /// Service address (overrides ESG_API_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Interactive console (default)
    Interactive {
        /// Open an existing document instead of starting at upload
        #[arg(long)]
        document: Option<String>,
    },

    /// Upload a PDF or DOCX document and print its id
    Upload {
        /// File to upload
        path: PathBuf,
    },

    /// List documents on the service
    Documents,

    /// Show the question/answer history of a document
    History {
        /// Document id
        document: String,
    },

    /// Ask a question about a document
    Ask {
        /// Document id
        document: String,
        /// Question text
        question: String,
    },

    /// Mark an answer correct (or incorrect with --incorrect)
    Validate {
        /// Document id
        document: String,
        /// Interaction id
        interaction: String,
        /// Record the answer as incorrect
        #[arg(long)]
        incorrect: bool,
    },

    /// Show the metrics of a document
    Metrics {
        /// Document id
        document: String,
        /// Run extraction before showing
        #[arg(long)]
        extract: bool,
        /// Show the goal-achievement chart instead of the table
        #[arg(long)]
        chart: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match load_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        base_url = %config.service.base_url,
        "ESG console starting..."
    );

    let client = match EsgClient::new(&config.service, config.request.clone()) {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "Failed to initialize service client");
            return Err(e.into());
        }
    };
    let api: Arc<dyn EsgApi> = Arc::new(client);

    match cli.command.unwrap_or(Commands::Interactive { document: None }) {
        Commands::Interactive { document } => {
            let mut console = Console::new(api);
            if let Some(document_id) = document {
                console.page_mut().open_document(document_id).await;
            }
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            console.run(stdin, tokio::io::stdout()).await?;
        }
        Commands::Upload { path } => {
            let panel = UploadPanel::new(api);
            let result = panel.upload(&[path]).await;
            match result {
                Ok(Some(document_id)) => println!("{}", document_id),
                Ok(None) => {}
                Err(e) => exit_with(&e.user_message()),
            }
        }
        Commands::Documents => {
            let documents = api.list_documents().await?;
            print!("{}", render::render_documents(&documents));
        }
        Commands::History { document } => {
            let panel = QaPanel::new(api);
            let result = panel.mount(document).await;
            print!("{}", render::render_qa(&panel.snapshot().await));
            if result.is_err() {
                std::process::exit(1);
            }
        }
        Commands::Ask { document, question } => {
            let panel = QaPanel::new(api);
            if let Err(e) = panel.mount(document).await {
                exit_with(&e.user_message());
            }
            match panel.submit(&question).await {
                Ok(interaction) => print!("{}", render::render_interaction(1, &interaction)),
                Err(e) => exit_with(&e.user_message()),
            }
        }
        Commands::Validate {
            document,
            interaction,
            incorrect,
        } => {
            let panel = QaPanel::new(api);
            if let Err(e) = panel.mount(document).await {
                exit_with(&e.user_message());
            }
            if let Err(e) = panel.validate(&interaction, !incorrect).await {
                exit_with(&e.user_message());
            }
            let verdict = if incorrect { "incorrect" } else { "correct" };
            println!("Recorded answer {} as {}", interaction, verdict);
        }
        Commands::Metrics {
            document,
            extract,
            chart,
        } => {
            let panel = MetricsPanel::new(api);
            let mut failed = panel.mount(document).await.is_err();
            if extract && !failed {
                failed = panel.extract().await.is_err();
            }
            if chart {
                panel.set_view(MetricsView::Chart).await;
            }
            print!("{}", render::render_metrics(&panel.snapshot().await));
            if failed {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> esg_console::AppResult<Config> {
    let config = Config::from_env()?;
    match &cli.base_url {
        Some(url) => config.with_base_url(url),
        None => Ok(config),
    }
}

fn exit_with(message: &str) -> ! {
    eprintln!("Error: {}", message);
    std::process::exit(1);
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
