//! KPILens CLI
//!
//! Command-line front end for the supplier-KPI dashboard backend:
//! - Show dashboard analytics and chart configs
//! - List and generate insights
//! - Ask questions over the streaming chat endpoint
//! - Upload KPI workbooks
//! - Manage saved chart bookmarks

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use kpilens::backend::{BackendClient, NewChart};
use kpilens::chat::{abort_pair, ChatDriver, ChatSession};
use kpilens::config::{generate_default_config, Config};
use kpilens::dashboard::{kpi_label, DashboardView};
use kpilens::insights::InsightList;
use kpilens::ChatMessage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "kpilens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Supplier KPI dashboard and analytics chat")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: search standard locations)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Backend URL, overrides config
    #[arg(long, global = true)]
    pub api_url: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show dashboard analytics
    Dashboard {
        /// Only show the trend chart for this KPI
        #[arg(short, long)]
        kpi: Option<String>,
        /// Print the full view as JSON
        #[arg(long)]
        json: bool,
    },

    /// List general insights
    Insights {
        /// Ask the backend to generate additional insights
        #[arg(long)]
        more: bool,
    },

    /// Ask a question about the KPI data
    Ask {
        question: String,
        /// Use the blocking endpoint instead of streaming
        #[arg(long)]
        no_stream: bool,
    },

    /// Upload a KPI workbook (.xlsx)
    Upload { path: PathBuf },

    /// Manage saved charts
    Charts {
        #[command(subcommand)]
        action: ChartsAction,
    },

    /// Check backend health
    Health,

    /// Generate default config file
    Config {
        /// Output path (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ChartsAction {
    /// List saved charts
    List,
    /// Save a chart option read from a JSON file
    Add { title: String, option: PathBuf },
    /// Delete a saved chart
    Delete { id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Search quietly, report once the subscriber is installed
    let (mut config, outcome) = match &cli.config {
        Some(path) => (Config::load_with_env(path)?, None),
        None => {
            let outcome = Config::discover();
            (outcome.config.clone(), Some(outcome))
        }
    };
    if let Some(url) = cli.api_url.clone() {
        config.backend.url = url;
    }

    init_tracing(&config);
    if let Some(outcome) = &outcome {
        outcome.log();
    } else if let Some(path) = &cli.config {
        tracing::info!("Loaded config from {:?}", path);
    }

    if let Commands::Config { output } = &cli.command {
        let content = generate_default_config();
        match output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, &content)?;
                println!("Config written to {:?}", path);
            }
            None => print!("{}", content),
        }
        return Ok(());
    }

    let client = BackendClient::new(&config.backend)?;

    match cli.command {
        Commands::Dashboard { kpi, json } => show_dashboard(&client, kpi.as_deref(), json).await?,
        Commands::Insights { more } => show_insights(&client, more).await?,
        Commands::Ask {
            question,
            no_stream,
        } => ask(client, &config, &question, no_stream).await?,
        Commands::Upload { path } => upload(&client, &path).await?,
        Commands::Charts { action } => charts(&client, &config.backend.user_id, action).await?,
        Commands::Health => {
            let health = client
                .health()
                .await
                .with_context(|| format!("Cannot reach backend at {}", client.base_url()))?;
            println!("Backend: {}", client.base_url());
            println!("Status:  {}", health.status);
            if let Some(version) = health.version {
                println!("Version: {}", version);
            }
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

fn init_tracing(config: &Config) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("kpilens={}", config.logging.level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn show_dashboard(client: &BackendClient, kpi: Option<&str>, json: bool) -> anyhow::Result<()> {
    let analytics = client.dashboard().await?;
    let view = DashboardView::build(&analytics);

    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let panels = match view {
        DashboardView::NoData { reason } => {
            println!("{}", reason);
            return Ok(());
        }
        DashboardView::Ready(panels) => panels,
    };

    if let Some(kpi) = kpi {
        let Some(chart) = panels.trend(kpi) else {
            bail!("No trend data for KPI '{}'", kpi);
        };
        println!("{}", serde_json::to_string_pretty(&chart.option)?);
        return Ok(());
    }

    for card in &panels.cards {
        println!("{:<24} {}", card.label, card.value);
    }
    println!();
    println!("Trends:");
    for chart in &panels.trends {
        println!("  {}", chart.title);
    }
    if !panels.rankings.is_empty() {
        println!();
        println!("Rankings:");
        for chart in &panels.rankings {
            println!("  {}", kpi_label(&chart.kpi));
        }
    }
    if panels.matrix.is_some() {
        println!();
        println!("Performance matrix available (use --json)");
    }
    Ok(())
}

async fn show_insights(client: &BackendClient, more: bool) -> anyhow::Result<()> {
    let mut list = InsightList::new(client.insights().await?);

    if more {
        let response = client.generate_more_insights().await?;
        let added = list.append(response.additional_insights);
        if !response.message.is_empty() {
            println!("{}", response.message);
        }
        println!("Added {} insights", added);
        println!();
    }

    if list.is_empty() {
        println!("No insights yet. Upload a KPI workbook first.");
        return Ok(());
    }

    for (i, item) in list.items().iter().enumerate() {
        match &item.sentiment {
            Some(sentiment) => println!("{:>3}. [{}] {}", i + 1, sentiment, item.text),
            None => println!("{:>3}. {}", i + 1, item.text),
        }
    }
    Ok(())
}

async fn ask(client: BackendClient, config: &Config, question: &str, no_stream: bool) -> anyhow::Result<()> {
    let mut session = ChatSession::new(config.chat.max_transcript);

    if no_stream {
        let answer = client.chat(question).await?;
        session.push_user(question);
        session.apply_answer(&answer);
    } else {
        let driver = ChatDriver::new(Arc::new(client)).with_max_frame(config.chat.max_frame_bytes);
        let (handle, signal) = abort_pair();

        let ctrl_c = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupted, cancelling request");
                handle.abort();
            }
        });

        let result = session
            .send_with(&driver, question, signal, |progress| eprintln!("  … {}", progress.label))
            .await;
        ctrl_c.abort();

        if let Err(e) = result {
            if e.is_cancelled() {
                eprintln!("Cancelled.");
                return Ok(());
            }
            return Err(e.into());
        }
    }

    if let Some(message) = session.last() {
        print_answer(message)?;
    }
    Ok(())
}

fn print_answer(message: &ChatMessage) -> anyhow::Result<()> {
    println!("{}", message.content);

    if let Some(context) = &message.data_context {
        if let Some(sql) = &context.sql_query {
            println!();
            println!("SQL:");
            println!("  {}", sql);
        }
        if let Some(rows) = &context.rows {
            println!();
            println!("Rows: {}", rows.len());
        }
    }

    if let Some(chart) = &message.chart_data {
        println!();
        println!("Chart:");
        println!("{}", serde_json::to_string_pretty(chart)?);
    }
    Ok(())
}

async fn upload(client: &BackendClient, path: &Path) -> anyhow::Result<()> {
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));
    if !is_xlsx {
        eprintln!("Warning: {:?} is not an .xlsx file; the backend may reject it", path);
    }

    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {:?}", path))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload.xlsx");

    let summary = client.upload_excel(file_name, bytes).await?;

    println!("{}", summary.message);
    println!("  KPI rows ingested: {}", summary.upserted());
    println!("  General insights: {}", summary.general_insights.len());
    for item in summary.general_insights.iter().take(5) {
        println!("    - {}", item.text);
    }
    Ok(())
}

async fn charts(client: &BackendClient, user_id: &str, action: ChartsAction) -> anyhow::Result<()> {
    match action {
        ChartsAction::List => {
            let charts = client.charts(user_id).await?;
            if charts.is_empty() {
                println!("No saved charts for {}", user_id);
                return Ok(());
            }
            println!("{:<38} {:<32} {}", "ID", "Title", "Created");
            println!("{}", "-".repeat(90));
            for chart in charts {
                println!(
                    "{:<38} {:<32} {}",
                    chart.id,
                    chart.title,
                    chart.created_at.as_deref().unwrap_or("-")
                );
            }
        }
        ChartsAction::Add { title, option } => {
            let content = tokio::fs::read_to_string(&option)
                .await
                .with_context(|| format!("Failed to read {:?}", option))?;
            let chart: serde_json::Value =
                serde_json::from_str(&content).context("Chart option is not valid JSON")?;

            let saved = client
                .add_chart(&NewChart {
                    user_id: user_id.to_string(),
                    title,
                    chart,
                })
                .await?;
            println!("Saved: {}", saved);
        }
        ChartsAction::Delete { id } => {
            client.delete_chart(&id).await?;
            println!("Deleted chart {}", id);
        }
    }
    Ok(())
}
