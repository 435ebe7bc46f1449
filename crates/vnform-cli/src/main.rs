//! Manual-exercise CLI binary (§1 Non-goals: no HTTP shell) wiring the
//! crawler cycle, worker loop, and a local interactive session driver over
//! the core library. Grounded on `sg/crates/sg/src/main.rs`'s clap
//! subcommand dispatch and `tracing_subscriber::fmt()` initialization.

mod paths;
mod repl;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdfium_render::prelude::Pdfium;
use tracing_subscriber::EnvFilter;

use vnform_core::config::{AppConfig, LogFormat};
use vnform_crawler::Crawler;
use vnform_detector::ocr::StubOcrEngine;
use vnform_eventbus::{EventBus, SqliteEventQueue};
use vnform_llm::LlmClient;
use vnform_session::SessionEngine;
use vnform_sessionstore::{SessionLockTable, SqliteSessionStore};
use vnform_storage::{LocalObjectStore, ObjectStore, SqliteMetadataStore};
use vnform_worker::FormWorker;

#[derive(Parser)]
#[command(name = "vnform", about = "Crawl, detect, and fill Vietnamese government forms")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one crawl cycle over the configured sources.
    Crawl,
    /// Drain the event queue, running the detection/extraction pipeline on each event.
    Worker {
        /// Process whatever is currently queued, then exit, instead of polling forever.
        #[arg(long)]
        once: bool,
    },
    /// List known forms.
    Forms,
    /// Start an interactive, terminal-driven filling session for a form.
    Session {
        #[arg(long)]
        form_id: String,
    },
    /// Render a session's answers onto its form's original PDF.
    Fill {
        #[arg(long)]
        session_id: String,
        #[arg(long)]
        out: PathBuf,
    },
}

const POLL_INTERVAL: Duration = Duration::from_secs(5);
const VISIBILITY_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    init_tracing(&config);

    let cli = Cli::parse();
    match cli.command {
        Commands::Crawl => run_crawl(&config).await,
        Commands::Worker { once } => run_worker(&config, once).await,
        Commands::Forms => run_forms(&config),
        Commands::Session { form_id } => run_session(&config, &form_id).await,
        Commands::Fill { session_id, out } => run_fill(&config, &session_id, &out),
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Human => subscriber.init(),
    }
}

async fn run_crawl(config: &AppConfig) -> Result<()> {
    let object_store = LocalObjectStore::new(&config.object_store_root, "forms").context("failed to open object store")?;
    let metadata = SqliteMetadataStore::open(&config.metadata_db_path).context("failed to open metadata store")?;
    let event_bus: Box<dyn EventBus> = Box::new(
        SqliteEventQueue::open(paths::event_queue_path(&config.metadata_db_path).to_str().unwrap_or("events.sqlite3"))
            .context("failed to open event queue")?,
    );

    let crawler = Crawler::new(
        config.sources.clone(),
        config.request_timeout,
        config.max_retries,
        object_store,
        metadata,
        event_bus,
    )
    .context("failed to construct crawler")?;

    let report = crawler.run_cycle().await;
    println!("new: {}, skipped: {}, failed: {}", report.new, report.skipped, report.failed);
    Ok(())
}

async fn run_worker(config: &AppConfig, once: bool) -> Result<()> {
    let object_store = LocalObjectStore::new(&config.object_store_root, "forms").context("failed to open object store")?;
    let metadata = SqliteMetadataStore::open(&config.metadata_db_path).context("failed to open metadata store")?;
    let event_bus = SqliteEventQueue::open(paths::event_queue_path(&config.metadata_db_path).to_str().unwrap_or("events.sqlite3"))
        .context("failed to open event queue")?;

    let pdfium = Pdfium::new(
        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library())
            .context("failed to bind pdfium library")?,
    );

    let worker = FormWorker {
        object_store,
        metadata,
        pdfium,
        ocr_engine: Box::new(StubOcrEngine::empty()),
        llm: LlmClient::from_config(config),
    };

    let work_dir = std::env::temp_dir().join("vnform-cli-work");
    std::fs::create_dir_all(&work_dir).context("failed to create worker scratch directory")?;

    loop {
        match event_bus.poll(VISIBILITY_TIMEOUT).context("failed to poll event queue")? {
            Some(delivered) => {
                match worker.handle_event(&delivered.event, &work_dir).await {
                    Ok(form_id) => {
                        tracing::info!(form_id = %form_id, "event handled");
                        event_bus.ack(delivered.delivery_id).context("failed to ack event")?;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, attempts = delivered.delivery_attempts, "event handling failed, leaving for retry");
                    }
                }
            }
            None if once => break,
            None => tokio::time::sleep(POLL_INTERVAL).await,
        }
    }
    Ok(())
}

fn run_forms(config: &AppConfig) -> Result<()> {
    let metadata = SqliteMetadataStore::open(&config.metadata_db_path).context("failed to open metadata store")?;
    for form in metadata.list_forms().context("failed to list forms")? {
        println!("{}\t{}\t{} page(s)", form.form_id, form.title, form.page_count);
    }
    Ok(())
}

async fn run_session(config: &AppConfig, form_id: &str) -> Result<()> {
    let engine = build_session_engine(config)?;
    repl::run(&engine, form_id).await
}

fn run_fill(config: &AppConfig, session_id: &str, out: &PathBuf) -> Result<()> {
    let metadata = SqliteMetadataStore::open(&config.metadata_db_path).context("failed to open metadata store")?;
    let sessions = SqliteSessionStore::open(
        paths::session_store_path(&config.metadata_db_path).to_str().unwrap_or("sessions.sqlite3"),
        config.session_ttl,
    )
    .context("failed to open session store")?;
    let object_store = LocalObjectStore::new(&config.object_store_root, "forms").context("failed to open object store")?;

    let session = sessions.load(session_id).context("session not found")?;
    let schema = metadata.get_form_schema(&session.form_id).context("form schema not found")?;
    let original_pdf = object_store.get(&schema.source.key).context("failed to load original PDF")?;

    let filled = vnform_overlay::render_overlay(&original_pdf, &schema, &session.answers);
    std::fs::write(out, &filled).with_context(|| format!("failed to write {}", out.display()))?;
    println!("wrote {} bytes to {}", filled.len(), out.display());
    Ok(())
}

fn build_session_engine(config: &AppConfig) -> Result<SessionEngine> {
    Ok(SessionEngine {
        metadata: SqliteMetadataStore::open(&config.metadata_db_path).context("failed to open metadata store")?,
        sessions: SqliteSessionStore::open(
            paths::session_store_path(&config.metadata_db_path).to_str().unwrap_or("sessions.sqlite3"),
            config.session_ttl,
        )
        .context("failed to open session store")?,
        locks: SessionLockTable::new(),
        llm: LlmClient::from_config(config),
    })
}
