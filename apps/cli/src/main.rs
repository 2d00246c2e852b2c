//! MediaFerry command-line upload client.

mod config;
mod progress;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use mediaferry_uploader::{
    FileTarget, HttpUploadApi, ResumeRequest, UploadConfigOverrides, UploadOutcome, UploadRequest,
    UploadTarget, Uploader,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::Config;
use progress::{UploadBar, format_bytes};

/// Reliable uploads of large media files
#[derive(Parser)]
#[command(name = "mediaferry")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upload server URL (overrides the configuration file)
    #[arg(short, long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file
    Upload {
        file: PathBuf,

        /// Project the video belongs to (single-request uploads)
        #[arg(short, long)]
        project: Option<String>,

        /// Chunk size in bytes requested from the server
        #[arg(long)]
        chunk_size: Option<u64>,

        /// Always send the file in one request
        #[arg(long)]
        no_chunking: bool,
    },

    /// Continue an interrupted chunked upload
    Resume {
        session_id: String,

        /// The file originally being uploaded
        file: PathBuf,
    },

    /// Show which chunks of a session the server is missing
    Status { session_id: String },

    /// Release a server session
    Cancel { session_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = Config::load(cli.config.as_deref())?;
    let server_url = cli.server.unwrap_or(config.server_url);
    let defaults = mediaferry_uploader::UploadConfig::default().merged(&config.upload);
    tracing::debug!(server = %server_url, "configuration loaded");

    let api = HttpUploadApi::new(&server_url, defaults.timeout())?;
    let uploader = Uploader::with_config(Arc::new(api), defaults);

    match cli.command {
        Commands::Upload {
            file,
            project,
            chunk_size,
            no_chunking,
        } => {
            let overrides = UploadConfigOverrides {
                chunk_size_bytes: chunk_size,
                chunking_enabled: no_chunking.then_some(false),
                ..Default::default()
            };
            upload(&uploader, file, project, overrides).await
        }
        Commands::Resume { session_id, file } => resume(&uploader, session_id, file).await,
        Commands::Status { session_id } => status(&uploader, &session_id).await,
        Commands::Cancel { session_id } => {
            uploader.release(&session_id).await?;
            println!("Session {session_id} released");
            Ok(())
        }
    }
}

/// Cancels the returned token on Ctrl-C.
fn interrupt_token() -> CancellationToken {
    let token = CancellationToken::new();
    let signal = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling upload");
            signal.cancel();
        }
    });
    token
}

async fn upload(
    uploader: &Uploader,
    file: PathBuf,
    project: Option<String>,
    overrides: UploadConfigOverrides,
) -> anyhow::Result<()> {
    let target = FileTarget::open(&file)
        .await
        .with_context(|| format!("opening {}", file.display()))?;
    let bar = UploadBar::new(target.size(), target.name());
    let ticks = bar.clone();

    let mut req = UploadRequest::new(Arc::new(target))
        .config(overrides)
        .cancel_token(interrupt_token())
        .on_progress(move |p| ticks.update(p));
    if let Some(project) = project {
        req = req.project_id(project);
    }

    report(&bar, uploader.upload(req).await)
}

async fn resume(uploader: &Uploader, session_id: String, file: PathBuf) -> anyhow::Result<()> {
    let target = FileTarget::open(&file)
        .await
        .with_context(|| format!("opening {}", file.display()))?;
    let bar = UploadBar::new(target.size(), target.name());
    let ticks = bar.clone();

    let req = ResumeRequest::new(session_id, Arc::new(target))
        .cancel_token(interrupt_token())
        .on_progress(move |p| ticks.update(p));

    report(&bar, uploader.resume(req).await)
}

fn report(
    bar: &UploadBar,
    result: Result<UploadOutcome, mediaferry_uploader::UploadError>,
) -> anyhow::Result<()> {
    match result {
        Ok(UploadOutcome::Chunked(summary)) => {
            bar.finish_with_message(format!(
                "Uploaded {} ({}) in {:.1}s, session {}",
                summary.filename,
                format_bytes(summary.file_size),
                summary.elapsed_seconds,
                summary.session_id
            ));
            Ok(())
        }
        Ok(UploadOutcome::Traditional(payload)) => {
            bar.finish_with_message("Upload complete".into());
            println!("{}", serde_json::to_string_pretty(&payload)?);
            Ok(())
        }
        Err(e) => {
            bar.abandon_with_message(format!("Upload failed: {}", e.code));
            Err(e.into())
        }
    }
}

async fn status(uploader: &Uploader, session_id: &str) -> anyhow::Result<()> {
    let st = uploader.status(session_id).await?;
    println!("Session:  {session_id}");
    println!("Status:   {}", st.status);
    if let Some(total) = st.total_chunks {
        println!("Chunks:   {total}");
    }
    if st.missing_chunks.is_empty() {
        println!("Missing:  none");
    } else {
        println!("Missing:  {} chunk(s) {:?}", st.missing_chunks.len(), st.missing_chunks);
    }
    if let Some(expires) = st.expires_at {
        println!("Expires:  {expires}");
    }
    Ok(())
}
