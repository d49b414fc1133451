use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use composer_uploads::CollectingReporter;
use composer_uploads::MODE_ENV_VAR;
use composer_uploads::SubmitOutcome;
use composer_uploads::TextBuffer;
use composer_uploads::TransportMode;
use composer_uploads::UploadConfig;
use composer_uploads::UploadCoordinator;
use composer_uploads::UploadFile;
use composer_uploads::build_transport;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "upload-debug",
    version,
    about = "Upload files into an in-memory composer and print the result"
)]
struct Args {
    /// TOML file with `[policy]`, `[transport]`, `[features]` and `[labels]` tables.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Transport to use. Defaults to the configured one, or mock when
    /// COMPOSER_UPLOADS_MODE=mock.
    #[arg(long)]
    mode: Option<TransportMode>,
    /// Text the document starts with.
    #[arg(long, default_value = "")]
    text: String,
    /// Files to upload as one batch.
    #[arg(value_name = "FILE", required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let default_level = "error";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => UploadConfig::load(path)?,
        None => UploadConfig::default(),
    };
    let mode = args.mode.unwrap_or_else(|| {
        TransportMode::select(&config, std::env::var(MODE_ENV_VAR).ok().as_deref())
    });
    let transport = build_transport(mode, &config.transport)?;
    info!("upload-debug starting mode={mode:?} files={}", args.files.len());

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        files.push(UploadFile::new(name, mime.essence_str(), data));
    }

    let reporter = CollectingReporter::new();
    let mut coordinator = UploadCoordinator::new(
        Box::new(TextBuffer::from_text(args.text)),
        transport,
        &config,
    )
    .with_reporter(reporter.clone());

    let outcome = coordinator.on_files_chosen(files);
    if let SubmitOutcome::Dispatched { ids, .. } = &outcome {
        eprintln!("uploading {} file(s) via {}", ids.len(), coordinator.transport_name());
    }
    for done in coordinator.run_until_idle().await {
        eprintln!("task {} finished: {:?}", done.id, done.state);
    }
    for message in reporter.messages() {
        eprintln!("error: {message}");
    }

    println!("{}", coordinator.document().text());
    Ok(())
}
