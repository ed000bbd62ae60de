use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use lector_core::paths::resolve_input_path;
use lector_ml::{DocumentFile, OcrPredictor};
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

use crate::{
    cli::Cli,
    config::{Config, Settings},
    error::{AppError, Result},
    output,
};

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    initialize(cli.verbose);

    match execute(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("ERROR: {err}");
            ExitCode::from(err.exit_code())
        }
    }
}

fn initialize(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        _ => tracing::Level::DEBUG,
    };

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_span_events(FmtSpan::CLOSE)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .init();
}

async fn execute(cli: Cli) -> Result<()> {
    let image_path =
        resolve_input_path(&cli.image_path).context("failed to resolve image path")?;
    if !image_path.exists() {
        return Err(AppError::FileNotFound(image_path));
    }
    if !image_path.is_file() {
        return Err(AppError::NotAFile(image_path));
    }

    let config = Config::discover(cli.config.as_deref())?;
    let settings = Settings::resolve(&cli, config);
    debug!(?settings, "settings resolved");

    if let Some(dir) = settings.cache_dir.clone() {
        lector_ml::set_cache_dir(dir)?;
    }
    if let Some(endpoint) = settings.hf_endpoint.clone() {
        lector_ml::set_endpoint(endpoint)?;
    }

    let pages = DocumentFile::from_images(&[&image_path])?;
    let mut predictor =
        OcrPredictor::load(&settings.det_arch, &settings.reco_arch, settings.options).await?;

    info!(image = %image_path.display(), "running OCR");
    let document = predictor.predict(&pages)?;

    output::emit(
        &document,
        cli.json_out.as_deref(),
        cli.no_text,
        &mut std::io::stdout().lock(),
    )?;

    Ok(())
}
