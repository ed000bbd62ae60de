use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use hf_hub::{
    Cache, Repo,
    api::tokio::{Api, ApiBuilder},
};
use once_cell::sync::{Lazy, OnceCell};
use tokio::sync::OnceCell as AsyncOnceCell;
use tracing::{debug, info};

use crate::progress::Reporter;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));
const HF_MIRRORS: &[&str] = &["https://huggingface.co", "https://hf-mirror.com"];
const ENDPOINT_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

static CACHE_DIR: OnceCell<PathBuf> = OnceCell::new();
static ENDPOINT: OnceCell<String> = OnceCell::new();
static HF_API: AsyncOnceCell<Api> = AsyncOnceCell::const_new();
static HF_CACHE: Lazy<Cache> = Lazy::new(|| Cache::new(cache_dir().to_path_buf()));

pub fn cache_dir() -> &'static PathBuf {
    CACHE_DIR.get_or_init(|| {
        dirs::cache_dir()
            .unwrap_or_default()
            .join("lector")
            .join("models")
    })
}

pub fn set_cache_dir(path: PathBuf) -> anyhow::Result<()> {
    CACHE_DIR
        .set(path)
        .map_err(|_| anyhow::anyhow!("cache dir has already been set"))
}

/// Pins the Hub endpoint, skipping mirror probing.
pub fn set_endpoint(endpoint: impl Into<String>) -> anyhow::Result<()> {
    ENDPOINT
        .set(endpoint.into())
        .map_err(|_| anyhow::anyhow!("endpoint has already been set"))
}

async fn api() -> anyhow::Result<&'static Api> {
    HF_API
        .get_or_try_init(|| async {
            let endpoint = match ENDPOINT.get() {
                Some(endpoint) => endpoint.clone(),
                None => match std::env::var("HF_ENDPOINT") {
                    Ok(endpoint) if !endpoint.is_empty() => endpoint,
                    _ => select_endpoint().await,
                },
            };
            info!(%endpoint, "using Hugging Face endpoint");

            ApiBuilder::new()
                .with_endpoint(endpoint)
                .with_cache_dir(cache_dir().to_path_buf())
                .high()
                .build()
                .context("failed to build Hugging Face API client")
        })
        .await
}

// first reachable mirror wins, the official hub is listed first
async fn select_endpoint() -> String {
    let client = match reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(ENDPOINT_CHECK_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            debug!(%err, "cannot build endpoint check client");
            return HF_MIRRORS[0].to_string();
        }
    };

    for endpoint in HF_MIRRORS {
        match client.head(*endpoint).send().await {
            Ok(resp) if resp.status().is_success() => return endpoint.to_string(),
            Ok(resp) => debug!(endpoint, status = %resp.status(), "endpoint unavailable"),
            Err(err) => debug!(endpoint, %err, "endpoint unreachable"),
        }
    }

    HF_MIRRORS[0].to_string()
}

/// Returns the local path of `filename` in model repo `repo`, downloading it
/// into the cache on first use.
#[tracing::instrument(level = "info", skip_all, fields(repo = %repo, filename = %filename))]
pub async fn hf_download(repo: &str, filename: &str) -> anyhow::Result<PathBuf> {
    let hf_repo = Repo::model(repo.to_string());
    if let Some(path) = HF_CACHE.repo(hf_repo.clone()).get(filename) {
        debug!(path = %path.display(), "cache hit");
        return Ok(path);
    }

    let api = api().await?;
    let reporter = Reporter::new(filename);
    let result = api
        .repo(hf_repo)
        .download_with_progress(filename, reporter.clone())
        .await;
    if result.is_err() {
        reporter.clear();
    }

    result.with_context(|| format!("failed to download {filename} from {repo}"))
}
