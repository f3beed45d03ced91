use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::poller::PollPolicy;
use crate::storage::PublicUrlScheme;

const DEFAULT_DRAPHART_API_URL: &str = "https://api.draph.art/v1/generate/";
const DEFAULT_VIDEO_API_URL: &str = "https://api.aivideoapi.com/runway/generate/image";
const DEFAULT_FAL_QUEUE_URL: &str = "https://queue.fal.run";
const DEFAULT_OPENAI_API_URL: &str = "https://api.openai.com/v1";

#[derive(Debug, Clone)]
pub struct DraphConfig {
    pub api_url: String,
    pub api_key: String,
    pub user_name: String,
    pub multiblob_sod: String,
    pub bg_color_hex_code: String,
}

#[derive(Debug, Clone)]
pub struct VideoApiConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct FalConfig {
    pub queue_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_url: String,
    pub api_key: String,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub media_bucket: String,
    pub video_bucket: String,
    pub urls: PublicUrlScheme,
}

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// Readiness check of an uploaded object's public URL.
    pub availability: PollPolicy,
    /// Completion check of a long-running remote job.
    pub remote_job: PollPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            availability: PollPolicy::attempts(10, Duration::from_secs(10)),
            remote_job: PollPolicy::deadline(Duration::from_secs(30 * 60), Duration::from_secs(15)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_address: String,
    pub secret_key: Option<String>,
    pub data_dir: PathBuf,
    pub storage: StorageConfig,
    pub draph: DraphConfig,
    pub video_api: VideoApiConfig,
    pub fal: FalConfig,
    pub openai: OpenAiConfig,
    pub pipeline: PipelineConfig,
    pub status_ttl: Duration,
    pub worker_concurrency: usize,
    pub queue_capacity: usize,
}

impl AppConfig {
    /// Reads configuration from the process environment (after `.env` has been
    /// loaded by the caller). Only API keys lack defaults; an empty key makes the
    /// corresponding upstream call fail at job time.
    pub fn from_env() -> Self {
        let port = parse_or("PORT", 3000u16);
        let bind_address = format!("0.0.0.0:{port}");
        let data_dir = non_empty("DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        let region = non_empty("MEDIA_REGION").unwrap_or_else(|| "ap-northeast-2".to_string());
        let urls = match non_empty("MEDIA_URL_STYLE").as_deref() {
            Some("s3") => PublicUrlScheme::S3 { region },
            _ => PublicUrlScheme::PathStyle {
                base: resolve_public_base_url(&bind_address),
            },
        };
        let media_bucket = non_empty("MEDIA_BUCKET").unwrap_or_else(|| "media".to_string());
        let video_bucket = non_empty("VIDEO_BUCKET").unwrap_or_else(|| media_bucket.clone());

        Self {
            bind_address,
            secret_key: non_empty("SECRET_KEY"),
            storage: StorageConfig {
                root: data_dir.join("objects"),
                media_bucket,
                video_bucket,
                urls,
            },
            data_dir,
            draph: DraphConfig {
                api_url: non_empty("DRAPHART_API_URL")
                    .unwrap_or_else(|| DEFAULT_DRAPHART_API_URL.to_string()),
                api_key: non_empty("DRAPHART_API_KEY").unwrap_or_default(),
                user_name: non_empty("DRAPHART_USER_NAME").unwrap_or_default(),
                multiblob_sod: non_empty("DRAPHART_MULTIBLOB_SOD")
                    .unwrap_or_else(|| "false".to_string()),
                bg_color_hex_code: non_empty("DRAPHART_BG_COLOR_HEX_CODE")
                    .unwrap_or_else(|| "#FFFFFF".to_string()),
            },
            video_api: VideoApiConfig {
                api_url: non_empty("VIDEO_API_URL")
                    .unwrap_or_else(|| DEFAULT_VIDEO_API_URL.to_string()),
                api_key: non_empty("VIDEO_API_KEY").unwrap_or_default(),
            },
            fal: FalConfig {
                queue_url: non_empty("FAL_QUEUE_URL")
                    .unwrap_or_else(|| DEFAULT_FAL_QUEUE_URL.to_string()),
                api_key: non_empty("FAL_KEY").unwrap_or_default(),
            },
            openai: OpenAiConfig {
                api_url: non_empty("OPENAI_API_URL")
                    .unwrap_or_else(|| DEFAULT_OPENAI_API_URL.to_string()),
                api_key: non_empty("OPENAI_API_KEY").unwrap_or_default(),
            },
            pipeline: PipelineConfig {
                availability: PollPolicy::attempts(
                    parse_or("AVAILABILITY_MAX_ATTEMPTS", 10u32).max(1),
                    Duration::from_secs(parse_or("AVAILABILITY_INTERVAL_SECS", 10u64)),
                ),
                remote_job: PollPolicy::deadline(
                    Duration::from_secs(parse_or("JOB_POLL_TIMEOUT_SECS", 30 * 60u64)),
                    Duration::from_secs(parse_or("JOB_POLL_INTERVAL_SECS", 15u64)),
                ),
            },
            status_ttl: Duration::from_secs(parse_or("STATUS_TTL_SECS", 3600u64)),
            worker_concurrency: parse_or("WORKER_CONCURRENCY", 4usize).max(1),
            queue_capacity: parse_or("QUEUE_CAPACITY", 256usize).max(1),
        }
    }

    pub fn records_dir(&self) -> PathBuf {
        self.data_dir.join("records")
    }

    pub fn mcp_path(&self) -> String {
        match self.secret_key.as_deref() {
            Some(value) => format!("/{value}/mcp"),
            None => "/mcp".to_string(),
        }
    }
}

fn non_empty(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or<T: FromStr>(name: &str, default: T) -> T {
    non_empty(name)
        .and_then(|value| value.parse::<T>().ok())
        .unwrap_or(default)
}

fn default_data_dir() -> PathBuf {
    let mut base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
    base.push("media-gen-rmcp");
    base
}

/// Base URL under which the server exposes stored objects (`/objects`).
fn resolve_public_base_url(bind_address: &str) -> String {
    if let Some(base) = non_empty("MEDIA_PUBLIC_BASE_URL") {
        return base.trim_end_matches('/').to_string();
    }
    let raw_domain = non_empty("DOMAIN").unwrap_or_else(|| bind_address.to_string());
    format!("{}/objects", normalize_origin(&raw_domain))
}

fn normalize_origin(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    let mut rest = trimmed;
    let mut scheme = "http";
    loop {
        if let Some(stripped) = rest.strip_prefix("https://") {
            scheme = "https";
            rest = stripped;
        } else if let Some(stripped) = rest.strip_prefix("http://") {
            scheme = "http";
            rest = stripped;
        } else {
            break;
        }
    }
    format!("{scheme}://{rest}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_collapse_repeated_schemes() {
        assert_eq!(normalize_origin("example.com/"), "http://example.com");
        assert_eq!(normalize_origin("http://https://example.com"), "https://example.com");
        assert_eq!(normalize_origin("https://http://example.com"), "http://example.com");
        assert_eq!(normalize_origin("http://http://0.0.0.0:3000"), "http://0.0.0.0:3000");
    }

    #[test]
    fn default_pipeline_policies_match_documented_budgets() {
        let defaults = PipelineConfig::default();
        assert_eq!(
            defaults.availability,
            PollPolicy::attempts(10, Duration::from_secs(10))
        );
        assert_eq!(defaults.remote_job.interval, Duration::from_secs(15));
    }
}
