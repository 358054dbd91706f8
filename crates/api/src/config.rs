use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use blackroad_db::ledger::operations::DEFAULT_OUTPUT_CAP;
use blackroad_db::ledger::transcripts::DEFAULT_TRANSCRIPT_CAP;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} has invalid value '{value}': {reason}")]
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for running on the device itself.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `8000`).
    pub port: u16,
    /// SQLite database URL (default: `sqlite://blackroad.db`).
    pub database_url: String,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    /// Upper bound for a synchronous `POST /jobs/run` (default: `600`).
    pub job_run_timeout_secs: u64,
    pub job_output_cap_bytes: usize,
    pub transcript_cap_bytes: usize,
    /// How long a cancelled stream may run before its process is killed.
    pub stream_cancel_grace_ms: u64,
    /// Only models under this directory may be loaded.
    pub models_dir: PathBuf,
    /// Where uploaded audio is kept until transcribed.
    pub transcribe_tmp: PathBuf,
    /// Default ssh target for remote jobs.
    pub remote_host: String,
    pub remote_user: String,
    /// Imaging helper invoked by the flash stream.
    pub flash_helper: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            database_url: "sqlite://blackroad.db".into(),
            cors_origins: vec!["http://localhost:5173".into()],
            request_timeout_secs: 30,
            job_run_timeout_secs: 600,
            job_output_cap_bytes: DEFAULT_OUTPUT_CAP,
            transcript_cap_bytes: DEFAULT_TRANSCRIPT_CAP,
            stream_cancel_grace_ms: 2000,
            models_dir: PathBuf::from("/var/lib/blackroad/models"),
            transcribe_tmp: PathBuf::from("/tmp/blackroad_whisper"),
            remote_host: "jetson.local".into(),
            remote_user: "jetson".into(),
            flash_helper: "blackroad-flash".into(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                      |
    /// |--------------------------|------------------------------|
    /// | `HOST`                   | `0.0.0.0`                    |
    /// | `PORT`                   | `8000`                       |
    /// | `DATABASE_URL`           | `sqlite://blackroad.db`      |
    /// | `CORS_ORIGINS`           | `http://localhost:5173`      |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                         |
    /// | `JOB_RUN_TIMEOUT_SECS`   | `600`                        |
    /// | `JOB_OUTPUT_CAP_BYTES`   | `262144`                     |
    /// | `TRANSCRIPT_CAP_BYTES`   | `524288`                     |
    /// | `STREAM_CANCEL_GRACE_MS` | `2000`                       |
    /// | `MODELS_DIR`             | `/var/lib/blackroad/models`  |
    /// | `TRANSCRIBE_TMP`         | `/tmp/blackroad_whisper`     |
    /// | `REMOTE_HOST`            | `jetson.local`               |
    /// | `REMOTE_USER`            | `jetson`                     |
    /// | `FLASH_HELPER`           | `blackroad-flash`            |
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or(defaults.cors_origins);
        for origin in &cors_origins {
            if origin.parse::<axum::http::HeaderValue>().is_err() {
                return Err(ConfigError::Invalid {
                    var: "CORS_ORIGINS",
                    value: origin.clone(),
                    reason: "not a valid header value".into(),
                });
            }
        }

        Ok(Self {
            host: env_or("HOST", defaults.host),
            port: parse_env("PORT", defaults.port)?,
            database_url: env_or("DATABASE_URL", defaults.database_url),
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            job_run_timeout_secs: parse_env("JOB_RUN_TIMEOUT_SECS", defaults.job_run_timeout_secs)?,
            job_output_cap_bytes: parse_env("JOB_OUTPUT_CAP_BYTES", defaults.job_output_cap_bytes)?,
            transcript_cap_bytes: parse_env("TRANSCRIPT_CAP_BYTES", defaults.transcript_cap_bytes)?,
            stream_cancel_grace_ms: parse_env(
                "STREAM_CANCEL_GRACE_MS",
                defaults.stream_cancel_grace_ms,
            )?,
            models_dir: std::env::var_os("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            transcribe_tmp: std::env::var_os("TRANSCRIBE_TMP")
                .map(PathBuf::from)
                .unwrap_or(defaults.transcribe_tmp),
            remote_host: env_or("REMOTE_HOST", defaults.remote_host),
            remote_user: env_or("REMOTE_USER", defaults.remote_user),
            flash_helper: env_or("FLASH_HELPER", defaults.flash_helper),
        })
    }

    pub fn cancel_grace(&self) -> Duration {
        Duration::from_millis(self.stream_cancel_grace_ms)
    }
}

fn env_or(var: &str, default: String) -> String {
    std::env::var(var).unwrap_or(default)
}

fn parse_env<T>(var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
