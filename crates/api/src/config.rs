use std::path::PathBuf;

/// Server configuration loaded from environment variables.
///
/// All fields have sensible defaults suitable for local development.
/// In production, override via environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                | Default                    |
    /// |------------------------|----------------------------|
    /// | `HOST`                 | `0.0.0.0`                  |
    /// | `PORT`                 | `3000`                     |
    /// | `CORS_ORIGINS`         | `http://localhost:5173`    |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                       |
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());

        let port: u16 = std::env::var("PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .expect("PORT must be a valid u16");

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .expect("REQUEST_TIMEOUT_SECS must be a valid u64");

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
        }
    }
}

/// Job engine configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory for uploaded files and job working directories.
    pub media_root: PathBuf,
    /// Maximum number of concurrently executing jobs. Each job is a
    /// multi-minute-to-multi-hour external computation, so the default
    /// pool is small.
    pub max_concurrent_jobs: usize,
    /// Path of the external analysis executable.
    pub analysis_bin: PathBuf,
    /// Directory the analysis process runs in.
    pub analysis_home: PathBuf,
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                |
    /// |-----------------------|------------------------|
    /// | `MEDIA_ROOT`          | `./media`              |
    /// | `MAX_CONCURRENT_JOBS` | `2`                    |
    /// | `ANALYSIS_BIN`        | `stand_alone_consurf`  |
    /// | `ANALYSIS_HOME`       | `.`                    |
    pub fn from_env() -> Self {
        let media_root = PathBuf::from(
            std::env::var("MEDIA_ROOT").unwrap_or_else(|_| "./media".into()),
        );

        let max_concurrent_jobs: usize = std::env::var("MAX_CONCURRENT_JOBS")
            .unwrap_or_else(|_| "2".into())
            .parse()
            .expect("MAX_CONCURRENT_JOBS must be a valid usize");

        let analysis_bin = PathBuf::from(
            std::env::var("ANALYSIS_BIN").unwrap_or_else(|_| "stand_alone_consurf".into()),
        );

        let analysis_home =
            PathBuf::from(std::env::var("ANALYSIS_HOME").unwrap_or_else(|_| ".".into()));

        Self {
            media_root,
            max_concurrent_jobs,
            analysis_bin,
            analysis_home,
        }
    }
}
