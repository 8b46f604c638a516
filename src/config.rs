use crate::models::policy::DEFAULT_MAX_UPLOAD_BYTES;
use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized relay configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub allowed_origins: String,
    pub max_upload_bytes: u64,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Media upload relay for the powder feed")]
pub struct Args {
    /// Host to bind to (overrides POWDER_RELAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides POWDER_RELAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where media payloads are stored (overrides POWDER_RELAY_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides POWDER_RELAY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// CORS allow-origin: `*` or a comma-separated list (overrides POWDER_RELAY_ALLOWED_ORIGINS)
    #[arg(long)]
    pub allowed_origins: Option<String>,

    /// Upload size ceiling in bytes (overrides POWDER_RELAY_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<u64>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl RelayConfig {
    /// Parse environment variables + CLI args into RelayConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        dotenvy::dotenv().ok();

        // Parse CLI once
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("POWDER_RELAY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("POWDER_RELAY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing POWDER_RELAY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 3000,
            Err(err) => return Err(err).context("reading POWDER_RELAY_PORT"),
        };
        let env_storage =
            env::var("POWDER_RELAY_STORAGE_DIR").unwrap_or_else(|_| "./data/media".into());
        let env_db = env::var("POWDER_RELAY_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/powder_media.db".into());
        let env_origins = env::var("POWDER_RELAY_ALLOWED_ORIGINS").unwrap_or_else(|_| "*".into());
        let env_max_upload = match env::var("POWDER_RELAY_MAX_UPLOAD_BYTES") {
            Ok(value) => value.parse::<u64>().with_context(|| {
                format!("parsing POWDER_RELAY_MAX_UPLOAD_BYTES value `{}`", value)
            })?,
            Err(env::VarError::NotPresent) => DEFAULT_MAX_UPLOAD_BYTES,
            Err(err) => return Err(err).context("reading POWDER_RELAY_MAX_UPLOAD_BYTES"),
        };

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            allowed_origins: args.allowed_origins.unwrap_or(env_origins),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        Ok((cfg, args.migrate))
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration for the client-side toolkit: where the relay, the public
/// media host, the backend API, and the optional assist and location
/// services live.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub relay_url: String,
    pub public_media_url: String,
    pub api_url: String,
    pub assist: AssistConfig,
    pub location: LocationConfig,
}

#[derive(Debug, Clone)]
pub struct AssistConfig {
    pub api_url: String,
    pub api_key: String,
    pub model: String,
}

#[derive(Debug, Clone)]
pub struct LocationConfig {
    pub api_url: String,
    pub api_key: String,
}

impl ClientConfig {
    /// Read the toolkit configuration from the environment. Empty values are
    /// allowed; components missing their endpoint degrade or warn at use
    /// time rather than failing construction.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            relay_url: env::var("POWDER_RELAY_URL").unwrap_or_default(),
            public_media_url: env::var("POWDER_PUBLIC_MEDIA_URL").unwrap_or_default(),
            api_url: env::var("POWDER_API_URL")
                .unwrap_or_else(|_| "http://localhost:5000".into()),
            assist: AssistConfig {
                api_url: env::var("POWDER_ASSIST_API_URL")
                    .unwrap_or_else(|_| "https://api.z.ai/api/paas/v4".into()),
                api_key: env::var("POWDER_ASSIST_API_KEY").unwrap_or_default(),
                model: env::var("POWDER_ASSIST_MODEL")
                    .unwrap_or_else(|_| "glm-4.7-flash".into()),
            },
            location: LocationConfig {
                api_url: env::var("POWDER_LOCATION_API_URL").unwrap_or_else(|_| {
                    "https://api.geoapify.com/v1/geocode/autocomplete".into()
                }),
                api_key: env::var("POWDER_LOCATION_API_KEY").unwrap_or_default(),
            },
        }
    }
}
