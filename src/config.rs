use crate::services::{
    sqlite_store::{DEFAULT_BUCKET, DEFAULT_CHUNK_SIZE},
    transcoder::DEFAULT_MAX_TICKET_BYTES,
};
use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

/// Default cap on one upload request body (64 MiB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub bucket: String,
    pub chunk_size: usize,
    pub max_ticket_bytes: usize,
    pub max_upload_bytes: usize,
    pub cors_origins: Vec<String>,
    pub system_fonts: bool,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "File gateway with on-demand SVG ticket rendering")]
pub struct Args {
    /// Host to bind to (overrides TICKET_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides TICKET_STORE_PORT / SERVER_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides TICKET_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Logical bucket objects are written into (overrides TICKET_STORE_BUCKET)
    #[arg(long)]
    pub bucket: Option<String>,

    /// Bytes per stored chunk (overrides TICKET_STORE_CHUNK_SIZE)
    #[arg(long)]
    pub chunk_size: Option<usize>,

    /// Largest SVG accepted for PNG conversion (overrides TICKET_STORE_MAX_TICKET_BYTES)
    #[arg(long)]
    pub max_ticket_bytes: Option<usize>,

    /// Largest accepted upload body (overrides TICKET_STORE_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Allowed CORS origin, repeatable (overrides TICKET_STORE_CORS_ORIGINS)
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,

    /// Render tickets without loading system fonts
    #[arg(long)]
    pub no_system_fonts: bool,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |key| env::var(key))?;
        Ok((cfg, migrate))
    }

    /// Merge CLI values over values read through `lookup`, then defaults.
    pub fn resolve<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = lookup("TICKET_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match parsed_var::<u16>(&lookup, "TICKET_STORE_PORT")? {
            Some(port) => port,
            None => parsed_var::<u16>(&lookup, "SERVER_PORT")?.unwrap_or(3000),
        };
        let env_db = lookup("TICKET_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/ticket_store.db".into());
        let env_bucket = lookup("TICKET_STORE_BUCKET").unwrap_or_else(|_| DEFAULT_BUCKET.into());
        let env_chunk = parsed_var::<usize>(&lookup, "TICKET_STORE_CHUNK_SIZE")?
            .unwrap_or(DEFAULT_CHUNK_SIZE);
        let env_max_ticket = parsed_var::<usize>(&lookup, "TICKET_STORE_MAX_TICKET_BYTES")?
            .unwrap_or(DEFAULT_MAX_TICKET_BYTES);
        let env_max_upload = parsed_var::<usize>(&lookup, "TICKET_STORE_MAX_UPLOAD_BYTES")?
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        let env_origins = lookup("TICKET_STORE_CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|_| vec!["http://localhost:3000".into()]);

        // --- Merge ---
        let chunk_size = args.chunk_size.unwrap_or(env_chunk);
        if chunk_size == 0 {
            anyhow::bail!("chunk size must be greater than zero");
        }

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            database_url: args.database_url.unwrap_or(env_db),
            bucket: args.bucket.unwrap_or(env_bucket),
            chunk_size,
            max_ticket_bytes: args.max_ticket_bytes.unwrap_or(env_max_ticket),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
            cors_origins: if args.cors_origins.is_empty() {
                env_origins
            } else {
                args.cors_origins
            },
            system_fonts: !args.no_system_fonts,
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Read and parse one variable; absent is `None`, malformed is an error.
fn parsed_var<T>(
    lookup: &impl Fn(&str) -> Result<String, env::VarError>,
    key: &str,
) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(None),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
