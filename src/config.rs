use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt, str::FromStr};

/// Which object store the gateway fronts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    S3,
    Memory,
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "memory" => Ok(Self::Memory),
            other => bail!("unknown backend `{}` (expected `s3` or `memory`)", other),
        }
    }
}

/// Connection details for an S3-compatible store.
#[derive(Clone)]
pub struct S3Settings {
    pub endpoint: String,
    pub bucket: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl fmt::Debug for S3Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Settings")
            .field("endpoint", &self.endpoint)
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Basic-auth credentials expected on every request.
#[derive(Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: Backend,
    /// Present when `backend` is [`Backend::S3`].
    pub s3: Option<S3Settings>,
    /// `None` disables authentication.
    pub credentials: Option<Credentials>,
    pub fanout_concurrency: usize,
    pub cors_max_age: u64,
    pub log_level: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "WebDAV gateway for S3-compatible object stores")]
pub struct Args {
    /// Host to bind to (overrides GATEWAY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides GATEWAY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Object store backend (overrides GATEWAY_BACKEND)
    #[arg(long, value_enum)]
    pub backend: Option<Backend>,

    /// S3 endpoint URL, e.g. https://s3.us-east-1.amazonaws.com (overrides GATEWAY_S3_ENDPOINT)
    #[arg(long)]
    pub s3_endpoint: Option<String>,

    /// Bucket holding the WebDAV namespace (overrides GATEWAY_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Signing region (overrides GATEWAY_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Maximum in-flight store calls per subtree operation (overrides GATEWAY_FANOUT_CONCURRENCY)
    #[arg(long)]
    pub fanout_concurrency: Option<usize>,

    /// CORS preflight max-age in seconds (overrides GATEWAY_CORS_MAX_AGE)
    #[arg(long)]
    pub cors_max_age: Option<u64>,

    /// Default log filter when RUST_LOG is unset
    #[arg(long)]
    pub log_level: Option<String>,
}

/// Source of environment values, so tests need not touch the process env.
pub trait EnvSource {
    fn var(&self, name: &str) -> Option<String>;
}

struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        env::var(name).ok()
    }
}

fn parse_env<T>(env: &dyn EnvSource, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env.var(name) {
        Some(value) => value
            .parse::<T>()
            .map_err(|err| anyhow::anyhow!("{}", err))
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(default),
    }
}

fn required(value: Option<String>, what: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => bail!("{} is required for the s3 backend", what),
    }
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::merge(Args::parse(), &ProcessEnv)
    }

    /// Merge CLI args over environment values over defaults.
    pub fn merge(args: Args, env: &dyn EnvSource) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env.var("GATEWAY_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_env(env, "GATEWAY_PORT", 8080u16)?;
        let env_backend = parse_env(env, "GATEWAY_BACKEND", Backend::S3)?;
        let env_concurrency = parse_env(env, "GATEWAY_FANOUT_CONCURRENCY", 32usize)?;
        let env_max_age = parse_env(env, "GATEWAY_CORS_MAX_AGE", 86_400u64)?;

        // --- Merge ---
        let backend = args.backend.unwrap_or(env_backend);
        let fanout_concurrency = args.fanout_concurrency.unwrap_or(env_concurrency);
        if fanout_concurrency == 0 {
            bail!("fan-out concurrency must be at least 1");
        }

        let s3 = match backend {
            Backend::Memory => None,
            Backend::S3 => Some(S3Settings {
                endpoint: required(
                    args.s3_endpoint.or_else(|| env.var("GATEWAY_S3_ENDPOINT")),
                    "--s3-endpoint / GATEWAY_S3_ENDPOINT",
                )?,
                bucket: required(
                    args.s3_bucket.or_else(|| env.var("GATEWAY_S3_BUCKET")),
                    "--s3-bucket / GATEWAY_S3_BUCKET",
                )?,
                region: args
                    .s3_region
                    .or_else(|| env.var("GATEWAY_S3_REGION"))
                    .unwrap_or_else(|| "us-east-1".into()),
                access_key_id: required(
                    env.var("GATEWAY_S3_ACCESS_KEY_ID"),
                    "GATEWAY_S3_ACCESS_KEY_ID",
                )?,
                secret_access_key: required(
                    env.var("GATEWAY_S3_SECRET_ACCESS_KEY"),
                    "GATEWAY_S3_SECRET_ACCESS_KEY",
                )?,
            }),
        };

        let credentials = match (env.var("GATEWAY_USERNAME"), env.var("GATEWAY_PASSWORD")) {
            (Some(username), Some(password)) => Some(Credentials { username, password }),
            (None, None) => None,
            _ => bail!("GATEWAY_USERNAME and GATEWAY_PASSWORD must be set together"),
        };

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            backend,
            s3,
            credentials,
            fanout_concurrency,
            cors_max_age: args.cors_max_age.unwrap_or(env_max_age),
            log_level: args
                .log_level
                .unwrap_or_else(|| "info".into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
