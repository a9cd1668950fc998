//!
//! gradebook configuration
//! -----------------------
//! A single `Config` value is assembled at startup from defaults, `GRADEBOOK_*`
//! environment variables and command-line flags (in that order of precedence)
//! and then handed to the server. Nothing reads the environment after startup.

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::warn;

pub const ENV_JWT_SECRET: &str = "GRADEBOOK_JWT_SECRET";
pub const ENV_HTTP_PORT: &str = "GRADEBOOK_HTTP_PORT";
pub const ENV_BIND: &str = "GRADEBOOK_BIND";
pub const ENV_DB_FOLDER: &str = "GRADEBOOK_DB_FOLDER";
pub const ENV_DATASET: &str = "GRADEBOOK_DATASET";
pub const ENV_TOKEN_TTL_MIN: &str = "GRADEBOOK_TOKEN_TTL_MIN";
pub const ENV_STATIC_DIR: &str = "GRADEBOOK_STATIC_DIR";
pub const ENV_UPLOAD_LIMIT: &str = "GRADEBOOK_UPLOAD_LIMIT_BYTES";

const MIN_SECRET_LEN: usize = 32;

#[derive(Clone)]
pub struct Config {
    pub bind: String,
    pub http_port: u16,
    pub db_root: PathBuf,
    /// File loaded by `POST /marks/load-csv`.
    pub dataset_path: PathBuf,
    pub static_dir: PathBuf,
    pub token_ttl_minutes: i64,
    pub upload_limit_bytes: usize,
    jwt_secret: Vec<u8>,
}

// Hand-written so the signing key never ends up in logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("bind", &self.bind)
            .field("http_port", &self.http_port)
            .field("db_root", &self.db_root)
            .field("dataset_path", &self.dataset_path)
            .field("static_dir", &self.static_dir)
            .field("token_ttl_minutes", &self.token_ttl_minutes)
            .field("upload_limit_bytes", &self.upload_limit_bytes)
            .field("jwt_secret", &"<redacted>")
            .finish()
    }
}

impl Config {
    /// Build a config with defaults around an explicitly supplied signing key.
    pub fn new(jwt_secret: impl Into<Vec<u8>>) -> Self {
        Self {
            bind: "127.0.0.1".to_string(),
            http_port: 8000,
            db_root: PathBuf::from("data"),
            dataset_path: PathBuf::from("student_dataset_100_records.csv"),
            static_dir: PathBuf::from("static"),
            token_ttl_minutes: 30,
            upload_limit_bytes: 10 * 1024 * 1024,
            jwt_secret: jwt_secret.into(),
        }
    }

    pub fn jwt_secret(&self) -> &[u8] { &self.jwt_secret }

    /// Load from the process environment, then apply command-line overrides.
    pub fn load(args: &[String]) -> Result<Self> {
        let mut cfg = Self::from_lookup(|k| std::env::var(k).ok())?;
        cfg.apply_args(args)?;
        Ok(cfg)
    }

    /// Build from an arbitrary key lookup. `load` passes the process environment.
    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> Result<Self> {
        let secret = lookup(ENV_JWT_SECRET)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("{} must be set to the token signing key", ENV_JWT_SECRET))?;
        if secret.len() < MIN_SECRET_LEN {
            warn!(target: "startup", "{} is shorter than {} bytes", ENV_JWT_SECRET, MIN_SECRET_LEN);
        }
        let mut cfg = Self::new(secret.into_bytes());

        if let Some(v) = lookup(ENV_BIND) { cfg.bind = v; }
        if let Some(v) = lookup(ENV_HTTP_PORT) { cfg.http_port = parse_num(ENV_HTTP_PORT, &v)?; }
        if let Some(v) = lookup(ENV_DB_FOLDER) { cfg.db_root = PathBuf::from(v); }
        if let Some(v) = lookup(ENV_DATASET) { cfg.dataset_path = PathBuf::from(v); }
        if let Some(v) = lookup(ENV_STATIC_DIR) { cfg.static_dir = PathBuf::from(v); }
        if let Some(v) = lookup(ENV_TOKEN_TTL_MIN) {
            let ttl: i64 = parse_num(ENV_TOKEN_TTL_MIN, &v)?;
            if ttl <= 0 { return Err(anyhow!("{} must be positive, got {}", ENV_TOKEN_TTL_MIN, ttl)); }
            cfg.token_ttl_minutes = ttl;
        }
        if let Some(v) = lookup(ENV_UPLOAD_LIMIT) { cfg.upload_limit_bytes = parse_num(ENV_UPLOAD_LIMIT, &v)?; }
        Ok(cfg)
    }

    /// Flags: `--http-port N`, `--bind ADDR`, `--db-root DIR`, `--dataset FILE`.
    pub fn apply_args(&mut self, args: &[String]) -> Result<()> {
        let mut i = 0;
        while i < args.len() {
            let flag = args[i].as_str();
            let takes_value = matches!(flag, "--http-port" | "--bind" | "--db-root" | "--dataset");
            if takes_value {
                let Some(val) = args.get(i + 1) else { return Err(anyhow!("missing value for {}", flag)); };
                match flag {
                    "--http-port" => self.http_port = parse_num(flag, val)?,
                    "--bind" => self.bind = val.clone(),
                    "--db-root" => self.db_root = PathBuf::from(val),
                    "--dataset" => self.dataset_path = PathBuf::from(val),
                    _ => {}
                }
                i += 2;
            } else {
                i += 1;
            }
        }
        Ok(())
    }
}

fn parse_num<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.trim().parse::<T>().map_err(|_| anyhow!("invalid value for {}: '{}'", name, raw))
}
