use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    net::SocketAddr,
    path::{Path, PathBuf},
    time::Duration,
};
use time::UtcOffset;

use crate::scheduler::DailyTime;

pub const DEFAULT_SECRET_KEY: &str = "your-secret-key-change-this";
pub const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FeedSeed {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub access_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySeed {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_color")]
    pub color: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSeed {
    pub name: String,
    pub keywords: String,
    /// Category name; resolved against seeded categories.
    #[serde(default)]
    pub category: Option<String>,
}

/// Contents of `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    pub feeds: Vec<FeedSeed>,
    pub categories: Vec<CategorySeed>,
    pub topics: Vec<TopicSeed>,
    pub header: Option<String>,
}

/// The `aws` block of `ec2_service_role.yml`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleConfig {
    #[serde(default = "default_region")]
    pub default_region: String,
    #[serde(default)]
    pub iam_role_name: String,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            default_region: default_region(),
            iam_role_name: String::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RoleFile {
    aws: RoleConfig,
}

#[derive(Debug, Clone)]
pub struct AwsSettings {
    pub region: String,
    /// `AWS_PROFILE`, only honoured off EC2.
    pub profile: Option<String>,
    /// `USE_EC2_ROLE` override; `None` means probe the metadata service.
    pub use_ec2_role: Option<bool>,
    pub role: RoleConfig,
}

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub bind_addr: SocketAddr,
    pub database_url: String,
    pub secret_key: String,
    pub aws: AwsSettings,
    pub schedule: DailyTime,
    pub schedule_offset: UtcOffset,
    pub analysis_delay: Duration,
    pub header: Option<String>,
    pub seeds: FileConfig,
}

pub fn load(config_override: Option<PathBuf>) -> Result<RuntimeConfig> {
    let file = match config_override {
        Some(path) => {
            if !path.is_file() {
                bail!("config file not found: {}", path.display());
            }
            read_file_config(&path)?
        }
        None => match default_config_path() {
            Some(path) if path.is_file() => read_file_config(&path)?,
            _ => FileConfig::default(),
        },
    };

    let role_path = env::var("ROLE_CONFIG_PATH").unwrap_or_else(|_| "ec2_service_role.yml".into());
    let role = load_role_config(Path::new(&role_path));

    resolve(file, role, |key| env::var(key).ok())
}

/// Combine file config, role config and environment into the runtime config.
pub fn resolve(
    file: FileConfig,
    role: RoleConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<RuntimeConfig> {
    let var = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let bind_addr: SocketAddr = var("BIND_ADDR")
        .unwrap_or_else(|| "0.0.0.0:5000".into())
        .parse()
        .context("BIND_ADDR must be a socket address like 0.0.0.0:5000")?;

    let database_url = var("DATABASE_URL").unwrap_or_else(|| "sqlite:news.db?mode=rwc".into());

    let secret_key = match var("SECRET_KEY") {
        Some(k) => k,
        None => {
            tracing::warn!("SECRET_KEY is not set; using the built-in development key");
            DEFAULT_SECRET_KEY.to_string()
        }
    };

    let hour: u8 = parse_var(&var, "RSS_SCHEDULE_HOUR", 9)?;
    let minute: u8 = parse_var(&var, "RSS_SCHEDULE_MINUTE", 0)?;
    let schedule = DailyTime::new(hour, minute)
        .with_context(|| format!("invalid schedule {hour:02}:{minute:02}"))?;

    let offset_hours: i8 = parse_var(&var, "RSS_SCHEDULE_UTC_OFFSET", 0)?;
    let schedule_offset = UtcOffset::from_hms(offset_hours, 0, 0)
        .context("RSS_SCHEDULE_UTC_OFFSET must be between -25 and 25")?;

    let delay_secs: u64 = parse_var(&var, "ANALYSIS_DELAY_SECS", 2)?;

    let region = resolve_region(var("AWS_DEFAULT_REGION").as_deref(), &role);

    Ok(RuntimeConfig {
        bind_addr,
        database_url,
        secret_key,
        aws: AwsSettings {
            region,
            profile: var("AWS_PROFILE"),
            use_ec2_role: parse_ec2_override(var("USE_EC2_ROLE").as_deref()),
            role,
        },
        schedule,
        schedule_offset,
        analysis_delay: Duration::from_secs(delay_secs),
        header: file.header.clone(),
        seeds: file,
    })
}

/// `true`/`false` force the choice; anything else means auto-detect.
pub fn parse_ec2_override(value: Option<&str>) -> Option<bool> {
    match value.map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if v == "true" => Some(true),
        Some(v) if v == "false" => Some(false),
        _ => None,
    }
}

pub fn resolve_region(env_region: Option<&str>, role: &RoleConfig) -> String {
    let candidate = env_region
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(role.default_region.trim());
    if candidate.is_empty() || candidate.len() > 20 {
        DEFAULT_REGION.to_string()
    } else {
        candidate.to_string()
    }
}

pub fn load_role_config(path: &Path) -> RoleConfig {
    let parsed = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|txt| serde_yaml::from_str::<RoleFile>(&txt).map_err(anyhow::Error::from));
    match parsed {
        Ok(file) => file.aws,
        Err(e) => {
            tracing::warn!("Could not load {}: {}. Using defaults.", path.display(), e);
            RoleConfig::default()
        }
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig> {
    let txt = fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    toml::from_str(&txt).with_context(|| format!("failed to parse toml: {}", path.display()))
}

fn default_config_path() -> Option<PathBuf> {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let mut p = PathBuf::from(xdg);
        p.push("news-briefing");
        p.push("config.toml");
        return Some(p);
    }
    if let Ok(home) = env::var("HOME") {
        let mut p = PathBuf::from(home);
        p.push(".config");
        p.push("news-briefing");
        p.push("config.toml");
        return Some(p);
    }
    None
}

fn default_region() -> String {
    DEFAULT_REGION.to_string()
}

fn default_color() -> String {
    "#007bff".to_string()
}
