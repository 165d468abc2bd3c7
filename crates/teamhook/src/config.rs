use std::fmt;
use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::notifier::Notifier;
use crate::render::{Renderer, TemplateCache, TemplateSource, DEFAULT_SOFT_CAPACITY, DEFAULT_STRONG_CAPACITY};
use crate::webhook::ProxySettings;

const DEFAULT_CONFIG_NAME: &str = "teamhook.toml";

pub const PROXY_HOST_ENV: &str = "HTTP_PROXY_HOST";
pub const PROXY_PORT_ENV: &str = "HTTP_PROXY_PORT";
pub const PROXY_USER_ENV: &str = "HTTP_PROXY_USER";
pub const PROXY_PASSWORD_ENV: &str = "HTTP_PROXY_PASSWORD";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Used when a notification does not carry its own `webhook_url`.
    pub webhook_url: Option<String>,
    /// External template directory overriding the built-in templates
    pub template_dir: Option<PathBuf>,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    /// Plugin configuration exposed to templates as `config.*`.
    #[serde(default)]
    pub options: Map<String, Value>,
}

#[derive(Clone, Default, Deserialize)]
pub struct ProxyConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_strong")]
    pub strong: u64,
    #[serde(default = "default_soft")]
    pub soft: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            strong: DEFAULT_STRONG_CAPACITY,
            soft: DEFAULT_SOFT_CAPACITY,
        }
    }
}

fn default_strong() -> u64 {
    DEFAULT_STRONG_CAPACITY
}

fn default_soft() -> u64 {
    DEFAULT_SOFT_CAPACITY
}

impl Config {
    /// Load configuration from an explicit path, or search upward from the
    /// current dir and then the user config dir. Defaults apply when nothing
    /// is found.
    pub fn load(path_override: Option<PathBuf>) -> Result<Self> {
        let path = match path_override {
            Some(p) => p,
            None => match find_upwards(DEFAULT_CONFIG_NAME).or_else(user_config_file) {
                Some(p) => p,
                None => return Ok(Self::default()),
            },
        };

        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Reading config file {}", path.display()))?;
        let cfg: Config = toml::from_str(&contents)
            .with_context(|| format!("Parsing TOML config {}", path.display()))?;
        Ok(cfg)
    }

    /// Proxy settings with the `HTTP_PROXY_*` environment variables taking
    /// precedence over the `[proxy]` table.
    pub fn proxy_settings(&self) -> Result<Option<ProxySettings>> {
        self.proxy_settings_from(|key| std::env::var(key).ok())
    }

    fn proxy_settings_from(&self, env: impl Fn(&str) -> Option<String>) -> Result<Option<ProxySettings>> {
        let env = |key: &str| env(key).filter(|v| !v.is_empty());

        let Some(host) = env(PROXY_HOST_ENV).or_else(|| self.proxy.host.clone()) else {
            return Ok(None);
        };
        let port = match env(PROXY_PORT_ENV) {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .with_context(|| format!("Invalid {PROXY_PORT_ENV} value '{raw}'"))?,
            None => match self.proxy.port {
                Some(port) => port,
                None => bail!("Proxy host '{host}' is set but no proxy port is configured"),
            },
        };

        Ok(Some(ProxySettings {
            host,
            port,
            user: env(PROXY_USER_ENV).or_else(|| self.proxy.user.clone()),
            password: env(PROXY_PASSWORD_ENV).or_else(|| self.proxy.password.clone()),
        }))
    }

    pub fn template_source(&self) -> TemplateSource {
        match &self.template_dir {
            Some(dir) => TemplateSource::Directory(dir.clone()),
            None => TemplateSource::BuiltIn,
        }
    }

    pub fn template_cache(&self) -> TemplateCache {
        TemplateCache::new(self.cache.strong, self.cache.soft)
    }

    /// Notifier wired from this configuration and the ambient proxy settings.
    pub fn notifier(&self) -> Result<Notifier> {
        let renderer = Renderer::new(self.template_source(), self.template_cache());
        Ok(Notifier::new(renderer, self.proxy_settings()?).with_default_url(self.webhook_url.clone()))
    }
}

fn find_upwards(file_name: &str) -> Option<PathBuf> {
    let mut dir = std::env::current_dir().ok()?;
    loop {
        let candidate = dir.join(file_name);
        if candidate.exists() {
            return Some(candidate);
        }
        if !dir.pop() {
            break;
        }
    }
    None
}

fn user_config_file() -> Option<PathBuf> {
    let candidate = dirs::config_dir()?.join("teamhook").join(DEFAULT_CONFIG_NAME);
    candidate.exists().then_some(candidate)
}
