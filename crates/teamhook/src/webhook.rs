use std::fmt;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::header::HeaderValue;
use tracing::{info, warn};
use url::Url;

use crate::error::{BoxError, ConnectionStage, NotifyError};
use crate::render::RenderedMessage;

/// HTTP proxy the webhook is reached through.
#[derive(Clone, PartialEq, Eq)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl ProxySettings {
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// `Proxy-Authorization` value, present when a non-empty user is set.
    pub fn authorization(&self) -> Option<String> {
        let user = self.user.as_deref().filter(|u| !u.is_empty())?;
        let password = self.password.as_deref().unwrap_or_default();
        Some(format!("Basic {}", STANDARD.encode(format!("{user}:{password}"))))
    }
}

impl fmt::Debug for ProxySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxySettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Destination of one notification.
#[derive(Debug, Clone)]
pub struct WebhookTarget {
    pub url: Url,
    pub proxy: Option<ProxySettings>,
}

impl WebhookTarget {
    pub fn parse(url: &str, proxy: Option<ProxySettings>) -> Result<Self, NotifyError> {
        let malformed = |reason: String| NotifyError::Url {
            url: url.to_string(),
            reason,
        };
        let parsed = Url::parse(url).map_err(|e| malformed(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(malformed(format!("unsupported scheme `{}`", parsed.scheme())));
        }
        Ok(Self { url: parsed, proxy })
    }
}

/// Sends a rendered message and returns the raw response text.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, target: &WebhookTarget, body: &RenderedMessage) -> Result<String, NotifyError>;
}

/// Plain HTTP POST over `reqwest`.
///
/// Each delivery builds its own client and keeps no idle connections, so the
/// connection is closed once the response body has been read or the call
/// fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpTransport;

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, target: &WebhookTarget, body: &RenderedMessage) -> Result<String, NotifyError> {
        let client = build_client(target.proxy.as_ref())?;

        info!(
            host = target.url.host_str().unwrap_or_default(),
            proxied = target.proxy.is_some(),
            "posting notification"
        );
        let response = client
            .post(target.url.clone())
            .header("charset", "utf-8")
            .body(body.as_str().to_owned())
            .send()
            .await
            .map_err(|e| {
                let stage = if e.is_connect() {
                    ConnectionStage::Open
                } else {
                    ConnectionStage::Send
                };
                NotifyError::connection(stage, e)
            })?;

        // A non-success status still carries a body worth reporting.
        let status = response.status();
        if status.is_success() {
            info!(%status, "webhook responded");
        } else {
            warn!(%status, "webhook responded with non-success status");
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| NotifyError::connection(ConnectionStage::Read, e))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

/// Proxy routing comes only from `proxy`; environment proxy variables of
/// other tools are ignored.
fn build_client(proxy: Option<&ProxySettings>) -> Result<reqwest::Client, NotifyError> {
    let open = |e: BoxError| NotifyError::connection(ConnectionStage::Open, e);

    let mut builder = reqwest::Client::builder().pool_max_idle_per_host(0);
    match proxy {
        Some(settings) => {
            let mut p = reqwest::Proxy::all(settings.url()).map_err(|e| open(e.into()))?;
            if let Some(auth) = settings.authorization() {
                let mut value = HeaderValue::from_str(&auth).map_err(|e| open(e.into()))?;
                value.set_sensitive(true);
                p = p.custom_http_auth(value);
            }
            builder = builder.proxy(p);
        }
        None => {
            builder = builder.no_proxy();
        }
    }
    builder.build().map_err(|e| open(e.into()))
}
