use serde_json::{Map, Value};
use tracing::{info, instrument};

use crate::error::NotifyError;
use crate::render::{NotificationEvent, RenderedMessage, Renderer};
use crate::trigger;
use crate::webhook::{HttpTransport, ProxySettings, Transport, WebhookTarget};

/// Response body the webhook returns once it has accepted a message.
pub const SUCCESS_MARKER: &str = "1";

/// Key of the plugin configuration entry holding the destination URL.
pub const WEBHOOK_URL_KEY: &str = "webhook_url";

/// Entry point for job notifications: validate, render, deliver, interpret.
pub struct Notifier<T = HttpTransport> {
    renderer: Renderer,
    transport: T,
    proxy: Option<ProxySettings>,
    default_url: Option<String>,
}

impl Notifier<HttpTransport> {
    pub fn new(renderer: Renderer, proxy: Option<ProxySettings>) -> Self {
        Self::with_transport(renderer, HttpTransport, proxy)
    }
}

impl<T: Transport> Notifier<T> {
    pub fn with_transport(renderer: Renderer, transport: T, proxy: Option<ProxySettings>) -> Self {
        Self {
            renderer,
            transport,
            proxy,
            default_url: None,
        }
    }

    /// URL used when the per-call configuration has no `webhook_url`.
    pub fn with_default_url(mut self, url: Option<String>) -> Self {
        self.default_url = url;
        self
    }

    /// Validate the trigger and render its message without sending it.
    pub fn render(
        &self,
        trigger: &str,
        execution_data: &Value,
        config: &Map<String, Value>,
    ) -> Result<RenderedMessage, NotifyError> {
        let (trigger, profile) = trigger::resolve(trigger)?;
        let event = NotificationEvent::new(trigger, execution_data.clone(), config.clone());
        Ok(self.renderer.render(profile, &event)?)
    }

    /// Send one notification.
    ///
    /// Returns `Ok(true)` only when the webhook answers with exactly `1`;
    /// every other outcome is an error.
    #[instrument(skip(self, execution_data, config))]
    pub async fn notify(
        &self,
        trigger: &str,
        execution_data: &Value,
        config: &Map<String, Value>,
    ) -> Result<bool, NotifyError> {
        let message = self.render(trigger, execution_data, config)?;
        let target = self.target(config)?;

        let response = self.transport.deliver(&target, &message).await?;
        if response == SUCCESS_MARKER {
            info!("notification delivered");
            Ok(true)
        } else {
            Err(NotifyError::Response {
                body: response,
                payload: message.into_string(),
            })
        }
    }

    fn target(&self, config: &Map<String, Value>) -> Result<WebhookTarget, NotifyError> {
        let url = match config.get(WEBHOOK_URL_KEY) {
            Some(Value::String(url)) => url.as_str(),
            Some(other) => {
                return Err(NotifyError::Url {
                    url: other.to_string(),
                    reason: format!("{WEBHOOK_URL_KEY} must be a string"),
                })
            }
            None => self.default_url.as_deref().ok_or_else(|| NotifyError::Url {
                url: String::new(),
                reason: format!("{WEBHOOK_URL_KEY} is not configured"),
            })?,
        };
        WebhookTarget::parse(url, self.proxy.clone())
    }
}
