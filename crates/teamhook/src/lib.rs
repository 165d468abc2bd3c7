//! Job lifecycle notifications for webhook endpoints.
//!
//! A [`Notifier`] takes a trigger (`start`, `success`, `failure`), the job's
//! execution data and the plugin configuration, renders the message template
//! for the trigger and POSTs it to the configured webhook. Delivery succeeds
//! only when the endpoint answers with the literal body `1`.

pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod notifier;
pub mod render;
pub mod template;
pub mod trigger;
pub mod webhook;

pub use error::{ConnectionStage, NotifyError};
pub use notifier::Notifier;
pub use render::{NotificationEvent, RenderedMessage, Renderer, TemplateCache, TemplateSource};
pub use trigger::{resolve, Color, PresentationProfile, Trigger};
pub use webhook::{HttpTransport, ProxySettings, Transport, WebhookTarget};
