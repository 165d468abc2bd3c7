use std::fmt;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use mini_moka::sync::Cache;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::template::{Template, TemplateEngine, TemplateError};
use crate::trigger::{PresentationProfile, Trigger, TEAM_MESSAGE_TEMPLATE};

pub const DEFAULT_STRONG_CAPACITY: u64 = 20;
pub const DEFAULT_SOFT_CAPACITY: u64 = 250;

const BUILT_IN_TEMPLATES: &[(&str, &str)] = &[(
    TEAM_MESSAGE_TEMPLATE,
    include_str!("../templates/team-incoming-message.json"),
)];

/// One job event as handed over by the scheduler.
#[derive(Debug, Clone)]
pub struct NotificationEvent {
    pub trigger: Trigger,
    pub execution_data: Value,
    pub config: Map<String, Value>,
}

impl NotificationEvent {
    pub fn new(trigger: Trigger, execution_data: Value, config: Map<String, Value>) -> Self {
        Self {
            trigger,
            execution_data,
            config,
        }
    }

    /// Data model exposed to templates.
    fn model(&self, profile: &PresentationProfile) -> Value {
        json!({
            "trigger": self.trigger.as_str(),
            "color": profile.color.code(),
            "executionData": self.execution_data,
            "config": self.config,
        })
    }
}

/// Final message body, sent verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedMessage(String);

impl RenderedMessage {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for RenderedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where template text is read from. Chosen once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TemplateSource {
    #[default]
    BuiltIn,
    /// External directory; names it does not contain fall back to the
    /// built-in set.
    Directory(PathBuf),
}

impl TemplateSource {
    fn load(&self, name: &str) -> Result<String, TemplateError> {
        if let TemplateSource::Directory(dir) = self {
            let path = dir.join(name);
            match std::fs::read_to_string(&path) {
                Ok(text) => {
                    debug!(template = name, path = %path.display(), "loaded external template");
                    return Ok(text);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(source) => {
                    return Err(TemplateError::Load {
                        name: name.to_string(),
                        source,
                    })
                }
            }
        }
        BUILT_IN_TEMPLATES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, text)| text.to_string())
            .ok_or_else(|| TemplateError::NotFound {
                name: name.to_string(),
            })
    }
}

/// Compiled templates held in two bounded tiers: a small set of hot entries
/// and a larger overflow. Entries found only in the overflow are promoted.
pub struct TemplateCache {
    strong: Cache<String, Arc<Template>>,
    soft: Cache<String, Arc<Template>>,
}

impl TemplateCache {
    pub fn new(strong: u64, soft: u64) -> Self {
        Self {
            strong: Cache::builder().max_capacity(strong).build(),
            soft: Cache::builder().max_capacity(soft).build(),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Template>> {
        let key = name.to_string();
        if let Some(template) = self.strong.get(&key) {
            return Some(template);
        }
        let template = self.soft.get(&key)?;
        self.strong.insert(key, template.clone());
        Some(template)
    }

    pub fn insert(&self, name: &str, template: Arc<Template>) {
        self.strong.insert(name.to_string(), template.clone());
        self.soft.insert(name.to_string(), template);
    }
}

impl Default for TemplateCache {
    fn default() -> Self {
        Self::new(DEFAULT_STRONG_CAPACITY, DEFAULT_SOFT_CAPACITY)
    }
}

/// Merges notification events into message templates.
#[derive(Default)]
pub struct Renderer {
    source: TemplateSource,
    cache: TemplateCache,
    engine: TemplateEngine,
}

impl Renderer {
    pub fn new(source: TemplateSource, cache: TemplateCache) -> Self {
        Self {
            source,
            cache,
            engine: TemplateEngine::default(),
        }
    }

    /// Compiled template by name, compiling and caching it on first use.
    ///
    /// Concurrent first uses may compile the same template twice; the last
    /// insert wins and both results are equivalent.
    pub fn template(&self, name: &str) -> Result<Arc<Template>, TemplateError> {
        if let Some(template) = self.cache.get(name) {
            debug!(template = name, "template cache hit");
            return Ok(template);
        }
        let text = self.source.load(name)?;
        let template = Arc::new(self.engine.compile(name, &text)?);
        self.cache.insert(name, template.clone());
        debug!(template = name, "compiled template");
        Ok(template)
    }

    pub fn render(
        &self,
        profile: &PresentationProfile,
        event: &NotificationEvent,
    ) -> Result<RenderedMessage, TemplateError> {
        let template = self.template(profile.template)?;
        let body = self.engine.render(&template, &event.model(profile))?;
        debug!(
            template = template.name(),
            trigger = %event.trigger,
            color = profile.color.name(),
            bytes = body.len(),
            "rendered message"
        );
        Ok(RenderedMessage(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::fs;

    fn execution_data() -> Value {
        json!({
            "id": 1337,
            "href": "https://rundeck.example.test/project/ops/execution/show/1337",
            "status": "succeeded",
            "user": "admin",
            "dateStarted": "2026-10-16T08:00:00Z",
            "dateEnded": "2026-10-16T08:01:12Z",
            "project": "ops",
            "job": { "name": "nightly \"backup\"", "group": "maintenance" }
        })
    }

    fn event(trigger: Trigger, execution_data: Value) -> NotificationEvent {
        let mut config = Map::new();
        config.insert("webhook_url".into(), json!("https://example.test/hook"));
        NotificationEvent::new(trigger, execution_data, config)
    }

    #[test]
    fn built_in_template_renders_valid_card_for_every_trigger() {
        let renderer = Renderer::default();
        for trigger in Trigger::ALL {
            let profile = trigger.profile();
            let message = renderer.render(profile, &event(trigger, execution_data())).unwrap();
            let card: Value = serde_json::from_str(message.as_str()).unwrap();

            assert_eq!(card["themeColor"], profile.color.code());
            assert_eq!(
                card["sections"][0]["activityTitle"],
                "maintenance/nightly \"backup\""
            );
            assert_eq!(
                card["sections"][0]["activitySubtitle"],
                format!("Execution #1337 {}", trigger.as_str().to_uppercase())
            );
            assert_eq!(card["sections"][0]["facts"].as_array().unwrap().len(), 5);
            assert_eq!(
                card["potentialAction"][0]["targets"][0]["uri"],
                "https://rundeck.example.test/project/ops/execution/show/1337"
            );
        }
    }

    #[test]
    fn built_in_template_tolerates_sparse_execution_data() {
        let renderer = Renderer::default();
        let message = renderer
            .render(Trigger::Start.profile(), &event(Trigger::Start, json!({})))
            .unwrap();
        let card: Value = serde_json::from_str(message.as_str()).unwrap();
        assert_eq!(card["summary"], "Job start: unnamed job");
        assert!(card.get("potentialAction").is_none());
        assert_eq!(card["sections"][0]["facts"].as_array().unwrap().len(), 4);
    }

    #[test]
    fn string_execution_id_is_escaped() {
        let renderer = Renderer::default();
        let data = json!({ "id": "a\"b", "job": { "name": "x\ny" } });
        let message = renderer
            .render(Trigger::Start.profile(), &event(Trigger::Start, data))
            .unwrap();
        let card: Value = serde_json::from_str(message.as_str()).unwrap();
        assert_eq!(card["sections"][0]["activitySubtitle"], "Execution #a\"b START");
        assert_eq!(card["summary"], "Job start: x\ny");
    }

    #[test]
    fn rendering_is_deterministic() {
        let renderer = Renderer::default();
        let ev = event(Trigger::Failure, execution_data());
        let first = renderer.render(Trigger::Failure.profile(), &ev).unwrap();
        let second = Renderer::default()
            .render(Trigger::Failure.profile(), &ev)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn compiled_templates_are_cached() {
        let renderer = Renderer::default();
        let a = renderer.template(TEAM_MESSAGE_TEMPLATE).unwrap();
        let b = renderer.template(TEAM_MESSAGE_TEMPLATE).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn overflow_tier_promotes_entries() {
        let cache = TemplateCache::new(1, 10);
        let t = Arc::new(TemplateEngine::default().compile("a", "a").unwrap());
        cache.soft.insert("a".to_string(), t.clone());
        let hit = cache.get("a").unwrap();
        assert!(Arc::ptr_eq(&hit, &t));
        assert!(cache.strong.get(&"a".to_string()).is_some());
    }

    #[test]
    fn unknown_template_is_not_found() {
        let renderer = Renderer::default();
        assert_matches!(
            renderer.template("missing.json"),
            Err(TemplateError::NotFound { name }) if name == "missing.json"
        );
    }

    #[test]
    fn directory_source_overrides_built_in() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(TEAM_MESSAGE_TEMPLATE),
            "{{trigger}}|{{color}}|{{config.webhook_url}}",
        )
        .unwrap();
        let renderer = Renderer::new(
            TemplateSource::Directory(dir.path().to_path_buf()),
            TemplateCache::default(),
        );
        let message = renderer
            .render(Trigger::Success.profile(), &event(Trigger::Success, json!({})))
            .unwrap();
        assert_eq!(message.as_str(), "success|2EB886|https://example.test/hook");
    }

    #[test]
    fn directory_source_falls_back_when_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let renderer = Renderer::new(
            TemplateSource::Directory(dir.path().to_path_buf()),
            TemplateCache::default(),
        );
        let message = renderer
            .render(Trigger::Start.profile(), &event(Trigger::Start, json!({})))
            .unwrap();
        assert!(message.as_str().contains("MessageCard"));
    }

    #[test]
    fn broken_external_template_is_a_template_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(TEAM_MESSAGE_TEMPLATE), "{{trigger").unwrap();
        let renderer = Renderer::new(
            TemplateSource::Directory(dir.path().to_path_buf()),
            TemplateCache::default(),
        );
        assert_matches!(
            renderer.render(Trigger::Start.profile(), &event(Trigger::Start, json!({}))),
            Err(TemplateError::Syntax { .. })
        );
    }
}
