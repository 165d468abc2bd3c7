//! Message templates.
//!
//! Templates are Handlebars sources rendered against a `serde_json::Value`
//! model. The registry runs in strict mode, so `{{executionData.id}}` fails
//! when the value is missing. Interpolated text is escaped for a JSON string
//! body; `{{{path}}}` inserts it raw.
//!
//! Helpers on top of the Handlebars built-ins:
//!
//! - `{{default path "fallback"}}` renders the fallback when the value is
//!   missing or null.
//! - `{{upper path}}`, `{{lower path}}`, `{{cap_first path}}` change case.

use handlebars::{
    handlebars_helper, Context, Handlebars, Helper, HelperDef, RenderContext, RenderError,
    RenderErrorReason, ScopedJson,
};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Error loading notification message template [{name}]: not found.")]
    NotFound { name: String },

    #[error("Error loading notification message template [{name}]: {source}.")]
    Load {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Error parsing notification message template [{name}]: {source}")]
    Syntax {
        name: String,
        #[source]
        source: handlebars::TemplateError,
    },

    #[error("Error merging notification message template [{name}]: {source}")]
    Render {
        name: String,
        #[source]
        source: handlebars::RenderError,
    },
}

/// `{{default path "fallback"}}`. Missing params reach the helper as null,
/// strict mode included.
#[derive(Debug, Clone, Copy)]
struct DefaultHelper;

impl HelperDef for DefaultHelper {
    fn call_inner<'reg: 'rc, 'rc>(
        &self,
        h: &Helper<'rc>,
        _: &'reg Handlebars<'reg>,
        _: &'rc Context,
        _: &mut RenderContext<'reg, 'rc>,
    ) -> Result<ScopedJson<'rc>, RenderError> {
        let value = h.param(0).map(|p| p.value()).filter(|v| !v.is_null());
        match value.or_else(|| h.param(1).map(|p| p.value())) {
            Some(v) => Ok(ScopedJson::Derived(v.clone())),
            None => Err(RenderErrorReason::ParamNotFoundForIndex("default", 1).into()),
        }
    }
}

handlebars_helper!(upper: |text: str| text.to_uppercase());
handlebars_helper!(lower: |text: str| text.to_lowercase());
handlebars_helper!(cap_first: |text: str| {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
        None => String::new(),
    }
});

/// Escapes `text` for use inside a JSON string literal.
pub fn json_escape(text: &str) -> String {
    let quoted = Value::String(text.to_owned()).to_string();
    quoted[1..quoted.len() - 1].to_owned()
}

/// A compiled template.
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    compiled: handlebars::Template,
}

impl Template {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Handlebars registry settings shared by every message template.
#[derive(Clone)]
pub struct TemplateEngine {
    registry: Handlebars<'static>,
}

impl Default for TemplateEngine {
    fn default() -> Self {
        let mut registry = Handlebars::new();
        registry.set_strict_mode(true);
        registry.register_escape_fn(json_escape);
        registry.register_helper("default", Box::new(DefaultHelper));
        registry.register_helper("upper", Box::new(upper));
        registry.register_helper("lower", Box::new(lower));
        registry.register_helper("cap_first", Box::new(cap_first));
        Self { registry }
    }
}

impl TemplateEngine {
    pub fn compile(&self, name: &str, source: &str) -> Result<Template, TemplateError> {
        let compiled = handlebars::Template::compile(source).map_err(|source| TemplateError::Syntax {
            name: name.to_string(),
            source,
        })?;
        Ok(Template {
            name: name.to_string(),
            compiled,
        })
    }

    pub fn render(&self, template: &Template, model: &Value) -> Result<String, TemplateError> {
        let mut registry = self.registry.clone();
        registry.register_template(&template.name, template.compiled.clone());
        registry
            .render(&template.name, model)
            .map_err(|source| TemplateError::Render {
                name: template.name.clone(),
                source,
            })
    }
}
