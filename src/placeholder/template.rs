//! Named templates rendered through the `template` placeholder.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tracing::info;

use crate::context::Context;
use crate::placeholder::PlaceholderPipeline;
use crate::placeholder::filter::FilterNode;
use crate::processor::{Processor, ProcessorError, ProcessorResult};

/// A fragment of a template, included only when its filter accepts.
///
/// Configured either as a bare string or as `{"text": ..., "if": filter}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "StepSpec")]
pub struct TemplateStep {
    pub text: String,
    pub filter: FilterNode,
}

impl TemplateStep {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            filter: FilterNode::None,
        }
    }

    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = filter;
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StepSpec {
    Text(String),
    Step {
        text: String,
        #[serde(default, alias = "if")]
        filter: FilterNode,
    },
}

impl From<StepSpec> for TemplateStep {
    fn from(spec: StepSpec) -> Self {
        match spec {
            StepSpec::Text(text) => TemplateStep::new(text),
            StepSpec::Step { text, filter } => TemplateStep { text, filter },
        }
    }
}

/// Ordered steps; the rendering is the concatenation of accepted steps.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(transparent)]
pub struct Template {
    pub steps: Vec<TemplateStep>,
}

impl Template {
    pub fn new(steps: Vec<TemplateStep>) -> Self {
        Self { steps }
    }
}

/// Configured templates, plus defaults registered by code that the
/// configuration may override.
#[derive(Debug, Default)]
pub struct TemplateManager {
    templates: RwLock<HashMap<String, Arc<Template>>>,
    defaults: RwLock<HashMap<String, Arc<Template>>>,
}

impl TemplateManager {
    pub fn new(templates: HashMap<String, Template>) -> Self {
        Self {
            templates: RwLock::new(wrap(templates)),
            defaults: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<Template>> {
        let configured = self
            .templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned();
        configured.or_else(|| {
            self.defaults
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(name)
                .cloned()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn set_default(&self, name: impl Into<String>, template: Template) {
        self.defaults
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Arc::new(template));
    }

    /// Replace the configured templates. Defaults are kept.
    pub fn reload(&self, templates: HashMap<String, Template>) {
        let count = templates.len();
        *self
            .templates
            .write()
            .unwrap_or_else(PoisonError::into_inner) = wrap(templates);
        info!("Reloaded {} templates", count);
    }
}

fn wrap(templates: HashMap<String, Template>) -> HashMap<String, Arc<Template>> {
    templates
        .into_iter()
        .map(|(name, template)| (name, Arc::new(template)))
        .collect()
}

/// Renders the template named by the query: `%template:chat_format%`.
///
/// Unknown templates yield no value, leaving the token visible.
pub struct TemplateProcessor {
    engine: Weak<PlaceholderPipeline>,
    templates: Arc<TemplateManager>,
}

impl TemplateProcessor {
    pub fn new(engine: Weak<PlaceholderPipeline>, templates: Arc<TemplateManager>) -> Self {
        Self { engine, templates }
    }
}

#[async_trait]
impl Processor<Option<String>> for TemplateProcessor {
    async fn process(&self, ctx: &Context) -> ProcessorResult<Option<String>> {
        let Some(template) = self.templates.get(&ctx.message) else {
            return Ok(None);
        };
        let engine = self
            .engine
            .upgrade()
            .ok_or_else(|| ProcessorError::Failed("Placeholder engine dropped".to_string()))?;

        let nested = ctx.nested();
        let steps = template.steps.iter().map(|step| {
            let engine = &engine;
            let nested = &nested;
            async move {
                if step.filter.accepts(engine, nested).await {
                    Some(engine.interpolate(nested, &step.text).await)
                } else {
                    None
                }
            }
        });

        Ok(Some(join_all(steps).await.into_iter().flatten().collect()))
    }
}
