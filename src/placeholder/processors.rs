//! Built-in placeholder processors.

use async_trait::async_trait;

use crate::context::{Context, Key};
use crate::processor::{Processor, ProcessorResult};

/// `%argument:namespace:name%`, the value of a context argument.
pub struct ArgumentProcessor;

#[async_trait]
impl Processor<Option<String>> for ArgumentProcessor {
    async fn process(&self, ctx: &Context) -> ProcessorResult<Option<String>> {
        Ok(Key::parse(&ctx.message)
            .and_then(|key| ctx.arguments.get(&key).map(str::to_string)))
    }
}

/// `%audience:<field>%`, metadata of the subject.
///
/// Fields: `name`, `name_colored`, `color`, `team_color`, `locale`.
pub struct AudienceProcessor;

#[async_trait]
impl Processor<Option<String>> for AudienceProcessor {
    async fn process(&self, ctx: &Context) -> ProcessorResult<Option<String>> {
        let subject = &ctx.subject;
        Ok(match ctx.message.to_lowercase().as_str() {
            "name" => subject.name(),
            "name_colored" => subject.decorated_name(),
            "color" => subject.color().map(to_hex),
            "team_color" => subject.team_color().map(to_hex),
            "locale" => subject.locale().map(|locale| locale.to_string()),
            _ => None,
        })
    }
}

/// `%permission:<node>%`, the node itself when the subject holds it, empty
/// text otherwise.
pub struct PermissionProcessor;

#[async_trait]
impl Processor<Option<String>> for PermissionProcessor {
    async fn process(&self, ctx: &Context) -> ProcessorResult<Option<String>> {
        Ok(Some(if ctx.subject.has_permission(&ctx.message) {
            ctx.message.clone()
        } else {
            String::new()
        }))
    }
}

fn to_hex(rgb: u32) -> String {
    format!("#{:06X}", rgb & 0xFF_FFFF)
}
