//! Request context shared by every processor.

use std::borrow::Cow;
use std::collections::HashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::Deserialize;

use crate::translator::Locale;

/// Namespaced argument key, written `namespace:name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    namespace: Cow<'static, str>,
    name: Cow<'static, str>,
}

impl Key {
    /// The raw chat message being formatted.
    pub const MESSAGE: Key = Key::from_static("flex", "message");
    /// The translation of [`Key::MESSAGE`] for the current target.
    pub const TRANSLATED_MESSAGE: Key = Key::from_static("flex", "translated_message");

    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: Cow::Owned(namespace.into()),
            name: Cow::Owned(name.into()),
        }
    }

    pub const fn from_static(namespace: &'static str, name: &'static str) -> Self {
        Self {
            namespace: Cow::Borrowed(namespace),
            name: Cow::Borrowed(name),
        }
    }

    /// Parse `namespace:name`. Both parts are required.
    pub fn parse(text: &str) -> Option<Self> {
        let (namespace, name) = text.split_once(':')?;
        Some(Self::new(namespace, name))
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Arguments(HashMap<Key, String>);

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: Key, value: impl Into<String>) -> Self {
        self.0.insert(key, value.into());
        self
    }

    pub fn insert(&mut self, key: Key, value: impl Into<String>) {
        self.0.insert(key, value.into());
    }

    pub fn get(&self, key: &Key) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Someone or something messages are sent from or to.
///
/// Every lookup defaults to "absent", so hosts only implement what they know.
/// Colors are 24-bit RGB.
pub trait Audience: Send + Sync {
    fn name(&self) -> Option<String> {
        None
    }

    /// Name with the host's color markup.
    fn decorated_name(&self) -> Option<String> {
        None
    }

    fn locale(&self) -> Option<Locale> {
        None
    }

    fn color(&self) -> Option<u32> {
        None
    }

    fn team_color(&self) -> Option<u32> {
        None
    }

    fn has_permission(&self, _permission: &str) -> bool {
        false
    }

    fn is_player(&self) -> bool {
        false
    }
}

/// Audience with no metadata at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyAudience;

impl Audience for EmptyAudience {}

/// Plain-data audience, for hosts without their own identity type and for
/// the command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SimpleAudience {
    pub name: Option<String>,
    pub decorated_name: Option<String>,
    #[serde(deserialize_with = "deserialize_locale")]
    pub locale: Option<Locale>,
    pub color: Option<u32>,
    pub team_color: Option<u32>,
    pub permissions: HashSet<String>,
    pub player: bool,
}

fn deserialize_locale<'de, D>(deserializer: D) -> Result<Option<Locale>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|tag| Locale::parse(&tag).map_err(serde::de::Error::custom))
        .transpose()
}

impl SimpleAudience {
    pub fn player(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            player: true,
            ..Self::default()
        }
    }

    pub fn with_locale(mut self, locale: Locale) -> Self {
        self.locale = Some(locale);
        self
    }

    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        self.permissions.insert(permission.into());
        self
    }
}

impl Audience for SimpleAudience {
    fn name(&self) -> Option<String> {
        self.name.clone()
    }

    fn decorated_name(&self) -> Option<String> {
        self.decorated_name.clone().or_else(|| self.name.clone())
    }

    fn locale(&self) -> Option<Locale> {
        self.locale.clone()
    }

    fn color(&self) -> Option<u32> {
        self.color
    }

    fn team_color(&self) -> Option<u32> {
        self.team_color
    }

    fn has_permission(&self, permission: &str) -> bool {
        self.permissions.contains(permission)
    }

    fn is_player(&self) -> bool {
        self.player
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MessageKind {
    #[default]
    Chat,
    Command,
}

/// Input of a single processor invocation.
///
/// `message` holds the text being processed: the chat message in a message
/// pipeline, the placeholder query inside a placeholder processor.
#[derive(Clone)]
pub struct Context {
    pub subject: Arc<dyn Audience>,
    pub target: Arc<dyn Audience>,
    pub message: String,
    pub kind: MessageKind,
    pub arguments: Arguments,
    /// Number of re-entries into the engines above this context.
    pub depth: usize,
}

impl Context {
    pub fn new(subject: Arc<dyn Audience>, message: impl Into<String>) -> Self {
        Self {
            subject,
            target: Arc::new(EmptyAudience),
            message: message.into(),
            kind: MessageKind::Chat,
            arguments: Arguments::new(),
            depth: 0,
        }
    }

    /// Context for a message sent from `sender` to `target`.
    pub fn chat(
        sender: Arc<dyn Audience>,
        target: Arc<dyn Audience>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            target,
            ..Self::new(sender, message)
        }
    }

    pub fn with_kind(mut self, kind: MessageKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_arguments(mut self, arguments: Arguments) -> Self {
        self.arguments = arguments;
        self
    }

    /// Copy of this context carrying another message.
    pub fn with_message(&self, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..self.clone()
        }
    }

    /// Copy of this context one level deeper.
    pub fn nested(&self) -> Self {
        Self {
            depth: self.depth + 1,
            ..self.clone()
        }
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("subject", &self.subject.name())
            .field("target", &self.target.name())
            .field("message", &self.message)
            .field("kind", &self.kind)
            .field("arguments", &self.arguments)
            .field("depth", &self.depth)
            .finish()
    }
}
