use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    /// Roles this crate does not know about ("developer", "function", ...).
    #[serde(other)]
    Other,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
            Role::Other => "other",
        }
    }
}

/// One element of multi-part message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text {
        text: String,
    },
    ImageUrl {
        #[serde(default)]
        image_url: Value,
    },
    Image {
        #[serde(default)]
        source: Value,
    },
    InputAudio {
        #[serde(default)]
        input_audio: Value,
    },
    #[serde(other)]
    Unknown,
}

impl ContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        ContentPart::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        ContentPart::ImageUrl {
            image_url: serde_json::json!({ "url": url.into() }),
        }
    }

    /// Media parts carry a fixed token surcharge when counted.
    pub fn is_media(&self) -> bool {
        matches!(
            self,
            ContentPart::ImageUrl { .. }
                | ContentPart::Image { .. }
                | ContentPart::InputAudio { .. }
        )
    }
}

/// Message content as sent by chat clients: a plain string or a list of parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(#[serde(deserialize_with = "lenient_parts")] Vec<ContentPart>),
}

/// Parts that don't match a known shape become `ContentPart::Unknown` instead of
/// failing the whole message.
fn lenient_parts<'de, D>(deserializer: D) -> Result<Vec<ContentPart>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Vec::<Value>::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|part| serde_json::from_value(part).unwrap_or(ContentPart::Unknown))
        .collect())
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<MessageContent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Text(content.into())),
            name: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_parts(role: Role, parts: Vec<ContentPart>) -> Self {
        Self {
            role,
            content: Some(MessageContent::Parts(parts)),
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Text-bearing content joined with newlines. Media parts render as
    /// `[image]` / `[audio]` placeholders.
    pub fn display_text(&self) -> String {
        match &self.content {
            None => String::new(),
            Some(MessageContent::Text(text)) => text.clone(),
            Some(MessageContent::Parts(parts)) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.clone()),
                    ContentPart::ImageUrl { .. } | ContentPart::Image { .. } => {
                        Some("[image]".to_string())
                    }
                    ContentPart::InputAudio { .. } => Some("[audio]".to_string()),
                    ContentPart::Unknown => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A named text snippet (persona, human profile, ...) injected into every prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub label: String,
    pub content: String,
}

impl MemoryBlock {
    pub fn new(label: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            content: content.into(),
        }
    }
}

/// Everything that goes into one model call, as read from a request file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub memory_blocks: Vec<MemoryBlock>,
    #[serde(default)]
    pub tools: Vec<Value>,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
}

/// Root settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<ContextSettings>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitSettings>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model used when a request doesn't name one (e.g. "openai/gpt-4o-mini")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_model: Option<String>,
    /// Per-model context window overrides, keyed by full model ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_windows: Option<HashMap<String, u64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextSettings {
    /// Fraction of the context window at which summarization triggers. Default: 0.8
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summarization_threshold: Option<f64>,
    /// Formatting tokens added per memory block. Default: 4
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_block_overhead: Option<u64>,
    /// Messages kept verbatim when history is summarized. Default: 6
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_recent: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_requests: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_seconds: Option<u64>,
}
