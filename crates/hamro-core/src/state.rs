//! UI-agnostic chat state types
//!
//! This module contains data structures that are shared between the terminal
//! UI and the one-shot CLI and don't depend on any specific UI framework.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

/// Id of the synthetic greeting shown at the top of every conversation.
pub const INTRO_MESSAGE_ID: &str = "intro";

/// The role of a chat message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// A file prepared for sending.
///
/// Inline attachments carry base64 data and travel as binary parts; the rest
/// carry decoded text that is folded into the prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub name: String,
    pub mime_type: String,
    pub data: String,
    pub is_inline: bool,
}

impl Attachment {
    pub fn inline(name: &str, mime_type: &str, base64_data: String) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data: base64_data,
            is_inline: true,
        }
    }

    pub fn text(name: &str, mime_type: &str, text: String) -> Self {
        Self {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
            data: text,
            is_inline: false,
        }
    }
}

/// A chat bubble in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: ChatRole,
    pub content: String,
    pub timestamp: DateTime<Local>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

impl ChatMessage {
    fn build(role: ChatRole, content: String) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            timestamp: Local::now(),
            error: None,
            attachments: Vec::new(),
        }
    }

    pub fn user(content: impl Into<String>, attachments: Vec<Attachment>) -> Self {
        Self {
            attachments,
            ..Self::build(ChatRole::User, content.into())
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self::build(ChatRole::Model, content.into())
    }

    pub fn error(kind: ErrorKind, content: impl Into<String>) -> Self {
        Self {
            error: Some(kind),
            ..Self::build(ChatRole::Model, content.into())
        }
    }

    pub fn intro(user_name: &str) -> Self {
        Self {
            id: INTRO_MESSAGE_ID.to_string(),
            ..Self::build(
                ChatRole::Model,
                format!(
                    "Hi! {}, I'm Hamro AI. Ask me to write, edit, or answer questions directly on your pages.",
                    user_name
                ),
            )
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    pub fn is_intro(&self) -> bool {
        self.id == INTRO_MESSAGE_ID
    }
}

/// Whether a remote call is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadingState {
    #[default]
    Idle,
    Thinking,
}
