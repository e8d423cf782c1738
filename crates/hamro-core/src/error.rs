use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse error category used to pick the message and actions shown on an
/// errored bubble.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    Auth,
    Quota,
    KeyConfig,
    Safety,
    Empty,
    PayloadTooLarge,
    NoHistory,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "auth",
            ErrorKind::Quota => "quota",
            ErrorKind::KeyConfig => "key_config",
            ErrorKind::Safety => "safety",
            ErrorKind::Empty => "empty",
            ErrorKind::PayloadTooLarge => "payload_too_large",
            ErrorKind::NoHistory => "no_history",
            ErrorKind::Unknown => "unknown",
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "Your API key is missing or was rejected. Please select a valid key and try again.",
            ErrorKind::Quota => "You've reached the API quota. Please wait a moment before trying again.",
            ErrorKind::KeyConfig => "The selected API key isn't set up for this request (check billing and API access for its project). Please select a different key.",
            ErrorKind::Safety => "The response was blocked by safety filters. Try rephrasing your request.",
            ErrorKind::Empty => "The model returned an empty response. Please try again.",
            ErrorKind::PayloadTooLarge => "Your attachments are too large to send. Remove some files and try again.",
            ErrorKind::NoHistory => "There's no conversation to summarize yet.",
            ErrorKind::Unknown => "I'm sorry, I encountered an error while processing your request. Please check your API Key configuration or try again.",
        }
    }

    /// Whether picking another key could fix the failure.
    pub fn offers_key_reselect(&self) -> bool {
        matches!(self, ErrorKind::Auth | ErrorKind::KeyConfig)
    }
}

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("no API key configured (set GEMINI_API_KEY or enter a key in the app)")]
    MissingApiKey,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("quota exceeded: {0}")]
    Quota(String),

    #[error("API key or project misconfigured: {0}")]
    KeyConfig(String),

    #[error("response blocked by safety filters ({0})")]
    Safety(String),

    #[error("the model returned an empty response")]
    Empty,

    #[error("attachments too large: {size} bytes in {count} files (limit {limit} bytes, {max_files} files)")]
    PayloadTooLarge {
        size: usize,
        count: usize,
        limit: usize,
        max_files: usize,
    },

    #[error("no conversation history to summarize")]
    NoHistory,

    #[error("nothing to send")]
    EmptyInput,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{0}")]
    Unknown(String),
}

pub type Result<T> = std::result::Result<T, ChatError>;

impl ChatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::MissingApiKey | ChatError::Auth(_) => ErrorKind::Auth,
            ChatError::Quota(_) => ErrorKind::Quota,
            ChatError::KeyConfig(_) => ErrorKind::KeyConfig,
            ChatError::Safety(_) => ErrorKind::Safety,
            ChatError::Empty => ErrorKind::Empty,
            ChatError::PayloadTooLarge { .. } => ErrorKind::PayloadTooLarge,
            ChatError::NoHistory => ErrorKind::NoHistory,
            ChatError::EmptyInput | ChatError::Transport(_) | ChatError::Unknown(_) => {
                ErrorKind::Unknown
            }
        }
    }

    pub fn user_message(&self) -> &'static str {
        self.kind().user_message()
    }

    pub fn offers_key_reselect(&self) -> bool {
        self.kind().offers_key_reselect()
    }

    /// Classify a non-2xx API response by its HTTP status and the
    /// `{"error": {code, message, status, details}}` envelope.
    pub fn from_api_failure(http_status: u16, body: &str) -> Self {
        let parsed = serde_json::from_str::<ApiErrorEnvelope>(body)
            .ok()
            .map(|envelope| envelope.error);

        let (status, message, reasons) = match parsed {
            Some(error) => {
                let reasons: Vec<String> = error
                    .details
                    .into_iter()
                    .filter_map(|detail| detail.reason)
                    .collect();
                (error.status, error.message, reasons)
            }
            None => (String::new(), body.trim().to_string(), Vec::new()),
        };

        let message = if message.is_empty() {
            format!("HTTP {}", http_status)
        } else {
            format!("HTTP {}: {}", http_status, truncate(&message, 400))
        };

        match classify_status(http_status, &status, &reasons) {
            ErrorKind::Auth => ChatError::Auth(message),
            ErrorKind::Quota => ChatError::Quota(message),
            ErrorKind::KeyConfig => ChatError::KeyConfig(message),
            _ => ChatError::Unknown(message),
        }
    }
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    details: Vec<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    reason: Option<String>,
}

const KEY_CONFIG_REASONS: &[&str] = &[
    "BILLING_DISABLED",
    "SERVICE_DISABLED",
    "API_KEY_SERVICE_BLOCKED",
    "CONSUMER_INVALID",
];

fn classify_status(http_status: u16, status: &str, reasons: &[String]) -> ErrorKind {
    // ErrorInfo reasons are more specific than the status code
    if reasons.iter().any(|r| r == "API_KEY_INVALID") {
        return ErrorKind::Auth;
    }
    if reasons.iter().any(|r| KEY_CONFIG_REASONS.contains(&r.as_str())) {
        return ErrorKind::KeyConfig;
    }

    match (http_status, status) {
        (429, _) | (_, "RESOURCE_EXHAUSTED") => ErrorKind::Quota,
        (401, _) | (_, "UNAUTHENTICATED") => ErrorKind::Auth,
        (403, _) | (404, _) | (_, "PERMISSION_DENIED") | (_, "NOT_FOUND") | (_, "FAILED_PRECONDITION") => {
            ErrorKind::KeyConfig
        }
        _ => ErrorKind::Unknown,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    }
}
