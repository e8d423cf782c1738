pub mod ai;
pub mod attachments;
pub mod config;
pub mod credentials;
pub mod error;
pub mod history;
pub mod models;
pub mod prompts;
pub mod session;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use ai::{Content, GeminiClient, GenerateRequest, GenerateResponse, GenerativeBackend, Part};
pub use attachments::{load_attachments, EncodeReport, SelectedFile, SkippedFile};
pub use config::Config;
pub use credentials::{key_available, resolve_api_key, KeyBridge, KeySource};
pub use error::{ChatError, ErrorKind};
pub use history::History;
pub use models::ModelDescriptor;
pub use session::ChatSession;
pub use state::{Attachment, ChatMessage, ChatRole, LoadingState};
