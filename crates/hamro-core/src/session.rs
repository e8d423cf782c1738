use chrono::Local;
use std::sync::Arc;
use tracing::{debug, info};

use crate::ai::{Content, GeminiClient, GenerateRequest, GenerateResponse, GenerativeBackend, Part};
use crate::attachments::check_payload;
use crate::config::Config;
use crate::error::ChatError;
use crate::history::History;
use crate::models::SUMMARY_MODEL;
use crate::prompts::{self, SUMMARY_SYSTEM_INSTRUCTION};
use crate::state::{Attachment, ChatMessage};
use crate::transcript::summary_transcript;

pub const CHAT_TEMPERATURE: f32 = 0.7;
pub const SUMMARY_TEMPERATURE: f32 = 0.2;

/// Finish reasons meaning the reply was withheld by content filters.
const SAFETY_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "PROHIBITED_CONTENT",
    "BLOCKLIST",
    "SPII",
    "IMAGE_SAFETY",
];

/// One conversation with the model: the backend it talks to, the turns
/// exchanged so far, and the persona it speaks with.
///
/// Sending takes `&mut self`, so whoever owns the session can have at most
/// one request in flight.
pub struct ChatSession {
    backend: Arc<dyn GenerativeBackend>,
    history: History,
    persona: String,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn GenerativeBackend>, persona: String) -> Self {
        Self {
            backend,
            history: History::new(),
            persona,
        }
    }

    /// A session backed by the Gemini API with the configured persona.
    pub fn from_config(config: &Config, api_key: &str) -> Result<Self, ChatError> {
        let client = GeminiClient::with_options(api_key, config.api_base(), config.timeout_seconds())?;
        Ok(Self::new(
            Arc::new(client),
            prompts::persona(config.user_name(), config.workspace_name()),
        ))
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    /// Swap the backend, e.g. after the user enters a new key. History is kept.
    pub fn set_backend(&mut self, backend: Arc<dyn GenerativeBackend>) {
        self.backend = backend;
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    /// Send one user turn with the whole history and return the reply text.
    /// History only grows when a reply actually comes back.
    pub async fn send_message(
        &mut self,
        text: &str,
        model_id: &str,
        attachments: &[Attachment],
    ) -> Result<String, ChatError> {
        if text.trim().is_empty() && attachments.is_empty() {
            return Err(ChatError::EmptyInput);
        }
        check_payload(attachments)?;

        let user_turn = build_user_turn(text, attachments);
        let request = GenerateRequest {
            model: model_id.to_string(),
            contents: self.history.with_turn(&user_turn),
            system_instruction: prompts::system_instruction(&self.persona, Local::now()),
            temperature: CHAT_TEMPERATURE,
        };

        debug!(
            model = model_id,
            history = self.history.len(),
            attachments = attachments.len(),
            "sending message"
        );

        let reply = reply_text(self.backend.generate(request).await?)?;
        self.history
            .push_exchange(user_turn, Content::model_text(reply.clone()));

        info!(model = model_id, history = self.history.len(), "message answered");
        Ok(reply)
    }

    /// Bullet-point summary of the visible conversation. Stateless: history
    /// is neither sent nor changed.
    pub async fn summarize_conversation(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
        let transcript = summary_transcript(messages);
        if transcript.is_empty() {
            return Err(ChatError::NoHistory);
        }

        let request = GenerateRequest {
            model: SUMMARY_MODEL.to_string(),
            contents: vec![Content::user(vec![Part::text(prompts::summary_prompt(&transcript))])],
            system_instruction: SUMMARY_SYSTEM_INSTRUCTION.to_string(),
            temperature: SUMMARY_TEMPERATURE,
        };

        reply_text(self.backend.generate(request).await?)
    }
}

/// Text attachments are folded into the prompt ahead of the user's words;
/// inline ones follow as separate binary parts.
fn build_user_turn(text: &str, attachments: &[Attachment]) -> Content {
    let mut prompt = String::new();
    for attachment in attachments.iter().filter(|a| !a.is_inline) {
        prompt.push_str(&format!(
            "\n\n--- FILE: {} ---\n{}\n--- END OF FILE ---\n",
            attachment.name, attachment.data
        ));
    }
    prompt.push_str(text);

    let prompt = prompt.trim();
    let mut parts = Vec::with_capacity(attachments.len() + 1);
    if !prompt.is_empty() {
        parts.push(Part::text(prompt));
    }
    parts.extend(
        attachments
            .iter()
            .filter(|a| a.is_inline)
            .map(|a| Part::inline(&a.mime_type, &a.data)),
    );

    Content::user(parts)
}

fn reply_text(response: GenerateResponse) -> Result<String, ChatError> {
    if let Some(reason) = response.block_reason {
        return Err(ChatError::Safety(reason));
    }
    if let Some(reason) = response
        .finish_reason
        .filter(|r| SAFETY_FINISH_REASONS.contains(&r.as_str()))
    {
        return Err(ChatError::Safety(reason));
    }

    match response.text {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(ChatError::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::state::ChatRole;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct ScriptedBackend {
        replies: Mutex<VecDeque<Result<GenerateResponse, ChatError>>>,
        requests: Mutex<Vec<GenerateRequest>>,
    }

    impl ScriptedBackend {
        fn with(replies: Vec<Result<GenerateResponse, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                requests: Mutex::default(),
            })
        }

        fn requests(&self) -> Vec<GenerateRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn generate(&self, request: GenerateRequest) -> Result<GenerateResponse, ChatError> {
            self.requests.lock().unwrap().push(request);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ChatError::Unknown("script exhausted".to_string())))
        }
    }

    fn text(reply: &str) -> Result<GenerateResponse, ChatError> {
        Ok(GenerateResponse {
            text: Some(reply.to_string()),
            finish_reason: Some("STOP".to_string()),
            block_reason: None,
        })
    }

    fn session(backend: &Arc<ScriptedBackend>) -> ChatSession {
        ChatSession::new(backend.clone(), "persona".to_string())
    }

    #[tokio::test]
    async fn test_history_grows_by_two_per_success() {
        let backend = ScriptedBackend::with(vec![text("Hi there"), text("Sure")]);
        let mut chat = session(&backend);

        assert_eq!(chat.send_message("Hello", "gemini-3-flash-preview", &[]).await.unwrap(), "Hi there");
        assert_eq!(chat.history().len(), 2);

        chat.send_message("Again", "gemini-3-pro-preview", &[]).await.unwrap();
        assert_eq!(chat.history().len(), 4);

        let requests = backend.requests();
        assert_eq!(requests[1].contents.len(), 3);
        assert_eq!(requests[1].model, "gemini-3-pro-preview");
        assert_eq!(requests[1].contents[1].role, ChatRole::Model);
        assert!((requests[1].temperature - CHAT_TEMPERATURE).abs() < f32::EPSILON);
        assert!(requests[1]
            .system_instruction
            .starts_with("persona\nThe current date and time is: "));
    }

    #[tokio::test]
    async fn test_failed_send_leaves_history_alone() {
        let backend = ScriptedBackend::with(vec![
            text("ok"),
            Err(ChatError::from_api_failure(429, "")),
        ]);
        let mut chat = session(&backend);
        chat.send_message("one", "m", &[]).await.unwrap();

        let err = chat.send_message("two", "m", &[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Quota);
        assert_eq!(chat.history().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_input_never_reaches_backend() {
        let backend = ScriptedBackend::with(vec![]);
        let mut chat = session(&backend);

        let err = chat.send_message("   ", "m", &[]).await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyInput));
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_payload_never_reaches_backend() {
        let backend = ScriptedBackend::with(vec![text("unused")]);
        let mut chat = session(&backend);
        let files = vec![Attachment::text("a.txt", "text/plain", "a".to_string()); 11];

        let err = chat.send_message("hi", "m", &files).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PayloadTooLarge);
        assert!(backend.requests().is_empty());
        assert!(chat.history().is_empty());
    }

    #[tokio::test]
    async fn test_text_attachments_fold_into_prompt_inline_ones_stay_binary() {
        let backend = ScriptedBackend::with(vec![text("got it")]);
        let mut chat = session(&backend);
        let files = vec![
            Attachment::inline("a.pdf", "application/pdf", "QUJD".to_string()),
            Attachment::text("b.txt", "text/plain", "bee contents".to_string()),
        ];

        chat.send_message("hi", "m", &files).await.unwrap();

        let turn = &backend.requests()[0].contents[0];
        assert_eq!(turn.parts.len(), 2);
        assert_eq!(
            turn.parts[0],
            Part::text("--- FILE: b.txt ---\nbee contents\n--- END OF FILE ---\nhi")
        );
        assert_eq!(turn.parts[1], Part::inline("application/pdf", "QUJD"));
        assert!(!turn.text().contains("QUJD"));
    }

    #[tokio::test]
    async fn test_safety_and_empty_replies_are_errors() {
        let backend = ScriptedBackend::with(vec![
            Ok(GenerateResponse {
                text: None,
                finish_reason: None,
                block_reason: Some("SAFETY".to_string()),
            }),
            Ok(GenerateResponse {
                text: Some("partial".to_string()),
                finish_reason: Some("PROHIBITED_CONTENT".to_string()),
                block_reason: None,
            }),
            Ok(GenerateResponse {
                text: None,
                finish_reason: Some("RECITATION".to_string()),
                block_reason: None,
            }),
        ]);
        let mut chat = session(&backend);

        for expected in [ErrorKind::Safety, ErrorKind::Safety, ErrorKind::Empty] {
            let err = chat.send_message("x", "m", &[]).await.unwrap_err();
            assert_eq!(err.kind(), expected);
        }
        assert!(chat.history().is_empty());
    }

    #[tokio::test]
    async fn test_clear_then_send() {
        let backend = ScriptedBackend::with(vec![text("a"), text("b")]);
        let mut chat = session(&backend);
        chat.send_message("first", "m", &[]).await.unwrap();

        chat.clear_history();
        chat.clear_history();
        assert_eq!(chat.history().len(), 0);

        chat.send_message("Hi", "m", &[]).await.unwrap();
        assert_eq!(chat.history().len(), 2);
        assert_eq!(backend.requests()[1].contents.len(), 1);
    }

    #[tokio::test]
    async fn test_summary_with_only_intro_skips_network() {
        let backend = ScriptedBackend::with(vec![]);
        let chat = session(&backend);

        let err = chat
            .summarize_conversation(&[ChatMessage::intro("Buddy")])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoHistory);
        assert!(backend.requests().is_empty());
    }

    #[tokio::test]
    async fn test_summary_uses_flash_model_and_keeps_history() {
        let backend = ScriptedBackend::with(vec![text("chat"), text("- talked")]);
        let mut chat = session(&backend);
        chat.send_message("hello", "gemini-3-pro-preview", &[]).await.unwrap();

        let messages = vec![
            ChatMessage::intro("Buddy"),
            ChatMessage::user("hello", vec![]),
            ChatMessage::model("chat"),
        ];
        let summary = chat.summarize_conversation(&messages).await.unwrap();

        assert_eq!(summary, "- talked");
        assert_eq!(chat.history().len(), 2);

        let request = &backend.requests()[1];
        assert_eq!(request.model, SUMMARY_MODEL);
        assert_eq!(request.system_instruction, SUMMARY_SYSTEM_INSTRUCTION);
        assert_eq!(request.contents.len(), 1);
        assert_eq!(
            request.contents[0].text(),
            "Summarize this conversation in bullet points:\n\nUser: hello\n\nHamro AI: chat"
        );
    }
}
