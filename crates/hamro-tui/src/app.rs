use ratatui::widgets::ListState;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{error, info, warn};

use hamro_core::attachments::load_attachments;
use hamro_core::models::{self, ModelDescriptor};
use hamro_core::{
    prompts, resolve_api_key, transcript, Attachment, ChatError, ChatMessage, ChatRole,
    ChatSession, Config, EncodeReport, GeminiClient, GenerativeBackend, KeyBridge, KeySource,
    LoadingState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Entries of the header options menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuAction {
    ClearHistory,
    Summarize,
    Export,
    ChangeKey,
}

impl MenuAction {
    pub const ALL: [MenuAction; 4] = [
        MenuAction::ClearHistory,
        MenuAction::Summarize,
        MenuAction::Export,
        MenuAction::ChangeKey,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::ClearHistory => "Clear history",
            MenuAction::Summarize => "Summarize conversation",
            MenuAction::Export => "Export chat",
            MenuAction::ChangeKey => "Change API key",
        }
    }
}

/// What a finished session task was doing.
pub enum TaskOutcome {
    /// `sent` are the attachments that went out with the message.
    Reply {
        result: Result<String, ChatError>,
        sent: Vec<Attachment>,
    },
    Summary(Result<String, ChatError>),
}

type SessionTask = JoinHandle<(ChatSession, TaskOutcome)>;

pub struct App {
    // Core state
    pub should_quit: bool,
    pub input_mode: InputMode,
    pub config: Config,
    config_path: Option<PathBuf>,
    pub export_dir: PathBuf,

    // Conversation
    pub messages: Vec<ChatMessage>,
    pub loading: LoadingState,
    pub selected_model: String,
    pub pending_attachments: Vec<Attachment>,
    backend: Arc<dyn GenerativeBackend>,
    /// Present whenever no request is in flight; moved into the task otherwise.
    session: Option<ChatSession>,
    session_task: Option<SessionTask>,

    // Key state
    pub has_key: bool,
    pub key_source: Option<KeySource>,

    // Input
    pub input: String,
    pub input_cursor: usize, // char index into input

    // Chat viewport
    pub chat_scroll: u16,
    pub chat_height: u16,
    pub chat_total_lines: u16,
    pub follow_tail: bool,

    // Attachment loading
    pub reading_files: bool,
    attach_task: Option<JoinHandle<EncodeReport>>,
    pub show_attach_input: bool,
    pub attach_input: String,

    // Popups
    pub show_model_picker: bool,
    pub model_picker_state: ListState,
    pub show_menu: bool,
    pub menu_state: ListState,
    pub show_api_key_input: bool,
    pub api_key_input: String,
    pub api_key_input_cursor: usize,

    // Chrome
    pub show_sidebar: bool,
    pub status: Option<String>,
    pub animation_frame: u8, // 0-2 for ellipsis animation
}

impl App {
    /// Build the app against the Gemini API, asking for a key if none is found.
    pub fn new(config: Config, config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        let resolved = resolve_api_key(&config);
        let api_key = resolved.as_ref().map(|(key, _)| key.as_str()).unwrap_or("");
        let client = GeminiClient::with_options(api_key, config.api_base(), config.timeout_seconds())?;

        let mut app = Self::with_backend(config, config_path, Arc::new(client));
        app.key_source = resolved.map(|(_, source)| source);
        app.has_key = app.key_source.is_some();

        if !app.has_key {
            info!("no API key found, prompting");
            app.open_key_selection();
        }

        Ok(app)
    }

    pub fn with_backend(
        config: Config,
        config_path: Option<PathBuf>,
        backend: Arc<dyn GenerativeBackend>,
    ) -> Self {
        let persona = prompts::persona(config.user_name(), config.workspace_name());
        let session = ChatSession::new(backend.clone(), persona);
        let selected_model = config.model();

        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            messages: vec![ChatMessage::intro(config.user_name())],
            config,
            config_path,
            export_dir: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),

            loading: LoadingState::Idle,
            selected_model,
            pending_attachments: Vec::new(),
            backend,
            session: Some(session),
            session_task: None,

            has_key: true,
            key_source: None,

            input: String::new(),
            input_cursor: 0,

            chat_scroll: 0,
            chat_height: 0,
            chat_total_lines: 0,
            follow_tail: true,

            reading_files: false,
            attach_task: None,
            show_attach_input: false,
            attach_input: String::new(),

            show_model_picker: false,
            model_picker_state: ListState::default(),
            show_menu: false,
            menu_state: ListState::default(),
            show_api_key_input: false,
            api_key_input: String::new(),
            api_key_input_cursor: 0,

            show_sidebar: true,
            status: None,
            animation_frame: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.loading == LoadingState::Idle
    }

    pub fn history_len(&self) -> Option<usize> {
        self.session.as_ref().map(|s| s.history().len())
    }

    pub fn model_display_name(&self) -> &str {
        models::display_name(&self.selected_model)
    }

    pub fn popup_open(&self) -> bool {
        self.show_api_key_input || self.show_model_picker || self.show_menu || self.show_attach_input
    }

    fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.follow_tail = true;
    }

    fn push_error(&mut self, err: &ChatError) {
        warn!(kind = err.kind().as_str(), error = %err, "request failed");
        self.push_message(ChatMessage::error(err.kind(), err.user_message()));
    }

    // ---- Sending ----

    /// Send whatever is in the input box together with the pending
    /// attachments. Ignored while a request is in flight.
    pub fn submit_input(&mut self) {
        if !self.is_idle() || self.session.is_none() {
            return;
        }

        let text = self.input.trim().to_string();
        if text.is_empty() && self.pending_attachments.is_empty() {
            return;
        }

        let attachments = self.pending_attachments.clone();
        self.push_message(ChatMessage::user(text.clone(), attachments.clone()));
        self.input.clear();
        self.input_cursor = 0;
        self.status = None;

        self.dispatch_send(text, attachments);
    }

    /// Resend the user message whose reply failed, without adding a new user
    /// bubble. Only offered while the conversation ends in an error.
    pub fn retry_last_message(&mut self) {
        if !self.is_idle() {
            return;
        }

        let ends_in_error = self.messages.last().is_some_and(ChatMessage::is_error);
        let failed = self
            .messages
            .iter()
            .rev()
            .find(|m| !m.is_error())
            .filter(|m| ends_in_error && m.role == ChatRole::User);
        let Some(last) = failed else {
            self.status = Some("Nothing to retry.".to_string());
            return;
        };
        let text = last.content.clone();
        let attachments = last.attachments.clone();

        info!("retrying last message");
        self.dispatch_send(text, attachments);
    }

    fn dispatch_send(&mut self, text: String, attachments: Vec<Attachment>) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        let model = self.selected_model.clone();

        self.loading = LoadingState::Thinking;
        self.follow_tail = true;
        self.session_task = Some(tokio::spawn(async move {
            let result = session.send_message(&text, &model, &attachments).await;
            (session, TaskOutcome::Reply { result, sent: attachments })
        }));
    }

    pub fn summarize(&mut self) {
        if !self.is_idle() {
            return;
        }
        let Some(session) = self.session.take() else {
            return;
        };
        let messages = self.messages.clone();

        self.loading = LoadingState::Thinking;
        self.follow_tail = true;
        self.session_task = Some(tokio::spawn(async move {
            let result = session.summarize_conversation(&messages).await;
            (session, TaskOutcome::Summary(result))
        }));
    }

    /// Collect finished background work. Called once per loop iteration.
    pub async fn poll_tasks(&mut self) {
        if let Some(handle) = self.session_task.take_if(|h| h.is_finished()) {
            let result = handle.await;
            self.finish_session_task(result);
        }

        if let Some(handle) = self.attach_task.take_if(|h| h.is_finished()) {
            let result = handle.await;
            self.finish_attach_task(result);
        }
    }

    #[cfg(test)]
    pub async fn wait_for_tasks(&mut self) {
        if let Some(handle) = self.session_task.take() {
            let result = handle.await;
            self.finish_session_task(result);
        }
        if let Some(handle) = self.attach_task.take() {
            let result = handle.await;
            self.finish_attach_task(result);
        }
    }

    fn finish_session_task(&mut self, result: Result<(ChatSession, TaskOutcome), JoinError>) {
        self.loading = LoadingState::Idle;
        self.follow_tail = true;

        let (mut session, outcome) = match result {
            Ok(done) => done,
            Err(e) => {
                // The conversation went down with the task; start a fresh one.
                error!(error = %e, "chat task failed");
                let persona = prompts::persona(self.config.user_name(), self.config.workspace_name());
                self.session = Some(ChatSession::new(self.backend.clone(), persona));
                self.push_error(&ChatError::Unknown(e.to_string()));
                return;
            }
        };

        // The key may have changed while the request was out.
        session.set_backend(self.backend.clone());
        self.session = Some(session);

        match outcome {
            TaskOutcome::Reply { result: Ok(text), sent } => {
                // Files attached while the reply was pending stay for the next message.
                self.pending_attachments.retain(|a| !sent.contains(a));
                self.push_message(ChatMessage::model(text));
            }
            TaskOutcome::Summary(Ok(summary)) => {
                self.push_message(ChatMessage::model(format!("**Summary**\n\n{}", summary)));
            }
            TaskOutcome::Reply { result: Err(e), .. } | TaskOutcome::Summary(Err(e)) => {
                self.push_error(&e)
            }
        }
    }

    // ---- Menu actions ----

    pub fn clear_chat(&mut self) {
        let Some(session) = self.session.as_mut() else {
            self.status = Some("Wait for the current reply before clearing.".to_string());
            return;
        };
        session.clear_history();
        self.messages = vec![ChatMessage::intro(self.config.user_name())];
        self.chat_scroll = 0;
        self.follow_tail = true;
        self.status = Some("Chat cleared.".to_string());
        info!("chat cleared");
    }

    pub fn export_chat(&mut self) {
        match transcript::write_export(&self.messages, &self.selected_model, &self.export_dir) {
            Ok(path) => {
                info!(path = %path.display(), "chat exported");
                self.status = Some(format!("Exported to {}", path.display()));
            }
            Err(e) => {
                warn!(error = %e, "export failed");
                self.status = Some(format!("Export failed: {}", e));
            }
        }
    }

    pub fn open_menu(&mut self) {
        self.show_menu = true;
        self.menu_state.select(Some(0));
    }

    pub fn menu_nav_down(&mut self) {
        let i = self.menu_state.selected().map_or(0, |i| (i + 1) % MenuAction::ALL.len());
        self.menu_state.select(Some(i));
    }

    pub fn menu_nav_up(&mut self) {
        let len = MenuAction::ALL.len();
        let i = self.menu_state.selected().map_or(0, |i| (i + len - 1) % len);
        self.menu_state.select(Some(i));
    }

    pub fn activate_menu_item(&mut self) {
        self.show_menu = false;
        let Some(action) = self.menu_state.selected().and_then(|i| MenuAction::ALL.get(i)) else {
            return;
        };

        match action {
            MenuAction::ClearHistory => self.clear_chat(),
            MenuAction::Summarize => self.summarize(),
            MenuAction::Export => self.export_chat(),
            MenuAction::ChangeKey => self.open_key_selection(),
        }
    }

    // ---- Model picker ----

    pub fn open_model_picker(&mut self) {
        let current = ModelDescriptor::all()
            .iter()
            .position(|m| m.id == self.selected_model)
            .unwrap_or(0);
        self.model_picker_state.select(Some(current));
        self.show_model_picker = true;
    }

    pub fn model_picker_nav_down(&mut self) {
        let len = ModelDescriptor::all().len();
        let i = self.model_picker_state.selected().map_or(0, |i| (i + 1) % len);
        self.model_picker_state.select(Some(i));
    }

    pub fn model_picker_nav_up(&mut self) {
        let len = ModelDescriptor::all().len();
        let i = self.model_picker_state.selected().map_or(0, |i| (i + len - 1) % len);
        self.model_picker_state.select(Some(i));
    }

    /// Switch to the highlighted model and remember it as the default.
    pub fn select_model(&mut self) {
        self.show_model_picker = false;
        let Some(model) = self
            .model_picker_state
            .selected()
            .and_then(|i| ModelDescriptor::all().get(i))
        else {
            return;
        };

        self.selected_model = model.id.to_string();
        self.config.default_model = Some(model.id.to_string());
        self.persist_config();
        info!(model = model.id, "model selected");
    }

    // ---- API key ----

    /// Store the typed key, point the session at it and close the popup.
    pub fn submit_api_key(&mut self) {
        let key = self.api_key_input.trim().to_string();
        if key.is_empty() {
            return;
        }

        let client = match GeminiClient::with_options(&key, self.config.api_base(), self.config.timeout_seconds()) {
            Ok(client) => client,
            Err(e) => {
                self.status = Some(format!("Could not set up the client: {}", e));
                return;
            }
        };

        self.backend = Arc::new(client);
        if let Some(session) = self.session.as_mut() {
            session.set_backend(self.backend.clone());
        }

        self.config.api_key = Some(key);
        self.persist_config();
        self.has_key = true;
        self.key_source = Some(KeySource::Config);
        self.close_api_key_input();
        self.status = Some("API key saved.".to_string());
        info!("API key updated");
    }

    pub fn close_api_key_input(&mut self) {
        self.show_api_key_input = false;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
    }

    fn persist_config(&mut self) {
        let Some(path) = self.config_path.as_ref() else {
            return;
        };
        if let Err(e) = self.config.save_to(path) {
            warn!(error = %e, path = %path.display(), "failed to save config");
            self.status = Some(format!("Could not save config: {}", e));
        }
    }

    // ---- Attachments ----

    pub fn open_attach_input(&mut self) {
        self.show_attach_input = true;
        self.attach_input.clear();
    }

    pub fn submit_attach_input(&mut self) {
        self.show_attach_input = false;
        let paths = parse_paths(&self.attach_input);
        self.attach_input.clear();
        self.start_loading_attachments(paths);
    }

    /// Read and encode the paths in the background.
    pub fn start_loading_attachments(&mut self, paths: Vec<PathBuf>) {
        if paths.is_empty() || self.reading_files {
            return;
        }

        self.reading_files = true;
        self.attach_task = Some(tokio::spawn(async move { load_attachments(&paths).await }));
    }

    fn finish_attach_task(&mut self, result: Result<EncodeReport, JoinError>) {
        self.reading_files = false;

        let report = match result {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "attachment task failed");
                self.status = Some("Reading files failed.".to_string());
                return;
            }
        };

        let added = report.attachments.len();
        self.pending_attachments.extend(report.attachments);

        self.status = if report.skipped.is_empty() {
            Some(format!("Attached {} file(s).", added))
        } else {
            let skipped: Vec<String> = report
                .skipped
                .iter()
                .map(|s| format!("{} ({})", s.name, s.reason))
                .collect();
            Some(format!("Attached {} file(s). Skipped: {}", added, skipped.join(", ")))
        };
    }

    pub fn remove_last_attachment(&mut self) {
        if let Some(removed) = self.pending_attachments.pop() {
            self.status = Some(format!("Removed {}", removed.name));
        }
    }

    // ---- Viewport ----

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if !self.is_idle() || self.reading_files {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn max_scroll(&self) -> u16 {
        self.chat_total_lines.saturating_sub(self.chat_height)
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_add(lines).min(self.max_scroll());
        self.follow_tail = self.chat_scroll >= self.max_scroll();
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.chat_scroll = self.chat_scroll.saturating_sub(lines);
        self.follow_tail = false;
    }

    pub fn scroll_to_bottom(&mut self) {
        self.follow_tail = true;
        self.chat_scroll = self.max_scroll();
    }
}

impl KeyBridge for App {
    fn has_selected_key(&self) -> bool {
        self.has_key
    }

    fn open_key_selection(&mut self) {
        self.show_api_key_input = true;
        self.api_key_input.clear();
        self.api_key_input_cursor = 0;
    }
}

/// Split the attach prompt into paths. Whitespace separates paths unless
/// quoted; a leading `~` means the home directory.
pub fn parse_paths(input: &str) -> Vec<PathBuf> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for c in input.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => quote = Some(c),
            (None, c) if c.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            (None, c) => current.push(c),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }

    tokens.into_iter().map(|token| expand_home(&token)).collect()
}

fn expand_home(token: &str) -> PathBuf {
    match (token.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ if token == "~" => dirs::home_dir().unwrap_or_else(|| PathBuf::from(token)),
        _ => PathBuf::from(token),
    }
}
