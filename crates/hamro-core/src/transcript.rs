use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models;
use crate::state::{ChatMessage, ChatRole};

const ASSISTANT_LABEL: &str = "Hamro AI";

/// Messages worth keeping in a transcript: no greeting, no error bubbles.
fn conversation(messages: &[ChatMessage]) -> impl Iterator<Item = &ChatMessage> {
    messages.iter().filter(|m| !m.is_intro() && !m.is_error())
}

/// `User: …` / `Hamro AI: …` lines separated by blank lines.
pub fn summary_transcript(messages: &[ChatMessage]) -> String {
    conversation(messages)
        .map(|m| {
            let label = match m.role {
                ChatRole::User => "User",
                ChatRole::Model => ASSISTANT_LABEL,
            };
            format!("{}: {}", label, m.content)
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn export_markdown(messages: &[ChatMessage], model_id: &str) -> String {
    let mut out = String::from("# Hamro AI conversation\n\n");
    out.push_str(&format!("_Model: {}_\n", models::display_name(model_id)));

    for message in conversation(messages) {
        let who = match message.role {
            ChatRole::User => "You",
            ChatRole::Model => ASSISTANT_LABEL,
        };
        out.push_str(&format!(
            "\n## {} ({})\n\n",
            who,
            message.timestamp.format("%Y-%m-%d %H:%M")
        ));

        if !message.attachments.is_empty() {
            let names: Vec<_> = message.attachments.iter().map(|a| a.name.as_str()).collect();
            out.push_str(&format!("_Attached: {}_\n\n", names.join(", ")));
        }

        out.push_str(message.content.trim_end());
        out.push('\n');
    }

    out
}

/// Write the chat as markdown into `dir`, returning the new file's path.
pub fn write_export(messages: &[ChatMessage], model_id: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let filename = format!(
        "hamro-chat-{}.md",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    );
    let path = dir.join(filename);
    fs::write(&path, export_markdown(messages, model_id))?;
    Ok(path)
}
