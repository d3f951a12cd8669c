use super::commands::COMMANDS;
use crate::core::ai::{ConversationState, Message, Role};
use crate::core::drive::FetchOutcome;

pub fn banner(title: &str, mode: &str) -> String {
    let rule = "=".repeat(title.chars().count().max(20));
    format!("{rule}\n{title}\n{rule}\nDrive access: {mode}. Type /help for commands.")
}

/// Lines describing a finished load.
pub fn load_report(outcome: &FetchOutcome) -> Vec<String> {
    let mut lines = Vec::new();
    match outcome {
        FetchOutcome::NoAccess => {
            lines.push("No Drive credentials found; answering without documents.".to_string())
        }
        FetchOutcome::ListingFailed(e) => lines.push(format!("Drive Connect Error: {}", e)),
        FetchOutcome::Complete(_) | FetchOutcome::Partial { .. } => {}
    }
    for skipped in outcome.skipped() {
        lines.push(format!("Skipped '{}': {}", skipped.name, skipped.reason));
    }
    lines.push(format!(
        "Ready! Loaded {} documents.",
        outcome.knowledge_base().len()
    ));
    lines
}

pub fn message(message: &Message, assistant_name: &str) -> String {
    match message.role {
        Role::User => format!("You: {}", message.content),
        Role::Assistant => format!("{}: {}", assistant_name, message.content),
    }
}

pub fn history(state: &ConversationState, assistant_name: &str) -> String {
    if state.is_empty() {
        return "No messages yet.".to_string();
    }
    state
        .messages()
        .iter()
        .map(|m| message(m, assistant_name))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Admin-only commands are listed only in admin mode.
pub fn help(is_admin: bool) -> String {
    let width = COMMANDS.iter().map(|c| c.usage.len()).max().unwrap_or(0);
    let mut lines = vec!["Type a question, or one of:".to_string()];
    lines.extend(
        COMMANDS
            .iter()
            .filter(|c| is_admin || !c.admin_only)
            .map(|c| format!("  {:width$}  {}", c.usage, c.description, width = width)),
    );
    lines.join("\n")
}
