use std::path::PathBuf;

/// One line of operator input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Anything that is not a slash command is a question.
    Ask(String),
    Refresh,
    Key(String),
    Circulars,
    Upload(PathBuf),
    History,
    Help,
    Quit,
    /// A known command used without its argument.
    Usage(&'static str),
    Unknown(String),
}

pub struct CommandInfo {
    pub usage: &'static str,
    pub description: &'static str,
    pub admin_only: bool,
}

pub const COMMANDS: &[CommandInfo] = &[
    CommandInfo {
        usage: "/refresh",
        description: "Clear the document cache and reload the folder.",
        admin_only: false,
    },
    CommandInfo {
        usage: "/key <api-key>",
        description: "Set the Gemini API key for this session.",
        admin_only: false,
    },
    CommandInfo {
        usage: "/history",
        description: "Show the conversation so far.",
        admin_only: false,
    },
    CommandInfo {
        usage: "/circulars",
        description: "Fetch new circulars into the folder.",
        admin_only: true,
    },
    CommandInfo {
        usage: "/upload <path>",
        description: "Upload a local file into the folder.",
        admin_only: true,
    },
    CommandInfo {
        usage: "/help",
        description: "Show this list.",
        admin_only: false,
    },
    CommandInfo {
        usage: "/quit",
        description: "Leave the chat.",
        admin_only: false,
    },
];

impl Command {
    /// Returns `None` for blank input.
    pub fn parse(line: &str) -> Option<Command> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let Some(rest) = line.strip_prefix('/') else {
            return Some(Command::Ask(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "refresh" => Command::Refresh,
            "circulars" => Command::Circulars,
            "history" => Command::History,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "key" if arg.is_empty() => Command::Usage("/key <api-key>"),
            "key" => Command::Key(arg.to_string()),
            "upload" if arg.is_empty() => Command::Usage("/upload <path>"),
            "upload" => Command::Upload(PathBuf::from(arg)),
            other => Command::Unknown(other.to_string()),
        };
        Some(command)
    }
}
