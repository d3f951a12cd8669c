// Chat layer - the terminal front end.
//
// Reads one line at a time, turns it into a `Command` and drives the
// `ChatSession`. Everything user-facing is written to the output stream; the
// tracing log goes to stderr.

#[path = "commands.rs"]
pub mod commands;

#[path = "render.rs"]
pub mod render;

#[path = "session.rs"]
pub mod session;

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::core::ai::{AiProvider, TurnOutcome};
use crate::core::auth::{AccessResolver, AuthError};
use crate::core::drive::FetchOutcome;
use commands::Command;
pub use session::{ChatSession, SessionError};

const ADMIN_ONLY: &str = "Admin controls are only available in admin mode.";
const CIRCULARS_NOTICE: &str = "Please run the bot from your local machine code for stability.";

async fn say<O: AsyncWrite + Unpin>(out: &mut O, text: &str) -> Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}

/// Runs the chat until `/quit` or end of input.
pub async fn run<R, P, I, O>(
    mut session: ChatSession<R, P>,
    title: &str,
    input: I,
    mut out: O,
) -> Result<()>
where
    R: AccessResolver,
    P: AiProvider,
    I: AsyncBufRead + Unpin,
    O: AsyncWrite + Unpin,
{
    match session.access().await {
        Ok(access) => {
            say(&mut out, &render::banner(title, &access.mode().to_string())).await?;
            say(&mut out, "Accessing the class archives...").await?;
            let outcome = session.load_with(&access).await;
            report_load(&mut out, Ok(outcome)).await?;
        }
        Err(e) => {
            tracing::error!("Could not resolve Drive credentials: {}", e);
            say(&mut out, &render::banner(title, "unavailable")).await?;
            say(&mut out, &format!("Drive Connect Error: {}", e)).await?;
            say(&mut out, "Ready! Loaded 0 documents.").await?;
        }
    }

    if !session.has_api_key() {
        say(&mut out, "No Gemini API key configured. Enter one with /key <api-key>.").await?;
    }

    let mut lines = input.lines();
    loop {
        out.write_all(b"> ").await?;
        out.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let Some(command) = Command::parse(&line) else {
            continue;
        };

        match command {
            Command::Ask(question) => match session.ask(&question).await {
                TurnOutcome::Answered(answer) => {
                    let name = session.assistant_name().to_string();
                    say(&mut out, &format!("{}: {}", name, answer)).await?;
                }
                TurnOutcome::MissingApiKey => {
                    say(&mut out, "Enter a Gemini API key with /key <api-key> first.").await?;
                }
                TurnOutcome::Failed(e) => say(&mut out, &format!("AI Error: {}", e)).await?,
            },
            Command::Refresh => {
                say(&mut out, "Refreshing documents...").await?;
                report_load(&mut out, session.refresh().await).await?;
            }
            Command::Key(key) => {
                session.set_api_key(key);
                say(&mut out, "API key set for this session.").await?;
            }
            Command::Circulars => {
                let text = if session.is_admin().await {
                    CIRCULARS_NOTICE
                } else {
                    ADMIN_ONLY
                };
                say(&mut out, text).await?;
            }
            Command::Upload(path) => {
                let text = match session.upload(&path).await {
                    Ok(id) => format!("Uploaded {} (id {}).", path.display(), id),
                    Err(SessionError::AdminOnly) => ADMIN_ONLY.to_string(),
                    Err(e) => {
                        tracing::error!("Upload of {} failed: {}", path.display(), e);
                        format!("UPLOAD FAILED: {}", e)
                    }
                };
                say(&mut out, &text).await?;
            }
            Command::History => {
                let text = render::history(session.transcript(), session.assistant_name());
                say(&mut out, &text).await?;
            }
            Command::Help => {
                let text = render::help(session.is_admin().await);
                say(&mut out, &text).await?;
            }
            Command::Quit => break,
            Command::Usage(usage) => say(&mut out, &format!("Usage: {}", usage)).await?,
            Command::Unknown(name) => {
                say(&mut out, &format!("Unknown command /{}. Type /help for the list.", name))
                    .await?;
            }
        }
    }

    say(&mut out, "Goodbye!").await?;
    Ok(())
}

async fn report_load<O: AsyncWrite + Unpin>(
    out: &mut O,
    result: Result<Arc<FetchOutcome>, AuthError>,
) -> Result<()> {
    match result {
        Ok(outcome) => {
            for line in render::load_report(&outcome) {
                say(out, &line).await?;
            }
        }
        Err(e) => {
            tracing::error!("Credential error while loading documents: {}", e);
            say(out, &format!("Drive Connect Error: {}", e)).await?;
        }
    }
    Ok(())
}
