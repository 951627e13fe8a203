//! Interactive chat loop on stdin/stdout.

use std::future::Future;
use std::io::Write;
use std::path::Path;

use futures_util::StreamExt;
use strands_agent::{AgentEvent, Attachment, SessionController, UserInput};
use strands_common::{SessionId, StrandsError};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::render::Renderer;

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Chat(&'a str),
    Attach(&'a str),
    Reset,
    Usage,
    Help,
    Quit,
    Unknown(&'a str),
    Empty,
}

fn parse_command(line: &str) -> Command<'_> {
    let line = line.trim();
    match line {
        "" => Command::Empty,
        "/reset" => Command::Reset,
        "/usage" => Command::Usage,
        "/help" => Command::Help,
        "/quit" | "/exit" => Command::Quit,
        cmd => match cmd.strip_prefix("/attach ") {
            Some(path) if !path.trim().is_empty() => Command::Attach(path.trim()),
            _ if cmd.starts_with('/') => Command::Unknown(cmd),
            _ => Command::Chat(cmd),
        },
    }
}

const HELP: &str = "commands: /attach <path> adds a file to your next message, \
                    /reset clears history, /usage shows token totals, /quit exits. \
                    Ctrl-C cancels a running answer, or quits at the prompt.";

/// Send one user turn and render its events. Ctrl-C cancels the turn.
/// Returns whether the turn completed.
pub async fn run_turn<W: Write>(
    controller: &SessionController,
    session: &SessionId,
    input: UserInput,
    renderer: &mut Renderer<W>,
) -> Result<bool, StrandsError> {
    let mut stream = controller.submit(session, input)?;
    let mut cancel_sent = false;
    let mut completed = false;

    loop {
        tokio::select! {
            event = stream.next() => match event {
                Some(event) => {
                    completed |= matches!(event, AgentEvent::Completed { .. });
                    renderer.render(&event)?;
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c(), if !cancel_sent => {
                cancel_sent = true;
                controller.cancel(session);
            }
        }
    }
    Ok(completed)
}

/// Build the input for a one-shot prompt, reading each attachment.
pub fn prompt_input(prompt: &str, paths: &[impl AsRef<Path>]) -> Result<UserInput, StrandsError> {
    let mut input = UserInput::new(prompt);
    for path in paths {
        input = input.with_attachment(Attachment::from_path(path.as_ref())?);
    }
    Ok(input)
}

/// Wait for the next line at the prompt. An `interrupt` (Ctrl-C) ends
/// input the same way end of file does.
async fn read_prompt<R, F>(lines: &mut Lines<R>, interrupt: F) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future<Output = std::io::Result<()>>,
{
    tokio::select! {
        line = lines.next_line() => line,
        _ = interrupt => Ok(None),
    }
}

pub async fn run(controller: &SessionController, session: &SessionId) -> Result<(), StrandsError> {
    let mut renderer = Renderer::new(std::io::stdout());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending: Vec<Attachment> = Vec::new();

    println!("Strands chat (session {session}). Type /help for commands.");
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = read_prompt(&mut lines, tokio::signal::ctrl_c()).await? else {
            println!();
            break;
        };

        match parse_command(&line) {
            Command::Empty => continue,
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Unknown(cmd) => println!("unknown command {cmd}; try /help"),
            Command::Attach(path) => match Attachment::from_path(Path::new(path)) {
                Ok(attachment) => {
                    println!("(attached {}; sent with your next message)", attachment.label());
                    pending.push(attachment);
                }
                Err(e) => println!("{e}"),
            },
            Command::Reset => {
                controller.reset(session)?;
                println!("(history cleared)");
            }
            Command::Usage => match controller.usage(session) {
                Ok(tracker) => renderer.render_usage(&tracker)?,
                Err(_) => println!("no usage yet"),
            },
            Command::Chat(text) => {
                let input = UserInput {
                    text: text.to_string(),
                    attachments: std::mem::take(&mut pending),
                };
                run_turn(controller, session, input, &mut renderer).await?;
            }
        }
    }
    Ok(())
}
