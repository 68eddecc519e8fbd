//! Line-oriented kitchen input on stdin.
//!
//! Stands in for touch input on a real display:
//! `ready <id>`, `undo <id>`, `delete <id>`, `connect <host:port>`,
//! `tunnel <url>`, `list`, `quit`.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::discovery::{Discovery, manual_address, manual_tunnel};
use crate::runtime::{KitchenAction, Message};
use crate::websocket::SupervisorCommand;

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Kitchen(KitchenAction),
    Connect(String),
    Tunnel(String),
    Quit,
}

/// Parses one console line.
///
/// # Errors
///
/// Returns a usage message for unknown commands or missing arguments.
pub fn parse_command(line: &str) -> Result<ConsoleCommand, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().unwrap_or_default().to_ascii_lowercase();
    let arg = parts.next().map(String::from);

    let require = |arg: Option<String>| arg.ok_or_else(|| format!("usage: {verb} <argument>"));

    match verb.as_str() {
        "ready" => Ok(ConsoleCommand::Kitchen(KitchenAction::MarkReady(require(arg)?))),
        "undo" => Ok(ConsoleCommand::Kitchen(KitchenAction::Undo(require(arg)?))),
        "delete" => Ok(ConsoleCommand::Kitchen(KitchenAction::Delete(require(arg)?))),
        "connect" => Ok(ConsoleCommand::Connect(require(arg)?)),
        "tunnel" => Ok(ConsoleCommand::Tunnel(require(arg)?)),
        "list" | "ls" => Ok(ConsoleCommand::Kitchen(KitchenAction::ShowBoard)),
        "quit" | "exit" => Ok(ConsoleCommand::Quit),
        "" => Err("empty command".to_string()),
        other => Err(format!("unknown command: {other}")),
    }
}

/// Spawns a task reading console commands from stdin.
///
/// Manual connects are validated through `discovery` first; a rejected
/// address is reported and not retried.
pub fn spawn_console(
    tx: mpsc::UnboundedSender<Message>,
    commands: mpsc::UnboundedSender<SupervisorCommand>,
    discovery: Arc<dyn Discovery>,
    encrypted: bool,
) {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read console input: {e}");
                    break;
                }
            };

            let command = match parse_command(&line) {
                Ok(command) => command,
                Err(usage) => {
                    warn!("{usage}");
                    continue;
                }
            };

            let descriptor = match command {
                ConsoleCommand::Kitchen(action) => {
                    if tx.send(Message::Kitchen(action)).is_err() {
                        break;
                    }
                    continue;
                }
                ConsoleCommand::Quit => {
                    let _ = tx.send(Message::Quit);
                    break;
                }
                ConsoleCommand::Connect(address) => {
                    manual_address(discovery.as_ref(), &address, encrypted).await
                }
                ConsoleCommand::Tunnel(url) => manual_tunnel(discovery.as_ref(), &url).await,
            };

            match descriptor {
                Ok(descriptor) => {
                    info!(address = %descriptor.address, "Switching order server");
                    if commands.send(SupervisorCommand::Reconnect(descriptor)).is_err() {
                        break;
                    }
                }
                Err(e) => error!("{e}"),
            }
        }
    });
}
