//! Line-oriented terminal front end for the coordinator.

pub mod commands;
pub mod view;

use std::io::Write;

use anyhow::{Context, Result};
use log::warn;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;

use crate::coordinator::{CoordinatorHandle, ShellAction};

pub use commands::{parse_line, CommandError, ShellInput, HELP};
pub use view::{render_status, render_update, RevealPrinter};

fn emit(text: &str) {
    if text.is_empty() {
        return;
    }
    let mut stdout = std::io::stdout().lock();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

/// Reads commands from stdin until `quit` or end of input, printing
/// coordinator updates and the narration reveal as they arrive.
pub async fn run_shell(
    handle: CoordinatorHandle,
    coordinator: JoinHandle<Result<()>>,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut updates = handle.subscribe();
    let mut narration = handle.narration();
    let mut printer = RevealPrinter::new();

    emit("EmoLearn ready. Type 'help' for commands.\n");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    handle.send(ShellAction::Shutdown)?;
                    break;
                };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(ShellInput::Help)) => emit(&format!("{HELP}\n")),
                    Ok(Some(ShellInput::Status)) => {
                        emit(&format!("{}\n", render_status(&handle.snapshot())));
                    }
                    Ok(Some(ShellInput::Action(action))) => {
                        let quitting = action == ShellAction::Shutdown;
                        handle.send(action)?;
                        if quitting {
                            break;
                        }
                    }
                    Err(err) => emit(&format!("! {err}\n")),
                }
            }
            update = updates.recv() => match update {
                Ok(update) => {
                    if let Some(text) = render_update(&update) {
                        emit(&format!("{text}\n"));
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!("shell skipped {skipped} updates"),
                Err(RecvError::Closed) => break,
            },
            changed = narration.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = narration.borrow_and_update().clone();
                emit(&printer.advance(&snapshot));
            }
        }
    }

    coordinator
        .await
        .context("coordinator task panicked")?
}
