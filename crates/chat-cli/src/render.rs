use std::io::{self, Write};

use chat_core::{Message, Role};
use chat_state::{ChatSession, SessionUpdate, Settlement};
use colored::Colorize;
use tokio::sync::broadcast::error::RecvError;

pub fn print_message(message: &Message) {
    let label = match message.role {
        Role::User => "you>".cyan().bold(),
        Role::Assistant => "assistant>".green().bold(),
    };
    let time = message
        .created_at
        .with_timezone(&chrono::Local)
        .format("%H:%M:%S")
        .to_string();
    println!("{} {} {}", time.dimmed(), label, message.content());
}

/// Send `content` and print the reply as it streams. Ctrl-C cancels the
/// reply and keeps what has arrived so far.
pub async fn stream_reply(session: &ChatSession, content: &str) -> anyhow::Result<Settlement> {
    let mut updates = session.subscribe();
    session.send(content)?;

    print!("{} ", "assistant>".green().bold());
    io::stdout().flush()?;

    let mut printer = ReplyPrinter::default();
    loop {
        let update = tokio::select! {
            update = updates.recv() => update,
            _ = tokio::signal::ctrl_c() => {
                if session.cancel() {
                    log::debug!("Reply cancelled from keyboard");
                }
                continue;
            }
        };

        match update {
            Ok(SessionUpdate::ContentAppended { delta, .. }) => printer.delta(session, &delta)?,
            Ok(SessionUpdate::Settled { settlement, .. }) => {
                printer.finish(session, &settlement)?;
                println!();
                print_settlement(session, &settlement);
                return Ok(settlement);
            }
            Ok(SessionUpdate::MessageAppended { .. }) => {}
            Err(RecvError::Lagged(skipped)) => {
                log::warn!("Renderer fell behind, {} updates skipped", skipped);
                printer.resync(session)?;
            }
            Err(RecvError::Closed) => anyhow::bail!("session closed while streaming"),
        }
    }
}

/// Tracks how much of the streaming reply reached the terminal.
///
/// After a lag the buffered deltas can no longer be trusted to line up with
/// the screen, so the rest of the reply is printed from transcript snapshots.
#[derive(Debug, Default)]
struct ReplyPrinter {
    printed: usize,
    from_snapshot: bool,
}

impl ReplyPrinter {
    fn delta(&mut self, session: &ChatSession, delta: &str) -> io::Result<()> {
        if self.from_snapshot {
            return self.resync(session);
        }
        self.printed += delta.len();
        print!("{delta}");
        io::stdout().flush()
    }

    /// Print what the transcript holds beyond the screen, while the reply
    /// is still streaming. A settled reply may carry the failure notice.
    fn resync(&mut self, session: &ChatSession) -> io::Result<()> {
        self.from_snapshot = true;
        match session.last_message() {
            Some(message) if message.is_streaming() => self.print_tail(&message),
            _ => Ok(()),
        }
    }

    /// Catch up on a reply that settled while printing from snapshots.
    fn finish(&mut self, session: &ChatSession, settlement: &Settlement) -> io::Result<()> {
        if !self.from_snapshot || matches!(settlement, Settlement::Failed(_)) {
            return Ok(());
        }
        match session.last_message() {
            Some(message) => self.print_tail(&message),
            None => Ok(()),
        }
    }

    fn print_tail(&mut self, message: &Message) -> io::Result<()> {
        let tail = unprinted_tail(message.content(), self.printed);
        if !tail.is_empty() {
            self.printed += tail.len();
            print!("{tail}");
            io::stdout().flush()?;
        }
        Ok(())
    }
}

fn unprinted_tail(content: &str, printed: usize) -> &str {
    content.get(printed..).unwrap_or_default()
}

fn print_settlement(session: &ChatSession, settlement: &Settlement) {
    match settlement {
        Settlement::Completed => {}
        Settlement::Cancelled => println!("{}", "[reply cancelled]".yellow()),
        Settlement::Failed(reason) => {
            log::debug!("Reply failed: {}", reason);
            if let Some(message) = session.last_message() {
                println!("{}", message.content().red());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unprinted_tail_resumes_after_printed_bytes() {
        assert_eq!(unprinted_tail("Hello world", 0), "Hello world");
        assert_eq!(unprinted_tail("Hello world", 5), " world");
        assert_eq!(unprinted_tail("Hello", 5), "");
    }

    #[test]
    fn unprinted_tail_is_empty_past_the_end_or_mid_character() {
        assert_eq!(unprinted_tail("Hi", 40), "");
        assert_eq!(unprinted_tail("caf\u{e9}", 4), "");
    }
}
