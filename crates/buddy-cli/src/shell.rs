//! Line-oriented terminal shell.

use std::fmt;
use std::io::{self, Stdout, Write};

use buddy_client::effect::{NotificationKind, Route};
use buddy_client::session::SessionState;
use buddy_client::shell::{Shell, View};

/// Prints controller output line by line. Repeated renders of an unchanged
/// view are suppressed.
pub struct TerminalShell<W: Write = Stdout> {
    out: W,
    last_view: Option<View>,
}

impl TerminalShell<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalShell<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            last_view: None,
        }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        if let Err(e) = writeln!(self.out, "{}", args) {
            tracing::debug!(error = %e, "Failed to write to terminal");
        }
    }
}

impl<W: Write> Shell for TerminalShell<W> {
    fn play_notification(&mut self, kind: NotificationKind) {
        // Terminal bell; flushed so it rings now rather than with the next line.
        let rung = self.out.write_all(b"\x07").and_then(|()| self.out.flush());
        if let Err(e) = rung {
            tracing::debug!(error = %e, "Failed to ring bell");
        }
        tracing::debug!(?kind, "Notification sound");
    }

    fn create_browser_notification(&mut self, title: &str, body: &str) {
        self.line(format_args!("[{}] {}", title, body));
    }

    fn prompt_search_again(&mut self, chat_id: Option<&str>) {
        match chat_id {
            Some(id) => self.line(format_args!(
                "Chat {} was closed. Search for a new buddy? [y/n]",
                id
            )),
            None => self.line(format_args!(
                "Your chat was closed. Search for a new buddy? [y/n]"
            )),
        }
    }

    fn navigate(&mut self, route: Route) {
        match route {
            Route::Home => self.line(format_args!("Returning home.")),
        }
    }

    fn render(&mut self, view: &View, session: &SessionState) {
        if self.last_view.as_ref() == Some(view) {
            return;
        }
        match view {
            View::AwaitingReconnect => {
                self.line(format_args!("Connection lost. Type 'r' to reconnect."));
            }
            View::Searching => self.line(format_args!("Searching for a buddy...")),
            View::Deciding { .. } => {}
            View::Chat { chat_id } => match session.chat(chat_id) {
                Some(chat) => {
                    self.line(format_args!(
                        "In chat {} with {} ({} messages)",
                        chat.id,
                        chat.user_ids.join(", "),
                        chat.messages.len()
                    ));
                    for msg in &chat.messages {
                        self.line(format_args!(
                            "  [{}] {}: {}",
                            msg.time.format("%H:%M"),
                            msg.sender_id,
                            msg.message
                        ));
                    }
                }
                None => self.line(format_args!("In chat {}", chat_id)),
            },
        }
        self.last_view = Some(view.clone());
        if let Err(e) = self.out.flush() {
            tracing::debug!(error = %e, "Failed to flush terminal");
        }
    }
}
