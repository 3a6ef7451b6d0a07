//! The presentation-shell collaborator.
//!
//! A [`Shell`] renders controller state and performs the fire-and-forget
//! side effects (sounds, desktop notifications, navigation, prompts). It
//! triggers no session logic of its own: user answers travel back to the
//! runtime as [`UserIntent`]s.

use buddy_core::chat::ChatId;

use crate::effect::{NotificationKind, Route};
use crate::session::SessionState;

/// What the shell should present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// Automatic recovery gave up; offer a reconnect button.
    AwaitingReconnect,
    Searching,
    /// A chat just closed and the user has not yet said whether to search
    /// again.
    Deciding { chat_id: Option<ChatId> },
    Chat { chat_id: ChatId },
}

/// User input forwarded to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIntent {
    /// Pressed the reconnect affordance.
    Reconnect,
    /// Answered the "search again?" prompt.
    SearchAgain(bool),
    Quit,
}

/// Frontend hooks invoked by the runtime.
pub trait Shell {
    fn play_notification(&mut self, kind: NotificationKind);

    fn create_browser_notification(&mut self, title: &str, body: &str);

    /// Show the "search for a new buddy?" question. The answer arrives later
    /// as [`UserIntent::SearchAgain`].
    fn prompt_search_again(&mut self, chat_id: Option<&str>);

    fn navigate(&mut self, route: Route);

    fn render(&mut self, view: &View, session: &SessionState);
}
