//! Side effects requested by the session controller.
//!
//! The controller never touches the network or the screen. Every handler
//! returns a list of [`Effect`]s which the [`Runtime`](crate::runtime::Runtime)
//! executes in order.

use buddy_core::chat::ChatId;
use buddy_core::protocol::ClientMessage;

use crate::connection::EventName;

/// Which sound cue to play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    BuddyPaired,
    ChatClosed,
}

/// Where the shell should navigate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Leave the matcher entirely.
    Home,
}

/// Instructions produced by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Subscribe(EventName),
    Unsubscribe(EventName),
    /// Establish the connection, resuming `chat_id` when known.
    Connect { chat_id: Option<ChatId> },
    /// Force the connection down (no automatic recovery).
    Disconnect,
    Emit(ClientMessage),
    PlayNotification(NotificationKind),
    BrowserNotification { title: String, body: String },
    /// Ask the user whether to search for a new buddy. Answered later via
    /// [`SessionController::resolve_search_again`](crate::controller::SessionController::resolve_search_again).
    PromptSearchAgain { chat_id: Option<ChatId> },
    Navigate(Route),
    /// Controller state changed; re-render.
    Render,
}

impl Effect {
    pub fn browser_notification(title: impl Into<String>, body: impl Into<String>) -> Self {
        Effect::BrowserNotification {
            title: title.into(),
            body: body.into(),
        }
    }
}
