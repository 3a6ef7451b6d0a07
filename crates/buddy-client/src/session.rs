//! Client-side session store.
//!
//! [`SessionState`] holds what the user is currently doing: which chat is on
//! screen, whether a search is outstanding, and every chat the server still
//! considers active. Only the [`SessionController`](crate::controller::SessionController)
//! mutates it; frontends read it to render.

use buddy_core::chat::{Chat, ChatId};
use indexmap::IndexMap;

/// Matchmaking/chat session state.
///
/// Invariant: `is_searching` implies `current_chat_id.is_none()`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    current_chat_id: Option<ChatId>,
    is_searching: bool,
    active_chats: IndexMap<ChatId, Chat>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session that resumes a chat the user was viewing before a restart.
    pub fn resuming(chat_id: impl Into<ChatId>) -> Self {
        Self {
            current_chat_id: Some(chat_id.into()),
            ..Self::default()
        }
    }

    pub fn current_chat_id(&self) -> Option<&ChatId> {
        self.current_chat_id.as_ref()
    }

    pub fn is_searching(&self) -> bool {
        self.is_searching
    }

    /// Active chats in creation order.
    pub fn active_chats(&self) -> &IndexMap<ChatId, Chat> {
        &self.active_chats
    }

    pub fn chat(&self, id: &str) -> Option<&Chat> {
        self.active_chats.get(id)
    }

    /// The chat on screen, if it is still active.
    pub fn current_chat(&self) -> Option<&Chat> {
        self.current_chat_id
            .as_deref()
            .and_then(|id| self.active_chats.get(id))
    }

    // -- mutations (controller only) ----------------------------------------

    /// Insert a chat, replacing any previous chat with the same id in place.
    pub(crate) fn create_chat(&mut self, chat: Chat) {
        self.active_chats.insert(chat.id.clone(), chat);
    }

    pub(crate) fn close_chat(&mut self, id: &str) -> Option<Chat> {
        self.active_chats.shift_remove(id)
    }

    pub(crate) fn close_all_chats(&mut self) {
        self.active_chats.clear();
    }

    /// Declare search intent. Searching means no chat is on screen.
    pub(crate) fn start_search(&mut self) {
        self.is_searching = true;
        self.current_chat_id = None;
    }

    /// Resolve the search, showing `matched` (or nothing).
    pub(crate) fn end_search(&mut self, matched: Option<ChatId>) {
        self.is_searching = false;
        self.current_chat_id = matched;
    }
}
