//! Chat data model shared by the wire protocol and the client session store.
//!
//! A [`Chat`] is created either when the server pairs two users (empty
//! history) or when the server rehydrates a session after a reconnect (full
//! history). The client never mutates a chat after creation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-issued chat (room) identifier.
pub type ChatId = String;

/// Server-issued user identifier.
pub type UserId = String;

/// A single chat message, as delivered in a restore payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub sender_id: UserId,
    pub message: String,
    /// Millisecond Unix timestamp on the wire.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub time: DateTime<Utc>,
}

/// A chat between matched users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: ChatId,
    pub user_ids: Vec<UserId>,
    /// Chronological; insertion order is delivery order.
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
}

impl Chat {
    /// Build a chat, dropping duplicate user IDs while keeping first-seen order.
    pub fn new(
        id: impl Into<ChatId>,
        user_ids: impl IntoIterator<Item = UserId>,
        messages: Vec<Message>,
        created_at: DateTime<Utc>,
    ) -> Self {
        let mut unique: Vec<UserId> = Vec::new();
        for user in user_ids {
            if !unique.contains(&user) {
                unique.push(user);
            }
        }
        Self {
            id: id.into(),
            user_ids: unique,
            messages,
            created_at,
        }
    }

    /// A freshly matched chat with no history.
    pub fn matched(id: impl Into<ChatId>, user_ids: impl IntoIterator<Item = UserId>) -> Self {
        Self::new(id, user_ids, Vec::new(), Utc::now())
    }

    pub fn has_user(&self, user: &str) -> bool {
        self.user_ids.iter().any(|u| u == user)
    }
}

/// Read-only credentials presented to the server when joining the queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub login_id: String,
    pub email: String,
}

impl UserIdentity {
    pub fn new(login_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            login_id: login_id.into(),
            email: email.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_users_are_collapsed() {
        let chat = Chat::matched(
            "r1",
            ["u1".to_string(), "u2".to_string(), "u1".to_string()],
        );
        assert_eq!(chat.user_ids, vec!["u1", "u2"]);
        assert!(chat.has_user("u2"));
        assert!(!chat.has_user("u3"));
        assert!(chat.messages.is_empty());
    }

    #[test]
    fn chat_decodes_from_camel_case_json() {
        let json = r#"{
            "id": "r1",
            "userIds": ["u1", "u2"],
            "messages": [
                {"id": "m1", "senderId": "u1", "message": "hi", "time": 1700000000000}
            ],
            "createdAt": 1699999999000
        }"#;
        let chat: Chat = serde_json::from_str(json).unwrap();
        assert_eq!(chat.id, "r1");
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].sender_id, "u1");
        assert_eq!(chat.created_at.timestamp_millis(), 1_699_999_999_000);
    }

    #[test]
    fn missing_messages_default_to_empty() {
        let json = r#"{"id": "r2", "userIds": ["u1"], "createdAt": 0}"#;
        let chat: Chat = serde_json::from_str(json).unwrap();
        assert!(chat.messages.is_empty());
    }
}
