//! Framework-agnostic session controller.
//!
//! [`SessionController`] is a pure state machine: it owns the
//! [`SessionState`], the [`ReconnectPolicy`] and the binding lifecycle, and
//! turns inputs into [`Effect`]s:
//!
//! - [`activate`](SessionController::activate) /
//!   [`deactivate`](SessionController::deactivate) bind and unbind the
//!   connection.
//! - [`handle`](SessionController::handle) applies one [`TransportEvent`].
//! - [`manual_reconnect`](SessionController::manual_reconnect) and
//!   [`resolve_search_again`](SessionController::resolve_search_again) apply
//!   user decisions.
//!
//! Whenever the current chat id changes the controller tears the binding
//! down and rebuilds it for the new chat, so the server can resume the right
//! session on the fresh connection.

use buddy_core::chat::{Chat, ChatId, UserIdentity};
use buddy_core::protocol::{ClientMessage, DisconnectReason, ServerMessage};
use buddy_core::transport::TransportError;

use crate::config::ClientConfig;
use crate::connection::{ConnectionState, EventName, TransportEvent};
use crate::effect::{Effect, NotificationKind, Route};
use crate::reconnect::ReconnectPolicy;
use crate::session::SessionState;
use crate::shell::View;

pub const MATCH_NOTIFICATION_TITLE: &str = "Let's Chat :)";
pub const MATCH_NOTIFICATION_BODY: &str =
    "You've found a match, don't keep your Partner waiting ⌛";
pub const CLOSED_NOTIFICATION_TITLE: &str = "Chat Closed";
pub const CLOSED_NOTIFICATION_BODY: &str = "Your buddy left the chat";

/// One activation: the live subscriptions plus the chat the connection was
/// established for.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    chat_id: Option<ChatId>,
}

/// Owns session state and reconnect policy, producing effects for the
/// runtime.
#[derive(Debug, Clone)]
pub struct SessionController {
    identity: UserIdentity,
    session: SessionState,
    policy: ReconnectPolicy,
    /// Automatic recovery gave up; the reconnect affordance is showing.
    disconnected: bool,
    /// The connection was already forced down during the current outage.
    /// Cleared whenever a fresh establishment is requested or succeeds.
    gave_up: bool,
    /// A `join` was sent and not yet answered by a match or restore.
    join_outstanding: bool,
    /// Set while the "search again?" question is unanswered. Holds the id of
    /// the chat that closed.
    pending_decision: Option<Option<ChatId>>,
    binding: Option<Binding>,
}

impl SessionController {
    pub fn new(identity: UserIdentity, reconnect_threshold: u32) -> Self {
        Self {
            identity,
            session: SessionState::new(),
            policy: ReconnectPolicy::new(reconnect_threshold),
            disconnected: false,
            gave_up: false,
            join_outstanding: false,
            pending_decision: None,
            binding: None,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.identity.clone(), config.reconnect_threshold)
    }

    /// Start from an existing session, e.g. one resuming a known chat.
    pub fn with_session(mut self, session: SessionState) -> Self {
        self.session = session;
        self
    }

    // -- accessors -----------------------------------------------------------

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn identity(&self) -> &UserIdentity {
        &self.identity
    }

    pub fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    pub fn is_active(&self) -> bool {
        self.binding.is_some()
    }

    pub fn is_join_outstanding(&self) -> bool {
        self.join_outstanding
    }

    pub fn is_awaiting_decision(&self) -> bool {
        self.pending_decision.is_some()
    }

    /// What the shell should present right now.
    pub fn view(&self) -> View {
        if self.disconnected {
            return View::AwaitingReconnect;
        }
        if let Some(chat_id) = &self.pending_decision {
            return View::Deciding {
                chat_id: chat_id.clone(),
            };
        }
        match self.session.current_chat_id() {
            Some(chat_id) if !self.session.is_searching() => View::Chat {
                chat_id: chat_id.clone(),
            },
            _ => View::Searching,
        }
    }

    // -- lifecycle -------------------------------------------------------------

    /// Bind to the connection. `connection` is the transport's current state;
    /// a new establishment is only requested when it is `Disconnected`.
    pub fn activate(&mut self, connection: ConnectionState) -> Vec<Effect> {
        if self.binding.is_some() {
            return Vec::new();
        }
        let mut effects = Vec::new();
        self.bind(connection, &mut effects);
        effects.push(Effect::Render);
        effects
    }

    /// Unsubscribe everything the active binding registered, then force the
    /// connection down.
    pub fn deactivate(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.unbind(&mut effects);
        effects
    }

    /// Report a failed establishment. Logged only: the transport keeps
    /// retrying on its own and reports through reconnect events.
    pub fn connect_failed(&self, error: &TransportError) {
        tracing::warn!(
            error = %error,
            chat_id = ?self.session.current_chat_id(),
            "Failed to connect"
        );
    }

    // -- inputs ----------------------------------------------------------------

    /// Apply one transport event.
    pub fn handle(&mut self, event: TransportEvent) -> Vec<Effect> {
        if self.binding.is_none() {
            tracing::debug!(
                event = event.name().as_str(),
                "Ignoring event outside an active binding"
            );
            return Vec::new();
        }

        let mut effects = Vec::new();
        match event {
            TransportEvent::Connect => self.on_connect(&mut effects),
            TransportEvent::Server(msg) => self.on_server_message(msg, &mut effects),
            TransportEvent::Disconnect(reason) => self.on_disconnect(&reason, &mut effects),
            TransportEvent::ReconnectAttempt(attempt) => self.policy.record_attempt(attempt),
            TransportEvent::ReconnectError => self.on_reconnect_error(&mut effects),
        }
        self.finish(effects)
    }

    /// The user pressed the reconnect affordance. `connection` is the
    /// transport's current state; nothing happens unless it is down.
    pub fn manual_reconnect(&mut self, connection: ConnectionState) -> Vec<Effect> {
        if self.binding.is_none() || connection != ConnectionState::Disconnected {
            return Vec::new();
        }

        self.policy.reset();
        self.gave_up = false;
        if self.session.current_chat_id().is_none() {
            self.session.start_search();
        }
        tracing::info!(chat_id = ?self.session.current_chat_id(), "Manual reconnect");
        let effects = vec![Effect::Connect {
            chat_id: self.session.current_chat_id().cloned(),
        }];
        self.finish(effects)
    }

    /// Answer the "search again?" prompt raised by a closed chat.
    ///
    /// `false` navigates away and releases the binding; `true` starts a new
    /// search on a fresh connection.
    pub fn resolve_search_again(&mut self, search_again: bool) -> Vec<Effect> {
        let Some(closed) = self.pending_decision.take() else {
            return Vec::new();
        };

        let mut effects = Vec::new();
        if !search_again {
            tracing::info!(chat_id = ?closed, "Leaving the matcher");
            effects.push(Effect::Navigate(Route::Home));
            self.unbind(&mut effects);
            effects.push(Effect::Render);
            return effects;
        }

        tracing::info!(chat_id = ?closed, "Searching for a new buddy");
        effects.push(Effect::browser_notification(
            CLOSED_NOTIFICATION_TITLE,
            CLOSED_NOTIFICATION_BODY,
        ));
        self.session.start_search();
        if self.binding.is_some() {
            self.unbind(&mut effects);
            self.bind(ConnectionState::Disconnected, &mut effects);
        }
        effects.push(Effect::Render);
        effects
    }

    // -- private -----------------------------------------------------------------

    fn bind(&mut self, connection: ConnectionState, effects: &mut Vec<Effect>) {
        // Declare intent before anything can match.
        if self.session.current_chat_id().is_none() {
            self.session.start_search();
        }
        let chat_id = self.session.current_chat_id().cloned();
        if connection == ConnectionState::Disconnected {
            self.gave_up = false;
            effects.push(Effect::Connect {
                chat_id: chat_id.clone(),
            });
        }
        effects.extend(EventName::ALL.into_iter().map(Effect::Subscribe));
        tracing::debug!(chat_id = ?chat_id, "Binding activated");
        self.binding = Some(Binding { chat_id });
    }

    fn unbind(&mut self, effects: &mut Vec<Effect>) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        effects.extend(EventName::ALL.into_iter().map(Effect::Unsubscribe));
        effects.push(Effect::Disconnect);
        self.policy.reset();
        self.join_outstanding = false;
        tracing::debug!(chat_id = ?binding.chat_id, "Binding released");
    }

    /// Rebind if the current chat moved away from the bound one, then render.
    fn finish(&mut self, mut effects: Vec<Effect>) -> Vec<Effect> {
        if self.pending_decision.is_none()
            && let Some(binding) = &self.binding
            && binding.chat_id.as_ref() != self.session.current_chat_id()
        {
            tracing::debug!(
                from = ?binding.chat_id,
                to = ?self.session.current_chat_id(),
                "Current chat changed, rebinding"
            );
            self.unbind(&mut effects);
            self.bind(ConnectionState::Disconnected, &mut effects);
        }
        effects.push(Effect::Render);
        effects
    }

    fn join_message(&self) -> ClientMessage {
        ClientMessage::Join {
            login_id: self.identity.login_id.clone(),
            email: self.identity.email.clone(),
        }
    }

    fn on_connect(&mut self, effects: &mut Vec<Effect>) {
        self.policy.reset();
        self.disconnected = false;
        self.gave_up = false;
        self.join_outstanding = true;
        effects.push(Effect::Emit(self.join_message()));
        tracing::debug!(chat_id = ?self.session.current_chat_id(), "Connected, joined queue");
    }

    fn on_server_message(&mut self, msg: ServerMessage, effects: &mut Vec<Effect>) {
        match msg {
            ServerMessage::Joined { room_id, user_ids } => {
                if !self.join_outstanding && !self.session.is_searching() {
                    tracing::debug!(chat_id = %room_id, "Match arrived without a pending search");
                }
                effects.push(Effect::PlayNotification(NotificationKind::BuddyPaired));
                effects.push(Effect::browser_notification(
                    MATCH_NOTIFICATION_TITLE,
                    MATCH_NOTIFICATION_BODY,
                ));
                tracing::info!(chat_id = %room_id, users = user_ids.len(), "Matched");
                self.session.create_chat(Chat::matched(room_id.clone(), user_ids));
                self.session.end_search(Some(room_id));
                self.join_outstanding = false;
            }
            ServerMessage::ChatRestore {
                chats,
                current_chat_id,
            } => {
                let restored = chats.len();
                for chat in chats.into_values() {
                    self.session.create_chat(chat);
                }
                tracing::info!(restored, current = ?current_chat_id, "Session restored");
                match current_chat_id {
                    Some(chat_id) => {
                        self.session.end_search(Some(chat_id));
                        self.join_outstanding = false;
                    }
                    None => self.session.start_search(),
                }
            }
            ServerMessage::ChatClosed(chat_id) => self.on_chat_closed(chat_id, effects),
            ServerMessage::Inactive => {
                tracing::info!(
                    closed = self.session.active_chats().len(),
                    "Marked inactive, closing all chats"
                );
                self.session.close_all_chats();
            }
        }
    }

    fn on_chat_closed(&mut self, chat_id: Option<ChatId>, effects: &mut Vec<Effect>) {
        let current = self.session.current_chat_id().cloned();
        let closed = chat_id.or_else(|| current.clone());

        // A chat other than the one on screen ended (including while
        // searching), or a decision is already pending: drop it silently.
        let background = closed.is_some() && closed != current;
        if background || self.pending_decision.is_some() {
            if let Some(id) = &closed {
                self.session.close_chat(id);
            }
            tracing::debug!(chat_id = ?closed, "Background chat closed");
            return;
        }

        tracing::info!(chat_id = ?closed, "Chat closed");
        self.session.end_search(None);
        if let Some(id) = &closed {
            self.session.close_chat(id);
        }
        effects.push(Effect::PlayNotification(NotificationKind::ChatClosed));
        effects.push(Effect::PromptSearchAgain {
            chat_id: closed.clone(),
        });
        self.pending_decision = Some(closed);
    }

    fn on_disconnect(&mut self, reason: &DisconnectReason, effects: &mut Vec<Effect>) {
        if reason.is_explicit() {
            tracing::debug!(%reason, "Explicit disconnect, not recovering");
            return;
        }
        self.drop_connection(effects);
    }

    fn on_reconnect_error(&mut self, effects: &mut Vec<Effect>) {
        if self.policy.is_exhausted() {
            tracing::warn!(
                attempts = self.policy.attempt_count(),
                "Automatic reconnection exhausted"
            );
            self.drop_connection(effects);
        }
    }

    /// Stop automatic recovery unless a chat is on screen.
    ///
    /// An active chat rides out transport loss silently; a user who is only
    /// searching is shown the reconnect affordance instead.
    fn drop_connection(&mut self, effects: &mut Vec<Effect>) {
        self.policy.reset();
        if let Some(chat_id) = self.session.current_chat_id() {
            tracing::debug!(chat_id = %chat_id, "Transport lost during chat, relying on transport retry");
            return;
        }
        if self.gave_up {
            return;
        }

        effects.push(Effect::Disconnect);
        self.disconnected = true;
        self.gave_up = true;
        self.join_outstanding = false;
        self.session.end_search(None);
        tracing::info!("Connection lost while searching; waiting for manual reconnect");
    }
}

#[cfg(test)]
mod tests {
    use buddy_core::chat::UserId;
    use indexmap::IndexMap;

    use super::*;

    fn identity() -> UserIdentity {
        UserIdentity::new("login-1", "me@example.com")
    }

    fn controller() -> SessionController {
        SessionController::new(identity(), 3)
    }

    /// Activated and connected, join outstanding.
    fn connected() -> SessionController {
        let mut ctrl = controller();
        ctrl.activate(ConnectionState::Disconnected);
        ctrl.handle(TransportEvent::Connect);
        ctrl
    }

    fn users(ids: &[&str]) -> Vec<UserId> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    fn joined(room: &str, ids: &[&str]) -> TransportEvent {
        TransportEvent::Server(ServerMessage::Joined {
            room_id: room.to_string(),
            user_ids: users(ids),
        })
    }

    fn closed(chat_id: Option<&str>) -> TransportEvent {
        TransportEvent::Server(ServerMessage::ChatClosed(chat_id.map(str::to_string)))
    }

    fn transport_failure() -> TransportEvent {
        TransportEvent::Disconnect(DisconnectReason::TransportClose)
    }

    fn count(effects: &[Effect], pred: impl Fn(&Effect) -> bool) -> usize {
        effects.iter().filter(|e| pred(e)).count()
    }

    fn joins(effects: &[Effect]) -> usize {
        count(effects, |e| matches!(e, Effect::Emit(ClientMessage::Join { .. })))
    }

    fn disconnects(effects: &[Effect]) -> usize {
        count(effects, |e| matches!(e, Effect::Disconnect))
    }

    /// A controller viewing chat `r1` after the rebind for it connected.
    fn in_chat() -> SessionController {
        let mut ctrl = connected();
        ctrl.handle(joined("r1", &["u1", "u2"]));
        ctrl.handle(TransportEvent::Connect);
        ctrl
    }

    #[test]
    fn activation_declares_search_before_connecting() {
        let mut ctrl = controller();
        let effects = ctrl.activate(ConnectionState::Disconnected);

        assert!(ctrl.session().is_searching());
        assert_eq!(effects[0], Effect::Connect { chat_id: None });
        assert_eq!(count(&effects, |e| matches!(e, Effect::Subscribe(_))), 8);
        assert_eq!(ctrl.view(), View::Searching);

        // Second activation is a no-op.
        assert!(ctrl.activate(ConnectionState::Connecting).is_empty());
    }

    #[test]
    fn activation_skips_connect_when_transport_is_live() {
        let mut ctrl = controller();
        let effects = ctrl.activate(ConnectionState::Connected);
        assert_eq!(count(&effects, |e| matches!(e, Effect::Connect { .. })), 0);

        let mut ctrl = controller();
        let effects = ctrl.activate(ConnectionState::Connecting);
        assert_eq!(count(&effects, |e| matches!(e, Effect::Connect { .. })), 0);
    }

    #[test]
    fn resumed_chat_connects_with_its_id_without_searching() {
        let mut ctrl = controller().with_session(SessionState::resuming("r5"));
        let effects = ctrl.activate(ConnectionState::Disconnected);
        assert!(!ctrl.session().is_searching());
        assert_eq!(
            effects[0],
            Effect::Connect {
                chat_id: Some("r5".to_string())
            }
        );
    }

    #[test]
    fn deactivation_unsubscribes_everything_then_disconnects() {
        let mut ctrl = connected();
        let effects = ctrl.deactivate();
        assert_eq!(count(&effects, |e| matches!(e, Effect::Unsubscribe(_))), 8);
        assert_eq!(effects.last(), Some(&Effect::Disconnect));
        assert!(!ctrl.is_active());
        assert!(ctrl.deactivate().is_empty());
        assert!(ctrl.handle(TransportEvent::Connect).is_empty());
    }

    #[test]
    fn connect_sends_join_with_identity() {
        let mut ctrl = controller();
        ctrl.activate(ConnectionState::Disconnected);
        let effects = ctrl.handle(TransportEvent::Connect);
        assert!(effects.contains(&Effect::Emit(ClientMessage::Join {
            login_id: "login-1".to_string(),
            email: "me@example.com".to_string(),
        })));
        assert!(ctrl.is_join_outstanding());
    }

    #[test]
    fn match_creates_chat_and_rebinds_for_it() {
        let mut ctrl = connected();
        let effects = ctrl.handle(joined("r1", &["u1", "u2"]));

        let chat = ctrl.session().chat("r1").expect("chat r1");
        assert_eq!(chat.user_ids, users(&["u1", "u2"]));
        assert!(chat.messages.is_empty());
        assert_eq!(ctrl.session().current_chat_id().map(String::as_str), Some("r1"));
        assert!(!ctrl.session().is_searching());
        assert_eq!(
            count(&effects, |e| *e == Effect::PlayNotification(NotificationKind::BuddyPaired)),
            1
        );
        assert!(effects.contains(&Effect::browser_notification(
            MATCH_NOTIFICATION_TITLE,
            MATCH_NOTIFICATION_BODY
        )));

        // Teardown then rebuild against the new chat.
        assert_eq!(disconnects(&effects), 1);
        assert!(effects.contains(&Effect::Connect {
            chat_id: Some("r1".to_string())
        }));
        assert_eq!(ctrl.view(), View::Chat { chat_id: "r1".to_string() });
    }

    #[test]
    fn restore_rehydrates_chats_in_order() {
        let mut ctrl = connected();
        let mut chats = IndexMap::new();
        for id in ["r1", "r2"] {
            chats.insert(id.to_string(), Chat::matched(id, users(&["u1", "u2"])));
        }
        ctrl.handle(TransportEvent::Server(ServerMessage::ChatRestore {
            chats,
            current_chat_id: Some("r2".to_string()),
        }));

        let order: Vec<&str> = ctrl
            .session()
            .active_chats()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(order, vec!["r1", "r2"]);
        assert_eq!(ctrl.session().current_chat_id().map(String::as_str), Some("r2"));
        assert!(!ctrl.session().is_searching());
    }

    #[test]
    fn restore_without_current_chat_keeps_searching() {
        let mut ctrl = connected();
        let mut chats = IndexMap::new();
        chats.insert("old".to_string(), Chat::matched("old", users(&["u1"])));
        let effects = ctrl.handle(TransportEvent::Server(ServerMessage::ChatRestore {
            chats,
            current_chat_id: None,
        }));
        assert!(ctrl.session().is_searching());
        assert_eq!(ctrl.session().active_chats().len(), 1);
        assert_eq!(disconnects(&effects), 0);
    }

    #[test]
    fn closed_chat_prompts_then_decline_navigates_home() {
        let mut ctrl = in_chat();
        let effects = ctrl.handle(closed(Some("r1")));

        assert!(ctrl.session().chat("r1").is_none());
        assert!(!ctrl.session().is_searching());
        assert!(effects.contains(&Effect::PlayNotification(NotificationKind::ChatClosed)));
        assert!(effects.contains(&Effect::PromptSearchAgain {
            chat_id: Some("r1".to_string())
        }));
        // Rebinding waits for the answer.
        assert_eq!(disconnects(&effects), 0);
        assert_eq!(
            ctrl.view(),
            View::Deciding {
                chat_id: Some("r1".to_string())
            }
        );

        let effects = ctrl.resolve_search_again(false);
        assert_eq!(effects[0], Effect::Navigate(Route::Home));
        assert_eq!(joins(&effects), 0);
        assert_eq!(count(&effects, |e| matches!(e, Effect::Connect { .. })), 0);
        assert!(!ctrl.is_active());

        // Late events after leaving do nothing.
        assert!(ctrl.handle(TransportEvent::Connect).is_empty());
    }

    #[test]
    fn closed_chat_accept_restarts_search_on_fresh_connection() {
        let mut ctrl = in_chat();
        ctrl.handle(closed(None));

        let effects = ctrl.resolve_search_again(true);
        assert!(effects.contains(&Effect::browser_notification(
            CLOSED_NOTIFICATION_TITLE,
            CLOSED_NOTIFICATION_BODY
        )));
        assert!(effects.contains(&Effect::Connect { chat_id: None }));
        assert!(ctrl.session().is_searching());
        assert_eq!(ctrl.view(), View::Searching);

        let effects = ctrl.handle(TransportEvent::Connect);
        assert_eq!(joins(&effects), 1);

        // No decision pending any more.
        assert!(ctrl.resolve_search_again(true).is_empty());
    }

    #[test]
    fn background_chat_close_does_not_prompt() {
        let mut ctrl = in_chat();
        ctrl.handle(TransportEvent::Server(ServerMessage::ChatRestore {
            chats: IndexMap::from([(
                "r0".to_string(),
                Chat::matched("r0", users(&["u9"])),
            )]),
            current_chat_id: Some("r1".to_string()),
        }));

        let effects = ctrl.handle(closed(Some("r0")));
        assert!(ctrl.session().chat("r0").is_none());
        assert_eq!(ctrl.view(), View::Chat { chat_id: "r1".to_string() });
        assert_eq!(
            count(&effects, |e| matches!(e, Effect::PromptSearchAgain { .. })),
            0
        );
    }

    #[test]
    fn close_of_stale_chat_while_searching_keeps_searching() {
        let mut ctrl = connected();
        ctrl.handle(TransportEvent::Server(ServerMessage::ChatRestore {
            chats: IndexMap::from([("old".to_string(), Chat::matched("old", users(&["u9"])))]),
            current_chat_id: None,
        }));
        assert!(ctrl.session().is_searching());

        let effects = ctrl.handle(closed(Some("old")));
        assert_eq!(effects, vec![Effect::Render]);
        assert!(ctrl.session().chat("old").is_none());
        assert!(ctrl.session().is_searching());
        assert!(!ctrl.is_awaiting_decision());
        assert_eq!(ctrl.view(), View::Searching);
    }

    #[test]
    fn inactive_closes_every_chat() {
        let mut ctrl = in_chat();
        ctrl.handle(TransportEvent::Server(ServerMessage::Inactive));
        assert!(ctrl.session().active_chats().is_empty());
    }

    #[test]
    fn transport_loss_during_chat_is_silent() {
        let mut ctrl = in_chat();
        let effects = ctrl.handle(transport_failure());
        assert_eq!(disconnects(&effects), 0);
        assert!(!ctrl.is_disconnected());
        assert_eq!(ctrl.view(), View::Chat { chat_id: "r1".to_string() });
    }

    #[test]
    fn transport_loss_while_searching_shows_reconnect() {
        let mut ctrl = connected();
        let effects = ctrl.handle(transport_failure());
        assert_eq!(disconnects(&effects), 1);
        assert!(ctrl.is_disconnected());
        assert!(!ctrl.session().is_searching());
        assert_eq!(ctrl.view(), View::AwaitingReconnect);
    }

    #[test]
    fn explicit_disconnect_is_ignored() {
        let mut ctrl = connected();
        let effects = ctrl.handle(TransportEvent::Disconnect(DisconnectReason::ServerDisconnect));
        assert_eq!(disconnects(&effects), 0);
        assert!(!ctrl.is_disconnected());
        assert!(ctrl.session().is_searching());
    }

    #[test]
    fn three_failed_attempts_force_disconnect_once() {
        let mut ctrl = connected();
        for attempt in 1..=3 {
            ctrl.handle(TransportEvent::ReconnectAttempt(attempt));
        }
        let effects = ctrl.handle(TransportEvent::ReconnectError);
        assert_eq!(disconnects(&effects), 1);
        assert!(ctrl.is_disconnected());
        assert!(!ctrl.session().is_searching());
        assert_eq!(ctrl.policy().attempt_count(), 0);

        // Late errors, even with higher counts, change nothing further.
        for attempt in 4..=6 {
            ctrl.handle(TransportEvent::ReconnectAttempt(attempt));
            let effects = ctrl.handle(TransportEvent::ReconnectError);
            assert_eq!(disconnects(&effects), 0);
        }
        assert!(ctrl.is_disconnected());
    }

    #[test]
    fn errors_below_threshold_are_tolerated() {
        let mut ctrl = connected();
        ctrl.handle(TransportEvent::ReconnectAttempt(1));
        ctrl.handle(TransportEvent::ReconnectAttempt(2));
        let effects = ctrl.handle(TransportEvent::ReconnectError);
        assert_eq!(disconnects(&effects), 0);
        assert_eq!(ctrl.policy().attempt_count(), 2);

        ctrl.handle(TransportEvent::Connect);
        assert_eq!(ctrl.policy().attempt_count(), 0);
    }

    #[test]
    fn manual_reconnect_resets_and_searches() {
        let mut ctrl = connected();
        ctrl.handle(transport_failure());
        assert!(ctrl.manual_reconnect(ConnectionState::Connecting).is_empty());

        let effects = ctrl.manual_reconnect(ConnectionState::Disconnected);
        assert_eq!(effects[0], Effect::Connect { chat_id: None });
        assert!(ctrl.session().is_searching());
        assert_eq!(ctrl.policy().attempt_count(), 0);
        // Banner stays until the transport is actually back.
        assert_eq!(ctrl.view(), View::AwaitingReconnect);

        ctrl.handle(TransportEvent::Connect);
        assert!(!ctrl.is_disconnected());
        assert_eq!(ctrl.view(), View::Searching);
    }

    #[test]
    fn failed_manual_reconnect_gives_up_again() {
        let mut ctrl = connected();
        let effects = ctrl.handle(transport_failure());
        assert_eq!(disconnects(&effects), 1);

        for _ in 0..3 {
            let effects = ctrl.manual_reconnect(ConnectionState::Disconnected);
            assert_eq!(effects[0], Effect::Connect { chat_id: None });

            let mut forced = 0;
            for attempt in 1..=3 {
                ctrl.handle(TransportEvent::ReconnectAttempt(attempt));
                forced += disconnects(&ctrl.handle(TransportEvent::ReconnectError));
            }
            // Forced down again, so the reconnect affordance stays usable.
            assert_eq!(forced, 1);
            assert_eq!(ctrl.view(), View::AwaitingReconnect);
            assert!(!ctrl.session().is_searching());

            // Further errors in the same outage stay quiet.
            ctrl.handle(TransportEvent::ReconnectAttempt(4));
            assert_eq!(disconnects(&ctrl.handle(TransportEvent::ReconnectError)), 0);
        }
    }

    #[test]
    fn manual_reconnect_is_noop_when_connected() {
        let mut ctrl = connected();
        assert!(ctrl.manual_reconnect(ConnectionState::Connected).is_empty());
    }
}
