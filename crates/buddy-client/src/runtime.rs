//! Event loop binding a [`Connection`] and a [`Shell`] to the
//! [`SessionController`].
//!
//! The runtime is the only place effects are executed. Each transport event
//! or user intent is handled to completion, effects included, before the
//! next one is taken, which gives the controller its single-threaded
//! ordering guarantee.

use tokio::sync::mpsc;

use crate::connection::Connection;
use crate::controller::SessionController;
use crate::effect::Effect;
use crate::shell::{Shell, UserIntent};

/// Why [`Runtime::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The user quit (or the intent channel closed).
    UserExit,
    /// The user declined to search again and left the matcher.
    NavigatedAway,
}

/// Owns the connection, the shell and the controller for one session.
pub struct Runtime<C: Connection, S: Shell> {
    connection: C,
    shell: S,
    controller: SessionController,
}

impl<C: Connection, S: Shell> Runtime<C, S> {
    pub fn new(connection: C, shell: S, controller: SessionController) -> Self {
        Self {
            connection,
            shell,
            controller,
        }
    }

    pub fn controller(&self) -> &SessionController {
        &self.controller
    }

    pub fn connection(&self) -> &C {
        &self.connection
    }

    pub fn shell(&self) -> &S {
        &self.shell
    }

    pub fn into_parts(self) -> (C, S, SessionController) {
        (self.connection, self.shell, self.controller)
    }

    /// Activate, then process events and intents until the user leaves.
    ///
    /// The binding is always released before this returns.
    pub async fn run(&mut self, intents: &mut mpsc::UnboundedReceiver<UserIntent>) -> RunExit {
        let effects = self.controller.activate(self.connection.state());
        if let Some(exit) = self.apply(effects).await {
            return exit;
        }

        loop {
            let effects = tokio::select! {
                biased;

                event = self.connection.next_event() => {
                    tracing::trace!(event = event.name().as_str(), "Transport event");
                    self.controller.handle(event)
                }

                intent = intents.recv() => match intent {
                    Some(UserIntent::Reconnect) => {
                        self.controller.manual_reconnect(self.connection.state())
                    }
                    Some(UserIntent::SearchAgain(answer)) => {
                        self.controller.resolve_search_again(answer)
                    }
                    Some(UserIntent::Quit) | None => {
                        let effects = self.controller.deactivate();
                        self.apply(effects).await;
                        return RunExit::UserExit;
                    }
                },
            };

            if let Some(exit) = self.apply(effects).await {
                return exit;
            }
        }
    }

    /// Execute effects in order. Returns an exit when one of them navigated
    /// away from the matcher.
    async fn apply(&mut self, effects: Vec<Effect>) -> Option<RunExit> {
        let mut exit = None;
        for effect in effects {
            match effect {
                Effect::Subscribe(name) => self.connection.subscribe(name),
                Effect::Unsubscribe(name) => self.connection.unsubscribe(name),
                Effect::Connect { chat_id } => {
                    if let Err(e) = self.connection.connect(chat_id.as_deref()).await {
                        self.controller.connect_failed(&e);
                    }
                }
                Effect::Disconnect => self.connection.disconnect(),
                Effect::Emit(msg) => {
                    if let Err(e) = self.connection.emit(&msg) {
                        tracing::warn!(error = %e, event = msg.event_name(), "Failed to emit");
                    }
                }
                Effect::PlayNotification(kind) => self.shell.play_notification(kind),
                Effect::BrowserNotification { title, body } => {
                    self.shell.create_browser_notification(&title, &body);
                }
                Effect::PromptSearchAgain { chat_id } => {
                    self.shell.prompt_search_again(chat_id.as_deref());
                }
                Effect::Navigate(route) => {
                    self.shell.navigate(route);
                    exit = Some(RunExit::NavigatedAway);
                }
                Effect::Render => {
                    let view = self.controller.view();
                    self.shell.render(&view, self.controller.session());
                }
            }
        }
        exit
    }
}
