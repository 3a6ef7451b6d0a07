//! Session controller for random buddy matchmaking chat.
//!
//! [`controller::SessionController`] is a pure state machine: transport
//! events and user intents go in, [`effect::Effect`]s come out. The
//! [`runtime::Runtime`] executes those effects against a
//! [`connection::Connection`] and a [`shell::Shell`].

pub mod config;
pub mod connection;
pub mod controller;
pub mod effect;
pub mod error;
pub mod reconnect;
pub mod runtime;
pub mod session;
pub mod shell;

pub use config::ClientConfig;
pub use controller::SessionController;
pub use error::ClientError;
pub use runtime::{RunExit, Runtime};
