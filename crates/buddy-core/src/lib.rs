pub mod chat;
pub mod protocol;
pub mod transport;

#[cfg(feature = "native")]
pub mod ws_transport;
