//! Client orchestrator: wires the socket connection, the session controller
//! and the terminal shell together, and feeds stdin commands to the runtime.

use buddy_client::connection::SocketConnection;
use buddy_client::session::SessionState;
use buddy_client::shell::UserIntent;
use buddy_client::{ClientConfig, RunExit, Runtime, SessionController};
use buddy_core::chat::UserIdentity;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::shell::TerminalShell;

pub struct ClientOptions {
    pub server_url: String,
    pub login_id: String,
    pub email: String,
    pub chat_id: Option<String>,
    pub reconnect_threshold: u32,
}

/// Run one matchmaking session until the user quits or declines to search
/// again.
pub async fn start_client(options: ClientOptions) -> Result<(), Box<dyn std::error::Error>> {
    // Build the WS URL (append /ws if the user didn't already).
    let ws_url = if options.server_url.ends_with("/ws") {
        options.server_url
    } else {
        format!("{}/ws", options.server_url.trim_end_matches('/'))
    };

    let mut config = ClientConfig::new(ws_url, UserIdentity::new(options.login_id, options.email));
    config.reconnect_threshold = options.reconnect_threshold;
    config.validate()?;

    let session = match options.chat_id.filter(|id| !id.is_empty()) {
        Some(chat_id) => SessionState::resuming(chat_id),
        None => SessionState::new(),
    };
    let controller = SessionController::from_config(&config).with_session(session);
    let connection = SocketConnection::websocket(&config);

    println!("Connecting to {} as '{}'...", config.server_url, config.identity.login_id);
    println!("Commands: y/n answer the search prompt, r reconnects, q quits.");

    let (intent_tx, mut intent_rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let intent = match line.trim() {
                "y" | "yes" => UserIntent::SearchAgain(true),
                "n" | "no" => UserIntent::SearchAgain(false),
                "r" | "reconnect" => UserIntent::Reconnect,
                "q" | "quit" => UserIntent::Quit,
                "" => continue,
                other => {
                    println!("Unknown command '{}'", other);
                    continue;
                }
            };
            if intent_tx.send(intent).is_err() {
                break;
            }
        }
    });

    let mut runtime = Runtime::new(connection, TerminalShell::stdout(), controller);
    match runtime.run(&mut intent_rx).await {
        RunExit::UserExit => println!("Bye."),
        RunExit::NavigatedAway => println!("Left the matcher."),
    }
    Ok(())
}
