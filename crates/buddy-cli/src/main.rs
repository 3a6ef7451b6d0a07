use clap::Parser;
use tracing_subscriber::EnvFilter;

mod client;
mod shell;

#[derive(Parser)]
#[command(name = "buddy")]
#[command(about = "Find a random chat buddy", long_about = None)]
struct Cli {
    /// WebSocket server URL
    #[arg(short, long, env = "BUDDY_SERVER", default_value = "ws://127.0.0.1:8080")]
    server: String,

    /// Login identifier sent with every join
    #[arg(short, long, env = "BUDDY_LOGIN_ID")]
    login_id: String,

    /// Email sent with every join
    #[arg(short, long, env = "BUDDY_EMAIL", default_value = "")]
    email: String,

    /// Resume an existing chat instead of searching
    #[arg(short, long, env = "BUDDY_CHAT_ID")]
    chat_id: Option<String>,

    /// Failed reconnection attempts before offering a manual reconnect
    #[arg(long, env = "BUDDY_RECONNECT_THRESHOLD", default_value_t = 3)]
    reconnect_threshold: u32,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let options = client::ClientOptions {
        server_url: cli.server,
        login_id: cli.login_id,
        email: cli.email,
        chat_id: cli.chat_id,
        reconnect_threshold: cli.reconnect_threshold,
    };

    if let Err(e) = client::start_client(options).await {
        eprintln!("Error: {}", e);
    }
}
