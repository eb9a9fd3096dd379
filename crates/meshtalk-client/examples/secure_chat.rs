// Two-party encrypted chat demo against a running directory + relay.
// Run with: cargo run -p meshtalk-client --example secure_chat -- <username> <peer-id>
//
// Set MESHTALK_DIRECTORY_URL / MESHTALK_TRANSPORT_URL to point at your
// server (defaults target localhost:8080). Lines typed on stdin are
// encrypted and sent to the peer; incoming messages print as they decrypt.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use meshtalk_client::{
    register_identity, ClientConfig, ClientError, Directory, HttpDirectory, MessageSink,
    SessionManager,
};
use meshtalk_crypto::{KeyringVault, SecretVault};

/// Prints incoming messages to stdout as they arrive.
struct PrintSink;

impl MessageSink for PrintSink {
    fn insert(&self, text: &str, outgoing: bool, _timestamp: i64) {
        if !outgoing {
            println!("<< {text}");
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meshtalk_client=info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let username = args.next().unwrap_or_else(|| "demo".into());
    let peer_id = args.next();

    let mut config = ClientConfig::default();
    if let Ok(url) = std::env::var("MESHTALK_DIRECTORY_URL") {
        config.directory_url = url;
    }
    if let Ok(url) = std::env::var("MESHTALK_TRANSPORT_URL") {
        config.transport_url = url;
    }

    let vault: Arc<dyn SecretVault> = Arc::new(KeyringVault::new("meshtalk"));
    let directory: Arc<dyn Directory> = Arc::new(HttpDirectory::new(&config.directory_url)?);

    let ack = register_identity(vault.clone(), directory.as_ref(), &config, &username).await?;
    println!("[OK] Registered as '{username}' — id {}", ack.user_id);

    let handle = SessionManager::spawn(config, vault, directory, Arc::new(PrintSink));
    handle.connect().await?;
    println!("[OK] Transport connected");

    if let Some(peer) = peer_id {
        handle.set_peer(&peer).await?;
        println!("[OK] Session ready with {peer} — type away");
    } else {
        println!("No peer id given — listening only");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.is_empty() {
            continue;
        }
        match handle.send(line).await {
            Ok(()) => {}
            Err(ClientError::SessionNotReady) => {
                println!("(session not ready yet — message dropped, try again)");
            }
            Err(e) => {
                eprintln!("send failed: {e}");
                break;
            }
        }
    }

    handle.disconnect().await?;
    Ok(())
}
