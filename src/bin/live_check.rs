//! Binary to connect to the live WebSocket API, subscribe to a few quote
//! symbols, and print everything that arrives for inspecting live data.
//!
//! # Usage
//!
//! ```sh
//! export LIVE_WS_TOKEN="your-access-token"
//! export LIVE_WS_URL="wss://api.example.com/api/v1"   # optional
//! export LIVE_WS_SECONDS=30                           # optional
//! cargo run --bin live_check --features cli -- AAPL MSFT
//! ```

use std::env;
use std::time::Duration;

use chrono::Utc;
use futures_util::StreamExt;
use live_ws::LiveClient;
use live_ws::auth::{Credential, StaticCredentialProvider};
use live_ws::constants::WS_BASE_URL;
use live_ws::types::{Channel, DomainEvent};
use tokio::time;

#[tokio::main]
async fn main() -> live_ws::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let token = env::var("LIVE_WS_TOKEN").expect("set LIVE_WS_TOKEN env var before running");
    let base_url = env::var("LIVE_WS_URL").unwrap_or_else(|_| WS_BASE_URL.to_owned());
    let seconds: u64 = env::var("LIVE_WS_SECONDS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);

    let mut symbols: Vec<String> = env::args().skip(1).collect();
    if symbols.is_empty() {
        symbols.push("AAPL".to_owned());
    }
    let symbols: Vec<&str> = symbols.iter().map(String::as_str).collect();

    // The CLI has no way to mint tokens, so the same one is handed back on refresh.
    let credential = Credential::new(token, Utc::now() + chrono::Duration::hours(12));
    let client = LiveClient::builder(StaticCredentialProvider::new(credential.clone()))
        .base_url(base_url)
        .credential(credential)
        .build();

    let mut events = client.event_updates();
    let mut acks = client.ack_updates();
    let mut alerts = client.alerts();
    let mut state = client.connection_state();

    println!("Connecting…");
    client.connect().await?;

    // Queued in the desired set; replayed as soon as the socket is up.
    let _ = client.subscribe(&[Channel::Quotes, Channel::Fx], &symbols).await;
    println!("Subscribed to quotes for {symbols:?} and FX rates");

    println!("Listening for {seconds} seconds…\n");
    let deadline = time::sleep(Duration::from_secs(seconds));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => {
                println!("\n{seconds} seconds elapsed, disconnecting…");
                break;
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("state: {}", *state.borrow_and_update());
            }
            Some(envelope) = events.next() => match DomainEvent::from_envelope(&envelope) {
                Some(Ok(event)) => println!("{event:#?}"),
                Some(Err(e)) => eprintln!("Error: {e}"),
                None => println!("{envelope:#?}"),
            },
            Some(ack) = acks.next() => println!("ack: {}", ack.data),
            Some(alert) = alerts.next() => eprintln!("alert: {alert:?}"),
        }
    }

    client.stop().await?;
    println!("Done.");

    Ok(())
}
