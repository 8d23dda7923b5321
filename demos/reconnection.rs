use realtime_channels::{
    Backoff, ConnectionState, HeartbeatStatus, RealtimeClient, RealtimeClientOptions,
};
use std::time::Duration;

/// Watches reconnection and rejoin against a live server.
///
/// Interrupt the network while this runs to see the client reconnect with
/// backoff and the channel rejoin.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let url = std::env::var("REALTIME_URL")?;
    let api_key = std::env::var("REALTIME_API_KEY")?;

    let client = RealtimeClient::new(
        &url,
        RealtimeClientOptions {
            api_key,
            heartbeat_interval: Some(5_000),
            reconnect_after: Some(Backoff::exponential(
                Duration::from_millis(500),
                Duration::from_secs(10),
            )),
            ..Default::default()
        },
    )?;

    client.on_heartbeat(|status| {
        if status == HeartbeatStatus::Timeout {
            println!("Heartbeat timed out");
        }
    });
    let mut states = client.state_changes();
    tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = *states.borrow_and_update();
            println!("Connection state: {:?}", state);
        }
    });

    client.connect().await?;
    let channel = client.channel("room:reconnect", Default::default());
    channel.on_state_change(|status| println!("Channel status: {}", status));
    channel.subscribe()?;

    // Manual disconnect must not reconnect
    tokio::time::sleep(Duration::from_secs(2)).await;
    client.disconnect().await?;
    tokio::time::sleep(Duration::from_secs(5)).await;
    if client.connection_state() != ConnectionState::Closed {
        return Err("client reconnected after a manual disconnect".into());
    }
    println!("Stayed disconnected after manual disconnect");

    client.connect().await?;
    println!("Reconnected; interrupt the network to watch automatic recovery");

    for second in 1..=30 {
        tokio::time::sleep(Duration::from_secs(1)).await;
        println!(
            "{:>2}s connected={} channel={} reconnect_attempts={}",
            second,
            client.is_connected(),
            channel.status(),
            client.reconnect_attempts()
        );
    }

    client.disconnect().await?;
    Ok(())
}
