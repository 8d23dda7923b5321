//! Presence Example
//!
//! Tracks this client on a channel and prints the presence replica as joins
//! and leaves arrive.
//!
//! Set `REALTIME_URL` and `REALTIME_API_KEY` in the environment or a `.env` file.

use realtime_channels::{RealtimeChannel, RealtimeChannelOptions, RealtimeClient, RealtimeClientOptions};
use std::sync::Arc;
use std::time::Duration;

fn display_presence_list(channel: &Arc<RealtimeChannel>) {
    let presence = channel.presence_list();
    println!("   Users present: {} entries", presence.len());
    for (key, metas) in &presence {
        println!("   - {}: {:?}", key, metas);
    }
    println!();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let url = std::env::var("REALTIME_URL")?;
    let api_key = std::env::var("REALTIME_API_KEY")?;

    let client = RealtimeClient::new(
        &url,
        RealtimeClientOptions {
            api_key,
            ..Default::default()
        },
    )?;
    client.connect().await?;
    println!("Connected to {}\n", url);

    let channel = client.channel(
        "room:presence-lobby",
        RealtimeChannelOptions {
            presence_key: Some("user_id".to_string()),
            ..Default::default()
        },
    );

    // Register before subscribing so the initial state is not missed
    channel.on_presence("join", |payload| {
        println!("[join] {} {}", payload["key"], payload["newPresences"]);
    });
    channel.on_presence("leave", |payload| {
        println!("[leave] {} {}", payload["key"], payload["leftPresences"]);
    });
    let mut syncs = channel.listen("presence");
    tokio::spawn(async move {
        while let Some(payload) = syncs.recv().await {
            if payload["event"] == "sync" {
                println!("[sync]");
            }
        }
    });

    channel.subscribe()?.outcome().await.into_result()?;
    println!("Subscribed to {}\n", channel.topic());

    channel
        .track(serde_json::json!({ "user": "Ludo", "status": "online" }))?
        .outcome()
        .await
        .into_result()?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    display_presence_list(&channel);

    // Tracking again replaces the metadata of this connection
    channel
        .track(serde_json::json!({ "user": "Ludo", "status": "away" }))?
        .outcome()
        .await
        .into_result()?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    display_presence_list(&channel);

    channel.untrack()?.outcome().await.into_result()?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    display_presence_list(&channel);

    client.remove_all_channels().await;
    client.disconnect().await?;
    Ok(())
}
