use realtime_channels::{RealtimeClient, RealtimeClientOptions};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt::init();
    dotenvy::dotenv().ok();

    let url = std::env::var("REALTIME_URL")
        .unwrap_or_else(|_| "ws://localhost:4000/socket".to_string());
    let api_key = std::env::var("REALTIME_API_KEY").unwrap_or_else(|_| "your-anon-key".to_string());

    // Create client
    let client = RealtimeClient::new(
        &url,
        RealtimeClientOptions {
            api_key,
            ..Default::default()
        },
    )?;

    // Connect
    println!("Connecting to {}...", url);
    client.connect().await?;
    println!("Connected!");

    let channel = client.channel("room:lobby", Default::default());
    channel.on_broadcast("message", |payload| {
        println!("Broadcast received: {}", payload["payload"]);
    });
    channel.subscribe()?.outcome().await.into_result()?;
    println!("Joined {}", channel.topic());

    let reply = channel
        .send(
            "broadcast",
            json!({ "type": "broadcast", "event": "message", "payload": { "body": "hello" } }),
            None,
        )
        .await?;
    println!("Broadcast acknowledged with status {}", reply.status);

    // Keep connection alive
    tokio::signal::ctrl_c().await?;

    // Disconnect
    println!("Disconnecting...");
    client.remove_channel(&channel).await;
    client.disconnect().await?;
    println!("Disconnected!");

    Ok(())
}
