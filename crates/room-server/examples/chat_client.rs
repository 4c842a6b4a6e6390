//! Line-based terminal client for a room.
//!
//! ```text
//! cargo run -p room-server --example chat_client -- ws://127.0.0.1:8080 r1 interviewer
//! ```
//!
//! Each input line is `to: content` (`to` is `interviewer`, `polee` or
//! `ai`) or just `content` to broadcast.

use std::env;

use anyhow::{bail, Context, Result};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

fn frame_for(line: &str) -> Value {
    match line.split_once(':') {
        Some((to, content)) if matches!(to.trim(), "interviewer" | "polee" | "ai") => {
            json!({"content": content.trim(), "to": to.trim()})
        }
        _ => json!({"content": line}),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let [base, room, role] = args.as_slice() else {
        bail!("usage: chat_client <ws-base-url> <room> <role>");
    };

    let url = format!("{base}/ws?room={room}&role={role}");
    println!("Connecting to {url}...");
    let (ws, _) = connect_async(&url).await.context("connect failed")?;
    println!("Connected. Type 'quit' to leave.\n");

    let (mut write, mut read) = ws.split();

    let reader = tokio::spawn(async move {
        while let Some(msg) = read.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<Value>(text.as_str()) {
                    Ok(v) => println!("[{}] {}", v["from"].as_str().unwrap_or("?"), v["content"]),
                    Err(_) => println!("<< {}", text.as_str()),
                },
                Ok(Message::Close(frame)) => {
                    println!("Server closed the connection: {frame:?}");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    println!("Read error: {e}");
                    break;
                }
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.eq_ignore_ascii_case("quit") || trimmed.eq_ignore_ascii_case("exit") {
            break;
        }
        write
            .send(Message::Text(frame_for(trimmed).to_string().into()))
            .await
            .context("send failed")?;
    }

    let _ = write.send(Message::Close(None)).await;
    reader.abort();
    println!("Exiting client.");
    Ok(())
}
