use agentdesk_realtime::{AgentChat, AgentChatParams, AppConfig, ChatEvent};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Chats with one agent over the signaling channel. Each stdin line is sent as a message.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let config = AppConfig::from_env()?;
    let params = AgentChatParams {
        client_id: std::env::var("AGENTDESK_CLIENT_ID").expect("AGENTDESK_CLIENT_ID must be set"),
        api_key: std::env::var("AGENTDESK_API_KEY").expect("AGENTDESK_API_KEY must be set"),
        agent_id: std::env::var("AGENTDESK_AGENT_ID").expect("AGENTDESK_AGENT_ID must be set"),
    };

    let chat = AgentChat::new(config.ws_base_url.clone(), params)?;
    let mut events = chat.events().await;
    chat.connect().await;

    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                ChatEvent::Message { content, sender, .. } => {
                    println!("{}: {}", sender.as_deref().unwrap_or("agent"), content)
                }
                ChatEvent::Typing { is_typing: true } => println!("... typing"),
                ChatEvent::Connection(status) => println!("🔌 {}", status),
                ChatEvent::Error { message } => eprintln!("❌ {}", message),
                _ => {}
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !chat.send_message(&line).await {
                    eprintln!("⚠️  Not connected ({})", chat.status().await);
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    chat.close().await;
    println!("Disconnected!");
    Ok(())
}
