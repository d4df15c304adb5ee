use agentdesk_realtime::domain::{ActivityFeed, TicketBoard};
use agentdesk_realtime::{ApiClient, AppConfig, SessionStore, UserProfile};

/// Follows a company's activity feed and ticket board until Ctrl-C
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agentdesk_realtime=debug".into()),
        )
        .init();

    let config = AppConfig::from_env()?;
    let token = std::env::var("AGENTDESK_TOKEN").expect("AGENTDESK_TOKEN must be set in .env");
    let company_id =
        std::env::var("AGENTDESK_COMPANY_ID").expect("AGENTDESK_COMPANY_ID must be set in .env");

    println!("📡 API: {}", config.api_base_url);
    println!("📡 WS:  {}\n", config.ws_base_url);

    let session = SessionStore::new();
    let api = ApiClient::from_config(&config, session.clone())?;

    let feed = ActivityFeed::from_config(api.clone(), &config);
    feed.bind_identity(session.company_id_watch()).await;

    let tickets = TicketBoard::new(api, config.ws_base_url.clone());
    tickets.bind_identity(session.company_id_watch()).await;

    // Nothing is fetched until the session names a company
    session.login(
        token,
        UserProfile {
            id: "demo".to_string(),
            email: "demo@example.com".to_string(),
            company_id: Some(company_id),
            ..Default::default()
        },
    );

    let mut updates = feed.watch();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let snapshot = updates.borrow_and_update().clone();
            println!(
                "[{}] {} activities{}",
                snapshot.status,
                snapshot.items.len(),
                snapshot
                    .error
                    .map(|e| format!(" ({})", e))
                    .unwrap_or_default()
            );
            if let Some(latest) = snapshot.items.first() {
                println!(
                    "   latest: {} {}",
                    latest.kind.as_deref().unwrap_or("activity"),
                    latest.description.as_deref().unwrap_or("")
                );
            }
        }
    });

    tokio::signal::ctrl_c().await?;

    println!("\n🎫 {} tickets, stats: {:?}", tickets.snapshot().items.len(), tickets.stats());

    printer.abort();
    feed.shutdown().await;
    tickets.shutdown().await;
    println!("Disconnected!");

    Ok(())
}
