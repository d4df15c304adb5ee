//! Integration tests for REST + realtime collections, using wiremock for the API and a
//! local WebSocket server for the channels.

mod common;

use agentdesk_realtime::domain::{
    ActivitySource, AgentSource, NewTicket, TicketBoard, TicketSource, TicketStats, TicketStatus,
};
use agentdesk_realtime::sync::NETWORK_ERROR_MESSAGE;
use agentdesk_realtime::{
    ApiClient, ConnectionStatus, RemoteCollection, Session, SessionStore, UserProfile,
};
use common::{Step, TestServer, eventually};
use serde_json::json;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::timeout;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn api(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), SessionStore::new()).unwrap()
}

async fn hits(server: &MockServer, request_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == request_path)
        .count()
}

fn activity(id: &str) -> serde_json::Value {
    json!({"id": id, "type": "call_completed", "created_at": "2024-05-01T10:00:00Z"})
}

// ============================================================================
// REST failure policy
// ============================================================================

#[tokio::test]
async fn tickets_not_found_is_empty_without_error() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .and(query_param("company_id", "co_1"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "No tickets"})))
        .expect(1)
        .mount(&mock_server)
        .await;
    let ws = TestServer::holding().await;

    let tickets = RemoteCollection::new(TicketSource::new(api(&mock_server)), ws.base_url());
    tickets.set_identity(Some("co_1".into())).await;

    let snapshot = tickets.snapshot();
    assert!(snapshot.items.is_empty());
    assert!(snapshot.error.is_none());
    assert!(!snapshot.loading);

    tickets.shutdown().await;
}

#[tokio::test]
async fn network_failure_keeps_last_known_data() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/activities/co_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "activities": [activity("a1"), activity("a2")]
        })))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/activities/co_1"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&mock_server)
        .await;

    let api = ApiClient::with_timeout(
        mock_server.uri(),
        SessionStore::new(),
        Duration::from_millis(200),
    )
    .unwrap();
    // REST only: no realtime server behind this base
    let feed = RemoteCollection::new(ActivitySource::new(api), "ws://127.0.0.1:9");

    feed.set_identity(Some("co_1".into())).await;
    assert_eq!(feed.items().len(), 2);

    feed.reload().await;
    let snapshot = feed.snapshot();
    assert_eq!(snapshot.items.len(), 2);
    assert_eq!(snapshot.error.as_deref(), Some(NETWORK_ERROR_MESSAGE));

    feed.shutdown().await;
}

#[tokio::test]
async fn server_error_clears_items_and_surfaces_message() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/campaigns"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "database down"})))
        .mount(&mock_server)
        .await;

    let campaigns = RemoteCollection::new(
        agentdesk_realtime::domain::CampaignSource::new(api(&mock_server)),
        "ws://127.0.0.1:9",
    );
    campaigns.set_identity(Some("co_1".into())).await;

    let snapshot = campaigns.snapshot();
    assert!(snapshot.items.is_empty());
    assert_eq!(snapshot.error.as_deref(), Some("API error (500): database down"));

    campaigns.shutdown().await;
}

// ============================================================================
// Identity binding
// ============================================================================

#[tokio::test]
async fn company_id_arrival_triggers_one_fetch_and_one_channel() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/activities/co_123"))
        .and(query_param("timeframe", "7d"))
        .and(header("authorization", "Bearer tok_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([activity("a1")])))
        .expect(1)
        .mount(&mock_server)
        .await;
    let ws = TestServer::holding().await;
    let ws = &ws;

    // Signed in, profile not loaded yet
    let session = SessionStore::with_session(Session {
        token: Some("tok_1".into()),
        user: None,
    });
    let api = ApiClient::new(mock_server.uri(), session.clone()).unwrap();
    let feed = RemoteCollection::new(ActivitySource::new(api), ws.base_url());
    feed.bind_identity(session.company_id_watch()).await;

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(hits(&mock_server, "/api/activities/co_123").await, 0);
    assert_eq!(ws.accepts(), 0);

    session.set_user(Some(UserProfile {
        id: "u1".into(),
        email: "sam@example.com".into(),
        company_id: Some("co_123".into()),
        ..Default::default()
    }));

    let mut snapshots = feed.watch();
    timeout(
        Duration::from_secs(2),
        snapshots.wait_for(|s| {
            s.identity.as_deref() == Some("co_123")
                && !s.loading
                && s.status == ConnectionStatus::Connected
        }),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(feed.items().len(), 1);
    assert_eq!(hits(&mock_server, "/api/activities/co_123").await, 1);
    assert_eq!(ws.accepts(), 1);
    assert_eq!(
        ws.paths.lock().await.as_slice(),
        ["/ws/activities/co_123?timeframe=7d"]
    );

    // Unrelated profile edits do not rebind
    session.set_user(Some(UserProfile {
        id: "u1".into(),
        email: "sam@example.com".into(),
        name: Some("Sam".into()),
        company_id: Some("co_123".into()),
        ..Default::default()
    }));
    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(ws.accepts(), 1);

    feed.shutdown().await;
}

#[tokio::test]
async fn identity_change_closes_previous_channel() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tickets": []})))
        .mount(&mock_server)
        .await;
    let ws = TestServer::holding().await;
    let ws = &ws;

    let tickets = RemoteCollection::new(TicketSource::new(api(&mock_server)), ws.base_url());
    tickets.set_identity(Some("co_1".into())).await;
    let mut snapshots = tickets.watch();
    timeout(
        Duration::from_secs(2),
        snapshots.wait_for(|s| s.status == ConnectionStatus::Connected),
    )
    .await
    .unwrap()
    .unwrap();
    assert_eq!(ws.accepts(), 1);

    tickets.set_identity(Some("co_2".into())).await;
    assert!(eventually(Duration::from_secs(2), move || async move { ws.accepts() == 2 }).await);
    assert!(
        eventually(Duration::from_secs(2), move || async move {
            ws.closes.lock().await.as_slice() == [Some(1000)]
        })
        .await
    );
    assert_eq!(
        ws.paths.lock().await.as_slice(),
        ["/ws/tickets/co_1", "/ws/tickets/co_2"]
    );

    tickets.shutdown().await;
}

// ============================================================================
// Realtime merge
// ============================================================================

#[tokio::test]
async fn realtime_initial_then_update_is_prepended() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/activities/co_1"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    let ws = TestServer::start(
        vec![vec![
            // Lets the REST fetch settle first
            Step::Sleep(Duration::from_millis(200)),
            Step::Send(
                json!({"type": "initial", "activities": [activity("a1"), activity("a2"), activity("a3")]})
                    .to_string(),
            ),
            Step::Send(json!({"type": "pong"}).to_string()),
            Step::Send(json!({"type": "unknown_shape", "count": 1}).to_string()),
            Step::Send(json!({"type": "update", "data": activity("a4")}).to_string()),
            Step::Hold,
        ]],
        None,
    )
    .await;

    let feed = RemoteCollection::new(ActivitySource::new(api(&mock_server)), ws.base_url());
    feed.set_identity(Some("co_1".into())).await;

    let mut snapshots = feed.watch();
    timeout(
        Duration::from_secs(2),
        snapshots.wait_for(|s| s.items.len() == 4),
    )
    .await
    .unwrap()
    .unwrap();

    let ids: Vec<String> = feed.items().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["a4", "a1", "a2", "a3"]);
    assert!(feed.snapshot().error.is_none());

    feed.shutdown().await;
}

#[tokio::test]
async fn refresh_reconnects_live_channel() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/campaigns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "Spring"}])))
        .mount(&mock_server)
        .await;
    let ws = TestServer::holding().await;
    let ws = &ws;

    let campaigns = RemoteCollection::new(
        agentdesk_realtime::domain::CampaignSource::new(api(&mock_server)),
        ws.base_url(),
    );
    campaigns.set_identity(Some("co_1".into())).await;
    let mut snapshots = campaigns.watch();
    timeout(
        Duration::from_secs(2),
        snapshots.wait_for(|s| s.status == ConnectionStatus::Connected),
    )
    .await
    .unwrap()
    .unwrap();

    campaigns.refresh().await;

    assert!(eventually(Duration::from_secs(2), move || async move { ws.accepts() == 2 }).await);
    assert_eq!(hits(&mock_server, "/api/campaigns").await, 1);

    campaigns.shutdown().await;
}

// ============================================================================
// Domain behavior
// ============================================================================

#[tokio::test]
async fn ticket_mutations_refetch_collection_and_stats() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "tickets": [{"id": "t1", "title": "Missed callback", "status": "open"}]
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/stats"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 1, "open": 1})))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/tickets/t1/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/tickets/t1/notes"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "ticket": {"id": "t2", "title": "Refund", "status": "open"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    let ws = TestServer::holding().await;

    let board = TicketBoard::new(api(&mock_server), ws.base_url());
    board.set_company(Some("co_1".into())).await;

    assert_eq!(board.snapshot().items.len(), 1);
    assert_eq!(
        board.stats(),
        Some(TicketStats {
            total: 1,
            open: 1,
            ..Default::default()
        })
    );
    assert_eq!(hits(&mock_server, "/api/tickets").await, 1);
    assert_eq!(hits(&mock_server, "/api/tickets/stats").await, 1);

    board.update_status("t1", TicketStatus::Resolved).await.unwrap();
    assert_eq!(hits(&mock_server, "/api/tickets").await, 2);
    assert_eq!(hits(&mock_server, "/api/tickets/stats").await, 2);

    board.add_note("t1", "Called back").await.unwrap();
    assert_eq!(hits(&mock_server, "/api/tickets/stats").await, 3);

    let created = board.create_ticket(&NewTicket::new("co_1", "Refund")).await.unwrap();
    assert_eq!(created.id, "t2");
    // POST /api/tickets plus the three list reloads
    assert_eq!(hits(&mock_server, "/api/tickets").await, 5);
    assert_eq!(hits(&mock_server, "/api/tickets/stats").await, 4);

    let requests = mock_server.received_requests().await.unwrap();
    let patch = requests
        .iter()
        .find(|r| r.method.as_str() == "PATCH")
        .unwrap();
    assert_eq!(
        serde_json::from_slice::<serde_json::Value>(&patch.body).unwrap(),
        json!({"status": "resolved"})
    );

    board.shutdown().await;
}

#[tokio::test]
async fn failed_mutation_does_not_touch_local_state() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "t1", "status": "open"}])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/stats"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/api/tickets/t1/status"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"error": "Not allowed"})))
        .mount(&mock_server)
        .await;
    let ws = TestServer::holding().await;

    let board = TicketBoard::new(api(&mock_server), ws.base_url());
    board.set_company(Some("co_1".into())).await;
    assert_eq!(board.stats(), Some(TicketStats::default()));

    let err = board
        .update_status("t1", TicketStatus::Closed)
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "API error (403): Not allowed");
    assert_eq!(board.with_status(TicketStatus::Open).len(), 1);
    assert_eq!(hits(&mock_server, "/api/tickets").await, 1);

    board.shutdown().await;
}

#[tokio::test]
async fn late_stats_for_previous_company_are_dropped() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tickets": []})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/stats"))
        .and(query_param("company_id", "co_a"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"total": 111, "open": 111}))
                .set_delay(Duration::from_millis(400)),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/stats"))
        .and(query_param("company_id", "co_b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 2, "open": 1})))
        .mount(&mock_server)
        .await;
    let ws = TestServer::holding().await;
    let mock = &mock_server;

    let board = TicketBoard::new(api(&mock_server), ws.base_url());
    let slow = {
        let board = board.clone();
        tokio::spawn(async move { board.set_company(Some("co_a".into())).await })
    };
    // co_a's stats request is in flight
    assert!(
        eventually(Duration::from_secs(2), move || async move {
            hits(mock, "/api/tickets/stats").await == 1
        })
        .await
    );

    board.set_company(Some("co_b".into())).await;
    let co_b = Some(TicketStats {
        total: 2,
        open: 1,
        ..Default::default()
    });
    assert_eq!(board.stats(), co_b);

    slow.await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(board.stats(), co_b);
    assert_eq!(*board.watch_stats().borrow(), co_b);
    assert_eq!(board.tickets().identity().await.as_deref(), Some("co_b"));

    board.shutdown().await;
}

#[tokio::test]
async fn ticket_board_follows_company_watch_and_clears_on_sign_out() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .and(query_param("company_id", "co_a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "t1"}])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tickets"))
        .and(query_param("company_id", "co_b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": "t2"}, {"id": "t3"}])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/stats"))
        .and(query_param("company_id", "co_a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 1})))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/tickets/stats"))
        .and(query_param("company_id", "co_b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"total": 2})))
        .mount(&mock_server)
        .await;
    let ws = TestServer::holding().await;
    let ws = &ws;

    let board = TicketBoard::new(api(&mock_server), ws.base_url());
    let board = &board;
    let (tx, rx) = watch::channel(Some("co_a".to_string()));
    board.bind_identity(rx).await;

    assert!(
        eventually(Duration::from_secs(2), move || async move {
            board.stats().map(|s| s.total) == Some(1)
                && board.snapshot().status == ConnectionStatus::Connected
        })
        .await
    );
    assert_eq!(board.snapshot().items.len(), 1);

    tx.send(Some("co_b".to_string())).unwrap();
    assert!(
        eventually(Duration::from_secs(2), move || async move {
            board.stats().map(|s| s.total) == Some(2)
                && board.snapshot().items.len() == 2
                && board.snapshot().status == ConnectionStatus::Connected
        })
        .await
    );

    // Sign-out
    tx.send(None).unwrap();
    assert!(
        eventually(Duration::from_secs(2), move || async move {
            board.tickets().identity().await.is_none() && board.stats().is_none()
        })
        .await
    );
    assert!(board.snapshot().items.is_empty());
    assert!(board.snapshot().identity.is_none());
    assert!(board.tickets().channel().await.is_none());
    assert!(
        eventually(Duration::from_secs(2), move || async move {
            ws.closes.lock().await.as_slice() == [Some(1000), Some(1000)]
        })
        .await
    );
    assert_eq!(ws.accepts(), 2);

    board.shutdown().await;
}

#[tokio::test]
async fn agents_are_deduplicated_by_name_without_channel() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/agents"))
        .and(query_param("company_id", "co_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"agents": [
            {"id": "1", "name": "Reception"},
            {"id": "2", "name": "Billing"},
            {"id": "3", "name": "Reception"}
        ]})))
        .mount(&mock_server)
        .await;

    let agents = RemoteCollection::new(AgentSource::new(api(&mock_server)), "ws://127.0.0.1:9");
    agents.set_identity(Some("co_1".into())).await;

    let ids: Vec<String> = agents.items().into_iter().map(|a| a.id).collect();
    assert_eq!(ids, vec!["1", "2"]);
    assert!(agents.channel().await.is_none());
    assert_eq!(agents.find("3"), None);

    agents.shutdown().await;
}
