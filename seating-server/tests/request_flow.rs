//! 端到端：真实 TCP 监听 + 二进制帧 + 请求路由

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use seating_server::core::Collaborators;
use seating_server::db::{DbService, ReservationStorage};
use seating_server::message::{TcpTransport, Transport};
use seating_server::services::{LogNotifier, StaticIdentityProvider};
use seating_server::utils::ManualClock;
use seating_server::{Config, RunningServer, Server, ServerState};
use serde_json::{Value, json};
use shared::error::ErrorCode;
use shared::message::{BusMessage, EventType, HandshakePayload, PROTOCOL_VERSION, RequestCommandPayload, ResponsePayload};

const DAY: &str = "2026-05-20";

async fn start_server(capacities: &[u32]) -> (RunningServer, Arc<ManualClock>) {
    let mut config = Config::for_tests(std::env::temp_dir().to_string_lossy(), 0);
    config.table_capacities = capacities.to_vec();
    config.pool_size = 2;
    config.pool_timeout_ms = 500;

    let storage = ReservationStorage::open_in_memory().unwrap();
    let db = DbService::with_storage(storage, capacities, config.pool_size, config.pool_timeout())
        .await
        .unwrap();

    let now = NaiveDate::from_ymd_opt(2026, 5, 20).unwrap().and_hms_opt(9, 0, 0).unwrap();
    let clock = Arc::new(ManualClock::new(now));
    let collaborators = Collaborators {
        clock: clock.clone(),
        notifier: Arc::new(LogNotifier),
        identity: Arc::new(StaticIdentityProvider::parse("g1:alice:guest,g2:dave:guest,s1:bob:staff")),
    };
    let state = ServerState::assemble(config.clone(), db, collaborators);
    let running = Server::with_state(config, state).start().await.unwrap();
    (running, clock)
}

struct Client {
    transport: TcpTransport,
}

impl Client {
    async fn connect(server: &RunningServer) -> Self {
        let addr = format!("127.0.0.1:{}", server.local_addr().port());
        let transport = TcpTransport::connect(&addr).await.unwrap();
        let client = Self { transport };
        let reply = client.handshake(PROTOCOL_VERSION).await;
        assert!(reply.success, "handshake rejected: {}", reply.message);
        client
    }

    async fn handshake(&self, version: u16) -> ResponsePayload {
        let msg = BusMessage::handshake(&HandshakePayload {
            version,
            client_name: Some("host-stand".to_string()),
            client_version: Some("0.1.0".to_string()),
            client_id: None,
        });
        self.transport.write_message(&msg).await.unwrap();
        let reply = self.transport.read_message().await.unwrap();
        assert_eq!(reply.correlation_id, Some(msg.request_id));
        reply.parse_payload().unwrap()
    }

    async fn request(&self, identifier: &str, params: Value) -> ResponsePayload {
        let msg = BusMessage::request_command(&RequestCommandPayload::new(identifier, params));
        self.transport.write_message(&msg).await.unwrap();
        let reply = self.transport.read_message().await.unwrap();
        assert_eq!(reply.event_type, EventType::Response);
        assert_eq!(reply.correlation_id, Some(msg.request_id));
        reply.parse_payload().unwrap()
    }

    async fn login(&self, token: &str) {
        let reply = self.request("session.login", json!({ "token": token })).await;
        assert_eq!(reply.identifier, "session.login.ok");
    }
}

fn data(reply: &ResponsePayload) -> &Value {
    reply.data.as_ref().expect("reply carries data")
}

#[tokio::test]
async fn test_session_and_unknown_commands() {
    let (server, _clock) = start_server(&[2, 4]).await;
    let client = Client::connect(&server).await;

    let reply = client.request("session.whoami", Value::Null).await;
    assert_eq!(reply.identifier, "session.whoami.unauthorized");
    assert_eq!(reply.code, Some(ErrorCode::NotAuthenticated));

    let reply = client.request("session.login", json!({ "token": "nope" })).await;
    assert_eq!(reply.identifier, "session.login.unauthorized");

    client.login("g1").await;
    let reply = client.request("session.whoami", Value::Null).await;
    assert_eq!(reply.identifier, "session.whoami.ok");
    assert_eq!(data(&reply)["id"], "alice");
    assert_eq!(data(&reply)["role"], "guest");

    let reply = client.request("menu.read", Value::Null).await;
    assert_eq!(reply.identifier, "menu.read.unknown");
    assert_eq!(reply.code, Some(ErrorCode::UnknownCommand));

    // 连接在未知请求后仍然可用
    let reply = client.request("session.logout", Value::Null).await;
    assert_eq!(reply.identifier, "session.logout.ok");
    let reply = client.request("session.whoami", Value::Null).await;
    assert_eq!(reply.identifier, "session.whoami.unauthorized");

    server.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_version_mismatch_closes_connection() {
    let (server, _clock) = start_server(&[2]).await;
    let addr = format!("127.0.0.1:{}", server.local_addr().port());
    let client = Client {
        transport: TcpTransport::connect(&addr).await.unwrap(),
    };

    let reply = client.handshake(PROTOCOL_VERSION + 1).await;
    assert!(!reply.success);
    assert!(reply.message.contains("version mismatch"));
    assert!(client.transport.read_message().await.is_err());

    server.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_reservation_lifecycle_over_tcp() {
    let (server, clock) = start_server(&[2, 4]).await;
    let guest = Client::connect(&server).await;
    let staff = Client::connect(&server).await;
    guest.login("g1").await;
    staff.login("s1").await;

    let reply = guest
        .request("reservation.slots", json!({ "date": DAY, "party_size": 4 }))
        .await;
    assert_eq!(reply.identifier, "reservation.slots.ok");
    assert!(!data(&reply)["slots"].as_array().unwrap().is_empty());

    let reply = guest
        .request(
            "reservation.create",
            json!({ "date": DAY, "time": "19:00", "party_size": 4, "contact": "600111222" }),
        )
        .await;
    assert_eq!(reply.identifier, "reservation.create.ok");
    let code = data(&reply)["code"].as_str().unwrap().to_string();
    assert!(code.starts_with('R'));
    assert_eq!(data(&reply)["status"], "PENDING");

    // 同一时段只有一张 4 人桌
    let reply = staff
        .request("reservation.create", json!({ "date": DAY, "time": "19:30", "party_size": 4 }))
        .await;
    assert_eq!(reply.identifier, "reservation.create.conflict");

    let reply = guest
        .request("reservation.create", json!({ "date": DAY, "time": "19:15", "party_size": 2 }))
        .await;
    assert_eq!(reply.identifier, "reservation.create.invalid");

    let reply = guest.request("reservation.checkin", json!({ "code": code })).await;
    assert_eq!(reply.identifier, "reservation.checkin.forbidden");
    let reply = guest.request("table.list", Value::Null).await;
    assert_eq!(reply.identifier, "table.list.forbidden");

    clock.set(NaiveDate::from_ymd_opt(2026, 5, 20).unwrap().and_hms_opt(19, 5, 0).unwrap());
    let reply = staff.request("reservation.checkin", json!({ "code": code })).await;
    assert_eq!(reply.identifier, "reservation.checkin.ok");
    assert_eq!(data(&reply)["status"], "SEATED");
    assert_eq!(data(&reply)["table_id"], 2);

    let reply = staff.request("table.list", Value::Null).await;
    assert_eq!(data(&reply)["occupied"], 1);

    let reply = staff.request("reservation.checkin", json!({ "code": code })).await;
    assert_eq!(reply.identifier, "reservation.checkin.rejected");

    let reply = staff.request("reservation.complete", json!({ "code": code })).await;
    assert_eq!(reply.identifier, "reservation.complete.ok");
    let reply = staff.request("table.list", Value::Null).await;
    assert_eq!(data(&reply)["occupied"], 0);

    let reply = staff.request("reservation.list", json!({ "date": DAY })).await;
    assert_eq!(data(&reply).as_array().unwrap().len(), 1);

    let reply = guest.request("reservation.get", json!({ "code": "R999999" })).await;
    assert_eq!(reply.identifier, "reservation.get.not_found");

    server.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_owner_or_staff_cancel() {
    let (server, _clock) = start_server(&[2, 4]).await;
    let alice = Client::connect(&server).await;
    let dave = Client::connect(&server).await;
    alice.login("g1").await;
    dave.login("g2").await;

    let reply = alice
        .request("reservation.create", json!({ "date": DAY, "time": "20:00", "party_size": 2 }))
        .await;
    let code = data(&reply)["code"].as_str().unwrap().to_string();

    let reply = dave.request("reservation.cancel", json!({ "code": code })).await;
    assert_eq!(reply.identifier, "reservation.cancel.forbidden");

    let reply = alice.request("reservation.cancel", json!({ "code": code })).await;
    assert_eq!(reply.identifier, "reservation.cancel.ok");
    assert_eq!(data(&reply)["status"], "CANCELLED");

    server.shutdown(Duration::from_secs(2)).await;
}

#[tokio::test]
async fn test_walk_in_queue_and_call() {
    let (server, clock) = start_server(&[2]).await;
    clock.set(NaiveDate::from_ymd_opt(2026, 5, 20).unwrap().and_hms_opt(13, 0, 0).unwrap());
    let first = Client::connect(&server).await;
    let second = Client::connect(&server).await;
    let staff = Client::connect(&server).await;
    first.login("g1").await;
    second.login("g2").await;
    staff.login("s1").await;

    let reply = first.request("waitlist.join", json!({ "party_size": 2 })).await;
    assert_eq!(reply.identifier, "waitlist.join.seated");
    let seated_code = data(&reply)["code"].as_str().unwrap().to_string();
    assert!(seated_code.starts_with('W'));

    let reply = second
        .request("waitlist.join", json!({ "party_size": 2, "contact": "600333444" }))
        .await;
    assert_eq!(reply.identifier, "waitlist.join.queued");
    let queued_code = data(&reply)["code"].as_str().unwrap().to_string();
    assert_eq!(data(&reply)["estimated_wait_minutes"], 120);

    let reply = second.request("waitlist.status", json!({ "code": queued_code })).await;
    assert_eq!(data(&reply)["position"], 1);

    let reply = staff.request("waitlist.notify", Value::Null).await;
    assert_eq!(data(&reply)["notified"], Value::Null);

    let reply = staff.request("reservation.complete", json!({ "code": seated_code })).await;
    assert_eq!(reply.identifier, "reservation.complete.ok");

    let reply = staff.request("waitlist.notify", Value::Null).await;
    assert_eq!(data(&reply)["notified"]["code"], queued_code.as_str());
    assert_eq!(data(&reply)["notified"]["status"], "NOTIFIED");

    let reply = staff.request("reservation.checkin", json!({ "code": queued_code })).await;
    assert_eq!(reply.identifier, "reservation.checkin.ok");
    assert_eq!(data(&reply)["table_id"], 1);

    server.shutdown(Duration::from_secs(2)).await;
}
