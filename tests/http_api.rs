use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use ulid::Ulid;

use slotbook::engine::Engine;
use slotbook::http;

// ── Test infrastructure ──────────────────────────────────────

fn test_data_dir() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("slotbook_int_test_{}", Ulid::new()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

async fn start_server_at(wal_path: PathBuf) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let engine = Arc::new(Engine::new(wal_path).unwrap());
    tokio::spawn(async move {
        let _ = axum::serve(listener, http::router(engine)).await;
    });
    addr
}

async fn start_test_server() -> SocketAddr {
    start_server_at(test_data_dir().join("events.wal")).await
}

struct Api {
    base: String,
    client: Client,
}

impl Api {
    fn new(addr: SocketAddr) -> Self {
        Self {
            base: format!("http://{addr}"),
            client: Client::new(),
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let resp = req.send().await.unwrap();
        let status = resp.status();
        let body = resp.json::<Value>().await.unwrap_or(Value::Null);
        (status, body)
    }

    async fn book(&self, title: &str, start: &str, end: &str) -> (StatusCode, Value) {
        self.send(
            self.client
                .post(format!("{}/events/book", self.base))
                .json(&json!({ "title": title, "startTime": start, "endTime": end })),
        )
        .await
    }

    async fn list(&self) -> Vec<Value> {
        let (status, body) = self
            .send(self.client.get(format!("{}/events", self.base)))
            .await;
        assert_eq!(status, StatusCode::OK);
        body.as_array().unwrap().clone()
    }

    async fn block(&self, body: Value) -> (StatusCode, Value) {
        self.send(self.client.post(format!("{}/events/block", self.base)).json(&body))
            .await
    }

    async fn release(&self, body: Value) -> (StatusCode, Value) {
        self.send(self.client.post(format!("{}/events/release", self.base)).json(&body))
            .await
    }

    async fn update(&self, id: &str, title: &str, start: &str, end: &str) -> (StatusCode, Value) {
        self.send(
            self.client
                .put(format!("{}/events/{id}", self.base))
                .json(&json!({ "title": title, "startTime": start, "endTime": end })),
        )
        .await
    }

    async fn delete(&self, id: &str) -> (StatusCode, Value) {
        self.send(self.client.delete(format!("{}/events/{id}", self.base)))
            .await
    }
}

fn id_of(body: &Value) -> String {
    body["event"]["id"].as_str().unwrap().to_string()
}

// ── Tests ────────────────────────────────────────────────────

#[tokio::test]
async fn banner() {
    let addr = start_test_server().await;
    let text = reqwest::get(format!("http://{addr}/"))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(text, "Scheduling API is up and running!");
}

#[tokio::test]
async fn book_returns_created_event() {
    let api = Api::new(start_test_server().await);
    let (status, body) = api
        .book("A", "2024-01-01T10:00:00+02:00", "2024-01-01T11:00:00+02:00")
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Event booked successfully.");
    let event = &body["event"];
    assert_eq!(event["title"], "A");
    assert_eq!(event["startTime"], "2024-01-01T08:00:00Z");
    assert_eq!(event["endTime"], "2024-01-01T09:00:00Z");
    assert_eq!(event["status"], "booked");
    assert!(event["id"].as_str().is_some());
}

#[tokio::test]
async fn book_validation_errors() {
    let api = Api::new(start_test_server().await);

    let (status, body) = api
        .send(
            api.client
                .post(format!("{}/events/book", api.base))
                .json(&json!({ "title": "A", "startTime": "2024-01-01T10:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields.");

    let (status, body) = api.book("A", "yesterday", "2024-01-01T10:00:00Z").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid date format.");

    let (status, body) = api
        .book("A", "2024-01-01T10:00:00Z", "2024-01-01T10:00:00Z")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Start time must be before end time.");

    assert!(api.list().await.is_empty());
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let api = Api::new(start_test_server().await);
    let (status, body) = api
        .send(
            api.client
                .post(format!("{}/events/book", api.base))
                .header("content-type", "application/json")
                .body("{not json"),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid request body.");
}

#[tokio::test]
async fn overlap_is_conflict_touching_is_not() {
    let api = Api::new(start_test_server().await);
    let (status, _) = api.book("A", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = api.book("B", "2024-01-01T10:30:00Z", "2024-01-01T11:30:00Z").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "Event overlaps with an existing event.");

    let (status, _) = api.book("C", "2024-01-01T11:00:00Z", "2024-01-01T12:00:00Z").await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn block_release_rebook_scenario() {
    let api = Api::new(start_test_server().await);
    let (status, body) = api.book("A", "2024-06-01T09:00:00Z", "2024-06-01T10:00:00Z").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["event"]["status"], "booked");
    let id = id_of(&body);

    let (status, body) = api.block(json!({ "id": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Event blocked successfully.");
    assert_eq!(body["event"]["status"], "blocked");

    let (status, _) = api.book("B", "2024-06-01T09:00:00Z", "2024-06-01T10:00:00Z").await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = api.release(json!({ "id": id })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Event released successfully.");
    assert_eq!(body["event"]["status"], "released");

    let (status, body) = api.book("B", "2024-06-01T09:00:00Z", "2024-06-01T10:00:00Z").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["event"]["status"], "booked");

    // Released event cannot be re-blocked.
    let (status, _) = api.block(json!({ "id": id })).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn block_and_release_id_handling() {
    let api = Api::new(start_test_server().await);

    for body in [json!({}), json!({ "id": null }), json!({ "id": "" })] {
        let (status, resp) = api.block(body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(resp["message"], "Event id is required.");
        let (status, _) = api.release(body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    for id in [json!(Ulid::new().to_string()), json!("not-an-id"), json!(7)] {
        let (status, resp) = api.block(json!({ "id": id })).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{id}");
        assert_eq!(resp["message"], "Event not found.");
        let (status, _) = api.release(json!({ "id": id })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn update_checks_fields_before_id() {
    let api = Api::new(start_test_server().await);

    let (status, body) = api
        .send(
            api.client
                .put(format!("{}/events/garbage", api.base))
                .json(&json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Missing required fields.");

    let (status, body) = api
        .update("garbage", "A", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Event not found.");
}

#[tokio::test]
async fn update_flow() {
    let api = Api::new(start_test_server().await);
    let (_, a) = api.book("A", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z").await;
    let (_, b) = api.book("B", "2024-01-01T12:00:00Z", "2024-01-01T13:00:00Z").await;
    let a_id = id_of(&a);
    let _ = id_of(&b);

    // Same times: no self-conflict.
    let (status, body) = api
        .update(&a_id, "A2", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Event updated successfully");
    assert_eq!(body["event"]["title"], "A2");

    // Into B.
    let (status, _) = api
        .update(&a_id, "A2", "2024-01-01T11:30:00Z", "2024-01-01T12:30:00Z")
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    // Up to B's start.
    let (status, body) = api
        .update(&a_id, "A3", "2024-01-01T11:00:00Z", "2024-01-01T12:00:00Z")
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["event"]["startTime"], "2024-01-01T11:00:00Z");
    assert_eq!(body["event"]["status"], "booked");

    let (status, _) = api
        .update(&Ulid::new().to_string(), "X", "2024-01-01T01:00:00Z", "2024-01-01T02:00:00Z")
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = api
        .update(&a_id, "A", "2024-01-01T12:00:00Z", "2024-01-01T11:00:00Z")
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_is_not_repeatable() {
    let api = Api::new(start_test_server().await);
    let (_, body) = api.book("A", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z").await;
    let id = id_of(&body);

    let (status, body) = api.delete(&id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Event deleted successfully." }));

    let (status, body) = api.delete(&id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Event not found.");

    assert!(api.list().await.is_empty());

    let (status, _) = api.delete("garbage").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_returns_all_statuses_in_order() {
    let api = Api::new(start_test_server().await);
    let (_, a) = api.book("A", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z").await;
    let (_, b) = api.book("B", "2024-01-01T08:00:00Z", "2024-01-01T09:00:00Z").await;
    api.release(json!({ "id": id_of(&a) })).await;

    let events = api.list().await;
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["id"], a["event"]["id"]);
    assert_eq!(events[0]["status"], "released");
    assert_eq!(events[1]["id"], b["event"]["id"]);
    assert_eq!(events[1]["status"], "booked");
}

#[tokio::test]
async fn concurrent_http_bookings_one_wins() {
    let api = Arc::new(Api::new(start_test_server().await));

    let attempts = (0..16).map(|i| {
        let api = api.clone();
        async move {
            api.book(&format!("racer {i}"), "2024-02-01T09:00:00Z", "2024-02-01T10:00:00Z")
                .await
                .0
        }
    });
    let statuses = futures::future::join_all(attempts).await;

    let created = statuses.iter().filter(|s| **s == StatusCode::CREATED).count();
    let conflicts = statuses.iter().filter(|s| **s == StatusCode::CONFLICT).count();
    assert_eq!(created, 1);
    assert_eq!(conflicts, 15);
    assert_eq!(api.list().await.len(), 1);
}

#[tokio::test]
async fn state_survives_restart() {
    let wal_path = test_data_dir().join("events.wal");

    let id = {
        let api = Api::new(start_server_at(wal_path.clone()).await);
        let (_, body) = api.book("A", "2024-01-01T10:00:00Z", "2024-01-01T11:00:00Z").await;
        let id = id_of(&body);
        api.block(json!({ "id": id })).await;
        id
    };

    // A second server over the same WAL sees the blocked event.
    let api = Api::new(start_server_at(wal_path).await);
    let events = api.list().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0]["id"], id.as_str());
    assert_eq!(events[0]["status"], "blocked");

    let (status, _) = api.book("B", "2024-01-01T10:30:00Z", "2024-01-01T10:45:00Z").await;
    assert_eq!(status, StatusCode::CONFLICT);
}
