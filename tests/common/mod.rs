use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use sqlx::postgres::{PgPool, PgPoolOptions};
use uuid::Uuid;

use ob_rs_simulator::config::Config;
use ob_rs_simulator::db::MemoryStore;
use ob_rs_simulator::idempotency::IdempotencyPolicy;
use ob_rs_simulator::state::AppState;

/// A running simulator on a random port, backed by an in-memory store.
#[allow(dead_code)]
pub struct TestApp {
    pub addr: SocketAddr,
    pub store: Arc<MemoryStore>,
    pub client: Client,
}

#[allow(dead_code)]
impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a payment submission, return (body, status).
    pub async fn submit(
        &self,
        version: &str,
        resource: &str,
        idempotency_key: Option<&str>,
        financial_id: Option<&str>,
        body: &Value,
    ) -> (Value, StatusCode) {
        let mut req = self
            .client
            .post(self.url(&format!("/open-banking/{version}/pisp/{resource}")))
            .json(body);
        if let Some(key) = idempotency_key {
            req = req.header("x-idempotency-key", key);
        }
        if let Some(id) = financial_id {
            req = req.header("x-fapi-financial-id", id);
        }
        let resp = req.send().await.expect("submit request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Submit a domestic payment through a release that no longer takes a financial id.
    pub async fn submit_domestic(&self, consent_id: &str, key: &str, amount: u64) -> (Value, StatusCode) {
        self.submit(
            "v3.1.4",
            "domestic-payments",
            Some(key),
            None,
            &payment_body(consent_id, amount),
        )
        .await
    }

    pub async fn get(&self, path: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn post(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn put(&self, path: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn delete(&self, path: &str) -> StatusCode {
        self.client
            .delete(self.url(path))
            .send()
            .await
            .expect("delete request failed")
            .status()
    }
}

#[allow(dead_code)]
pub fn payment_body(consent_id: &str, amount: u64) -> Value {
    json!({
        "Data": {
            "ConsentId": consent_id,
            "Initiation": {
                "InstructionIdentification": "ACME412",
                "InstructedAmount": { "Amount": amount.to_string(), "Currency": "GBP" },
            },
        },
        "Risk": {},
    })
}

#[allow(dead_code)]
pub fn test_config(policy: IdempotencyPolicy) -> Config {
    Config {
        database_url: None,
        host: "127.0.0.1".parse().unwrap(),
        port: 0,
        base_url: "http://localhost".to_string(),
        log_level: "warn".to_string(),
        idempotency_policy: policy,
    }
}

#[allow(dead_code)]
pub async fn spawn_app() -> TestApp {
    spawn_app_with(IdempotencyPolicy::KeyAndPayload).await
}

#[allow(dead_code)]
pub async fn spawn_app_with(policy: IdempotencyPolicy) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(test_config(policy), store.clone(), store.clone())
        .expect("default handler chains are valid");
    let app = ob_rs_simulator::build_app(Arc::new(state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    TestApp {
        addr,
        store,
        client: Client::new(),
    }
}

/// A fresh, migrated database on the server named by `DATABASE_URL`.
/// `None` when no database is configured, so Postgres tests can skip.
#[allow(dead_code)]
pub async fn test_pool() -> Option<PgPool> {
    let _ = dotenvy::dotenv();

    let Ok(base_url) = std::env::var("DATABASE_URL") else {
        eprintln!("DATABASE_URL not set, skipping Postgres test");
        return None;
    };

    let db_name = format!("obsim_test_{}", Uuid::now_v7().simple());

    // Connect to default postgres DB to create test DB
    let admin_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.clone());

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url)
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    Some(pool)
}
