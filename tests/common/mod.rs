#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::TempDir;
use tower::util::ServiceExt;
use uuid::Uuid;

use kpi_tracker::events::{init_event_bus, start_activity_listener};
use kpi_tracker::jwt::JwtConfig;
use kpi_tracker::{router, AppState};

pub struct TestApp {
    // keeps the database file alive for the duration of the test
    _dir: TempDir,
    pub pool: SqlitePool,
    pub app: Router,
}

pub async fn spawn_app() -> Result<TestApp> {
    let dir = tempfile::tempdir().context("failed to create tempdir")?;
    let db_path = dir.path().join("test.db");
    let opts = SqliteConnectOptions::new()
        .filename(db_path.as_path())
        .create_if_missing(true);
    let pool = SqlitePool::connect_with(opts).await?;

    let migrator =
        sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
    migrator.run(&pool).await?;

    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool.clone(), JwtConfig::new("test-secret", 1), event_bus);

    Ok(TestApp {
        _dir: dir,
        pool,
        app: router(state),
    })
}

impl TestApp {
    /// Sends a request and returns the status with the decoded JSON body
    /// (`Value::Null` for empty bodies).
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), usize::MAX).await?;
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok((status, json))
    }

    /// Registers a user and returns `(token, user_id)`.
    pub async fn register(&self, first: &str, last: &str, email: &str, department_id: Option<Uuid>) -> Result<(String, Uuid)> {
        let (status, body) = self
            .send(
                "POST",
                "/auth/register",
                None,
                Some(serde_json::json!({
                    "first_name": first,
                    "last_name": last,
                    "email": email,
                    "password": "password123",
                    "department_id": department_id,
                })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {} - {}", status, body);

        let token = body["token"].as_str().context("missing token")?.to_string();
        let user_id = body["user"]["id"].as_str().context("missing user id")?.parse()?;
        Ok((token, user_id))
    }

    /// Registers a user and grants `roles` directly in the database.
    pub async fn user_with_roles(&self, first: &str, last: &str, department_id: Option<Uuid>, roles: &[&str]) -> Result<(String, Uuid)> {
        let email = format!("{}.{}@example.com", first.to_lowercase(), last.to_lowercase());
        let (token, user_id) = self.register(first, last, &email, department_id).await?;
        for role in roles {
            self.grant_role(user_id, role).await?;
        }
        Ok((token, user_id))
    }

    pub async fn grant_role(&self, user_id: Uuid, role: &str) -> Result<()> {
        sqlx::query("INSERT OR IGNORE INTO user_roles (user_id, role_name, created_at) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(role)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_kpi_owner(&self, user_id: Uuid) -> Result<()> {
        sqlx::query("UPDATE users SET is_kpi_owner = 1 WHERE id = ?")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn department(&self, name: &str) -> Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO departments (id, name, created_at) VALUES (?, ?, ?)")
            .bind(id)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;
        Ok(id)
    }
}

pub fn id_of(body: &Value) -> Result<String> {
    Ok(body["id"].as_str().context("missing id")?.to_string())
}
