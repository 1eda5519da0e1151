mod common;

use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{id_of, spawn_app};

#[tokio::test]
async fn mutations_are_written_to_the_activity_log() -> Result<()> {
    let t = spawn_app().await?;
    let sales = t.department("Sales").await?;
    let (manager, manager_id) = t.user_with_roles("Sam", "Sales", Some(sales), &["Manager"]).await?;

    let (status, kpi) = t.send("POST", "/kpis", Some(&manager), Some(json!({ "name": "Revenue" }))).await?;
    assert_eq!(status, StatusCode::CREATED);
    let kpi_id: Uuid = id_of(&kpi)?.parse()?;

    t.send("PUT", &format!("/kpis/{}/value", kpi_id), Some(&manager), Some(json!({ "actual_value": 5.0 })))
        .await?;
    t.send("DELETE", &format!("/kpis/{}", kpi_id), Some(&manager), None).await?;

    // the listener writes asynchronously
    let mut names: Vec<String> = Vec::new();
    for _ in 0..50 {
        names = sqlx::query_scalar("SELECT event_name FROM activity_log WHERE subject_id = ? ORDER BY occurred_at")
            .bind(kpi_id)
            .fetch_all(&t.pool)
            .await?;
        if names.len() >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(names, vec!["kpi.created", "kpi.value_updated", "kpi.deleted"]);

    let (actor, severity, description): (Option<Uuid>, String, String) = sqlx::query_as(
        "SELECT actor_id, severity, description FROM activity_log WHERE subject_id = ? AND event_name = 'kpi.deleted'",
    )
    .bind(kpi_id)
    .fetch_one(&t.pool)
    .await?;
    assert_eq!(actor, Some(manager_id));
    assert_eq!(severity, "critical");
    assert_eq!(description, "KPI deleted");

    Ok(())
}
