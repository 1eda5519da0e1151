mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::spawn_app;

#[tokio::test]
async fn auth_edge_cases() -> Result<()> {
    let t = spawn_app().await?;

    // 1. Short password
    let (status, _) = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "first_name": "Short",
                "last_name": "Pass",
                "email": "short@example.com",
                "password": "short"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "short password should be rejected");

    // 2. Blank last name
    let (status, _) = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "first_name": "Blank",
                "last_name": "   ",
                "email": "blank@example.com",
                "password": "password123"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "blank last name should be rejected");

    // 3. Unknown department
    let (status, _) = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "first_name": "Lost",
                "last_name": "Soul",
                "email": "lost@example.com",
                "password": "password123",
                "department_id": uuid::Uuid::new_v4()
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST, "unknown department should be rejected");

    // 4. Valid registration gets the baseline role
    let (token, _) = t.register("Valid", "User", "Valid@Example.com", None).await?;
    let (status, me) = t.send("GET", "/auth/me", Some(&token), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "valid@example.com");
    assert_eq!(me["roles"], json!(["User"]));

    // 5. Duplicate email, compared case-insensitively
    let (status, _) = t
        .send(
            "POST",
            "/auth/register",
            None,
            Some(json!({
                "first_name": "Again",
                "last_name": "User",
                "email": "VALID@example.com",
                "password": "password123"
            })),
        )
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);

    // 6. Wrong password
    let (status, _) = t
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "valid@example.com", "password": "wrongpassword" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED, "wrong password should be unauthorized");

    // 7. Unknown email
    let (status, _) = t
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 8. Successful login returns the roles too
    let (status, body) = t
        .send(
            "POST",
            "/auth/login",
            None,
            Some(json!({ "email": "valid@example.com", "password": "password123" })),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["token"].as_str().is_some());
    assert_eq!(body["user"]["roles"], json!(["User"]));

    // 9. Missing and malformed tokens
    let (status, _) = t.send("GET", "/auth/me", None, None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = t.send("GET", "/kpis", Some("not-a-jwt"), None).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    Ok(())
}

#[tokio::test]
async fn token_for_a_deleted_user_is_forbidden() -> Result<()> {
    let t = spawn_app().await?;
    let (token, user_id) = t.register("Gone", "Soon", "gone@example.com", None).await?;

    sqlx::query("UPDATE users SET deleted_at = ? WHERE id = ?")
        .bind(chrono::Utc::now())
        .bind(user_id)
        .execute(&t.pool)
        .await?;

    // the token is still valid, but the principal cannot be resolved
    let (status, _) = t.send("GET", "/kpis", Some(&token), None).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}
