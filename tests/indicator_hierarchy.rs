mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;
use uuid::Uuid;

use common::{id_of, spawn_app};

#[tokio::test]
async fn hierarchy_is_enforced_on_create_and_delete() -> Result<()> {
    let t = spawn_app().await?;
    let eng = t.department("Engineering").await?;
    let (manager, _) = t.user_with_roles("Mia", "Manager", Some(eng), &["Manager"]).await?;

    let (status, kri) = t
        .send("POST", "/indicators", Some(&manager), Some(json!({ "indicator_type": "kri", "name": "Uptime" })))
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", kri);
    let kri_id = id_of(&kri)?;

    let bad_requests = [
        json!({ "indicator_type": "ri", "name": "Orphan" }),
        json!({ "indicator_type": "kri", "name": "Nested", "parent_id": kri_id }),
        json!({ "indicator_type": "pi", "name": "Skips a level", "parent_id": kri_id }),
        json!({ "indicator_type": "ri", "name": "Ghost parent", "parent_id": Uuid::new_v4() }),
    ];
    for payload in bad_requests {
        let (status, body) = t.send("POST", "/indicators", Some(&manager), Some(payload.clone())).await?;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} -> {}", payload, body);
    }

    let (status, ri) = t
        .send(
            "POST",
            "/indicators",
            Some(&manager),
            Some(json!({ "indicator_type": "ri", "name": "Incident count", "parent_id": kri_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED, "{}", ri);
    let ri_id = id_of(&ri)?;

    let (status, pi) = t
        .send(
            "POST",
            "/indicators",
            Some(&manager),
            Some(json!({ "indicator_type": "pi", "name": "Pager response", "parent_id": ri_id })),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let pi_id = id_of(&pi)?;

    // filters and children
    let (_, ris) = t.send("GET", "/indicators?indicator_type=ri", Some(&manager), None).await?;
    assert_eq!(ris.as_array().map(Vec::len), Some(1));
    let (status, _) = t.send("GET", "/indicators?indicator_type=kpi", Some(&manager), None).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (_, children) = t.send("GET", &format!("/indicators/{}/children", kri_id), Some(&manager), None).await?;
    assert_eq!(children[0]["id"], ri_id.as_str());

    // parents go last
    let (status, _) = t.send("DELETE", &format!("/indicators/{}", kri_id), Some(&manager), None).await?;
    assert_eq!(status, StatusCode::CONFLICT);
    for id in [&pi_id, &ri_id, &kri_id] {
        let (status, _) = t.send("DELETE", &format!("/indicators/{}", id), Some(&manager), None).await?;
        assert_eq!(status, StatusCode::NO_CONTENT);
    }

    Ok(())
}

#[tokio::test]
async fn indicator_owners_update_their_own_indicators() -> Result<()> {
    let t = spawn_app().await?;
    let eng = t.department("Engineering").await?;
    let (manager, _) = t.user_with_roles("Mia", "Manager", Some(eng), &["Manager"]).await?;
    let (owner, owner_id) = t.user_with_roles("Olive", "Owner", Some(eng), &["IndicatorOwner"]).await?;
    let (plain, plain_id) = t.user_with_roles("Pat", "Plain", Some(eng), &[]).await?;

    let (_, assigned) = t
        .send(
            "POST",
            "/indicators",
            Some(&manager),
            Some(json!({ "indicator_type": "kri", "name": "Assigned", "responsible_user_id": owner_id })),
        )
        .await?;
    let (_, named) = t
        .send(
            "POST",
            "/indicators",
            Some(&manager),
            Some(json!({ "indicator_type": "kri", "name": "Named", "owner": "Dr. Olive Owner (Ops)" })),
        )
        .await?;
    let (_, someone_else) = t
        .send("POST", "/indicators", Some(&manager), Some(json!({ "indicator_type": "kri", "name": "Other" })))
        .await?;

    for indicator in [&assigned, &named] {
        let (status, body) = t
            .send(
                "PUT",
                &format!("/indicators/{}/value", id_of(indicator)?),
                Some(&owner),
                Some(json!({ "actual_value": 99.5 })),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{}", body);
        assert_eq!(body["actual_value"], 99.5);
    }

    let (status, _) = t
        .send(
            "PUT",
            &format!("/indicators/{}/value", id_of(&someone_else)?),
            Some(&owner),
            Some(json!({ "actual_value": 1.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // being named without the owner role is not enough
    let (_, for_plain) = t
        .send(
            "POST",
            "/indicators",
            Some(&manager),
            Some(json!({ "indicator_type": "kri", "name": "Plain's", "responsible_user_id": plain_id })),
        )
        .await?;
    let (status, _) = t
        .send(
            "PUT",
            &format!("/indicators/{}/value", id_of(&for_plain)?),
            Some(&plain),
            Some(json!({ "actual_value": 1.0 })),
        )
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // owners cannot delete
    let (status, _) = t
        .send("DELETE", &format!("/indicators/{}", id_of(&assigned)?), Some(&owner), None)
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    Ok(())
}
