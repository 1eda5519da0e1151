mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::spawn_app;

#[tokio::test]
async fn dashboard_scope_follows_roles() -> Result<()> {
    let t = spawn_app().await?;
    let sales = t.department("Sales").await?;
    let finance = t.department("Finance").await?;

    let (admin, _) = t.user_with_roles("Ada", "Admin", None, &["Administrator"]).await?;
    let (sales_manager, _) = t.user_with_roles("Sam", "Sales", Some(sales), &["Manager"]).await?;
    let (finance_manager, _) = t.user_with_roles("Fran", "Finance", Some(finance), &["Manager"]).await?;
    let (owner, owner_id) = t.user_with_roles("Kim", "Owner", Some(sales), &["IndicatorOwner"]).await?;
    t.set_kpi_owner(owner_id).await?;

    for name in ["Revenue", "Margin"] {
        let (status, _) = t
            .send(
                "POST",
                "/kpis",
                Some(&sales_manager),
                Some(json!({ "name": name, "responsible_person": "Kim Owner" })),
            )
            .await?;
        assert_eq!(status, StatusCode::CREATED);
    }
    t.send("POST", "/kpis", Some(&finance_manager), Some(json!({ "name": "Cash" }))).await?;
    t.send(
        "POST",
        "/indicators",
        Some(&sales_manager),
        Some(json!({ "indicator_type": "kri", "name": "Churn", "responsible_user_id": owner_id })),
    )
    .await?;

    let (status, board) = t.send("GET", "/dashboard", Some(&admin), None).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(board["scope"], "organization");
    assert_eq!(board["counts"]["kpis"], 3);

    let (_, board) = t.send("GET", "/dashboard", Some(&sales_manager), None).await?;
    assert_eq!(board["scope"], "department");
    assert_eq!(board["counts"]["kpis"], 2);
    assert_eq!(board["counts"]["indicators"], 1);

    let (_, board) = t.send("GET", "/dashboard", Some(&owner), None).await?;
    assert_eq!(board["scope"], "personal");
    assert_eq!(board["counts"]["kpis"], 0);
    assert_eq!(board["owned_kpis"].as_array().map(Vec::len), Some(2));
    assert_eq!(board["owned_indicators"][0]["name"], "Churn");

    Ok(())
}
