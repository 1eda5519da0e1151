use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::{json, Map, Value};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::models;
use crate::routes;

#[derive(OpenApi)]
#[openapi(
	paths(
		routes::health::health,
		routes::auth::register,
		routes::auth::login,
		routes::auth::me,
		routes::auth::logout,
		routes::departments::list_departments,
		routes::departments::create_department,
		routes::users::list_users,
		routes::users::assign_role,
		routes::users::revoke_role,
		routes::users::update_profile,
		routes::kpis::list_kpis,
		routes::kpis::create_kpi,
		routes::kpis::get_kpi,
		routes::kpis::update_kpi,
		routes::kpis::update_kpi_value,
		routes::kpis::delete_kpi,
		routes::csfs::list_csfs,
		routes::csfs::create_csf,
		routes::csfs::get_csf,
		routes::csfs::update_csf,
		routes::csfs::delete_csf,
		routes::csfs::list_linked_kpis,
		routes::csfs::link_kpi,
		routes::csfs::unlink_kpi,
		routes::success_factors::list_success_factors,
		routes::success_factors::create_success_factor,
		routes::success_factors::get_success_factor,
		routes::success_factors::update_success_factor,
		routes::success_factors::delete_success_factor,
		routes::success_factors::list_linked_csfs,
		routes::success_factors::link_csf,
		routes::success_factors::unlink_csf,
		routes::indicators::list_indicators,
		routes::indicators::create_indicator,
		routes::indicators::get_indicator,
		routes::indicators::list_children,
		routes::indicators::update_indicator,
		routes::indicators::update_indicator_value,
		routes::indicators::delete_indicator,
		routes::permissions::resource_permissions,
		routes::dashboard::dashboard
	),
	components(
		schemas(
			routes::health::HealthResponse,
			routes::auth::MessageResponse,
			models::user::User,
			models::user::AuthResponse,
			models::user::LoginRequest,
			models::user::RegisterRequest,
			models::user::AssignRoleRequest,
			models::user::UserProfileUpdateRequest,
			models::department::Department,
			models::department::DepartmentCreateRequest,
			models::kpi::Kpi,
			models::kpi::KpiCreateRequest,
			models::kpi::KpiUpdateRequest,
			models::kpi::ValueUpdateRequest,
			models::csf::Csf,
			models::csf::FactorCreateRequest,
			models::csf::FactorUpdateRequest,
			models::csf::LinkKpiRequest,
			models::success_factor::SuccessFactor,
			models::success_factor::LinkCsfRequest,
			models::indicator::Indicator,
			models::indicator::IndicatorType,
			models::indicator::IndicatorCreateRequest,
			models::indicator::IndicatorUpdateRequest,
			models::permission::OperationVerdict,
			models::permission::PermissionReport,
			models::dashboard::Dashboard,
			models::dashboard::DashboardCounts,
			models::dashboard::DashboardScope,
			crate::authz::Operation,
			crate::authz::Decision,
			crate::authz::Rule,
			crate::authz::ResourceKind
		)
	),
	tags(
		(name = "Health", description = "Liveness and database check"),
		(name = "Auth", description = "Registration, login and the current user"),
		(name = "Departments", description = "Organisational units"),
		(name = "Users", description = "Role and profile administration"),
		(name = "KPIs", description = "Key performance indicators"),
		(name = "CSFs", description = "Critical success factors and their KPIs"),
		(name = "Success factors", description = "Success factors and their CSFs"),
		(name = "Indicators", description = "KRI, RI and PI hierarchy"),
		(name = "Authorization", description = "Permission probe for a single resource"),
		(name = "Dashboard", description = "Per-caller summary")
	)
)]
pub struct ApiDoc;

/// Generated document with the bearer scheme, global security and a
/// `servers` entry for `port` patched in.
pub fn build_openapi(port: u16) -> anyhow::Result<utoipa::openapi::OpenApi> {
	let mut doc = serde_json::to_value(ApiDoc::openapi())?;
	let root = doc
		.as_object_mut()
		.ok_or_else(|| anyhow::anyhow!("OpenAPI root is not an object"))?;

	ensure_security_components(root)?;
	root.entry("security").or_insert_with(|| json!([{ "bearerAuth": [] }]));
	open_public_paths(root);
	add_request_examples(root);
	ensure_servers(root, port);

	Ok(serde_json::from_value(doc)?)
}

pub fn swagger_routes(doc: utoipa::openapi::OpenApi) -> anyhow::Result<Router> {
	let swagger_config = utoipa_swagger_ui::Config::new(["/api-docs/openapi.json"])
		.try_it_out_enabled(true)
		.with_credentials(true)
		.persist_authorization(true);

	let doc_json = Arc::new(serde_json::to_value(&doc)?);

	let json_route = get(move || {
		let doc_json = Arc::clone(&doc_json);
		async move { Json((*doc_json).clone()) }
	});

	Ok(Router::new()
		.route("/api-docs/openapi.json", json_route)
		.merge(SwaggerUi::new("/docs").config(swagger_config)))
}

fn ensure_security_components(root: &mut Map<String, Value>) -> anyhow::Result<()> {
	let schemes = root
		.entry("components")
		.or_insert_with(|| Value::Object(Map::new()))
		.as_object_mut()
		.and_then(|components| {
			components
				.entry("securitySchemes")
				.or_insert_with(|| Value::Object(Map::new()))
				.as_object_mut()
		})
		.ok_or_else(|| anyhow::anyhow!("components.securitySchemes is not an object"))?;

	schemes.insert(
		"bearerAuth".to_string(),
		json!({
			"type": "http",
			"scheme": "bearer",
			"bearerFormat": "JWT"
		}),
	);
	Ok(())
}

/// Health, register and login work without a token.
fn open_public_paths(root: &mut Map<String, Value>) {
	let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for (path, method) in [("/api/health", "get"), ("/auth/register", "post"), ("/auth/login", "post")] {
		if let Some(operation) = paths
			.get_mut(path)
			.and_then(|item| item.get_mut(method))
			.and_then(Value::as_object_mut)
		{
			operation.insert("security".to_string(), json!([]));
		}
	}
}

fn add_request_examples(root: &mut Map<String, Value>) {
	let Some(paths) = root.get_mut("paths").and_then(Value::as_object_mut) else { return; };

	for item in paths.values_mut() {
		let Some(operations) = item.as_object_mut() else { continue; };
		for operation in operations.values_mut() {
			apply_request_example(operation);
		}
	}
}

fn apply_request_example(operation: &mut Value) {
	let Some(app_json) = operation
		.get_mut("requestBody")
		.and_then(|body| body.get_mut("content"))
		.and_then(|content| content.get_mut("application/json"))
		.and_then(Value::as_object_mut)
	else {
		return;
	};
	let Some(reference) = app_json
		.get("schema")
		.and_then(|schema| schema.get("$ref"))
		.and_then(Value::as_str)
	else {
		return;
	};

	let example = match reference {
		"#/components/schemas/LoginRequest" => json!({
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd"
		}),
		"#/components/schemas/RegisterRequest" => json!({
			"first_name": "Ada",
			"last_name": "Lovelace",
			"email": "ada@example.com",
			"password": "S3cureP@ssw0rd",
			"department_id": null
		}),
		"#/components/schemas/KpiCreateRequest" => json!({
			"name": "Monthly recurring revenue",
			"unit": "EUR",
			"target_value": 120000.0,
			"responsible_person": "Ada Lovelace"
		}),
		"#/components/schemas/FactorCreateRequest" => json!({
			"name": "Reliable delivery",
			"description": "Ship on the committed dates"
		}),
		"#/components/schemas/IndicatorCreateRequest" => json!({
			"indicator_type": "ri",
			"parent_id": "00000000-0000-0000-0000-000000000000",
			"name": "On-time releases",
			"unit": "%",
			"target_value": 95.0
		}),
		"#/components/schemas/ValueUpdateRequest" => json!({ "actual_value": 42.5 }),
		"#/components/schemas/AssignRoleRequest" => json!({ "role": "Manager" }),
		_ => return,
	};

	app_json.insert("example".to_string(), example);
}

fn ensure_servers(root: &mut Map<String, Value>, port: u16) {
	let server_url = format!("http://localhost:{}", port);

	match root.get_mut("servers") {
		Some(Value::Array(servers)) => {
			let has = servers
				.iter()
				.any(|v| v.get("url").and_then(Value::as_str) == Some(server_url.as_str()));
			if !has {
				servers.push(json!({ "url": server_url }));
			}
		}
		_ => {
			root.insert("servers".to_string(), json!([{ "url": server_url }]));
		}
	}
}
