use std::sync::Arc;

use axum::http::Method;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::authz::{PolicyEvaluator, RuleTablePolicy};
use crate::errors::AppError;
use crate::events::{init_event_bus, start_activity_listener, EventBus};
use crate::jwt::JwtConfig;
use crate::routes::{auth, csfs, dashboard, departments, health, indicators, kpis, permissions, success_factors, users};

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub jwt: Arc<JwtConfig>,
    pub event_bus: EventBus,
    pub policy: Arc<dyn PolicyEvaluator>,
}

impl AppState {
    pub fn new(pool: SqlitePool, jwt: JwtConfig, event_bus: EventBus) -> Self {
        Self {
            pool,
            jwt: Arc::new(jwt),
            event_bus,
            policy: Arc::new(RuleTablePolicy::new()),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn PolicyEvaluator>) -> Self {
        self.policy = policy;
        self
    }
}

/// Builds the router from environment configuration and starts the
/// activity log listener.
pub async fn create_app(pool: SqlitePool) -> Result<Router, AppError> {
    let jwt_config = JwtConfig::from_env()?;
    let (event_bus, rx) = init_event_bus();
    tokio::spawn(start_activity_listener(rx, pool.clone()));

    let state = AppState::new(pool, jwt_config, event_bus);
    Ok(router(state))
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_origin(Any)
        .allow_headers(Any);

    let auth_routes = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/me", get(auth::me))
        .route("/logout", post(auth::logout));

    let department_routes = Router::new()
        .route("/", get(departments::list_departments).post(departments::create_department));

    let user_routes = Router::new()
        .route("/", get(users::list_users))
        .route("/:id/roles", post(users::assign_role))
        .route("/:id/roles/:role", delete(users::revoke_role))
        .route("/:id/profile", put(users::update_profile));

    let kpi_routes = Router::new()
        .route("/", get(kpis::list_kpis).post(kpis::create_kpi))
        .route("/:id", get(kpis::get_kpi).put(kpis::update_kpi).delete(kpis::delete_kpi))
        .route("/:id/value", put(kpis::update_kpi_value));

    let csf_routes = Router::new()
        .route("/", get(csfs::list_csfs).post(csfs::create_csf))
        .route("/:id", get(csfs::get_csf).put(csfs::update_csf).delete(csfs::delete_csf))
        .route("/:id/kpis", get(csfs::list_linked_kpis).post(csfs::link_kpi))
        .route("/:id/kpis/:kpi_id", delete(csfs::unlink_kpi));

    let success_factor_routes = Router::new()
        .route("/", get(success_factors::list_success_factors).post(success_factors::create_success_factor))
        .route(
            "/:id",
            get(success_factors::get_success_factor)
                .put(success_factors::update_success_factor)
                .delete(success_factors::delete_success_factor),
        )
        .route("/:id/csfs", get(success_factors::list_linked_csfs).post(success_factors::link_csf))
        .route("/:id/csfs/:csf_id", delete(success_factors::unlink_csf));

    let indicator_routes = Router::new()
        .route("/", get(indicators::list_indicators).post(indicators::create_indicator))
        .route(
            "/:id",
            get(indicators::get_indicator)
                .put(indicators::update_indicator)
                .delete(indicators::delete_indicator),
        )
        .route("/:id/value", put(indicators::update_indicator_value))
        .route("/:id/children", get(indicators::list_children));

    Router::new()
        .route("/api/health", get(health::health))
        .nest("/auth", auth_routes)
        .nest("/departments", department_routes)
        .nest("/users", user_routes)
        .nest("/kpis", kpi_routes)
        .nest("/csfs", csf_routes)
        .nest("/success-factors", success_factor_routes)
        .nest("/indicators", indicator_routes)
        .route("/authz/:kind/:id", get(permissions::resource_permissions))
        .route("/dashboard", get(dashboard::dashboard))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}
