use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use finboard_core::cache::{MemoryCache, ResultCache};
use finboard_core::config::Settings;
use finboard_core::dashboard::{
    is_deadline_exceeded, is_not_found, DashboardResult, DashboardService, SubjectKind,
};
use finboard_core::storage::PgRepository;
use finboard_core::time::{Clock, SystemClock};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();
    let pool: Option<PgPool> = match settings.require_database_url() {
        Ok(db_url) => match sqlx::postgres::PgPoolOptions::new()
            .max_connections(5)
            .connect(db_url)
            .await
        {
            Ok(pool) => match finboard_core::storage::migrate(&pool).await {
                Ok(()) => Some(pool),
                Err(e) => {
                    sentry_anyhow::capture_anyhow(&e);
                    tracing::error!(error = %e, "db migrations failed; starting API in degraded mode");
                    None
                }
            },
            Err(e) => {
                let err = anyhow::Error::new(e);
                sentry_anyhow::capture_anyhow(&err);
                tracing::error!(error = %err, "db connect failed; starting API in degraded mode");
                None
            }
        },
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "DATABASE_URL missing; starting API in degraded mode");
            None
        }
    };

    let clock: Arc<dyn Clock> = Arc::new(SystemClock::with_offset_hours(settings.utc_offset_hours)?);
    let state = AppState {
        dashboards: pool.map(|pool| Arc::new(dashboard_service(&settings, pool, clock))),
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/dashboards/:subject_type/:subject_id", get(get_dashboard))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], settings.port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn dashboard_service(settings: &Settings, pool: PgPool, clock: Arc<dyn Clock>) -> DashboardService {
    let repo = Arc::new(PgRepository::new(pool));
    let backend = Arc::new(MemoryCache::new(clock.clone(), settings.cache_max_entries));
    let mut cache = ResultCache::new(backend, settings.cache_ttl);
    if settings.single_flight {
        cache = cache.with_single_flight();
    }

    let service = DashboardService::new(repo.clone(), repo, cache, clock);
    match settings.deadline {
        Some(deadline) => service.with_deadline(deadline),
        None => service,
    }
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    dashboards: Option<Arc<DashboardService>>,
}

async fn get_dashboard(
    State(state): State<AppState>,
    Path((subject_type, subject_id)): Path<(String, String)>,
) -> Result<Json<DashboardResult>, StatusCode> {
    let Some(service) = &state.dashboards else {
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    };

    let kind: SubjectKind = subject_type.parse().map_err(|_| StatusCode::BAD_REQUEST)?;
    let subject_id = Uuid::parse_str(&subject_id).map_err(|_| StatusCode::BAD_REQUEST)?;

    let dashboard = service.dashboard(kind, subject_id).await.map_err(|e| {
        if is_not_found(&e) {
            StatusCode::NOT_FOUND
        } else if is_deadline_exceeded(&e) {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(kind = kind.as_str(), %subject_id, error = %e, "dashboard failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    })?;

    Ok(Json(dashboard))
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
