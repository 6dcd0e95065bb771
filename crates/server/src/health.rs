use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use courierbot_db::DbPool;
use serde::Serialize;
use tracing::{error, info};

#[derive(Clone)]
pub struct HealthState {
    db_pool: DbPool,
}

/// Session-store probe result. `open_sessions` counts drivers currently
/// mid-dialog; it doubles as proof the schema is migrated, since the
/// count query fails on a pool without the sessions table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StoreCheck {
    pub status: &'static str,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_sessions: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub store: StoreCheck,
    pub checked_at: String,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState { db_pool })
}

pub async fn spawn(bind_address: &str, port: u16, db_pool: DbPool) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(bind_address = %address, "health endpoint started");

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(db_pool)).await {
            error!(error = %error, "health endpoint server terminated unexpectedly");
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let store = store_check(&state.db_pool).await;
    let ready = store.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        store,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn store_check(pool: &DbPool) -> StoreCheck {
    match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM sessions").fetch_one(pool).await {
        Ok(count) => StoreCheck {
            status: "ready",
            detail: "session store reachable".to_string(),
            open_sessions: Some(count),
        },
        Err(error) => StoreCheck {
            status: "degraded",
            detail: format!("session store query failed: {error}"),
            open_sessions: None,
        },
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use courierbot_core::domain::{ReportKind, Session};
    use courierbot_db::{connect_with_settings, migrations, SessionRepository, SqlSessionRepository};

    use crate::health::{health, HealthState};

    #[tokio::test]
    async fn health_reports_ready_and_counts_open_sessions() {
        let pool = connect_with_settings("sqlite:file:health_ready?mode=memory&cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let repo = SqlSessionRepository::new(pool.clone());
        repo.put(1, &Session::start(ReportKind::Refusal)).await.expect("put");
        repo.put(2, &Session::start(ReportKind::Info)).await.expect("put");

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(payload.status, "ready");
        assert_eq!(payload.store.status, "ready");
        assert_eq!(payload.store.open_sessions, Some(2));

        pool.close().await;
    }

    #[tokio::test]
    async fn health_degrades_when_the_store_is_unavailable() {
        let pool = connect_with_settings("sqlite::memory:?cache=shared", 1, 5)
            .await
            .expect("pool should connect");
        pool.close().await;

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.status, "degraded");
        assert_eq!(payload.store.status, "degraded");
        assert_eq!(payload.store.open_sessions, None);
    }

    #[tokio::test]
    async fn an_unmigrated_pool_is_not_reported_ready() {
        let pool =
            connect_with_settings("sqlite:file:health_unmigrated?mode=memory&cache=shared", 1, 5)
                .await
                .expect("pool should connect");

        let (status, Json(payload)) = health(State(HealthState { db_pool: pool.clone() })).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(payload.store.open_sessions, None);

        pool.close().await;
    }
}
