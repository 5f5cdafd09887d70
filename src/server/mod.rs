use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::Local;
use log::{debug, error, info};
use tokio::net::TcpListener;

use crate::dashboard::{self, Dashboard};
use crate::data::configuration::{Configuration, DashboardConfig, RecorderConfig};
use crate::data::dbconnector::SQLConnector;
use crate::data::store::{EntityStore, NewHousehold, SortSpec};
use crate::entity::{collections, households, wards};
use crate::error::RecorderError;
use crate::recorder::{CollectionRecorder, CollectionSubmission};
use crate::registry::{self, Registration, ResidentSummary};

pub(crate) mod types;
use types::{
    ListHouseholdsQuery, QrCodeResponse, ReconcileResponse, RecordCollectionResponse, SortQuery,
    WardCensusResponse,
};

#[derive(Clone)]
pub struct ServerConfig {
    pub database_connection: Arc<SQLConnector>,
    pub recorder: RecorderConfig,
    pub dashboard: DashboardConfig,
}

impl ServerConfig {
    pub fn new(config: &Configuration, database_connection: SQLConnector) -> Self {
        ServerConfig {
            database_connection: Arc::new(database_connection),
            recorder: config.recorder.clone(),
            dashboard: config.dashboard.clone(),
        }
    }

    fn recorder(&self) -> CollectionRecorder<'_, SQLConnector> {
        CollectionRecorder::new(self.database_connection.as_ref(), &self.recorder)
    }
}

pub fn router(state: ServerConfig) -> Router {
    Router::new()
        .route("/households", get(list_households).post(create_household))
        .route("/households/qr-code", get(new_qr_code))
        .route("/households/{qr}", get(get_household))
        .route("/households/{qr}/collections", post(record_collection))
        .route("/households/{qr}/reconcile", post(reconcile_household))
        .route("/collections", get(list_collections))
        .route("/dashboard", get(get_dashboard))
        .route("/wards", get(list_wards))
        .route("/wards/{ward_number}/reconcile", post(reconcile_ward))
        .with_state(state)
}

pub async fn run(config: Configuration, database_connection: SQLConnector, port: u16) -> anyhow::Result<()> {
    debug!("Starting server on port {}", port);

    let app = router(ServerConfig::new(&config, database_connection));

    let listener = TcpListener::bind(format!("0.0.0.0:{port}")).await?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {e}");
        std::future::pending::<()>().await;
    }
    info!("Received Ctrl+C, shutting down");
}

fn sort_param(sort: Option<&str>) -> Result<Option<SortSpec>, RecorderError> {
    match sort.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Ok(Some(raw.parse()?)),
        None => Ok(None),
    }
}

async fn list_households(
    State(state): State<ServerConfig>,
    Query(query): Query<ListHouseholdsQuery>,
) -> Result<Json<Vec<households::Model>>, RecorderError> {
    let store = state.database_connection.as_ref();
    if let Some(term) = query.q.as_deref() {
        return Ok(Json(registry::search(store, term).await?));
    }
    let sort = sort_param(query.sort.as_deref())?;
    Ok(Json(store.list_households(sort.as_ref()).await?))
}

async fn create_household(
    State(state): State<ServerConfig>,
    Json(payload): Json<NewHousehold>,
) -> Result<(StatusCode, Json<Registration>), RecorderError> {
    let registration =
        registry::register_household(state.database_connection.as_ref(), payload).await?;
    let status = match registration {
        Registration::Created(_) => StatusCode::CREATED,
        Registration::Existing(_) => StatusCode::OK,
    };
    Ok((status, Json(registration)))
}

async fn new_qr_code() -> Json<QrCodeResponse> {
    Json(QrCodeResponse {
        qr_code: registry::generate_qr_code(),
    })
}

async fn get_household(
    State(state): State<ServerConfig>,
    Path(qr): Path<String>,
) -> Result<Json<ResidentSummary>, RecorderError> {
    let summary = registry::resident_summary(
        state.database_connection.as_ref(),
        &qr,
        &state.dashboard,
        Local::now().date_naive(),
        &Local,
    )
    .await?;
    Ok(Json(summary))
}

async fn record_collection(
    State(state): State<ServerConfig>,
    Path(qr): Path<String>,
    Json(payload): Json<CollectionSubmission>,
) -> Result<(StatusCode, Json<RecordCollectionResponse>), RecorderError> {
    let collection = state.recorder().record_for_qr(&qr, payload).await?;
    let household = registry::find_by_qr(state.database_connection.as_ref(), &qr).await?;
    Ok((
        StatusCode::CREATED,
        Json(RecordCollectionResponse {
            collection,
            household,
        }),
    ))
}

async fn reconcile_household(
    State(state): State<ServerConfig>,
    Path(qr): Path<String>,
) -> Result<Json<ReconcileResponse>, RecorderError> {
    let reconciliation = state.recorder().reconcile_household(&qr).await?;
    let changed = reconciliation.changed();
    Ok(Json(ReconcileResponse {
        household: reconciliation.household,
        previous: reconciliation.previous,
        current: reconciliation.current,
        changed,
    }))
}

async fn list_collections(
    State(state): State<ServerConfig>,
    Query(query): Query<SortQuery>,
) -> Result<Json<Vec<collections::Model>>, RecorderError> {
    let sort = sort_param(query.sort.as_deref())?;
    Ok(Json(
        state
            .database_connection
            .list_collections(sort.as_ref())
            .await?,
    ))
}

async fn get_dashboard(State(state): State<ServerConfig>) -> Result<Json<Dashboard>, RecorderError> {
    let dashboard = dashboard::load_dashboard(
        state.database_connection.as_ref(),
        &state.dashboard,
        Local::now().date_naive(),
        &Local,
    )
    .await?;
    Ok(Json(dashboard))
}

async fn list_wards(
    State(state): State<ServerConfig>,
    Query(query): Query<SortQuery>,
) -> Result<Json<Vec<wards::Model>>, RecorderError> {
    let sort = sort_param(query.sort.as_deref())?;
    Ok(Json(state.database_connection.list_wards(sort.as_ref()).await?))
}

async fn reconcile_ward(
    State(state): State<ServerConfig>,
    Path(ward_number): Path<String>,
) -> Result<Json<WardCensusResponse>, RecorderError> {
    let census = state.recorder().reconcile_ward(&ward_number).await?;
    let changed = census.changed();
    Ok(Json(WardCensusResponse {
        ward: census.ward,
        previous_total: census.previous_total,
        changed,
    }))
}
