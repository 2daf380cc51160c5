use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::Mutex;

use super::request::{CommanderQuery, MirrorQuery, TailQuery};
use super::RelayError;
use crate::client::RelayClient;
use crate::logtail;
use crate::serial::{QueryOutcome, SerialInterface};

pub const WELCOME: &str = "Lab instrument relay is running.";

/// Response header telling a reply apart from an empty reply or a read timeout.
pub const OUTCOME_HEADER: &str = "x-relay-outcome";

/// The relay's one serial channel. The lock spans a full write-then-read cycle.
pub type SharedChannel = Arc<Mutex<SerialInterface>>;

pub fn welcome_routes() -> Router {
    Router::new().route("/", get(welcome))
}

pub fn commander_routes(channel: SharedChannel) -> Router {
    Router::new()
        .route("/commander", get(commander))
        .with_state(channel)
}

pub fn tail_routes(log_path: Arc<PathBuf>) -> Router {
    Router::new()
        .route("/getvoltage", get(get_voltage))
        .with_state(log_path)
}

pub fn mirror_routes(client: Arc<RelayClient>) -> Router {
    Router::new()
        .route("/flipmirror/state", get(flip_mirror))
        .with_state(client)
}

async fn welcome() -> &'static str {
    WELCOME
}

async fn commander(
    State(channel): State<SharedChannel>,
    Query(query): Query<CommanderQuery>,
) -> Result<Response, RelayError> {
    let cmd = query.into_command()?;
    let outcome = exchange(channel, cmd).await?;
    let label = outcome.label();
    Ok(([(OUTCOME_HEADER, label)], outcome.into_text()).into_response())
}

/// Run one query with the channel locked for the whole exchange.
async fn exchange(channel: SharedChannel, cmd: String) -> Result<QueryOutcome, RelayError> {
    let mut guard = channel.lock_owned().await;
    tokio::task::spawn_blocking(move || guard.query(&cmd))
        .await
        .map_err(|e| RelayError::Internal(format!("serial worker failed: {}", e)))?
        .map_err(RelayError::from)
}

async fn get_voltage(
    State(log_path): State<Arc<PathBuf>>,
    Query(query): Query<TailQuery>,
) -> Result<String, RelayError> {
    let request = query.validate()?;
    Ok(logtail::tail_file(&log_path, &request).await?)
}

async fn flip_mirror(
    State(client): State<Arc<RelayClient>>,
    Query(query): Query<MirrorQuery>,
) -> String {
    client.flip(query.state.as_deref().unwrap_or_default()).await
}
