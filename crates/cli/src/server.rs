//! HTTP binding over the session registry.
//!
//! | Method | Path                       | Operation        |
//! |--------|----------------------------|------------------|
//! | GET    | /sessions                  | list sessions    |
//! | POST   | /sessions                  | create session   |
//! | GET    | /sessions/{id}             | get session      |
//! | GET    | /sessions/{id}/challenge   | pending challenge|
//! | GET    | /sessions/{id}/qr          | challenge as SVG |
//! | POST   | /sessions/{id}/reset       | reset session    |
//! | POST   | /messages/send             | send a payload   |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use hub::protocol::{ChallengeRef, Payload, SessionSummary};
use hub::{CHALLENGE_CONTENT_TYPE, SessionRegistry};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

type ApiResult<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
	pub session: String,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
	pub session: String,
	pub to: String,
	pub payload: Payload,
}

#[derive(Debug, Serialize)]
pub struct SessionList {
	pub sessions: Vec<SessionSummary>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
	pub session: String,
	pub result: Value,
}

pub fn router(registry: Arc<SessionRegistry>) -> Router {
	Router::new()
		.route("/sessions", get(list_sessions).post(create_session))
		.route("/sessions/{id}", get(get_session))
		.route("/sessions/{id}/challenge", get(get_challenge))
		.route("/sessions/{id}/qr", get(get_challenge_image))
		.route("/sessions/{id}/reset", post(reset_session))
		.route("/messages/send", post(send_message))
		.with_state(registry)
}

async fn list_sessions(State(registry): State<Arc<SessionRegistry>>) -> Json<SessionList> {
	let sessions = registry.list().iter().map(|session| session.summary()).collect();
	Json(SessionList { sessions })
}

async fn create_session(
	State(registry): State<Arc<SessionRegistry>>,
	Json(request): Json<CreateSessionRequest>,
) -> ApiResult<Json<SessionSummary>> {
	let session = registry.create(&request.session).await?;
	Ok(Json(session.summary()))
}

async fn get_session(
	State(registry): State<Arc<SessionRegistry>>,
	Path(id): Path<String>,
) -> ApiResult<Json<SessionSummary>> {
	Ok(Json(registry.get(&id)?.summary()))
}

async fn get_challenge(
	State(registry): State<Arc<SessionRegistry>>,
	Path(id): Path<String>,
) -> ApiResult<Json<ChallengeRef>> {
	Ok(Json(registry.challenge(&id)?))
}

async fn get_challenge_image(
	State(registry): State<Arc<SessionRegistry>>,
	Path(id): Path<String>,
) -> ApiResult<impl IntoResponse> {
	let image = registry.challenge_image(&id)?;
	Ok((
		[
			(header::CONTENT_TYPE, CHALLENGE_CONTENT_TYPE),
			(header::CACHE_CONTROL, "no-store"),
		],
		image,
	))
}

async fn reset_session(
	State(registry): State<Arc<SessionRegistry>>,
	Path(id): Path<String>,
) -> ApiResult<Json<SessionSummary>> {
	let session = registry.reset(&id).await?;
	Ok(Json(session.summary()))
}

async fn send_message(
	State(registry): State<Arc<SessionRegistry>>,
	Json(request): Json<SendRequest>,
) -> ApiResult<Json<SendResponse>> {
	let result = registry.send(&request.session, &request.to, &request.payload).await?;
	Ok(Json(SendResponse {
		session: request.session,
		result,
	}))
}
