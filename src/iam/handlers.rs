use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde_json::json;
use tracing::{instrument, warn};

use crate::db::SignupTarget;
use crate::iam::dto::SignupRequest;
use crate::state::AppState;

const BODY_INSTRUCTION: &str =
    "POST request must contain 'db_flavour' (sqlite or postgresql) and 'signup_payload'";

pub fn signup_routes() -> Router<AppState> {
    Router::new().route("/signup", post(signup).get(signup_unavailable))
}

/// POST /signup. A body that does not carry the two required keys gets the
/// fixed instructional message; anything past that point is answered 201
/// with the service outcome, rejections included.
#[instrument(skip(state, body))]
pub async fn signup(State(state): State<AppState>, body: String) -> Response {
    let request: SignupRequest = match serde_json::from_str(&body) {
        Ok(request) => request,
        Err(err) => {
            warn!(error = %err, "malformed signup body");
            return (
                StatusCode::FORBIDDEN,
                Json(json!({ "message": BODY_INSTRUCTION })),
            )
                .into_response();
        }
    };

    let outcome = state
        .service
        .signup(
            &request.db_flavour,
            request.signup_payload,
            &SignupTarget::default(),
        )
        .await;

    (StatusCode::CREATED, Json(outcome)).into_response()
}

pub async fn signup_unavailable() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}
