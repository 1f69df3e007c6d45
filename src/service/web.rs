//! The registration web server.
//!
//! `GET /event` renders the registration form for the event encoded in the
//! query string.  `POST /event` takes the form's JSON body and records the
//! attendee on the roster named by its `chatId` and `messageId`.

use askama::Template;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};

use crate::{
    base::{
        event::{EventMetadata, EventQuery},
        messages::USER_ERROR,
        submission::RegistrationSubmission,
        types::{Void, WorkflowError},
    },
    interaction::registration::RegistrationWorkflow,
};

/// The registration form.
#[derive(Template)]
#[template(path = "event.html")]
struct EventFormTemplate<'a> {
    event: &'a EventMetadata,
}

/// Builds the router for the registration endpoints.
pub fn router(workflow: RegistrationWorkflow) -> Router {
    Router::new().route("/event", get(event_form).post(submit_registration)).with_state(workflow)
}

/// Serves the registration endpoints until the process stops.
pub async fn serve(workflow: RegistrationWorkflow) -> Void {
    let addr = workflow.config.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Registration server listening on {} ...", addr);

    axum::serve(listener, router(workflow)).await?;

    Ok(())
}

#[instrument(skip_all)]
async fn event_form(Query(query): Query<EventQuery>) -> Response {
    let event = EventMetadata::from(query);

    match (EventFormTemplate { event: &event }).render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => {
            error!("Failed to render the registration form: {}", err);
            message_response(StatusCode::INTERNAL_SERVER_ERROR, USER_ERROR)
        }
    }
}

#[instrument(skip_all)]
async fn submit_registration(State(workflow): State<RegistrationWorkflow>, body: Bytes) -> Result<Json<Value>, WorkflowError> {
    let submission = RegistrationSubmission::from_json(&body)?;
    let outcome = workflow.submit_registration(&submission).await?;

    Ok(Json(json!({ "data": "ok", "name": outcome.name })))
}

fn message_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "message": message }))).into_response()
}

impl IntoResponse for WorkflowError {
    fn into_response(self) -> Response {
        match &self {
            WorkflowError::InvalidSubmission(message) | WorkflowError::MalformedEventTemplate(message) => {
                warn!("Rejected request: {}", message);
                message_response(StatusCode::BAD_REQUEST, message)
            }
            WorkflowError::EventClosed => message_response(StatusCode::NOT_FOUND, &self.to_string()),
            _ => {
                error!("Request failed: {}", self);
                message_response(StatusCode::INTERNAL_SERVER_ERROR, USER_ERROR)
            }
        }
    }
}
