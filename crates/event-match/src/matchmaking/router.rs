use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{QuizKind, Registration, UserId, LIKERT_MAX, LIKERT_MIN};
use super::repository::{EventRepository, RepositoryError};
use super::service::{EventMatchService, ServiceError, WriteOutcome};

/// Body of both quiz submission endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizSubmission {
    pub answers: Vec<i64>,
}

#[derive(Debug, Serialize)]
struct QuizDefinition {
    kind: QuizKind,
    scale: [u8; 2],
    questions: &'static [&'static str],
}

/// Router builder exposing attendee and admin endpoints.
pub fn event_router<R>(service: Arc<EventMatchService<R>>) -> Router
where
    R: EventRepository + 'static,
{
    Router::new()
        .route("/api/v1/quizzes/:kind", get(quiz_definition_handler))
        .route("/api/v1/attendees", post(register_handler::<R>))
        .route(
            "/api/v1/attendees/:user_id/personality-quiz",
            post(personality_handler::<R>),
        )
        .route(
            "/api/v1/attendees/:user_id/attraction-quiz",
            post(attraction_handler::<R>),
        )
        .route(
            "/api/v1/attendees/:user_id/check-in",
            post(check_in_handler::<R>),
        )
        .route(
            "/api/v1/attendees/:user_id/dashboard",
            get(dashboard_handler::<R>),
        )
        .route("/api/v1/admin/matching/run", post(run_matching_handler::<R>))
        .route("/api/v1/admin/attendees", get(attendees_handler::<R>))
        .route(
            "/api/v1/admin/quizzes/personality",
            get(personality_list_handler::<R>),
        )
        .route(
            "/api/v1/admin/quizzes/attraction",
            get(attraction_list_handler::<R>),
        )
        .route("/api/v1/admin/matches", get(matches_handler::<R>))
        .route("/api/v1/admin/check-ins", get(check_ins_handler::<R>))
        .with_state(service)
}

pub(crate) async fn quiz_definition_handler(Path(kind): Path<String>) -> Response {
    match QuizKind::parse(&kind) {
        Some(kind) => {
            let definition = QuizDefinition {
                kind,
                scale: [LIKERT_MIN, LIKERT_MAX],
                questions: kind.questions(),
            };
            (StatusCode::OK, axum::Json(definition)).into_response()
        }
        None => {
            let payload = json!({
                "error": format!("unknown quiz `{kind}`"),
            });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn register_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
    axum::Json(registration): axum::Json<Registration>,
) -> Response
where
    R: EventRepository + 'static,
{
    match service.register(registration) {
        Ok(attendee) => (StatusCode::CREATED, axum::Json(attendee)).into_response(),
        Err(ServiceError::Repository(RepositoryError::Conflict)) => {
            let payload = json!({
                "error": "username already registered",
            });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => error_response(other),
    }
}

pub(crate) async fn personality_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
    Path(user_id): Path<u64>,
    axum::Json(submission): axum::Json<QuizSubmission>,
) -> Response
where
    R: EventRepository + 'static,
{
    match service.submit_personality_quiz(UserId(user_id), &submission.answers) {
        Ok(outcome) => write_response(outcome, "You've already taken the quiz!"),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn attraction_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
    Path(user_id): Path<u64>,
    axum::Json(submission): axum::Json<QuizSubmission>,
) -> Response
where
    R: EventRepository + 'static,
{
    match service.submit_attraction_quiz(UserId(user_id), &submission.answers) {
        Ok(outcome) => write_response(outcome, "You've already taken the attraction quiz!"),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn check_in_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
    Path(user_id): Path<u64>,
) -> Response
where
    R: EventRepository + 'static,
{
    match service.check_in(UserId(user_id)) {
        Ok(outcome) => write_response(outcome, "You're already checked in."),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn dashboard_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
    Path(user_id): Path<u64>,
) -> Response
where
    R: EventRepository + 'static,
{
    match service.dashboard(UserId(user_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn run_matching_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
) -> Response
where
    R: EventRepository + 'static,
{
    match service.run_matching() {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(other) => error_response(other),
    }
}

pub(crate) async fn attendees_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
) -> Response
where
    R: EventRepository + 'static,
{
    list_response(service.attendees())
}

pub(crate) async fn personality_list_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
) -> Response
where
    R: EventRepository + 'static,
{
    list_response(service.personality_quizzes())
}

pub(crate) async fn attraction_list_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
) -> Response
where
    R: EventRepository + 'static,
{
    list_response(service.attraction_quizzes())
}

pub(crate) async fn matches_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
) -> Response
where
    R: EventRepository + 'static,
{
    list_response(service.all_matches())
}

pub(crate) async fn check_ins_handler<R>(
    State(service): State<Arc<EventMatchService<R>>>,
) -> Response
where
    R: EventRepository + 'static,
{
    list_response(service.check_ins())
}

fn write_response<T: Serialize>(outcome: WriteOutcome<T>, notice: &str) -> Response {
    match outcome {
        WriteOutcome::Created(record) => (StatusCode::CREATED, axum::Json(record)).into_response(),
        WriteOutcome::Existing(record) => {
            let payload = json!({
                "notice": notice,
                "record": record,
            });
            (StatusCode::OK, axum::Json(payload)).into_response()
        }
    }
}

fn list_response<T: Serialize>(result: Result<Vec<T>, ServiceError>) -> Response {
    match result {
        Ok(items) => (StatusCode::OK, axum::Json(items)).into_response(),
        Err(other) => error_response(other),
    }
}

fn error_response(error: ServiceError) -> Response {
    let status = match &error {
        ServiceError::Validation(_)
        | ServiceError::Scoring(_)
        | ServiceError::InvalidRegistration(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ServiceError::UnknownAttendee(_) => StatusCode::NOT_FOUND,
        ServiceError::RecomputeInProgress => StatusCode::CONFLICT,
        ServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ServiceError::Matching(_) | ServiceError::Repository(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    let payload = json!({
        "error": error.to_string(),
    });
    (status, axum::Json(payload)).into_response()
}
