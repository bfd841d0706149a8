use std::sync::Arc;

use axum::response::Response;
use axum::Router;
use serde_json::Value;

use crate::matchmaking::domain::{
    Attendee, AttractionQuizRecord, CheckIn, MatchResult, MatchRun, PersonalityQuizRecord,
    Registration, UserId,
};
use crate::matchmaking::repository::{
    AttendeeRepository, CheckInRepository, MatchRepository, QuizRepository, RecomputeLock,
    RepositoryError,
};
use crate::matchmaking::{event_router, EventMatchService, EventStore, MatchingEngine};

pub(super) fn build_service() -> (EventMatchService<EventStore>, Arc<EventStore>) {
    let store = Arc::new(EventStore::in_memory());
    let service = EventMatchService::new(store.clone(), MatchingEngine::default());
    (service, store)
}

pub(super) fn router_with_service(service: EventMatchService<EventStore>) -> Router {
    event_router(Arc::new(service))
}

pub(super) fn registration(username: &str) -> Registration {
    Registration {
        username: username.to_string(),
        display_name: None,
    }
}

pub(super) fn register<R>(service: &EventMatchService<R>, username: &str) -> UserId
where
    R: crate::matchmaking::EventRepository + 'static,
{
    service
        .register(registration(username))
        .expect("registration succeeds")
        .id
}

/// Registers `username` and submits `answers` as their personality quiz.
pub(super) fn quizzed<R>(
    service: &EventMatchService<R>,
    username: &str,
    answers: [i64; 9],
) -> UserId
where
    R: crate::matchmaking::EventRepository + 'static,
{
    let id = register(service, username);
    service
        .submit_personality_quiz(id, &answers)
        .expect("quiz accepted");
    id
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn json_request(
    method: &str,
    uri: &str,
    body: Value,
) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(
            serde_json::to_vec(&body).expect("serialize body"),
        ))
        .expect("request builds")
}

pub(super) fn empty_request(method: &str, uri: &str) -> axum::http::Request<axum::body::Body> {
    axum::http::Request::builder()
        .method(method)
        .uri(uri)
        .body(axum::body::Body::empty())
        .expect("request builds")
}

/// Every call fails as if the backing file were unreachable.
#[derive(Debug, Default)]
pub(super) struct UnavailableRepository;

fn unavailable<T>() -> Result<T, RepositoryError> {
    Err(RepositoryError::Unavailable("storage offline".to_string()))
}

impl AttendeeRepository for UnavailableRepository {
    fn register(&self, _registration: Registration) -> Result<Attendee, RepositoryError> {
        unavailable()
    }

    fn attendee(&self, _id: UserId) -> Result<Option<Attendee>, RepositoryError> {
        unavailable()
    }

    fn attendee_by_username(&self, _username: &str) -> Result<Option<Attendee>, RepositoryError> {
        unavailable()
    }

    fn attendees(&self) -> Result<Vec<Attendee>, RepositoryError> {
        unavailable()
    }
}

impl QuizRepository for UnavailableRepository {
    fn insert_personality(
        &self,
        _record: PersonalityQuizRecord,
    ) -> Result<PersonalityQuizRecord, RepositoryError> {
        unavailable()
    }

    fn personality(&self, _user: UserId) -> Result<Option<PersonalityQuizRecord>, RepositoryError> {
        unavailable()
    }

    fn personality_quizzes(&self) -> Result<Vec<PersonalityQuizRecord>, RepositoryError> {
        unavailable()
    }

    fn insert_attraction(
        &self,
        _record: AttractionQuizRecord,
    ) -> Result<AttractionQuizRecord, RepositoryError> {
        unavailable()
    }

    fn attraction(&self, _user: UserId) -> Result<Option<AttractionQuizRecord>, RepositoryError> {
        unavailable()
    }

    fn attraction_quizzes(&self) -> Result<Vec<AttractionQuizRecord>, RepositoryError> {
        unavailable()
    }
}

impl MatchRepository for UnavailableRepository {
    fn replace_matches(
        &self,
        _results: Vec<MatchResult>,
        _run: MatchRun,
    ) -> Result<(), RepositoryError> {
        unavailable()
    }

    fn matches_for(&self, _user: UserId) -> Result<Vec<MatchResult>, RepositoryError> {
        unavailable()
    }

    fn all_matches(&self) -> Result<Vec<MatchResult>, RepositoryError> {
        unavailable()
    }

    fn last_match_run(&self) -> Result<Option<MatchRun>, RepositoryError> {
        unavailable()
    }
}

impl CheckInRepository for UnavailableRepository {
    fn insert_check_in(&self, _check_in: CheckIn) -> Result<CheckIn, RepositoryError> {
        unavailable()
    }

    fn check_in(&self, _user: UserId) -> Result<Option<CheckIn>, RepositoryError> {
        unavailable()
    }

    fn check_ins(&self) -> Result<Vec<CheckIn>, RepositoryError> {
        unavailable()
    }
}

/// In-memory store whose recompute lock is always held by someone else.
#[derive(Debug, Default)]
pub(super) struct BusyStore {
    pub(super) inner: EventStore,
}

impl AttendeeRepository for BusyStore {
    fn register(&self, registration: Registration) -> Result<Attendee, RepositoryError> {
        self.inner.register(registration)
    }

    fn attendee(&self, id: UserId) -> Result<Option<Attendee>, RepositoryError> {
        self.inner.attendee(id)
    }

    fn attendee_by_username(&self, username: &str) -> Result<Option<Attendee>, RepositoryError> {
        self.inner.attendee_by_username(username)
    }

    fn attendees(&self) -> Result<Vec<Attendee>, RepositoryError> {
        self.inner.attendees()
    }
}

impl QuizRepository for BusyStore {
    fn insert_personality(
        &self,
        record: PersonalityQuizRecord,
    ) -> Result<PersonalityQuizRecord, RepositoryError> {
        self.inner.insert_personality(record)
    }

    fn personality(&self, user: UserId) -> Result<Option<PersonalityQuizRecord>, RepositoryError> {
        self.inner.personality(user)
    }

    fn personality_quizzes(&self) -> Result<Vec<PersonalityQuizRecord>, RepositoryError> {
        self.inner.personality_quizzes()
    }

    fn insert_attraction(
        &self,
        record: AttractionQuizRecord,
    ) -> Result<AttractionQuizRecord, RepositoryError> {
        self.inner.insert_attraction(record)
    }

    fn attraction(&self, user: UserId) -> Result<Option<AttractionQuizRecord>, RepositoryError> {
        self.inner.attraction(user)
    }

    fn attraction_quizzes(&self) -> Result<Vec<AttractionQuizRecord>, RepositoryError> {
        self.inner.attraction_quizzes()
    }
}

impl MatchRepository for BusyStore {
    fn replace_matches(
        &self,
        results: Vec<MatchResult>,
        run: MatchRun,
    ) -> Result<(), RepositoryError> {
        self.inner.replace_matches(results, run)
    }

    fn matches_for(&self, user: UserId) -> Result<Vec<MatchResult>, RepositoryError> {
        self.inner.matches_for(user)
    }

    fn all_matches(&self) -> Result<Vec<MatchResult>, RepositoryError> {
        self.inner.all_matches()
    }

    fn last_match_run(&self) -> Result<Option<MatchRun>, RepositoryError> {
        self.inner.last_match_run()
    }

    fn recompute_lock(&self) -> Result<RecomputeLock, RepositoryError> {
        Err(RepositoryError::Locked("matches.lock".into()))
    }
}

impl CheckInRepository for BusyStore {
    fn insert_check_in(&self, check_in: CheckIn) -> Result<CheckIn, RepositoryError> {
        self.inner.insert_check_in(check_in)
    }

    fn check_in(&self, user: UserId) -> Result<Option<CheckIn>, RepositoryError> {
        self.inner.check_in(user)
    }

    fn check_ins(&self) -> Result<Vec<CheckIn>, RepositoryError> {
        self.inner.check_ins()
    }
}
