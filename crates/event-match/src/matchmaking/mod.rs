//! Quiz intake, color classification, batch similarity matching, and check-ins.
//!
//! Submissions are scored before they are stored, so a stored quiz always carries the
//! weights and category derived from its answers. Matching is a full recompute over
//! every personality quiz and replaces the previous result set in one step.

pub mod domain;
pub mod import;
pub mod matching;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod store;

#[cfg(test)]
mod tests;

pub use domain::{
    AnswerValidationError, Attendee, AttractionQuizRecord, CategoryWeights, CheckIn, MatchResult,
    MatchRun, PersonalityQuizRecord, QuizAnswers, QuizKind, Registration, UserId, LIKERT_MAX,
    LIKERT_MIN,
};
pub use import::{
    export_matches, parse_quiz_csv, ImportError, ImportReport, ImportRow, RejectedRow,
};
pub use matching::{
    max_similarity, similarity, MatchComputation, MatchingEngine, MatchingError, Participant,
    DEFAULT_MATCH_LIMIT,
};
pub use repository::{
    AttendeeRepository, CheckInRepository, EventRepository, MatchRepository, QuizRepository,
    RecomputeLock, RepositoryError,
};
pub use router::event_router;
pub use scoring::{
    attraction_preferences, calculate_weighted_averages, classify_category, ReferenceCategory,
    ScoringError, REFERENCE_CATEGORIES,
};
pub use service::{
    AttractionSummary, DashboardView, EventMatchService, MatchStatusView, MatchingReport,
    PersonalitySummary, ServiceError, UserMatchCount, WriteOutcome,
};
pub use store::{EventSnapshot, EventStore};
