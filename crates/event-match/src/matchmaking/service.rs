use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::domain::{
    AnswerValidationError, Attendee, AttractionQuizRecord, CategoryWeights, CheckIn, MatchResult,
    MatchRun, PersonalityQuizRecord, QuizAnswers, QuizKind, Registration, UserId,
};
use super::import::{ImportReport, ImportRow, RejectedRow};
use super::matching::{max_similarity, MatchingEngine, MatchingError, Participant};
use super::repository::{EventRepository, RepositoryError};
use super::scoring::ScoringError;

/// Result of an idempotent write: either freshly created or the record already on file.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
    Created(T),
    Existing(T),
}

impl<T> WriteOutcome<T> {
    pub fn is_created(&self) -> bool {
        matches!(self, WriteOutcome::Created(_))
    }

    pub fn record(&self) -> &T {
        match self {
            WriteOutcome::Created(record) | WriteOutcome::Existing(record) => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            WriteOutcome::Created(record) | WriteOutcome::Existing(record) => record,
        }
    }
}

/// Outcome of a batch recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MatchingReport {
    Completed {
        users_matched: usize,
        results_written: usize,
        per_user: Vec<UserMatchCount>,
    },
    Skipped {
        participants: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserMatchCount {
    pub user_id: UserId,
    pub username: String,
    pub matches: usize,
}

/// Personality section of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalitySummary {
    pub category: String,
    pub description: Option<&'static str>,
    pub weights: CategoryWeights,
}

/// Attraction section of the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttractionSummary {
    pub most_attracted_category: String,
    pub preferences: CategoryWeights,
}

/// One ranked match with the matched attendee's presence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchStatusView {
    pub rank: u8,
    pub user_id: UserId,
    pub display_name: String,
    pub score: u32,
    pub max_score: u32,
    pub is_checked_in: bool,
    pub category: Option<String>,
    pub fits_attraction: Option<bool>,
}

/// Everything the attendee dashboard renders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub user_id: UserId,
    pub username: String,
    pub display_name: String,
    pub has_quiz: bool,
    pub has_attraction_quiz: bool,
    pub personality: Option<PersonalitySummary>,
    pub attraction: Option<AttractionSummary>,
    pub checked_in: bool,
    pub has_matches: bool,
    pub matches: Vec<MatchStatusView>,
}

/// Facade composing validation, derive-on-write scoring, and the batch matcher.
pub struct EventMatchService<R> {
    repository: Arc<R>,
    engine: MatchingEngine,
    recompute: Mutex<()>,
}

impl<R> EventMatchService<R>
where
    R: EventRepository + 'static,
{
    pub fn new(repository: Arc<R>, engine: MatchingEngine) -> Self {
        Self {
            repository,
            engine,
            recompute: Mutex::new(()),
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn register(&self, registration: Registration) -> Result<Attendee, ServiceError> {
        let username = registration.username.trim().to_string();
        if username.is_empty() {
            return Err(ServiceError::InvalidRegistration(
                "username must not be empty".to_string(),
            ));
        }
        if username.chars().any(char::is_whitespace) {
            return Err(ServiceError::InvalidRegistration(
                "username must not contain whitespace".to_string(),
            ));
        }
        let display_name = registration
            .display_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let attendee = self.repository.register(Registration {
            username,
            display_name,
        })?;
        info!(user_id = %attendee.id, username = %attendee.username, "attendee registered");
        Ok(attendee)
    }

    /// Submit the personality quiz once. Later attempts return the stored record untouched.
    pub fn submit_personality_quiz(
        &self,
        user: UserId,
        answers: &[i64],
    ) -> Result<WriteOutcome<PersonalityQuizRecord>, ServiceError> {
        self.require_attendee(user)?;

        if let Some(existing) = self.repository.personality(user)? {
            info!(user_id = %user, "personality quiz already submitted");
            return Ok(WriteOutcome::Existing(existing));
        }

        let answers = QuizAnswers::new(QuizKind::Personality, answers)?;
        let record = PersonalityQuizRecord::new(user, answers, Utc::now())?;
        debug!(
            user_id = %user,
            weights = ?record.calculated_weights,
            category = %record.category_classification,
            "personality quiz scored"
        );

        match self.repository.insert_personality(record) {
            Ok(stored) => {
                info!(
                    user_id = %user,
                    category = %stored.category_classification,
                    "personality quiz saved"
                );
                Ok(WriteOutcome::Created(stored))
            }
            Err(RepositoryError::Conflict) => self
                .repository
                .personality(user)?
                .map(WriteOutcome::Existing)
                .ok_or(ServiceError::Repository(RepositoryError::Conflict)),
            Err(other) => Err(other.into()),
        }
    }

    /// Submit the attraction quiz once. Later attempts return the stored record untouched.
    pub fn submit_attraction_quiz(
        &self,
        user: UserId,
        answers: &[i64],
    ) -> Result<WriteOutcome<AttractionQuizRecord>, ServiceError> {
        self.require_attendee(user)?;

        if let Some(existing) = self.repository.attraction(user)? {
            info!(user_id = %user, "attraction quiz already submitted");
            return Ok(WriteOutcome::Existing(existing));
        }

        let answers = QuizAnswers::new(QuizKind::Attraction, answers)?;
        let record = AttractionQuizRecord::new(user, answers, Utc::now())?;
        debug!(
            user_id = %user,
            preferences = ?record.preferences,
            category = %record.most_attracted_category,
            "attraction quiz scored"
        );

        match self.repository.insert_attraction(record) {
            Ok(stored) => {
                info!(
                    user_id = %user,
                    category = %stored.most_attracted_category,
                    "attraction quiz saved"
                );
                Ok(WriteOutcome::Created(stored))
            }
            Err(RepositoryError::Conflict) => self
                .repository
                .attraction(user)?
                .map(WriteOutcome::Existing)
                .ok_or(ServiceError::Repository(RepositoryError::Conflict)),
            Err(other) => Err(other.into()),
        }
    }

    pub fn submit_quiz(
        &self,
        kind: QuizKind,
        user: UserId,
        answers: &[i64],
    ) -> Result<bool, ServiceError> {
        match kind {
            QuizKind::Personality => self
                .submit_personality_quiz(user, answers)
                .map(|outcome| outcome.is_created()),
            QuizKind::Attraction => self
                .submit_attraction_quiz(user, answers)
                .map(|outcome| outcome.is_created()),
        }
    }

    /// Bulk-load quiz rows, registering usernames that are not yet known.
    ///
    /// Rows with invalid answers are rejected individually; storage failures abort.
    pub fn import_quizzes(
        &self,
        kind: QuizKind,
        rows: Vec<ImportRow>,
    ) -> Result<ImportReport, ServiceError> {
        let mut report = ImportReport::default();

        for row in rows {
            if let Err(err) = QuizAnswers::new(kind, &row.answers) {
                report.rejected.push(RejectedRow {
                    line: row.line,
                    username: Some(row.username),
                    reason: err.to_string(),
                });
                continue;
            }

            let attendee = match self.repository.attendee_by_username(&row.username)? {
                Some(attendee) => attendee,
                None => {
                    let attendee = self.register(Registration {
                        username: row.username.clone(),
                        display_name: None,
                    });
                    match attendee {
                        Ok(attendee) => {
                            report.registered.push(attendee.username.clone());
                            attendee
                        }
                        Err(ServiceError::InvalidRegistration(reason)) => {
                            report.rejected.push(RejectedRow {
                                line: row.line,
                                username: Some(row.username),
                                reason,
                            });
                            continue;
                        }
                        Err(other) => return Err(other),
                    }
                }
            };

            match self.submit_quiz(kind, attendee.id, &row.answers) {
                Ok(true) => report.imported += 1,
                Ok(false) => report.skipped_existing.push(attendee.username),
                Err(err @ (ServiceError::Validation(_) | ServiceError::Scoring(_))) => {
                    report.rejected.push(RejectedRow {
                        line: row.line,
                        username: Some(attendee.username),
                        reason: err.to_string(),
                    });
                }
                Err(other) => return Err(other),
            }
        }

        info!(
            kind = %kind,
            imported = report.imported,
            registered = report.registered.len(),
            skipped = report.skipped_existing.len(),
            rejected = report.rejected.len(),
            "quiz import finished"
        );
        Ok(report)
    }

    pub fn check_in(&self, user: UserId) -> Result<WriteOutcome<CheckIn>, ServiceError> {
        self.require_attendee(user)?;

        if let Some(existing) = self.repository.check_in(user)? {
            return Ok(WriteOutcome::Existing(existing));
        }

        let check_in = CheckIn {
            user_id: user,
            checked_in_at: Utc::now(),
        };
        match self.repository.insert_check_in(check_in) {
            Ok(stored) => {
                info!(user_id = %user, "attendee checked in");
                Ok(WriteOutcome::Created(stored))
            }
            Err(RepositoryError::Conflict) => self
                .repository
                .check_in(user)?
                .map(WriteOutcome::Existing)
                .ok_or(ServiceError::Repository(RepositoryError::Conflict)),
            Err(other) => Err(other.into()),
        }
    }

    /// Recompute every attendee's match list from scratch.
    ///
    /// Only one recompute runs at a time. With fewer than two personality quizzes the
    /// run is skipped and the stored results stay as they are.
    pub fn run_matching(&self) -> Result<MatchingReport, ServiceError> {
        let _running = match self.recompute.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return Err(ServiceError::RecomputeInProgress),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        let _lock = match self.repository.recompute_lock() {
            Ok(lock) => lock,
            Err(RepositoryError::Locked(path)) => {
                warn!(lock = %path.display(), "match recompute already running elsewhere");
                return Err(ServiceError::RecomputeInProgress);
            }
            Err(other) => return Err(other.into()),
        };

        let quizzes = self.repository.personality_quizzes()?;
        let participants: Vec<Participant<'_>> = quizzes
            .iter()
            .map(|quiz| Participant {
                user_id: quiz.user_id,
                answers: quiz.answers.as_slice(),
            })
            .collect();

        let computation = match self.engine.compute(&participants) {
            Ok(computation) => computation,
            Err(MatchingError::NotEnoughParticipants { found }) => {
                warn!(
                    participants = found,
                    "not enough quiz responses (need at least 2 users); no matches computed"
                );
                return Ok(MatchingReport::Skipped {
                    participants: found,
                });
            }
            Err(other) => return Err(other.into()),
        };

        let users_matched = computation.users_matched();
        let results_written = computation.results.len();
        let run = MatchRun {
            completed_at: Utc::now(),
            users_matched,
            results_written,
        };
        self.repository.replace_matches(computation.results, run)?;

        let usernames = self.usernames()?;
        let per_user = computation
            .per_user
            .into_iter()
            .map(|(user_id, matches)| UserMatchCount {
                user_id,
                username: usernames
                    .get(&user_id)
                    .cloned()
                    .unwrap_or_else(|| format!("user-{user_id}")),
                matches,
            })
            .collect();

        info!(users_matched, results_written, "matching complete");
        Ok(MatchingReport::Completed {
            users_matched,
            results_written,
            per_user,
        })
    }

    pub fn dashboard(&self, user: UserId) -> Result<DashboardView, ServiceError> {
        let attendee = self.require_attendee(user)?;
        let personality = self.repository.personality(user)?;
        let attraction = self.repository.attraction(user)?;
        let checked_in = self.repository.check_in(user)?.is_some();

        let attracted_to = attraction
            .as_ref()
            .map(|record| record.most_attracted_category.clone());
        let max_score = max_similarity(QuizKind::Personality.answer_count());

        let mut matches = Vec::new();
        for result in self.repository.matches_for(user)?.into_iter().take(self.engine.limit()) {
            matches.push(self.match_status(&result, attracted_to.as_deref(), max_score)?);
        }

        Ok(DashboardView {
            user_id: attendee.id,
            username: attendee.username.clone(),
            display_name: attendee.label().to_string(),
            has_quiz: personality.is_some(),
            has_attraction_quiz: attraction.is_some(),
            personality: personality.map(|record| PersonalitySummary {
                description: record.category().map(|category| category.description),
                category: record.category_classification,
                weights: record.calculated_weights,
            }),
            attraction: attraction.map(|record| AttractionSummary {
                most_attracted_category: record.most_attracted_category,
                preferences: record.preferences,
            }),
            checked_in,
            has_matches: !matches.is_empty(),
            matches,
        })
    }

    fn match_status(
        &self,
        result: &MatchResult,
        attracted_to: Option<&str>,
        max_score: u32,
    ) -> Result<MatchStatusView, ServiceError> {
        let matched = self.repository.attendee(result.matched_user_id)?;
        let category = self
            .repository
            .personality(result.matched_user_id)?
            .map(|record| record.category_classification);
        let fits_attraction = match (attracted_to, category.as_deref()) {
            (Some(wanted), Some(actual)) => Some(wanted == actual),
            _ => None,
        };

        Ok(MatchStatusView {
            rank: result.rank,
            user_id: result.matched_user_id,
            display_name: matched
                .as_ref()
                .map(|attendee| attendee.label().to_string())
                .unwrap_or_else(|| format!("user-{}", result.matched_user_id)),
            score: result.score,
            max_score,
            is_checked_in: self.repository.check_in(result.matched_user_id)?.is_some(),
            category,
            fits_attraction,
        })
    }

    pub fn attendee(&self, user: UserId) -> Result<Attendee, ServiceError> {
        self.require_attendee(user)
    }

    pub fn attendee_by_username(&self, username: &str) -> Result<Option<Attendee>, ServiceError> {
        Ok(self.repository.attendee_by_username(username)?)
    }

    pub fn attendees(&self) -> Result<Vec<Attendee>, ServiceError> {
        Ok(self.repository.attendees()?)
    }

    pub fn personality_quizzes(&self) -> Result<Vec<PersonalityQuizRecord>, ServiceError> {
        Ok(self.repository.personality_quizzes()?)
    }

    pub fn attraction_quizzes(&self) -> Result<Vec<AttractionQuizRecord>, ServiceError> {
        Ok(self.repository.attraction_quizzes()?)
    }

    pub fn all_matches(&self) -> Result<Vec<MatchResult>, ServiceError> {
        Ok(self.repository.all_matches()?)
    }

    pub fn last_match_run(&self) -> Result<Option<MatchRun>, ServiceError> {
        Ok(self.repository.last_match_run()?)
    }

    pub fn check_ins(&self) -> Result<Vec<CheckIn>, ServiceError> {
        Ok(self.repository.check_ins()?)
    }

    pub fn usernames(&self) -> Result<HashMap<UserId, String>, ServiceError> {
        Ok(self
            .repository
            .attendees()?
            .into_iter()
            .map(|attendee| (attendee.id, attendee.username))
            .collect())
    }

    fn require_attendee(&self, user: UserId) -> Result<Attendee, ServiceError> {
        self.repository
            .attendee(user)?
            .ok_or(ServiceError::UnknownAttendee(user))
    }
}

/// Error raised by the matchmaking service.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] AnswerValidationError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    #[error(transparent)]
    Matching(#[from] MatchingError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error("unknown attendee {0}")]
    UnknownAttendee(UserId),
    #[error("invalid registration: {0}")]
    InvalidRegistration(String),
    #[error("a match recompute is already running")]
    RecomputeInProgress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matchmaking::store::EventStore;

    #[test]
    fn concurrent_recompute_is_refused() {
        let service =
            EventMatchService::new(Arc::new(EventStore::in_memory()), MatchingEngine::default());
        let _running = service.recompute.lock().expect("guard");

        assert!(matches!(
            service.run_matching(),
            Err(ServiceError::RecomputeInProgress)
        ));
    }

    #[test]
    fn write_outcome_exposes_record_either_way() {
        let created = WriteOutcome::Created(7);
        let existing = WriteOutcome::Existing(7);
        assert!(created.is_created());
        assert!(!existing.is_created());
        assert_eq!(created.record(), existing.record());
        assert_eq!(existing.into_record(), 7);
    }
}
