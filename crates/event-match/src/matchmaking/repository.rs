use std::fs::{self, File};
use std::io;
use std::path::PathBuf;

use fs2::FileExt;

use super::domain::{
    Attendee, AttractionQuizRecord, CheckIn, MatchResult, MatchRun, PersonalityQuizRecord,
    Registration, UserId,
};

/// Attendee registry.
pub trait AttendeeRepository: Send + Sync {
    fn register(&self, registration: Registration) -> Result<Attendee, RepositoryError>;
    fn attendee(&self, id: UserId) -> Result<Option<Attendee>, RepositoryError>;
    fn attendee_by_username(&self, username: &str) -> Result<Option<Attendee>, RepositoryError>;
    fn attendees(&self) -> Result<Vec<Attendee>, RepositoryError>;
}

/// Quiz answer store. Listing order is submission order.
pub trait QuizRepository: Send + Sync {
    fn insert_personality(
        &self,
        record: PersonalityQuizRecord,
    ) -> Result<PersonalityQuizRecord, RepositoryError>;
    fn personality(&self, user: UserId) -> Result<Option<PersonalityQuizRecord>, RepositoryError>;
    fn personality_quizzes(&self) -> Result<Vec<PersonalityQuizRecord>, RepositoryError>;

    fn insert_attraction(
        &self,
        record: AttractionQuizRecord,
    ) -> Result<AttractionQuizRecord, RepositoryError>;
    fn attraction(&self, user: UserId) -> Result<Option<AttractionQuizRecord>, RepositoryError>;
    fn attraction_quizzes(&self) -> Result<Vec<AttractionQuizRecord>, RepositoryError>;
}

/// Ranked match lists produced by the batch job.
pub trait MatchRepository: Send + Sync {
    /// Swap the whole result set. Either every new row is stored or the old set remains.
    fn replace_matches(
        &self,
        results: Vec<MatchResult>,
        run: MatchRun,
    ) -> Result<(), RepositoryError>;
    /// Rows for one attendee ordered by rank.
    fn matches_for(&self, user: UserId) -> Result<Vec<MatchResult>, RepositoryError>;
    fn all_matches(&self) -> Result<Vec<MatchResult>, RepositoryError>;
    fn last_match_run(&self) -> Result<Option<MatchRun>, RepositoryError>;

    /// Exclusive hold on recomputation for stores shared between processes.
    fn recompute_lock(&self) -> Result<RecomputeLock, RepositoryError> {
        Ok(RecomputeLock::unlocked())
    }
}

/// Physical presence markers.
pub trait CheckInRepository: Send + Sync {
    fn insert_check_in(&self, check_in: CheckIn) -> Result<CheckIn, RepositoryError>;
    fn check_in(&self, user: UserId) -> Result<Option<CheckIn>, RepositoryError>;
    fn check_ins(&self) -> Result<Vec<CheckIn>, RepositoryError>;
}

/// Everything the service needs from storage.
pub trait EventRepository:
    AttendeeRepository + QuizRepository + MatchRepository + CheckInRepository
{
}

impl<T> EventRepository for T where
    T: AttendeeRepository + QuizRepository + MatchRepository + CheckInRepository
{
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("another match recompute holds {}", .0.display())]
    Locked(PathBuf),
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("storage io failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("stored data is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Advisory lock on a file next to the data file.
///
/// The OS drops the lock when the guard's handle closes or the owning process dies, so
/// a leftover lock file never blocks a later run. The file itself is never removed.
#[derive(Debug)]
pub struct RecomputeLock {
    held: Option<(PathBuf, File)>,
}

impl RecomputeLock {
    pub fn unlocked() -> Self {
        Self { held: None }
    }

    pub fn acquire(path: PathBuf) -> Result<Self, RepositoryError> {
        let file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Self {
                held: Some((path, file)),
            }),
            Err(err) if is_contended(&err) => Err(RepositoryError::Locked(path)),
            Err(err) => Err(RepositoryError::Io(err)),
        }
    }

    pub fn path(&self) -> Option<&PathBuf> {
        self.held.as_ref().map(|(path, _)| path)
    }
}

fn is_contended(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::WouldBlock
        || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}
