use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::debug;

use super::domain::{
    Attendee, AttractionQuizRecord, CheckIn, MatchResult, MatchRun, PersonalityQuizRecord,
    Registration, UserId,
};
use super::repository::{
    AttendeeRepository, CheckInRepository, MatchRepository, QuizRepository, RecomputeLock,
    RepositoryError,
};

/// Everything the event persists, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventSnapshot {
    #[serde(default)]
    pub attendees: Vec<Attendee>,
    #[serde(default)]
    pub personality_quizzes: Vec<PersonalityQuizRecord>,
    #[serde(default)]
    pub attraction_quizzes: Vec<AttractionQuizRecord>,
    #[serde(default)]
    pub matches: Vec<MatchResult>,
    #[serde(default)]
    pub last_match_run: Option<MatchRun>,
    #[serde(default)]
    pub check_ins: Vec<CheckIn>,
}

impl EventSnapshot {
    fn next_user_id(&self) -> UserId {
        let max = self
            .attendees
            .iter()
            .map(|attendee| attendee.id.0)
            .max()
            .unwrap_or(0);
        UserId(max + 1)
    }

    /// Derived quiz fields are recomputed on every load.
    fn rederive(&mut self) -> Result<(), RepositoryError> {
        for record in &mut self.personality_quizzes {
            record.rederive().map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "stored personality quiz for user {} is invalid: {err}",
                    record.user_id
                ))
            })?;
        }
        for record in &mut self.attraction_quizzes {
            record.rederive().map_err(|err| {
                RepositoryError::Unavailable(format!(
                    "stored attraction quiz for user {} is invalid: {err}",
                    record.user_id
                ))
            })?;
        }
        Ok(())
    }
}

/// Mutex-guarded event data, optionally mirrored to a JSON file.
///
/// With a backing file every operation reloads the file first. Writes hold an exclusive
/// lock on `<file>.write.lock` from that reload until the new snapshot is renamed into
/// place, so handles in other processes never interleave a read-modify-write. Memory is
/// only updated after the rename succeeds, so a failed write changes nothing.
#[derive(Debug, Default)]
pub struct EventStore {
    state: Mutex<EventSnapshot>,
    path: Option<PathBuf>,
}

impl EventStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self, RepositoryError> {
        let path = path.into();
        let snapshot = load_snapshot(&path)?;
        Ok(Self {
            state: Mutex::new(snapshot),
            path: Some(path),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn snapshot(&self) -> Result<EventSnapshot, RepositoryError> {
        self.read(|state| state.clone())
    }

    fn lock(&self) -> Result<MutexGuard<'_, EventSnapshot>, RepositoryError> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("event store mutex poisoned".to_string()))
    }

    fn read<T>(&self, f: impl FnOnce(&EventSnapshot) -> T) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        if let Some(path) = &self.path {
            *guard = load_snapshot(path)?;
        }
        Ok(f(&guard))
    }

    fn write<T>(
        &self,
        f: impl FnOnce(&mut EventSnapshot) -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        let mut guard = self.lock()?;
        let _writer = match &self.path {
            Some(path) => {
                let writer = WriteLock::acquire(&sibling_path(path, "write.lock"))?;
                *guard = load_snapshot(path)?;
                Some(writer)
            }
            None => None,
        };

        let mut draft = guard.clone();
        let value = f(&mut draft)?;
        if let Some(path) = &self.path {
            persist_snapshot(path, &draft)?;
        }
        *guard = draft;
        Ok(value)
    }
}

/// Held for the whole read-modify-write; the OS releases it when the handle closes.
struct WriteLock {
    _file: File,
}

impl WriteLock {
    fn acquire(path: &Path) -> Result<Self, RepositoryError> {
        ensure_parent(path)?;
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        file.lock_exclusive()?;
        Ok(Self { _file: file })
    }
}

fn load_snapshot(path: &Path) -> Result<EventSnapshot, RepositoryError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            return Ok(EventSnapshot::default())
        }
        Err(err) => return Err(err.into()),
    };

    if raw.trim().is_empty() {
        return Ok(EventSnapshot::default());
    }

    let mut snapshot: EventSnapshot = serde_json::from_str(&raw)?;
    snapshot.rederive()?;
    Ok(snapshot)
}

fn persist_snapshot(path: &Path, snapshot: &EventSnapshot) -> Result<(), RepositoryError> {
    let parent = ensure_parent(path)?;
    let payload = serde_json::to_vec_pretty(snapshot)?;

    let mut tmp = NamedTempFile::new_in(parent)?;
    tmp.write_all(&payload)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;

    debug!(path = %path.display(), "event snapshot persisted");
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<&Path, RepositoryError> {
    match path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            Ok(parent)
        }
        None => Ok(Path::new(".")),
    }
}

fn sibling_path(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

impl AttendeeRepository for EventStore {
    fn register(&self, registration: Registration) -> Result<Attendee, RepositoryError> {
        self.write(|state| {
            if state
                .attendees
                .iter()
                .any(|attendee| attendee.username == registration.username)
            {
                return Err(RepositoryError::Conflict);
            }

            let attendee = Attendee {
                id: state.next_user_id(),
                username: registration.username,
                display_name: registration.display_name,
                registered_at: Utc::now(),
            };
            state.attendees.push(attendee.clone());
            Ok(attendee)
        })
    }

    fn attendee(&self, id: UserId) -> Result<Option<Attendee>, RepositoryError> {
        self.read(|state| {
            state
                .attendees
                .iter()
                .find(|attendee| attendee.id == id)
                .cloned()
        })
    }

    fn attendee_by_username(&self, username: &str) -> Result<Option<Attendee>, RepositoryError> {
        self.read(|state| {
            state
                .attendees
                .iter()
                .find(|attendee| attendee.username == username)
                .cloned()
        })
    }

    fn attendees(&self) -> Result<Vec<Attendee>, RepositoryError> {
        self.read(|state| state.attendees.clone())
    }
}

impl QuizRepository for EventStore {
    fn insert_personality(
        &self,
        record: PersonalityQuizRecord,
    ) -> Result<PersonalityQuizRecord, RepositoryError> {
        self.write(|state| {
            if state
                .personality_quizzes
                .iter()
                .any(|existing| existing.user_id == record.user_id)
            {
                return Err(RepositoryError::Conflict);
            }
            state.personality_quizzes.push(record.clone());
            Ok(record)
        })
    }

    fn personality(&self, user: UserId) -> Result<Option<PersonalityQuizRecord>, RepositoryError> {
        self.read(|state| {
            state
                .personality_quizzes
                .iter()
                .find(|record| record.user_id == user)
                .cloned()
        })
    }

    fn personality_quizzes(&self) -> Result<Vec<PersonalityQuizRecord>, RepositoryError> {
        self.read(|state| state.personality_quizzes.clone())
    }

    fn insert_attraction(
        &self,
        record: AttractionQuizRecord,
    ) -> Result<AttractionQuizRecord, RepositoryError> {
        self.write(|state| {
            if state
                .attraction_quizzes
                .iter()
                .any(|existing| existing.user_id == record.user_id)
            {
                return Err(RepositoryError::Conflict);
            }
            state.attraction_quizzes.push(record.clone());
            Ok(record)
        })
    }

    fn attraction(&self, user: UserId) -> Result<Option<AttractionQuizRecord>, RepositoryError> {
        self.read(|state| {
            state
                .attraction_quizzes
                .iter()
                .find(|record| record.user_id == user)
                .cloned()
        })
    }

    fn attraction_quizzes(&self) -> Result<Vec<AttractionQuizRecord>, RepositoryError> {
        self.read(|state| state.attraction_quizzes.clone())
    }
}

impl MatchRepository for EventStore {
    fn replace_matches(
        &self,
        results: Vec<MatchResult>,
        run: MatchRun,
    ) -> Result<(), RepositoryError> {
        self.write(|state| {
            state.matches = results;
            state.last_match_run = Some(run);
            Ok(())
        })
    }

    fn matches_for(&self, user: UserId) -> Result<Vec<MatchResult>, RepositoryError> {
        self.read(|state| {
            let mut rows: Vec<MatchResult> = state
                .matches
                .iter()
                .filter(|result| result.user_id == user)
                .cloned()
                .collect();
            rows.sort_by_key(|result| result.rank);
            rows
        })
    }

    fn all_matches(&self) -> Result<Vec<MatchResult>, RepositoryError> {
        self.read(|state| state.matches.clone())
    }

    fn last_match_run(&self) -> Result<Option<MatchRun>, RepositoryError> {
        self.read(|state| state.last_match_run.clone())
    }

    fn recompute_lock(&self) -> Result<RecomputeLock, RepositoryError> {
        match &self.path {
            Some(path) => RecomputeLock::acquire(sibling_path(path, "lock")),
            None => Ok(RecomputeLock::unlocked()),
        }
    }
}

impl CheckInRepository for EventStore {
    fn insert_check_in(&self, check_in: CheckIn) -> Result<CheckIn, RepositoryError> {
        self.write(|state| {
            if state
                .check_ins
                .iter()
                .any(|existing| existing.user_id == check_in.user_id)
            {
                return Err(RepositoryError::Conflict);
            }
            state.check_ins.push(check_in.clone());
            Ok(check_in)
        })
    }

    fn check_in(&self, user: UserId) -> Result<Option<CheckIn>, RepositoryError> {
        self.read(|state| {
            state
                .check_ins
                .iter()
                .find(|check_in| check_in.user_id == user)
                .cloned()
        })
    }

    fn check_ins(&self) -> Result<Vec<CheckIn>, RepositoryError> {
        self.read(|state| state.check_ins.clone())
    }
}
