use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::scoring::{self, ReferenceCategory, ScoringError};

/// Lowest accepted Likert answer.
pub const LIKERT_MIN: u8 = 1;
/// Highest accepted Likert answer.
pub const LIKERT_MAX: u8 = 5;

const PERSONALITY_QUESTIONS: [&str; 9] = [
    "Do you prefer going out (5) or staying in (1) on a friday night?",
    "Do you prefer Movies (5) or Books (1)?",
    "Are you Clingy (5) or not Clingy (1)?",
    "Do you prefer Beer (5) or Hot Chocolate (1)?",
    "Do you prefer Legos (5) or painting (1)?",
    "What do you think you GIVE more - princess treatment (5) or bare minimum (1)?",
    "Do you prefer spending your sunday hanging out with friends (5) or being by yourself (1)?",
    "Do you prefer Late night cuddles (5) or late night talks (1)?",
    "In public do you prefer Making out (5) or not touching (1)?",
];

const ATTRACTION_QUESTIONS: [&str; 3] = [
    "What do you find attractive: AntiSocial (1) or Social (5)?",
    "What do you find attractive: Books person (1) or Movies person (5)?",
    "What do you find attractive: Less Romantic (1) or More Romantic (5)?",
];

/// Identifier assigned to an attendee by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registration payload accepted from the signup surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub username: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// A registered event attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    pub id: UserId,
    pub username: String,
    pub display_name: Option<String>,
    pub registered_at: DateTime<Utc>,
}

impl Attendee {
    /// Name shown to other attendees.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.username)
    }
}

/// The two questionnaires an attendee fills in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    Personality,
    Attraction,
}

impl QuizKind {
    pub const fn answer_count(self) -> usize {
        match self {
            QuizKind::Personality => PERSONALITY_QUESTIONS.len(),
            QuizKind::Attraction => ATTRACTION_QUESTIONS.len(),
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            QuizKind::Personality => "personality",
            QuizKind::Attraction => "attraction",
        }
    }

    pub fn questions(self) -> &'static [&'static str] {
        match self {
            QuizKind::Personality => &PERSONALITY_QUESTIONS,
            QuizKind::Attraction => &ATTRACTION_QUESTIONS,
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "personality" => Some(Self::Personality),
            "attraction" => Some(Self::Attraction),
            _ => None,
        }
    }
}

impl fmt::Display for QuizKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Rejection reasons for raw quiz input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerValidationError {
    #[error("{kind} quiz expects {expected} answers, found {found}")]
    WrongLength {
        kind: QuizKind,
        expected: usize,
        found: usize,
    },
    #[error("answer {position} is {value}; answers must be between 1 and 5")]
    OutOfRange { position: usize, value: i64 },
}

/// Validated Likert answers for one quiz submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuizAnswers(Vec<u8>);

impl QuizAnswers {
    /// Accepts raw integers so out-of-range input is reported rather than truncated.
    pub fn new(kind: QuizKind, raw: &[i64]) -> Result<Self, AnswerValidationError> {
        if raw.len() != kind.answer_count() {
            return Err(AnswerValidationError::WrongLength {
                kind,
                expected: kind.answer_count(),
                found: raw.len(),
            });
        }

        let mut answers = Vec::with_capacity(raw.len());
        for (index, value) in raw.iter().enumerate() {
            let valid = u8::try_from(*value)
                .ok()
                .filter(|answer| (LIKERT_MIN..=LIKERT_MAX).contains(answer));
            match valid {
                Some(answer) => answers.push(answer),
                None => {
                    return Err(AnswerValidationError::OutOfRange {
                        position: index + 1,
                        value: *value,
                    })
                }
            }
        }

        Ok(Self(answers))
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Three derived scores, one per axis of the reference space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryWeights(pub [f64; 3]);

impl CategoryWeights {
    pub fn values(&self) -> &[f64; 3] {
        &self.0
    }
}

/// Stored personality quiz with its derived weights and color classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalityQuizRecord {
    pub user_id: UserId,
    pub answers: QuizAnswers,
    pub calculated_weights: CategoryWeights,
    pub category_classification: String,
    pub submitted_at: DateTime<Utc>,
}

impl PersonalityQuizRecord {
    pub fn new(
        user_id: UserId,
        answers: QuizAnswers,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, ScoringError> {
        let mut record = Self {
            user_id,
            answers,
            calculated_weights: CategoryWeights([0.0; 3]),
            category_classification: String::new(),
            submitted_at,
        };
        record.rederive()?;
        Ok(record)
    }

    /// Recompute the derived fields from the stored answers.
    pub fn rederive(&mut self) -> Result<(), ScoringError> {
        let weights = scoring::calculate_weighted_averages(self.answers.as_slice())?;
        let category = scoring::classify_category(&weights);
        self.calculated_weights = weights;
        self.category_classification = category.label.to_string();
        Ok(())
    }

    pub fn category(&self) -> Option<&'static ReferenceCategory> {
        scoring::reference_category(&self.category_classification)
    }
}

/// Stored attraction quiz with the personality color the attendee leans towards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttractionQuizRecord {
    pub user_id: UserId,
    pub answers: QuizAnswers,
    pub preferences: CategoryWeights,
    pub most_attracted_category: String,
    pub submitted_at: DateTime<Utc>,
}

impl AttractionQuizRecord {
    pub fn new(
        user_id: UserId,
        answers: QuizAnswers,
        submitted_at: DateTime<Utc>,
    ) -> Result<Self, ScoringError> {
        let mut record = Self {
            user_id,
            answers,
            preferences: CategoryWeights([0.0; 3]),
            most_attracted_category: String::new(),
            submitted_at,
        };
        record.rederive()?;
        Ok(record)
    }

    pub fn rederive(&mut self) -> Result<(), ScoringError> {
        let preferences = scoring::attraction_preferences(self.answers.as_slice())?;
        let category = scoring::classify_category(&preferences);
        self.preferences = preferences;
        self.most_attracted_category = category.label.to_string();
        Ok(())
    }
}

/// One ranked row of an attendee's match list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchResult {
    pub user_id: UserId,
    pub matched_user_id: UserId,
    pub score: u32,
    pub rank: u8,
}

/// Bookkeeping for the most recent full recompute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchRun {
    pub completed_at: DateTime<Utc>,
    pub users_matched: usize,
    pub results_written: usize,
}

/// Marker that an attendee is physically at the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckIn {
    pub user_id: UserId,
    pub checked_in_at: DateTime<Utc>,
}
