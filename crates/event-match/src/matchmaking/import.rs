use std::collections::HashMap;
use std::io::{Read, Write};

use serde::Serialize;

use super::domain::{MatchResult, QuizKind, UserId};

/// Failure to read a quiz export or write a match export.
#[derive(Debug)]
pub enum ImportError {
    Io(std::io::Error),
    Csv(csv::Error),
    Header { expected: String, found: String },
}

impl std::fmt::Display for ImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImportError::Io(err) => write!(f, "failed to read quiz export: {}", err),
            ImportError::Csv(err) => write!(f, "invalid quiz CSV data: {}", err),
            ImportError::Header { expected, found } => write!(
                f,
                "unexpected CSV header: expected `{}`, found `{}`",
                expected, found
            ),
        }
    }
}

impl std::error::Error for ImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ImportError::Io(err) => Some(err),
            ImportError::Csv(err) => Some(err),
            ImportError::Header { .. } => None,
        }
    }
}

impl From<std::io::Error> for ImportError {
    fn from(err: std::io::Error) -> Self {
        ImportError::Io(err)
    }
}

impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::Csv(err)
    }
}

/// One parsed quiz row. Answers are range-checked when the row is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub line: u64,
    pub username: String,
    pub answers: Vec<i64>,
}

/// A row that could not be imported, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRow {
    pub line: u64,
    pub username: Option<String>,
    pub reason: String,
}

/// Tally of a quiz import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub registered: Vec<String>,
    pub skipped_existing: Vec<String>,
    pub rejected: Vec<RejectedRow>,
}

fn expected_header(kind: QuizKind) -> Vec<String> {
    std::iter::once("username".to_string())
        .chain((1..=kind.answer_count()).map(|index| format!("q{index}")))
        .collect()
}

/// Parse a `username,q1..qN` export. Malformed rows are returned as rejections so one bad
/// line does not abort the file.
pub fn parse_quiz_csv<R: Read>(
    reader: R,
    kind: QuizKind,
) -> Result<(Vec<ImportRow>, Vec<RejectedRow>), ImportError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let expected = expected_header(kind);
    let header: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|column| column.to_ascii_lowercase())
        .collect();
    if header != expected {
        return Err(ImportError::Header {
            expected: expected.join(","),
            found: header.join(","),
        });
    }

    let mut rows = Vec::new();
    let mut rejected = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |position| position.line());
        let username = record.get(0).unwrap_or_default().to_string();

        if username.is_empty() {
            rejected.push(RejectedRow {
                line,
                username: None,
                reason: "missing username".to_string(),
            });
            continue;
        }
        if record.len() != expected.len() {
            rejected.push(RejectedRow {
                line,
                username: Some(username),
                reason: format!(
                    "expected {} answers, found {}",
                    kind.answer_count(),
                    record.len().saturating_sub(1)
                ),
            });
            continue;
        }

        let parsed: Result<Vec<i64>, String> = record
            .iter()
            .skip(1)
            .enumerate()
            .map(|(index, value)| {
                value
                    .parse::<i64>()
                    .map_err(|_| format!("answer {} is not a number: `{}`", index + 1, value))
            })
            .collect();

        match parsed {
            Ok(answers) => rows.push(ImportRow {
                line,
                username,
                answers,
            }),
            Err(reason) => rejected.push(RejectedRow {
                line,
                username: Some(username),
                reason,
            }),
        }
    }

    Ok((rows, rejected))
}

/// Write every stored match as `user,match,score,rank`.
pub fn export_matches<W: Write>(
    writer: W,
    matches: &[MatchResult],
    usernames: &HashMap<UserId, String>,
) -> Result<usize, ImportError> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(["user", "match", "score", "rank"])?;

    let name = |id: &UserId| {
        usernames
            .get(id)
            .cloned()
            .unwrap_or_else(|| format!("user-{id}"))
    };

    for result in matches {
        csv_writer.write_record([
            name(&result.user_id),
            name(&result.matched_user_id),
            result.score.to_string(),
            result.rank.to_string(),
        ])?;
    }
    csv_writer.flush()?;

    Ok(matches.len())
}
