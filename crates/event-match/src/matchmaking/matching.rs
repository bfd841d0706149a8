use super::domain::{MatchResult, UserId};

/// Largest possible gap between two answers on the 1..=5 scale.
pub const MAX_ANSWER_GAP: u32 = 4;
/// Matches kept per attendee unless configured otherwise.
pub const DEFAULT_MATCH_LIMIT: usize = 3;
/// A recompute needs at least this many quiz submissions.
pub const MIN_PARTICIPANTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MatchingError {
    #[error("need at least 2 quiz responses to compute matches, found {found}")]
    NotEnoughParticipants { found: usize },
    #[error("answer vector for user {user_id} has {found} values, expected {expected}")]
    LengthMismatch {
        user_id: UserId,
        expected: usize,
        found: usize,
    },
}

pub fn max_similarity(vector_len: usize) -> u32 {
    MAX_ANSWER_GAP * vector_len as u32
}

/// `4 * len - sum |a_i - b_i|`. Symmetric, bounded by `0..=4 * len`.
pub fn similarity(a: &[u8], b: &[u8]) -> Option<u32> {
    if a.len() != b.len() {
        return None;
    }

    let distance: u32 = a
        .iter()
        .zip(b)
        .map(|(left, right)| u32::from(left.abs_diff(*right)))
        .sum();

    Some(max_similarity(a.len()).saturating_sub(distance))
}

/// Input row for the engine: an attendee and their answer vector.
#[derive(Debug, Clone, Copy)]
pub struct Participant<'a> {
    pub user_id: UserId,
    pub answers: &'a [u8],
}

/// Full result set of one recompute, grouped per subject in participant order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchComputation {
    pub results: Vec<MatchResult>,
    pub per_user: Vec<(UserId, usize)>,
}

impl MatchComputation {
    pub fn users_matched(&self) -> usize {
        self.per_user.len()
    }
}

/// All-pairs similarity scan keeping the best `limit` candidates per attendee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchingEngine {
    limit: usize,
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_LIMIT)
    }
}

impl MatchingEngine {
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.clamp(1, u8::MAX as usize),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Candidates are scanned in the given order; equal scores keep that order.
    pub fn compute(
        &self,
        participants: &[Participant<'_>],
    ) -> Result<MatchComputation, MatchingError> {
        if participants.len() < MIN_PARTICIPANTS {
            return Err(MatchingError::NotEnoughParticipants {
                found: participants.len(),
            });
        }

        let expected = participants[0].answers.len();
        if let Some(odd) = participants
            .iter()
            .find(|participant| participant.answers.len() != expected)
        {
            return Err(MatchingError::LengthMismatch {
                user_id: odd.user_id,
                expected,
                found: odd.answers.len(),
            });
        }

        let mut results = Vec::with_capacity(participants.len() * self.limit);
        let mut per_user = Vec::with_capacity(participants.len());

        for subject in participants {
            let mut scores: Vec<(UserId, u32)> = participants
                .iter()
                .filter(|other| other.user_id != subject.user_id)
                .filter_map(|other| {
                    similarity(subject.answers, other.answers).map(|score| (other.user_id, score))
                })
                .collect();

            scores.sort_by(|left, right| right.1.cmp(&left.1));
            scores.truncate(self.limit);

            per_user.push((subject.user_id, scores.len()));
            results.extend(scores.into_iter().zip(1u8..).map(
                |((matched_user_id, score), rank)| MatchResult {
                    user_id: subject.user_id,
                    matched_user_id,
                    score,
                    rank,
                },
            ));
        }

        Ok(MatchComputation { results, per_user })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn participants<'a>(rows: &'a [(u64, Vec<u8>)]) -> Vec<Participant<'a>> {
        rows.iter()
            .map(|(id, answers)| Participant {
                user_id: UserId(*id),
                answers,
            })
            .collect()
    }

    #[test]
    fn opposite_vectors_score_zero() {
        assert_eq!(similarity(&[5, 5, 5, 5, 5], &[1, 1, 1, 1, 1]), Some(0));
        assert_eq!(max_similarity(5), 20);
    }

    #[test]
    fn identical_vectors_score_maximum() {
        let answers = [3, 1, 4, 1, 5, 2, 2, 3, 5];
        assert_eq!(similarity(&answers, &answers), Some(36));
        assert!(similarity(&answers, &[3, 1, 4, 1, 5, 2, 2, 3, 4]).unwrap() < 36);
    }

    #[test]
    fn similarity_is_symmetric() {
        let pairs: [([u8; 5], [u8; 5]); 3] = [
            ([1, 2, 3, 4, 5], [5, 4, 3, 2, 1]),
            ([2, 2, 2, 2, 2], [1, 3, 5, 1, 4]),
            ([4, 1, 1, 5, 3], [4, 2, 1, 3, 3]),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(&a, &b), similarity(&b, &a));
        }
    }

    #[test]
    fn similarity_rejects_mismatched_lengths() {
        assert_eq!(similarity(&[1, 2, 3], &[1, 2]), None);
    }

    #[test]
    fn fewer_than_two_participants_is_rejected() {
        let rows: Vec<(u64, Vec<u8>)> = vec![(1, vec![3; 9])];
        let engine = MatchingEngine::default();
        assert_eq!(
            engine.compute(&participants(&rows)),
            Err(MatchingError::NotEnoughParticipants { found: 1 })
        );
        assert_eq!(
            engine.compute(&[]),
            Err(MatchingError::NotEnoughParticipants { found: 0 })
        );
    }

    #[test]
    fn two_participants_get_one_rank_one_match_each() {
        let rows: Vec<(u64, Vec<u8>)> = vec![(1, vec![5; 5]), (2, vec![1; 5])];
        let computation = MatchingEngine::default()
            .compute(&participants(&rows))
            .expect("two participants");

        assert_eq!(
            computation.results,
            vec![
                MatchResult {
                    user_id: UserId(1),
                    matched_user_id: UserId(2),
                    score: 0,
                    rank: 1,
                },
                MatchResult {
                    user_id: UserId(2),
                    matched_user_id: UserId(1),
                    score: 0,
                    rank: 1,
                },
            ]
        );
        assert_eq!(computation.users_matched(), 2);
    }

    #[test]
    fn keeps_top_three_by_descending_score_without_self() {
        let rows: Vec<(u64, Vec<u8>)> = vec![
            (1, vec![3, 3, 3]),
            (2, vec![3, 3, 4]),
            (3, vec![1, 1, 1]),
            (4, vec![3, 4, 4]),
            (5, vec![3, 3, 3]),
        ];
        let computation = MatchingEngine::default()
            .compute(&participants(&rows))
            .expect("five participants");

        let for_first: Vec<_> = computation
            .results
            .iter()
            .filter(|result| result.user_id == UserId(1))
            .map(|result| (result.matched_user_id.0, result.score, result.rank))
            .collect();
        assert_eq!(for_first, vec![(5, 12, 1), (2, 11, 2), (4, 10, 3)]);

        assert!(computation
            .results
            .iter()
            .all(|result| result.user_id != result.matched_user_id));
        assert!(computation.per_user.iter().all(|(_, count)| *count == 3));
    }

    #[test]
    fn equal_scores_keep_participant_order() {
        let rows: Vec<(u64, Vec<u8>)> = vec![
            (10, vec![3, 3]),
            (20, vec![4, 3]),
            (30, vec![3, 2]),
            (40, vec![2, 3]),
            (50, vec![3, 4]),
        ];
        let computation = MatchingEngine::default()
            .compute(&participants(&rows))
            .expect("ties resolve");

        let ranked: Vec<u64> = computation
            .results
            .iter()
            .filter(|result| result.user_id == UserId(10))
            .map(|result| result.matched_user_id.0)
            .collect();
        assert_eq!(ranked, vec![20, 30, 40]);
    }

    #[test]
    fn recompute_is_deterministic() {
        let rows: Vec<(u64, Vec<u8>)> = vec![
            (1, vec![1, 5, 2, 4, 3]),
            (2, vec![2, 5, 2, 4, 3]),
            (3, vec![5, 1, 4, 2, 3]),
            (4, vec![1, 5, 2, 4, 4]),
        ];
        let engine = MatchingEngine::new(3);
        let first = engine.compute(&participants(&rows)).expect("first run");
        let second = engine.compute(&participants(&rows)).expect("second run");
        assert_eq!(first, second);
    }

    #[test]
    fn reports_length_mismatch() {
        let rows: Vec<(u64, Vec<u8>)> = vec![(1, vec![3; 9]), (2, vec![3; 5])];
        match MatchingEngine::default().compute(&participants(&rows)) {
            Err(MatchingError::LengthMismatch {
                user_id,
                expected,
                found,
            }) => {
                assert_eq!(user_id, UserId(2));
                assert_eq!(expected, 9);
                assert_eq!(found, 5);
            }
            other => panic!("expected length mismatch, got {other:?}"),
        }
    }

    #[test]
    fn limit_caps_results_and_is_at_least_one() {
        let rows: Vec<(u64, Vec<u8>)> = vec![(1, vec![1; 3]), (2, vec![2; 3]), (3, vec![3; 3])];
        let computation = MatchingEngine::new(1)
            .compute(&participants(&rows))
            .expect("computes");
        assert_eq!(computation.results.len(), 3);
        assert_eq!(MatchingEngine::new(0).limit(), 1);
    }
}
