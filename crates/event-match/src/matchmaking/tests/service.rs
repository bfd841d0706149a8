use super::common::*;
use crate::matchmaking::domain::{CategoryWeights, MatchResult, MatchRun, UserId};
use crate::matchmaking::repository::{MatchRepository, RepositoryError};
use crate::matchmaking::{
    AnswerValidationError, EventMatchService, MatchingEngine, MatchingReport, ServiceError,
    WriteOutcome,
};
use chrono::Utc;
use std::sync::Arc;

#[test]
fn personality_submission_derives_and_stores_classification() {
    let (service, _) = build_service();
    let id = register(&service, "ada");

    let outcome = service
        .submit_personality_quiz(id, &[1, 2, 3, 4, 5, 1, 2, 3, 4])
        .expect("quiz accepted");

    assert!(outcome.is_created());
    let record = outcome.into_record();
    assert_eq!(record.calculated_weights, CategoryWeights([2.1, 3.33, 2.8]));
    assert_eq!(record.category_classification, "red");
}

#[test]
fn repeated_submission_returns_original_record() {
    let (service, _) = build_service();
    let id = register(&service, "ada");

    let first = service
        .submit_personality_quiz(id, &[5; 9])
        .expect("first submission")
        .into_record();
    let second = service
        .submit_personality_quiz(id, &[1; 9])
        .expect("second submission");

    match second {
        WriteOutcome::Existing(record) => {
            assert_eq!(record, first);
            assert_eq!(record.category_classification, "Purple");
        }
        other => panic!("expected existing record, got {other:?}"),
    }
    assert_eq!(service.personality_quizzes().expect("list").len(), 1);
}

#[test]
fn invalid_answers_are_rejected_before_storage() {
    let (service, store) = build_service();
    let id = register(&service, "ada");

    match service.submit_personality_quiz(id, &[3, 3, 3, 3, 3, 3, 3, 3, 7]) {
        Err(ServiceError::Validation(AnswerValidationError::OutOfRange { position, value })) => {
            assert_eq!(position, 9);
            assert_eq!(value, 7);
        }
        other => panic!("expected validation error, got {other:?}"),
    }
    assert!(matches!(
        service.submit_attraction_quiz(id, &[3, 3]),
        Err(ServiceError::Validation(AnswerValidationError::WrongLength { .. }))
    ));
    assert!(store.snapshot().expect("snapshot").personality_quizzes.is_empty());
}

#[test]
fn submissions_for_unknown_attendees_fail() {
    let (service, _) = build_service();
    assert!(matches!(
        service.submit_personality_quiz(UserId(42), &[3; 9]),
        Err(ServiceError::UnknownAttendee(UserId(42)))
    ));
    assert!(matches!(
        service.check_in(UserId(42)),
        Err(ServiceError::UnknownAttendee(_))
    ));
    assert!(matches!(
        service.dashboard(UserId(42)),
        Err(ServiceError::UnknownAttendee(_))
    ));
}

#[test]
fn registration_rejects_blank_and_duplicate_usernames() {
    let (service, _) = build_service();
    assert!(matches!(
        service.register(registration("   ")),
        Err(ServiceError::InvalidRegistration(_))
    ));
    assert!(matches!(
        service.register(registration("two words")),
        Err(ServiceError::InvalidRegistration(_))
    ));

    register(&service, "ada");
    assert!(matches!(
        service.register(registration(" ada ")),
        Err(ServiceError::Repository(RepositoryError::Conflict))
    ));
}

#[test]
fn check_in_is_idempotent() {
    let (service, _) = build_service();
    let id = register(&service, "ada");

    let first = service.check_in(id).expect("first check-in");
    let second = service.check_in(id).expect("second check-in");

    assert!(first.is_created());
    assert!(!second.is_created());
    assert_eq!(first.record(), second.record());
    assert_eq!(service.check_ins().expect("list").len(), 1);
}

#[test]
fn matching_with_one_participant_is_skipped_and_keeps_results() {
    let (service, store) = build_service();
    let ada = quizzed(&service, "ada", [3; 9]);

    let previous = vec![MatchResult {
        user_id: ada,
        matched_user_id: UserId(99),
        score: 20,
        rank: 1,
    }];
    store
        .replace_matches(
            previous.clone(),
            MatchRun {
                completed_at: Utc::now(),
                users_matched: 1,
                results_written: 1,
            },
        )
        .expect("seed results");

    let report = service.run_matching().expect("run completes");

    assert_eq!(report, MatchingReport::Skipped { participants: 1 });
    assert_eq!(service.all_matches().expect("matches"), previous);
}

#[test]
fn matching_ranks_top_three_and_dashboard_reports_presence() {
    let (service, _) = build_service();
    let alice = quizzed(&service, "alice", [5; 9]);
    let bob = quizzed(&service, "bob", [5, 5, 5, 5, 5, 5, 5, 5, 4]);
    let carol = quizzed(&service, "carol", [1; 9]);
    let dave = quizzed(&service, "dave", [3; 9]);
    service
        .submit_attraction_quiz(alice, &[5, 5, 5])
        .expect("attraction quiz");
    service.check_in(bob).expect("bob checks in");

    let report = service.run_matching().expect("run completes");
    match &report {
        MatchingReport::Completed {
            users_matched,
            results_written,
            per_user,
        } => {
            assert_eq!(*users_matched, 4);
            assert_eq!(*results_written, 12);
            assert_eq!(per_user[0].username, "alice");
            assert!(per_user.iter().all(|entry| entry.matches == 3));
        }
        other => panic!("expected completed run, got {other:?}"),
    }

    let dashboard = service.dashboard(alice).expect("dashboard");
    assert!(dashboard.has_quiz);
    assert!(dashboard.has_attraction_quiz);
    assert!(!dashboard.checked_in);
    assert_eq!(
        dashboard.personality.as_ref().map(|p| p.category.as_str()),
        Some("Purple")
    );

    let ranked: Vec<(u8, UserId, u32)> = dashboard
        .matches
        .iter()
        .map(|entry| (entry.rank, entry.user_id, entry.score))
        .collect();
    assert_eq!(ranked, vec![(1, bob, 35), (2, dave, 18), (3, carol, 0)]);

    let first = &dashboard.matches[0];
    assert_eq!(first.display_name, "bob");
    assert_eq!(first.max_score, 36);
    assert!(first.is_checked_in);
    assert_eq!(first.category.as_deref(), Some("Purple"));
    assert_eq!(first.fits_attraction, Some(true));
    assert_eq!(dashboard.matches[1].fits_attraction, Some(false));
    assert!(!dashboard.matches[1].is_checked_in);
}

#[test]
fn rerunning_matching_replaces_previous_rows() {
    let (service, _) = build_service();
    quizzed(&service, "alice", [5; 9]);
    quizzed(&service, "bob", [1; 9]);
    service.run_matching().expect("first run");
    assert_eq!(service.all_matches().expect("matches").len(), 2);

    quizzed(&service, "carol", [3; 9]);
    service.run_matching().expect("second run");

    let matches = service.all_matches().expect("matches");
    assert_eq!(matches.len(), 6);
    assert_eq!(
        service
            .last_match_run()
            .expect("run info")
            .map(|run| run.results_written),
        Some(6)
    );
}

#[test]
fn dashboard_without_quizzes_is_empty() {
    let (service, _) = build_service();
    let id = register(&service, "ada");

    let dashboard = service.dashboard(id).expect("dashboard");
    assert!(!dashboard.has_quiz);
    assert!(!dashboard.has_matches);
    assert!(dashboard.personality.is_none());
    assert!(dashboard.attraction.is_none());
    assert!(dashboard.matches.is_empty());
}

#[test]
fn attraction_quiz_picks_most_attracted_color() {
    let (service, _) = build_service();
    let id = register(&service, "ada");

    let record = service
        .submit_attraction_quiz(id, &[1, 5, 1])
        .expect("accepted")
        .into_record();

    assert_eq!(record.preferences, CategoryWeights([1.0, 5.0, 1.0]));
    assert_eq!(record.most_attracted_category, "orange");
}

#[test]
fn recompute_held_elsewhere_reports_in_progress() {
    let store = Arc::new(BusyStore::default());
    let service = EventMatchService::new(store, MatchingEngine::default());
    quizzed(&service, "alice", [5; 9]);
    quizzed(&service, "bob", [1; 9]);

    assert!(matches!(
        service.run_matching(),
        Err(ServiceError::RecomputeInProgress)
    ));
    assert!(service.all_matches().expect("matches").is_empty());
}

#[test]
fn storage_failures_surface_as_repository_errors() {
    let service = EventMatchService::new(
        Arc::new(UnavailableRepository),
        MatchingEngine::default(),
    );

    assert!(matches!(
        service.register(registration("ada")),
        Err(ServiceError::Repository(RepositoryError::Unavailable(_)))
    ));
    assert!(matches!(
        service.run_matching(),
        Err(ServiceError::Repository(_))
    ));
}
