#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use crate::engine::aggregator;
    use crate::engine::{
        EngineError, SessionRegistry, SessionState, SetEntry, SetRecorder, TickOutcome,
        Transition, WorkoutSession,
    };
    use crate::models::{Assignment, AssignmentStatus, SetResult, Weekday};
    use crate::test::utils::{exercise, test_plan};

    fn entry(reps: i64) -> SetEntry {
        SetEntry {
            reps: Some(reps),
            load_kg: None,
            note: None,
        }
    }

    fn set(set_number: u32, reps: u32) -> SetResult {
        SetResult {
            set_number,
            reps,
            load_kg: None,
            note: None,
        }
    }

    fn test_assignment(plan_id: i64) -> Assignment {
        Assignment {
            id: 7,
            trainee_id: 3,
            plan_id,
            coach_id: 1,
            start_date: Utc::now().date_naive(),
            end_date: None,
            weekdays: vec![Weekday::Mon],
            status: AssignmentStatus::Active,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn rejects_plan_without_exercises() {
        let plan = test_plan(vec![]);
        let result = WorkoutSession::start(1, plan, Utc::now());
        assert!(matches!(result, Err(EngineError::InvalidPlan(_))));
    }

    #[test]
    fn rejects_plan_with_zero_set_count() {
        let plan = test_plan(vec![
            exercise("Bench Press", 2, "8-12", None, 30),
            exercise("Broken", 0, "10", None, 30),
        ]);
        let result = WorkoutSession::start(1, plan, Utc::now());
        assert!(matches!(result, Err(EngineError::InvalidPlan(_))));
    }

    #[test]
    fn walks_through_the_example_scenario() {
        let plan = test_plan(vec![
            exercise("Bench Press", 2, "8-12", Some(60.0), 30),
            exercise("Incline Row", 1, "10", None, 45),
        ]);
        let exercise_ids: Vec<String> = plan.exercises.iter().map(|e| e.id.clone()).collect();
        let mut session = WorkoutSession::start(7, plan, Utc::now()).unwrap();

        assert_eq!(
            *session.state(),
            SessionState::Active {
                exercise: 0,
                set: 1
            }
        );

        let transition = session.submit_set(entry(10)).unwrap();
        assert_eq!(
            transition,
            Transition::Resting {
                seconds: 30,
                generation: 1
            }
        );
        assert_eq!(
            *session.state(),
            SessionState::Resting {
                exercise: 0,
                set: 2,
                seconds_remaining: 30,
                generation: 1
            }
        );

        for _ in 0..29 {
            assert!(matches!(
                session.tick_rest(1),
                TickOutcome::Counting { .. }
            ));
        }
        assert_eq!(session.tick_rest(1), TickOutcome::Finished);
        assert_eq!(
            *session.state(),
            SessionState::Active {
                exercise: 0,
                set: 2
            }
        );

        assert_eq!(
            session.submit_set(entry(8)).unwrap(),
            Transition::NextExercise
        );
        assert_eq!(
            *session.state(),
            SessionState::Active {
                exercise: 1,
                set: 1
            }
        );

        assert_eq!(
            session.submit_set(entry(12)).unwrap(),
            Transition::Completed
        );
        assert_eq!(*session.state(), SessionState::Completed);

        let execution = session.execution().expect("completed session keeps its draft");
        assert_eq!(execution.assignment_id, 7);
        assert_eq!(execution.exercises.len(), 2);
        assert_eq!(execution.exercises[0].exercise_id, exercise_ids[0]);
        assert_eq!(execution.exercises[0].sets, vec![set(1, 10), set(2, 8)]);
        assert_eq!(execution.exercises[1].exercise_id, exercise_ids[1]);
        assert_eq!(execution.exercises[1].sets, vec![set(1, 12)]);
    }

    #[test]
    fn completes_after_exactly_the_configured_set_total() {
        let plan = test_plan(vec![
            exercise("Squat", 3, "5", Some(100.0), 10),
            exercise("Lunge", 2, "8", None, 10),
            exercise("Leg Press", 2, "12", None, 10),
        ]);
        let mut session = WorkoutSession::start(1, plan, Utc::now()).unwrap();

        let mut submissions = 0;
        loop {
            match *session.state() {
                SessionState::Completed => break,
                SessionState::Resting { .. } => session.skip_rest().unwrap(),
                SessionState::Active { .. } => {
                    session.submit_set(entry(5)).unwrap();
                    submissions += 1;
                }
            }
        }

        assert_eq!(submissions, 7);
        let execution = session.execution().unwrap();
        let per_exercise: Vec<usize> = execution.exercises.iter().map(|e| e.sets.len()).collect();
        assert_eq!(per_exercise, vec![3, 2, 2]);
    }

    #[test]
    fn invalid_reps_leave_the_state_unchanged() {
        let plan = test_plan(vec![exercise("Bench Press", 2, "8-12", None, 30)]);
        let mut session = WorkoutSession::start(1, plan, Utc::now()).unwrap();

        let before = *session.state();

        let missing = session.submit_set(SetEntry::default());
        assert!(matches!(missing, Err(EngineError::Validation(_))));
        assert_eq!(*session.state(), before);

        let negative = session.submit_set(entry(-3));
        assert!(matches!(negative, Err(EngineError::Validation(_))));
        assert_eq!(*session.state(), before);

        assert!(session.recorded_so_far().is_empty());
    }

    #[test]
    fn rest_completion_fires_exactly_once() {
        let plan = test_plan(vec![exercise("Bench Press", 2, "8-12", None, 3)]);
        let mut session = WorkoutSession::start(1, plan, Utc::now()).unwrap();

        session.submit_set(entry(10)).unwrap();
        assert!(matches!(
            session.tick_rest(1),
            TickOutcome::Counting { seconds_remaining: 2 }
        ));
        assert!(matches!(
            session.tick_rest(1),
            TickOutcome::Counting { seconds_remaining: 1 }
        ));
        assert_eq!(session.tick_rest(1), TickOutcome::Finished);

        // Late ticks from the same rest period are rejected.
        assert_eq!(session.tick_rest(1), TickOutcome::Stale);
        assert_eq!(session.tick_rest(1), TickOutcome::Stale);
        assert_eq!(
            *session.state(),
            SessionState::Active {
                exercise: 0,
                set: 2
            }
        );
    }

    #[test]
    fn skip_rest_transitions_once_and_invalidates_late_ticks() {
        let plan = test_plan(vec![exercise("Bench Press", 3, "8-12", None, 30)]);
        let mut session = WorkoutSession::start(1, plan, Utc::now()).unwrap();

        session.submit_set(entry(10)).unwrap();
        session.skip_rest().unwrap();
        assert_eq!(
            *session.state(),
            SessionState::Active {
                exercise: 0,
                set: 2
            }
        );
        assert_eq!(session.tick_rest(1), TickOutcome::Stale);

        // A second rest period gets a fresh generation; ticks for the old
        // one never touch it.
        session.submit_set(entry(9)).unwrap();
        assert_eq!(session.tick_rest(1), TickOutcome::Stale);
        assert!(matches!(
            session.tick_rest(2),
            TickOutcome::Counting { seconds_remaining: 29 }
        ));

        let skipped_again = session.skip_rest();
        assert!(skipped_again.is_ok());
        let not_resting = session.skip_rest();
        assert!(matches!(not_resting, Err(EngineError::Validation(_))));
    }

    #[test]
    fn previous_exercise_is_rejected_outside_first_set_boundaries() {
        let plan = test_plan(vec![
            exercise("Bench Press", 2, "8-12", None, 30),
            exercise("Incline Row", 2, "10", None, 30),
        ]);
        let mut session = WorkoutSession::start(1, plan, Utc::now()).unwrap();

        // At the very first exercise there is nothing to go back to.
        assert!(matches!(
            session.previous_exercise(),
            Err(EngineError::Validation(_))
        ));

        // Not during a rest period either.
        session.submit_set(entry(10)).unwrap();
        let before = *session.state();
        assert!(matches!(
            session.previous_exercise(),
            Err(EngineError::Validation(_))
        ));
        assert_eq!(*session.state(), before);

        // Nor in the middle of an exercise past its first set.
        session.skip_rest().unwrap();
        session.submit_set(entry(8)).unwrap();
        session.submit_set(entry(10)).unwrap();
        session.skip_rest().unwrap();
        assert_eq!(
            *session.state(),
            SessionState::Active {
                exercise: 1,
                set: 2
            }
        );
        assert!(matches!(
            session.previous_exercise(),
            Err(EngineError::Validation(_))
        ));
    }

    #[test]
    fn revisited_exercise_restarts_and_overwrites_by_set_number() {
        let plan = test_plan(vec![
            exercise("Bench Press", 1, "8-12", None, 30),
            exercise("Incline Row", 1, "10", None, 30),
        ]);
        let exercise_ids: Vec<String> = plan.exercises.iter().map(|e| e.id.clone()).collect();
        let mut session = WorkoutSession::start(1, plan, Utc::now()).unwrap();

        session.submit_set(entry(10)).unwrap();
        assert_eq!(
            *session.state(),
            SessionState::Active {
                exercise: 1,
                set: 1
            }
        );

        session.previous_exercise().unwrap();
        assert_eq!(
            *session.state(),
            SessionState::Active {
                exercise: 0,
                set: 1
            }
        );
        // The revisited exercise's earlier sets are gone; the trainee
        // re-enters them from a blank form.
        assert!(session.recorded_so_far().is_empty());

        session.submit_set(entry(12)).unwrap();
        session.submit_set(entry(9)).unwrap();
        assert_eq!(*session.state(), SessionState::Completed);

        let execution = session.execution().unwrap();
        assert_eq!(execution.exercises[0].exercise_id, exercise_ids[0]);
        assert_eq!(execution.exercises[0].sets, vec![set(1, 12)]);
        assert_eq!(execution.exercises[1].sets, vec![set(1, 9)]);
    }

    #[test]
    fn recorder_orders_by_set_number_and_overwrites_on_collision() {
        let mut recorder = SetRecorder::new();
        recorder.record("ex", set(3, 5));
        recorder.record("ex", set(1, 10));
        recorder.record("ex", set(2, 8));

        let first = recorder.results_for("ex");
        assert_eq!(
            first.iter().map(|s| s.set_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );

        // Reading is idempotent.
        let second = recorder.results_for("ex");
        assert_eq!(first, second);

        recorder.record("ex", set(2, 6));
        let third = recorder.results_for("ex");
        assert_eq!(third.len(), 3);
        assert_eq!(third[1], set(2, 6));

        assert!(recorder.results_for("missing").is_empty());
    }

    #[test]
    fn aggregator_rounds_duration_and_follows_plan_order() {
        let plan = test_plan(vec![
            exercise("Bench Press", 1, "8-12", None, 30),
            exercise("Incline Row", 1, "10", None, 30),
        ]);
        let mut recorder = SetRecorder::new();
        // Recorded out of plan order on purpose.
        recorder.record(&plan.exercises[1].id, set(1, 12));
        recorder.record(&plan.exercises[0].id, set(1, 10));

        let started = Utc::now();
        let now = started + Duration::seconds(14 * 60 + 30);
        let draft = aggregator::aggregate(&plan, 9, &recorder, started, now);

        assert_eq!(draft.assignment_id, 9);
        assert_eq!(draft.duration_minutes, 15);
        assert_eq!(draft.performed_at, now);
        assert_eq!(draft.exercises[0].exercise_id, plan.exercises[0].id);
        assert_eq!(draft.exercises[1].exercise_id, plan.exercises[1].id);
    }

    #[tokio::test]
    async fn abandon_discards_the_session_without_a_record() {
        let registry = SessionRegistry::new();
        let plan = test_plan(vec![exercise("Bench Press", 2, "8-12", None, 30)]);
        let assignment = test_assignment(plan.id);

        registry.start(3, &assignment, plan).unwrap();
        registry.submit_set(3, entry(10)).unwrap();

        registry.abandon(3).unwrap();
        assert!(matches!(registry.snapshot(3), Err(EngineError::NoSession)));
        assert!(matches!(registry.abandon(3), Err(EngineError::NoSession)));
        assert!(matches!(
            registry.completed_execution(3),
            Err(EngineError::NoSession)
        ));
    }

    #[tokio::test]
    async fn one_live_session_per_trainee() {
        let registry = SessionRegistry::new();
        let plan = test_plan(vec![exercise("Bench Press", 2, "8-12", None, 30)]);
        let assignment = test_assignment(plan.id);

        registry.start(3, &assignment, plan.clone()).unwrap();
        let second = registry.start(3, &assignment, plan);
        assert!(matches!(second, Err(EngineError::Validation(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn rest_timer_drives_the_countdown_to_active() {
        let registry = SessionRegistry::new();
        let plan = test_plan(vec![exercise("Bench Press", 2, "8-12", None, 2)]);
        let assignment = test_assignment(plan.id);

        registry.start(3, &assignment, plan).unwrap();
        let snapshot = registry.submit_set(3, entry(10)).unwrap();
        assert_eq!(snapshot.phase, "resting");
        assert_eq!(snapshot.seconds_remaining, Some(2));

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;

        let snapshot = registry.snapshot(3).unwrap();
        assert_eq!(snapshot.phase, "active");
        assert_eq!(snapshot.set_number, Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn skip_rest_cancels_the_countdown_for_good() {
        let registry = SessionRegistry::new();
        let plan = test_plan(vec![exercise("Bench Press", 3, "8-12", None, 30)]);
        let assignment = test_assignment(plan.id);

        registry.start(3, &assignment, plan).unwrap();
        registry.submit_set(3, entry(10)).unwrap();
        let snapshot = registry.skip_rest(3).unwrap();
        assert_eq!(snapshot.phase, "active");
        assert_eq!(snapshot.set_number, Some(2));

        // Nothing left ticking: well past the original rest length, the
        // session still sits where skip left it.
        tokio::time::sleep(std::time::Duration::from_secs(60)).await;

        let snapshot = registry.snapshot(3).unwrap();
        assert_eq!(snapshot.phase, "active");
        assert_eq!(snapshot.set_number, Some(2));
    }
}
