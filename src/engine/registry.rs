use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use super::session::{SessionState, SetEntry, TickOutcome, Transition, WorkoutSession};
use super::timer::RestTimer;
use super::EngineError;
use crate::models::{Assignment, Exercise, ExerciseResult, NewExecution, Plan};

const REST_TICK: Duration = Duration::from_secs(1);

struct LiveSession {
    session: WorkoutSession,
    timer: Option<RestTimer>,
}

/// Server-side driver for guided sessions: at most one live session per
/// trainee. The registry serializes access to each state machine and owns
/// the rest timers, so skip/abandon/completion can cancel a countdown
/// before the state moves on.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<HashMap<i64, LiveSession>>>,
}

/// What the HTTP layer (and through it the client) sees of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub assignment_id: i64,
    pub plan_id: i64,
    pub plan_name: String,
    pub phase: &'static str,
    pub exercise_index: Option<usize>,
    pub total_exercises: usize,
    pub set_number: Option<u32>,
    pub seconds_remaining: Option<u32>,
    pub started_at: DateTime<Utc>,
    pub exercise: Option<Exercise>,
    pub recorded: Vec<ExerciseResult>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(
        &self,
        trainee_id: i64,
        assignment: &Assignment,
        plan: Plan,
    ) -> Result<SessionSnapshot, EngineError> {
        let mut sessions = self.lock();
        if sessions.contains_key(&trainee_id) {
            return Err(EngineError::Validation(
                "a workout session is already in progress".to_string(),
            ));
        }

        let session = WorkoutSession::start(assignment.id, plan, Utc::now())?;
        let snapshot = snapshot_of(&session);
        sessions.insert(
            trainee_id,
            LiveSession {
                session,
                timer: None,
            },
        );
        info!(
            trainee_id,
            assignment_id = assignment.id,
            "Guided workout session started"
        );
        Ok(snapshot)
    }

    pub fn snapshot(&self, trainee_id: i64) -> Result<SessionSnapshot, EngineError> {
        let sessions = self.lock();
        let live = sessions.get(&trainee_id).ok_or(EngineError::NoSession)?;
        Ok(snapshot_of(&live.session))
    }

    pub fn submit_set(
        &self,
        trainee_id: i64,
        entry: SetEntry,
    ) -> Result<SessionSnapshot, EngineError> {
        let mut sessions = self.lock();
        let live = sessions.get_mut(&trainee_id).ok_or(EngineError::NoSession)?;

        let transition = live.session.submit_set(entry)?;
        if let Transition::Resting { generation, .. } = transition {
            if let Some(old) = live
                .timer
                .replace(self.spawn_rest_timer(trainee_id, generation))
            {
                old.cancel();
            }
        }
        Ok(snapshot_of(&live.session))
    }

    pub fn skip_rest(&self, trainee_id: i64) -> Result<SessionSnapshot, EngineError> {
        let mut sessions = self.lock();
        let live = sessions.get_mut(&trainee_id).ok_or(EngineError::NoSession)?;

        live.session.skip_rest()?;
        if let Some(timer) = live.timer.take() {
            timer.cancel();
        }
        Ok(snapshot_of(&live.session))
    }

    pub fn previous_exercise(&self, trainee_id: i64) -> Result<SessionSnapshot, EngineError> {
        let mut sessions = self.lock();
        let live = sessions.get_mut(&trainee_id).ok_or(EngineError::NoSession)?;

        live.session.previous_exercise()?;
        Ok(snapshot_of(&live.session))
    }

    pub fn abandon(&self, trainee_id: i64) -> Result<(), EngineError> {
        let mut sessions = self.lock();
        let live = sessions.remove(&trainee_id).ok_or(EngineError::NoSession)?;
        if let Some(timer) = live.timer {
            timer.cancel();
        }
        live.session.abandon();
        info!(trainee_id, "Guided workout session abandoned");
        Ok(())
    }

    /// The retained draft of a completed session, ready for submission or
    /// resubmission. Fails if the session has not reached completion.
    pub fn completed_execution(&self, trainee_id: i64) -> Result<NewExecution, EngineError> {
        let sessions = self.lock();
        let live = sessions.get(&trainee_id).ok_or(EngineError::NoSession)?;
        live.session.execution().cloned().ok_or_else(|| {
            EngineError::Validation("the workout session is not completed yet".to_string())
        })
    }

    /// Drops a completed session once its execution has been persisted.
    /// A session that is not completed stays put.
    pub fn clear_completed(&self, trainee_id: i64) {
        let mut sessions = self.lock();
        let completed = sessions
            .get(&trainee_id)
            .is_some_and(|live| live.session.execution().is_some());
        if completed {
            sessions.remove(&trainee_id);
        }
    }

    fn spawn_rest_timer(&self, trainee_id: i64, generation: u64) -> RestTimer {
        let registry = self.clone();
        RestTimer::spawn(REST_TICK, move || registry.tick(trainee_id, generation))
    }

    /// One countdown tick. Returns whether the timer should keep running.
    fn tick(&self, trainee_id: i64, generation: u64) -> bool {
        let mut sessions = self.lock();
        let Some(live) = sessions.get_mut(&trainee_id) else {
            return false;
        };
        match live.session.tick_rest(generation) {
            TickOutcome::Counting { .. } => true,
            TickOutcome::Finished => {
                live.timer = None;
                false
            }
            TickOutcome::Stale => false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<i64, LiveSession>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn snapshot_of(session: &WorkoutSession) -> SessionSnapshot {
    let plan = session.plan();
    let (phase, exercise_index, set_number, seconds_remaining) = match *session.state() {
        SessionState::Active { exercise, set } => ("active", Some(exercise), Some(set), None),
        SessionState::Resting {
            exercise,
            set,
            seconds_remaining,
            ..
        } => ("resting", Some(exercise), Some(set), Some(seconds_remaining)),
        SessionState::Completed => ("completed", None, None, None),
    };

    SessionSnapshot {
        assignment_id: session.assignment_id(),
        plan_id: plan.id,
        plan_name: plan.name.clone(),
        phase,
        exercise_index,
        total_exercises: plan.exercises.len(),
        set_number,
        seconds_remaining,
        started_at: session.started_at(),
        exercise: session.current_exercise().cloned(),
        recorded: session.recorded_so_far(),
    }
}
