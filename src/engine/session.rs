use chrono::{DateTime, Utc};

use super::{EngineError, SetRecorder, aggregator};
use crate::models::{Exercise, ExerciseResult, NewExecution, Plan, SetResult};

/// Raw per-set input from the trainee. Reps arrive optional so that a
/// missing value surfaces as a validation error instead of a
/// deserialization failure.
#[derive(Debug, Clone, Default)]
pub struct SetEntry {
    pub reps: Option<i64>,
    pub load_kg: Option<f64>,
    pub note: Option<String>,
}

/// Where the session currently is. `generation` stamps each rest period so
/// that a countdown tick scheduled for an earlier rest can never act on a
/// later one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Active {
        exercise: usize,
        set: u32,
    },
    Resting {
        exercise: usize,
        set: u32,
        seconds_remaining: u32,
        generation: u64,
    },
    Completed,
}

/// What a successful `submit_set` did to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Same exercise, next set; a rest period has started.
    Resting { seconds: u32, generation: u64 },
    /// First set of the next exercise. No rest between exercises.
    NextExercise,
    /// Final set of the final exercise; the execution draft is ready.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Countdown continues.
    Counting { seconds_remaining: u32 },
    /// The countdown reached zero and the session moved back to Active.
    Finished,
    /// The tick no longer matches the live rest period and was ignored.
    Stale,
}

/// Single-pass state machine for one guided workout. Pure: it performs no
/// I/O and holds no storage handle. The caller (registry + HTTP layer)
/// drives transitions and persists the draft this machine retains once it
/// completes.
pub struct WorkoutSession {
    assignment_id: i64,
    plan: Plan,
    recorder: SetRecorder,
    state: SessionState,
    started_at: DateTime<Utc>,
    generation: u64,
    result: Option<NewExecution>,
    in_transition: bool,
}

impl WorkoutSession {
    /// Load-time preconditions: a plan with no exercises, or with an
    /// exercise configured for zero sets, can never run to completion and
    /// is rejected before the session starts.
    pub fn start(
        assignment_id: i64,
        plan: Plan,
        started_at: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        if plan.exercises.is_empty() {
            return Err(EngineError::InvalidPlan(
                "plan has no exercises".to_string(),
            ));
        }
        if let Some(exercise) = plan.exercises.iter().find(|e| e.sets == 0) {
            return Err(EngineError::InvalidPlan(format!(
                "exercise '{}' has a zero set count",
                exercise.name
            )));
        }

        Ok(Self {
            assignment_id,
            plan,
            recorder: SetRecorder::new(),
            state: SessionState::Active {
                exercise: 0,
                set: 1,
            },
            started_at,
            generation: 0,
            result: None,
            in_transition: false,
        })
    }

    pub fn assignment_id(&self) -> i64 {
        self.assignment_id
    }

    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn current_exercise(&self) -> Option<&Exercise> {
        match self.state {
            SessionState::Active { exercise, .. } | SessionState::Resting { exercise, .. } => {
                self.plan.exercises.get(exercise)
            }
            SessionState::Completed => None,
        }
    }

    /// Everything recorded so far, grouped in plan order. Backs the running
    /// log shown during the session.
    pub fn recorded_so_far(&self) -> Vec<ExerciseResult> {
        aggregator::grouped_results(&self.plan, &self.recorder)
    }

    /// The retained execution draft. `Some` exactly when the session has
    /// completed; submission failures leave it in place for retry.
    pub fn execution(&self) -> Option<&NewExecution> {
        self.result.as_ref()
    }

    pub fn submit_set(&mut self, entry: SetEntry) -> Result<Transition, EngineError> {
        self.begin_transition()?;
        let result = self.submit_set_inner(entry);
        self.in_transition = false;
        result
    }

    fn submit_set_inner(&mut self, entry: SetEntry) -> Result<Transition, EngineError> {
        let (exercise_index, set_number) = match self.state {
            SessionState::Active { exercise, set } => (exercise, set),
            SessionState::Resting { .. } => {
                return Err(EngineError::Validation(
                    "cannot record a set during a rest period".to_string(),
                ));
            }
            SessionState::Completed => {
                return Err(EngineError::Validation(
                    "the workout is already completed".to_string(),
                ));
            }
        };

        let reps = match entry.reps {
            Some(reps) if reps >= 0 => reps as u32,
            Some(_) => {
                return Err(EngineError::Validation(
                    "repetitions cannot be negative".to_string(),
                ));
            }
            None => {
                return Err(EngineError::Validation(
                    "repetitions are required".to_string(),
                ));
            }
        };

        let exercise = self.plan.exercises[exercise_index].clone();
        self.recorder.record(
            &exercise.id,
            SetResult {
                set_number,
                reps,
                load_kg: entry.load_kg,
                note: entry.note,
            },
        );

        if set_number < exercise.sets {
            self.generation += 1;
            let seconds = exercise.rest_seconds;
            self.state = SessionState::Resting {
                exercise: exercise_index,
                set: set_number + 1,
                seconds_remaining: seconds,
                generation: self.generation,
            };
            Ok(Transition::Resting {
                seconds,
                generation: self.generation,
            })
        } else if exercise_index + 1 < self.plan.exercises.len() {
            self.state = SessionState::Active {
                exercise: exercise_index + 1,
                set: 1,
            };
            Ok(Transition::NextExercise)
        } else {
            self.state = SessionState::Completed;
            self.result = Some(aggregator::aggregate(
                &self.plan,
                self.assignment_id,
                &self.recorder,
                self.started_at,
                Utc::now(),
            ));
            Ok(Transition::Completed)
        }
    }

    /// One countdown second. The generation check makes the rest-complete
    /// transition fire exactly once: a tick left over from a cancelled or
    /// finished rest period never matches the live state.
    pub fn tick_rest(&mut self, generation: u64) -> TickOutcome {
        if self.in_transition {
            return TickOutcome::Stale;
        }
        match self.state {
            SessionState::Resting {
                exercise,
                set,
                seconds_remaining,
                generation: live,
            } if live == generation => {
                let remaining = seconds_remaining.saturating_sub(1);
                if remaining == 0 {
                    self.state = SessionState::Active { exercise, set };
                    TickOutcome::Finished
                } else {
                    self.state = SessionState::Resting {
                        exercise,
                        set,
                        seconds_remaining: remaining,
                        generation: live,
                    };
                    TickOutcome::Counting {
                        seconds_remaining: remaining,
                    }
                }
            }
            _ => TickOutcome::Stale,
        }
    }

    pub fn skip_rest(&mut self) -> Result<(), EngineError> {
        self.begin_transition()?;
        let result = match self.state {
            SessionState::Resting { exercise, set, .. } => {
                self.state = SessionState::Active { exercise, set };
                Ok(())
            }
            _ => Err(EngineError::Validation(
                "not currently resting".to_string(),
            )),
        };
        self.in_transition = false;
        result
    }

    /// Steps back to the previous exercise. Only valid on the first set of
    /// an exercise past the first. The revisited exercise restarts from a
    /// blank form: its earlier sets are dropped and re-entered, while
    /// results for every other exercise stay buffered untouched.
    pub fn previous_exercise(&mut self) -> Result<(), EngineError> {
        self.begin_transition()?;
        let result = self.previous_exercise_inner();
        self.in_transition = false;
        result
    }

    fn previous_exercise_inner(&mut self) -> Result<(), EngineError> {
        match self.state {
            SessionState::Active { exercise, set: 1 } if exercise > 0 => {
                let revisited = self.plan.exercises[exercise - 1].id.clone();
                self.recorder.clear_exercise(&revisited);
                self.state = SessionState::Active {
                    exercise: exercise - 1,
                    set: 1,
                };
                Ok(())
            }
            SessionState::Active { set: 1, .. } => Err(EngineError::Validation(
                "already at the first exercise".to_string(),
            )),
            SessionState::Active { .. } => Err(EngineError::Validation(
                "cannot go back in the middle of an exercise".to_string(),
            )),
            SessionState::Resting { .. } => Err(EngineError::Validation(
                "cannot go back during a rest period".to_string(),
            )),
            SessionState::Completed => Err(EngineError::Validation(
                "the workout is already completed".to_string(),
            )),
        }
    }

    /// Discards the session and everything buffered in it. The only way to
    /// leave the flow without producing an execution record.
    pub fn abandon(mut self) {
        self.recorder.clear();
    }

    fn begin_transition(&mut self) -> Result<(), EngineError> {
        if self.in_transition {
            return Err(EngineError::ConcurrentAccess);
        }
        self.in_transition = true;
        Ok(())
    }
}
