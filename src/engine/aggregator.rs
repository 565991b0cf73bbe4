use chrono::{DateTime, Utc};

use super::SetRecorder;
use crate::models::{ExerciseResult, NewExecution, Plan};

/// Groups the recorder's buffer by exercise. Output order follows the
/// plan's exercise order, not submission order; exercises with nothing
/// recorded are omitted.
pub fn grouped_results(plan: &Plan, recorder: &SetRecorder) -> Vec<ExerciseResult> {
    plan.exercises
        .iter()
        .map(|exercise| ExerciseResult {
            exercise_id: exercise.id.clone(),
            sets: recorder.results_for(&exercise.id),
        })
        .filter(|result| !result.sets.is_empty())
        .collect()
}

/// Folds a finished session's buffer into the single execution record that
/// gets persisted. Runs exactly once, on the final set of the final
/// exercise; submission (and any retry of it) reuses the returned draft.
pub fn aggregate(
    plan: &Plan,
    assignment_id: i64,
    recorder: &SetRecorder,
    started_at: DateTime<Utc>,
    now: DateTime<Utc>,
) -> NewExecution {
    let elapsed = now.signed_duration_since(started_at);
    let duration_minutes = (elapsed.num_seconds() as f64 / 60.0).round() as i64;

    NewExecution {
        assignment_id,
        duration_minutes: duration_minutes.max(0),
        performed_at: now,
        exercises: grouped_results(plan, recorder),
    }
}
