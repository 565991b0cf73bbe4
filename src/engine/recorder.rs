use std::collections::HashMap;

use crate::models::SetResult;

/// In-memory buffer of set results for one live session, keyed by exercise
/// id. Never touches storage; the completion aggregator drains it when the
/// session finishes, and abandoning the session throws it away.
#[derive(Debug, Default)]
pub struct SetRecorder {
    entries: HashMap<String, Vec<SetResult>>,
}

impl SetRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffers a set result. A re-submission for an already-recorded set
    /// number overwrites the earlier entry, which is what makes re-entering
    /// an exercise after `previous_exercise` safe.
    pub fn record(&mut self, exercise_id: &str, result: SetResult) {
        let sets = self.entries.entry(exercise_id.to_string()).or_default();
        match sets.iter_mut().find(|s| s.set_number == result.set_number) {
            Some(existing) => *existing = result,
            None => sets.push(result),
        }
    }

    /// Buffered results for one exercise, ordered by set number ascending
    /// regardless of input order.
    pub fn results_for(&self, exercise_id: &str) -> Vec<SetResult> {
        let mut sets = self
            .entries
            .get(exercise_id)
            .cloned()
            .unwrap_or_default();
        sets.sort_by_key(|s| s.set_number);
        sets
    }

    pub fn clear_exercise(&mut self, exercise_id: &str) {
        self.entries.remove(exercise_id);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
