//! Per-task counters.

use tracing::info;

/// What happened to one source record (or edge).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Created,
    Updated,
    Deleted,
    Skipped,
}

/// Counters of one task run. Kept in memory and logged when the task ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl TaskStats {
    /// Count a successful outcome.
    pub fn record(&mut self, outcome: RecordOutcome) {
        self.record_many(outcome, 1);
    }

    /// Count `count` records with the same outcome.
    pub fn record_many(&mut self, outcome: RecordOutcome, count: usize) {
        match outcome {
            RecordOutcome::Created => self.created += count,
            RecordOutcome::Updated => self.updated += count,
            RecordOutcome::Deleted => self.deleted += count,
            RecordOutcome::Skipped => self.skipped += count,
        }
    }

    /// Count a failed record.
    pub fn fail(&mut self) {
        self.fail_many(1);
    }

    /// Count `count` failed records.
    pub fn fail_many(&mut self, count: usize) {
        self.failed += count;
    }

    /// Records handled in any way.
    #[must_use]
    pub fn total(&self) -> usize {
        self.created + self.updated + self.deleted + self.skipped + self.failed
    }

    /// Log the counters.
    pub fn log(&self, task: &str) {
        info!(
            task = %task,
            created = self.created,
            updated = self.updated,
            deleted = self.deleted,
            skipped = self.skipped,
            failed = self.failed,
            "Task finished"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let mut stats = TaskStats::default();
        stats.record(RecordOutcome::Created);
        stats.record(RecordOutcome::Created);
        stats.record(RecordOutcome::Skipped);
        stats.fail();
        assert_eq!(stats.created, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.total(), 4);

        stats.record_many(RecordOutcome::Created, 20);
        stats.fail_many(5);
        assert_eq!(stats.created, 22);
        assert_eq!(stats.failed, 6);
    }
}
