use crate::app::models::LogRecord;

/// Folds consecutive records with identical `(level, pid, tag, time)` into a
/// single multi-line record. Only the last accumulated record is ever a merge
/// candidate.
#[derive(Debug, Default)]
pub struct RunMerger {
    records: Vec<LogRecord>,
}

impl RunMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when `record` was merged into the previous entry.
    pub fn push(&mut self, record: LogRecord) -> bool {
        match self.records.last_mut() {
            Some(last) if last.same_key(&record) => {
                last.absorb(record);
                true
            }
            _ => {
                self.records.push(record);
                false
            }
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn finish(self) -> Vec<LogRecord> {
        self.records
    }
}

impl Extend<LogRecord> for RunMerger {
    fn extend<I: IntoIterator<Item = LogRecord>>(&mut self, iter: I) {
        for record in iter {
            self.push(record);
        }
    }
}
