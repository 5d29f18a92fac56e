//! Builders for import options and fixture records.

#![allow(dead_code)]

use bulkload::ImportOptions;

use super::harness::UserRecord;

/// Builder for `ImportOptions` with small, test-friendly defaults.
pub struct OptionsBuilder {
    options: ImportOptions,
}

impl OptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: ImportOptions {
                worker_count: 2,
                batch_size: 2,
                log_every: 1,
                expected_rows: None,
            },
        }
    }

    pub fn workers(mut self, count: usize) -> Self {
        self.options.worker_count = count;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.options.batch_size = size;
        self
    }

    pub fn expected_rows(mut self, rows: u64) -> Self {
        self.options.expected_rows = Some(rows);
        self
    }

    pub fn build(self) -> ImportOptions {
        self.options
    }
}

/// `count` users with consecutive ids starting at `first_id`.
pub fn users(first_id: i64, count: usize) -> Vec<UserRecord> {
    (0..count as i64)
        .map(|i| {
            let id = first_id + i;
            UserRecord {
                id,
                name: format!("user-{}", id),
                email: (id % 2 == 0).then(|| format!("user{}@example.com", id)),
            }
        })
        .collect()
}
