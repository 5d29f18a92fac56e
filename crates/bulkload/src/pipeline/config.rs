use crate::config::Config;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportOptions {
    pub worker_count: usize,
    pub batch_size: usize,
    /// Log a progress line every N units written; zero disables it.
    pub log_every: usize,
    pub expected_rows: Option<u64>,
}

impl ImportOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            worker_count: config.worker_count,
            batch_size: config.batch_size,
            log_every: config.log_every,
            expected_rows: config.expected_rows,
        }
    }
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            worker_count: num_cpus::get(),
            batch_size: 1000,
            log_every: 100,
            expected_rows: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_config_from_str;

    #[test]
    fn test_from_config() {
        let config = load_config_from_str(
            r#"{ "version": "1.0", "database_path": "a.db", "worker_count": 3, "batch_size": 50, "expected_rows": 9 }"#,
        )
        .unwrap();

        let options = ImportOptions::from_config(&config);
        assert_eq!(
            options,
            ImportOptions {
                worker_count: 3,
                batch_size: 50,
                log_every: 100,
                expected_rows: Some(9),
            }
        );
    }
}
