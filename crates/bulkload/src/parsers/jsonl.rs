use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::marker::PhantomData;
use std::path::Path;

use serde::de::DeserializeOwned;

use crate::cancel::CancellationToken;
use crate::db::Row;
use crate::error::{ImportError, Result};
use crate::pipeline::RecordParser;

/// How many lines are read between cancellation checks.
const CANCEL_CHECK_LINES: usize = 1024;

/// Reads one JSON document per line into `R` and maps each record to a row
/// with `mapper`. Blank lines are skipped.
pub struct JsonLinesParser<R, F> {
    table: String,
    columns: Vec<String>,
    mapper: F,
    _record: PhantomData<fn() -> R>,
}

impl<R, F> JsonLinesParser<R, F>
where
    R: DeserializeOwned + Send + 'static,
    F: Fn(&R) -> Row + Send + Sync + 'static,
{
    pub fn new(table: &str, columns: &[&str], mapper: F) -> Self {
        Self {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            mapper,
            _record: PhantomData,
        }
    }
}

impl<R, F> RecordParser for JsonLinesParser<R, F>
where
    R: DeserializeOwned + Send + 'static,
    F: Fn(&R) -> Row + Send + Sync + 'static,
{
    type Record = R;

    fn parse_file(&self, cancel: &CancellationToken, path: &Path) -> Result<Vec<R>> {
        let io_error = |source| ImportError::Io {
            path: path.to_path_buf(),
            source,
        };
        let reader = BufReader::new(File::open(path).map_err(io_error)?);

        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            if index % CANCEL_CHECK_LINES == 0 {
                cancel.check()?;
            }

            // Invalid UTF-8 is bad input, not a failed read.
            let line = line.map_err(|e| match e.kind() {
                io::ErrorKind::InvalidData => ImportError::Parse {
                    path: path.to_path_buf(),
                    line: index + 1,
                    message: e.to_string(),
                },
                _ => io_error(e),
            })?;
            if line.trim().is_empty() {
                continue;
            }

            let record = serde_json::from_str(&line).map_err(|e| ImportError::Parse {
                path: path.to_path_buf(),
                line: index + 1,
                message: e.to_string(),
            })?;
            records.push(record);
        }

        log::debug!("Parsed {} records from {}", records.len(), path.display());
        Ok(records)
    }

    fn table_name(&self) -> &str {
        &self.table
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    fn to_row(&self, record: &R) -> Result<Row> {
        Ok((self.mapper)(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::types::Value;
    use serde::Deserialize;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    fn users() -> JsonLinesParser<User, impl Fn(&User) -> Row + Send + Sync + 'static> {
        JsonLinesParser::new("users", &["id", "name"], |u: &User| {
            vec![Value::Integer(u.id), Value::Text(u.name.clone())]
        })
    }

    fn write_lines(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_parses_lines_and_skips_blanks() {
        let file = write_lines("{\"id\":1,\"name\":\"ada\"}\n\n  \n{\"id\":2,\"name\":\"bob\"}\n");
        let parser = users();

        let records = parser
            .parse_file(&CancellationToken::new(), file.path())
            .unwrap();
        assert_eq!(
            records,
            vec![
                User { id: 1, name: "ada".to_string() },
                User { id: 2, name: "bob".to_string() },
            ]
        );
        assert_eq!(parser.table_name(), "users");
        assert_eq!(parser.columns(), ["id".to_string(), "name".to_string()]);
        assert_eq!(
            parser.to_row(&records[1]).unwrap(),
            vec![Value::Integer(2), Value::Text("bob".to_string())]
        );
    }

    #[test]
    fn test_reports_line_of_bad_json() {
        let file = write_lines("{\"id\":1,\"name\":\"ada\"}\n{\"id\":\"x\"}\n");
        let err = users()
            .parse_file(&CancellationToken::new(), file.path())
            .unwrap_err();
        match err {
            ImportError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_validation_error() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{\"id\":1,\"name\":\"ada\"}\n\xff\xfe\n").unwrap();

        let err = users()
            .parse_file(&CancellationToken::new(), file.path())
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
        match err {
            ImportError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = users()
            .parse_file(&CancellationToken::new(), &dir.path().join("nope.jsonl"))
            .unwrap_err();
        assert!(matches!(err, ImportError::Io { .. }));
    }

    #[test]
    fn test_observes_cancellation() {
        let file = write_lines("{\"id\":1,\"name\":\"ada\"}\n");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = users().parse_file(&cancel, file.path()).unwrap_err();
        assert!(err.is_cancelled());
    }
}
