//! Test harness for isolated import runs.
//!
//! Each `TestHarness` owns a temporary directory holding the input files and
//! an on-disk SQLite database with a `users` table.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

use bulkload::{Database, ImportOptions, Importer, JsonLinesParser, Row};

pub const USERS_SCHEMA: &str = "CREATE TABLE users (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT
)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: i64,
    pub name: String,
    pub email: Option<String>,
}

pub type UsersParser = JsonLinesParser<UserRecord, fn(&UserRecord) -> Row>;

fn user_row(user: &UserRecord) -> Row {
    vec![
        Value::Integer(user.id),
        Value::Text(user.name.clone()),
        user.email.clone().map(Value::Text).unwrap_or(Value::Null),
    ]
}

pub fn users_parser() -> Arc<UsersParser> {
    Arc::new(JsonLinesParser::new(
        "users",
        &["id", "name", "email"],
        user_row as fn(&UserRecord) -> Row,
    ))
}

pub struct TestHarness {
    temp_dir: TempDir,
    /// Directory input files are written to and resolved against.
    pub input_dir: PathBuf,
    pub db_path: PathBuf,
    pub db: Database,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let input_dir = temp_dir.path().join("input");
        fs::create_dir_all(&input_dir).expect("Failed to create input directory");

        let db_path = temp_dir.path().join("db").join("import.db");
        let db = Database::open(&db_path).expect("Failed to open database");
        db.execute_batch(USERS_SCHEMA).expect("Failed to create schema");

        Self {
            temp_dir,
            input_dir,
            db_path,
            db,
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `users` as JSON lines to `input/<name>` and returns the path.
    pub fn write_users(&self, name: &str, users: &[UserRecord]) -> PathBuf {
        let content = users
            .iter()
            .map(|u| serde_json::to_string(u).expect("Failed to serialize user"))
            .collect::<Vec<_>>()
            .join("\n");
        self.write_raw(name, &content)
    }

    pub fn write_raw(&self, name: &str, content: &str) -> PathBuf {
        let path = self.input_dir.join(name);
        fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn importer(&self, options: ImportOptions) -> Importer {
        Importer::new(self.db.clone(), options)
    }

    pub fn user_count(&self) -> u64 {
        self.db.count_rows("users").expect("Failed to count users")
    }

    pub fn user_ids(&self) -> Vec<i64> {
        self.db
            .with_conn(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM users ORDER BY id")?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<i64>, _>>()?;
                Ok(ids)
            })
            .expect("Failed to query users")
    }
}
