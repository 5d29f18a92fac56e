pub mod collector;
pub mod config;
pub mod importer;
pub mod parser;
pub mod progress;
pub mod task;

pub use collector::{CollectedError, ErrorCollector, ErrorSummary, NO_ERRORS};
pub use config::ImportOptions;
pub use importer::{ImportReport, Importer};
pub use parser::{erase, RecordParser, RecordSet, UnitParser};
pub use progress::{Progress, ProgressDetailed, ProgressTracker};
pub use task::{ParseOutcome, ParseTask};
