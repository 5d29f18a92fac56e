//! Ready-made [`RecordParser`](crate::pipeline::RecordParser) implementations.

pub mod jsonl;

pub use jsonl::JsonLinesParser;
