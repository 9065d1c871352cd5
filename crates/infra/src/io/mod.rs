//! Record ingestion and emission

pub mod jsonl;

pub use jsonl::{read_descriptors, read_descriptors_from_path, write_results, write_results_to_path, BatchInput};
