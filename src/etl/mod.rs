//! Extract-transform-load pipeline: discovery, per-file extraction, fact
//! resolution and the batch driver that commits file by file.

pub mod batch;
pub mod discovery;
pub mod fact_resolver;
pub mod log_file;
pub mod song_file;
pub mod time_dimension;
