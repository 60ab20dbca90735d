pub mod cli;
pub mod config;
pub mod error;
pub mod global;
pub mod media;
pub mod pipeline;
pub mod publish;
pub mod sources;
pub mod store;
pub mod summary;
pub mod transcription;
