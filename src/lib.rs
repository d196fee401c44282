pub mod cli;
pub mod config;
pub mod embeddings;
pub mod fingerprint;
pub mod indexer;
pub mod models;
pub mod normalizer;
pub mod search;
pub mod store;
