//! Move file content between archives and a remote hierarchical file store.
//!
//! [`engine::extract_archive`] downloads an archive and recreates its tree in
//! a remote folder; [`engine::compress_items`] collects remote files and
//! folders into one archive and uploads it.

pub mod engine;
pub mod models;
pub mod remote;
pub mod system;
pub mod utils;
