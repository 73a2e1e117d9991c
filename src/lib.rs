//! duct-search - search for statically generated sites.
//!
//! The crate covers the whole life of a site search index: building it from
//! rendered pages and content, ranking queries against it in process, caching
//! a fetched copy, and serving it from an index worker over HTTP.
//!
//! # Modules
//!
//! - [`index`] - Index entry model, serialization and the entry generator
//! - [`text`] - HTML stripping, normalization, keywords and path filters
//! - [`builder`] - Build-time page extraction and index output
//! - [`search`] - The ranked multi-field search engine
//! - [`provider`] - Provider contract, registry and the concrete providers
//! - [`cache`] - Local cache for fetched indexes
//! - [`storage`] - Persistence behind the index worker
//! - [`worker`] - HTTP index worker (feature `worker`)
//! - [`config`] - Configuration loading
//! - [`cli`] - Command-line interface definitions
//! - [`commands`] - High-level operations behind the CLI

pub mod builder;
pub mod cache;
pub mod cli;
pub mod commands;
pub mod config;
pub mod index;
pub mod provider;
pub mod search;
pub mod storage;
pub mod text;

#[cfg(feature = "worker")]
pub mod worker;
