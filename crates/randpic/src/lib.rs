//! Random photo handler
//!
//! `randpic` serves a random photo out of an object store and accepts new photos
//! uploaded as `multipart/form-data`. It is written for serverless HTTP runtimes
//! (an API Gateway proxy event goes in, a proxy response comes out) but the same
//! [`PhotoHandler`](handler::PhotoHandler) can sit behind any HTTP server.
//!
//! # Architecture
//!
//! - A `GET` picks a random image through an injected [`RandomSource`](select::RandomSource),
//!   asks the [`ObjectStore`](store::ObjectStore) for a presigned URL and the attribution
//!   text, and renders an HTML page.
//! - A `POST` extracts the first file part of the multipart body with
//!   [`Extractor`](http::Extractor), checks its magic number and stores it.
//!
//! All configuration lives in an explicit [`Config`](config::Config) passed at
//! construction time.
//!
//! # Example
//!
//! ```
//! use randpic::config::Config;
//! use randpic::handler::PhotoHandlerBuilder;
//! use randpic::select::FixedRandom;
//! use randpic::store::MemoryStore;
//!
//! let mut config = Config::new("photos");
//! config.image_count = 3;
//!
//! let mut builder = PhotoHandlerBuilder::new(config, MemoryStore::new());
//! builder.set_random(FixedRandom::new(1));
//! let handler = builder.build();
//! assert_eq!(handler.config().bucket, "photos");
//! ```
//!
//! # Modules
//!
//! - [`http`]: multipart extraction and `Content-Type` parsing
//! - [`image`]: magic number validation
//! - [`config`]: handler configuration
//! - [`select`]: random image selection
//! - [`store`]: object storage interface
//! - [`render`]: HTML pages
//! - [`handler`]: request dispatch
//! - [`event`]: serverless proxy event model

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(
    clippy::bool_assert_comparison,  // I don't like `assert!(!expression)`. It's very misleading.
    clippy::multiple_crate_versions, // Sometimes not fixable
    clippy::module_name_repetitions,
    clippy::single_match_else,
)]

mod error;

pub mod config;
pub mod event;
pub mod handler;
pub mod http;
pub mod image;
pub mod render;
pub mod select;
pub mod store;

pub use self::error::*;
