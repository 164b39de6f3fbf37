//! reader-core — Pure types, errors, and text processing for the reader engine.
//!
//! No async runtime, no network I/O, no platform dependencies. Parsing of
//! already-fetched document bytes (HTML/PDF/EPUB) lives here because it is
//! pure transformation; acquiring those bytes over the network is
//! `reader-engine`'s job.

pub mod error;
pub mod extract;
pub mod normaliser;
pub mod timeline;
pub mod types;

pub use error::ReaderError;
