//! archivist - mirror remote channel/group history into local archives
//!
//! archivist continuously mirrors the message history and membership of
//! remote channels and groups into per-target SQLite archives. Ingestion is
//! checkpointed and idempotent, so interrupted runs resume from the last
//! durably stored message; fleet membership sweeps are paced and rate
//! limited; a continuous poll loop keeps registered targets fresh.
//!
//! The remote messaging protocol itself lives in a separate gateway process
//! consumed through the [`source::MessageSource`] trait. Credential and
//! session handling belong to the gateway, not to this crate.
//!
//! # Single-process assumption
//!
//! All stores (the registry and every target archive) assume exactly one
//! archivist process per base directory. Control flow is strictly
//! sequential; the only suspension points are remote calls, media downloads
//! and timed sleeps, and cancellation is honored only between discrete
//! units of work. Running concurrent processes against the same base
//! directory is undefined behavior; add external mutual exclusion (such as
//! a lock file on the base directory) if a deployment needs it.

pub mod archive;
pub mod commands;
pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod media;
pub mod progress;
pub mod registry;
pub mod source;
pub mod sweep;
pub mod watch;
