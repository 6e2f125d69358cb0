//! Client-side Rust SDK for Eppo, a next-generation feature flagging and experimentation
//! platform.
//!
//! # Overview
//!
//! The SDK revolves around an [`EppoClient`] owned by your application. An external evaluation
//! engine computes which variation a subject receives; the client's job is everything around
//! that: it stores flag configuration ([`Configuration`]) so the engine can read it
//! synchronously, and it deduplicates assignment events so your analytics storage isn't flooded
//! with one event per evaluation.
//!
//! Both concerns use the same two-tier design (see [`cache`]): an in-process memory tier serves
//! every read with zero I/O, and an optional persistent tier—an async key-value capability
//! ([`cache::PersistentStorage`]) supplied by the host environment—carries state across process
//! restarts. Writes go through to the persistent tier in the background; reads never wait on it.
//! Call [`EppoClient::init`] once at startup to hydrate the memory tiers.
//!
//! An [`AssignmentLogger`] should be provided to save assignment events to your storage,
//! facilitating tracking of which user received which feature flag values.
//!
//! # Error Handling
//!
//! Errors are represented by the [`Error`] enum.
//!
//! Nothing in the cache subsystem is fatal: storage failures degrade the SDK to memory-only
//! behavior (at worst, an occasional duplicate assignment event), and are logged rather than
//! returned. Errors surface only from client construction and from host-side
//! [`cache::PersistentStorage`] implementations.
//!
//! # Logging
//!
//! The package uses the [`log`](https://docs.rs/log/latest/log/) crate for logging
//! messages. Consider integrating a `log`-compatible logger implementation for better visibility
//! into SDK operations.

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(missing_docs)]

mod assignment_logger;
pub mod cache;
mod client;
mod configuration;
mod configuration_store;
mod error;
mod events;

pub use assignment_logger::AssignmentLogger;
pub use cache::PersistentStorage;
pub use client::{AttributeValue, ClientConfig, EppoClient, SubjectAttributes};
pub use configuration::{Allocation, Configuration, Flag, TryParse, Variation, VariationType};
pub use configuration_store::{
    ConfigurationStore, HybridConfigurationStore, InMemoryConfigurationStore,
};
pub use error::{Error, Result};
pub use events::{AssignmentEvent, EventMetaData};
