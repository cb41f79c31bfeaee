//! # DRILLZ Core Library
//!
//! Adaptive practice scheduling for quizzes that drill atomic facts
//! (note names, intervals, chord spellings, vocabulary...).
//!
//! Given a pool of items and the running history of how quickly and how
//! correctly a learner answered each one, the engine decides:
//!
//! - **What next**: [`Selector`] draws the next item, biased toward stale
//!   and slow items, never repeating the previous pick.
//! - **How mastered**: [`MemoryModel`] keeps one [`ItemRecord`] per item and
//!   derives recall (half-life forgetting curve), speed (EWMA latency) and
//!   their product, *automaticity*.
//! - **What to focus on**: [`recommendation::compute_recommendations`]
//!   applies a consolidate-before-expand policy over item groups.
//! - **Whose speed**: [`calibration`] measures a learner's motor baseline and
//!   rescales every time constant of the [`SchedulerConfig`].
//! - **How far along**: [`progress`] buckets items into [`MasteryLevel`]s and
//!   summarises a pool for heatmaps.
//!
//! Storage, time and randomness are injected: see [`Storage`], [`Clock`] and
//! the `R: rand::Rng` parameter of [`Selector`].
//!
//! ## Performance Contract
//!
//! Every public operation is synchronous and runs to completion:
//! - `record_response`: one storage read + one write
//! - `select_next` (500 items): < 200μs with an in-memory store
//! - `compute_recommendations` (12 groups × 12 items): < 200μs

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod calibration;
pub mod clock;
pub mod config;
pub mod decay;
pub mod error;
pub mod memory;
pub mod persistence;
pub mod progress;
pub mod recommendation;
pub mod selection;
pub mod storage;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DrillzConfig, SchedulerConfig};
pub use error::DrillzError;
pub use memory::{MemoryModel, ProgressSource};
pub use progress::{MasteryLevel, ProgressSummary};
pub use recommendation::Recommendation;
pub use selection::Selector;
pub use storage::{InMemoryStore, Storage};
pub use types::*;
