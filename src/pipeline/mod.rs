//! The per-page processing pipeline.
//!
//! Each address flows through the stages in order:
//!
//! ```text
//! fetch ──▶ transform ──▶ images
//!   │           │            │
//!   │           │            └── download, cache, inline as data URIs
//!   │           └── strip noise, relocate notes, collect image refs
//!   └── strategy cascade (direct / no-proxy / http / curl)
//! ```
//!
//! [`page`] glues the stages together for one address; [`classify`]
//! holds the element heuristics the transform stage consults. The batch
//! orchestrator in [`crate::batch`] drives many pages concurrently.

pub mod classify;
pub mod fetch;
pub mod images;
pub mod page;
pub mod transform;
