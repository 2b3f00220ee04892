//! # Funding step tracker
//!
//! Tracks where a user session sits in the funding pipeline
//! (`funding_info` → … → `dashboard`), validates every move against a fixed
//! transition table, confirms it with the steps backend, and caches the
//! result in SQLite so a restarted client renders the right step at once.
//!
//! | Module         | Role                                                   |
//! |----------------|--------------------------------------------------------|
//! | [`steps`]      | `FundingStep` / `DashboardSubstep` and wire names      |
//! | [`transitions`]| one-hop adjacency table                                |
//! | [`state`]      | the `StepState` aggregate                              |
//! | [`store`]      | replay-latest broadcast, read-only handles             |
//! | [`api_client`] | backend seam and its HTTP implementation               |
//! | [`cache`]      | durable SQLite cache                                   |
//! | [`sync`]       | `StepSync`, the single writer                          |
//! | [`routes`]     | page routes and redirect decisions                     |
//! | [`reconciler`] | periodic backend reconciliation                        |
//! | [`api`]        | local REST surface                                     |

pub mod api;
pub mod api_client;
pub mod cache;
pub mod config;
pub mod errors;
pub mod reconciler;
pub mod routes;
pub mod state;
pub mod steps;
pub mod store;
pub mod sync;
pub mod transitions;

#[cfg(test)]
mod test_sync;

pub use api_client::{HttpStepBackend, RemoteStep, StepBackend};
pub use cache::LocalCache;
pub use errors::{Result, StepError};
pub use state::StepState;
pub use steps::{DashboardSubstep, FundingStep};
pub use store::StepStateReader;
pub use sync::StepSync;
