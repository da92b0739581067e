//! Skyboard runtime
//!
//! Runs each unit of the drone arena as its own tokio task. Units share no
//! memory; they talk only through the typed channels and signals of
//! `skyboard_env`.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐ keys  ┌─────────────┐ force  ┌──────────┐
//!  │ Keyboard ├──────►│             ├───────►│          │
//!  └──────────┘       │             │ state  │ Dynamics │
//!  ┌──────────┐ batch │ Coordinator │◄───────┤          │
//!  │ Obstacles├──────►│ (Blackboard)│        └──────────┘
//!  └──────────┘       │             │
//!  ┌──────────┐ batch │             │ heartbeat ┌──────────┐
//!  │ Targets  ├──────►│             ├──────────►│ Watchdog │
//!  └──────────┘       │             │◄──────────┤          │
//!                     └─────────────┘  warning  └────┬─────┘
//!                                                    │ stop (all units)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use skyboard_sim::{run_system, SystemConfig};
//! use skyboard_env::TokioContext;
//!
//! let ctx = TokioContext::shared();
//! let report = run_system(ctx, SystemConfig::default(), tokio::io::stdin(), None).await?;
//! ```

mod context;
pub mod coordinator;
pub mod dynamics;
mod error;
mod exporter;
pub mod generators;
pub mod keyboard;
mod system;
pub mod watchdog;

pub use context::SimContext;
pub use coordinator::{CoordinatorExit, CoordinatorReport};
pub use dynamics::DynamicsExit;
pub use error::SystemError;
pub use exporter::{run_exporter, SnapshotExporter};
pub use system::{run_system, SystemConfig, SystemReport};
pub use watchdog::{WatchdogExit, WatchdogReport};
