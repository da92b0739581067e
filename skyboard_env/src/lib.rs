//! Skyboard Environment Abstraction Layer
//!
//! This crate provides the seams between the pure control kernel and the
//! outside world so that every unit can run against the **Production**
//! (tokio) clock or a **Simulation** (virtual) clock:
//! - Time (`now()`, `sleep()`)
//! - Entropy (`derive_seed()`)
//! - Transport: typed byte-framed channels and payload-less signals
//!
//! No two units share memory. Everything they exchange goes through a
//! [`FrameSender`]/[`FrameReceiver`] pair or a [`SignalSender`]/[`SignalReceiver`] pair.
//!
//! # Example
//!
//! ```ignore
//! use skyboard_env::{ArenaContext, Frame};
//!
//! async fn unit_loop<Ctx: ArenaContext>(ctx: &Ctx, rx: &mut FrameReceiver<KeyMsg>) {
//!     loop {
//!         tokio::select! {
//!             frame = rx.recv() => handle(frame),
//!             _ = ctx.sleep(Duration::from_millis(100)) => idle(),
//!         }
//!     }
//! }
//! ```

mod bus;
mod context;
mod error;
mod signal;
mod tokio_impl;
mod types;

pub use bus::{channel, Frame, FrameCursor, FrameReceiver, FrameSender, WireMessage};
pub use context::ArenaContext;
pub use error::BusError;
pub use signal::{signal, SignalReceiver, SignalSender};
pub use tokio_impl::TokioContext;
pub use types::{UnitId, UnitRole};
