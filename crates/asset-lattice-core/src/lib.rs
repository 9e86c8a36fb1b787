//! Core systems for Asset Lattice.
//!
//! This crate provides the infrastructure shared by the data-binding models:
//!
//! - **Signal/Slot System**: change notification from models to render layers
//! - **Logging**: tracing targets, span names and a performance span guard
//!
//! # Signal Example
//!
//! ```
//! use asset_lattice_core::Signal;
//!
//! let value_changed = Signal::<i32>::new();
//! let conn_id = value_changed.connect(|value| {
//!     println!("Value changed to: {}", value);
//! });
//!
//! value_changed.emit(42);
//! value_changed.disconnect(conn_id);
//! ```

pub mod logging;
pub mod signal;

pub use logging::PerfSpan;
pub use signal::{ConnectionId, Signal};
