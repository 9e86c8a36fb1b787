//! Signal/slot system for Asset Lattice.
//!
//! Models and stores announce mutations through signals. A render layer (or a
//! test) connects slots to the signals it cares about and receives the
//! change description once the mutation has been fully applied.
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - The signal type for emitting notifications
//! - [`ConnectionId`] - Unique identifier returned when connecting a slot
//!
//! # Threading
//!
//! The data-binding core is single-threaded: every slot runs synchronously on
//! the emitting thread, in connection order. Slots must still be
//! `Send + Sync` so a store owning signals can be handed to another thread
//! as a whole.
//!
//! # Example
//!
//! ```
//! use asset_lattice_core::Signal;
//!
//! let rows_inserted = Signal::<(usize, usize)>::new();
//!
//! let conn_id = rows_inserted.connect(|(first, last)| {
//!     println!("rows {first}..={last} inserted");
//! });
//!
//! rows_inserted.emit((0, 4));
//! rows_inserted.disconnect(conn_id);
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use slotmap::{new_key_type, SlotMap};

use crate::logging::targets;

new_key_type! {
    /// A unique identifier for a signal-slot connection.
    ///
    /// Use this ID to disconnect a specific connection via [`Signal::disconnect`].
    pub struct ConnectionId;
}

type Slot<Args> = Arc<dyn Fn(&Args) + Send + Sync>;

/// A type-safe signal that can have multiple connected slots.
///
/// When a signal is emitted, every connected slot is invoked with a reference
/// to the arguments. Use `()` for signals without arguments, or a tuple /
/// struct for richer payloads.
pub struct Signal<Args> {
    connections: Mutex<SlotMap<ConnectionId, Slot<Args>>>,
    blocked: AtomicBool,
}

impl<Args> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args> std::fmt::Debug for Signal<Args> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("connections", &self.connection_count())
            .field("blocked", &self.is_blocked())
            .finish()
    }
}

impl<Args> Signal<Args> {
    /// Create a new signal with no connections.
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(SlotMap::with_key()),
            blocked: AtomicBool::new(false),
        }
    }

    /// Connect a slot (closure) to this signal.
    ///
    /// Returns a `ConnectionId` that can be used to disconnect the slot later.
    pub fn connect<F>(&self, slot: F) -> ConnectionId
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.connections.lock().insert(Arc::new(slot))
    }

    /// Disconnect a specific slot by its connection ID.
    ///
    /// Returns `true` if the connection was found and removed, `false` otherwise.
    pub fn disconnect(&self, id: ConnectionId) -> bool {
        self.connections.lock().remove(id).is_some()
    }

    /// Disconnect all slots from this signal.
    pub fn disconnect_all(&self) {
        self.connections.lock().clear();
    }

    /// Get the number of connected slots.
    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    /// Block signal emission temporarily.
    ///
    /// While blocked, calls to `emit()` do nothing. Useful during bulk
    /// rebuilds that announce themselves with a single reset afterwards.
    pub fn set_blocked(&self, blocked: bool) {
        self.blocked.store(blocked, Ordering::SeqCst);
    }

    /// Check if signal emission is currently blocked.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::SeqCst)
    }

    /// Emit the signal, invoking all connected slots in connection order.
    ///
    /// The connection table is snapshotted before any slot runs, so a slot
    /// may connect or disconnect on the same signal without deadlocking.
    pub fn emit(&self, args: Args) {
        if self.is_blocked() {
            tracing::trace!(target: targets::SIGNAL, "signal blocked, skipping emit");
            return;
        }

        let slots: Vec<Slot<Args>> = self.connections.lock().values().cloned().collect();
        tracing::trace!(target: targets::SIGNAL, connection_count = slots.len(), "emitting signal");

        for slot in slots {
            slot(&args);
        }
    }
}

static_assertions::assert_impl_all!(Signal<(usize, usize)>: Send, Sync);
