use std::{
    io,
    sync::{Mutex, PoisonError},
};

use tracing::warn;

use crate::{
    operation::Operation,
    serial::{codecs::frame::DisplayRecord, error::SerialPortError},
};

/// What happened when an operation was written.
#[derive(Debug)]
pub enum TxOutcome {
    /// The whole frame was accepted.
    Sent {
        /// Bytes written.
        written: usize,
    },

    /// Fewer bytes were accepted than the frame has.
    /// A warning, not a failure.
    Partial {
        /// Bytes written.
        written: usize,

        /// Bytes in the frame.
        expected: usize,
    },

    /// The write failed. Only this send is affected.
    Failed(SerialPortError),
}

impl TxOutcome {
    /// Whether the full frame went out.
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }
}

/// Something that shows session events to the operator.
///
/// Implementors are only ever reached through a [`DisplaySink`], one caller at a time.
pub trait Surface: Send {
    /// Bytes arrived from the device.
    fn render_rx(&mut self, record: &DisplayRecord) -> io::Result<()>;

    /// An operation was (or failed to be) sent.
    fn render_tx(&mut self, operation: &Operation, outcome: &TxOutcome) -> io::Result<()>;

    /// A line of status, for problems that don't stop the session.
    fn render_status(&mut self, status: &str) -> io::Result<()>;
}

/// The display, shared by the sending and receiving activities.
///
/// Every method takes the lock, does its drawing and lets go before returning.
/// There is no way to hold on to the surface across calls.
#[derive(Debug)]
pub struct DisplaySink<S> {
    surface: Mutex<S>,
}

impl<S: Surface> DisplaySink<S> {
    /// Share `surface`.
    pub fn new(surface: S) -> Self {
        Self {
            surface: Mutex::new(surface),
        }
    }

    /// Run `f` with exclusive access to the surface.
    pub fn with_exclusive<R>(&self, f: impl FnOnce(&mut S) -> R) -> R {
        // A panic while drawing leaves nothing half-updated that matters.
        let mut surface = self.surface.lock().unwrap_or_else(PoisonError::into_inner);

        f(&mut surface)
    }

    /// Show received bytes.
    pub fn render_rx(&self, record: &DisplayRecord) {
        if let Err(e) = self.with_exclusive(|surface| surface.render_rx(record)) {
            warn!(?e, "Could not show received bytes");
        }
    }

    /// Show the result of sending an operation.
    pub fn render_tx(&self, operation: &Operation, outcome: &TxOutcome) {
        if let Err(e) = self.with_exclusive(|surface| surface.render_tx(operation, outcome)) {
            warn!(?e, "Could not show sent operation");
        }
    }

    /// Show a status line.
    pub fn render_status(&self, status: &str) {
        if let Err(e) = self.with_exclusive(|surface| surface.render_status(status)) {
            warn!(?e, "Could not show status");
        }
    }

    /// Take the surface back.
    pub fn into_inner(self) -> S {
        self.surface
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }
}
