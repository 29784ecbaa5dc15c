//! Polls the port and shows whatever the device sends.
//!
//! The loop sleeps [`POLL_INTERVAL`] between reads, and each read waits at most
//! [`crate::serial::READ_TIMEOUT`].
//! A stop request is therefore noticed within roughly one interval.

use std::{
    fmt::Display,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
    thread::JoinHandle,
    time::Duration,
};

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::{debug, info, info_span, trace, warn};

use crate::{
    display::{DisplaySink, Surface},
    error::Error,
    run_state::{ReadySignal, RunState},
    serial::{codecs::frame::FrameCodec, Port},
};

/// Bytes asked for per read.
pub const READ_BUFFER_SIZE: usize = 256;

/// Pause between reads.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Where the receiving loop is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RxPhase {
    /// Waiting for the display to come up.
    WaitingForReady = 0,

    /// Reading from the port.
    Polling = 1,

    /// Returned. Will not touch the port again.
    Stopped = 2,
}

impl RxPhase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::WaitingForReady,
            1 => Self::Polling,
            _ => Self::Stopped,
        }
    }
}

impl Display for RxPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RxPhase::WaitingForReady => write!(f, "waiting for ready"),
            RxPhase::Polling => write!(f, "polling"),
            RxPhase::Stopped => write!(f, "stopped"),
        }
    }
}

/// A running receive loop.
#[derive(Debug)]
pub struct ReceiverHandle {
    phase: Arc<AtomicU8>,
    thread: JoinHandle<()>,
}

impl ReceiverHandle {
    /// Where the loop currently is.
    pub fn phase(&self) -> RxPhase {
        RxPhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Block until the loop has returned.
    ///
    /// Returns an error if the loop panicked.
    pub fn join(self) -> Result<RxPhase, Error> {
        let phase = self.phase;

        self.thread.join().map_err(|_| Error::ReceiverPanicked)?;

        Ok(RxPhase::from_u8(phase.load(Ordering::Acquire)))
    }
}

struct ReceiveLoop<P, S> {
    port: Arc<P>,
    display: Arc<DisplaySink<S>>,
    run_state: RunState,
    ready: ReadySignal,
    phase: Arc<AtomicU8>,
    poll_interval: Duration,
}

impl<P: Port, S: Surface> ReceiveLoop<P, S> {
    fn enter(&self, phase: RxPhase) {
        debug!(%phase, "Receive loop");
        self.phase.store(phase as u8, Ordering::Release);
    }

    fn run(self) {
        if !self.ready.wait_or_stop(&self.run_state) {
            self.enter(RxPhase::Stopped);
            return;
        }

        self.enter(RxPhase::Polling);

        let mut codec = FrameCodec;
        let mut staged = BytesMut::with_capacity(READ_BUFFER_SIZE);
        let mut buf = [0u8; READ_BUFFER_SIZE];

        while self.run_state.is_running() {
            match self.port.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => {
                    trace!(n, "Bytes from port");
                    staged.extend_from_slice(&buf[..n]);

                    if let Ok(Some(record)) = codec.decode(&mut staged) {
                        self.display.render_rx(&record);
                    }
                }
                Err(e) => {
                    // Never fatal. Only a stop request ends this loop.
                    warn!(?e, "Read problem, continuing");
                    self.display.render_status(&format!("[UART RX] read error: {e}"));
                }
            }

            std::thread::sleep(self.poll_interval);
        }

        self.enter(RxPhase::Stopped);
    }
}

/// Start receiving on a thread of its own.
///
/// The loop waits for `ready` before its first read,
/// and returns once `run_state` is no longer running.
/// It never writes to the port and never changes `run_state`.
pub fn spawn<P, S>(
    port: Arc<P>,
    display: Arc<DisplaySink<S>>,
    run_state: RunState,
    ready: ReadySignal,
) -> Result<ReceiverHandle, Error>
where
    P: Port,
    S: Surface + 'static,
{
    spawn_with_interval(port, display, run_state, ready, POLL_INTERVAL)
}

/// Like [`spawn`], with a custom pause between reads.
pub fn spawn_with_interval<P, S>(
    port: Arc<P>,
    display: Arc<DisplaySink<S>>,
    run_state: RunState,
    ready: ReadySignal,
    poll_interval: Duration,
) -> Result<ReceiverHandle, Error>
where
    P: Port,
    S: Surface + 'static,
{
    let phase = Arc::new(AtomicU8::new(RxPhase::WaitingForReady as u8));
    let span = info_span!("rx", port = %port.name());

    let receive_loop = ReceiveLoop {
        port,
        display,
        run_state,
        ready,
        phase: phase.clone(),
        poll_interval,
    };

    let thread = std::thread::Builder::new()
        .name("uart-rx".into())
        .spawn(move || {
            let _entered = span.enter();
            info!("Receive loop started");
            receive_loop.run();
            info!("Receive loop stopped");
        })
        .map_err(Error::ReceiverSpawn)?;

    Ok(ReceiverHandle { phase, thread })
}
