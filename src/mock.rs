//! A mock, useful to test serial port functionality without the actual serial ports.
//!
//! It can also stand in for the FPGA:
//! every complete three byte frame written to it is answered with one result byte.

use std::{
    collections::VecDeque,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use tracing::{debug, trace, warn};

use crate::{
    operation::Opcode,
    serial::{codecs::frame::FRAME_LEN, error::SerialPortError, LineSettings, Port},
};

/// Something that happened to a [`MockPort`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockEvent {
    /// A read, and how many bytes it returned.
    Read(usize),

    /// A write, and how many bytes were accepted.
    Write {
        /// What the caller asked to write.
        bytes: Vec<u8>,

        /// How many of them the mock took.
        accepted: usize,
    },

    /// The line settings were committed.
    Reconfigure(LineSettings),

    /// The port was closed.
    Close,
}

#[derive(Debug, Default)]
struct MockState {
    inbound: VecDeque<u8>,
    written: Vec<u8>,
    pending_frame: Vec<u8>,
    settings: LineSettings,
    write_limit: Option<usize>,
    fail_reads: bool,
    fail_writes: bool,
    simulate_fpga: bool,
    events: Vec<MockEvent>,
    use_after_close: usize,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<MockState>,
    closed: AtomicBool,
}

impl Shared {
    fn state(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_open(&self, state: &mut MockState) -> Result<(), SerialPortError> {
        if self.closed.load(Ordering::Acquire) {
            warn!("Mock port used after close");
            state.use_after_close += 1;
            Err(SerialPortError::Closed)
        } else {
            Ok(())
        }
    }
}

/// An in-memory [`Port`].
///
/// Clones share one state, like duplicated descriptors of one device:
/// closing any of them closes them all.
#[derive(Debug, Clone)]
pub struct MockPort {
    name: String,
    shared: Arc<Shared>,
}

impl MockPort {
    /// A port that only returns what is pushed through a [`MockMonitor`].
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            shared: Arc::default(),
        }
    }

    /// A port answering each frame like the FPGA would.
    pub fn fpga(name: &str) -> Self {
        let port = Self::new(name);
        port.shared.state().simulate_fpga = true;

        port
    }

    /// A handle for inspecting and steering this port, which stays usable after close.
    pub fn monitor(&self) -> MockMonitor {
        MockMonitor {
            shared: self.shared.clone(),
        }
    }
}

fn answer_frames(state: &mut MockState) {
    while state.pending_frame.len() >= FRAME_LEN {
        let frame = state.pending_frame.drain(..FRAME_LEN).collect::<Vec<_>>();

        match Opcode::from_code(frame[0]) {
            Some(opcode) => {
                let result = opcode.apply(frame[1], frame[2]);
                trace!(%opcode, a = frame[1], b = frame[2], result, "Simulated FPGA answer");
                state.inbound.push_back(result);
            }
            None => debug!(code = frame[0], "Simulated FPGA ignores unknown opcode"),
        }
    }
}

impl Port for MockPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize, SerialPortError> {
        let mut state = self.shared.state();
        self.shared.check_open(&mut state)?;

        if state.fail_reads {
            return Err(SerialPortError::Read(io::Error::new(
                io::ErrorKind::Other,
                "mock read failure",
            )));
        }

        let n = buf.len().min(state.inbound.len());
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..n)) {
            *slot = byte;
        }

        state.events.push(MockEvent::Read(n));
        Ok(n)
    }

    fn write(&self, bytes: &[u8]) -> Result<usize, SerialPortError> {
        let mut state = self.shared.state();
        self.shared.check_open(&mut state)?;

        if state.fail_writes {
            return Err(SerialPortError::Write(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "mock write failure",
            )));
        }

        let accepted = state.write_limit.map_or(bytes.len(), |limit| bytes.len().min(limit));
        state.written.extend_from_slice(&bytes[..accepted]);
        state.events.push(MockEvent::Write {
            bytes: bytes.to_vec(),
            accepted,
        });

        if state.simulate_fpga {
            state.pending_frame.extend_from_slice(&bytes[..accepted]);
            answer_frames(&mut state);
        }

        Ok(accepted)
    }

    fn settings(&self) -> Result<LineSettings, SerialPortError> {
        let mut state = self.shared.state();
        self.shared.check_open(&mut state)?;

        Ok(state.settings)
    }

    fn reconfigure(&self, settings: &LineSettings) -> Result<(), SerialPortError> {
        let mut state = self.shared.state();
        self.shared.check_open(&mut state)?;

        state.settings = *settings;
        state.events.push(MockEvent::Reconfigure(*settings));

        Ok(())
    }

    fn close(self) -> Result<(), SerialPortError> {
        let mut state = self.shared.state();
        self.shared.check_open(&mut state)?;

        self.shared.closed.store(true, Ordering::Release);
        state.events.push(MockEvent::Close);
        debug!(name = %self.name, "Mock port closed");

        Ok(())
    }
}

/// Inspects and steers a [`MockPort`].
#[derive(Debug, Clone)]
pub struct MockMonitor {
    shared: Arc<Shared>,
}

impl MockMonitor {
    /// Make bytes available to the next reads.
    pub fn push_inbound(&self, bytes: &[u8]) {
        self.shared.state().inbound.extend(bytes);
    }

    /// Everything accepted by writes so far.
    pub fn written(&self) -> Vec<u8> {
        self.shared.state().written.clone()
    }

    /// Everything that happened, in order.
    pub fn events(&self) -> Vec<MockEvent> {
        self.shared.state().events.clone()
    }

    /// Number of reads so far.
    pub fn reads(&self) -> usize {
        self.shared
            .state()
            .events
            .iter()
            .filter(|event| matches!(event, MockEvent::Read(_)))
            .count()
    }

    /// Accept at most `limit` bytes per write.
    pub fn limit_writes(&self, limit: Option<usize>) {
        self.shared.state().write_limit = limit;
    }

    /// Make reads fail.
    pub fn fail_reads(&self, fail: bool) {
        self.shared.state().fail_reads = fail;
    }

    /// Make writes fail.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.state().fail_writes = fail;
    }

    /// Whether the port was closed.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// How many times the port was touched after being closed.
    pub fn use_after_close(&self) -> usize {
        self.shared.state().use_after_close
    }
}
