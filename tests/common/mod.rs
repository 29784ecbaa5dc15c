#![allow(dead_code)]

use std::{
    collections::VecDeque,
    io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use color_eyre::Result;
use uart_alu::{
    display::{Surface, TxOutcome},
    operation::Operation,
    run_state::RunState,
    serial::codecs::frame::DisplayRecord,
    transmitter::OperationSource,
};

/// Hands out a fixed list of operations, then aborts.
pub struct ScriptedSource {
    operations: VecDeque<Operation>,
    pause: Duration,
}

impl ScriptedSource {
    pub fn new(operations: impl IntoIterator<Item = Operation>) -> Self {
        Self {
            operations: operations.into_iter().collect(),
            pause: Duration::ZERO,
        }
    }

    /// Wait this long before handing out each operation, like an operator would.
    pub fn with_pause(mut self, pause: Duration) -> Self {
        self.pause = pause;
        self
    }
}

impl OperationSource for ScriptedSource {
    fn next(&mut self, _run_state: &RunState) -> Option<Operation> {
        std::thread::sleep(self.pause);
        self.operations.pop_front()
    }
}

/// What a [`RecordingSurface`] was asked to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Shown {
    Rx(Vec<u8>),
    Sent(Operation),
    Partial {
        operation: Operation,
        written: usize,
    },
    Failed(Operation),
    Status(String),
}

/// Remembers everything rendered, readable from outside through a [`Recording`].
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    shown: Arc<Mutex<Vec<Shown>>>,
}

impl RecordingSurface {
    pub fn new() -> (Self, Recording) {
        let surface = Self::default();
        let recording = Recording {
            shown: surface.shown.clone(),
        };

        (surface, recording)
    }

    fn push(&self, shown: Shown) {
        self.shown.lock().unwrap().push(shown);
    }
}

impl Surface for RecordingSurface {
    fn render_rx(&mut self, record: &DisplayRecord) -> io::Result<()> {
        self.push(Shown::Rx(record.bytes().to_vec()));
        Ok(())
    }

    fn render_tx(&mut self, operation: &Operation, outcome: &TxOutcome) -> io::Result<()> {
        self.push(match outcome {
            TxOutcome::Sent { .. } => Shown::Sent(*operation),
            TxOutcome::Partial { written, .. } => Shown::Partial {
                operation: *operation,
                written: *written,
            },
            TxOutcome::Failed(_) => Shown::Failed(*operation),
        });
        Ok(())
    }

    fn render_status(&mut self, status: &str) -> io::Result<()> {
        self.push(Shown::Status(status.to_owned()));
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Recording {
    shown: Arc<Mutex<Vec<Shown>>>,
}

impl Recording {
    pub fn shown(&self) -> Vec<Shown> {
        self.shown.lock().unwrap().clone()
    }

    /// All received bytes, in arrival order.
    pub fn received(&self) -> Vec<u8> {
        self.shown()
            .into_iter()
            .filter_map(|shown| match shown {
                Shown::Rx(bytes) => Some(bytes),
                _ => None,
            })
            .flatten()
            .collect()
    }

    /// Poll until `received()` has at least `n` bytes.
    pub fn wait_for_received(&self, n: usize, timeout: Duration) -> Result<Vec<u8>> {
        let start = Instant::now();

        loop {
            let received = self.received();
            if received.len() >= n {
                return Ok(received);
            }
            if start.elapsed() > timeout {
                color_eyre::eyre::bail!("Only got {received:?} after {timeout:?}");
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}

/// A fresh directory under the system temp dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

impl TempDir {
    pub fn new() -> Result<Self> {
        let path = std::env::temp_dir().join(format!("uart-alu-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&path)?;

        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create empty files with these names.
    pub fn touch(&self, names: &[&str]) -> Result<()> {
        for name in names {
            std::fs::File::create(self.path.join(name))?;
        }

        Ok(())
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
