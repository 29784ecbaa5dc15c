use bytes::BytesMut;
use tokio_util::codec::Encoder;
use tracing::{debug, info, warn};

use crate::{
    display::{DisplaySink, Surface, TxOutcome},
    operation::Operation,
    run_state::RunState,
    serial::{
        codecs::frame::{FrameCodec, FRAME_LEN},
        error::SerialPortError,
        Port,
    },
};

/// Where operations to send come from.
pub trait OperationSource {
    /// Block until the operator picks the next operation.
    ///
    /// Returns `None` to abort, which ends the transmit loop.
    /// Implementations should return `None` soon after `run_state` stops running.
    fn next(&mut self, run_state: &RunState) -> Option<Operation>;
}

/// Counts of what the transmit loop did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransmitSummary {
    /// Operations fully written.
    pub sent: usize,

    /// Operations only partially written.
    pub partial: usize,

    /// Operations that failed to write.
    pub failed: usize,
}

/// Encode one operation and write it in a single call.
pub fn send<P: Port>(port: &P, operation: &Operation) -> TxOutcome {
    let mut frame = BytesMut::with_capacity(FRAME_LEN);

    if let Err(e) = FrameCodec.encode(*operation, &mut frame) {
        return TxOutcome::Failed(SerialPortError::Write(e));
    }

    match port.write(&frame) {
        Ok(written) if written == frame.len() => {
            debug!(%operation, "Sent");
            TxOutcome::Sent { written }
        }
        Ok(written) => {
            warn!(%operation, written, expected = frame.len(), "Partial write");
            TxOutcome::Partial {
                written,
                expected: frame.len(),
            }
        }
        Err(e) => {
            warn!(%operation, ?e, "Write failed");
            TxOutcome::Failed(e)
        }
    }
}

/// Send operations until the source aborts or a stop is requested.
///
/// Write problems are shown and counted, they don't end the loop.
pub fn run<P, O, S>(
    port: &P,
    source: &mut O,
    display: &DisplaySink<S>,
    run_state: &RunState,
) -> TransmitSummary
where
    P: Port,
    O: OperationSource,
    S: Surface,
{
    let mut summary = TransmitSummary::default();

    while run_state.is_running() {
        let Some(operation) = source.next(run_state) else {
            debug!("Operation source aborted");
            break;
        };

        // The source may have returned just as a stop came in.
        if !run_state.is_running() {
            break;
        }

        let outcome = send(port, &operation);

        match outcome {
            TxOutcome::Sent { .. } => summary.sent += 1,
            TxOutcome::Partial { .. } => summary.partial += 1,
            TxOutcome::Failed(_) => summary.failed += 1,
        }

        display.render_tx(&operation, &outcome);
    }

    info!(?summary, "Transmit loop done");

    summary
}
