use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::{
    discovery::Candidates,
    error::Error,
    receiver::ReceiverHandle,
    run_state::RunState,
    serial::Port,
};

/// Everything a session holds that must be released, in order.
///
/// Running it consumes it, so it can only happen once.
#[derive(Debug)]
pub struct Shutdown<P> {
    run_state: RunState,
    receiver: Option<ReceiverHandle>,
    port: Arc<P>,
    candidates: Option<Candidates>,
}

impl<P: Port> Shutdown<P> {
    /// Gather what is to be torn down.
    pub fn new(
        run_state: RunState,
        receiver: Option<ReceiverHandle>,
        port: Arc<P>,
        candidates: Option<Candidates>,
    ) -> Self {
        Self {
            run_state,
            receiver,
            port,
            candidates,
        }
    }

    /// Tear down.
    ///
    /// 1. Request stop.
    /// 2. Wait for the receive loop to return. No timeout: it looks at the run state every poll interval.
    /// 3. Close the port. Never before step 2, the receiving thread may be mid-read.
    /// 4. Drop the discovery results.
    /// 5. Mark the run state stopped.
    pub fn run(self) -> Result<(), Error> {
        let Self {
            run_state,
            receiver,
            port,
            candidates,
        } = self;

        if run_state.request_stop() {
            debug!("Stop requested by shutdown");
        }

        if let Some(receiver) = receiver {
            match receiver.join() {
                Ok(phase) => debug!(%phase, "Receive loop joined"),
                Err(e) => error!(?e, "Receive loop did not stop cleanly"),
            }
        }

        let name = port.name().to_owned();
        let closed = match Arc::try_unwrap(port) {
            Ok(port) => port.close().map_err(Error::from),
            Err(port) => {
                warn!(%name, holders = Arc::strong_count(&port), "Port still shared, not closing it here");
                Err(Error::PortStillShared(name.clone()))
            }
        };

        drop(candidates);
        run_state.mark_stopped();

        closed?;
        info!(%name, "Session shut down");

        Ok(())
    }
}
