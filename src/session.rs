use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    sync::Arc,
};

use tracing::{debug, info, warn};

#[cfg(unix)]
use crate::serial::serial_port::SerialPort;

use crate::{
    config::Config,
    discovery::{self, Candidates, Discovery},
    display::{DisplaySink, Surface},
    error::Error,
    mock::MockPort,
    prompt::Prompt,
    receiver,
    run_state::{ReadySignal, RunState},
    serial::{BaudRate, LineSettings, Port},
    shutdown::Shutdown,
    terminal::{TerminalMenu, TerminalSurface},
    transmitter::{self, OperationSource, TransmitSummary},
};

/// How a session should start.
#[derive(Debug, Clone, Default)]
pub struct SessionOptions {
    /// Defaults for discovery and line settings.
    pub config: Config,

    /// Use this device instead of asking.
    pub device: Option<PathBuf>,

    /// Open at this baud rate instead of the configured one.
    pub baud: Option<u32>,

    /// Apply the configured line settings without asking.
    pub accept: bool,

    /// Talk to a simulated FPGA instead of a device.
    pub mock: bool,
}

impl SessionOptions {
    /// The configured line settings, with the baud rate override applied.
    pub fn line(&self) -> LineSettings {
        let mut line = self.config.line;

        if let Some(baud) = self.baud {
            line.baud = BaudRate::from_requested(baud);
        }

        line
    }
}

/// Run a whole interactive session on the process' terminal.
///
/// Returns `None` if the operator gave up before a port was opened.
pub fn run(
    options: SessionOptions,
    run_state: RunState,
) -> Result<Option<TransmitSummary>, Error> {
    let stdin = io::stdin();
    let mut prompt = Prompt::new(stdin.lock(), io::stdout());
    let line = options.line();

    if options.mock {
        info!("Using the simulated FPGA");
        let port = MockPort::fpga("mock-fpga");

        return run_with_port(port, None, line, options.accept, &mut prompt, run_state).map(Some);
    }

    let (candidates, path) = match options.device.clone() {
        Some(path) => (None, path),
        None => {
            let discovery = Discovery::new(options.config.device_families.clone());

            match prompt.choose_device(&discovery, discovery::device_info, &run_state)? {
                Some((candidates, path)) => (Some(candidates), path),
                None => {
                    info!("No device chosen");
                    return Ok(None);
                }
            }
        }
    };

    let port = open(path, line)?;

    run_with_port(port, candidates, line, options.accept, &mut prompt, run_state).map(Some)
}

#[cfg(unix)]
fn open(path: PathBuf, line: LineSettings) -> Result<SerialPort, Error> {
    let port = SerialPort::open(&path, line.baud.as_u32())?;
    info!(path = %path.display(), baud = %line.baud, "Port opened");

    Ok(port)
}

#[cfg(not(unix))]
fn open(path: PathBuf, _line: LineSettings) -> Result<MockPort, Error> {
    Err(Error::BadConfig(format!(
        "Cannot open {}: serial devices are only supported on unix",
        path.display()
    )))
}

/// Settle the line settings, then hand the port to [`drive`] on the terminal.
pub fn run_with_port<P, R, W>(
    port: P,
    candidates: Option<Candidates>,
    line: LineSettings,
    accept: bool,
    prompt: &mut Prompt<R, W>,
    run_state: RunState,
) -> Result<TransmitSummary, Error>
where
    P: Port,
    R: BufRead,
    W: Write,
{
    if let Err(e) = configure(&port, line, accept, prompt) {
        // Nothing else has the port yet, so it can be closed right away.
        if let Err(close_error) = port.close() {
            warn!(?close_error, "Could not close the port after a failed configuration");
        }
        return Err(e);
    }

    let port = Arc::new(port);

    let surface = match TerminalSurface::new() {
        Ok(surface) => surface,
        Err(e) => {
            Shutdown::new(run_state, None, port, candidates).run()?;
            return Err(e.into());
        }
    };
    let display = Arc::new(DisplaySink::new(surface));
    let mut menu = TerminalMenu::new(display.clone());

    let summary = drive(port, &mut menu, display, run_state, candidates);

    // Dropping the last display handle restores the terminal.
    drop(menu);

    summary
}

/// Commit the configured line settings, then let the operator keep or change them.
fn configure<P, R, W>(
    port: &P,
    line: LineSettings,
    accept: bool,
    prompt: &mut Prompt<R, W>,
) -> Result<(), Error>
where
    P: Port,
    R: BufRead,
    W: Write,
{
    port.reconfigure(&line)?;
    info!(settings = %line, "Line configured");

    if accept {
        return Ok(());
    }

    let current = match port.settings() {
        Ok(current) => Some(current),
        Err(e) => {
            warn!(?e, "Could not read the current line settings");
            None
        }
    };

    if let Some(settings) = prompt.line_settings(current.as_ref())? {
        port.reconfigure(&settings)?;
        info!(%settings, "Line reconfigured by the operator");
    }

    Ok(())
}

/// Both loops, then the ordered shutdown.
///
/// The receive loop is started and released before operations are asked for.
/// Whatever happens in between, the port is handed to [`Shutdown`] at the end.
pub fn drive<P, O, S>(
    port: Arc<P>,
    source: &mut O,
    display: Arc<DisplaySink<S>>,
    run_state: RunState,
    candidates: Option<Candidates>,
) -> Result<TransmitSummary, Error>
where
    P: Port,
    O: OperationSource,
    S: Surface + 'static,
{
    let ready = ReadySignal::new();

    let receiver = match receiver::spawn(
        port.clone(),
        display.clone(),
        run_state.clone(),
        ready.clone(),
    ) {
        Ok(receiver) => receiver,
        Err(e) => {
            if let Err(shutdown_error) = Shutdown::new(run_state, None, port, candidates).run() {
                warn!(?shutdown_error, "Shutdown after a failed start did not go cleanly");
            }
            return Err(e);
        }
    };

    display.render_status(&format!("Connected to {}", port.name()));
    ready.signal();

    let summary = transmitter::run(&*port, source, &*display, &run_state);
    debug!(?summary, "Transmitting done, shutting down");

    Shutdown::new(run_state, Some(receiver), port, candidates).run()?;

    Ok(summary)
}
