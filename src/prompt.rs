use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use tracing::{debug, info};

use crate::{
    discovery::{Candidates, DeviceInfo, Discovery},
    error::Error,
    run_state::RunState,
    serial::{BaudRate, DataBits, LineSettings, Parity, StopBits},
};

/// Asks the operator questions, one line at a time.
///
/// Used before the menu takes over the terminal.
/// End of input means the operator gave up.
pub struct Prompt<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    /// Ask on `output`, read answers from `input`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Give back the output, with everything asked so far.
    pub fn into_output(self) -> W {
        self.output
    }

    /// One trimmed line, or `None` at end of input.
    fn answer(&mut self, question: &str) -> Result<Option<String>, Error> {
        write!(self.output, "{question}")?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        Ok(Some(line.trim().to_owned()))
    }

    /// Keep answering until the answer parses.
    fn answer_parsed<T: std::str::FromStr>(&mut self, question: &str) -> Result<Option<T>, Error> {
        loop {
            let Some(answer) = self.answer(question)? else {
                return Ok(None);
            };

            match answer.parse() {
                Ok(value) => return Ok(Some(value)),
                Err(_) => writeln!(self.output, "Invalid value `{answer}`.")?,
            }
        }
    }

    /// Scan for devices until the operator picks one.
    ///
    /// Answering `r` scans again.
    /// Returns the chosen path together with the scan it came from,
    /// or `None` if input ended or a stop was requested.
    pub fn choose_device<F>(
        &mut self,
        discovery: &Discovery,
        describe: F,
        run_state: &RunState,
    ) -> Result<Option<(Candidates, PathBuf)>, Error>
    where
        F: Fn(&Path) -> Option<DeviceInfo>,
    {
        while run_state.is_running() {
            let candidates = discovery.scan();

            if candidates.is_empty() {
                let families = discovery
                    .families()
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(" or ");
                writeln!(self.output, "No serial devices found ({families}).")?;

                if self.answer("Press [r] to retry: ")?.is_none() {
                    return Ok(None);
                }
                continue;
            }

            writeln!(self.output, "\nDevices found:")?;
            for (index, path) in candidates.paths().iter().enumerate() {
                writeln!(self.output, "[{index}] {}", path.display())?;
                if let Some(info) = describe(path) {
                    writeln!(self.output, "   {info}")?;
                }
            }

            let Some(answer) = self.answer("Select interface (number) or [r] to retry: ")? else {
                return Ok(None);
            };

            if answer.eq_ignore_ascii_case("r") {
                continue;
            }

            let chosen = match answer.parse::<i64>() {
                Ok(index) => candidates.select(index).map(Path::to_path_buf),
                Err(_) => {
                    writeln!(self.output, "Invalid selection.")?;
                    continue;
                }
            };

            match chosen {
                Ok(path) => {
                    info!(path = %path.display(), "Device selected");
                    writeln!(self.output, "Using: {}", path.display())?;
                    return Ok(Some((candidates, path)));
                }
                Err(e @ Error::SelectionOutOfRange { .. }) => {
                    debug!(%e, "Bad selection");
                    writeln!(self.output, "Invalid selection. {e}.")?;
                }
                Err(e) => return Err(e),
            }
        }

        Ok(None)
    }

    /// Show the current settings and ask whether to keep them.
    ///
    /// Returns the new settings if the operator chose to configure,
    /// `None` if they accepted the current ones (or input ended).
    /// Unsupported values fall back to defaults rather than being refused.
    pub fn line_settings(
        &mut self,
        current: Option<&LineSettings>,
    ) -> Result<Option<LineSettings>, Error> {
        writeln!(self.output, "\n--- UART configuration (current) ---")?;
        match current {
            Some(settings) => {
                writeln!(self.output, "Baudrate: {}", settings.baud)?;
                writeln!(self.output, "Data bits: {}", settings.data_bits.as_u8())?;
                writeln!(self.output, "Parity: {}", settings.parity)?;
                writeln!(self.output, "Stop bits: {}", settings.stop_bits.as_u8())?;
            }
            None => writeln!(self.output, "(could not be read)")?,
        }
        writeln!(self.output, "------------------------------------")?;

        let Some(answer) = self.answer("[a]ccept or [c]onfigure? ")? else {
            return Ok(None);
        };

        if !answer.to_ascii_lowercase().starts_with('c') {
            writeln!(self.output, "Keeping the current configuration.")?;
            return Ok(None);
        }

        let Some(baud) = self.answer_parsed::<u32>("Baudrate (e.g. 9600, 115200): ")? else {
            return Ok(None);
        };
        let Some(data_bits) = self.answer_parsed::<u8>("Data bits (5, 6, 7, 8): ")? else {
            return Ok(None);
        };
        let Some(parity) = self.answer("Parity (n = none, e = even, o = odd): ")? else {
            return Ok(None);
        };
        let Some(stop_bits) = self.answer_parsed::<u8>("Stop bits (1 or 2): ")? else {
            return Ok(None);
        };

        let settings = LineSettings {
            baud: BaudRate::from_requested(baud),
            data_bits: DataBits::from_requested(data_bits),
            parity: parity
                .chars()
                .next()
                .map_or(Parity::None, Parity::from_requested),
            stop_bits: StopBits::from_requested(stop_bits),
        };

        writeln!(self.output, "Using {settings}.")?;

        Ok(Some(settings))
    }
}
