//! Full screen terminal menu.
//!
//! Layout, top to bottom: the operation menu, a key hint, operand prompts,
//! then the last sent operation, the last received bytes and a status line at the bottom.

use std::{
    io::{self, Stdout},
    sync::Arc,
    time::Duration,
};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use itertools::Itertools;
use tracing::{debug, warn};
use tui::{
    backend::{Backend, CrosstermBackend},
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    text::{Span, Spans},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame, Terminal,
};

use crate::{
    display::{DisplaySink, Surface, TxOutcome},
    operation::{Opcode, Operation},
    run_state::RunState,
    serial::codecs::frame::{encode, DisplayRecord},
    transmitter::OperationSource,
};

/// How long to wait for a key before looking at the run state again.
const INPUT_POLL: Duration = Duration::from_millis(200);

const HINT: &str = "Use arrows and ENTER to choose, ESC cancels an operand, q quits.";

fn timestamp() -> String {
    chrono::Local::now().format("%H:%M:%S%.3f").to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    A,
    B,
}

/// Everything on screen. Drawing is a pure function of this.
#[derive(Debug, Default)]
struct Screen {
    menu: ListState,
    operands: [Option<String>; 2],
    tx: Option<(String, Color)>,
    rx: Option<String>,
    status: Option<String>,
}

impl Screen {
    fn new() -> Self {
        let mut menu = ListState::default();
        menu.select(Some(0));

        Self {
            menu,
            ..Default::default()
        }
    }

    fn select(&mut self, choice: usize) {
        self.menu.select(Some(choice));
    }

    fn set_operand(&mut self, field: Field, text: Option<String>) {
        let index = match field {
            Field::A => 0,
            Field::B => 1,
        };
        self.operands[index] = text;
    }

    fn render<B: Backend>(&self, f: &mut Frame<B>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints(
                [
                    Constraint::Length(10),
                    Constraint::Length(1),
                    Constraint::Length(4),
                    Constraint::Min(0),
                    Constraint::Length(3),
                    Constraint::Length(3),
                    Constraint::Length(1),
                ]
                .as_ref(),
            )
            .split(f.size());

        let items = enum_iterator::all::<Opcode>()
            .map(|opcode| ListItem::new(format!("{:<4}({})", opcode.mnemonic(), opcode.description())))
            .collect::<Vec<_>>();

        let menu = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title("Select operation [↑↓]"),
            )
            .highlight_style(Style::default().add_modifier(Modifier::REVERSED))
            .highlight_symbol("> ");

        let mut menu_state = self.menu.clone();
        f.render_stateful_widget(menu, chunks[0], &mut menu_state);

        f.render_widget(
            Paragraph::new(HINT).style(Style::default().fg(Color::DarkGray)),
            chunks[1],
        );

        let operands = self
            .operands
            .iter()
            .flatten()
            .map(|line| Spans::from(line.as_str()))
            .collect::<Vec<_>>();
        f.render_widget(
            Paragraph::new(operands).block(Block::default().borders(Borders::ALL).title("Operands")),
            chunks[2],
        );

        let tx = match &self.tx {
            Some((line, color)) => Spans::from(Span::styled(line.as_str(), Style::default().fg(*color))),
            None => Spans::default(),
        };
        f.render_widget(
            Paragraph::new(tx).block(Block::default().borders(Borders::ALL).title("UART TX")),
            chunks[4],
        );

        f.render_widget(
            Paragraph::new(self.rx.as_deref().unwrap_or_default())
                .block(Block::default().borders(Borders::ALL).title("UART RX")),
            chunks[5],
        );

        f.render_widget(
            Paragraph::new(self.status.as_deref().unwrap_or_default())
                .style(Style::default().fg(Color::Yellow)),
            chunks[6],
        );
    }
}

/// The terminal, in raw mode on the alternate screen for as long as this lives.
pub struct TerminalSurface {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    screen: Screen,
}

impl TerminalSurface {
    /// Take over the terminal.
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;

        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.hide_cursor()?;
        terminal.clear()?;

        let mut surface = Self {
            terminal,
            screen: Screen::new(),
        };
        surface.draw()?;

        Ok(surface)
    }

    fn draw(&mut self) -> io::Result<()> {
        let screen = &self.screen;
        self.terminal.draw(|f| screen.render(f))?;

        Ok(())
    }

    fn show_menu(&mut self, choice: usize) -> io::Result<()> {
        self.screen.select(choice);
        self.draw()
    }

    fn show_operand(&mut self, field: Field, label: &str, input: &str) -> io::Result<()> {
        self.screen.set_operand(field, Some(format!("{label}{input}")));
        self.draw()
    }

    fn clear_operands(&mut self) -> io::Result<()> {
        self.screen.set_operand(Field::A, None);
        self.screen.set_operand(Field::B, None);
        self.draw()
    }
}

fn tx_line(operation: &Operation, outcome: &TxOutcome) -> (String, Color) {
    let frame = encode(operation)
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .join(" ");

    let (text, color) = match outcome {
        TxOutcome::Sent { .. } => (format!(">> TX: {operation} [{frame}]"), Color::Green),
        TxOutcome::Partial { written, expected } => (
            format!(">> TX: {operation} [{frame}] only {written}/{expected} bytes written"),
            Color::Yellow,
        ),
        TxOutcome::Failed(e) => (format!(">> TX failed: {operation}: {e}"), Color::Red),
    };

    (format!("{} {text}", timestamp()), color)
}

impl Surface for TerminalSurface {
    fn render_rx(&mut self, record: &DisplayRecord) -> io::Result<()> {
        self.screen.rx = Some(format!("{} {record}", timestamp()));
        self.draw()
    }

    fn render_tx(&mut self, operation: &Operation, outcome: &TxOutcome) -> io::Result<()> {
        self.screen.tx = Some(tx_line(operation, outcome));
        self.draw()
    }

    fn render_status(&mut self, status: &str) -> io::Result<()> {
        self.screen.status = Some(format!("{} {status}", timestamp()));
        self.draw()
    }
}

impl Drop for TerminalSurface {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!(?e, "Could not restore the terminal");
        }
        if let Err(e) = execute!(self.terminal.backend_mut(), LeaveAlternateScreen) {
            warn!(?e, "Could not leave the alternate screen");
        }
        if let Err(e) = self.terminal.show_cursor() {
            warn!(?e, "Could not show the cursor");
        }
    }
}

enum Operand {
    Value(i32),
    Cancel,
    Abort,
}

enum Operands {
    Values(i32, i32),
    Cancel,
    Abort,
}

/// Picks operations from a menu drawn on the shared terminal.
///
/// Keys are polled outside of the display lock.
pub struct TerminalMenu {
    display: Arc<DisplaySink<TerminalSurface>>,
    choice: usize,
}

impl TerminalMenu {
    /// A menu starting at the first operation.
    pub fn new(display: Arc<DisplaySink<TerminalSurface>>) -> Self {
        Self { display, choice: 0 }
    }

    fn draw(&self) {
        let choice = self.choice;

        if let Err(e) = self.display.with_exclusive(|t| t.show_menu(choice)) {
            warn!(?e, "Could not draw the menu");
        }
    }

    fn show_operand(&self, field: Field, label: &str, input: &str) {
        if let Err(e) = self
            .display
            .with_exclusive(|t| t.show_operand(field, label, input))
        {
            warn!(?e, "Could not draw a prompt");
        }
    }

    fn read_operand(&self, field: Field, label: &str, run_state: &RunState) -> Operand {
        let mut input = String::new();
        self.show_operand(field, label, &input);

        while run_state.is_running() {
            let key = match poll_key() {
                Ok(Some(key)) => key,
                Ok(None) => continue,
                Err(e) => {
                    warn!(?e, "Could not read the keyboard");
                    return Operand::Abort;
                }
            };

            match key.code {
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return Operand::Abort
                }
                KeyCode::Char(c) if c.is_ascii_digit() => input.push(c),
                KeyCode::Char('-') if input.is_empty() => input.push('-'),
                KeyCode::Backspace => {
                    input.pop();
                }
                KeyCode::Esc => return Operand::Cancel,
                KeyCode::Enter => match input.parse::<i32>() {
                    Ok(value) => return Operand::Value(value),
                    Err(_) => self.display.render_status("Please enter a whole number."),
                },
                _ => {}
            }

            self.show_operand(field, label, &input);
        }

        Operand::Abort
    }

    fn read_operands(&self, run_state: &RunState) -> Operands {
        let a = match self.read_operand(Field::A, "Enter operand A (0-255): ", run_state) {
            Operand::Value(a) => a,
            Operand::Cancel => return Operands::Cancel,
            Operand::Abort => return Operands::Abort,
        };

        let b = match self.read_operand(Field::B, "Enter operand B (0-255): ", run_state) {
            Operand::Value(b) => b,
            Operand::Cancel => return Operands::Cancel,
            Operand::Abort => return Operands::Abort,
        };

        Operands::Values(a, b)
    }

    fn clear_operands(&self) {
        if let Err(e) = self.display.with_exclusive(|t| t.clear_operands()) {
            warn!(?e, "Could not clear the prompts");
        }
    }
}

fn poll_key() -> io::Result<Option<KeyEvent>> {
    if !event::poll(INPUT_POLL)? {
        return Ok(None);
    }

    match event::read()? {
        Event::Key(key) if key.kind != KeyEventKind::Release => Ok(Some(key)),
        _ => Ok(None),
    }
}

impl OperationSource for TerminalMenu {
    fn next(&mut self, run_state: &RunState) -> Option<Operation> {
        let opcodes = enum_iterator::all::<Opcode>().collect::<Vec<_>>();

        self.draw();

        while run_state.is_running() {
            let key = match poll_key() {
                Ok(Some(key)) => key,
                Ok(None) => continue,
                Err(e) => {
                    warn!(?e, "Could not read the keyboard");
                    return None;
                }
            };

            match key.code {
                KeyCode::Up => {
                    self.choice = self.choice.checked_sub(1).unwrap_or(opcodes.len() - 1);
                }
                KeyCode::Down => {
                    self.choice = (self.choice + 1) % opcodes.len();
                }
                KeyCode::Enter => {
                    let opcode = opcodes[self.choice];

                    let operands = self.read_operands(run_state);
                    self.clear_operands();

                    match operands {
                        Operands::Values(a, b) => return Some(Operation::new(opcode, a, b)),
                        Operands::Cancel => debug!("Operand entry cancelled"),
                        Operands::Abort => return None,
                    }
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    return None
                }
                KeyCode::Char('q') | KeyCode::Esc => return None,
                _ => continue,
            }

            self.draw();
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tui::{backend::TestBackend, buffer::Buffer};

    use super::*;
    use crate::serial::{codecs::frame::decode_for_display, error::SerialPortError};

    fn rows(buffer: &Buffer) -> Vec<String> {
        buffer
            .content
            .chunks(usize::from(buffer.area.width))
            .map(|row| row.iter().map(|cell| cell.symbol.as_str()).collect::<String>())
            .collect()
    }

    fn drawn(screen: &Screen) -> Vec<String> {
        let mut terminal = Terminal::new(TestBackend::new(80, 30)).unwrap();
        terminal.draw(|f| screen.render(f)).unwrap();

        rows(terminal.backend().buffer())
    }

    fn row_with<'r>(rows: &'r [String], needle: &str) -> &'r str {
        rows.iter()
            .find(|row| row.contains(needle))
            .map(String::as_str)
            .unwrap_or_else(|| panic!("Nothing shows {needle:?}: {rows:#?}"))
    }

    #[test]
    fn menu_lists_every_opcode() {
        let rows = drawn(&Screen::new());

        for opcode in enum_iterator::all::<Opcode>() {
            row_with(&rows, opcode.description());
        }
        row_with(&rows, "Select operation");
        row_with(&rows, HINT);
    }

    #[test]
    fn choice_is_highlighted() {
        let mut screen = Screen::new();
        screen.select(5);

        let rows = drawn(&screen);

        assert!(row_with(&rows, "SRA").contains("> SRA"));
        assert!(!row_with(&rows, "ADD").contains("> ADD"));
    }

    #[test]
    fn operands_come_and_go() {
        let mut screen = Screen::new();

        screen.set_operand(Field::A, Some("Enter operand A (0-255): 12".into()));
        screen.set_operand(Field::B, Some("Enter operand B (0-255): -3".into()));
        let rows = drawn(&screen);
        row_with(&rows, "A (0-255): 12");
        row_with(&rows, "B (0-255): -3");

        screen.set_operand(Field::A, None);
        screen.set_operand(Field::B, None);
        let rows = drawn(&screen);
        assert!(!rows.iter().any(|row| row.contains("(0-255)")));
    }

    #[test]
    fn traffic_and_status_are_shown() {
        let mut screen = Screen::new();
        screen.tx = Some(tx_line(
            &Operation::new(Opcode::Add, 10, 20),
            &TxOutcome::Sent { written: 3 },
        ));
        screen.rx = Some(decode_for_display(&[0x01, 0xFF]).to_string());
        screen.status = Some("Connected to mock".into());

        let rows = drawn(&screen);

        row_with(&rows, "[20 0A 14]");
        row_with(&rows, "2 byte(s): 01 1 FF -1");
        assert!(rows.last().unwrap().contains("Connected to mock"));
    }

    #[test]
    fn tx_outcomes_read_differently() {
        let operation = Operation::new(Opcode::Xor, 1, 2);

        let (partial, partial_color) = tx_line(
            &operation,
            &TxOutcome::Partial {
                written: 2,
                expected: 3,
            },
        );
        assert!(partial.contains("only 2/3 bytes written"));
        assert_eq!(partial_color, Color::Yellow);

        let (failed, failed_color) = tx_line(&operation, &TxOutcome::Failed(SerialPortError::Closed));
        assert!(failed.contains("TX failed"));
        assert_eq!(failed_color, Color::Red);
    }
}
