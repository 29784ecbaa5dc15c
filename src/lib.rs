#![deny(missing_docs)]

//! This crate drives an FPGA arithmetic/logic unit over a serial line.
//!
//! The serial devices matching `/dev/ttyUSB*` and `/dev/ttyACM*` are offered for selection.
//! The chosen device is opened in raw mode, and its line settings may be changed before any traffic flows.
//!
//! Each [`operation::Operation`] picked by the operator is sent as a fixed three byte frame:
//! the opcode, then both operands truncated to eight bits.
//! There is no acknowledgement and no retransmission.
//!
//! A background thread polls the port and shows whatever arrives, while the foreground
//! keeps asking for operations to send.
//! Both share the display, but only ever through short exclusive sections.
//!
//! Shutdown is ordered: stop is requested, the receiving thread is joined,
//! and only then is the port closed.

/// Opcodes and the operations sent to the device.
pub mod operation;

/// Serial port driver.
pub mod serial;

/// Finds candidate serial devices.
pub mod discovery;

/// Shared stop/continue state and the readiness signal.
pub mod run_state;

/// The shared display and what may be shown on it.
pub mod display;

/// The background activity showing bytes from the device.
pub mod receiver;

/// The foreground activity sending operations to the device.
pub mod transmitter;

/// Ordered teardown of a session.
pub mod shutdown;

/// Ties discovery, configuration, both loops and shutdown together.
pub mod session;

/// Line based questions asked before the menu starts.
pub mod prompt;

/// The terminal menu and display surface.
pub mod terminal;

/// An in-memory port, optionally behaving like the FPGA.
pub mod mock;

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Logging/tracing setup.
pub mod logging;
