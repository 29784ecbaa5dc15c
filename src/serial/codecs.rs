/// The fixed three byte command frame, and the display form of received bytes.
pub mod frame;
