//! Modbus TCP plumbing built on `rmodbus`.
//!
//! `rmodbus` owns every wire-format concern (MBAP header, function payloads,
//! exception decoding). This module only moves its frames over a socket.

mod client;
mod frame;
mod header;
mod pull_get_holdings;
mod pull_set_holdings;
mod slave_holdings;
pub mod simulator;

use anyhow::Result;

pub use client::{TcpRegisterClient, DEFAULT_TIMEOUT};
pub use frame::read_modbus_frame;
pub use header::{parse_modbus_header, MBAP_HEADER_LEN};
pub use pull_get_holdings::{generate_pull_get_holdings_request, parse_pull_get_holdings};
pub use pull_set_holdings::{generate_pull_set_holdings_request, parse_pull_set_holdings};
pub use simulator::SimulatedDevice;
pub use slave_holdings::build_slave_holdings_response;

/// Standard Modbus TCP port.
pub const DEFAULT_PORT: u16 = 502;

/// Register-level operations a connected Modbus client offers.
///
/// Errors carry the driver's human-readable text in their `Display` output.
pub trait RegisterClient {
    /// Read `count` holding registers starting at `address` (function 0x03).
    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>>;

    /// Write `values` to consecutive holding registers from `address` (function 0x10).
    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()>;

    /// Release the connection. Calling it more than once is harmless.
    fn close(&mut self) -> Result<()>;
}
