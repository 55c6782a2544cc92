//! mbprobe: a Modbus TCP diagnostic client
//!
//! The probe connects to one device, issues a single read holding registers
//! (0x03) or write multiple registers (0x10) request and prints the registers
//! involved. Writes are confirmed by reading the same range back.
//!
//! Frame encoding and validation are delegated to `rmodbus`; this crate
//! provides the command-line grammar, a blocking TCP transport and an
//! in-process simulated device for testing.

#[doc(hidden)]
pub mod boot;
pub mod cli;
pub mod config;
pub mod protocol;

pub use cli::{Request, Status};
pub use config::ProbeConfig;
pub use protocol::modbus::{RegisterClient, SimulatedDevice, TcpRegisterClient};
