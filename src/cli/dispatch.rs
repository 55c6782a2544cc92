use std::{fmt, io::Write};

use super::request::{FunctionCode, Request};
use crate::protocol::modbus::RegisterClient;

#[derive(Debug)]
pub enum DispatchError {
    Read(anyhow::Error),
    Write(anyhow::Error),
    /// The write succeeded but reading the range back did not.
    ConfirmationRead(anyhow::Error),
    UnsupportedFunction(u8),
    Output(std::io::Error),
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchError::Read(err)
            | DispatchError::Write(err)
            | DispatchError::ConfirmationRead(err) => write!(f, "{err}"),
            DispatchError::UnsupportedFunction(_) => write!(f, "Error: function not supported"),
            DispatchError::Output(err) => write!(f, "Failed to write output: {err}"),
        }
    }
}

impl std::error::Error for DispatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DispatchError::Read(err)
            | DispatchError::Write(err)
            | DispatchError::ConfirmationRead(err) => Some(&**err),
            DispatchError::UnsupportedFunction(_) => None,
            DispatchError::Output(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for DispatchError {
    fn from(err: std::io::Error) -> Self {
        DispatchError::Output(err)
    }
}

/// Perform the single exchange `request` asks for and print the registers involved.
///
/// A successful write is always followed by a read of the same range, printed
/// as confirmation. Unsupported function codes never reach `client`.
pub fn dispatch<C, W>(request: &Request, client: &mut C, out: &mut W) -> Result<(), DispatchError>
where
    C: RegisterClient + ?Sized,
    W: Write,
{
    match request.function_code() {
        Some(FunctionCode::ReadHoldingRegisters) => {
            log::debug!(
                "Reading {} holding register(s) at {}",
                request.count,
                request.address
            );
            let values = client
                .read_holding_registers(request.address, request.count)
                .map_err(DispatchError::Read)?;
            writeln!(out, "Registers read:")?;
            write_registers(out, &values)?;
        }
        Some(FunctionCode::WriteMultipleRegisters) => {
            let values = request
                .values
                .as_ref()
                .map(|values| values.as_slice())
                .unwrap_or_default();
            log::debug!(
                "Writing {} holding register(s) at {}: {:?}",
                values.len(),
                request.address,
                values
            );
            client
                .write_multiple_registers(request.address, values)
                .map_err(DispatchError::Write)?;

            writeln!(out, "Register write confirmation:")?;
            let confirmed = client
                .read_holding_registers(request.address, request.count)
                .map_err(DispatchError::ConfirmationRead)?;
            write_registers(out, &confirmed)?;
        }
        None => {
            log::warn!("Function code {} is not supported", request.function);
            return Err(DispatchError::UnsupportedFunction(request.function));
        }
    }

    Ok(())
}

/// Print `reg[<index>]=<decimal> (0x<HEX>)` for every value.
pub fn write_registers<W: Write>(out: &mut W, values: &[u16]) -> std::io::Result<()> {
    for (i, value) in values.iter().enumerate() {
        writeln!(out, "reg[{i}]={value} (0x{value:X})")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Result};

    #[derive(Debug, PartialEq, Eq)]
    enum Call {
        Read(u16, u16),
        Write(u16, Vec<u16>),
    }

    #[derive(Default)]
    struct RecordingClient {
        calls: Vec<Call>,
        registers: Vec<u16>,
        fail_reads: bool,
        fail_writes: bool,
    }

    impl RegisterClient for RecordingClient {
        fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
            self.calls.push(Call::Read(address, count));
            if self.fail_reads {
                return Err(anyhow!("Illegal data address"));
            }
            Ok(self.registers.iter().copied().take(count as usize).collect())
        }

        fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
            self.calls.push(Call::Write(address, values.to_vec()));
            if self.fail_writes {
                return Err(anyhow!("Slave device or server failure"));
            }
            self.registers = values.to_vec();
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn request(line: &str) -> Request {
        Request::parse(line.split_whitespace()).unwrap()
    }

    #[test]
    fn test_read_prints_decimal_and_hex() {
        let mut client = RecordingClient {
            registers: vec![1, 255, 4096, 65535],
            ..Default::default()
        };
        let mut out = Vec::new();
        dispatch(&request("-ip h -f 3 -a 20000 -n 4"), &mut client, &mut out).unwrap();

        assert_eq!(client.calls, vec![Call::Read(20000, 4)]);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Registers read:\n\
             reg[0]=1 (0x1)\n\
             reg[1]=255 (0xFF)\n\
             reg[2]=4096 (0x1000)\n\
             reg[3]=65535 (0xFFFF)\n"
        );
    }

    #[test]
    fn test_write_is_confirmed_by_read_back() {
        let mut client = RecordingClient::default();
        let mut out = Vec::new();
        dispatch(
            &request("-ip h -f 16 -a 20000 -n 4 -v 1:2:3:4"),
            &mut client,
            &mut out,
        )
        .unwrap();

        assert_eq!(
            client.calls,
            vec![Call::Write(20000, vec![1, 2, 3, 4]), Call::Read(20000, 4)]
        );
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Register write confirmation:\n"));
        assert!(text.contains("reg[3]=4 (0x4)"));
    }

    #[test]
    fn test_failed_write_skips_confirmation() {
        let mut client = RecordingClient {
            fail_writes: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = dispatch(&request("-ip h -f 16 -n 1 -v 9"), &mut client, &mut out).unwrap_err();

        assert!(matches!(err, DispatchError::Write(_)));
        assert_eq!(err.to_string(), "Slave device or server failure");
        assert_eq!(client.calls, vec![Call::Write(0, vec![9])]);
        assert!(out.is_empty());
    }

    #[test]
    fn test_failed_confirmation_is_reported_separately() {
        let mut client = RecordingClient {
            fail_reads: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = dispatch(&request("-ip h -f 16 -n 1 -v 9"), &mut client, &mut out).unwrap_err();

        assert!(matches!(err, DispatchError::ConfirmationRead(_)));
        assert_eq!(client.registers, vec![9]);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Register write confirmation:\n"
        );
    }

    #[test]
    fn test_failed_read_reports_driver_text() {
        let mut client = RecordingClient {
            fail_reads: true,
            ..Default::default()
        };
        let mut out = Vec::new();
        let err = dispatch(&request("-ip h -f 3 -n 2"), &mut client, &mut out).unwrap_err();
        assert!(matches!(err, DispatchError::Read(_)));
        assert_eq!(err.to_string(), "Illegal data address");
    }

    #[test]
    fn test_unsupported_function_makes_no_calls() {
        let mut client = RecordingClient::default();
        let mut out = Vec::new();
        let err = dispatch(&request("-ip h -f 99 -n 2"), &mut client, &mut out).unwrap_err();

        assert!(matches!(err, DispatchError::UnsupportedFunction(99)));
        assert!(client.calls.is_empty());
        assert!(out.is_empty());
    }
}
