use anyhow::{anyhow, Result};

use rmodbus::{client::ModbusRequest, ModbusProto};

use super::MBAP_HEADER_LEN;

/// Register count limit of a single 0x03 request.
pub const MAX_READ_COUNT: u16 = 125;

/// Offset of the byte count in a 0x03 response: MBAP header, unit id, function.
const BYTE_COUNT_OFFSET: usize = MBAP_HEADER_LEN + 2;

/// Build a read holding registers (0x03) frame for `count` registers at `start_address`.
///
/// `count` must be within `1..=125`.
pub fn generate_pull_get_holdings_request(
    id: u8,
    start_address: u16,
    count: u16,
) -> Result<(ModbusRequest, Vec<u8>)> {
    if count == 0 || count > MAX_READ_COUNT {
        return Err(anyhow!(
            "Illegal data value: cannot read {count} holding registers"
        ));
    }
    let mut request = ModbusRequest::new(id, ModbusProto::TcpUdp);
    let mut raw = Vec::new();
    request.generate_get_holdings(start_address, count, &mut raw)?;
    Ok((request, raw))
}

/// Validate a read holding registers response and decode its values.
///
/// Modbus exception responses surface as the matching `rmodbus` error.
pub fn parse_pull_get_holdings(request: &ModbusRequest, response: &[u8]) -> Result<Vec<u16>> {
    request.parse_ok(response)?;
    if response.get(BYTE_COUNT_OFFSET).copied().unwrap_or(0) == 0 {
        return Err(anyhow!("Response carries no register data"));
    }
    let mut values = Vec::new();
    request.parse_u16(response, &mut values)?;
    Ok(values)
}
