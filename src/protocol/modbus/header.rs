use anyhow::{anyhow, Result};

use rmodbus::{guess_response_frame_len, ModbusProto};

/// Length of the MBAP header that prefixes every Modbus TCP frame.
pub const MBAP_HEADER_LEN: usize = 6;

/// Return the full frame length announced by an MBAP header.
pub fn parse_modbus_header(buf: [u8; MBAP_HEADER_LEN]) -> Result<usize> {
    let protocol_id = u16::from_be_bytes([buf[2], buf[3]]);
    if protocol_id != 0 {
        return Err(anyhow!(
            "Unexpected MBAP protocol id 0x{protocol_id:04X} (expected 0x0000)"
        ));
    }
    Ok(guess_response_frame_len(&buf, ModbusProto::TcpUdp)? as usize)
}
