use anyhow::Result;

use rmodbus::{client::ModbusRequest, ModbusProto};

/// Build a write multiple registers (0x10) frame storing `values` from `start_address`.
pub fn generate_pull_set_holdings_request(
    id: u8,
    start_address: u16,
    values: &[u16],
) -> Result<(ModbusRequest, Vec<u8>)> {
    let mut request = ModbusRequest::new(id, ModbusProto::TcpUdp);
    let mut raw = Vec::new();
    request.generate_set_holdings_bulk(start_address, values, &mut raw)?;
    Ok((request, raw))
}

pub fn parse_pull_set_holdings(request: &ModbusRequest, response: &[u8]) -> Result<()> {
    request.parse_ok(response)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_frame_carries_values() {
        let (_, raw) = generate_pull_set_holdings_request(7, 0x4e20, &[1, 2]).unwrap();
        assert_eq!(
            &raw[2..],
            &[
                0x00, 0x00, 0x00, 0x0b, 0x07, 0x10, 0x4e, 0x20, 0x00, 0x02, 0x04, 0x00, 0x01,
                0x00, 0x02
            ]
        );
    }

    #[test]
    fn test_acknowledgement_is_accepted() {
        let (request, raw) = generate_pull_set_holdings_request(7, 0x4e20, &[1, 2]).unwrap();
        let response = [
            raw[0], raw[1], 0x00, 0x00, 0x00, 0x06, 0x07, 0x10, 0x4e, 0x20, 0x00, 0x02,
        ];
        assert!(parse_pull_set_holdings(&request, &response).is_ok());
    }
}
