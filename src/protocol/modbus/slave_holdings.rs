use anyhow::{anyhow, Result};

use rmodbus::server::{context::ModbusContext, ModbusFrame};

/// Apply a parsed request frame to the device registers in `context`.
///
/// Returns the finalized response, or `None` when the frame needs no reply
/// (for instance a broadcast). Reads leave `context` untouched.
pub fn build_slave_holdings_response<C: ModbusContext>(
    frame: &mut ModbusFrame<Vec<u8>>,
    context: &mut C,
) -> Result<Option<Vec<u8>>> {
    if frame.processing_required {
        let outcome = if frame.readonly {
            frame.process_read(context)
        } else {
            frame.process_write(context)
        };
        outcome.map_err(|err| anyhow!("Frame processing error: {err}"))?;
    }

    if !frame.response_required {
        log::debug!("Request from unit {} needs no response", frame.unit_id);
        return Ok(None);
    }

    frame
        .finalize_response()
        .map_err(|err| anyhow!("Failed to finalize response: {err}"))?;
    log::debug!("Send Modbus response: {:02x?}", frame.response);
    Ok(Some(frame.response.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rmodbus::{server::storage::ModbusStorageSmall, ModbusProto};

    fn respond(request: &[u8], context: &mut ModbusStorageSmall) -> Result<Option<Vec<u8>>> {
        let mut response = Vec::new();
        let mut frame = ModbusFrame::new(1, request, ModbusProto::TcpUdp, &mut response);
        frame.parse()?;
        build_slave_holdings_response(&mut frame, context)
    }

    #[test]
    fn test_read_returns_stored_registers() {
        let mut context = ModbusStorageSmall::new();
        context.set_holding(10, 0xabcd).unwrap();
        let request = [0x00, 0x01, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x00, 0x0a, 0x00, 0x01];

        let response = respond(&request, &mut context).unwrap().unwrap();
        assert_eq!(
            response,
            vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0xab, 0xcd]
        );
    }

    #[test]
    fn test_write_updates_context() {
        let mut context = ModbusStorageSmall::new();
        let request = [
            0x00, 0x02, 0x00, 0x00, 0x00, 0x0b, 0x01, 0x10, 0x00, 0x05, 0x00, 0x02, 0x04, 0x00,
            0x07, 0x00, 0x08,
        ];

        assert!(respond(&request, &mut context).unwrap().is_some());
        assert_eq!(context.get_holding(5).unwrap(), 7);
        assert_eq!(context.get_holding(6).unwrap(), 8);
    }

    #[test]
    fn test_out_of_range_read_becomes_exception_response() {
        let mut context = ModbusStorageSmall::new();
        // Register 5000 is past the end of the small storage.
        let request = [0x00, 0x03, 0x00, 0x00, 0x00, 0x06, 0x01, 0x03, 0x13, 0x88, 0x00, 0x01];

        let response = respond(&request, &mut context).unwrap().unwrap();
        assert_eq!(&response[7..], &[0x83, 0x02]);
    }
}
