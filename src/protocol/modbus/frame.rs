use anyhow::{anyhow, Result};
use std::io::{ErrorKind, Read};

use super::{parse_modbus_header, MBAP_HEADER_LEN};

/// Read one complete Modbus TCP frame (MBAP header included) from `reader`.
///
/// Returns `Ok(None)` when the peer closed the connection cleanly before
/// sending a new header.
pub fn read_modbus_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut header_buf = [0u8; MBAP_HEADER_LEN];
    match reader.read_exact(&mut header_buf) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let len = parse_modbus_header(header_buf)?;
    if len <= MBAP_HEADER_LEN {
        return Err(anyhow!("MBAP header announces an empty frame"));
    }

    let mut full_buf = Vec::with_capacity(len);
    full_buf.extend_from_slice(&header_buf);
    full_buf.resize(len, 0);
    reader
        .read_exact(&mut full_buf[MBAP_HEADER_LEN..])
        .map_err(|err| anyhow!("Truncated Modbus frame: {err}"))?;

    log::debug!("Received Modbus frame: {:02x?}", full_buf);

    Ok(Some(full_buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_reads_exactly_one_frame() {
        let bytes = vec![
            0x00, 0x07, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03, 0x02, 0x00, 0x2a, // frame
            0xff, 0xff, // trailing bytes belong to the next frame
        ];
        let mut cursor = Cursor::new(bytes);
        let frame = read_modbus_frame(&mut cursor).unwrap().unwrap();
        assert_eq!(frame.len(), 11);
        assert_eq!(&frame[9..], &[0x00, 0x2a]);
        assert_eq!(cursor.position(), 11);
    }

    #[test]
    fn test_clean_eof_yields_none() {
        let mut cursor = Cursor::new(Vec::<u8>::new());
        assert!(read_modbus_frame(&mut cursor).unwrap().is_none());
    }

    #[test]
    fn test_truncated_body_is_an_error() {
        let mut cursor = Cursor::new(vec![0x00, 0x01, 0x00, 0x00, 0x00, 0x05, 0x01, 0x03]);
        assert!(read_modbus_frame(&mut cursor).is_err());
    }
}
