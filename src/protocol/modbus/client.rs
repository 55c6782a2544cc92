use anyhow::{anyhow, Result};
use std::{
    io::Write,
    net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs},
    time::Duration,
};

use rmodbus::client::ModbusRequest;

use super::{
    generate_pull_get_holdings_request, generate_pull_set_holdings_request,
    parse_pull_get_holdings, parse_pull_set_holdings, read_modbus_frame, RegisterClient,
};

/// Read/write timeout applied when the caller has no preference.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Blocking Modbus TCP client holding a single connection.
pub struct TcpRegisterClient {
    stream: Option<TcpStream>,
    peer: SocketAddr,
    unit_id: u8,
}

impl TcpRegisterClient {
    /// Resolve `host` together with `port` and connect to the first address that accepts.
    ///
    /// Hostnames, IPv4 literals and unscoped IPv6 literals are accepted. Scoped
    /// IPv6 literals (`fe80::1%eth0`) do not resolve and fail here.
    pub fn connect(host: &str, port: u16, unit_id: u8, timeout: Duration) -> Result<Self> {
        if host.is_empty() {
            return Err(anyhow!("Invalid argument: empty target address"));
        }

        let addrs = (host, port)
            .to_socket_addrs()
            .map_err(|err| anyhow!("Cannot resolve '{host}': {err}"))?
            .collect::<Vec<_>>();

        let mut last_error = None;
        for addr in addrs {
            log::debug!("Connecting to {addr}");
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;
                    log::info!("Connected to {addr} (unit {unit_id})");
                    return Ok(Self {
                        stream: Some(stream),
                        peer: addr,
                        unit_id,
                    });
                }
                Err(err) => {
                    log::warn!("Connection to {addr} failed: {err}");
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(err) => Err(err.into()),
            None => Err(anyhow!("'{host}' did not resolve to any address")),
        }
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    fn transact(&mut self, raw: &[u8]) -> Result<Vec<u8>> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("Connection already closed"))?;

        log::debug!("Send Modbus request: {:02x?}", raw);
        stream.write_all(raw)?;
        stream.flush()?;

        read_modbus_frame(stream)?.ok_or_else(|| anyhow!("Connection closed by peer"))
    }

    fn exchange<T>(
        &mut self,
        (request, raw): (ModbusRequest, Vec<u8>),
        parse: impl FnOnce(&ModbusRequest, &[u8]) -> Result<T>,
    ) -> Result<T> {
        let response = self.transact(&raw)?;
        parse(&request, &response)
    }
}

impl RegisterClient for TcpRegisterClient {
    fn read_holding_registers(&mut self, address: u16, count: u16) -> Result<Vec<u16>> {
        let request = generate_pull_get_holdings_request(self.unit_id, address, count)?;
        let mut values = self.exchange(request, parse_pull_get_holdings)?;
        if values.len() < count as usize {
            return Err(anyhow!(
                "Short response: expected {count} registers, got {}",
                values.len()
            ));
        }
        values.truncate(count as usize);
        Ok(values)
    }

    fn write_multiple_registers(&mut self, address: u16, values: &[u16]) -> Result<()> {
        let request = generate_pull_set_holdings_request(self.unit_id, address, values)?;
        self.exchange(request, parse_pull_set_holdings)
    }

    fn close(&mut self) -> Result<()> {
        if let Some(stream) = self.stream.take() {
            log::info!("Closing connection to {}", self.peer);
            match stream.shutdown(Shutdown::Both) {
                Ok(()) => {}
                // The peer may already have dropped its side.
                Err(err) if err.kind() == std::io::ErrorKind::NotConnected => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }
}

impl Drop for TcpRegisterClient {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            log::warn!("Failed to close connection to {}: {err}", self.peer);
        }
    }
}
