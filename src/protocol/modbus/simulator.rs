//! In-process Modbus TCP device.
//!
//! Serves holding-register reads and writes from an `rmodbus` storage that
//! spans the whole 16-bit register address space, on a loopback port. Connections are handled one at a
//! time, which matches how the client uses a device.

use anyhow::{anyhow, Result};
use std::{
    io::Write,
    net::{SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use rmodbus::{
    server::{context::ModbusContext, storage::ModbusStorage, ModbusFrame},
    ModbusProto,
};

use super::{build_slave_holdings_response, read_modbus_frame};

const IDLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Holding registers addressable with a `u16`.
const HOLDING_REGISTERS: usize = u16::MAX as usize + 1;

/// Coils, discretes and inputs are never served, so they get a single slot each.
type DeviceStorage = ModbusStorage<1, 1, 1, HOLDING_REGISTERS>;

/// Handle to a running simulated device. Dropping it stops the accept loop.
pub struct SimulatedDevice {
    addr: SocketAddr,
    unit_id: u8,
    storage: Arc<Mutex<DeviceStorage>>,
    running: Arc<AtomicBool>,
}

impl SimulatedDevice {
    /// Bind an ephemeral loopback port and start answering requests for `unit_id`.
    pub fn spawn(unit_id: u8) -> Result<Self> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        let addr = listener.local_addr()?;
        let storage = Arc::new(Mutex::new(DeviceStorage::new()));
        let running = Arc::new(AtomicBool::new(true));

        let thread_storage = storage.clone();
        let thread_running = running.clone();
        thread::Builder::new()
            .name(format!("modbus-sim-{}", addr.port()))
            .spawn(move || serve(listener, unit_id, thread_storage, thread_running))?;

        log::info!("Simulated device for unit {unit_id} listening on {addr}");

        Ok(Self {
            addr,
            unit_id,
            storage,
            running,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn unit_id(&self) -> u8 {
        self.unit_id
    }

    /// Preload consecutive holding registers starting at `address`.
    pub fn set_holdings(&self, address: u16, values: &[u16]) -> Result<()> {
        let mut storage = self.lock_storage()?;
        for (offset, value) in values.iter().enumerate() {
            let reg = address
                .checked_add(offset as u16)
                .ok_or_else(|| anyhow!("Register range overflows the address space"))?;
            storage.set_holding(reg, *value)?;
        }
        Ok(())
    }

    /// Snapshot `count` holding registers starting at `address`.
    pub fn holdings(&self, address: u16, count: u16) -> Result<Vec<u16>> {
        let storage = self.lock_storage()?;
        let mut values = Vec::with_capacity(count as usize);
        for offset in 0..count {
            let reg = address
                .checked_add(offset)
                .ok_or_else(|| anyhow!("Register range overflows the address space"))?;
            values.push(storage.get_holding(reg)?);
        }
        Ok(values)
    }

    fn lock_storage(&self) -> Result<std::sync::MutexGuard<'_, DeviceStorage>> {
        self.storage
            .lock()
            .map_err(|_| anyhow!("Simulator storage lock poisoned"))
    }
}

impl Drop for SimulatedDevice {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        // Wake the accept loop so it can observe the flag.
        let _ = TcpStream::connect_timeout(&self.addr, Duration::from_millis(200));
    }
}

fn serve(
    listener: TcpListener,
    unit_id: u8,
    storage: Arc<Mutex<DeviceStorage>>,
    running: Arc<AtomicBool>,
) {
    for stream in listener.incoming() {
        if !running.load(Ordering::SeqCst) {
            break;
        }
        match stream {
            Ok(stream) => {
                if let Err(err) = serve_connection(stream, unit_id, &storage) {
                    log::warn!("Simulated device connection ended with error: {err}");
                }
            }
            Err(err) => log::warn!("Simulated device accept failed: {err}"),
        }
    }
    log::debug!("Simulated device for unit {unit_id} stopped");
}

fn serve_connection(
    mut stream: TcpStream,
    unit_id: u8,
    storage: &Mutex<DeviceStorage>,
) -> Result<()> {
    stream.set_read_timeout(Some(IDLE_TIMEOUT))?;
    log::debug!("Simulated device accepted {}", stream.peer_addr()?);

    while let Some(request) = read_modbus_frame(&mut stream)? {
        let mut response = Vec::new();
        let mut frame = ModbusFrame::new(unit_id, &request, ModbusProto::TcpUdp, &mut response);
        frame.parse()?;

        let reply = {
            let mut context = storage
                .lock()
                .map_err(|_| anyhow!("Simulator storage lock poisoned"))?;
            build_slave_holdings_response(&mut frame, &mut *context)?
        };

        if let Some(reply) = reply {
            stream.write_all(&reply)?;
        }
    }

    Ok(())
}
