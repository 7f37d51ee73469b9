//! TCP connection to one gateway.
//!
//! A reader task splits the byte stream into frames and routes each one by
//! sequence number to the request waiting for it. Writes go through a mutex
//! so frames from concurrent callers never interleave.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use lightify_core::Address;
use lightify_protocol::{
    Command, DeviceInfo, DeviceRecord, FirmwareVersion, GroupRecord, Response, WifiProfile,
    peek_sequence,
};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::pending::{PendingRequests, SequenceCounter};

/// Reads one length-prefixed frame, prefix included.
///
/// Returns `Ok(None)` on a clean EOF before the first prefix byte.
pub(crate) async fn read_frame<R>(reader: &mut R) -> GatewayResult<Option<Vec<u8>>>
where
    R: AsyncRead + Unpin,
{
    let mut prefix = [0u8; 2];
    match reader.read_exact(&mut prefix).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let body = u16::from_le_bytes(prefix) as usize;
    let mut frame = vec![0u8; prefix.len() + body];
    frame[..prefix.len()].copy_from_slice(&prefix);
    reader.read_exact(&mut frame[prefix.len()..]).await?;
    Ok(Some(frame))
}

/// An open gateway connection.
pub struct Connection {
    peer: SocketAddr,
    writer: Mutex<OwnedWriteHalf>,
    pending: Arc<Mutex<PendingRequests>>,
    sequence: SequenceCounter,
    resync: Arc<AtomicBool>,
    request_timeout: Duration,
    reader: JoinHandle<()>,
}

impl Connection {
    /// Connects to the gateway named in `config`.
    pub async fn connect(config: &GatewayConfig) -> GatewayResult<Self> {
        let address = config.address();
        debug!(gateway = %address, "Connecting");

        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&address))
            .await
            .map_err(|_| GatewayError::timeout(format!("connection to {}", address)))??;
        stream.set_nodelay(true)?;
        Self::from_stream(stream, config)
    }

    /// Wraps an already connected stream.
    pub fn from_stream(stream: TcpStream, config: &GatewayConfig) -> GatewayResult<Self> {
        let peer = stream.peer_addr()?;
        let (read_half, write_half) = stream.into_split();
        let pending = Arc::new(Mutex::new(PendingRequests::new(config.max_pending)));
        let resync = Arc::new(AtomicBool::new(false));
        let reader = tokio::spawn(read_loop(read_half, pending.clone(), resync.clone(), peer));

        debug!(gateway = %peer, "Connected");
        Ok(Self {
            peer,
            writer: Mutex::new(write_half),
            pending,
            sequence: SequenceCounter::default(),
            resync,
            request_timeout: config.request_timeout,
            reader,
        })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Returns true if the next request will be preceded by a device
    /// enumeration.
    pub fn needs_resync(&self) -> bool {
        self.resync.load(Ordering::SeqCst)
    }

    /// Returns the number of requests awaiting a response.
    pub async fn pending(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Returns true once the gateway hung up or the stream failed.
    pub async fn is_closed(&self) -> bool {
        self.pending.lock().await.is_closed()
    }

    /// Sends a command and waits for its response.
    ///
    /// After the gateway reported `RESYNC_REQUIRED`, or after a frame that
    /// could not be decoded, the next request is preceded by a device
    /// enumeration. The resync stays pending until an enumeration succeeds.
    pub async fn request(&self, command: &Command) -> GatewayResult<Response> {
        if !self.resync.swap(false, Ordering::SeqCst) {
            return self.exchange(command).await;
        }
        if *command == Command::ListDevices {
            return self.resync_with(command).await;
        }
        debug!(before = %command, "Resynchronising with device enumeration");
        self.resync_with(&Command::ListDevices).await?;
        self.exchange(command).await
    }

    async fn resync_with(&self, enumeration: &Command) -> GatewayResult<Response> {
        let result = self.exchange(enumeration).await;
        if result.is_err() {
            self.resync.store(true, Ordering::SeqCst);
        }
        result
    }

    async fn exchange(&self, command: &Command) -> GatewayResult<Response> {
        let sequence = self.sequence.next();
        let frame = command.encode(sequence)?;
        let deadline = Instant::now() + self.request_timeout;

        if command.is_poll() {
            trace!(sequence, %command, "Sending request");
        } else {
            debug!(sequence, %command, "Sending request");
        }

        let reply = self
            .pending
            .lock()
            .await
            .insert(sequence, command.code(), deadline)?;

        let written = {
            let mut writer = self.writer.lock().await;
            writer.write_all(&frame).await
        };
        if let Err(e) = written {
            self.pending.lock().await.cancel(sequence);
            return Err(e.into());
        }

        let frame = match tokio::time::timeout_at(deadline, reply).await {
            Ok(Ok(frame)) => frame,
            Ok(Err(_)) => return Err(GatewayError::ConnectionClosed),
            Err(_) => {
                self.pending.lock().await.cancel(sequence);
                return Err(GatewayError::timeout(command.code().name()));
            }
        };

        command.decode_response(&frame).map_err(|e| {
            if e.is_resync_required() || e.is_desync() {
                warn!(sequence, %command, error = %e, "Gateway requires resync");
                self.resync.store(true, Ordering::SeqCst);
            }
            GatewayError::from(e)
        })
    }

    /// Enumerates all paired devices.
    pub async fn list_devices(&self) -> GatewayResult<Vec<DeviceRecord>> {
        match self.request(&Command::ListDevices).await? {
            Response::Devices(devices) => Ok(devices),
            _ => Err(unexpected(&Command::ListDevices)),
        }
    }

    /// Enumerates all groups.
    pub async fn list_groups(&self) -> GatewayResult<Vec<GroupRecord>> {
        match self.request(&Command::ListGroups).await? {
            Response::Groups(groups) => Ok(groups),
            _ => Err(unexpected(&Command::ListGroups)),
        }
    }

    /// Polls the state of a single device.
    pub async fn device_info(&self, address: Address) -> GatewayResult<DeviceInfo> {
        let command = Command::DeviceInfo { address };
        match self.request(&command).await? {
            Response::DeviceInfo(info) => Ok(info),
            _ => Err(unexpected(&command)),
        }
    }

    /// Reads the gateway firmware version.
    pub async fn firmware(&self) -> GatewayResult<FirmwareVersion> {
        match self.request(&Command::GatewayFirmware).await? {
            Response::Firmware(version) => Ok(version),
            _ => Err(unexpected(&Command::GatewayFirmware)),
        }
    }

    /// Reads the Wi-Fi profiles stored on the gateway.
    pub async fn wifi_configuration(&self) -> GatewayResult<Vec<WifiProfile>> {
        match self.request(&Command::WifiConfiguration).await? {
            Response::Wifi(profiles) => Ok(profiles),
            _ => Err(unexpected(&Command::WifiConfiguration)),
        }
    }

    /// Closes the write half; the reader task ends when the gateway hangs up.
    pub async fn close(&self) -> GatewayResult<()> {
        self.writer.lock().await.shutdown().await?;
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

fn unexpected(command: &Command) -> GatewayError {
    GatewayError::UnexpectedResponse {
        command: command.code(),
    }
}

async fn read_loop(
    mut reader: OwnedReadHalf,
    pending: Arc<Mutex<PendingRequests>>,
    resync: Arc<AtomicBool>,
    peer: SocketAddr,
) {
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!(gateway = %peer, "Gateway closed the connection");
                break;
            }
            Err(e) => {
                warn!(gateway = %peer, error = %e, "Read failed");
                break;
            }
        };

        let sequence = match peek_sequence(&frame) {
            Ok(sequence) => sequence,
            Err(e) => {
                warn!(gateway = %peer, error = %e, "Dropping undecodable frame");
                resync.store(true, Ordering::SeqCst);
                continue;
            }
        };

        if !pending.lock().await.complete(sequence, frame) {
            debug!(gateway = %peer, sequence, "Dropping unmatched response");
        }
    }

    pending.lock().await.close();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeGateway, config_for};
    use lightify_core::Rgba;
    use lightify_protocol::{CommandCode, ProtocolError, Status};
    use std::sync::Mutex as StdMutex;

    const BULB: Address = Address::from_bytes([0x9C, 0x8D, 0x0C, 0x00, 0x00, 0x26, 0x18, 0x84]);

    #[tokio::test]
    async fn request_roundtrip() {
        let gateway = FakeGateway::spawn(|sequence, command| {
            let groups = vec![GroupRecord::new(1, "Living"), GroupRecord::new(2, "Kitchen")];
            Some(command.encode_response(sequence, &Response::Groups(groups)).unwrap())
        })
        .await;

        let connection = Connection::connect(&config_for(gateway)).await.unwrap();
        let groups = connection.list_groups().await.unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1].name, "Kitchen");
        assert_eq!(connection.pending().await, 0);
    }

    #[tokio::test]
    async fn responses_are_routed_by_sequence() {
        // Hold the first reply back and answer both in reverse order, in
        // a single write.
        let held = Arc::new(StdMutex::new(None::<Vec<u8>>));
        let gateway = FakeGateway::spawn(move |sequence, command| {
            let reply = command
                .encode_response(sequence, &Response::Ack { address: BULB })
                .unwrap();
            let mut held = held.lock().unwrap();
            match held.take() {
                None => {
                    *held = Some(reply);
                    Some(Vec::new())
                }
                Some(first) => Some([reply, first].concat()),
            }
        })
        .await;

        let connection = Connection::connect(&config_for(gateway)).await.unwrap();
        let on = Command::set_power(BULB, true);
        let color = Command::set_color(BULB, Rgba::opaque(255, 0, 0), 10);

        let (a, b) = tokio::join!(connection.request(&on), connection.request(&color));
        assert_eq!(a.unwrap(), Response::Ack { address: BULB });
        assert_eq!(b.unwrap(), Response::Ack { address: BULB });
    }

    #[tokio::test]
    async fn silent_gateway_times_out() {
        let gateway = FakeGateway::spawn(|_, _| Some(Vec::new())).await;
        let config = config_for(gateway).with_request_timeout(Duration::from_millis(50));

        let connection = Connection::connect(&config).await.unwrap();
        let result = connection.firmware().await;

        assert!(matches!(result, Err(GatewayError::Timeout { .. })));
        assert_eq!(connection.pending().await, 0);
    }

    #[tokio::test]
    async fn hangup_fails_pending_request() {
        let gateway = FakeGateway::spawn(|_, _| None).await;
        let connection = Connection::connect(&config_for(gateway)).await.unwrap();

        let result = connection.list_devices().await;
        assert!(matches!(result, Err(GatewayError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn requests_after_hangup_fail_fast() {
        let gateway = FakeGateway::spawn(|sequence, command| match command {
            Command::GatewayFirmware => Some(
                command
                    .encode_response(sequence, &Response::Firmware(FirmwareVersion([1, 2, 3, 4])))
                    .unwrap(),
            ),
            _ => None,
        })
        .await;
        let config = config_for(gateway).with_request_timeout(Duration::from_secs(10));
        let connection = Connection::connect(&config).await.unwrap();

        connection.firmware().await.unwrap();
        assert!(matches!(
            connection.list_devices().await,
            Err(GatewayError::ConnectionClosed)
        ));
        assert!(connection.is_closed().await);

        let started = Instant::now();
        let result = connection.list_groups().await;
        assert!(matches!(result, Err(GatewayError::ConnectionClosed)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn failed_enumeration_keeps_resync_pending() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let log = seen.clone();
        let gateway = FakeGateway::spawn(move |sequence, command| {
            let mut log = log.lock().unwrap();
            log.push(command.code());
            let enumerations = log.iter().filter(|c| **c == CommandCode::ListDevices).count();
            let reply = match command {
                Command::SetPower { .. } => command.encode_failure(sequence, Status::ResyncRequired),
                // The first enumeration is never answered.
                Command::ListDevices if enumerations == 1 => return Some(Vec::new()),
                Command::ListDevices => {
                    command.encode_response(sequence, &Response::Devices(Vec::new()))
                }
                _ => command.encode_response(sequence, &Response::Groups(Vec::new())),
            };
            Some(reply.unwrap())
        })
        .await;
        let config = config_for(gateway).with_request_timeout(Duration::from_millis(100));
        let connection = Connection::connect(&config).await.unwrap();

        connection
            .request(&Command::set_power(BULB, true))
            .await
            .unwrap_err();
        let result = connection.list_groups().await;
        assert!(matches!(result, Err(GatewayError::Timeout { .. })));
        assert!(connection.needs_resync());

        connection.list_groups().await.unwrap();
        assert!(!connection.needs_resync());

        use lightify_protocol::CommandCode::*;
        assert_eq!(
            *seen.lock().unwrap(),
            vec![SetPower, ListDevices, ListDevices, ListGroups]
        );
    }

    #[tokio::test]
    async fn wifi_configuration_helper() {
        let gateway = FakeGateway::spawn(|sequence, command| {
            let profile = WifiProfile {
                ssid: "HomeNet".to_string(),
                bssid: lightify_protocol::Bssid([1, 2, 3, 4, 5, 6]),
                channel: 6,
                ip: "10.0.0.9".parse().unwrap(),
                gateway: "10.0.0.1".parse().unwrap(),
                netmask: "255.255.255.0".parse().unwrap(),
            };
            Some(command.encode_response(sequence, &Response::Wifi(vec![profile])).unwrap())
        })
        .await;
        let connection = Connection::connect(&config_for(gateway)).await.unwrap();

        let profiles = connection.wifi_configuration().await.unwrap();
        assert_eq!(profiles.len(), 1);
        assert_eq!(profiles[0].ssid, "HomeNet");
    }

    #[tokio::test]
    async fn resync_precedes_next_request_with_enumeration() {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let log = seen.clone();
        let gateway = FakeGateway::spawn(move |sequence, command| {
            log.lock().unwrap().push(command.code());
            let reply = match command {
                Command::SetPower { .. } => command.encode_failure(sequence, Status::ResyncRequired),
                Command::ListDevices => {
                    command.encode_response(sequence, &Response::Devices(Vec::new()))
                }
                _ => command.encode_response(sequence, &Response::Groups(Vec::new())),
            };
            Some(reply.unwrap())
        })
        .await;

        let connection = Connection::connect(&config_for(gateway)).await.unwrap();

        let error = connection
            .request(&Command::set_power(BULB, true))
            .await
            .unwrap_err();
        assert!(error.is_resync_required());
        assert!(connection.needs_resync());

        connection.list_groups().await.unwrap();
        assert!(!connection.needs_resync());

        use lightify_protocol::CommandCode::*;
        assert_eq!(*seen.lock().unwrap(), vec![SetPower, ListDevices, ListGroups]);
    }

    #[tokio::test]
    async fn status_error_is_surfaced() {
        let gateway = FakeGateway::spawn(|sequence, command| {
            Some(command.encode_failure(sequence, Status::WrongType).unwrap())
        })
        .await;
        let connection = Connection::connect(&config_for(gateway)).await.unwrap();

        let error = connection.device_info(BULB).await.unwrap_err();
        assert!(matches!(
            error,
            GatewayError::Protocol(ProtocolError::ProtocolStatus {
                status: Status::WrongType,
                ..
            })
        ));
        assert!(!connection.needs_resync());
    }

    #[tokio::test]
    async fn read_frame_splits_stream() {
        let first = Command::ListDevices.encode(1).unwrap();
        let second = Command::GatewayFirmware.encode(2).unwrap();
        let bytes = [first.clone(), second.clone()].concat();
        let mut stream = bytes.as_slice();

        assert_eq!(read_frame(&mut stream).await.unwrap(), Some(first));
        assert_eq!(read_frame(&mut stream).await.unwrap(), Some(second));
        assert_eq!(read_frame(&mut stream).await.unwrap(), None);
    }
}
