//! Loopback fake gateway for transport tests.

use std::net::SocketAddr;
use std::time::Duration;

use lightify_protocol::Command;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::connection::read_frame;

pub(crate) struct FakeGateway;

impl FakeGateway {
    /// Accepts one connection and answers every request with whatever the
    /// handler returns: bytes to write (possibly none), or `None` to hang up.
    pub(crate) async fn spawn<F>(mut handler: F) -> SocketAddr
    where
        F: FnMut(u32, Command) -> Option<Vec<u8>> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            while let Ok(Some(frame)) = read_frame(&mut stream).await {
                let (sequence, command) = Command::decode(&frame).unwrap();
                match handler(sequence, command) {
                    Some(reply) => {
                        if stream.write_all(&reply).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
        });

        address
    }
}

pub(crate) fn config_for(address: SocketAddr) -> GatewayConfig {
    GatewayConfig::new(address.ip().to_string())
        .with_port(address.port())
        .with_request_timeout(Duration::from_secs(2))
}
