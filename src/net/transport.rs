//! UDP datagram transport.
//!
//! Strictly a pump: the simulation enqueues outbound packets on the
//! connection, the transport flushes them and surfaces raw inbound
//! datagrams. Session encryption would slot in here; the core never sees it.

use std::io;

use tokio::net::UdpSocket;

use crate::net::connection::Connection;

pub struct UdpTransport {
    socket: UdpSocket,
}

impl UdpTransport {
    /// Binds an ephemeral local port and connects it to the server.
    pub async fn connect(server_addr: &str) -> io::Result<Self> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect(server_addr).await?;
        Ok(Self { socket })
    }

    /// Non-blocking receive; None when no datagram is pending.
    pub fn poll_recv(&self, buf: &mut [u8]) -> Option<usize> {
        match self.socket.try_recv(buf) {
            Ok(n) => Some(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => None,
            Err(e) => {
                tracing::warn!("recv error: {e}");
                None
            }
        }
    }

    /// Pushes everything the simulation queued this frame onto the wire.
    pub fn flush(&self, connection: &mut Connection) {
        for datagram in connection.take_outbound() {
            if let Err(e) = self.socket.try_send(&datagram) {
                if e.kind() != io::ErrorKind::WouldBlock {
                    tracing::warn!("send error: {e}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_flush_round_trip() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = receiver.local_addr().unwrap();

        let transport = UdpTransport::connect(&addr.to_string()).await.unwrap();
        let mut connection = Connection::default();
        connection.send(vec![1, 2, 3]);
        transport.flush(&mut connection);

        let mut buf = [0u8; 16];
        let n = receiver.recv(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], &[1, 2, 3]);
        assert_eq!(connection.outbound_len(), 0);
    }

    #[tokio::test]
    async fn test_poll_recv_empty() {
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let transport = UdpTransport::connect(&peer.local_addr().unwrap().to_string())
            .await
            .unwrap();

        let mut buf = [0u8; 16];
        assert!(transport.poll_recv(&mut buf).is_none());
    }
}
