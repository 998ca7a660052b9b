// Multicast command/heartbeat transport
//
// Commands go out as one-byte datagrams to `group:command_port` from a
// socket bound on every host link; replies come back to `reply_port` on a
// single listener joined to the group on each of those links.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::error::Error;

const MAX_DATAGRAM: usize = 1500;

/// Commands understood by camera firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraCommand {
    /// Solicit a heartbeat reply.
    Ping,
    /// Trigger a capture on every camera.
    Shoot,
}

impl CameraCommand {
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Ping => 0x00,
            Self::Shoot => 0x01,
        }
    }
}

/// Group address plus the command and reply ports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MulticastGroup {
    pub group: Ipv4Addr,
    pub command_port: u16,
    pub reply_port: u16,
}

/// Fire-and-forget command channel to the whole fleet.
#[async_trait]
pub trait CommandSender: Send + Sync {
    async fn send(&self, command: CameraCommand) -> Result<(), Error>;
}

/// Sends commands on every host link.
#[derive(Debug)]
pub struct MulticastSender {
    sockets: Vec<UdpSocket>,
    target: SocketAddr,
}

impl MulticastSender {
    /// Bind one sending socket per host address.
    pub async fn bind(group: MulticastGroup, host_addresses: &[Ipv4Addr]) -> Result<Self, Error> {
        let mut sockets = Vec::with_capacity(host_addresses.len().max(1));
        if host_addresses.is_empty() {
            sockets.push(UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?);
        }
        for host in host_addresses {
            let socket = UdpSocket::bind((*host, 0)).await?;
            socket.set_multicast_ttl_v4(1)?;
            debug!(%host, "command socket bound");
            sockets.push(socket);
        }
        Ok(Self::from_sockets(
            sockets,
            SocketAddrV4::new(group.group, group.command_port).into(),
        ))
    }

    pub fn from_sockets(sockets: Vec<UdpSocket>, target: SocketAddr) -> Self {
        Self { sockets, target }
    }
}

#[async_trait]
impl CommandSender for MulticastSender {
    /// Sends on every socket; the first failure is reported after all
    /// links were tried.
    async fn send(&self, command: CameraCommand) -> Result<(), Error> {
        let payload = [command.as_byte()];
        let mut first_error = None;
        for socket in &self.sockets {
            if let Err(e) = socket.send_to(&payload, self.target).await {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(Error::Io(e)),
            None => Ok(()),
        }
    }
}

/// A raw reply datagram and where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    pub payload: Vec<u8>,
    pub from: SocketAddr,
}

/// Receives heartbeat replies.
#[derive(Debug)]
pub struct ReplyListener {
    socket: UdpSocket,
}

impl ReplyListener {
    /// Bind the reply port and join the group on each host link.
    pub async fn bind(group: MulticastGroup, host_addresses: &[Ipv4Addr]) -> Result<Self, Error> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, group.reply_port)).await?;
        if host_addresses.is_empty() {
            socket.join_multicast_v4(group.group, Ipv4Addr::UNSPECIFIED)?;
        }
        for host in host_addresses {
            if let Err(e) = socket.join_multicast_v4(group.group, *host) {
                warn!(%host, error = %e, "could not join reply group on link");
            }
        }
        Ok(Self { socket })
    }

    pub fn from_socket(socket: UdpSocket) -> Self {
        Self { socket }
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn recv(&self) -> Result<Datagram, Error> {
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let (len, from) = self.socket.recv_from(&mut buf).await?;
        buf.truncate(len);
        Ok(Datagram { payload: buf, from })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn wire_bytes() {
        assert_eq!(CameraCommand::Ping.as_byte(), 0);
        assert_eq!(CameraCommand::Shoot.as_byte(), 1);
    }

    #[tokio::test]
    async fn sender_emits_single_byte_and_listener_reports_sender() {
        let rx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let listener = ReplyListener::from_socket(rx);
        let target = listener.local_addr().unwrap();

        let tx = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let tx_addr = tx.local_addr().unwrap();
        let sender = MulticastSender::from_sockets(vec![tx], target);

        sender.send(CameraCommand::Shoot).await.unwrap();
        let datagram = listener.recv().await.unwrap();

        assert_eq!(datagram.payload, vec![0x01]);
        assert_eq!(datagram.from, tx_addr);
    }
}
