//! EDI network transports: PFT-fragmented UDP datagrams and raw AF-over-TCP.
//! Mirrors the reference encoder's output stage: UDP needs PFT because
//! datagrams can be lost or reordered, TCP doesn't because the stream
//! already guarantees both, ETSI TS 102 693 §6.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream, UdpSocket};

use super::af::AfPacket;
use super::pft::{PftConfig, PftFragmenter};
use crate::error::MuxError;

/// Every AF packet is PFT-fragmented and each fragment sent as one datagram
/// to `destination`.
pub struct EdiUdpSink {
    socket: UdpSocket,
    destination: SocketAddr,
    fragmenter: PftFragmenter,
}

/// Multicast TTL applied to EDI/UDP destinations in 224.0.0.0/4, matching
/// the reference encoder's fixed hop limit for studio-to-transmitter links.
const MULTICAST_TTL: u32 = 2;

impl EdiUdpSink {
    pub async fn connect(destination: SocketAddr, config: PftConfig) -> Result<Self, MuxError> {
        let bind_addr: SocketAddr =
            if destination.is_ipv6() { "[::]:0" } else { "0.0.0.0:0" }.parse().unwrap();
        let socket = UdpSocket::bind(bind_addr).await.map_err(MuxError::Io)?;
        if let SocketAddr::V4(v4) = destination {
            if v4.ip().octets()[0] & 0xF0 == 0xE0 {
                socket.set_multicast_ttl_v4(MULTICAST_TTL).map_err(MuxError::Io)?;
            }
        }
        Ok(EdiUdpSink { socket, destination, fragmenter: PftFragmenter::new(config) })
    }

    pub async fn send(&mut self, af_packet: &AfPacket) -> Result<(), MuxError> {
        let assembled = af_packet.assemble();
        for fragment in self.fragmenter.fragment(&assembled) {
            self.socket
                .send_to(&fragment.assemble(), self.destination)
                .await
                .map_err(MuxError::Io)?;
        }
        Ok(())
    }
}

enum TcpMode {
    Client(TcpStream),
    Server { listener: TcpListener, clients: Vec<TcpStream> },
}

/// Reliable, ordered AF packet delivery without PFT. Mirrors the reference
/// output's client/server modes: client connects out, server accepts and
/// broadcasts to every connected reader, dropping any that disconnect.
pub struct EdiTcpSink {
    mode: TcpMode,
    packets_sent: u64,
    bytes_sent: u64,
}

impl EdiTcpSink {
    pub async fn connect_client(addr: SocketAddr) -> Result<Self, MuxError> {
        let stream = TcpStream::connect(addr).await.map_err(MuxError::Io)?;
        Ok(EdiTcpSink { mode: TcpMode::Client(stream), packets_sent: 0, bytes_sent: 0 })
    }

    pub async fn bind_server(addr: SocketAddr) -> Result<Self, MuxError> {
        let listener = TcpListener::bind(addr).await.map_err(MuxError::Io)?;
        Ok(EdiTcpSink {
            mode: TcpMode::Server { listener, clients: Vec::new() },
            packets_sent: 0,
            bytes_sent: 0,
        })
    }

    /// Accepts any connections currently waiting (server mode only); gives
    /// up after a short grace period rather than blocking the caller's tick.
    pub async fn accept_pending(&mut self) {
        let TcpMode::Server { listener, clients } = &mut self.mode else { return };
        while let Ok(Ok((stream, _addr))) =
            tokio::time::timeout(Duration::from_millis(1), listener.accept()).await
        {
            clients.push(stream);
        }
    }

    pub async fn send(&mut self, af_packet: &AfPacket) -> Result<(), MuxError> {
        let data = af_packet.assemble();
        match &mut self.mode {
            TcpMode::Client(stream) => {
                stream.write_all(&data).await.map_err(MuxError::Io)?;
            }
            TcpMode::Server { clients, .. } => {
                let mut dead = Vec::new();
                for (i, client) in clients.iter_mut().enumerate() {
                    if client.write_all(&data).await.is_err() {
                        dead.push(i);
                    }
                }
                for i in dead.into_iter().rev() {
                    clients.remove(i);
                }
            }
        }
        self.packets_sent += 1;
        self.bytes_sent += data.len() as u64;
        Ok(())
    }

    pub fn connected_clients(&self) -> usize {
        match &self.mode {
            TcpMode::Client(_) => 1,
            TcpMode::Server { clients, .. } => clients.len(),
        }
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }
}
