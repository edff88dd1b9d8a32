//! TCP broadcast of downstream packets
//!
//! One listener, any number of clients. Each packet is written to every
//! connected client; there is no per-client filtering and nothing is read
//! from clients except end-of-stream.
//!
//! The server runs an accept task plus one task per client. A client task owns
//! its socket: it writes packets queued for it and notices disconnects. The
//! relay only ever pushes into the per-client queues, so a stalled or dead
//! client never delays the cycle or the other clients. A client removed from
//! the set has its task cancelled, even mid-write, and its socket closed.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::packet::OutboundPacket;
use crate::{RelayError, Result};

/// Packets a client may fall behind before it is dropped.
pub const CLIENT_QUEUE_DEPTH: usize = 16;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

type ClientId = u64;

#[derive(Debug)]
struct ClientEntry {
    peer: SocketAddr,
    tx: mpsc::Sender<OutboundPacket>,
    /// Stops the client task; child of the server token.
    cancel: CancellationToken,
}

type ClientMap = Arc<Mutex<HashMap<ClientId, ClientEntry>>>;

fn lock(clients: &ClientMap) -> MutexGuard<'_, HashMap<ClientId, ClientEntry>> {
    clients.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Listening TCP server that fans packets out to all connected clients.
pub struct BroadcastServer {
    local_addr: SocketAddr,
    clients: ClientMap,
    cancel: CancellationToken,
    accept_task: Option<JoinHandle<()>>,
}

impl BroadcastServer {
    /// Bind the listener and start accepting clients.
    ///
    /// A bind failure is returned as [`RelayError::Bind`]; the relay cannot
    /// run without its listener.
    pub async fn start(addr: SocketAddr) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).await.map_err(|source| RelayError::Bind { addr, source })?;
        let local_addr = listener.local_addr()?;

        let clients: ClientMap = Arc::default();
        let cancel = CancellationToken::new();

        let accept_task =
            tokio::spawn(Self::accept_loop(listener, Arc::clone(&clients), cancel.clone()));

        info!(%local_addr, "Broadcast server listening");

        Ok(Self { local_addr, clients, cancel, accept_task: Some(accept_task) })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn client_count(&self) -> usize {
        lock(&self.clients).len()
    }

    pub fn has_clients(&self) -> bool {
        !lock(&self.clients).is_empty()
    }

    /// Queue `packet` for every connected client.
    ///
    /// Returns how many clients it was queued for. A client whose queue is
    /// closed or full is removed once the iteration is done and its task is
    /// cancelled, which closes the socket even if a write is blocked.
    pub fn broadcast(&self, packet: &OutboundPacket) -> usize {
        let mut clients = lock(&self.clients);
        let mut dropped = Vec::new();
        let mut queued = 0;

        for (&id, client) in clients.iter() {
            match client.tx.try_send(*packet) {
                Ok(()) => queued += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(peer = %client.peer, "Client is not keeping up, dropping it");
                    dropped.push(id);
                }
                Err(TrySendError::Closed(_)) => dropped.push(id),
            }
        }

        for id in dropped {
            if let Some(client) = clients.remove(&id) {
                client.cancel.cancel();
                debug!(peer = %client.peer, "Removed client from broadcast set");
            }
        }

        trace!(queued, "Packet broadcast");
        queued
    }

    /// Stop accepting, disconnect every client and wait for the server tasks.
    ///
    /// Safe to call more than once.
    pub async fn stop(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.accept_task.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "Accept task ended abnormally");
            }
            info!(local_addr = %self.local_addr, "Broadcast server stopped");
        }
        lock(&self.clients).clear();
    }

    async fn accept_loop(listener: TcpListener, clients: ClientMap, cancel: CancellationToken) {
        let mut client_tasks = JoinSet::new();
        let mut next_id: ClientId = 0;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        next_id += 1;
                        if let Err(e) = stream.set_nodelay(true) {
                            debug!(%peer, error = %e, "Could not disable Nagle");
                        }
                        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_DEPTH);
                        let client_cancel = cancel.child_token();
                        let entry = ClientEntry { peer, tx, cancel: client_cancel.clone() };
                        let count = {
                            let mut map = lock(&clients);
                            map.insert(next_id, entry);
                            map.len()
                        };
                        info!(%peer, clients = count, "Client connected");
                        let (reader, writer) = stream.into_split();
                        client_tasks.spawn(Self::serve_client(
                            next_id,
                            peer,
                            reader,
                            writer,
                            rx,
                            Arc::clone(&clients),
                            client_cancel,
                        ));
                    }
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                        tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                    }
                },
                Some(_) = client_tasks.join_next(), if !client_tasks.is_empty() => {}
            }
        }

        client_tasks.shutdown().await;
        debug!("Accept loop ended");
    }

    async fn serve_client<R, W>(
        id: ClientId,
        peer: SocketAddr,
        mut reader: R,
        mut writer: W,
        mut packets: mpsc::Receiver<OutboundPacket>,
        clients: ClientMap,
        cancel: CancellationToken,
    ) where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut scratch = [0u8; 64];

        let reason = loop {
            tokio::select! {
                _ = cancel.cancelled() => break "cancelled",
                packet = packets.recv() => match packet {
                    Some(packet) => tokio::select! {
                        _ = cancel.cancelled() => break "cancelled during write",
                        written = writer.write_all(packet.as_bytes()) => {
                            if let Err(e) = written {
                                debug!(%peer, error = %e, "Write failed");
                                break "write failed";
                            }
                        }
                    },
                    None => break "dropped from broadcast set",
                },
                read = reader.read(&mut scratch) => match read {
                    Ok(0) => break "peer closed connection",
                    Ok(n) => trace!(%peer, bytes = n, "Ignoring client data"),
                    Err(e) => {
                        debug!(%peer, error = %e, "Read failed");
                        break "read failed";
                    }
                },
            }
        };

        let remaining = {
            let mut map = lock(&clients);
            map.remove(&id);
            map.len()
        };
        info!(%peer, reason, clients = remaining, "Client disconnected");
    }
}

impl Drop for BroadcastServer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::PACKET_LEN;
    use crate::protocol::{REFERENCE_FRAME, decode_frame};
    use crate::types::{DetectionChannel, DetectionFlagSet};
    use tokio::net::TcpStream;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(5);

    async fn start_local() -> BroadcastServer {
        let _ = tracing_subscriber::fmt::try_init();
        BroadcastServer::start("127.0.0.1:0".parse().unwrap()).await.unwrap()
    }

    async fn wait_for_clients(server: &BroadcastServer, n: usize) {
        timeout(WAIT, async {
            while server.client_count() != n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("client count reached");
    }

    fn packet(flags: DetectionFlagSet) -> OutboundPacket {
        OutboundPacket::assemble(&decode_frame(&REFERENCE_FRAME).unwrap(), flags)
    }

    async fn read_packet(stream: &mut TcpStream) -> [u8; PACKET_LEN] {
        let mut buf = [0u8; PACKET_LEN];
        timeout(WAIT, stream.read_exact(&mut buf)).await.unwrap().unwrap();
        buf
    }

    #[tokio::test]
    async fn every_client_receives_every_packet() {
        let mut server = start_local().await;
        let mut clients = Vec::new();
        for _ in 0..3 {
            clients.push(TcpStream::connect(server.local_addr()).await.unwrap());
        }
        wait_for_clients(&server, 3).await;

        let first = packet(DetectionFlagSet::default());
        let second = packet(DetectionFlagSet::only(DetectionChannel::Camera1Visible));
        assert_eq!(server.broadcast(&first), 3);
        assert_eq!(server.broadcast(&second), 3);

        for client in &mut clients {
            assert_eq!(read_packet(client).await, *first.as_bytes());
            assert_eq!(read_packet(client).await, *second.as_bytes());
        }

        server.stop().await;
    }

    #[tokio::test]
    async fn disconnected_client_does_not_affect_others() {
        let mut server = start_local().await;
        let mut a = TcpStream::connect(server.local_addr()).await.unwrap();
        let b = TcpStream::connect(server.local_addr()).await.unwrap();
        let mut c = TcpStream::connect(server.local_addr()).await.unwrap();
        wait_for_clients(&server, 3).await;

        drop(b);
        wait_for_clients(&server, 2).await;

        let p = packet(DetectionFlagSet::default());
        assert_eq!(server.broadcast(&p), 2);
        assert_eq!(read_packet(&mut a).await, *p.as_bytes());
        assert_eq!(read_packet(&mut c).await, *p.as_bytes());

        server.stop().await;
    }

    #[tokio::test]
    async fn broadcast_without_clients_is_noop() {
        let mut server = start_local().await;
        assert!(!server.has_clients());
        assert_eq!(server.broadcast(&packet(DetectionFlagSet::default())), 0);
        server.stop().await;
    }

    #[tokio::test]
    async fn bind_conflict_is_fatal() {
        let mut server = start_local().await;
        let err = BroadcastServer::start(server.local_addr()).await.err().expect("port in use");
        assert!(matches!(err, RelayError::Bind { .. }));
        assert!(!err.is_retryable());
        server.stop().await;
    }

    #[tokio::test]
    async fn stop_closes_client_sockets() {
        let mut server = start_local().await;
        let mut client = TcpStream::connect(server.local_addr()).await.unwrap();
        wait_for_clients(&server, 1).await;

        server.stop().await;
        assert_eq!(server.client_count(), 0);

        let mut buf = [0u8; 8];
        let n = timeout(WAIT, client.read(&mut buf)).await.unwrap().unwrap_or(0);
        assert_eq!(n, 0);

        // Second stop is harmless.
        server.stop().await;
    }

    #[tokio::test]
    async fn stalled_client_is_dropped_and_its_task_ends() {
        let mut server = start_local().await;

        // A peer that never reads: writes block once the pipe is full.
        let (server_side, _stalled_peer) = tokio::io::duplex(PACKET_LEN);
        let (reader, writer) = tokio::io::split(server_side);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_DEPTH);
        let peer: SocketAddr = "192.0.2.1:4000".parse().unwrap();
        let cancel = server.cancel.child_token();
        lock(&server.clients).insert(0, ClientEntry { peer, tx, cancel: cancel.clone() });
        let task = tokio::spawn(BroadcastServer::serve_client(
            0,
            peer,
            reader,
            writer,
            rx,
            Arc::clone(&server.clients),
            cancel,
        ));

        let p = packet(DetectionFlagSet::default());
        for _ in 0..(CLIENT_QUEUE_DEPTH * 4) {
            if !server.has_clients() {
                break;
            }
            server.broadcast(&p);
            tokio::task::yield_now().await;
        }
        assert_eq!(server.client_count(), 0);

        timeout(WAIT, task)
            .await
            .expect("client task still blocked in write")
            .unwrap();

        server.stop().await;
    }

    #[tokio::test]
    async fn slow_client_does_not_hold_back_others() {
        let mut server = start_local().await;
        let mut healthy = TcpStream::connect(server.local_addr()).await.unwrap();
        wait_for_clients(&server, 1).await;

        let (server_side, _stalled_peer) = tokio::io::duplex(PACKET_LEN);
        let (reader, writer) = tokio::io::split(server_side);
        let (tx, rx) = mpsc::channel(CLIENT_QUEUE_DEPTH);
        let peer: SocketAddr = "192.0.2.2:4000".parse().unwrap();
        let cancel = server.cancel.child_token();
        lock(&server.clients).insert(u64::MAX, ClientEntry { peer, tx, cancel: cancel.clone() });
        let stalled = tokio::spawn(BroadcastServer::serve_client(
            u64::MAX,
            peer,
            reader,
            writer,
            rx,
            Arc::clone(&server.clients),
            cancel,
        ));

        let p = packet(DetectionFlagSet::only(DetectionChannel::Camera2Visible));
        let mut sent = 0;
        while server.client_count() == 2 && sent < CLIENT_QUEUE_DEPTH * 4 {
            server.broadcast(&p);
            sent += 1;
            // Keep the healthy client's queue drained.
            read_packet(&mut healthy).await;
        }
        assert_eq!(server.client_count(), 1);
        timeout(WAIT, stalled).await.unwrap().unwrap();

        assert_eq!(server.broadcast(&p), 1);
        assert_eq!(read_packet(&mut healthy).await, *p.as_bytes());

        server.stop().await;
    }

    #[tokio::test]
    async fn client_data_is_ignored() {
        let mut server = start_local().await;
        let mut client = TcpStream::connect(server.local_addr()).await.unwrap();
        wait_for_clients(&server, 1).await;

        client.write_all(b"hello relay").await.unwrap();
        let p = packet(DetectionFlagSet::default());
        assert_eq!(server.broadcast(&p), 1);
        assert_eq!(read_packet(&mut client).await, *p.as_bytes());

        server.stop().await;
    }
}
