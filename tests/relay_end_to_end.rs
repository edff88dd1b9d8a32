//! End-to-end relay tests over loopback TCP
//!
//! Serial input comes from a scripted `MemorySource`; clients are real
//! sockets reading the 56-byte packets.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

use trackside_relay::packet::{PACKET_LEN, PacketSummary};
use trackside_relay::protocol::{REFERENCE_FRAME, SPEED_OFFSET};
use trackside_relay::sources::{DisconnectedSource, MemorySource};
use trackside_relay::{
    BroadcastServer, ByteSource, DetectionChannel, DetectionFlags, RelayConfig, RelayLoop,
    TelemetrySource,
};

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> BroadcastServer {
    let _ = tracing_subscriber::fmt::try_init();
    BroadcastServer::start("127.0.0.1:0".parse().unwrap()).await.unwrap()
}

async fn wait_for_clients<S: ByteSource>(relay: &RelayLoop<S>, n: usize) {
    timeout(WAIT, async {
        while relay.server().client_count() != n {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("expected client count");
}

async fn read_packet(stream: &mut TcpStream) -> [u8; PACKET_LEN] {
    let mut buf = [0u8; PACKET_LEN];
    timeout(WAIT, stream.read_exact(&mut buf)).await.unwrap().unwrap();
    buf
}

#[tokio::test]
async fn reference_frame_reaches_every_client() {
    let server = start_server().await;
    let addr = server.local_addr();
    let source = MemorySource::new();
    let mut relay = RelayLoop::new(
        RelayConfig::default(),
        source.clone(),
        Arc::new(DetectionFlags::new()),
        server,
    );

    let mut clients = Vec::new();
    for _ in 0..3 {
        clients.push(TcpStream::connect(addr).await.unwrap());
    }
    wait_for_clients(&relay, 3).await;

    // Noise before the frame, as on a freshly opened line.
    let mut read = vec![0x00, 0x10, 0x03, 0xFF];
    read.extend_from_slice(&REFERENCE_FRAME);
    source.push(read);

    let report = relay.run_cycle().await;
    assert_eq!(report.source, Some(TelemetrySource::Live));
    assert_eq!(report.recipients, 3);

    let expected = *report.packet.unwrap().as_bytes();
    for client in &mut clients {
        let bytes = read_packet(client).await;
        assert_eq!(bytes, expected);
        assert_eq!(bytes[0], 0xAA);
        assert_eq!(bytes[PACKET_LEN - 1], 0xFF);

        let summary = PacketSummary::parse(&bytes).unwrap();
        assert_eq!(summary.date_time.to_string(), "2025-08-19 16:09:20");
        assert_eq!(summary.train_number, 55172);
        assert_eq!(summary.locomotive, "1");
        assert!((summary.kilometer_post_km - 2.364).abs() < 1e-9);
        assert_eq!(summary.speed_kmh, 45);
    }
}

#[tokio::test]
async fn closed_client_is_isolated() {
    let server = start_server().await;
    let addr = server.local_addr();
    let mut relay = RelayLoop::new(
        RelayConfig::default(),
        DisconnectedSource::new("COM1"),
        Arc::new(DetectionFlags::new()),
        server,
    );

    let mut a = TcpStream::connect(addr).await.unwrap();
    let b = TcpStream::connect(addr).await.unwrap();
    let mut c = TcpStream::connect(addr).await.unwrap();
    wait_for_clients(&relay, 3).await;

    drop(b);
    relay.run_cycle().await;
    wait_for_clients(&relay, 2).await;

    let report = relay.run_cycle().await;
    assert_eq!(report.recipients, 2);
    assert_eq!(report.source, Some(TelemetrySource::Simulated));

    // Both survivors see both cycles in order.
    for client in [&mut a, &mut c] {
        let _first = read_packet(client).await;
        assert_eq!(read_packet(client).await, *report.packet.unwrap().as_bytes());
    }
}

#[tokio::test]
async fn cached_cycles_repeat_telemetry_with_fresh_flags() {
    let server = start_server().await;
    let addr = server.local_addr();
    let source = MemorySource::new();
    let flags = Arc::new(DetectionFlags::new());
    let mut relay =
        RelayLoop::new(RelayConfig::default(), source.clone(), Arc::clone(&flags), server);

    let mut client = TcpStream::connect(addr).await.unwrap();
    wait_for_clients(&relay, 1).await;

    let mut frame = REFERENCE_FRAME;
    frame[SPEED_OFFSET] = 72;
    source.push(frame.to_vec());
    let live = relay.run_cycle().await;
    assert_eq!(live.source, Some(TelemetrySource::Live));
    let live_bytes = read_packet(&mut client).await;

    // Garbage that never forms a frame.
    source.push(vec![0x55; 100]);
    let raiser = {
        let flags = Arc::clone(&flags);
        std::thread::spawn(move || flags.raise(DetectionChannel::Camera1Thermal))
    };
    raiser.join().unwrap();

    let cached = relay.run_cycle().await;
    assert_eq!(cached.source, Some(TelemetrySource::Cached));
    let cached_bytes = read_packet(&mut client).await;

    assert_eq!(live_bytes[5..53], cached_bytes[5..53]);
    assert_eq!(live_bytes[1..5], [0, 0, 0, 0]);
    assert_eq!(cached_bytes[1..5], [0, 1, 0, 0]);
    assert_ne!(live_bytes[53..55], cached_bytes[53..55]);
    assert_eq!(PacketSummary::parse(&cached_bytes).unwrap().speed_kmh, 72);

    // Flags are one-shot.
    relay.run_cycle().await;
    assert_eq!(read_packet(&mut client).await[1..5], [0, 0, 0, 0]);
}

#[tokio::test]
async fn spawned_relay_streams_until_shutdown() {
    let server = start_server().await;
    let addr = server.local_addr();
    let config = RelayConfig { check_interval_ms: 10, ..RelayConfig::default() };
    let handle = RelayLoop::new(
        config,
        MemorySource::from_chunks([REFERENCE_FRAME.to_vec()]),
        Arc::new(DetectionFlags::new()),
        server,
    )
    .spawn();

    let mut client = TcpStream::connect(addr).await.unwrap();

    // Cycles keep coming, whether or not a client is attached yet.
    let mut cycles = Box::pin(handle.cycles());
    let delivered = timeout(WAIT, async {
        loop {
            if let Some(report) = cycles.next().await {
                if report.recipients > 0 {
                    return report;
                }
            }
        }
    })
    .await
    .unwrap();
    assert!(delivered.packet.is_some());

    let bytes = read_packet(&mut client).await;
    assert_eq!(bytes[0], 0xAA);

    timeout(WAIT, handle.shutdown()).await.unwrap();

    // Server stopped with the relay: the socket reaches end of stream.
    let mut rest = Vec::new();
    let closed = timeout(WAIT, client.read_to_end(&mut rest)).await;
    assert!(closed.is_ok(), "client socket still open after shutdown");
}
