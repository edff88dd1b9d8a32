//! Periodic relay loop: serial bytes in, one broadcast packet out per cycle

use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::broadcast::BroadcastServer;
use crate::config::RelayConfig;
use crate::continuity::ContinuityPolicy;
use crate::journal::Journal;
use crate::packet::{OutboundPacket, PacketSummary};
use crate::protocol::FrameAccumulator;
use crate::source::ByteSource;
use crate::types::{DetectionFlagSet, DetectionFlags, TelemetrySource};

/// Consecutive serial errors between repeated warnings.
const SERIAL_WARN_EVERY: u64 = 100;

/// What one relay cycle did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CycleReport {
    /// 1-based cycle number.
    pub cycle: u64,
    /// Flags consumed this cycle.
    pub flags: DetectionFlagSet,
    /// Continuity tier used; `None` when the cycle was skipped for lack of clients.
    pub source: Option<TelemetrySource>,
    pub packet: Option<OutboundPacket>,
    /// Clients the packet was queued for.
    pub recipients: usize,
}

impl CycleReport {
    pub fn skipped(&self) -> bool {
        self.packet.is_none()
    }
}

/// Owns the per-cycle pipeline: flags, serial read, frame scan, continuity,
/// encoding and broadcast.
pub struct RelayLoop<S> {
    config: RelayConfig,
    source: S,
    flags: Arc<DetectionFlags>,
    server: BroadcastServer,
    accumulator: FrameAccumulator,
    policy: ContinuityPolicy,
    journal: Option<Journal>,
    read_buf: Vec<u8>,
    cycle: u64,
    fast_path: bool,
    last_source: Option<TelemetrySource>,
    serial_errors: u64,
}

impl<S: ByteSource> RelayLoop<S> {
    pub fn new(
        config: RelayConfig,
        source: S,
        flags: Arc<DetectionFlags>,
        server: BroadcastServer,
    ) -> Self {
        let journal = if config.journal.enabled {
            match Journal::open(&config.journal.path) {
                Ok(journal) => Some(journal),
                Err(e) => {
                    warn!(error = %e, "Packet journal unavailable, continuing without it");
                    None
                }
            }
        } else {
            None
        };

        Self {
            read_buf: vec![0; config.serial.read_buffer],
            config,
            source,
            flags,
            server,
            accumulator: FrameAccumulator::new(),
            policy: ContinuityPolicy::new(),
            journal,
            cycle: 0,
            fast_path: true,
            last_source: None,
            serial_errors: 0,
        }
    }

    /// Whether to skip serial I/O and encoding while nobody is connected.
    /// On by default.
    pub fn with_fast_path(mut self, enabled: bool) -> Self {
        self.fast_path = enabled;
        self
    }

    pub fn server(&self) -> &BroadcastServer {
        &self.server
    }

    pub fn policy(&self) -> &ContinuityPolicy {
        &self.policy
    }

    /// Run one cycle immediately.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.cycle += 1;
        let cycle = self.cycle;

        let flags = self.flags.take();
        if flags.any() {
            info!(
                cycle,
                camera1_visible = flags.camera1_visible,
                camera1_thermal = flags.camera1_thermal,
                camera2_visible = flags.camera2_visible,
                camera2_thermal = flags.camera2_thermal,
                "Detection flags raised"
            );
        }

        if self.fast_path && !self.server.has_clients() {
            trace!(cycle, "No clients connected, skipping cycle");
            return CycleReport { cycle, flags, source: None, packet: None, recipients: 0 };
        }

        self.read_serial().await;

        let frames = self.accumulator.drain_frames();
        let resolved = self.policy.resolve_candidates(frames.iter().map(Vec::as_slice));
        self.note_source(resolved.source);

        let packet = OutboundPacket::assemble(&resolved.telemetry, flags);
        let recipients = self.server.broadcast(&packet);

        trace!(cycle, source = %resolved.source, recipients, "Cycle complete");

        if self.config.summary_every > 0 && cycle % self.config.summary_every == 0 {
            self.log_summary(cycle, &packet, resolved.source);
        }

        if let Some(journal) = &mut self.journal {
            if Journal::should_record(recipients, flags) {
                if let Err(e) = journal.record(&packet, flags, recipients) {
                    warn!(
                        path = %journal.path().display(),
                        error = %e,
                        "Failed to write packet journal"
                    );
                }
            }
        }

        CycleReport {
            cycle,
            flags,
            source: Some(resolved.source),
            packet: Some(packet),
            recipients,
        }
    }

    async fn read_serial(&mut self) {
        match self.source.read_available(&mut self.read_buf).await {
            Ok(n) => {
                if self.serial_errors > 0 {
                    info!(errors = self.serial_errors, "Serial reads recovered");
                    self.serial_errors = 0;
                }
                if n > 0 {
                    self.accumulator.push(&self.read_buf[..n]);
                }
            }
            Err(e) => {
                self.serial_errors += 1;
                if self.serial_errors == 1 || self.serial_errors % SERIAL_WARN_EVERY == 0 {
                    warn!(
                        source = %self.source.describe(),
                        errors = self.serial_errors,
                        error = %e,
                        "Serial read failed"
                    );
                }
            }
        }
    }

    fn note_source(&mut self, source: TelemetrySource) {
        if self.last_source == Some(source) {
            return;
        }
        match source {
            TelemetrySource::Simulated => warn!(
                source = %self.source.describe(),
                "No live GYK data yet, sending simulated telemetry"
            ),
            _ => debug!(
                from = self.last_source.map(|s| s.as_str()).unwrap_or("none"),
                to = %source,
                "Telemetry source changed"
            ),
        }
        self.last_source = Some(source);
    }

    fn log_summary(&self, cycle: u64, packet: &OutboundPacket, source: TelemetrySource) {
        match PacketSummary::parse(packet.as_bytes()) {
            Ok(summary) => debug!(
                cycle,
                %source,
                clients = self.server.client_count(),
                "Sent fields: {}",
                summary
            ),
            Err(e) => warn!(cycle, error = %e, "Sent packet failed self-check"),
        }
    }

    /// Spawn the loop on the runtime, ticking every `check_interval`.
    pub fn spawn(self) -> RelayHandle {
        let (report_tx, report_rx) = watch::channel(None);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(self.run(report_tx, cancel.clone()));
        RelayHandle { reports: report_rx, cancel, task }
    }

    async fn run(mut self, reports: watch::Sender<Option<CycleReport>>, cancel: CancellationToken) {
        info!(
            source = %self.source.describe(),
            connected = self.source.is_connected(),
            interval_ms = self.config.check_interval_ms,
            listen = %self.server.local_addr(),
            "Relay loop started"
        );
        if !self.config.enabled {
            info!("Location reporting disabled, relay idle");
        }

        let mut ticker = tokio::time::interval(self.config.check_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            if cancel.is_cancelled() {
                break;
            }
            if !self.config.enabled {
                continue;
            }

            let report = self.run_cycle().await;
            reports.send_replace(Some(report));
        }

        self.server.stop().await;
        info!(cycles = self.cycle, "Relay loop stopped");
    }
}

/// Handle to a spawned relay loop.
pub struct RelayHandle {
    reports: watch::Receiver<Option<CycleReport>>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RelayHandle {
    /// Stream of cycle reports. Slow consumers see only the newest report.
    pub fn cycles(&self) -> impl Stream<Item = CycleReport> + use<> {
        WatchStream::new(self.reports.clone()).filter_map(|report| async move { report })
    }

    /// Most recent cycle report, if any cycle has run.
    pub fn latest(&self) -> Option<CycleReport> {
        *self.reports.borrow()
    }

    /// Token that stops the loop when cancelled.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop after the current cycle, then stop the broadcast server.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.task.await {
            warn!(error = %e, "Relay task ended abnormally");
        }
    }
}
