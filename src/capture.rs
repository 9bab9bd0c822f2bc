//! Capture Listener.
//!
//! Opens a datalink channel on the capture interface and feeds every frame through
//! [`process_packet`], storing matching records in the [`ConnectionStore`]. Reads use a short
//! timeout so the worker notices the cancel flag even on an idle interface.
use crate::config::Context;
use crate::error::TrackmeError;
use crate::store::ConnectionStore;
use crate::tcp_process::process_packet;
use pcap_file::pcap::PcapReader;
use pnet::datalink::{self, Channel, Config, NetworkInterface};
use std::fmt;
use std::fs::File;
use std::io;
use std::net::{IpAddr, UdpSocket};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Routing probe target. Connecting a UDP socket sends nothing, it only makes the kernel pick
/// the outbound interface.
const EGRESS_PROBE: &str = "8.8.8.8:53";

/// A capture-capable interface and its bound addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCandidate {
    pub name: String,
    pub addresses: Vec<IpAddr>,
}

impl From<&NetworkInterface> for DeviceCandidate {
    fn from(iface: &NetworkInterface) -> Self {
        Self { name: iface.name.clone(), addresses: iface.ips.iter().map(|net| net.ip()).collect() }
    }
}

impl fmt::Display for DeviceCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let addresses = self.addresses.iter().map(|a| a.to_string()).collect::<Vec<_>>();
        write!(f, "{} [{}]", self.name, addresses.join(", "))
    }
}

pub fn list_devices() -> Vec<DeviceCandidate> {
    datalink::interfaces().iter().map(DeviceCandidate::from).collect()
}

/// Resolve the local address outbound traffic leaves from.
///
/// A specific bind host is taken as is; otherwise a UDP socket is connected to a public
/// address and its local address is read back.
pub fn resolve_egress_address(bind_host: &str) -> Option<IpAddr> {
    if let Ok(ip) = bind_host.trim().parse::<IpAddr>() {
        if !ip.is_unspecified() {
            return Some(ip);
        }
    }

    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(EGRESS_PROBE).ok()?;
    socket.local_addr().ok().map(|addr| addr.ip())
}

fn same_address(a: &IpAddr, b: &IpAddr) -> bool {
    let as_v4 = |ip: &IpAddr| match ip {
        IpAddr::V4(v4) => Some(*v4),
        IpAddr::V6(v6) => v6.to_ipv4_mapped(),
    };
    a == b || matches!((as_v4(a), as_v4(b)), (Some(x), Some(y)) if x == y)
}

/// Pick the capture interface: the one bound to `egress`, else the first with a non-loopback
/// address, else the first one listed.
pub fn select_device(candidates: &[DeviceCandidate], egress: Option<IpAddr>) -> Option<&DeviceCandidate> {
    if let Some(target) = egress {
        let matched = candidates
            .iter()
            .find(|dev| dev.addresses.iter().any(|addr| same_address(addr, &target)));
        if matched.is_some() {
            return matched;
        }
    }

    candidates
        .iter()
        .find(|dev| dev.addresses.iter().any(|addr| !addr.is_loopback()))
        .or_else(|| candidates.first())
}

/// Device auto-selection against the live interface list.
pub fn auto_select_device(bind_host: &str) -> Result<String, TrackmeError> {
    let candidates = list_devices();
    let egress = resolve_egress_address(bind_host);
    if egress.is_none() {
        warn!("Could not resolve egress address, falling back to first usable interface");
    }

    select_device(&candidates, egress)
        .map(|dev| dev.name.clone())
        .ok_or_else(|| TrackmeError::Capture("no capture devices found".to_string()))
}

#[derive(Debug, Default)]
struct CaptureCounters {
    frames: AtomicU64,
    undecoded: AtomicU64,
    filtered: AtomicU64,
    stored: AtomicU64,
    read_errors: AtomicU64,
}

impl CaptureCounters {
    fn snapshot(&self) -> CaptureStats {
        CaptureStats {
            frames: self.frames.load(Ordering::Relaxed),
            undecoded: self.undecoded.load(Ordering::Relaxed),
            filtered: self.filtered.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            read_errors: self.read_errors.load(Ordering::Relaxed),
        }
    }
}

/// Counters of the capture loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CaptureStats {
    /// Frames read from the capture source.
    pub frames: u64,
    /// Frames without a decodable IP/TCP layer.
    pub undecoded: u64,
    /// TCP segments rejected by the ACK/port filter.
    pub filtered: u64,
    /// Records written to the store.
    pub stored: u64,
    pub read_errors: u64,
}

impl fmt::Display for CaptureStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "frames={} undecoded={} filtered={} stored={} read_errors={}",
            self.frames, self.undecoded, self.filtered, self.stored, self.read_errors
        )
    }
}

enum ReadOutcome {
    Frame(Vec<u8>),
    Idle,
    Failed(String),
    End,
}

fn handle_frame(frame: &[u8], dst_port: u16, store: &ConnectionStore, counters: &CaptureCounters) {
    counters.frames.fetch_add(1, Ordering::Relaxed);
    match process_packet(frame, dst_port) {
        Ok(Some(record)) => {
            debug!("Captured {}", record);
            store.insert(record.identity(), record);
            counters.stored.fetch_add(1, Ordering::Relaxed);
        }
        Ok(None) => {
            counters.filtered.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => {
            debug!("Skipping frame: {}", e);
            counters.undecoded.fetch_add(1, Ordering::Relaxed);
        }
    }
}

/// How the capture loop reacts to read failures: each consecutive failure waits
/// `backoff * n` (at most one second), and `max_consecutive` in a row end the loop.
#[derive(Debug, Clone, Copy)]
struct ReadErrorPolicy {
    max_consecutive: u32,
    backoff: Duration,
}

const LIVE_READ_ERRORS: ReadErrorPolicy =
    ReadErrorPolicy { max_consecutive: 20, backoff: Duration::from_millis(50) };

impl ReadErrorPolicy {
    fn delay(&self, consecutive: u32) -> Duration {
        self.backoff.saturating_mul(consecutive).min(Duration::from_secs(1))
    }
}

fn process_with<F>(
    mut next_frame: F,
    dst_port: u16,
    store: &ConnectionStore,
    counters: &CaptureCounters,
    cancel_signal: Option<&AtomicBool>,
    policy: ReadErrorPolicy,
) where
    F: FnMut() -> ReadOutcome,
{
    let mut consecutive_errors = 0u32;
    loop {
        if let Some(cancel) = cancel_signal {
            if cancel.load(Ordering::Relaxed) {
                debug!("Cancellation signal received, stopping capture");
                break;
            }
        }

        match next_frame() {
            ReadOutcome::Frame(frame) => {
                consecutive_errors = 0;
                handle_frame(&frame, dst_port, store, counters);
            }
            ReadOutcome::Idle => consecutive_errors = 0,
            ReadOutcome::Failed(e) => {
                counters.read_errors.fetch_add(1, Ordering::Relaxed);
                consecutive_errors += 1;
                if consecutive_errors >= policy.max_consecutive {
                    error!("Failed to read packet: {} ({} in a row, stopping capture)", e, consecutive_errors);
                    break;
                }
                error!("Failed to read packet: {}", e);
                thread::sleep(policy.delay(consecutive_errors));
            }
            ReadOutcome::End => break,
        }
    }
}

/// Running capture worker.
///
/// Dropping the handle stops the worker and closes the capture channel.
pub struct ListenerHandle {
    device: String,
    cancel_signal: Arc<AtomicBool>,
    counters: Arc<CaptureCounters>,
    worker: Option<thread::JoinHandle<()>>,
}

impl ListenerHandle {
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Flag observed by the capture loop; setting it stops the worker at its next read.
    pub fn cancel_signal(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_signal)
    }

    pub fn stats(&self) -> CaptureStats {
        self.counters.snapshot()
    }

    /// False once the worker has exited, including after a run of read failures.
    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Signals the worker and waits for it to release the capture channel.
    pub fn stop(&mut self) -> CaptureStats {
        self.cancel_signal.store(true, Ordering::Relaxed);
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                error!("Capture worker on {} panicked", self.device);
            }
        }
        self.counters.snapshot()
    }
}

impl Drop for ListenerHandle {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.stop();
        }
    }
}

/// Capture Listener entry points.
pub struct CaptureListener;

impl CaptureListener {
    /// Opens the configured (or auto-selected) interface and starts the capture worker.
    ///
    /// Failing to open the interface is fatal and reported before any thread is spawned.
    pub fn start(ctx: &Context) -> Result<ListenerHandle, TrackmeError> {
        let device = match ctx.config.device() {
            Some(name) => name.to_string(),
            None => auto_select_device(&ctx.config.host)?,
        };

        let interface = datalink::interfaces()
            .into_iter()
            .find(|iface| iface.name == device)
            .ok_or_else(|| {
                TrackmeError::Capture(format!("Could not find network interface: {device}"))
            })?;

        let config = Config {
            promiscuous: false,
            read_timeout: Some(ctx.config.read_timeout()),
            ..Config::default()
        };

        let mut rx = match datalink::channel(&interface, config) {
            Ok(Channel::Ethernet(_tx, rx)) => rx,
            Ok(_) => return Err(TrackmeError::Capture("Unhandled channel type".to_string())),
            Err(e) => {
                return Err(TrackmeError::Capture(format!("Unable to create channel: {e}")))
            }
        };

        info!("Capturing on {} for ACK segments to port {}", device, ctx.config.tls_port);

        let cancel_signal = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(CaptureCounters::default());
        let store = ctx.store.clone();
        let dst_port = ctx.config.tls_port;

        let worker = {
            let cancel_signal = Arc::clone(&cancel_signal);
            let counters = Arc::clone(&counters);
            thread::Builder::new()
                .name(format!("capture-{device}"))
                .spawn(move || {
                    process_with(
                        move || match rx.next() {
                            Ok(frame) => ReadOutcome::Frame(frame.to_vec()),
                            Err(e)
                                if matches!(
                                    e.kind(),
                                    io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                                ) =>
                            {
                                ReadOutcome::Idle
                            }
                            Err(e) => ReadOutcome::Failed(e.to_string()),
                        },
                        dst_port,
                        &store,
                        &counters,
                        Some(cancel_signal.as_ref()),
                        LIVE_READ_ERRORS,
                    );
                    debug!("Capture worker exiting");
                })
                .map_err(|e| TrackmeError::Capture(format!("Failed to spawn capture worker: {e}")))?
        };

        Ok(ListenerHandle { device, cancel_signal, counters, worker: Some(worker) })
    }

    /// Runs a pcap file through the same decode, filter and store path as live capture.
    pub fn replay_pcap<P: AsRef<Path>>(path: P, ctx: &Context) -> Result<CaptureStats, TrackmeError> {
        let file = File::open(path.as_ref())
            .map_err(|e| TrackmeError::Parse(format!("Failed to open PCAP file: {e}")))?;
        let mut pcap_reader = PcapReader::new(file)
            .map_err(|e| TrackmeError::Parse(format!("Failed to create PCAP reader: {e}")))?;

        let counters = CaptureCounters::default();
        process_with(
            || match pcap_reader.next_packet() {
                Some(Ok(packet)) => ReadOutcome::Frame(packet.data.to_vec()),
                Some(Err(e)) => {
                    error!("Error reading PCAP packet: {}", e);
                    ReadOutcome::End
                }
                None => ReadOutcome::End,
            },
            ctx.config.tls_port,
            &ctx.store,
            &counters,
            None,
            LIVE_READ_ERRORS,
        );

        let stats = counters.snapshot();
        info!("Replayed {}: {}", path.as_ref().display(), stats);
        Ok(stats)
    }
}
