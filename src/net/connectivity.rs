//! Connectivity observation and network quality probing
//!
//! [`ConnectivityObserver`] maintains a single deduplicated online/offline
//! signal on top of a [`ConnectivitySource`] and offers an on-demand
//! reachability probe that buckets round-trip time into a
//! [`NetworkQuality`]. The online signal is derived from both internet
//! capability and end-to-end validation, never from raw link-up events.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Point-in-time link state as reported by a connectivity source
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    /// The link claims internet capability
    pub has_internet: bool,
    /// End-to-end validation succeeded on the link
    pub validated: bool,
}

impl LinkState {
    /// A link with no internet capability
    pub const OFFLINE: LinkState = LinkState {
        has_internet: false,
        validated: false,
    };

    /// A validated link with internet capability
    pub const ONLINE: LinkState = LinkState {
        has_internet: true,
        validated: true,
    };

    /// Online requires both internet capability and validation
    ///
    /// # Examples
    ///
    /// ```
    /// use campuschat::net::connectivity::LinkState;
    ///
    /// assert!(LinkState::ONLINE.is_online());
    /// let unvalidated = LinkState { has_internet: true, validated: false };
    /// assert!(!unvalidated.is_online());
    /// ```
    pub fn is_online(&self) -> bool {
        self.has_internet && self.validated
    }
}

/// Source of link-state information.
///
/// Normally backed by the platform's network facility; implementations
/// push state changes through a watch channel. The trait exists so tests
/// and offline development can drive connectivity by hand.
pub trait ConnectivitySource: Send + Sync {
    /// Link state at the time of the call
    fn current(&self) -> LinkState;

    /// Change-notification stream carrying the latest link state
    fn changes(&self) -> watch::Receiver<LinkState>;
}

/// Hand-driven connectivity source for tests and offline development
pub struct StaticConnectivity {
    state: watch::Sender<LinkState>,
}

impl StaticConnectivity {
    /// Create a source reporting `initial`
    pub fn new(initial: LinkState) -> Self {
        let (state, _) = watch::channel(initial);
        Self { state }
    }

    /// Create a source that starts online
    pub fn online() -> Self {
        Self::new(LinkState::ONLINE)
    }

    /// Push a new link state to all subscribers
    pub fn set(&self, state: LinkState) {
        // A send error only means nobody is listening yet.
        let _ = self.state.send(state);
    }
}

impl ConnectivitySource for StaticConnectivity {
    fn current(&self) -> LinkState {
        *self.state.borrow()
    }

    fn changes(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }
}

/// Connectivity source derived from periodic TCP reachability probes
/// against a well-known address.
///
/// A successful probe counts as both internet-capable and validated; there
/// is no separate validation signal available from a plain socket probe.
pub struct ProbeConnectivity {
    state: Arc<watch::Sender<LinkState>>,
    worker: JoinHandle<()>,
}

impl ProbeConnectivity {
    /// Spawn the background probe loop.
    ///
    /// The first probe runs immediately so the initial state settles fast;
    /// afterwards the loop re-probes every `poll_interval`.
    pub fn start(probe_addr: String, timeout: Duration, poll_interval: Duration) -> Arc<Self> {
        let (tx, _) = watch::channel(LinkState::OFFLINE);
        let state = Arc::new(tx);

        let loop_state = Arc::clone(&state);
        let worker = tokio::spawn(async move {
            loop {
                let reachable = matches!(
                    tokio::time::timeout(timeout, TcpStream::connect(&probe_addr)).await,
                    Ok(Ok(_))
                );
                let next = if reachable {
                    LinkState::ONLINE
                } else {
                    LinkState::OFFLINE
                };
                loop_state.send_if_modified(|current| {
                    if *current != next {
                        *current = next;
                        true
                    } else {
                        false
                    }
                });
                tokio::time::sleep(poll_interval).await;
            }
        });

        Arc::new(Self { state, worker })
    }
}

impl ConnectivitySource for ProbeConnectivity {
    fn current(&self) -> LinkState {
        *self.state.borrow()
    }

    fn changes(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }
}

impl Drop for ProbeConnectivity {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Network quality bucket derived from a reachability probe's round-trip
/// time. Not persisted anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkQuality {
    /// Round trip under 100ms
    Excellent,
    /// Round trip under 300ms
    Good,
    /// Round trip under 800ms
    Fair,
    /// Reachable but slower than 800ms
    Poor,
    /// Offline, or the probe target could not be reached at all
    Unavailable,
}

impl fmt::Display for NetworkQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Excellent => write!(f, "EXCELLENT"),
            Self::Good => write!(f, "GOOD"),
            Self::Fair => write!(f, "FAIR"),
            Self::Poor => write!(f, "POOR"),
            Self::Unavailable => write!(f, "UNAVAILABLE"),
        }
    }
}

/// Bucket a measured round-trip time
fn bucket_rtt(rtt: Duration) -> NetworkQuality {
    if rtt < Duration::from_millis(100) {
        NetworkQuality::Excellent
    } else if rtt < Duration::from_millis(300) {
        NetworkQuality::Good
    } else if rtt < Duration::from_millis(800) {
        NetworkQuality::Fair
    } else {
        NetworkQuality::Poor
    }
}

/// Probe `probe_addr` with a TCP connect and bucket the measured time.
///
/// A connect that fails or exceeds `timeout` reports
/// [`NetworkQuality::Unavailable`]; a connect that lands but takes 800ms or
/// longer reports [`NetworkQuality::Poor`].
pub async fn probe_quality(probe_addr: &str, timeout: Duration) -> NetworkQuality {
    let started = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(probe_addr)).await {
        Ok(Ok(_stream)) => {
            let rtt = started.elapsed();
            let quality = bucket_rtt(rtt);
            tracing::debug!(?rtt, %quality, "reachability probe completed");
            quality
        }
        Ok(Err(error)) => {
            tracing::warn!(%error, "reachability probe failed");
            NetworkQuality::Unavailable
        }
        Err(_) => {
            tracing::warn!(?timeout, "reachability probe timed out");
            NetworkQuality::Unavailable
        }
    }
}

/// Maintains the deduplicated online signal and serves quality probes.
///
/// `start` and `stop` manage a single background watcher over the source's
/// change stream; both are safe to call in any order and any number of
/// times.
pub struct ConnectivityObserver {
    source: Arc<dyn ConnectivitySource>,
    online: watch::Sender<bool>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl ConnectivityObserver {
    /// Create an observer over `source`. No watching starts until
    /// [`start`](Self::start) is called.
    pub fn new(source: Arc<dyn ConnectivitySource>) -> Self {
        let (online, _) = watch::channel(false);
        Self {
            source,
            online,
            watcher: Mutex::new(None),
        }
    }

    /// Begin watching the source and publish the current state.
    ///
    /// Idempotent: a second call while the watcher is running does nothing,
    /// so a start/stop pair never leaks a second registration.
    pub fn start(&self) {
        let mut guard = lock(&self.watcher);
        if guard.is_some() {
            tracing::debug!("connectivity observer already started");
            return;
        }

        let initial = self.source.current().is_online();
        publish(&self.online, initial);
        tracing::debug!(online = initial, "connectivity observer started");

        let mut changes = self.source.changes();
        let online = self.online.clone();
        *guard = Some(tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                let now = changes.borrow_and_update().is_online();
                if publish(&online, now) {
                    tracing::info!(online = now, "connectivity changed");
                }
            }
        }));
    }

    /// Stop watching the source.
    ///
    /// Safe to call without a prior [`start`](Self::start); release problems
    /// are logged and ignored rather than surfaced.
    pub fn stop(&self) {
        match lock(&self.watcher).take() {
            Some(watcher) => {
                watcher.abort();
                tracing::debug!("connectivity observer stopped");
            }
            None => tracing::debug!("connectivity observer stopped without a start"),
        }
    }

    /// Point-in-time online state
    pub fn is_online(&self) -> bool {
        *self.online.borrow()
    }

    /// Subscribe to deduplicated online transitions
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.online.subscribe()
    }

    /// Probe the network and report its quality bucket.
    ///
    /// Reports [`NetworkQuality::Unavailable`] without probing when the
    /// observer already knows the device is offline. Never blocks the
    /// caller; the probe itself is bounded by `timeout`.
    pub async fn check_quality(&self, probe_addr: &str, timeout: Duration) -> NetworkQuality {
        if !self.is_online() {
            tracing::debug!("device offline, skipping reachability probe");
            return NetworkQuality::Unavailable;
        }
        probe_quality(probe_addr, timeout).await
    }
}

impl Drop for ConnectivityObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Send `value` if it differs from the published one; true when it flipped
fn publish(online: &watch::Sender<bool>, value: bool) -> bool {
    online.send_if_modified(|current| {
        if *current != value {
            *current = value;
            true
        } else {
            false
        }
    })
}

/// Lock a mutex, taking the data back from a panicked holder if needed
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
