use crate::connection::{ConnectionStatus, SharedConnection};
use crate::subscription::{EventReceiver, EVENT_CHANNEL_CAPACITY};
use crate::types::HmdState;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// Default sampling interval. A head cannot turn 180° in 150 ms, which the
/// yaw unwrapping relies on.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(150);

/// Consumer applied inside the observer tick, before the state is broadcast
pub trait SampleSink: Send {
    fn on_state(&mut self, state: &HmdState);
}

/// Sink shared with the observer
pub type SharedSink = Arc<Mutex<dyn SampleSink>>;

struct ObserverShared {
    active: Mutex<Option<SharedConnection>>,
    sinks: Mutex<Vec<SharedSink>>,
    ticks: AtomicU64,
    /// Held for the whole tick so ticks never overlap
    tick_lock: Mutex<()>,
    state_tx: broadcast::Sender<HmdState>,
}

impl ObserverShared {
    fn tick(&self) -> Option<HmdState> {
        let _tick = self.tick_lock.lock();
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst) + 1;

        let connection = self.active.lock().clone()?;
        let (api, sample) = {
            let mut conn = connection.lock();
            if conn.status() != ConnectionStatus::AllOk {
                tracing::trace!(tick, api = %conn.api(), status = %conn.status(), "Tick skipped");
                return None;
            }
            (conn.api(), conn.sample()?)
        };

        let state = HmdState {
            api,
            tick,
            yaw: sample.yaw,
            user_present: sample.user_present,
        };

        let sinks = self.sinks.lock().clone();
        for sink in sinks {
            sink.lock().on_state(&state);
        }

        let _ = self.state_tx.send(state);
        Some(state)
    }
}

/// Periodic headset sampler
///
/// Each tick queries the active connection once; when it is `AllOk` the
/// reading is handed to the attached sinks and then broadcast as a
/// `StateRefreshed` snapshot.
pub struct Observer {
    shared: Arc<ObserverShared>,
    interval: Duration,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Observer {
    /// Create an idle observer. A zero interval falls back to
    /// [`DEFAULT_POLL_INTERVAL`].
    pub fn new(connection: Option<SharedConnection>, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            tracing::warn!("Zero observer interval, using {:?}", DEFAULT_POLL_INTERVAL);
            DEFAULT_POLL_INTERVAL
        } else {
            interval
        };
        let (state_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(ObserverShared {
                active: Mutex::new(connection),
                sinks: Mutex::new(Vec::new()),
                ticks: AtomicU64::new(0),
                tick_lock: Mutex::new(()),
                state_tx,
            }),
            interval,
            stop_tx: None,
            task_handle: None,
        }
    }

    /// Time between ticks
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Swap the polled connection; takes effect on the next tick
    pub fn set_active_connection(&self, connection: SharedConnection) {
        let api = connection.lock().api();
        *self.shared.active.lock() = Some(connection);
        tracing::debug!(api = %api, "Observer connection switched");
    }

    /// Connection polled on the next tick
    pub fn active_connection(&self) -> Option<SharedConnection> {
        self.shared.active.lock().clone()
    }

    /// Apply every `AllOk` reading to `sink` before it is broadcast
    pub fn add_sink(&self, sink: SharedSink) {
        self.shared.sinks.lock().push(sink);
    }

    /// Subscribe to `StateRefreshed` snapshots
    pub fn subscribe(&self) -> EventReceiver<HmdState> {
        EventReceiver::new(self.shared.state_tx.subscribe())
    }

    /// Ticks run so far, sampled or not
    pub fn tick_count(&self) -> u64 {
        self.shared.ticks.load(Ordering::SeqCst)
    }

    /// Run one tick now
    pub fn tick(&self) -> Option<HmdState> {
        self.shared.tick()
    }

    /// Whether the background loop is alive
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start ticking in the background
    ///
    /// If the observer is already running it is stopped and restarted.
    pub async fn start(&mut self) {
        self.stop().await;

        let (stop_tx, _) = broadcast::channel(1);
        let mut stop_rx = stop_tx.subscribe();
        self.stop_tx = Some(stop_tx);

        let shared = self.shared.clone();
        let period = self.interval;
        tracing::info!(interval_ms = period.as_millis() as u64, "Observer started");

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.recv() => {
                        tracing::info!("Observer stopped");
                        break;
                    }
                    _ = interval.tick() => {
                        shared.tick();
                    }
                }
            }
        });

        self.task_handle = Some(handle);
    }

    /// Stop ticking; the current tick, if any, completes first
    pub async fn stop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
        }
    }
}

impl Drop for Observer {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
    }
}
