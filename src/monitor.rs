use crate::alerts::{Alert, AlertPolicy};
use crate::audio::{AudioDevicePool, HomeAudioSource};
use crate::config::MonitorConfig;
use crate::connection::{
    ConnectionEvent, ConnectionSnapshot, ConnectionStatus, OculusConnection, OpenVrConnection,
    SharedConnection, VrConnection,
};
use crate::error::{GuardianError, Result};
use crate::observer::Observer;
use crate::runtime::{DeviceEnumerator, OculusRuntime, OpenVrRuntime, ProcessProbe};
use crate::subscription::{EventReceiver, EVENT_CHANNEL_CAPACITY};
use crate::tracker::{SharedTracker, TurnSummary, YawTracker};
use crate::types::{AlertAction, AudioDevice, HmdState, Profile, ResumeOrigin, ResumeState, VrApi};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

/// Native providers the monitor drives
pub struct NativeBackends {
    pub oculus: Box<dyn OculusRuntime>,
    pub openvr: Box<dyn OpenVrRuntime>,
    pub processes: Arc<dyn ProcessProbe>,
    pub audio: Box<dyn DeviceEnumerator>,
}

/// Events published by [`Monitor`]
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// Forwarded from either connection
    Connection(ConnectionEvent),
    /// A sound should be played
    Alert(Alert),
    /// The active connection gave up; restart the process and seed the new
    /// tracker with this state
    RestartRequested(ResumeState),
}

struct MonitorShared {
    oculus: Arc<Mutex<OculusConnection>>,
    openvr: Arc<Mutex<OpenVrConnection>>,
    active: Mutex<Option<VrApi>>,
    pool: Mutex<AudioDevicePool>,
    policy: Mutex<AlertPolicy>,
    tracker: SharedTracker,
    restart_requested: AtomicBool,
    events_tx: broadcast::Sender<MonitorEvent>,
}

impl MonitorShared {
    fn connection(&self, api: VrApi) -> SharedConnection {
        match api {
            VrApi::OculusVr => self.oculus.clone(),
            VrApi::OpenVr => self.openvr.clone(),
        }
    }

    fn active_connection(&self) -> Option<SharedConnection> {
        let api = (*self.active.lock())?;
        Some(self.connection(api))
    }

    fn emit(&self, event: MonitorEvent) {
        let _ = self.events_tx.send(event);
    }

    fn raise_alert(&self, action: AlertAction) {
        let device = self.pool.lock().selected_device(action);
        tracing::info!(?action, ?device, "Alert raised");
        self.emit(MonitorEvent::Alert(Alert { action, device }));
    }

    fn handle_connection_event(&self, event: ConnectionEvent) {
        self.emit(MonitorEvent::Connection(event.clone()));

        match &event {
            // Audio devices can show up late after boot
            ConnectionEvent::StatusChangedToAllOk { .. } => self.pool.lock().request_refresh(),
            ConnectionEvent::StatusChanged {
                status: ConnectionStatus::InitLimitReached,
                ..
            } => self.check_restart(),
            _ => {}
        }

        let action = self.policy.lock().on_connection_event(&event);
        if let Some(action) = action {
            self.raise_alert(action);
        }
    }

    /// Request a restart when the active connection has given up.
    ///
    /// Reads the live status rather than the event, so an event handled
    /// before the switch to its API was published is still caught.
    fn check_restart(&self) {
        let Some(api) = *self.active.lock() else {
            return;
        };
        let status = self.connection(api).lock().status();
        if status == ConnectionStatus::InitLimitReached {
            self.request_restart(api);
        }
    }

    fn request_restart(&self, api: VrApi) {
        if self.restart_requested.swap(true, Ordering::SeqCst) {
            return;
        }
        let state = self
            .tracker
            .lock()
            .resume_state(ResumeOrigin::Restart, SystemTime::now());
        tracing::warn!(
            api = %api,
            half_turn = state.half_turn,
            "Init limit reached, requesting restart"
        );
        self.emit(MonitorEvent::RestartRequested(state));
    }

    fn maintain(&self) {
        if let Some(connection) = self.active_connection() {
            connection.lock().maintain();
        }
        self.check_restart();
    }
}

/// Host-facing entry point
///
/// Owns both runtime connections, the observer, the half-turn tracker and
/// the audio device pool. Only one connection is active at a time; it is
/// chosen by [`apply_profile`](Monitor::apply_profile).
///
/// # Example
///
/// ```no_run
/// # use cable_guardian::NativeBackends;
/// # fn backends() -> NativeBackends { unimplemented!() }
/// use cable_guardian::{Monitor, MonitorConfig, MonitorEvent, Profile, VrApi};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut monitor = Monitor::new(MonitorConfig::default(), backends(), None)?;
///     let mut events = monitor.subscribe();
///
///     monitor.apply_profile(&Profile::new("SteamVR", VrApi::OpenVr));
///     monitor.start().await;
///
///     while let Ok(event) = events.recv().await {
///         if let MonitorEvent::Alert(alert) = event {
///             println!("Play {:?} on {:?}", alert.action, alert.device);
///         }
///         println!("Half-turns: {}", monitor.turns());
///     }
///
///     monitor.stop().await;
///     Ok(())
/// }
/// ```
pub struct Monitor {
    shared: Arc<MonitorShared>,
    observer: Observer,
    maintenance_interval: Duration,
    pending_rx: Option<(EventReceiver<ConnectionEvent>, EventReceiver<ConnectionEvent>)>,
    alarm: Mutex<Option<tokio::task::JoinHandle<()>>>,
    stop_tx: Option<broadcast::Sender<()>>,
    task_handle: Option<tokio::task::JoinHandle<()>>,
}

impl Monitor {
    /// Build the monitor. Nothing is opened until a profile is applied.
    ///
    /// `resume` seeds the half-turn count; saved state is subject to the
    /// configured turn memory, restart carry-over is always applied.
    pub fn new(
        config: MonitorConfig,
        backends: NativeBackends,
        resume: Option<ResumeState>,
    ) -> Result<Self> {
        config.validate()?;

        let oculus = Arc::new(Mutex::new(OculusConnection::new(
            backends.oculus,
            backends.processes.clone(),
            config.oculus_home_process.clone(),
            config.init_attempt_limit,
        )));
        let openvr = Arc::new(Mutex::new(OpenVrConnection::new(
            backends.openvr,
            backends.processes,
            config.steamvr_process.clone(),
            config.autostart.clone(),
            config.init_attempt_limit,
        )));

        let observer = Observer::new(None, config.poll_interval());
        let tracker = YawTracker::from_resume(resume.as_ref(), config.decay_window(), SystemTime::now())
            .attach(&observer);

        let home: Arc<Mutex<dyn HomeAudioSource>> = oculus.clone();
        let pool = AudioDevicePool::new(backends.audio, Some(home));

        let pending_rx = (oculus.lock().subscribe(), openvr.lock().subscribe());
        let (events_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

        Ok(Self {
            shared: Arc::new(MonitorShared {
                oculus,
                openvr,
                active: Mutex::new(None),
                pool: Mutex::new(pool),
                policy: Mutex::new(AlertPolicy::from_config(&config)),
                tracker,
                restart_requested: AtomicBool::new(false),
                events_tx,
            }),
            observer,
            maintenance_interval: config.maintenance_interval(),
            pending_rx: Some(pending_rx),
            alarm: Mutex::new(None),
            stop_tx: None,
            task_handle: None,
        })
    }

    /// Subscribe to connection events, alerts and restart requests
    pub fn subscribe(&self) -> EventReceiver<MonitorEvent> {
        EventReceiver::new(self.shared.events_tx.subscribe())
    }

    /// Subscribe to the observer's per-tick headset snapshots
    pub fn subscribe_state(&self) -> EventReceiver<HmdState> {
        self.observer.subscribe()
    }

    /// The headset sampler feeding the tracker
    pub fn observer(&self) -> &Observer {
        &self.observer
    }

    /// Shared handle to the half-turn tracker
    pub fn tracker(&self) -> SharedTracker {
        self.shared.tracker.clone()
    }

    /// Current half-turn count and rotation side
    pub fn turns(&self) -> TurnSummary {
        self.shared.tracker.lock().summary()
    }

    /// Make the current heading the zero-turn reference
    pub fn reset_turns(&self) {
        self.shared.tracker.lock().reset();
    }

    /// State to persist on shutdown (origin `SavedConfig`)
    pub fn resume_state(&self) -> ResumeState {
        self.shared
            .tracker
            .lock()
            .resume_state(ResumeOrigin::SavedConfig, SystemTime::now())
    }

    /// The API chosen by the last profile, if any
    pub fn active_api(&self) -> Option<VrApi> {
        *self.shared.active.lock()
    }

    /// Status of either connection, active or not
    pub fn connection_snapshot(&self, api: VrApi) -> ConnectionSnapshot {
        self.shared.connection(api).lock().snapshot()
    }

    /// Apply a profile's runtime and audio settings.
    ///
    /// Returns `true` when the profile's manual device is not present and
    /// alerts will fall back to the system default.
    pub fn apply_profile(&self, profile: &Profile) -> bool {
        tracing::info!(profile = %profile.name, api = %profile.api, "Applying profile");

        let device_not_found = {
            let mut pool = self.shared.pool.lock();
            pool.set_device_source(profile.device_source);
            pool.set_manual_device(profile.device.clone());
            pool.device_not_found()
        };

        if let Some(current) = self.active_api() {
            let live = self.shared.connection(current).lock().status() == ConnectionStatus::AllOk;
            if current != profile.api && live {
                self.shared.policy.lock().expect_api_change();
            }
        }

        self.shared
            .oculus
            .lock()
            .set_require_home(profile.api == VrApi::OculusVr && profile.require_home);
        self.switch_connection(profile.api);

        device_not_found
    }

    /// Make `api` the active connection: close the old one, then open the new one
    pub fn switch_connection(&self, api: VrApi) {
        let current = self.active_api();
        if current == Some(api) {
            return;
        }

        if let Some(previous) = current {
            self.shared.connection(previous).lock().close();
        }

        // Published before opening: events raised by open() are handled
        // against the new API
        let target = self.shared.connection(api);
        *self.shared.active.lock() = Some(api);
        self.observer.set_active_connection(target.clone());

        {
            let mut conn = target.lock();
            if conn.status() != ConnectionStatus::Closed {
                conn.close();
            }
            conn.open();
        }
        self.shared.check_restart();
    }

    /// Re-open the active connection now instead of waiting for maintenance
    pub fn retry(&self) {
        if let Some(connection) = self.shared.active_connection() {
            connection.lock().open();
        }
        self.shared.check_restart();
    }

    /// Register or unregister the SteamVR autostart manifest
    pub fn set_auto_start(&self, enabled: bool) -> Result<()> {
        self.shared.openvr.lock().set_auto_start(enabled)
    }

    /// Whether SteamVR launches us on startup
    pub fn is_auto_start_enabled(&self) -> Result<bool> {
        self.shared.openvr.lock().is_auto_start_enabled()
    }

    /// Output devices, enumerated on first use
    pub fn audio_devices(&self) -> Vec<AudioDevice> {
        self.shared.pool.lock().devices().to_vec()
    }

    /// Re-enumerate output devices now
    pub fn refresh_audio_devices(&self) {
        self.shared.pool.lock().refresh_now();
    }

    /// `true` when the manual device is missing from the current list
    pub fn device_not_found(&self) -> bool {
        self.shared.pool.lock().device_not_found()
    }

    /// Pin an action to its own output device (`None` clears the pin)
    pub fn set_action_device(&self, action: AlertAction, device: Option<AudioDevice>) {
        self.shared.pool.lock().set_action_device(action, device);
    }

    /// Raise an [`AlertAction::Alarm`] after `delay`, replacing any pending alarm.
    ///
    /// A zero delay fires immediately. Must be called inside a Tokio runtime.
    pub fn alarm_in(&self, delay: Duration) {
        self.cancel_alarm();

        if delay.is_zero() {
            self.shared.raise_alert(AlertAction::Alarm);
            return;
        }

        tracing::info!(delay_secs = delay.as_secs(), "Alarm set");
        let shared = self.shared.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            shared.raise_alert(AlertAction::Alarm);
        });
        *self.alarm.lock() = Some(handle);
    }

    /// Drop the pending alarm, if any
    pub fn cancel_alarm(&self) {
        if let Some(handle) = self.alarm.lock().take() {
            if !handle.is_finished() {
                tracing::info!("Alarm cancelled");
            }
            handle.abort();
        }
    }

    /// Whether the event/maintenance loop is alive
    pub fn is_running(&self) -> bool {
        self.task_handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Start the observer and the event/maintenance loop
    ///
    /// If the monitor is already running it is stopped and restarted.
    pub async fn start(&mut self) {
        self.stop_loop().await;

        let (mut oculus_rx, mut openvr_rx) = match self.pending_rx.take() {
            Some(receivers) => receivers,
            None => (
                self.shared.oculus.lock().subscribe(),
                self.shared.openvr.lock().subscribe(),
            ),
        };

        let (stop_tx, _) = broadcast::channel(1);
        let mut stop_rx = stop_tx.subscribe();
        self.stop_tx = Some(stop_tx);

        let shared = self.shared.clone();
        let period = self.maintenance_interval;

        let handle = tokio::spawn(async move {
            let mut maintenance = tokio::time::interval(period);
            maintenance.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = stop_rx.recv() => {
                        tracing::info!("Monitor stopped");
                        break;
                    }
                    event = oculus_rx.recv() => {
                        if !forward(&shared, event) {
                            break;
                        }
                    }
                    event = openvr_rx.recv() => {
                        if !forward(&shared, event) {
                            break;
                        }
                    }
                    _ = maintenance.tick() => shared.maintain(),
                }
            }
        });

        self.task_handle = Some(handle);
        self.observer.start().await;
        tracing::info!("Monitor started");
    }

    /// Stop all background work and close both connections
    pub async fn stop(&mut self) {
        self.observer.stop().await;
        self.stop_loop().await;
        self.cancel_alarm();
        self.shared.oculus.lock().close();
        self.shared.openvr.lock().close();
        *self.shared.active.lock() = None;
    }

    async fn stop_loop(&mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.task_handle.take() {
            let _ = tokio::time::timeout(Duration::from_millis(500), handle).await;
        }
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        if let Some(handle) = self.task_handle.take() {
            handle.abort();
        }
        if let Some(handle) = self.alarm.get_mut().take() {
            handle.abort();
        }
    }
}

/// Handle one received connection event; `false` ends the loop
fn forward(shared: &MonitorShared, event: Result<ConnectionEvent>) -> bool {
    match event {
        Ok(event) => {
            shared.handle_connection_event(event);
            true
        }
        Err(GuardianError::ChannelClosed) => false,
        Err(e) => {
            tracing::warn!("Connection events missed: {}", e);
            true
        }
    }
}
