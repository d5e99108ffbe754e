//! Connection state machines for the two VR runtimes.
//!
//! Both variants share [`ConnectionCore`], which owns the common status,
//! the consecutive init-failure counter and the event channel. The
//! API-specific detail lives in [`SubStatus`].

mod oculus;
mod openvr;

pub use oculus::{OculusConnection, OculusStatus};
pub use openvr::{AutoStartManifest, OpenVrConnection, OpenVrStatus};

use crate::subscription::{EventReceiver, EVENT_CHANNEL_CAPACITY};
use crate::types::{Radians, VrApi};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Connection status shared by both runtimes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Closed,
    Initializing,
    AllOk,
    NotOk,
    /// Terminal: too many consecutive failed initializations
    InitLimitReached,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Closed => "Closed",
            ConnectionStatus::Initializing => "Initializing",
            ConnectionStatus::AllOk => "All OK",
            ConnectionStatus::NotOk => "NOT OK",
            ConnectionStatus::InitLimitReached => "Init limit reached",
        };
        f.write_str(s)
    }
}

/// API-tagged status detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubStatus {
    Oculus(OculusStatus),
    OpenVr(OpenVrStatus),
}

impl SubStatus {
    /// The runtime itself asked the application to quit
    pub fn is_controlled_quit(&self) -> bool {
        matches!(
            self,
            SubStatus::Oculus(OculusStatus::OculusVrQuit) | SubStatus::OpenVr(OpenVrStatus::SteamVrQuit)
        )
    }
}

/// Events raised by a connection
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    /// Raised on every status or detail change
    StatusChanged {
        api: VrApi,
        status: ConnectionStatus,
        sub_status: SubStatus,
        message: String,
    },
    /// Entered `AllOk` from any other status
    StatusChangedToAllOk { api: VrApi },
    /// Left `AllOk` for any other status
    StatusChangedToNotOk {
        api: VrApi,
        status: ConnectionStatus,
        sub_status: SubStatus,
    },
    HmdUserInteractionStarted { api: VrApi },
    HmdUserInteractionStopped { api: VrApi },
}

impl ConnectionEvent {
    pub fn api(&self) -> VrApi {
        match self {
            ConnectionEvent::StatusChanged { api, .. }
            | ConnectionEvent::StatusChangedToAllOk { api }
            | ConnectionEvent::StatusChangedToNotOk { api, .. }
            | ConnectionEvent::HmdUserInteractionStarted { api }
            | ConnectionEvent::HmdUserInteractionStopped { api } => *api,
        }
    }
}

/// Point-in-time copy of a connection's status fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSnapshot {
    pub api: VrApi,
    pub status: ConnectionStatus,
    pub sub_status: SubStatus,
    pub message: String,
    pub init_attempts: u32,
}

/// Headset reading taken from an `AllOk` connection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmdSample {
    pub yaw: Radians,
    pub user_present: bool,
}

/// A VR runtime connection
///
/// None of these operations fail: every failure is reflected in
/// [`status`](VrConnection::status), the sub-status and the message.
pub trait VrConnection: Send {
    fn api(&self) -> VrApi;

    /// Acquire the runtime handle.
    ///
    /// Acts from `Closed` or `NotOk`; a no-op while `Initializing`, `AllOk`
    /// or after `InitLimitReached`.
    fn open(&mut self);

    /// Release the runtime handle and move to `Closed`. Idempotent.
    ///
    /// After `InitLimitReached` the handle is still released but the status
    /// stays `InitLimitReached`; a fresh process is the only way out.
    fn close(&mut self);

    /// One bounded status + pose query, `None` unless the connection is `AllOk`
    fn sample(&mut self) -> Option<HmdSample>;

    /// Slow-path upkeep: re-open a `NotOk` connection and re-check companion
    /// processes
    fn maintain(&mut self);

    fn core(&self) -> &ConnectionCore;

    fn status(&self) -> ConnectionStatus {
        self.core().status()
    }

    fn sub_status(&self) -> SubStatus {
        self.core().sub_status()
    }

    fn status_message(&self) -> String {
        self.core().message().to_string()
    }

    fn snapshot(&self) -> ConnectionSnapshot {
        self.core().snapshot()
    }

    fn subscribe(&self) -> EventReceiver<ConnectionEvent> {
        EventReceiver::new(self.core().sender().subscribe())
    }
}

/// Connection shared between the observer and its owner
pub type SharedConnection = Arc<Mutex<dyn VrConnection>>;

/// Status bookkeeping common to both runtimes
pub struct ConnectionCore {
    api: VrApi,
    status: ConnectionStatus,
    sub_status: SubStatus,
    message: String,
    init_attempts: u32,
    init_attempt_limit: u32,
    user_present: bool,
    events: broadcast::Sender<ConnectionEvent>,
}

impl ConnectionCore {
    pub(crate) fn new(api: VrApi, closed: SubStatus, init_attempt_limit: u32) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            api,
            status: ConnectionStatus::Closed,
            sub_status: closed,
            message: format!("{} connection closed.", api),
            init_attempts: 0,
            init_attempt_limit: init_attempt_limit.max(1),
            user_present: false,
            events,
        }
    }

    /// Runtime this core belongs to
    pub fn api(&self) -> VrApi {
        self.api
    }

    /// Coarse status
    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    /// Runtime-specific detail behind the status
    pub fn sub_status(&self) -> SubStatus {
        self.sub_status
    }

    /// Human-readable status line
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Consecutive failed initializations since the last success
    pub fn init_attempts(&self) -> u32 {
        self.init_attempts
    }

    /// Failed initializations allowed before giving up
    pub fn init_attempt_limit(&self) -> u32 {
        self.init_attempt_limit
    }

    /// Last presence reported by the runtime
    pub fn user_present(&self) -> bool {
        self.user_present
    }

    /// `true` once `InitLimitReached` has been entered
    pub fn is_terminal(&self) -> bool {
        self.status == ConnectionStatus::InitLimitReached
    }

    /// Owned copy of the current status
    pub fn snapshot(&self) -> ConnectionSnapshot {
        ConnectionSnapshot {
            api: self.api,
            status: self.status,
            sub_status: self.sub_status,
            message: self.message.clone(),
            init_attempts: self.init_attempts,
        }
    }

    pub(crate) fn sender(&self) -> &broadcast::Sender<ConnectionEvent> {
        &self.events
    }

    /// Move to a new status, raising the change and edge events.
    ///
    /// Ignored once `InitLimitReached` has been entered.
    pub(crate) fn transition(
        &mut self,
        status: ConnectionStatus,
        sub_status: SubStatus,
        message: impl Into<String>,
    ) {
        if self.is_terminal() {
            return;
        }

        let message = message.into();
        if self.status == status && self.sub_status == sub_status && self.message == message {
            return;
        }

        let previous = self.status;
        self.status = status;
        self.sub_status = sub_status;
        self.message = message;

        tracing::info!(
            api = %self.api,
            from = %previous,
            to = %status,
            detail = ?sub_status,
            "{}",
            self.message
        );

        self.emit(ConnectionEvent::StatusChanged {
            api: self.api,
            status,
            sub_status,
            message: self.message.clone(),
        });

        if status == ConnectionStatus::AllOk && previous != ConnectionStatus::AllOk {
            self.emit(ConnectionEvent::StatusChangedToAllOk { api: self.api });
        } else if previous == ConnectionStatus::AllOk && status != ConnectionStatus::AllOk {
            self.emit(ConnectionEvent::StatusChangedToNotOk {
                api: self.api,
                status,
                sub_status,
            });
        }
    }

    pub(crate) fn record_init_success(&mut self) {
        self.init_attempts = 0;
    }

    /// Count a failed initialization; reaching the limit is terminal
    pub(crate) fn record_init_failure(&mut self, sub_status: SubStatus, message: impl Into<String>) {
        if self.is_terminal() {
            return;
        }

        let message = message.into();
        self.init_attempts += 1;
        tracing::warn!(
            api = %self.api,
            attempt = self.init_attempts,
            limit = self.init_attempt_limit,
            "Runtime initialization failed: {}",
            message
        );

        if self.init_attempts >= self.init_attempt_limit {
            self.transition(
                ConnectionStatus::InitLimitReached,
                sub_status,
                format!(
                    "{} initialization failed {} times in a row. Restart required. ({})",
                    self.api, self.init_attempts, message
                ),
            );
        } else {
            self.transition(ConnectionStatus::NotOk, sub_status, message);
        }
    }

    /// Track the runtime's user-presence signal, raising interaction edges
    pub(crate) fn set_user_present(&mut self, present: bool) {
        if self.user_present == present {
            return;
        }
        self.user_present = present;
        tracing::debug!(api = %self.api, present, "HMD user presence changed");
        if present {
            self.emit(ConnectionEvent::HmdUserInteractionStarted { api: self.api });
        } else {
            self.emit(ConnectionEvent::HmdUserInteractionStopped { api: self.api });
        }
    }

    /// Forget presence without raising an event (handle released)
    pub(crate) fn clear_user_present(&mut self) {
        self.user_present = false;
    }

    fn emit(&self, event: ConnectionEvent) {
        // No receivers is fine
        let _ = self.events.send(event);
    }
}
