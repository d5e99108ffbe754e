use super::{ConnectionCore, ConnectionStatus, HmdSample, SubStatus, VrConnection};
use crate::math::yaw_from_quaternion;
use crate::runtime::{OculusRuntime, OculusSessionStatus, ProcessProbe};
use crate::types::VrApi;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// API-A status detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OculusStatus {
    Closed,
    Connecting,
    AllOk,
    InitFailed,
    HmdNotPresent,
    /// `require_home` is set and the home application is not running
    HomeNotRunning,
    /// The runtime requested a shutdown
    OculusVrQuit,
    DisplayLost,
    RuntimeError,
}

impl OculusStatus {
    fn sub(self) -> SubStatus {
        SubStatus::Oculus(self)
    }
}

/// Connection to the Oculus runtime
pub struct OculusConnection {
    core: ConnectionCore,
    runtime: Box<dyn OculusRuntime>,
    processes: Arc<dyn ProcessProbe>,
    home_process: String,
    require_home: bool,
    home_running: bool,
    session_open: bool,
}

impl OculusConnection {
    pub fn new(
        runtime: Box<dyn OculusRuntime>,
        processes: Arc<dyn ProcessProbe>,
        home_process: impl Into<String>,
        init_attempt_limit: u32,
    ) -> Self {
        Self {
            core: ConnectionCore::new(VrApi::OculusVr, OculusStatus::Closed.sub(), init_attempt_limit),
            runtime,
            processes,
            home_process: home_process.into(),
            require_home: false,
            home_running: false,
            session_open: false,
        }
    }

    /// Whether the home app must be running for `AllOk`
    pub fn require_home(&self) -> bool {
        self.require_home
    }

    /// Gate `AllOk` on the home application running
    pub fn set_require_home(&mut self, require: bool) {
        if self.require_home == require {
            return;
        }
        self.require_home = require;
        tracing::debug!(require, "Oculus home requirement changed");
        if self.session_open {
            self.refresh(true);
        }
    }

    /// Output device of the home application, if a session is live
    pub fn home_audio_device_id(&mut self) -> Option<String> {
        if !self.session_open {
            return None;
        }
        self.runtime.audio_output_device_id()
    }

    fn release(&mut self) {
        if self.session_open {
            self.runtime.shutdown();
            self.session_open = false;
        }
        self.core.clear_user_present();
    }

    fn lose_session(&mut self, detail: OculusStatus, message: impl Into<String>) {
        self.release();
        self.core.transition(ConnectionStatus::NotOk, detail.sub(), message);
    }

    /// Re-derive the status from the runtime session flags.
    ///
    /// The home process is only probed when `check_home` is set; sampling
    /// reuses the last answer.
    fn refresh(&mut self, check_home: bool) -> Option<OculusSessionStatus> {
        let session = match self.runtime.session_status() {
            Ok(session) => session,
            Err(e) => {
                self.lose_session(OculusStatus::RuntimeError, format!("Oculus runtime error: {}", e));
                return None;
            }
        };

        if session.should_quit {
            self.lose_session(OculusStatus::OculusVrQuit, "Oculus runtime requested shutdown.");
            return None;
        }
        if session.display_lost {
            self.lose_session(OculusStatus::DisplayLost, "Oculus display lost.");
            return None;
        }
        if !session.hmd_present {
            self.core.set_user_present(false);
            self.core.transition(
                ConnectionStatus::NotOk,
                OculusStatus::HmdNotPresent.sub(),
                "Oculus runtime running. Headset not detected.",
            );
            return None;
        }

        if check_home {
            self.home_running = self.processes.is_running(&self.home_process);
        }
        if self.require_home && !self.home_running {
            self.core.transition(
                ConnectionStatus::NotOk,
                OculusStatus::HomeNotRunning.sub(),
                format!("Headset detected. Oculus home ({}) is not running.", self.home_process),
            );
            return None;
        }

        self.core
            .transition(ConnectionStatus::AllOk, OculusStatus::AllOk.sub(), "Oculus connection OK.");
        self.core.set_user_present(session.hmd_mounted);
        Some(session)
    }
}

impl VrConnection for OculusConnection {
    fn api(&self) -> VrApi {
        VrApi::OculusVr
    }

    fn open(&mut self) {
        match self.core.status() {
            ConnectionStatus::AllOk | ConnectionStatus::Initializing => return,
            ConnectionStatus::InitLimitReached => {
                tracing::debug!("Oculus open ignored, init limit reached");
                return;
            }
            ConnectionStatus::Closed | ConnectionStatus::NotOk => {}
        }

        if self.session_open {
            self.refresh(true);
            return;
        }

        self.core.transition(
            ConnectionStatus::Initializing,
            OculusStatus::Connecting.sub(),
            "Connecting to the Oculus runtime...",
        );

        match self.runtime.initialize() {
            Ok(()) => {
                self.session_open = true;
                self.core.record_init_success();
                self.refresh(true);
            }
            Err(e) => {
                self.runtime.shutdown();
                self.core.record_init_failure(
                    OculusStatus::InitFailed.sub(),
                    format!("Failed to initialize the Oculus runtime: {}", e),
                );
            }
        }
    }

    fn close(&mut self) {
        self.release();
        self.home_running = false;
        self.core
            .transition(ConnectionStatus::Closed, OculusStatus::Closed.sub(), "Oculus connection closed.");
    }

    fn sample(&mut self) -> Option<HmdSample> {
        if !self.session_open || self.core.status() != ConnectionStatus::AllOk {
            return None;
        }

        self.refresh(false)?;
        match self.runtime.head_orientation() {
            Ok(q) => Some(HmdSample {
                yaw: yaw_from_quaternion(&q),
                user_present: self.core.user_present(),
            }),
            Err(e) => {
                tracing::debug!("Oculus head pose unavailable: {}", e);
                None
            }
        }
    }

    fn maintain(&mut self) {
        match self.core.status() {
            ConnectionStatus::NotOk => self.open(),
            ConnectionStatus::AllOk => {
                self.refresh(true);
            }
            _ => {}
        }
    }

    fn core(&self) -> &ConnectionCore {
        &self.core
    }
}

impl Drop for OculusConnection {
    fn drop(&mut self) {
        self.release();
    }
}
