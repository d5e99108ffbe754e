use super::{ConnectionCore, ConnectionStatus, HmdSample, SubStatus, VrConnection};
use crate::error::{GuardianError, Result};
use crate::math::yaw_from_pose_matrix;
use crate::runtime::{OpenVrEvent, OpenVrRuntime, ProcessProbe};
use crate::types::VrApi;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Upper bound on events drained per sample so a flooding queue cannot stall a tick
const MAX_EVENTS_PER_SAMPLE: usize = 64;

/// API-B status detail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpenVrStatus {
    Closed,
    Connecting,
    AllOk,
    /// The runtime is not installed
    RuntimeUnavailable,
    /// The server process is not running; init is not attempted
    SteamVrNotRunning,
    InitFailed,
    HmdNotFound,
    /// The server asked applications to quit
    SteamVrQuit,
}

impl OpenVrStatus {
    fn sub(self) -> SubStatus {
        SubStatus::OpenVr(self)
    }
}

/// Application manifest used for runtime-managed autostart
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoStartManifest {
    pub app_key: String,
    pub manifest_path: PathBuf,
}

impl Default for AutoStartManifest {
    fn default() -> Self {
        Self {
            app_key: "cableguardian.app".to_string(),
            manifest_path: PathBuf::from("manifest.vrmanifest"),
        }
    }
}

/// Connection to the OpenVR runtime
pub struct OpenVrConnection {
    core: ConnectionCore,
    runtime: Box<dyn OpenVrRuntime>,
    processes: Arc<dyn ProcessProbe>,
    server_process: String,
    manifest: AutoStartManifest,
    handle_open: bool,
}

impl OpenVrConnection {
    pub fn new(
        runtime: Box<dyn OpenVrRuntime>,
        processes: Arc<dyn ProcessProbe>,
        server_process: impl Into<String>,
        manifest: AutoStartManifest,
        init_attempt_limit: u32,
    ) -> Self {
        Self {
            core: ConnectionCore::new(VrApi::OpenVr, OpenVrStatus::Closed.sub(), init_attempt_limit),
            runtime,
            processes,
            server_process: server_process.into(),
            manifest,
            handle_open: false,
        }
    }

    /// Register or unregister the application for launch with the runtime
    pub fn set_auto_start(&mut self, enabled: bool) -> Result<()> {
        if !self.handle_open {
            return Err(GuardianError::NotConnected(VrApi::OpenVr));
        }
        self.runtime.add_manifest(&self.manifest.manifest_path)?;
        self.runtime.set_auto_launch(&self.manifest.app_key, enabled)?;
        tracing::info!(enabled, app_key = %self.manifest.app_key, "OpenVR autostart updated");
        Ok(())
    }

    /// Whether the runtime launches the application on startup
    pub fn is_auto_start_enabled(&mut self) -> Result<bool> {
        if !self.handle_open {
            return Err(GuardianError::NotConnected(VrApi::OpenVr));
        }
        Ok(self.runtime.auto_launch(&self.manifest.app_key)?)
    }

    fn release(&mut self) {
        if self.handle_open {
            self.runtime.shutdown();
            self.handle_open = false;
        }
        self.core.clear_user_present();
    }

    /// Drain pending runtime events; `false` if the server asked us to quit
    fn pump_events(&mut self) -> bool {
        for _ in 0..MAX_EVENTS_PER_SAMPLE {
            match self.runtime.poll_event() {
                Some(OpenVrEvent::Quit) => {
                    self.runtime.acknowledge_quit();
                    self.release();
                    self.core.transition(
                        ConnectionStatus::NotOk,
                        OpenVrStatus::SteamVrQuit.sub(),
                        "SteamVR requested shutdown.",
                    );
                    return false;
                }
                Some(OpenVrEvent::UserInteractionStarted) => self.core.set_user_present(true),
                Some(OpenVrEvent::UserInteractionEnded) => self.core.set_user_present(false),
                None => break,
            }
        }
        true
    }

    fn refresh(&mut self) -> bool {
        if !self.pump_events() {
            return false;
        }
        if !self.runtime.is_hmd_connected() {
            self.core.set_user_present(false);
            self.core.transition(
                ConnectionStatus::NotOk,
                OpenVrStatus::HmdNotFound.sub(),
                "SteamVR running. Headset not detected.",
            );
            return false;
        }
        self.core
            .transition(ConnectionStatus::AllOk, OpenVrStatus::AllOk.sub(), "OpenVR connection OK.");
        true
    }
}

impl VrConnection for OpenVrConnection {
    fn api(&self) -> VrApi {
        VrApi::OpenVr
    }

    fn open(&mut self) {
        match self.core.status() {
            ConnectionStatus::AllOk | ConnectionStatus::Initializing => return,
            ConnectionStatus::InitLimitReached => {
                tracing::debug!("OpenVR open ignored, init limit reached");
                return;
            }
            ConnectionStatus::Closed | ConnectionStatus::NotOk => {}
        }

        if self.handle_open {
            self.refresh();
            return;
        }

        if !self.runtime.is_installed() {
            self.core.transition(
                ConnectionStatus::NotOk,
                OpenVrStatus::RuntimeUnavailable.sub(),
                "OpenVR runtime is not installed.",
            );
            return;
        }

        // Initializing would launch the server, so wait for it instead
        if !self.processes.is_running(&self.server_process) {
            self.core.transition(
                ConnectionStatus::NotOk,
                OpenVrStatus::SteamVrNotRunning.sub(),
                format!("Waiting for SteamVR ({}) to start.", self.server_process),
            );
            return;
        }

        self.core.transition(
            ConnectionStatus::Initializing,
            OpenVrStatus::Connecting.sub(),
            "Connecting to SteamVR...",
        );

        match self.runtime.initialize() {
            Ok(()) => {
                self.handle_open = true;
                self.core.record_init_success();
                self.refresh();
            }
            Err(e) => {
                self.runtime.shutdown();
                self.core.record_init_failure(
                    OpenVrStatus::InitFailed.sub(),
                    format!("Failed to initialize OpenVR: {}", e),
                );
            }
        }
    }

    fn close(&mut self) {
        self.release();
        self.core
            .transition(ConnectionStatus::Closed, OpenVrStatus::Closed.sub(), "OpenVR connection closed.");
    }

    fn sample(&mut self) -> Option<HmdSample> {
        if !self.handle_open || self.core.status() != ConnectionStatus::AllOk {
            return None;
        }
        if !self.refresh() {
            return None;
        }

        let pose = self.runtime.hmd_pose()?;
        Some(HmdSample {
            yaw: yaw_from_pose_matrix(&pose),
            user_present: self.core.user_present(),
        })
    }

    fn maintain(&mut self) {
        if self.core.status() == ConnectionStatus::NotOk {
            self.open();
        }
    }

    fn core(&self) -> &ConnectionCore {
        &self.core
    }
}

impl Drop for OpenVrConnection {
    fn drop(&mut self) {
        self.release();
    }
}
