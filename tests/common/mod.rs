#![allow(dead_code)]
// Scriptable native providers shared by the integration tests.

use cable_guardian::math::{pose_matrix_from_yaw, PoseMatrix, Quaternion};
use cable_guardian::runtime::{
    DeviceEnumerator, OculusRuntime, OculusSessionStatus, OpenVrEvent, OpenVrRuntime, ProcessProbe,
};
use cable_guardian::{AudioDevice, NativeBackends, RuntimeError};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// ── Oculus ──────────────────────────────────────────────────────────

pub struct OculusState {
    pub fail_init: bool,
    pub init_calls: u32,
    pub shutdown_calls: u32,
    pub session_live: bool,
    pub status: OculusSessionStatus,
    pub yaw: f64,
    pub audio_device_id: Option<String>,
}

impl Default for OculusState {
    fn default() -> Self {
        Self {
            fail_init: false,
            init_calls: 0,
            shutdown_calls: 0,
            session_live: false,
            status: OculusSessionStatus {
                hmd_present: true,
                ..Default::default()
            },
            yaw: 0.0,
            audio_device_id: None,
        }
    }
}

pub struct FakeOculus(pub Arc<Mutex<OculusState>>);

pub fn fake_oculus() -> (Box<dyn OculusRuntime>, Arc<Mutex<OculusState>>) {
    let state = Arc::new(Mutex::new(OculusState::default()));
    (Box::new(FakeOculus(state.clone())), state)
}

impl OculusRuntime for FakeOculus {
    fn initialize(&mut self) -> Result<(), RuntimeError> {
        let mut state = self.0.lock();
        state.init_calls += 1;
        if state.fail_init {
            return Err(RuntimeError::new(-3002, "Service unavailable"));
        }
        state.session_live = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        let mut state = self.0.lock();
        state.shutdown_calls += 1;
        state.session_live = false;
    }

    fn session_status(&mut self) -> Result<OculusSessionStatus, RuntimeError> {
        Ok(self.0.lock().status)
    }

    fn head_orientation(&mut self) -> Result<Quaternion, RuntimeError> {
        Ok(Quaternion::from_yaw(self.0.lock().yaw))
    }

    fn audio_output_device_id(&mut self) -> Option<String> {
        self.0.lock().audio_device_id.clone()
    }
}

// ── OpenVR ──────────────────────────────────────────────────────────

pub struct OpenVrState {
    pub installed: bool,
    pub fail_init: bool,
    pub init_calls: u32,
    pub handle_live: bool,
    pub events: VecDeque<OpenVrEvent>,
    pub quit_acknowledged: u32,
    pub hmd_connected: bool,
    pub yaw: Option<f64>,
    pub manifests: Vec<PathBuf>,
    pub auto_launch: HashMap<String, bool>,
}

impl Default for OpenVrState {
    fn default() -> Self {
        Self {
            installed: true,
            fail_init: false,
            init_calls: 0,
            handle_live: false,
            events: VecDeque::new(),
            quit_acknowledged: 0,
            hmd_connected: true,
            yaw: Some(0.0),
            manifests: Vec::new(),
            auto_launch: HashMap::new(),
        }
    }
}

pub struct FakeOpenVr(pub Arc<Mutex<OpenVrState>>);

pub fn fake_openvr() -> (Box<dyn OpenVrRuntime>, Arc<Mutex<OpenVrState>>) {
    let state = Arc::new(Mutex::new(OpenVrState::default()));
    (Box::new(FakeOpenVr(state.clone())), state)
}

impl OpenVrRuntime for FakeOpenVr {
    fn is_installed(&self) -> bool {
        self.0.lock().installed
    }

    fn initialize(&mut self) -> Result<(), RuntimeError> {
        let mut state = self.0.lock();
        state.init_calls += 1;
        if state.fail_init {
            return Err(RuntimeError::new(108, "Hmd not found presence failed"));
        }
        state.handle_live = true;
        Ok(())
    }

    fn shutdown(&mut self) {
        self.0.lock().handle_live = false;
    }

    fn poll_event(&mut self) -> Option<OpenVrEvent> {
        self.0.lock().events.pop_front()
    }

    fn acknowledge_quit(&mut self) {
        self.0.lock().quit_acknowledged += 1;
    }

    fn is_hmd_connected(&mut self) -> bool {
        self.0.lock().hmd_connected
    }

    fn hmd_pose(&mut self) -> Option<PoseMatrix> {
        self.0.lock().yaw.map(|yaw| pose_matrix_from_yaw(yaw, [0.0, 1.7, 0.0]))
    }

    fn add_manifest(&mut self, path: &Path) -> Result<(), RuntimeError> {
        self.0.lock().manifests.push(path.to_path_buf());
        Ok(())
    }

    fn set_auto_launch(&mut self, app_key: &str, enabled: bool) -> Result<(), RuntimeError> {
        self.0.lock().auto_launch.insert(app_key.to_string(), enabled);
        Ok(())
    }

    fn auto_launch(&mut self, app_key: &str) -> Result<bool, RuntimeError> {
        Ok(self.0.lock().auto_launch.get(app_key).copied().unwrap_or(false))
    }
}

// ── Processes and audio ─────────────────────────────────────────────

#[derive(Default)]
pub struct FakeProcesses {
    running: Mutex<HashSet<String>>,
}

impl FakeProcesses {
    pub fn with(names: &[&str]) -> Arc<Self> {
        let processes = Self::default();
        for name in names {
            processes.start(name);
        }
        Arc::new(processes)
    }

    pub fn start(&self, name: &str) {
        self.running.lock().insert(name.to_lowercase());
    }

    pub fn kill(&self, name: &str) {
        self.running.lock().remove(&name.to_lowercase());
    }
}

impl ProcessProbe for FakeProcesses {
    fn is_running(&self, name: &str) -> bool {
        self.running.lock().contains(&name.to_lowercase())
    }
}

pub struct FakeDevices(pub Arc<Mutex<Vec<AudioDevice>>>);

pub fn fake_devices(devices: Vec<AudioDevice>) -> (Box<dyn DeviceEnumerator>, Arc<Mutex<Vec<AudioDevice>>>) {
    let list = Arc::new(Mutex::new(devices));
    (Box::new(FakeDevices(list.clone())), list)
}

impl DeviceEnumerator for FakeDevices {
    fn output_devices(&mut self) -> Result<Vec<AudioDevice>, RuntimeError> {
        Ok(self.0.lock().clone())
    }
}

pub fn speakers() -> AudioDevice {
    AudioDevice::new("{0.0.0.00000000}.{speakers}", "Speakers (Realtek High Definition Audio)")
}

pub fn rift_audio() -> AudioDevice {
    AudioDevice::new("{0.0.0.00000000}.{rift}", "Headphones (Rift Audio)")
}

// ── Monitor wiring ──────────────────────────────────────────────────

pub struct Fakes {
    pub oculus: Arc<Mutex<OculusState>>,
    pub openvr: Arc<Mutex<OpenVrState>>,
    pub processes: Arc<FakeProcesses>,
    pub devices: Arc<Mutex<Vec<AudioDevice>>>,
}

/// Backends with both runtimes healthy, the home app and server running
pub fn backends() -> (NativeBackends, Fakes) {
    let (oculus, oculus_state) = fake_oculus();
    let (openvr, openvr_state) = fake_openvr();
    let processes = FakeProcesses::with(&["oculusclient", "vrserver"]);
    let (audio, devices) = fake_devices(vec![speakers(), rift_audio()]);

    let backends = NativeBackends {
        oculus,
        openvr,
        processes: processes.clone(),
        audio,
    };
    let fakes = Fakes {
        oculus: oculus_state,
        openvr: openvr_state,
        processes,
        devices,
    };
    (backends, fakes)
}
