//! Contracts for the native capability providers the core calls into.
//!
//! The crate ships no bindings to the VR SDKs, the OS process list or the
//! audio endpoint API. Hosts implement these traits over whatever bindings
//! they use; every call is expected to be a cheap, bounded, synchronous query.

use crate::error::RuntimeError;
use crate::math::{PoseMatrix, Quaternion};
use crate::types::AudioDevice;
use std::path::Path;

/// Session flags reported by the Oculus runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OculusSessionStatus {
    /// A headset is connected
    pub hmd_present: bool,
    /// The proximity sensor reports the headset on a head
    pub hmd_mounted: bool,
    /// The runtime asks the application to shut down
    pub should_quit: bool,
    /// The display was lost and the session must be recreated
    pub display_lost: bool,
}

/// API-A native runtime
pub trait OculusRuntime: Send {
    /// Create the runtime session
    fn initialize(&mut self) -> Result<(), RuntimeError>;

    /// Destroy the session; must tolerate being called without a session
    fn shutdown(&mut self);

    fn session_status(&mut self) -> Result<OculusSessionStatus, RuntimeError>;

    /// Current head orientation
    fn head_orientation(&mut self) -> Result<Quaternion, RuntimeError>;

    /// Endpoint id of the output device the home application plays on
    fn audio_output_device_id(&mut self) -> Option<String>;
}

/// Events drained from the OpenVR event queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenVrEvent {
    /// The server is shutting down and asks applications to exit
    Quit,
    /// Proximity sensor went active (headset put on)
    UserInteractionStarted,
    /// Proximity sensor went idle (headset taken off)
    UserInteractionEnded,
}

/// API-B native runtime
pub trait OpenVrRuntime: Send {
    /// Whether the runtime is installed at all
    fn is_installed(&self) -> bool;

    /// Initialize as a background application
    fn initialize(&mut self) -> Result<(), RuntimeError>;

    /// Must tolerate being called without a live handle
    fn shutdown(&mut self);

    /// Pop the next pending event, `None` when the queue is empty
    fn poll_event(&mut self) -> Option<OpenVrEvent>;

    /// Tell the server the quit request was seen
    fn acknowledge_quit(&mut self);

    fn is_hmd_connected(&mut self) -> bool;

    /// Headset pose, `None` while tracking is invalid
    fn hmd_pose(&mut self) -> Option<PoseMatrix>;

    /// Register the application manifest with the runtime
    fn add_manifest(&mut self, path: &Path) -> Result<(), RuntimeError>;

    fn set_auto_launch(&mut self, app_key: &str, enabled: bool) -> Result<(), RuntimeError>;

    fn auto_launch(&mut self, app_key: &str) -> Result<bool, RuntimeError>;
}

/// OS process list
pub trait ProcessProbe: Send + Sync {
    /// Whether a process with the given executable name (no extension,
    /// case-insensitive) is running
    fn is_running(&self, name: &str) -> bool;
}

/// OS audio output endpoints
pub trait DeviceEnumerator: Send {
    /// Active output devices
    fn output_devices(&mut self) -> Result<Vec<AudioDevice>, RuntimeError>;
}
