use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, SystemTime};

/// Yaw angle in radians
pub type Radians = f64;

/// Signed half-turn index relative to the baseline heading
pub type HalfTurnIndex = i64;

/// The two mutually exclusive VR runtime APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VrApi {
    /// API-A: the Oculus runtime (home application, no manifest autostart)
    OculusVr,
    /// API-B: the OpenVR runtime (SteamVR server, manifest autostart)
    OpenVr,
}

impl fmt::Display for VrApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VrApi::OculusVr => f.write_str("OculusVR"),
            VrApi::OpenVr => f.write_str("OpenVR"),
        }
    }
}

/// Headset snapshot published by the observer on every sampled tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HmdState {
    /// Runtime the sample was taken from
    pub api: VrApi,
    /// Observer tick sequence number (starts at 1, counts skipped ticks too)
    pub tick: u64,
    /// Raw yaw in (−π, π]
    pub yaw: Radians,
    /// Whether the runtime reports a user wearing the headset
    pub user_present: bool,
}

/// Direction of a half-turn boundary crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RotationSide {
    /// Counter-clockwise seen from above (yaw increasing)
    Left,
    /// Clockwise seen from above (yaw decreasing)
    Right,
}

impl fmt::Display for RotationSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RotationSide::Left => f.write_str("Left"),
            RotationSide::Right => f.write_str("Right"),
        }
    }
}

/// OS audio output device
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Stable OS identifier (endpoint id / GUID string)
    pub id: String,
    /// Friendly name shown to the user
    pub name: String,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// How the alert output device is chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeviceSource {
    /// Follow the output device of the Oculus home application
    Auto,
    /// Use the device bound to the active profile
    #[default]
    Manual,
}

/// Sound-producing actions the alert layer can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AlertAction {
    Alarm,
    Jingle,
    ConnectionLost,
}

/// Device an alert should be played on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectedDevice {
    /// Let the audio layer use the system default output
    SystemDefault,
    /// A specific enumerated device
    Device(AudioDevice),
}

/// Profile settings the core reads (the profile store itself lives outside)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub name: String,
    pub api: VrApi,
    /// Only meaningful for [`VrApi::OculusVr`]
    #[serde(default)]
    pub require_home: bool,
    #[serde(default)]
    pub device_source: DeviceSource,
    /// Device used in [`DeviceSource::Manual`] mode, `None` for system default
    #[serde(default)]
    pub device: Option<AudioDevice>,
}

impl Profile {
    pub fn new(name: impl Into<String>, api: VrApi) -> Self {
        Self {
            name: name.into(),
            api,
            require_home: false,
            device_source: DeviceSource::Manual,
            device: None,
        }
    }
}

/// Where a [`ResumeState`] came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResumeOrigin {
    /// Remembered across sessions by the config layer; subject to the decay window
    SavedConfig,
    /// Carried over by a restart request; always applied
    Restart,
}

/// Half-turn state carried across process runs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResumeState {
    pub half_turn: HalfTurnIndex,
    /// Last raw yaw seen before the state was saved
    pub last_yaw: Radians,
    pub saved_at: SystemTime,
    pub origin: ResumeOrigin,
}

impl ResumeState {
    /// Time since the state was saved; zero if the clock went backwards
    pub fn elapsed(&self, now: SystemTime) -> Duration {
        now.duration_since(self.saved_at).unwrap_or(Duration::ZERO)
    }
}

/// How long a remembered half-turn count stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecayWindow {
    /// Never expires
    Unbounded,
    /// Remembered counts are never used
    Disabled,
    /// Expires after the given number of minutes
    Minutes(u32),
}

impl DecayWindow {
    /// Map the configuration encoding (0 = unbounded, −1 = disabled)
    pub fn from_minutes(minutes: i32) -> Option<Self> {
        match minutes {
            0 => Some(DecayWindow::Unbounded),
            -1 => Some(DecayWindow::Disabled),
            m if m > 0 => Some(DecayWindow::Minutes(m as u32)),
            _ => None,
        }
    }

    /// Whether a state saved `elapsed` ago is still valid
    pub fn allows(&self, elapsed: Duration) -> bool {
        match self {
            DecayWindow::Unbounded => true,
            DecayWindow::Disabled => false,
            DecayWindow::Minutes(m) => elapsed <= Duration::from_secs(u64::from(*m) * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decay_window_encoding() {
        assert_eq!(DecayWindow::from_minutes(0), Some(DecayWindow::Unbounded));
        assert_eq!(DecayWindow::from_minutes(-1), Some(DecayWindow::Disabled));
        assert_eq!(DecayWindow::from_minutes(10), Some(DecayWindow::Minutes(10)));
        assert_eq!(DecayWindow::from_minutes(-5), None);
    }

    #[test]
    fn decay_window_limits() {
        let window = DecayWindow::Minutes(10);
        assert!(window.allows(Duration::from_secs(5 * 60)));
        assert!(window.allows(Duration::from_secs(10 * 60)));
        assert!(!window.allows(Duration::from_secs(15 * 60)));
        assert!(!DecayWindow::Disabled.allows(Duration::ZERO));
        assert!(DecayWindow::Unbounded.allows(Duration::from_secs(u32::MAX as u64)));
    }

    #[test]
    fn elapsed_saturates_when_clock_goes_back() {
        let now = SystemTime::now();
        let state = ResumeState {
            half_turn: 1,
            last_yaw: 0.0,
            saved_at: now + Duration::from_secs(60),
            origin: ResumeOrigin::SavedConfig,
        };
        assert_eq!(state.elapsed(now), Duration::ZERO);
    }
}
