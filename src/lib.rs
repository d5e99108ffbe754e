//! Headset cable-twist monitoring core
//!
//! This library watches a VR headset's heading and counts how many half-turns
//! the user has made since the cable was last untangled. It provides:
//!
//! - Connection state machines for the Oculus and OpenVR runtimes
//! - A fixed-interval observer that samples the active runtime
//! - Yaw unwrapping and signed half-turn counting, with resume across runs
//! - Audio output device selection for alerts
//! - Connection-lost, interaction and alarm alerts
//!
//! The native runtimes, the OS process list and the audio endpoint list are
//! reached through the traits in [`runtime`]; the host supplies the bindings.
//!
//! # Quick Start
//!
//! ```no_run
//! # use cable_guardian::NativeBackends;
//! # fn backends() -> NativeBackends { unimplemented!() }
//! use cable_guardian::{Monitor, MonitorConfig, Profile, VrApi};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MonitorConfig::load("guardian.toml")?;
//!     let mut monitor = Monitor::new(config, backends(), None)?;
//!
//!     let mut profile = Profile::new("Rift", VrApi::OculusVr);
//!     profile.require_home = true;
//!     monitor.apply_profile(&profile);
//!     monitor.start().await;
//!
//!     // Watch the count change
//!     let mut states = monitor.subscribe_state();
//!     while let Ok(state) = states.recv().await {
//!         println!("tick {} yaw {:.2}: {}", state.tick, state.yaw, monitor.turns());
//!     }
//!
//!     monitor.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! # Tracking Without the Monitor
//!
//! The tracker can be fed directly with yaw samples in (−π, π]:
//!
//! ```
//! use cable_guardian::{RotationSide, YawTracker};
//!
//! let mut tracker = YawTracker::new();
//! for yaw in [1.0, 2.0, 3.0, -3.0] {
//!     tracker.on_sample(yaw);
//! }
//! assert_eq!(tracker.completed_half_turns(), 1);
//! assert_eq!(tracker.rotation_side(), Some(RotationSide::Left));
//! ```
//!
//! # Architecture
//!
//! - **Monitor**: Owns everything below and publishes alerts
//! - **Observer**: Polls the active connection every 150 ms
//! - **Tracker**: Unwraps yaw and counts half-turns
//! - **Connection**: Per-runtime status state machines
//! - **Audio**: Output device pool for alerts
//! - **Runtime**: Native provider contracts

pub mod alerts;
pub mod audio;
pub mod config;
pub mod connection;
mod error;
pub mod math;
mod monitor;
pub mod observer;
pub mod runtime;
mod subscription;
pub mod tracker;
mod types;

// Public exports
pub use alerts::{Alert, AlertPolicy};
pub use audio::{AudioDevicePool, HomeAudioSource};
pub use config::MonitorConfig;
pub use connection::{
    AutoStartManifest, ConnectionEvent, ConnectionSnapshot, ConnectionStatus, OculusConnection, OculusStatus,
    OpenVrConnection, OpenVrStatus, SharedConnection, SubStatus, VrConnection,
};
pub use error::{GuardianError, Result, RuntimeError};
pub use monitor::{Monitor, MonitorEvent, NativeBackends};
pub use observer::{Observer, SampleSink, DEFAULT_POLL_INTERVAL};
pub use subscription::EventReceiver;
pub use tracker::{SharedTracker, TurnSummary, YawTracker};
pub use types::{
    AlertAction, AudioDevice, DecayWindow, DeviceSource, HalfTurnIndex, HmdState, Profile, Radians, ResumeOrigin,
    ResumeState, RotationSide, SelectedDevice, VrApi,
};
