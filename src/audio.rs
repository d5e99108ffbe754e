use crate::connection::OculusConnection;
use crate::runtime::DeviceEnumerator;
use crate::types::{AlertAction, AudioDevice, DeviceSource, SelectedDevice};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Something that knows which device the Oculus home application plays on
pub trait HomeAudioSource: Send {
    fn home_audio_device_id(&mut self) -> Option<String>;
}

impl HomeAudioSource for OculusConnection {
    fn home_audio_device_id(&mut self) -> Option<String> {
        OculusConnection::home_audio_device_id(self)
    }
}

/// Chooses the output device for each alert action
///
/// The OS device list is only re-enumerated after [`request_refresh`]
/// (devices can appear late after boot, so the owner refreshes whenever a
/// connection reaches `AllOk`). Resolution never fails: a missing device
/// falls back to the system default and raises [`device_not_found`].
///
/// [`request_refresh`]: AudioDevicePool::request_refresh
/// [`device_not_found`]: AudioDevicePool::device_not_found
pub struct AudioDevicePool {
    enumerator: Box<dyn DeviceEnumerator>,
    home: Option<Arc<Mutex<dyn HomeAudioSource>>>,
    devices: Vec<AudioDevice>,
    stale: bool,
    source: DeviceSource,
    manual_device: Option<AudioDevice>,
    action_devices: HashMap<AlertAction, AudioDevice>,
    device_not_found: bool,
}

impl AudioDevicePool {
    /// Empty pool in manual mode; devices are enumerated on first use
    pub fn new(
        enumerator: Box<dyn DeviceEnumerator>,
        home: Option<Arc<Mutex<dyn HomeAudioSource>>>,
    ) -> Self {
        Self {
            enumerator,
            home,
            devices: Vec::new(),
            stale: true,
            source: DeviceSource::Manual,
            manual_device: None,
            action_devices: HashMap::new(),
            device_not_found: false,
        }
    }

    /// Whether alerts follow the home app or the profile device
    pub fn device_source(&self) -> DeviceSource {
        self.source
    }

    /// Switch between `Auto` and `Manual`
    pub fn set_device_source(&mut self, source: DeviceSource) {
        if self.source != source {
            tracing::debug!(?source, "Audio device source changed");
        }
        self.source = source;
        if source == DeviceSource::Auto {
            self.device_not_found = false;
        }
    }

    /// Bind the profile device used in manual mode (`None` = system default)
    pub fn set_manual_device(&mut self, device: Option<AudioDevice>) {
        self.manual_device = device;
        self.device_not_found = false;
        if self.source == DeviceSource::Manual {
            self.resolve_profile_device();
        }
    }

    /// Pin one action to its own device, or clear the pin with `None`
    pub fn set_action_device(&mut self, action: AlertAction, device: Option<AudioDevice>) {
        match device {
            Some(device) => {
                self.action_devices.insert(action, device);
            }
            None => {
                self.action_devices.remove(&action);
            }
        }
    }

    /// Mark the device list stale; it is re-enumerated on next use
    pub fn request_refresh(&mut self) {
        tracing::debug!("Audio device refresh requested");
        self.stale = true;
    }

    /// Re-enumerate right away
    pub fn refresh_now(&mut self) {
        self.stale = true;
        self.ensure_fresh();
    }

    /// Devices from the last enumeration
    pub fn devices(&mut self) -> &[AudioDevice] {
        self.ensure_fresh();
        &self.devices
    }

    /// The manual profile device was missing at the last resolution
    pub fn device_not_found(&self) -> bool {
        self.device_not_found
    }

    /// Device the given action should play on
    pub fn selected_device(&mut self, action: AlertAction) -> SelectedDevice {
        self.ensure_fresh();

        if let Some(pinned) = self.action_devices.get(&action) {
            if let Some(found) = self.find(pinned) {
                return SelectedDevice::Device(found);
            }
            tracing::warn!(?action, device = %pinned.name, "Pinned audio device not found, using profile device");
        }

        match self.source {
            DeviceSource::Auto => self.resolve_home_device(),
            DeviceSource::Manual => self.resolve_profile_device(),
        }
    }

    fn resolve_home_device(&mut self) -> SelectedDevice {
        let home_id = self.home.as_ref().and_then(|home| home.lock().home_audio_device_id());
        match home_id {
            Some(id) => match self.devices.iter().find(|d| d.id.eq_ignore_ascii_case(&id)) {
                Some(device) => SelectedDevice::Device(device.clone()),
                None => {
                    tracing::debug!(device_id = %id, "Home audio device not enumerated, using system default");
                    SelectedDevice::SystemDefault
                }
            },
            None => SelectedDevice::SystemDefault,
        }
    }

    fn resolve_profile_device(&mut self) -> SelectedDevice {
        self.ensure_fresh();
        let Some(wanted) = self.manual_device.clone() else {
            self.device_not_found = false;
            return SelectedDevice::SystemDefault;
        };

        match self.find(&wanted) {
            Some(device) => {
                self.device_not_found = false;
                SelectedDevice::Device(device)
            }
            None => {
                if !self.device_not_found {
                    tracing::warn!(device = %wanted.name, "Profile audio device not found, using system default");
                }
                self.device_not_found = true;
                SelectedDevice::SystemDefault
            }
        }
    }

    /// Match by id first, then by friendly name (ids change when a device is re-plugged on some systems)
    fn find(&self, wanted: &AudioDevice) -> Option<AudioDevice> {
        self.devices
            .iter()
            .find(|d| d.id == wanted.id)
            .or_else(|| self.devices.iter().find(|d| d.name == wanted.name))
            .cloned()
    }

    fn ensure_fresh(&mut self) {
        if !self.stale {
            return;
        }
        self.stale = false;
        match self.enumerator.output_devices() {
            Ok(devices) => {
                tracing::debug!(count = devices.len(), "Audio output devices enumerated");
                self.devices = devices;
            }
            Err(e) => {
                tracing::warn!("Audio device enumeration failed, keeping previous list: {}", e);
            }
        }
    }
}
