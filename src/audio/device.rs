use std::collections::BTreeMap;

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, SupportedStreamConfig};

use crate::error::PlaybackError;

/// Output devices of the default host, looked up by name
pub struct OutputDevices {
    host: Host,
    devices: BTreeMap<String, Device>,
}

impl OutputDevices {
    pub fn new() -> Result<Self, PlaybackError> {
        let mut manager = Self {
            host: cpal::default_host(),
            devices: BTreeMap::new(),
        };
        manager.refresh()?;
        Ok(manager)
    }

    pub fn refresh(&mut self) -> Result<(), PlaybackError> {
        self.devices.clear();
        let devices = self.host.output_devices().map_err(|e| {
            PlaybackError::InitializationFailed(format!("Failed to enumerate devices: {}", e))
        })?;

        for device in devices {
            match device.name() {
                Ok(name) => {
                    self.devices.insert(name, device);
                }
                Err(e) => log::debug!("Skipping unnamed output device: {}", e),
            }
        }
        Ok(())
    }

    /// Device names in alphabetical order
    pub fn names(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn default_name(&self) -> Option<String> {
        self.host.default_output_device().and_then(|d| d.name().ok())
    }

    /// The named device, or the host default when no name is given
    pub fn select(&self, name: Option<&str>) -> Result<Device, PlaybackError> {
        match name {
            Some(name) => self
                .devices
                .get(name)
                .cloned()
                .ok_or_else(|| PlaybackError::DeviceNotFound {
                    device: name.to_string(),
                }),
            None => self.host.default_output_device().ok_or_else(|| {
                PlaybackError::InitializationFailed("No default output device available".to_string())
            }),
        }
    }
}

/// Default stream configuration of a device
pub fn output_config(device: &Device) -> Result<SupportedStreamConfig, PlaybackError> {
    device
        .default_output_config()
        .map_err(|e| PlaybackError::InitializationFailed(format!("Failed to get default config: {}", e)))
}
