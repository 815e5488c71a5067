//! Capture endpoint enumeration via the MMDevice API.
//!
//! Lists active capture (microphone) endpoints with friendly names and
//! transport types, and resolves the console default.

use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Variant::*;
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

use voice_recorder_core::{AudioDevice, AudioTransportType, DeviceRegistry, SessionError};

use crate::com::{self, ComScope};
use crate::error::{Context, WasapiError};

/// [`DeviceRegistry`] over the system's capture endpoints.
///
/// Each call takes a fresh snapshot; COM is initialized for the duration
/// of the call if the calling thread has not done so.
#[derive(Debug, Default)]
pub struct WasapiDeviceRegistry;

impl WasapiDeviceRegistry {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceRegistry for WasapiDeviceRegistry {
    fn list_devices(&self) -> Result<Vec<AudioDevice>, SessionError> {
        let _com = ComScope::enter()?;
        let enumerator = com::device_enumerator()?;
        Ok(list_capture_devices(&enumerator)?)
    }

    fn default_device(&self) -> Result<AudioDevice, SessionError> {
        let _com = ComScope::enter()?;
        let enumerator = com::device_enumerator()?;
        let device = com::open_endpoint(&enumerator, None, eCapture)?;
        let mut default = describe(&device, 0)?;
        default.is_default = true;
        Ok(default)
    }
}

fn list_capture_devices(enumerator: &IMMDeviceEnumerator) -> Result<Vec<AudioDevice>, WasapiError> {
    unsafe {
        let collection = enumerator
            .EnumAudioEndpoints(eCapture, DEVICE_STATE_ACTIVE)
            .context("EnumAudioEndpoints")?;
        let count = collection.GetCount().context("IMMDeviceCollection::GetCount")?;

        let default_id = com::open_endpoint(enumerator, None, eCapture)
            .and_then(|d| com::endpoint_id(&d))
            .ok();

        let mut devices = Vec::new();
        for i in 0..count {
            let Ok(device) = collection.Item(i) else {
                continue;
            };
            match describe(&device, i) {
                Ok(mut found) => {
                    found.is_default = default_id.as_deref() == Some(found.id.as_str());
                    devices.push(found);
                }
                Err(e) => log::warn!("skipping capture endpoint {}: {}", i, e),
            }
        }

        log::debug!("enumerated {} capture endpoint(s)", devices.len());
        Ok(devices)
    }
}

fn describe(device: &IMMDevice, index: u32) -> Result<AudioDevice, WasapiError> {
    let id = com::endpoint_id(device)?;
    let store = unsafe { device.OpenPropertyStore(STGM_READ) }.context("IMMDevice::OpenPropertyStore")?;

    let name = string_property(&store, &PKEY_Device_FriendlyName).unwrap_or_else(|| format!("Device {}", index));
    let transport = string_property(&store, &PKEY_Device_EnumeratorName)
        .map(|enumerator| transport_type(&enumerator))
        .unwrap_or(AudioTransportType::Unknown);

    Ok(AudioDevice {
        id,
        name,
        is_default: false,
        transport_type: Some(transport),
    })
}

/// Classify an endpoint by the bus enumerator that exposed it.
fn transport_type(enumerator_name: &str) -> AudioTransportType {
    let name = enumerator_name.to_ascii_uppercase();
    if name.contains("BTHLEENUM") {
        AudioTransportType::BluetoothLE
    } else if name.contains("BTHENUM") {
        AudioTransportType::Bluetooth
    } else if name.contains("USB") {
        AudioTransportType::Usb
    } else if name.contains("SWD") || name.contains("ROOT") {
        AudioTransportType::Virtual
    } else {
        AudioTransportType::BuiltIn
    }
}

/// Read a `VT_LPWSTR` property.
fn string_property(store: &IPropertyStore, key: &PROPERTYKEY) -> Option<String> {
    let value = unsafe { store.GetValue(key) }.ok()?;
    if value.vt() != VT_LPWSTR {
        return None;
    }
    Some(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_transport_by_enumerator() {
        assert_eq!(transport_type("BTHENUM"), AudioTransportType::Bluetooth);
        assert_eq!(transport_type("BTHLEENUM"), AudioTransportType::BluetoothLE);
        assert_eq!(transport_type("USB"), AudioTransportType::Usb);
        assert_eq!(transport_type("HDAUDIO"), AudioTransportType::BuiltIn);
    }
}
