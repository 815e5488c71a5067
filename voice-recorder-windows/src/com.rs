//! COM plumbing shared by the device registry and the stream threads.

use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::RPC_E_CHANGED_MODE;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::{AvRevertMmThreadCharacteristics, AvSetMmThreadCharacteristicsW};

use crate::error::{Context, WasapiError};

/// COM initialized for the lifetime of the value.
///
/// A thread already in a single-threaded apartment keeps it; COM is usable
/// there and must not be uninitialized by us.
pub(crate) struct ComScope {
    owned: bool,
}

impl ComScope {
    pub(crate) fn enter() -> Result<Self, WasapiError> {
        let hr = unsafe { CoInitializeEx(None, COINIT_MULTITHREADED) };
        if hr == RPC_E_CHANGED_MODE {
            return Ok(Self { owned: false });
        }
        hr.ok().map_err(WasapiError::Com)?;
        Ok(Self { owned: true })
    }
}

impl Drop for ComScope {
    fn drop(&mut self) {
        if self.owned {
            unsafe { CoUninitialize() };
        }
    }
}

pub(crate) fn device_enumerator() -> Result<IMMDeviceEnumerator, WasapiError> {
    unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }.context("CoCreateInstance(MMDeviceEnumerator)")
}

/// Endpoint by id, or the console default for `flow` when `id` is `None`.
pub(crate) fn open_endpoint(
    enumerator: &IMMDeviceEnumerator,
    id: Option<&str>,
    flow: EDataFlow,
) -> Result<IMMDevice, WasapiError> {
    unsafe {
        match id {
            Some(id) => {
                let wide_id: Vec<u16> = id.encode_utf16().chain(std::iter::once(0)).collect();
                enumerator
                    .GetDevice(PCWSTR(wide_id.as_ptr()))
                    .map_err(|_| WasapiError::DeviceNotFound(id.to_string()))
            }
            None => enumerator
                .GetDefaultAudioEndpoint(flow, eConsole)
                .map_err(|_| WasapiError::DeviceNotFound("default endpoint".into())),
        }
    }
}

pub(crate) fn endpoint_id(device: &IMMDevice) -> Result<String, WasapiError> {
    let id = unsafe { device.GetId() }.context("IMMDevice::GetId")?;
    Ok(take_pwstr(id))
}

/// Copy a COM-allocated string and free it.
pub(crate) fn take_pwstr(value: PWSTR) -> String {
    if value.is_null() {
        return String::new();
    }
    unsafe {
        let text = value.to_string().unwrap_or_default();
        CoTaskMemFree(Some(value.0 as *const _));
        text
    }
}

/// Multimedia class scheduling for the calling audio thread.
pub(crate) struct MmcssScope(Option<windows::Win32::Foundation::HANDLE>);

impl MmcssScope {
    pub(crate) fn enter() -> Self {
        let mut task_index: u32 = 0;
        let task_name: Vec<u16> = "Pro Audio\0".encode_utf16().collect();
        match unsafe { AvSetMmThreadCharacteristicsW(PCWSTR(task_name.as_ptr()), &mut task_index) } {
            Ok(handle) => Self(Some(handle)),
            Err(e) => {
                log::debug!("MMCSS registration unavailable: {}", e);
                Self(None)
            }
        }
    }
}

impl Drop for MmcssScope {
    fn drop(&mut self) {
        if let Some(handle) = self.0.take() {
            unsafe {
                let _ = AvRevertMmThreadCharacteristics(handle);
            }
        }
    }
}
