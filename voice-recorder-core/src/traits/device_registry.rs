use crate::models::device::AudioDevice;
use crate::models::error::SessionError;

/// Enumerates capture endpoints.
///
/// Both calls return snapshots; nothing here tracks hot-plug.
pub trait DeviceRegistry {
    /// Active capture endpoints, in the order the subsystem reports them.
    fn list_devices(&self) -> Result<Vec<AudioDevice>, SessionError>;

    /// The operating system's default capture endpoint.
    fn default_device(&self) -> Result<AudioDevice, SessionError>;
}
