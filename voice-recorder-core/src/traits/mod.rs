pub mod capture_provider;
pub mod codec;
pub mod device_registry;
pub mod output_provider;
pub mod session_delegate;
