pub mod configs;
pub mod errors;
pub mod resources;
pub mod services;

mod managed_device;

pub use managed_device::{ManagedDevice, ManagedDeviceBuilder};
