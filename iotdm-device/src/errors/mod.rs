mod correlation;
mod lifecycle;
mod settings;
mod transport;

pub use correlation::CorrelationError;
pub use lifecycle::LifecycleError;
pub use settings::SettingsError;
pub use transport::TransportError;
