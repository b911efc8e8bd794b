pub mod documents;
pub mod error;
pub mod identity;
pub mod models;
pub mod qos;
pub mod request_id;
pub mod response;
pub mod topic;

pub use documents::*;
pub use error::DocumentError;
pub use identity::DeviceIdentity;
pub use models::*;
pub use qos::QoS;
pub use request_id::{RandomRequestIdGenerator, RequestIdGenerator, SequentialRequestIdGenerator};
pub use response::ResponseCode;
pub use topic::{DeviceTopic, ServerTopic, TopicScheme, TopicSet};
