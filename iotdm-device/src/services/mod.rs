mod correlator;
mod dispatcher;
mod handlers;
mod lifecycle;
mod notifiers;
mod transport;

pub use correlator::*;
pub use dispatcher::*;
pub use handlers::*;
pub use lifecycle::*;
pub use notifiers::*;
pub use transport::*;
