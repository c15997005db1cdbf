//! The stdio native-messaging endpoint.

pub mod endpoint;
pub mod framing;
pub mod methods;

pub use endpoint::StdioEndpoint;
pub use methods::{MethodContext, MethodTable};
