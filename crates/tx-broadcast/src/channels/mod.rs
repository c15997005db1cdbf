//! Built-in broadcast channels.

pub mod bundle;
pub mod paper;
pub mod relay;
pub mod rpc;

pub use bundle::BundleChannel;
pub use paper::PaperChannel;
pub use relay::RelayChannel;
pub use rpc::RpcChannel;
