pub mod error;
pub mod fetch;
pub mod inspect;
pub mod logging;
pub mod rpc;

pub use error::{LogSetupError, RpcError};
pub use fetch::fetch_and_record;
pub use logging::{Category, LogConfig, LogRouter};
pub use rpc::{BlockInfo, CasperRpcClient, NodeRpc, NodeStatus};
