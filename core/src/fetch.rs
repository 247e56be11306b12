use crate::error::RpcError;
use crate::inspect::Inspect;
use crate::logging::{BLOCK_INFO_CATEGORY, Category, STATUS_CATEGORY};
use crate::rpc::NodeRpc;
use log::{Log, debug};

/// Fetch the latest block, record it under `blockInfo`, then fetch the node
/// status and record it under `status`. Stops at the first failed call.
pub async fn fetch_and_record<R: NodeRpc>(rpc: &R, logger: &dyn Log) -> Result<(), RpcError> {
    let block_log = Category::new(logger, BLOCK_INFO_CATEGORY);
    let status_log = Category::new(logger, STATUS_CATEGORY);

    let block = rpc.fetch_latest_block_info().await?;
    debug!(
        "Latest block fetched: height={:?} hash={:?}",
        block.height(),
        block.hash()
    );
    block_log.info(format_args!("{}", Inspect(block.as_value())));

    let status = rpc.fetch_status().await?;
    debug!(
        "Node status fetched: version={:?} peers={:?}",
        status.version(),
        status.peer_count()
    );
    status_log.info(format_args!("{}", Inspect(status.as_value())));

    Ok(())
}
