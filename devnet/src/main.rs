use std::sync::Arc;

use anyhow::Result;
use devnet::{rpc, Devnet, DevnetConfig, Node};
use log::info;
use tokio::sync::RwLock;

#[tokio::main]
async fn main() -> Result<()> {
    // Step1. init log sys and config
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = DevnetConfig::from_env();
    info!("Starting staking bridge devnet with {:?}", config);

    // Step2. open both ledgers
    let devnet = Arc::new(RwLock::new(Devnet::open(&config)?));

    // Step3. start node loop
    let node = Node::new(devnet.clone(), &config);
    tokio::spawn(async move {
        if let Err(e) = node.start().await {
            log::error!("Node loop stopped: {:?}", e);
        }
    });

    // Step4. start rpc server
    rpc::start(&config.addr, devnet).await
}
