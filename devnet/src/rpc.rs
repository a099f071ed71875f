use std::str::FromStr;

use alloy_primitives::{Address, B256, U256};
use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::Json, routing::post, Router};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::chain::{Layer, TokenKind};
use crate::node::SharedDevnet;

// JSON-RPC request structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Value,
    pub method: String,
    pub params: Option<Value>,
}

// JSON-RPC response structure
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: Value,
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
}

impl JsonRpcError {
    fn method_not_found() -> Self {
        Self {
            code: -32601,
            message: "Method not found".to_string(),
        }
    }

    fn invalid_params(message: impl Into<String>) -> Self {
        Self {
            code: -32602,
            message: format!("Invalid params: {}", message.into()),
        }
    }

    fn reverted(error: anyhow::Error) -> Self {
        Self {
            code: -32000,
            message: format!("{:#}", error),
        }
    }
}

type RpcResult = std::result::Result<Value, JsonRpcError>;

pub fn router(devnet: SharedDevnet) -> Router {
    Router::new()
        .route("/", post(handle_rpc_request))
        .layer(CorsLayer::permissive())
        .with_state(devnet)
}

pub async fn start(addr: &str, devnet: SharedDevnet) -> Result<()> {
    info!("Starting devnet rpc server on {:?}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(devnet)).await?;
    Ok(())
}

// Main RPC handler
async fn handle_rpc_request(
    State(devnet): State<SharedDevnet>,
    Json(request): Json<JsonRpcRequest>,
) -> std::result::Result<Json<JsonRpcResponse>, StatusCode> {
    Ok(Json(dispatch(&devnet, request).await))
}

pub async fn dispatch(devnet: &SharedDevnet, request: JsonRpcRequest) -> JsonRpcResponse {
    info!("Received rpc request of method: {:?}", request.method);
    let params = request.params.unwrap_or(Value::Null);
    let result = match request.method.as_str() {
        "getHealth" => Ok(json!("ok")),
        "getVersion" => Ok(json!({ "devnet": env!("CARGO_PKG_VERSION") })),
        "l1_approve" => l1_approve(devnet, &params).await,
        "l1_stake" => l1_stake(devnet, &params).await,
        "l1_consumeMessage" => l1_consume_message(devnet, &params).await,
        "l1_balanceOf" => balance_of(devnet, Layer::L1, &params).await,
        "l2_approve" => l2_approve(devnet, &params).await,
        "l2_stake" => l2_stake(devnet, &params).await,
        "l2_withdraw" => l2_withdraw(devnet, &params).await,
        "l2_claimReward" => l2_claim_reward(devnet, &params).await,
        "l2_exit" => l2_exit(devnet, &params).await,
        "l2_notifyRewardAmount" => l2_notify_reward_amount(devnet, &params).await,
        "l2_setRewardsDuration" => l2_set_rewards_duration(devnet, &params).await,
        "l2_earned" => l2_earned(devnet, &params).await,
        "l2_getAccount" => l2_get_account(devnet, &params).await,
        "l2_getRewardPeriod" => to_value(devnet.read().await.l2_reward_period()),
        "l2_balanceOf" => balance_of(devnet, Layer::L2, &params).await,
        "devnet_mint" => mint(devnet, &params).await,
        "devnet_flush" => flush(devnet).await,
        "devnet_increaseTime" => increase_time(devnet, &params).await,
        "devnet_pendingMessages" => to_value(devnet.read().await.pending_messages()),
        "devnet_getBlock" => get_block(devnet, &params).await,
        _ => Err(JsonRpcError::method_not_found()),
    };

    match result {
        Ok(result) => JsonRpcResponse {
            jsonrpc: "2.0".to_string(),
            id: request.id,
            result: Some(result),
            error: None,
        },
        Err(error) => {
            warn!("{} failed: {}", request.method, error.message);
            JsonRpcResponse {
                jsonrpc: "2.0".to_string(),
                id: request.id,
                result: None,
                error: Some(error),
            }
        }
    }
}

/*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
/*                         HANDLERS                           */
/*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

async fn l1_approve(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let owner = address_param(params, 0, "owner")?;
    let spender = address_param(params, 1, "spender")?;
    let amount = amount_param(params, 2)?;
    let block = devnet
        .write()
        .await
        .l1_approve(owner, spender, amount)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "block": block }))
}

async fn l1_stake(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let sender = address_param(params, 0, "sender")?;
    let amount = amount_param(params, 1)?;
    let ((message_hash, nonce), block) = devnet
        .write()
        .await
        .l1_stake(sender, amount)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "messageHash": message_hash, "nonce": nonce, "block": block }))
}

async fn l1_consume_message(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let sender = address_param(params, 0, "sender")?;
    let message_hash = hash_param(params, 1)?;
    let (message_hash, block) = devnet
        .write()
        .await
        .l1_consume_message(sender, message_hash)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "messageHash": message_hash, "block": block }))
}

async fn l2_approve(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let owner = address_param(params, 0, "owner")?;
    let spender = address_param(params, 1, "spender")?;
    let amount = amount_param(params, 2)?;
    let block = devnet
        .write()
        .await
        .l2_approve(owner, spender, amount)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "block": block }))
}

async fn l2_stake(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let sender = address_param(params, 0, "sender")?;
    let amount = amount_param(params, 1)?;
    let block = devnet
        .write()
        .await
        .l2_stake(sender, amount)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "block": block }))
}

async fn l2_withdraw(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let sender = address_param(params, 0, "sender")?;
    let amount = amount_param(params, 1)?;
    let (message_hash, block) = devnet
        .write()
        .await
        .l2_withdraw(sender, amount)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "messageHash": message_hash, "block": block }))
}

async fn l2_claim_reward(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let sender = address_param(params, 0, "sender")?;
    let (reward, block) = devnet
        .write()
        .await
        .l2_claim_reward(sender)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "reward": reward, "block": block }))
}

async fn l2_exit(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let sender = address_param(params, 0, "sender")?;
    let (reward, block) = devnet
        .write()
        .await
        .l2_exit(sender)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "reward": reward, "block": block }))
}

async fn l2_notify_reward_amount(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let sender = address_param(params, 0, "sender")?;
    let amount = amount_param(params, 1)?;
    let block = devnet
        .write()
        .await
        .l2_notify_reward_amount(sender, amount)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "block": block }))
}

async fn l2_set_rewards_duration(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let sender = address_param(params, 0, "sender")?;
    let duration = u64_param(params, 1, "duration")?;
    let block = devnet
        .write()
        .await
        .l2_set_rewards_duration(sender, duration)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "block": block }))
}

async fn l2_earned(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let account = address_param(params, 0, "account")?;
    let earned = devnet
        .read()
        .await
        .l2_earned(&account)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!(earned))
}

async fn l2_get_account(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let account = address_param(params, 0, "account")?;
    to_value(devnet.read().await.l2_account(&account))
}

async fn balance_of(devnet: &SharedDevnet, layer: Layer, params: &Value) -> RpcResult {
    let token: TokenKind = parse_param(params, 0, "token")?;
    let account = address_param(params, 1, "account")?;
    let devnet = devnet.read().await;
    let balance = match layer {
        Layer::L1 => devnet.l1_balance_of(token, &account),
        Layer::L2 => devnet.l2_balance_of(token, &account),
    };
    Ok(json!(balance))
}

async fn mint(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let layer: Layer = parse_param(params, 0, "layer")?;
    let token: TokenKind = parse_param(params, 1, "token")?;
    let to = address_param(params, 2, "to")?;
    let amount = amount_param(params, 3)?;
    let block = devnet
        .write()
        .await
        .mint(layer, token, to, amount)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "block": block }))
}

async fn flush(devnet: &SharedDevnet) -> RpcResult {
    let report = devnet
        .write()
        .await
        .flush()
        .map_err(JsonRpcError::reverted)?;
    to_value(report)
}

async fn increase_time(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let seconds = u64_param(params, 0, "seconds")?;
    let layer: Option<Layer> = match param(params, 1) {
        None | Some(Value::Null) => None,
        Some(_) => Some(parse_param(params, 1, "layer")?),
    };
    let block = devnet
        .write()
        .await
        .increase_time(layer, seconds)
        .map_err(JsonRpcError::reverted)?;
    Ok(json!({ "block": block }))
}

async fn get_block(devnet: &SharedDevnet, params: &Value) -> RpcResult {
    let devnet = devnet.read().await;
    let block_num = match param(params, 0) {
        None | Some(Value::Null) => devnet.latest_block_num(),
        Some(_) => u64_param(params, 0, "block number")?,
    };
    let block = devnet
        .get_block(block_num)
        .map_err(JsonRpcError::reverted)?;
    to_value(block)
}

/*´:°•.°+.*•´.*:˚.°*.˚•´.°:°•.°•.*•´.*:˚.°*.˚•´.°:°•.°+.*•´.*:*/
/*                          PARAMS                            */
/*.•°:°.´+˚.*°.˚:*.´•*.+°.•°:´*.´•*.•°.•°:°.´:•˚°.*°.˚:*.´+°.•*/

fn param(params: &Value, index: usize) -> Option<&Value> {
    params.as_array().and_then(|arr| arr.get(index))
}

fn parse_param<T: FromStr>(params: &Value, index: usize, name: &str) -> std::result::Result<T, JsonRpcError> {
    param(params, index)
        .and_then(|v| v.as_str())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| JsonRpcError::invalid_params(format!("{} expected at position {}", name, index)))
}

fn address_param(params: &Value, index: usize, name: &str) -> std::result::Result<Address, JsonRpcError> {
    parse_param(params, index, name)
}

fn hash_param(params: &Value, index: usize) -> std::result::Result<B256, JsonRpcError> {
    parse_param(params, index, "message hash")
}

// Amounts are decimal or 0x-prefixed strings; small values may be numbers.
fn amount_param(params: &Value, index: usize) -> std::result::Result<U256, JsonRpcError> {
    match param(params, index) {
        Some(Value::Number(n)) => n
            .as_u64()
            .map(U256::from)
            .ok_or_else(|| JsonRpcError::invalid_params("amount must be a non-negative integer")),
        _ => parse_param(params, index, "amount"),
    }
}

fn u64_param(params: &Value, index: usize, name: &str) -> std::result::Result<u64, JsonRpcError> {
    match param(params, index) {
        Some(Value::Number(n)) => n
            .as_u64()
            .ok_or_else(|| JsonRpcError::invalid_params(format!("{} must be a non-negative integer", name))),
        _ => parse_param(params, index, name),
    }
}

fn to_value<T: Serialize>(value: T) -> RpcResult {
    serde_json::to_value(value).map_err(|e| JsonRpcError::reverted(e.into()))
}
