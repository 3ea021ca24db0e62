use serde_json::Value;

use crate::transport::Endpoint;

/// Orders, cancels or modifies that fit in one unit of action weight.
pub const BATCH_WEIGHT_STEP: usize = 40;

const LIGHT_INFO_TYPES: [&str; 6] = [
    "l2Book",
    "allMids",
    "clearinghouseState",
    "orderStatus",
    "spotClearinghouseState",
    "exchangeStatus",
];

const LIGHT_INFO_WEIGHT: u32 = 2;
const DEFAULT_INFO_WEIGHT: u32 = 20;
const EXPLORER_WEIGHT: u32 = 40;
const FALLBACK_WEIGHT: u32 = 2;

/// Weight of an exchange action carrying `batch_len` entries.
pub fn action_weight(batch_len: usize) -> u32 {
    let extra = batch_len / BATCH_WEIGHT_STEP;
    1 + u32::try_from(extra).unwrap_or(u32::MAX - 1)
}

/// Weight charged against the global bucket for a payload bound for `endpoint`.
pub fn weight_for(endpoint: Endpoint, payload: &Value) -> u32 {
    if let Some(action) = payload.get("action") {
        return action_weight(batch_len(action));
    }

    if let Some(kind) = payload.get("type").and_then(Value::as_str) {
        if LIGHT_INFO_TYPES.contains(&kind) {
            return LIGHT_INFO_WEIGHT;
        }
        if endpoint == Endpoint::Explorer {
            return EXPLORER_WEIGHT;
        }
        return DEFAULT_INFO_WEIGHT;
    }

    FALLBACK_WEIGHT
}

/// Number of entries in a batched action, or 1 for anything unbatched.
pub fn batch_len(action: &Value) -> usize {
    let field = match action.get("type").and_then(Value::as_str) {
        Some("order") => "orders",
        Some("cancel") | Some("cancelByCloid") => "cancels",
        Some("batchModify") => "modifies",
        _ => return 1,
    };
    action
        .get(field)
        .and_then(Value::as_array)
        .map_or(1, Vec::len)
}
