use event_bus::PermanentFailure;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use todo_models::OwnerId;

use crate::USER_DELETE_TOPIC;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeleted {
    pub user_id: String,
}

fn malformed(reason: impl Into<String>) -> PermanentFailure {
    PermanentFailure::Malformed(reason.into())
}

/// Extracts the deleted user's id.
///
/// Accepts the envelope `{"type": "user.delete", "payload": {"userId": ..}}`
/// and the bare `{"userId": ..}` body. The id may be a string or an
/// integer.
pub fn owner_from_payload(value: &Value) -> Result<OwnerId, PermanentFailure> {
    let body = match value.get("payload") {
        Some(payload) => {
            match value.get("type").and_then(Value::as_str) {
                Some(USER_DELETE_TOPIC) | None => payload,
                Some(other) => {
                    return Err(malformed(format!(
                        "unexpected event type {other}"
                    )));
                }
            }
        }
        None => value,
    };

    let raw = match body.get("userId") {
        Some(Value::String(id)) => id.clone(),
        Some(Value::Number(id)) if id.is_i64() || id.is_u64() => id.to_string(),
        Some(_) => return Err(malformed("userId is not a string or integer")),
        None => return Err(malformed("userId is missing")),
    };
    OwnerId::parse(&raw).map_err(|e| malformed(e.to_string()))
}
