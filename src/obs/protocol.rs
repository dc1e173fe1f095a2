//! obs-websocket 5.x message shapes and authentication.

use crate::error::{SceneError, SceneResult};
use base64::Engine;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

/// RPC version sent in Identify
pub const RPC_VERSION: u32 = 1;

/// obs-websocket op codes
pub mod op {
    pub const HELLO: u32 = 0;
    pub const IDENTIFY: u32 = 1;
    pub const IDENTIFIED: u32 = 2;
    pub const REQUEST: u32 = 6;
    pub const REQUEST_RESPONSE: u32 = 7;
}

/// Any message: `{ "op": n, "d": {...} }`
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub op: u32,
    pub d: Value,
}

impl Envelope {
    pub fn parse(text: &str) -> SceneResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Hello (server -> client)
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hello {
    pub obs_web_socket_version: String,
    #[serde(default)]
    pub rpc_version: u32,
    pub authentication: Option<AuthChallenge>,
}

#[derive(Debug, Deserialize)]
pub struct AuthChallenge {
    pub challenge: String,
    pub salt: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identified {
    pub negotiated_rpc_version: u32,
}

/// base64(sha256(base64(sha256(password + salt)) + challenge))
pub fn generate_auth_string(password: &str, challenge: &str, salt: &str) -> String {
    let secret_hash = Sha256::digest(format!("{password}{salt}").as_bytes());
    let secret_base64 = base64::engine::general_purpose::STANDARD.encode(secret_hash);

    let auth_hash = Sha256::digest(format!("{secret_base64}{challenge}").as_bytes());
    base64::engine::general_purpose::STANDARD.encode(auth_hash)
}

/// Identify payload. Events are not subscribed to.
pub fn identify(hello: &Hello, password: Option<&str>) -> SceneResult<Value> {
    let mut d = json!({
        "rpcVersion": RPC_VERSION,
        "eventSubscriptions": 0,
    });
    if let Some(auth) = &hello.authentication {
        let Some(password) = password else {
            return Err(SceneError::protocol(
                "OBS requires authentication but no password provided",
            ));
        };
        d["authentication"] = json!(generate_auth_string(password, &auth.challenge, &auth.salt));
    }
    Ok(json!({ "op": op::IDENTIFY, "d": d }))
}

pub fn request(request_type: &str, request_id: &str, data: Option<&Value>) -> Value {
    let mut d = json!({
        "requestType": request_type,
        "requestId": request_id,
    });
    if let Some(data) = data {
        d["requestData"] = data.clone();
    }
    json!({ "op": op::REQUEST, "d": d })
}

#[derive(Debug, Deserialize)]
struct RequestStatus {
    result: bool,
    code: u32,
    #[serde(default)]
    comment: Option<String>,
}

/// Check `requestStatus` of a RequestResponse body and return its
/// `responseData` (`null` when absent).
pub fn check_response(request_type: &str, response: &Value) -> SceneResult<Value> {
    let status = response
        .get("requestStatus")
        .ok_or_else(|| SceneError::protocol(format!("{request_type}: response has no requestStatus")))?;
    let status: RequestStatus = serde_json::from_value(status.clone())?;

    if !status.result {
        return Err(SceneError::Request {
            request_type: request_type.to_string(),
            code: status.code,
            comment: status.comment,
        });
    }
    Ok(response.get("responseData").cloned().unwrap_or(Value::Null))
}

/// obs-websocket status code for a missing resource
pub const RESOURCE_NOT_FOUND: u32 = 600;

/// obs-websocket status code for a name already in use
pub const RESOURCE_ALREADY_EXISTS: u32 = 601;
