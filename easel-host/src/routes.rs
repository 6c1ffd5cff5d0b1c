//! The `/rpc` endpoint.

use std::time::Instant;

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use easel_bridge::{rpc, JsonRpcRequest, JsonRpcResponse, METHODS};
use serde_json::Value;

use crate::metrics::{record_rpc_call, record_validation_failure, CallOutcome};
use crate::validation::validate_request;
use crate::AppState;

/// Metric label for a method name. Names the UI made up are collapsed.
fn method_label(method: &str) -> &str {
    if METHODS.contains(&method) {
        method
    } else {
        "unknown"
    }
}

/// Classify a bridge response for metrics.
///
/// Search methods report remote failures as `{error}` result documents.
fn outcome(response: &JsonRpcResponse) -> CallOutcome {
    match (&response.error, &response.result) {
        (Some(error), _) if error.code == rpc::OPERATION_FAILED => CallOutcome::RemoteError,
        (Some(_), _) => CallOutcome::RpcError,
        (None, Some(result)) if result.get("error").is_some_and(Value::is_string) => {
            CallOutcome::RemoteError
        }
        (None, _) => CallOutcome::Ok,
    }
}

/// Decode a JSON body into a request envelope.
///
/// Well-formed JSON of the wrong shape is an invalid request; the id is
/// echoed when the body carries one.
fn parse_envelope(body: Value) -> Result<JsonRpcRequest, Box<JsonRpcResponse>> {
    let id = body.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(body).map_err(|err| {
        Box::new(JsonRpcResponse::error(
            id,
            rpc::INVALID_REQUEST,
            format!("Invalid request: {err}"),
        ))
    })
}

/// JSON-RPC endpoint for the editor UI.
///
/// Bodies that are not JSON get a parse error, JSON that is not a request
/// envelope gets invalid request, and requests that fail input limits get
/// invalid params without reaching the bridge.
#[tracing::instrument(
    name = "rpc_handler",
    skip(state, payload),
    fields(method = tracing::field::Empty)
)]
pub async fn rpc_handler(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Json<JsonRpcResponse> {
    let started = Instant::now();

    let body = match payload {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::debug!(status = %rejection.status(), "Rejected /rpc body");
            record_rpc_call("unknown", CallOutcome::RpcError, started.elapsed().as_secs_f64());
            return Json(JsonRpcResponse::error(
                Value::Null,
                rpc::PARSE_ERROR,
                format!("Parse error: {}", rejection.body_text()),
            ));
        }
    };

    let request = match parse_envelope(body) {
        Ok(request) => request,
        Err(response) => {
            record_rpc_call("unknown", CallOutcome::RpcError, started.elapsed().as_secs_f64());
            return Json(*response);
        }
    };

    let label = method_label(&request.method).to_string();
    tracing::Span::current().record("method", label.as_str());

    if let Err(err) = validate_request(&request) {
        record_validation_failure(err.kind());
        record_rpc_call(&label, CallOutcome::RpcError, started.elapsed().as_secs_f64());
        return Json(JsonRpcResponse::error(
            request.id,
            rpc::INVALID_PARAMS,
            format!("Invalid params: {err}"),
        ));
    }

    let response = state.bridge.handle_request(request).await;
    record_rpc_call(&label, outcome(&response), started.elapsed().as_secs_f64());
    Json(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unknown_methods_share_a_label() {
        assert_eq!(method_label("icons/search"), "icons/search");
        assert_eq!(method_label("icons/../../etc"), "unknown");
    }

    #[test]
    fn test_envelope_without_method_is_invalid_request() {
        let response = parse_envelope(json!({"jsonrpc": "2.0", "id": 7})).expect_err("invalid");
        assert_eq!(response.id, json!(7));
        let error = response.error.clone().expect("error");
        assert_eq!(error.code, rpc::INVALID_REQUEST);
        assert!(error.message.contains("method"));

        let not_object = parse_envelope(json!([1, 2])).expect_err("invalid");
        assert_eq!(not_object.id, Value::Null);
        assert_eq!(not_object.error.map(|e| e.code), Some(rpc::INVALID_REQUEST));
    }

    #[test]
    fn test_envelope_decodes() {
        let request = parse_envelope(json!({"jsonrpc": "2.0", "id": 1, "method": "project/list"}))
            .expect("request");
        assert_eq!(request.method, "project/list");
    }

    #[test]
    fn test_outcomes() {
        let ok = JsonRpcResponse::success(json!(1), json!({"icons": []}));
        assert_eq!(outcome(&ok), CallOutcome::Ok);

        let doc = JsonRpcResponse::success(json!(1), json!({"error": "API Error: 403"}));
        assert_eq!(outcome(&doc), CallOutcome::RemoteError);

        let failed = JsonRpcResponse::error(json!(1), rpc::OPERATION_FAILED, "Generation failed");
        assert_eq!(outcome(&failed), CallOutcome::RemoteError);

        let missing = JsonRpcResponse::error(json!(1), rpc::METHOD_NOT_FOUND, "Method not found: x");
        assert_eq!(outcome(&missing), CallOutcome::RpcError);
    }
}
