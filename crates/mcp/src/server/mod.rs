#![forbid(unsafe_code)]


use crate::service::SyzygyService;
use crate::*;
use serde_json::{Value, json};
use tracing::debug;

pub(crate) struct McpServer {
    pub(crate) service: SyzygyService,
    session_log: Option<SessionLog>,
}

impl McpServer {
    pub(crate) fn new(service: SyzygyService) -> Self {
        Self {
            service,
            session_log: None,
        }
    }

    pub(crate) fn with_session_log(mut self, mut log: SessionLog) -> Self {
        log.note_project(self.service.project_key());
        self.session_log = Some(log);
        self
    }

    pub(crate) fn note_project(&mut self, project_key: &str) {
        if let Some(log) = self.session_log.as_mut() {
            log.note_project(project_key);
        }
    }

    pub(crate) fn note_exit(&mut self, reason: &str) {
        if let Some(log) = self.session_log.as_mut() {
            log.note_exit(reason);
        }
    }

    fn note_method(&mut self, method: &str) {
        if let Some(log) = self.session_log.as_mut() {
            log.note_method(method);
        }
    }

    fn note_error(&mut self, error: &str) {
        if let Some(log) = self.session_log.as_mut() {
            log.note_error(error);
        }
    }

    /// One response per request; notifications get none.
    pub(crate) fn handle(&mut self, request: JsonRpcRequest) -> Option<Value> {
        let method = request.method.as_str();
        debug!(method, id = ?request.id, "request");
        self.note_method(method);

        if method.starts_with("notifications/") {
            return None;
        }

        match method {
            "initialize" => Some(json_rpc_response(
                request.id,
                json!({
                    "protocolVersion": crate::MCP_VERSION,
                    "serverInfo": { "name": crate::SERVER_NAME, "version": crate::SERVER_VERSION },
                    "capabilities": { "tools": {} }
                }),
            )),
            "ping" => Some(json_rpc_response(request.id, json!({}))),
            "tools/list" => Some(json_rpc_response(
                request.id,
                json!({ "tools": crate::tools::tool_definitions() }),
            )),
            "tools/call" => Some(self.handle_tools_call(request.id, request.params)),
            _ => Some(json_rpc_error(
                request.id,
                METHOD_NOT_FOUND,
                &format!("Method not found: {method}"),
            )),
        }
    }

    fn handle_tools_call(&mut self, id: Option<Value>, params: Option<Value>) -> Value {
        let Some(Value::Object(params)) = params else {
            return json_rpc_error(id, INVALID_PARAMS, "params must be an object");
        };
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return json_rpc_error(id, INVALID_PARAMS, "params.name must be a string");
        };
        let args = match params.get("arguments") {
            Some(Value::Object(args)) => args.clone(),
            Some(Value::Null) | None => sz_core::JsonMap::new(),
            Some(_) => {
                return json_rpc_error(id, INVALID_PARAMS, "params.arguments must be an object");
            }
        };

        let result = match crate::tools::dispatch_tool(self, name, &args) {
            Ok(payload) => tool_result(&payload),
            Err(err) => {
                debug!(tool = name, code = err.code(), "tool failed");
                self.note_error(&err.to_string());
                tool_error_result(&err)
            }
        };
        json_rpc_response(id, result)
    }
}
