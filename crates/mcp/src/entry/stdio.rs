#![forbid(unsafe_code)]

use crate::{
    INVALID_REQUEST, JsonRpcRequest, McpServer, PARSE_ERROR, json_rpc_error,
    json_rpc_error_with_data,
};
use serde_json::{Value, json};
use std::io::{BufRead, Write};
use tracing::debug;

pub(crate) fn run_stdio(server: &mut McpServer) -> std::io::Result<()> {
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout().lock();
    serve(server, stdin.lock(), &mut stdout)
}

/// Newline-delimited JSON-RPC loop. A bad line gets an error response and the loop moves
/// on; only end of input or a failed write stops it.
pub(crate) fn serve<R: BufRead, W: Write>(
    server: &mut McpServer,
    mut reader: R,
    writer: &mut W,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line,
            Err(e) => {
                debug!(error = %e, "line is not utf-8");
                let resp = json_rpc_error_with_data(
                    None,
                    PARSE_ERROR,
                    "Parse error",
                    json!(format!("invalid utf-8: {e}")),
                );
                write_newline_json(writer, &resp)?;
                continue;
            }
        };
        let raw = line.trim();
        if raw.is_empty() {
            continue;
        }
        if let Some(resp) = handle_line(server, raw) {
            write_newline_json(writer, &resp)?;
        }
    }
}

fn handle_line(server: &mut McpServer, raw: &str) -> Option<Value> {
    let data: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "unparseable line");
            return Some(json_rpc_error_with_data(
                None,
                PARSE_ERROR,
                "Parse error",
                json!(e.to_string()),
            ));
        }
    };

    let (id, has_method) = match data.as_object() {
        Some(obj) => (obj.get("id").cloned(), obj.contains_key("method")),
        None => return Some(json_rpc_error(None, INVALID_REQUEST, "Invalid Request")),
    };
    if !has_method {
        return Some(json_rpc_error(id, INVALID_REQUEST, "Invalid Request"));
    }

    match serde_json::from_value::<JsonRpcRequest>(data) {
        Ok(request) => server.handle(request),
        Err(e) => Some(json_rpc_error(
            id,
            INVALID_REQUEST,
            &format!("Invalid Request: {e}"),
        )),
    }
}

fn write_newline_json<W: Write>(writer: &mut W, resp: &Value) -> std::io::Result<()> {
    let text = serde_json::to_string(resp)?;
    writeln!(writer, "{text}")?;
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::SyzygyService;
    use sz_storage::SqliteStore;

    fn run_lines(input: &str) -> Vec<Value> {
        run_bytes(input.as_bytes())
    }

    fn run_bytes(input: &[u8]) -> Vec<Value> {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = SqliteStore::open(dir.path()).expect("store opens");
        let mut server = McpServer::new(SyzygyService::new(
            Box::new(store),
            "default",
            dir.path().join("artifacts"),
        ));
        let mut out = Vec::new();
        serve(&mut server, input, &mut out).expect("loop ends cleanly");
        String::from_utf8(out)
            .expect("utf8 output")
            .lines()
            .map(|line| serde_json::from_str(line).expect("one json object per line"))
            .collect()
    }

    #[test]
    fn malformed_line_does_not_stall_the_loop() {
        let out = run_lines(
            "{not json\n\n{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ping\"}\n",
        );
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["error"]["code"], json!(PARSE_ERROR));
        assert!(out[0]["error"]["data"].is_string());
        assert_eq!(out[1]["id"], json!(1));
        assert_eq!(out[1]["result"], json!({}));
    }

    #[test]
    fn non_requests_are_invalid() {
        let out = run_lines("[1,2]\n{\"jsonrpc\":\"2.0\",\"id\":5}\n{\"id\":6,\"method\":7}\n");
        assert_eq!(out.len(), 3);
        for resp in &out {
            assert_eq!(resp["error"]["code"], json!(INVALID_REQUEST));
        }
        assert_eq!(out[1]["id"], json!(5));
        assert_eq!(out[2]["id"], json!(6));
    }

    #[test]
    fn notifications_produce_no_output() {
        let out = run_lines(
            "{\"jsonrpc\":\"2.0\",\"method\":\"notifications/initialized\"}\n\
             {\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"initialize\"}\n",
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["result"]["protocolVersion"], json!(crate::MCP_VERSION));
    }

    #[test]
    fn invalid_utf8_line_gets_parse_error_and_loop_continues() {
        let mut input = b"{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"\xff\"}\n".to_vec();
        input.extend_from_slice(b"{\"jsonrpc\":\"2.0\",\"id\":2,\"method\":\"ping\"}\n");
        let out = run_bytes(&input);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["error"]["code"], json!(PARSE_ERROR));
        assert_eq!(out[0]["id"], Value::Null);
        assert_eq!(out[1]["id"], json!(2));
        assert_eq!(out[1]["result"], json!({}));
    }
}
