#![forbid(unsafe_code)]
#![allow(dead_code)]

use serde_json::Value;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub(crate) struct Server {
    child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
    scratch: tempfile::TempDir,
    next_id: i64,
}

impl Server {
    pub(crate) fn start() -> Self {
        Self::start_with_args(&[])
    }

    /// Spawns the server with a private storage dir and artifacts root under one scratch dir.
    pub(crate) fn start_with_args(extra_args: &[&str]) -> Self {
        let scratch = tempfile::tempdir().expect("scratch dir");
        let mut child = Command::new(env!("CARGO_BIN_EXE_sz_mcp"))
            .arg("--storage-dir")
            .arg(scratch.path().join("store"))
            .arg("--artifacts-dir")
            .arg(scratch.path().join("artifacts"))
            .args(extra_args)
            .env_remove("SYZYGY_PROJECT_KEY")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .spawn()
            .expect("spawn sz_mcp");

        let stdin = child.stdin.take().expect("stdin");
        let stdout = BufReader::new(child.stdout.take().expect("stdout"));

        Self {
            child,
            stdin,
            stdout,
            scratch,
            next_id: 100,
        }
    }

    pub(crate) fn scratch(&self) -> &Path {
        self.scratch.path()
    }

    pub(crate) fn storage_dir(&self) -> PathBuf {
        self.scratch.path().join("store")
    }

    pub(crate) fn send_raw(&mut self, line: &str) {
        writeln!(self.stdin, "{line}").expect("write line");
        self.stdin.flush().expect("flush line");
    }

    pub(crate) fn send_bytes(&mut self, bytes: &[u8]) {
        self.stdin.write_all(bytes).expect("write bytes");
        self.stdin.flush().expect("flush bytes");
    }

    pub(crate) fn send(&mut self, req: Value) {
        self.send_raw(&req.to_string());
    }

    pub(crate) fn recv(&mut self) -> Value {
        let mut line = String::new();
        self.stdout.read_line(&mut line).expect("read response");
        assert!(!line.trim().is_empty(), "empty response line");
        serde_json::from_str(&line).expect("parse response json")
    }

    pub(crate) fn request(&mut self, req: Value) -> Value {
        self.send(req);
        self.recv()
    }

    pub(crate) fn initialize_default(&mut self) {
        let _ = self.request(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "initialize",
            "params": { "protocolVersion": "2024-11-05", "capabilities": {}, "clientInfo": { "name": "test", "version": "0" } }
        }));
        self.send(json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized",
            "params": {}
        }));
    }

    pub(crate) fn start_initialized() -> Self {
        let mut server = Self::start();
        server.initialize_default();
        server
    }

    /// Raw `tools/call` response envelope.
    pub(crate) fn call_tool(&mut self, name: &str, arguments: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id;
        let resp = self.request(json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }));
        assert_eq!(resp.get("id"), Some(&json!(id)), "response id mismatch");
        resp
    }

    /// Parsed payload of a successful tool call; panics on `isError`.
    pub(crate) fn call_ok(&mut self, name: &str, arguments: Value) -> Value {
        let resp = self.call_tool(name, arguments);
        assert_eq!(
            resp["result"]["isError"],
            json!(false),
            "{name} failed: {}",
            extract_tool_text_str(&resp)
        );
        extract_tool_text(&resp)
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub(crate) fn extract_tool_text(resp: &Value) -> Value {
    let text = extract_tool_text_str(resp);
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

pub(crate) fn extract_tool_text_str(resp: &Value) -> String {
    resp.get("result")
        .and_then(|v| v.get("content"))
        .and_then(|v| v.get(0))
        .and_then(|v| v.get("text"))
        .and_then(|v| v.as_str())
        .expect("result.content[0].text")
        .to_string()
}

pub(crate) fn assert_json_rpc_error(resp: &Value, expected_code: i64) {
    let code = resp
        .get("error")
        .and_then(|v| v.get("code"))
        .and_then(|v| v.as_i64())
        .expect("error.code");
    assert_eq!(code, expected_code);
}

/// Asserts an `isError` tool result whose text ends with `(<code>)`.
pub(crate) fn assert_tool_error(resp: &Value, expected_code: &str) {
    assert!(resp.get("error").is_none(), "tool errors are not protocol errors");
    assert_eq!(resp["result"]["isError"], json!(true), "expected isError");
    let text = extract_tool_text_str(resp);
    assert!(text.starts_with("ERROR: "), "unexpected text: {text}");
    assert!(
        text.ends_with(&format!("({expected_code})")),
        "expected {expected_code}, got: {text}"
    );
}
