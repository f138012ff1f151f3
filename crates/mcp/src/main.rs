#![forbid(unsafe_code)]

mod entry;
mod server;
mod service;
mod support;
mod tools;

pub(crate) use server::McpServer;
pub(crate) use support::*;

use service::SyzygyService;
use std::fmt::Write as _;
use sz_storage::SqliteStore;
use tracing::{error, info};

// Widely deployed MCP baseline; clients negotiate down to it.
const MCP_VERSION: &str = "2024-11-05";
const SERVER_NAME: &str = "syzygy-mcp";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn write_last_crash(storage_dir: &std::path::Path, kind: &str, detail: &str) {
    let _ = std::fs::create_dir_all(storage_dir);
    let path = storage_dir.join("syzygy_mcp_last_crash.txt");

    let mut out = String::new();
    let _ = writeln!(out, "ts={}", now_rfc3339());
    let _ = writeln!(out, "pid={}", std::process::id());
    let _ = writeln!(out, "kind={kind}");
    let _ = writeln!(out, "version={SERVER_VERSION}");
    let _ = writeln!(out, "detail={detail}");

    let _ = std::fs::write(path, out);
}

fn install_crash_reporter(storage_dir: std::path::PathBuf) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_last_crash(&storage_dir, "panic", &info.to_string());
        default_hook(info);
    }));
}

fn usage() -> &'static str {
    "sz_mcp - syzygy MCP server: record, crystallize, replay and self-check test units over stdio\n\n\
USAGE:\n\
  sz_mcp [--storage-dir DIR] [--project KEY] [--artifacts-dir DIR]\n\
\n\
FLAGS:\n\
  -h, --help       Print this help and exit\n\
  -V, --version    Print version and exit\n\
\n\
ENVIRONMENT:\n\
  SYZYGY_HOME / SYZYGY_DATA_DIR   storage dir (default: $HOME/.syzygy-mcp)\n\
  SYZYGY_PROJECT_KEY              active project (default: default)\n\
  SYZYGY_ARTIFACTS_DIR            crystallize output root (default: ./syzygy-artifacts)\n\
  SYZYGY_LOG / RUST_LOG           stderr log filter (default: warn)\n"
}

fn version_line() -> String {
    format!("sz_mcp {SERVER_VERSION} (mcp {MCP_VERSION})")
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if wants_help(&args) {
        print!("{}", usage());
        return Ok(());
    }
    if wants_version(&args) {
        println!("{}", version_line());
        return Ok(());
    }

    init_logging();
    let config = parse_runtime_config();
    install_crash_reporter(config.storage_dir.clone());
    let session_log = SessionLog::new(&config.storage_dir);

    let store = SqliteStore::open(&config.storage_dir)?;
    info!(
        storage_dir = %config.storage_dir.display(),
        project = %config.project_key,
        "syzygy mcp server starting"
    );
    let service = SyzygyService::new(
        Box::new(store),
        &config.project_key,
        config.artifacts_dir.clone(),
    );
    let mut server = McpServer::new(service).with_session_log(session_log);

    let result = entry::run_stdio(&mut server);
    match &result {
        Ok(()) => {
            server.note_exit("eof");
            info!("input closed, shutting down");
        }
        Err(err) => {
            server.note_exit(&format!("io: {err}"));
            error!(error = %err, "stdio loop failed");
            write_last_crash(&config.storage_dir, "error", &format!("{err:?}"));
        }
    }
    result.map_err(Into::into)
}
