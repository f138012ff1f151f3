#![forbid(unsafe_code)]

use std::path::{Path, PathBuf};

pub(crate) const SESSION_LOG_FILE: &str = "syzygy_mcp_last_session.txt";

/// Small key=value record of the most recent server session. Rewritten on every
/// update; request bodies never land here.
#[derive(Clone, Debug)]
pub(crate) struct SessionLog {
    path: PathBuf,
    started_at: String,
    pid: u32,
    version: &'static str,
    cwd: String,
    args: Vec<String>,
    project_key: Option<String>,
    last_method: Option<String>,
    last_error: Option<String>,
    exit: Option<String>,
}

impl SessionLog {
    pub(crate) fn new(storage_dir: &Path) -> Self {
        let cwd = std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .to_string_lossy()
            .to_string();
        let this = Self {
            path: storage_dir.join(SESSION_LOG_FILE),
            started_at: crate::now_rfc3339(),
            pid: std::process::id(),
            version: crate::SERVER_VERSION,
            cwd,
            args: std::env::args().collect(),
            project_key: None,
            last_method: None,
            last_error: None,
            exit: None,
        };
        this.flush();
        this
    }

    pub(crate) fn note_project(&mut self, project_key: &str) {
        self.project_key = Some(truncate(project_key, 96));
        self.flush();
    }

    pub(crate) fn note_method(&mut self, method: &str) {
        let method = method.trim();
        if method.is_empty() {
            return;
        }
        self.last_method = Some(truncate(method, 96));
        self.flush();
    }

    pub(crate) fn note_error(&mut self, error: &str) {
        let error = error.trim();
        if error.is_empty() {
            return;
        }
        self.last_error = Some(truncate(error, 300));
        self.flush();
    }

    pub(crate) fn note_exit(&mut self, reason: &str) {
        self.exit = Some(truncate(reason.trim(), 120));
        self.flush();
    }

    fn render(&self) -> String {
        let mut out = String::new();
        push_kv(&mut out, "ts_start", &self.started_at);
        push_kv(&mut out, "pid", &self.pid.to_string());
        push_kv(&mut out, "version", self.version);
        push_kv(&mut out, "cwd", &self.cwd);
        push_kv(&mut out, "args", &format!("{:?}", self.args));
        let optional = [
            ("project", &self.project_key),
            ("last_method", &self.last_method),
            ("last_error", &self.last_error),
            ("exit", &self.exit),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                push_kv(&mut out, key, value);
            }
        }
        out
    }

    fn flush(&self) {
        let Some(dir) = self.path.parent() else {
            return;
        };
        let _ = std::fs::create_dir_all(dir);
        let _ = std::fs::write(&self.path, self.render());
    }
}

fn push_kv(out: &mut String, key: &str, value: &str) {
    use std::fmt::Write as _;
    let _ = writeln!(out, "{key}={value}");
}

fn truncate(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}
