//! Console plus append-only file progress log.

use super::{
    EventSink, PIPELINE_COMPLETED, PIPELINE_FAILED, PIPELINE_STARTED, STAGE_COMPLETED,
    STAGE_FAILED, STAGE_SKIPPED, STAGE_STARTED,
};
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Writes one timestamped line per progress event.
///
/// Lines go to standard output (unless quiet) and are appended to the log
/// file. Each line carries the run id so interleaved runs can be told apart.
#[derive(Debug)]
pub struct RunLog {
    path: PathBuf,
    file: Mutex<File>,
    console: bool,
}

impl RunLog {
    /// Opens (creating if needed) the run log at `path`, echoing to the console.
    pub fn open(path: impl Into<PathBuf>) -> io::Result<Self> {
        Self::with_console(path.into(), true)
    }

    /// Opens the run log without console output.
    pub fn quiet(path: impl Into<PathBuf>) -> io::Result<Self> {
        Self::with_console(path.into(), false)
    }

    fn with_console(path: PathBuf, console: bool) -> io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            console,
        })
    }

    /// Returns the log file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a free-form line tagged with `run_id`.
    pub fn append(&self, run_id: &str, message: &str) {
        if self.console {
            println!("{message}");
        }
        self.append_to_file(run_id, message);
    }

    /// Appends a line to the log file only, never echoing it.
    ///
    /// For messages the caller already reports on the console.
    pub fn append_to_file(&self, run_id: &str, message: &str) {
        let line = format!(
            "{} run={} {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            short_id(run_id),
            message
        );
        let mut file = self.file.lock();
        if let Err(e) = writeln!(file, "{line}").and_then(|()| file.flush()) {
            warn!(path = %self.path.display(), error = %e, "Failed to append to run log");
        }
    }

    fn record(&self, event_type: &str, data: Option<&Value>) {
        let field = |key: &str| {
            data.and_then(|d| d.get(key))
                .and_then(Value::as_str)
                .unwrap_or_default()
        };
        let run_id = field("run_id");
        self.append(run_id, &describe(event_type, data));
    }
}

fn short_id(run_id: &str) -> &str {
    if run_id.is_empty() {
        "-"
    } else {
        run_id.get(..8).unwrap_or(run_id)
    }
}

fn describe(event_type: &str, data: Option<&Value>) -> String {
    let text = |key: &str| {
        data.and_then(|d| d.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let number = |key: &str| data.and_then(|d| d.get(key)).and_then(Value::as_u64).unwrap_or(0);
    let position = format!("[{}/{}] {}", number("ordinal"), number("total"), text("stage"));

    match event_type {
        PIPELINE_STARTED => format!("Provisioning started ({} stages)", number("total")),
        PIPELINE_COMPLETED => format!(
            "Provisioning completed: {} run, {} skipped",
            number("executed"),
            number("skipped")
        ),
        PIPELINE_FAILED => format!(
            "Provisioning FAILED at stage '{}': {}",
            text("stage"),
            text("error")
        ),
        STAGE_STARTED => format!("{position}: started"),
        STAGE_COMPLETED => {
            let changed = data
                .and_then(|d| d.get("artifacts"))
                .and_then(Value::as_array)
                .map_or(0, |a| a.iter().filter(|r| r["changed"] == Value::Bool(true)).count());
            format!("{position}: completed ({changed} artifacts changed)")
        }
        STAGE_SKIPPED => format!("{position}: skipped ({})", text("reason")),
        STAGE_FAILED => format!("{position}: FAILED: {}", text("error")),
        other => match data {
            Some(d) => format!("{other} {d}"),
            None => other.to_string(),
        },
    }
}

#[async_trait]
impl EventSink for RunLog {
    async fn emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }

    fn try_emit(&self, event_type: &str, data: Option<Value>) {
        self.record(event_type, data.as_ref());
    }
}
