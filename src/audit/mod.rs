//! Security audit sink.
//!
//! Every security component records its decisions here. Logging is strictly
//! best-effort: a failed append must never fail the operation it annotates,
//! so the sink swallows I/O errors and reports them on the `audit` tracing
//! target instead.

use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Fire-and-forget audit contract shared by all security components.
///
/// Implementations must not return errors or panic; callers treat `log` as
/// infallible.
pub trait AuditSink: Send + Sync {
    fn log(&self, level: &str, category: &str, message: &str, details: Option<&str>);
}

/// Shared handle components hold on to.
pub type SharedAudit = Arc<dyn AuditSink>;

/// Request metadata the caller may attach to a line when it has one.
///
/// The core is framework-free, so these never come from ambient state.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub user: Option<String>,
    pub ip: Option<String>,
    pub path: Option<String>,
}

/// File-backed audit log, one file per UTC calendar day.
pub struct FileAuditLog {
    dir: PathBuf,
    enabled: bool,
    // Serializes appends so concurrent writers never interleave lines.
    lock: Mutex<()>,
}

impl FileAuditLog {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>, enabled: bool) -> Self {
        Self {
            dir: dir.into(),
            enabled,
            lock: Mutex::new(()),
        }
    }

    /// Shared handle for injecting into components.
    #[must_use]
    pub fn shared(dir: impl Into<PathBuf>, enabled: bool) -> SharedAudit {
        Arc::new(Self::new(dir, enabled))
    }

    /// Append a line, enriched with request metadata when the caller has it.
    pub fn log_with(
        &self,
        context: Option<&RequestContext>,
        level: &str,
        category: &str,
        message: &str,
        details: Option<&str>,
    ) {
        if !self.enabled {
            return;
        }

        let now = Utc::now();
        let user = context
            .and_then(|ctx| ctx.user.as_deref())
            .unwrap_or("anonymous");
        let ip = context
            .and_then(|ctx| ctx.ip.as_deref())
            .unwrap_or("unknown");
        let path = context
            .and_then(|ctx| ctx.path.as_deref())
            .unwrap_or("unknown");

        let mut line = format!(
            "[{}] Level: {} | Type: {} | User: {} | IP: {} | URL: {} | Message: {}",
            now.format("%Y-%m-%d %H:%M:%S"),
            level.to_uppercase(),
            category,
            user,
            ip,
            path,
            message,
        );
        if let Some(details) = details.filter(|details| !details.trim().is_empty()) {
            line.push_str(" | Details: ");
            line.push_str(details);
        }
        line.push('\n');

        debug!(target: "audit", %category, "{}", line.trim_end());

        let file = self.dir.join(format!("log_{}.txt", now.format("%Y%m%d")));
        let guard = self.lock.lock();
        if let Err(err) = fs::create_dir_all(&self.dir)
            .and_then(|()| OpenOptions::new().create(true).append(true).open(&file))
            .and_then(|mut handle| handle.write_all(line.as_bytes()))
        {
            warn!(target: "audit", %err, "failed to append audit line");
        }
        drop(guard);
    }
}

impl AuditSink for FileAuditLog {
    fn log(&self, level: &str, category: &str, message: &str, details: Option<&str>) {
        self.log_with(None, level, category, message, details);
    }
}

/// Discards everything. Default sink for tests and embedders that wire their
/// own logging.
pub struct NullAudit;

impl NullAudit {
    #[must_use]
    pub fn shared() -> SharedAudit {
        Arc::new(Self)
    }
}

impl AuditSink for NullAudit {
    fn log(&self, _level: &str, _category: &str, _message: &str, _details: Option<&str>) {}
}

#[cfg(test)]
pub(crate) mod testing {
    use super::AuditSink;
    use std::sync::Mutex;

    /// Captures lines so tests can assert on what a component reported.
    #[derive(Default)]
    pub struct CapturingAudit {
        pub entries: Mutex<Vec<(String, String, String)>>,
    }

    impl CapturingAudit {
        pub fn messages(&self) -> Vec<String> {
            self.entries
                .lock()
                .map(|entries| entries.iter().map(|entry| entry.2.clone()).collect())
                .unwrap_or_default()
        }
    }

    impl AuditSink for CapturingAudit {
        fn log(&self, level: &str, category: &str, message: &str, _details: Option<&str>) {
            if let Ok(mut entries) = self.entries.lock() {
                entries.push((level.to_string(), category.to_string(), message.to_string()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_one_file_per_day_with_expected_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = FileAuditLog::new(dir.path(), true);

        log.log("security", "sanitize", "Dangerous script token found", Some("<script>"));
        log.log_with(
            Some(&RequestContext {
                user: Some("alice".to_string()),
                ip: Some("10.1.2.3".to_string()),
                path: Some("/api/events".to_string()),
            }),
            "INFO",
            "bearer",
            "Token admitted",
            None,
        );

        let file = dir
            .path()
            .join(format!("log_{}.txt", Utc::now().format("%Y%m%d")));
        let contents = fs::read_to_string(file).expect("audit file");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);

        assert!(lines[0].contains("Level: SECURITY | Type: sanitize"));
        assert!(lines[0].contains("User: anonymous | IP: unknown | URL: unknown"));
        assert!(lines[0].ends_with("Message: Dangerous script token found | Details: <script>"));

        assert!(lines[1].contains("User: alice | IP: 10.1.2.3 | URL: /api/events"));
        assert!(lines[1].ends_with("Message: Token admitted"));
    }

    #[test]
    fn disabled_sink_writes_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = FileAuditLog::new(dir.path(), false);
        log.log("security", "sanitize", "ignored", None);

        assert!(fs::read_dir(dir.path()).expect("dir").next().is_none());
    }

    #[test]
    fn unwritable_directory_does_not_panic() {
        let log = FileAuditLog::new("/proc/gardi-does-not-exist", true);
        log.log("security", "sanitize", "still fine", None);
    }
}
