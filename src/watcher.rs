//! File watcher for continuous rebuilds
//!
//! Implements the `watch` command with:
//! - Change routing: five glob rules, each re-running exactly one task
//! - Debouncing (100ms), coalescing duplicate events per task
//! - Graceful Ctrl+C shutdown
//! - NDJSON output for CI

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::channel;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use notify::{Config as NotifyConfig, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::server::ReloadHub;
use crate::tasks::{run_task, Task};

/// Debounce duration in milliseconds
const DEBOUNCE_MS: u64 = 100;

/// Change patterns (gitignore glob semantics, relative to the source root)
/// and the task each one re-runs. Video is intentionally unwatched.
pub const WATCH_RULES: [(&str, Task); 5] = [
    ("/*.html", Task::Html),
    ("styles/**/*.scss", Task::Css),
    ("js/**/*.js", Task::Js),
    ("img/**/*.*", Task::Image),
    ("fonts/**/*.*", Task::Fonts),
];

/// Watch options
#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Project configuration (paths, pipeline settings)
    pub config: Config,
    /// Live-reload hub to notify after successful re-runs
    pub hub: Option<ReloadHub>,
}

/// Watch event types for console and NDJSON output
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Started { source: String },
    FileChanged { path: String },
    TaskStarted { task: Task },
    TaskComplete { task: Task, written: usize, skipped: usize },
    Error { message: String },
    Shutdown,
}

impl WatchEvent {
    pub fn to_json(&self) -> String {
        match self {
            WatchEvent::Started { source } => {
                format!(r#"{{"event":"started","source":"{}"}}"#, source)
            }
            WatchEvent::FileChanged { path } => {
                format!(r#"{{"event":"file_changed","path":"{}"}}"#, path)
            }
            WatchEvent::TaskStarted { task } => {
                format!(r#"{{"event":"task_started","task":"{}"}}"#, task)
            }
            WatchEvent::TaskComplete {
                task,
                written,
                skipped,
            } => {
                format!(
                    r#"{{"event":"task_complete","task":"{}","written":{},"skipped":{}}}"#,
                    task, written, skipped
                )
            }
            WatchEvent::Error { message } => {
                format!(
                    r#"{{"event":"error","message":"{}"}}"#,
                    message.replace('"', "\\\"")
                )
            }
            WatchEvent::Shutdown => r#"{"event":"shutdown"}"#.to_string(),
        }
    }
}

/// Compiled watch rules routing changed paths to tasks
pub struct TaskRouter {
    rules: Vec<(Gitignore, Task)>,
}

impl TaskRouter {
    pub fn new() -> KilnResult<Self> {
        let watch_err = |message: String| KilnError::Watch { message };

        let mut rules = Vec::new();
        for (pattern, task) in WATCH_RULES {
            let mut builder = GitignoreBuilder::new("");
            builder
                .add_line(None, pattern)
                .map_err(|e| watch_err(e.to_string()))?;
            let matcher = builder.build().map_err(|e| watch_err(e.to_string()))?;
            rules.push((matcher, task));
        }
        Ok(Self { rules })
    }

    /// Task for a changed path (relative to the source root), if any
    pub fn route(&self, relative: &Path) -> Option<Task> {
        self.rules
            .iter()
            .find(|(matcher, _)| matcher.matched(relative, false).is_ignore())
            .map(|(_, task)| *task)
    }
}

/// Watcher state for debouncing
struct WatcherState {
    pending: Vec<Task>,
    last_change: Option<Instant>,
}

impl WatcherState {
    fn new() -> Self {
        Self {
            pending: Vec::new(),
            last_change: None,
        }
    }

    fn add(&mut self, task: Task) {
        if !self.pending.contains(&task) {
            self.pending.push(task);
        }
        self.last_change = Some(Instant::now());
    }

    fn should_run(&self) -> bool {
        if let Some(last) = self.last_change {
            !self.pending.is_empty() && last.elapsed() >= Duration::from_millis(DEBOUNCE_MS)
        } else {
            false
        }
    }

    fn take(&mut self) -> Vec<Task> {
        self.last_change = None;
        std::mem::take(&mut self.pending)
    }
}

/// Start watching the source tree for changes
pub fn watch(
    options: WatchOptions,
    running: Arc<AtomicBool>,
    event_callback: impl Fn(WatchEvent),
) -> KilnResult<()> {
    let watch_err = |message: String| KilnError::Watch { message };

    let source_root = options.config.paths.source.clone();
    let canonical_root: PathBuf = source_root
        .canonicalize()
        .unwrap_or_else(|_| source_root.clone());

    let router = TaskRouter::new()?;

    event_callback(WatchEvent::Started {
        source: source_root.display().to_string(),
    });

    let (tx, rx) = channel();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                for path in event.paths {
                    let _ = tx.send(path);
                }
            }
        },
        NotifyConfig::default(),
    )
    .map_err(|e| watch_err(e.to_string()))?;

    watcher
        .watch(&source_root, RecursiveMode::Recursive)
        .map_err(|e| watch_err(e.to_string()))?;

    // Watch loop with debouncing
    let mut state = WatcherState::new();

    while running.load(Ordering::SeqCst) {
        // Check for file changes (non-blocking with timeout)
        if let Ok(path) = rx.recv_timeout(Duration::from_millis(50)) {
            if let Ok(relative) = path.strip_prefix(&canonical_root) {
                if let Some(task) = router.route(relative) {
                    event_callback(WatchEvent::FileChanged {
                        path: relative.display().to_string(),
                    });
                    state.add(task);
                }
            }
        }

        // Re-run coalesced tasks once the debounce window passes
        if state.should_run() {
            for task in state.take() {
                event_callback(WatchEvent::TaskStarted { task });
                match run_task(task, &options.config) {
                    Ok(result) => {
                        event_callback(WatchEvent::TaskComplete {
                            task,
                            written: result.written.len(),
                            skipped: result.skipped.len(),
                        });
                        if let Some(hub) = &options.hub {
                            hub.notify(task.reload());
                        }
                    }
                    Err(e) => {
                        // Pipeline failures never stop the watch loop
                        event_callback(WatchEvent::Error {
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }

    event_callback(WatchEvent::Shutdown);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[test]
    fn test_watch_event_to_json_started() {
        let event = WatchEvent::Started {
            source: "src".to_string(),
        };
        let json = event.to_json();
        assert!(json.contains("\"event\":\"started\""));
        assert!(json.contains("\"source\":\"src\""));
    }

    #[test]
    fn test_watch_event_to_json_task_complete() {
        let event = WatchEvent::TaskComplete {
            task: Task::Css,
            written: 2,
            skipped: 0,
        };
        let json = event.to_json();
        assert!(json.contains("\"event\":\"task_complete\""));
        assert!(json.contains("\"task\":\"css\""));
        assert!(json.contains("\"written\":2"));
    }

    #[test]
    fn test_watch_event_to_json_error_escapes_quotes() {
        let event = WatchEvent::Error {
            message: "bad \"input\"".to_string(),
        };
        assert!(event.to_json().contains("\\\"input\\\""));
    }

    #[test]
    fn test_router_top_level_markup_only() {
        let router = TaskRouter::new().unwrap();
        assert_eq!(router.route(Path::new("index.html")), Some(Task::Html));
        assert_eq!(router.route(Path::new("about.html")), Some(Task::Html));
        assert_eq!(router.route(Path::new("partials/nav.html")), None);
    }

    #[test]
    fn test_router_styles_any_depth() {
        let router = TaskRouter::new().unwrap();
        assert_eq!(router.route(Path::new("styles/main.scss")), Some(Task::Css));
        assert_eq!(
            router.route(Path::new("styles/blocks/button.scss")),
            Some(Task::Css)
        );
        assert_eq!(router.route(Path::new("styles/notes.txt")), None);
    }

    #[test]
    fn test_router_scripts_images_fonts() {
        let router = TaskRouter::new().unwrap();
        assert_eq!(router.route(Path::new("js/main.js")), Some(Task::Js));
        assert_eq!(router.route(Path::new("js/lib/util.js")), Some(Task::Js));
        assert_eq!(router.route(Path::new("img/logo.png")), Some(Task::Image));
        assert_eq!(
            router.route(Path::new("img/icons/x.svg")),
            Some(Task::Image)
        );
        assert_eq!(
            router.route(Path::new("fonts/body.woff2")),
            Some(Task::Fonts)
        );
    }

    #[test]
    fn test_router_ignores_unwatched_paths() {
        let router = TaskRouter::new().unwrap();
        assert_eq!(router.route(Path::new("video/clip.mp4")), None);
        assert_eq!(router.route(Path::new(".htaccess")), None);
        assert_eq!(router.route(Path::new("img/README")), None);
    }

    #[test]
    fn test_watcher_state_debouncing() {
        let mut state = WatcherState::new();

        assert!(!state.should_run());

        state.add(Task::Css);
        // Should not run immediately (debounce)
        assert!(!state.should_run());

        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 10));
        assert!(state.should_run());

        let tasks = state.take();
        assert_eq!(tasks, vec![Task::Css]);
        assert!(!state.should_run());
    }

    #[test]
    fn test_watcher_state_coalesces_tasks() {
        let mut state = WatcherState::new();
        state.add(Task::Css);
        state.add(Task::Css);
        state.add(Task::Html);

        std::thread::sleep(Duration::from_millis(DEBOUNCE_MS + 10));

        let tasks = state.take();
        assert_eq!(tasks.len(), 2);
    }

    #[test]
    fn test_watch_stops_when_not_running() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("src");
        fs::create_dir_all(&source).unwrap();

        let mut config = Config::default();
        config.paths.source = source;
        config.paths.out = dir.path().join("build");

        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let events_clone = events.clone();

        let running = Arc::new(AtomicBool::new(false)); // Stop immediately

        watch(
            WatchOptions { config, hub: None },
            running,
            |event| {
                events_clone.lock().unwrap().push(event.to_json());
            },
        )
        .unwrap();

        let captured = events.lock().unwrap();
        assert!(captured.first().unwrap().contains("started"));
        assert!(captured.last().unwrap().contains("shutdown"));
    }
}
