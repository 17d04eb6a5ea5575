//! Task registry and the composite build
//!
//! Maps the public task names onto pipeline runs. The composite build runs
//! every pipeline concurrently on scoped threads; outputs are disjoint so
//! no ordering or coordination is needed, and a failure in one task leaves
//! the others untouched.

use crate::config::Config;
use crate::error::{KilnError, KilnResult};
use crate::pipeline::{assets, html, images, scripts, styles, PipelineResult};
use crate::server::Reload;

/// A pipeline task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Task {
    Html,
    Css,
    Js,
    Image,
    Video,
    Fonts,
    Htaccess,
}

impl Task {
    /// Every pipeline task, in the order the build reports them
    pub const ALL: [Task; 7] = [
        Task::Html,
        Task::Css,
        Task::Js,
        Task::Image,
        Task::Video,
        Task::Fonts,
        Task::Htaccess,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Task::Html => "html",
            Task::Css => "css",
            Task::Js => "js",
            Task::Image => "image",
            Task::Video => "video",
            Task::Fonts => "fonts",
            Task::Htaccess => "htaccess",
        }
    }

    pub fn from_name(name: &str) -> Option<Task> {
        Task::ALL.into_iter().find(|t| t.name() == name)
    }

    /// How connected browsers should react when this task rewrites output
    ///
    /// Stylesheets hot-swap without a full refresh; everything else reloads
    /// the page.
    pub fn reload(self) -> Reload {
        match self {
            Task::Css => Reload::Styles,
            _ => Reload::Page,
        }
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Run a single pipeline task
pub fn run_task(task: Task, config: &Config) -> KilnResult<PipelineResult> {
    match task {
        Task::Html => html::run(config),
        Task::Css => styles::run(config),
        Task::Js => scripts::run(config),
        Task::Image => images::run(config),
        Task::Video => assets::run_video(config),
        Task::Fonts => assets::run_fonts(config),
        Task::Htaccess => assets::run_htaccess(config),
    }
}

/// Outcome of a composite build
#[derive(Debug)]
pub struct BuildReport {
    pub outcomes: Vec<(Task, KilnResult<PipelineResult>)>,
}

impl BuildReport {
    pub fn written(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok())
            .map(|r| r.written.len())
            .sum()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes
            .iter()
            .filter_map(|(_, r)| r.as_ref().ok())
            .map(|r| r.skipped.len())
            .sum()
    }

    pub fn failures(&self) -> Vec<(Task, &KilnError)> {
        self.outcomes
            .iter()
            .filter_map(|(task, r)| r.as_ref().err().map(|e| (*task, e)))
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(|(_, r)| r.is_ok())
    }
}

/// Run every pipeline task concurrently
pub fn run_build(config: &Config) -> BuildReport {
    let outcomes = std::thread::scope(|scope| {
        let handles: Vec<_> = Task::ALL
            .iter()
            .map(|&task| scope.spawn(move || (task, run_task(task, config))))
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join().expect("build task thread panicked"))
            .collect()
    });

    BuildReport { outcomes }
}

/// Delete the output tree
pub fn clean(config: &Config) -> KilnResult<()> {
    crate::fs::clean_dir(&config.paths.out)
}
