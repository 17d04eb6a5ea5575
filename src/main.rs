//! Kiln CLI - static-site asset pipeline
//!
//! Usage: kiln [COMMAND]
//!
//! Commands:
//!   build      Run every pipeline task
//!   webserver  Serve the output tree with live reload
//!   watch      Re-run tasks when source files change
//!   clean      Delete the output tree
//!
//! Without a command, kiln runs `default`: build, then webserver + watch.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use kiln::tasks::{self, BuildReport, Task};
use kiln::watcher::{watch, WatchEvent, WatchOptions};
use kiln::{Config, PipelineResult, ReloadHub, ServerOptions};

/// Kiln - static-site asset pipeline
#[derive(Parser, Debug)]
#[command(name = "kiln")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Output NDJSON events for CI
    #[arg(long, default_value = "false")]
    json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Project location arguments shared by every command
#[derive(Args, Debug, Clone)]
struct ProjectArgs {
    /// Path to the configuration file
    #[arg(short, long, default_value = "kiln.toml")]
    config: PathBuf,

    /// Source root (overrides configuration)
    #[arg(short, long)]
    source: Option<PathBuf>,

    /// Output root (overrides configuration)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

impl Default for ProjectArgs {
    fn default() -> Self {
        Self {
            config: PathBuf::from("kiln.toml"),
            source: None,
            out: None,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Minify top-level markup into the output root
    Html {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Compile, prefix and minify the entry stylesheet
    Css {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Bundle and minify the script sources
    Js {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Recompress images into the output tree
    Image {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Incrementally copy video files
    Video {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Incrementally copy font files
    Fonts {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Copy the server-config file verbatim
    Htaccess {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Run every pipeline task
    Build {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Serve the output tree with live reload
    Webserver {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Re-run tasks when source files change
    Watch {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Build, then serve and watch together
    Default {
        #[command(flatten)]
        project: ProjectArgs,
    },

    /// Delete the output tree
    Clean {
        #[command(flatten)]
        project: ProjectArgs,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.json;

    match cli.command.unwrap_or(Commands::Default {
        project: ProjectArgs::default(),
    }) {
        Commands::Html { project } => cmd_task(Task::Html, &project, json),
        Commands::Css { project } => cmd_task(Task::Css, &project, json),
        Commands::Js { project } => cmd_task(Task::Js, &project, json),
        Commands::Image { project } => cmd_task(Task::Image, &project, json),
        Commands::Video { project } => cmd_task(Task::Video, &project, json),
        Commands::Fonts { project } => cmd_task(Task::Fonts, &project, json),
        Commands::Htaccess { project } => cmd_task(Task::Htaccess, &project, json),
        Commands::Build { project } => cmd_build(&project, json),
        Commands::Webserver { project } => cmd_webserver(&project, json),
        Commands::Watch { project } => cmd_watch(&project, json),
        Commands::Default { project } => cmd_default(&project, json),
        Commands::Clean { project } => cmd_clean(&project, json),
    }
}

/// Load configuration and apply CLI path overrides
fn load_config(project: &ProjectArgs) -> Result<Config> {
    let mut config = Config::load_or_default(&project.config)?;
    if let Some(source) = &project.source {
        config.paths.source = source.clone();
    }
    if let Some(out) = &project.out {
        config.paths.out = out.clone();
    }
    Ok(config)
}

/// Render a stylesheet failure as a notification instead of a crash
fn notify_stylesheet_failure(message: &str) {
    eprintln!();
    eprintln!("🔔 Stylesheet compilation failed");
    eprintln!("   {message}");
    eprintln!("   The rest of the build is unaffected; fix and save to retry.");
}

fn print_result(task: Task, result: &PipelineResult) {
    println!("\n📊 {} results:", task);
    if !result.written.is_empty() {
        println!("  ✓ Written: {} files", result.written.len());
        for path in &result.written {
            println!("    - {}", path);
        }
    }
    if !result.skipped.is_empty() {
        println!("  ⚠ Skipped: {} files (already up to date)", result.skipped.len());
    }
    if result.written.is_empty() && result.skipped.is_empty() {
        println!("  Nothing to do.");
    }
    println!();
}

fn task_event(task: Task, result: &PipelineResult) -> String {
    let event = serde_json::json!({
        "event": "task",
        "task": task.name(),
        "status": if result.is_success() { "success" } else { "partial" },
        "written": result.written.len(),
        "skipped": result.skipped.len(),
    });
    event.to_string()
}

fn cmd_task(task: Task, project: &ProjectArgs, json: bool) -> Result<()> {
    let config = load_config(project)?;

    if !json {
        println!("🔥 Kiln {}", task);
        println!("Source: {}", config.paths.source.display());
    }

    match tasks::run_task(task, &config) {
        Ok(result) => {
            if json {
                println!("{}", task_event(task, &result));
            } else {
                print_result(task, &result);
            }
            Ok(())
        }
        Err(e) if e.is_notification() => {
            if json {
                let event = serde_json::json!({
                    "event": "error",
                    "task": task.name(),
                    "message": e.to_string(),
                });
                println!("{}", event.to_string());
            } else {
                notify_stylesheet_failure(&e.to_string());
            }
            std::process::exit(1);
        }
        Err(e) => Err(e.into()),
    }
}

fn report_build(report: &BuildReport, json: bool) {
    if json {
        for (task, outcome) in &report.outcomes {
            match outcome {
                Ok(result) => println!("{}", task_event(*task, result)),
                Err(e) => {
                    let event = serde_json::json!({
                        "event": "error",
                        "task": task.name(),
                        "message": e.to_string(),
                    });
                    println!("{}", event.to_string());
                }
            }
        }
        let event = serde_json::json!({
            "event": "build",
            "status": if report.is_success() { "success" } else { "partial" },
            "written": report.written(),
            "skipped": report.skipped(),
            "errors": report.failures().len(),
        });
        println!("{}", event.to_string());
        return;
    }

    println!("\n📊 Build results:");
    for (task, outcome) in &report.outcomes {
        match outcome {
            Ok(result) => {
                println!(
                    "  ✓ {}: {} written, {} skipped",
                    task,
                    result.written.len(),
                    result.skipped.len()
                );
            }
            Err(e) if e.is_notification() => {
                println!("  ✗ {}: compilation failed", task);
                notify_stylesheet_failure(&e.to_string());
            }
            Err(e) => {
                println!("  ✗ {}: {}", task, e);
            }
        }
    }
    println!(
        "\nSummary: {} written, {} skipped, {} failed",
        report.written(),
        report.skipped(),
        report.failures().len()
    );
}

fn cmd_build(project: &ProjectArgs, json: bool) -> Result<()> {
    let config = load_config(project)?;

    if !json {
        println!("🔥 Kiln Build");
        println!("Source: {}", config.paths.source.display());
        println!("Output: {}", config.paths.out.display());
    }

    let report = tasks::run_build(&config);
    report_build(&report, json);

    if !report.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_webserver(project: &ProjectArgs, json: bool) -> Result<()> {
    let config = load_config(project)?;

    let options = ServerOptions {
        root: config.paths.out.clone(),
        host: config.server.host.clone(),
        port: config.server.port,
    };

    if json {
        let event = serde_json::json!({
            "event": "serving",
            "root": options.root.display().to_string(),
            "host": options.host,
            "port": options.port,
        });
        println!("{}", event.to_string());
    } else {
        println!("🌐 Kiln Webserver");
        println!("Serving {} at http://{}:{}", options.root.display(), options.host, options.port);
        println!("Press Ctrl+C to stop\n");
    }

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let shutdown_tx = Mutex::new(Some(shutdown_tx));
    ctrlc::set_handler(move || {
        if let Some(tx) = shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    })
    .expect("Error setting Ctrl+C handler");

    kiln::serve(options, ReloadHub::new(), shutdown_rx)?;

    if !json {
        println!("\n👋 Shutting down...");
    }
    Ok(())
}

/// Render one watch event for the console or as NDJSON
fn print_watch_event(event: &WatchEvent, json: bool) {
    if json {
        println!("{}", event.to_json());
        return;
    }
    match event {
        WatchEvent::Started { source } => println!("👀 Watching: {}", source),
        WatchEvent::FileChanged { path } => println!("📝 Changed: {}", path),
        WatchEvent::TaskStarted { task } => println!("🔄 Running {}...", task),
        WatchEvent::TaskComplete {
            task,
            written,
            skipped,
        } => println!("✓ {}: {} written, {} skipped", task, written, skipped),
        WatchEvent::Error { message } => eprintln!("🔔 {}", message),
        WatchEvent::Shutdown => println!("\n👋 Shutting down..."),
    }
}

fn cmd_watch(project: &ProjectArgs, json: bool) -> Result<()> {
    let config = load_config(project)?;

    let running = Arc::new(AtomicBool::new(true));
    let running_clone = running.clone();

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .expect("Error setting Ctrl+C handler");

    if !json {
        println!("👀 Kiln Watch");
        println!("Source: {}", config.paths.source.display());
        println!("Press Ctrl+C to stop\n");
    }

    let options = WatchOptions { config, hub: None };
    watch(options, running, |event| print_watch_event(&event, json))?;

    Ok(())
}

fn cmd_default(project: &ProjectArgs, json: bool) -> Result<()> {
    let config = load_config(project)?;

    if !json {
        println!("🔥 Kiln");
        println!("Source: {}", config.paths.source.display());
        println!("Output: {}", config.paths.out.display());
    }

    // Build everything first so the server has content to serve
    let report = tasks::run_build(&config);
    report_build(&report, json);

    let hub = ReloadHub::new();
    let running = Arc::new(AtomicBool::new(true));

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let shutdown_tx = Mutex::new(Some(shutdown_tx));
    let running_clone = running.clone();
    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
        if let Some(tx) = shutdown_tx.lock().unwrap().take() {
            let _ = tx.send(());
        }
    })
    .expect("Error setting Ctrl+C handler");

    let watch_options = WatchOptions {
        config: config.clone(),
        hub: Some(hub.clone()),
    };
    let watch_running = running.clone();
    let watcher_handle = std::thread::spawn(move || {
        watch(watch_options, watch_running, |event| {
            print_watch_event(&event, json)
        })
    });

    let options = ServerOptions {
        root: config.paths.out.clone(),
        host: config.server.host.clone(),
        port: config.server.port,
    };
    if !json {
        println!(
            "🌐 Serving {} at http://{}:{}",
            options.root.display(),
            options.host,
            options.port
        );
        println!("Press Ctrl+C to stop\n");
    }

    let served = kiln::serve(options, hub, shutdown_rx);

    // The server is down; stop the watcher too
    running.store(false, Ordering::SeqCst);
    match watcher_handle.join() {
        Ok(watched) => watched?,
        Err(_) => eprintln!("✗ watcher thread panicked"),
    }
    served?;

    Ok(())
}

fn cmd_clean(project: &ProjectArgs, json: bool) -> Result<()> {
    let config = load_config(project)?;

    tasks::clean(&config)?;

    if json {
        let event = serde_json::json!({
            "event": "clean",
            "removed": config.paths.out.display().to_string(),
        });
        println!("{}", event.to_string());
    } else {
        println!("🧹 Kiln Clean");
        println!("✓ Removed {}", config.paths.out.display());
    }
    Ok(())
}
