//! Common test utilities for kiln integration tests.
//!
//! Provides `TestEnv`: an isolated temp project tree plus helpers to run
//! the kiln binary inside it.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// A minimal valid 2x2 RGB PNG
pub const TINY_PNG: &[u8] = &[137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 2, 0, 0, 0, 2, 8, 2, 0, 0, 0, 253, 212, 154, 115, 0, 0, 0, 18, 73, 68, 65, 84, 120, 156, 99, 56, 33, 103, 35, 119, 194, 134, 1, 66, 1, 0, 32, 162, 4, 137, 148, 14, 79, 204, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130];

/// Result of running a kiln CLI command
#[derive(Debug)]
pub struct TestResult {
    pub success: bool,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl TestResult {
    pub fn combined_output(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Isolated test environment with a temp project directory
pub struct TestEnv {
    pub project_root: TempDir,
    kiln_bin: PathBuf,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            project_root: TempDir::new().expect("Failed to create temp project"),
            kiln_bin: PathBuf::from(env!("CARGO_BIN_EXE_kiln")),
        }
    }

    /// Get path relative to the project root
    pub fn path(&self, relative: &str) -> PathBuf {
        self.project_root.path().join(relative)
    }

    /// Write a file into the project, creating parent directories
    pub fn write(&self, relative: &str, content: &str) {
        self.write_bytes(relative, content.as_bytes());
    }

    pub fn write_bytes(&self, relative: &str, content: &[u8]) {
        let full = self.path(relative);
        if let Some(parent) = full.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directories");
        }
        std::fs::write(&full, content).expect("Failed to write file");
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path(relative))
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", relative, e))
    }

    /// Run kiln in this environment from the project root
    pub fn run(&self, args: &[&str]) -> TestResult {
        self.run_from(self.project_root.path(), args)
    }

    /// Run kiln from a specific directory
    pub fn run_from(&self, cwd: &Path, args: &[&str]) -> TestResult {
        let output = Command::new(&self.kiln_bin)
            .current_dir(cwd)
            .args(args)
            .output()
            .expect("Failed to execute kiln");
        self.output_to_result(output)
    }

    fn output_to_result(&self, output: Output) -> TestResult {
        TestResult {
            success: output.status.success(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        }
    }

    /// Lay down a one-of-each source tree
    pub fn scaffold_site(&self) {
        self.write(
            "src/index.html",
            "<!DOCTYPE html><html><head><title>Site</title></head><body>\n  <h1>  Welcome  </h1>\n  <p>\n    content\n  </p>\n</body></html>\n",
        );
        self.write(
            "src/styles/main.scss",
            "$primary: #336699;\nbody {\n  color: $primary;\n  h1 { font-size: 2rem; }\n}\n",
        );
        self.write("src/vendor/jquery.min.js", "var jQuery = { fn: {} };\n");
        self.write(
            "src/js/main.js",
            "class App {\n  constructor() { this.ready = true; }\n}\nvar app = new App();\n",
        );
        self.write_bytes("src/img/pixel.png", TINY_PNG);
        self.write("src/fonts/body.woff2", "font-bytes");
        self.write("src/video/clip.mp4", "video-bytes");
        self.write("src/.htaccess", "Options -Indexes\n");
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
