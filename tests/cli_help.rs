use std::process::Command;

#[test]
fn test_help_lists_every_task() {
    let bin = env!("CARGO_BIN_EXE_kiln");

    let output = Command::new(bin).arg("--help").output().unwrap();

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    for task in [
        "html", "css", "js", "image", "video", "fonts", "htaccess", "build", "webserver",
        "watch", "default", "clean",
    ] {
        assert!(stdout.contains(task), "help should list '{task}':\n{stdout}");
    }
}

#[test]
fn test_unknown_command_fails() {
    let bin = env!("CARGO_BIN_EXE_kiln");

    let output = Command::new(bin).arg("deploy").output().unwrap();
    assert!(!output.status.success());
}
