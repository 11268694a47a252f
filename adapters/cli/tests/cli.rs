use std::process::Command;

fn spawn_guard(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_spawn-guard"))
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to invoke spawn-guard binary")
}

#[test]
fn check_config_accepts_defaults() {
    let output = spawn_guard(&["check-config"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "configuration OK\n");
}

#[test]
fn print_config_emits_pool_table() {
    let output = spawn_guard(&["print-config"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("[pools]"), "{stdout}");
    assert!(stdout.contains("missiles = 500"), "{stdout}");
}

#[test]
fn missing_config_file_fails_with_context() {
    let output = spawn_guard(&["--config", "/nonexistent/guard.toml", "check-config"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("/nonexistent/guard.toml"), "{stderr}");
}

#[test]
fn simulate_reports_json_without_capacity_breach() {
    let output = spawn_guard(&[
        "simulate",
        "--scenario",
        "multimissile-barrage",
        "--players",
        "2",
        "--seconds",
        "3",
        "--json",
    ]);
    assert!(output.status.success());

    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("simulate prints json");
    assert_eq!(summary["scenario"], "multimissile-barrage");
    assert_eq!(summary["passed"], true);
    for pool in summary["report"]["pools"].as_array().expect("pools array") {
        assert!(pool["peak"].as_u64() <= pool["capacity"].as_u64());
    }
}
