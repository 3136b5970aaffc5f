use crate::harness::{stderr, CliTestHarness};

#[test]
fn test_unknown_subcommand_fails() {
    let h = CliTestHarness::new();
    let output = h.run(&["frobnicate"]);
    assert!(!output.status.success());
}

#[test]
fn test_invalid_set_pair_is_rejected() {
    let h = CliTestHarness::new();
    let output = h.run(&["config", "--set", "no-equals-sign"]);
    assert!(!output.status.success());
    assert!(
        stderr(&output).contains("KEY=VALUE"),
        "error should name the expected shape: {}",
        stderr(&output)
    );
}

#[test]
fn test_missing_credentials_name_the_fix() {
    let h = CliTestHarness::new();
    let output = h.run(&["generate", "shop"]);
    assert!(!output.status.success());
    let text = stderr(&output);
    assert!(
        text.contains("--email") || text.contains("sitegen config"),
        "error should tell the user how to supply credentials: {text}"
    );
}

#[test]
fn test_unreachable_api_fails_gracefully() {
    let h = CliTestHarness::new();
    let output = h.run(&["status", "--session", "deadbeef"]);
    assert!(
        !output.status.success(),
        "status against an unreachable API should fail"
    );
    let text = stderr(&output);
    assert!(
        text.contains("❌"),
        "failure should be reported, not panic: {text}"
    );
}
