use crate::harness::{stderr, stdout, CliTestHarness};

#[test]
fn test_help_lists_subcommands() {
    let h = CliTestHarness::new();
    let output = h.run(&["--help"]);
    assert!(output.status.success());

    let text = stdout(&output);
    for subcommand in ["config", "project", "module", "pull", "push", "generate", "status"] {
        assert!(
            text.contains(subcommand),
            "--help should mention '{subcommand}'.\nOutput:\n{text}"
        );
    }
}

#[test]
fn test_config_set_and_list_round_trip() {
    let h = CliTestHarness::new();

    let set = h.run(&[
        "config",
        "--project",
        "shop",
        "--set",
        "email=dev@example.com",
        "--set",
        "secret_code=hunter2",
    ]);
    assert!(
        set.status.success(),
        "config --set failed: {}",
        stderr(&set)
    );
    assert!(h.config_path().exists(), "config file should be created");

    let list = h.run(&["config", "--list"]);
    assert!(list.status.success());
    let text = stdout(&list);
    assert!(text.contains("[shop]"), "list should show the project:\n{text}");
    assert!(text.contains("dev@example.com"));
    assert!(
        !text.contains("hunter2"),
        "list must never print the secret:\n{text}"
    );

    // The secret is masked at rest too.
    let on_disk = std::fs::read_to_string(h.config_path()).unwrap();
    assert!(
        !on_disk.contains("hunter2"),
        "secret should not be stored in plaintext:\n{on_disk}"
    );
}

#[test]
fn test_config_validate_reports_missing_fields() {
    let h = CliTestHarness::new();

    let set = h.run(&["config", "--project", "shop", "--set", "email=dev@example.com"]);
    assert!(set.status.success(), "{}", stderr(&set));

    let validate = h.run(&["config", "--validate"]);
    assert!(validate.status.success());
    let text = stdout(&validate);
    assert!(
        text.contains("shop") && text.contains("secret_code"),
        "validate should flag the missing secret:\n{text}"
    );
}

#[test]
fn test_project_remove_is_local_only() {
    let h = CliTestHarness::new();

    let set = h.run(&["config", "--project", "shop", "--set", "email=dev@example.com"]);
    assert!(set.status.success(), "{}", stderr(&set));

    // No network involved: removal only edits the local config.
    let remove = h.run(&["project", "remove", "shop"]);
    assert!(remove.status.success(), "{}", stderr(&remove));

    let list = h.run(&["config", "--list"]);
    assert!(!stdout(&list).contains("[shop]"));
}
