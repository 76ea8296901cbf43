use std::fs;
use std::path::{Path, PathBuf};
use std::process::Output;

const TREE_YAML: &str = r#"
root:
  use: kubectl
  persistent_flags:
    - name: namespace
      shorthand: n
      usage: Namespace scope
      choices: ["default\tThe default namespace", kube-system]
  subcommands:
    - use: get [resource]
      short: Display resources
      args: { kind: match_all, all: [{ kind: exact, n: 1 }, { kind: only_valid }] }
      valid_args: ["pods\tRunning pods", nodes]
      flags:
        - name: output
          shorthand: o
          choices: [json, yaml]
    - use: apply
      short: Apply a configuration
      flags:
        - name: filename
          shorthand: f
          required: true
          extensions: [yaml, yml]
"#;

fn write_tree(dir: &Path) -> PathBuf {
    let path = dir.join("kubectl.yaml");
    fs::write(&path, TREE_YAML).expect("failed to write tree definition");
    path
}

fn run(args: &[&str]) -> Output {
    std::process::Command::new(env!("CARGO_BIN_EXE_dispatch-tree"))
        .env_remove("DISPATCH_LOG")
        .env_remove("KUBECTL_COMPLETION_DESCRIPTIONS")
        .env_remove("DISPATCH_COMPLETION_DESCRIPTIONS")
        .env_remove("KUBECTL_ACTIVE_HELP")
        .env_remove("DISPATCH_ACTIVE_HELP")
        .args(args)
        .output()
        .expect("failed to run dispatch-tree")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).unwrap()
}

// ---------------------------------------------------------------------------
// complete
// ---------------------------------------------------------------------------

#[test]
fn complete_lists_subcommands() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let output = run(&["complete", "--tree", tree.to_str().unwrap()]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(
        stdout(&output),
        "apply\tApply a configuration\n\
         completion\tGenerate the autocompletion script for the specified shell\n\
         get\tDisplay resources\n\
         help\tHelp about any command\n\
         :4\n"
    );
    assert!(output.stderr.is_empty());
}

#[test]
fn complete_flag_choices_with_and_without_descriptions() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let tree = tree.to_str().unwrap();

    let output = run(&["complete", "--tree", tree, "--", "get", "-n", ""]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "default\tThe default namespace\nkube-system\n:4\n"
    );

    let output = run(&[
        "complete",
        "--tree",
        tree,
        "--no-descriptions",
        "--",
        "get",
        "-n",
        "",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "default\nkube-system\n:4\n");
}

#[test]
fn complete_required_flag_is_offered_first() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let output = run(&[
        "complete",
        "--tree",
        tree.to_str().unwrap(),
        "--no-descriptions",
        "--",
        "apply",
        "-",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "--filename\n-f\n:4\n");
}

#[test]
fn complete_env_disables_descriptions() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let output = std::process::Command::new(env!("CARGO_BIN_EXE_dispatch-tree"))
        .env("KUBECTL_COMPLETION_DESCRIPTIONS", "false")
        .args(["complete", "--tree", tree.to_str().unwrap(), "--", "get", "p"])
        .output()
        .expect("failed to run dispatch-tree");
    assert_eq!(stdout(&output), "pods\n:4\n");
}

// ---------------------------------------------------------------------------
// exec
// ---------------------------------------------------------------------------

#[test]
fn exec_prints_invocation_json() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let output = run(&[
        "exec",
        "--tree",
        tree.to_str().unwrap(),
        "--",
        "get",
        "pods",
        "-o",
        "yaml",
    ]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let value: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(value["command"], "kubectl get");
    assert_eq!(value["args"], serde_json::json!(["pods"]));
    assert_eq!(value["flags"], serde_json::json!({"output": "yaml"}));
}

#[test]
fn exec_reports_missing_required_flag() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let output = run(&["exec", "--tree", tree.to_str().unwrap(), "--", "apply"]);

    assert!(!output.status.success());
    assert_eq!(output.status.code(), Some(1));
    assert_eq!(
        stderr(&output),
        "error: required flag(s) \"filename\" not set\n"
    );
}

#[test]
fn exec_forwards_complete_requests() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let output = run(&[
        "exec",
        "--tree",
        tree.to_str().unwrap(),
        "--",
        "__complete",
        "get",
        "n",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "nodes\n:4\n");
}

// ---------------------------------------------------------------------------
// check
// ---------------------------------------------------------------------------

#[test]
fn check_prints_summary() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let output = run(&["check", "--tree", tree.to_str().unwrap()]);

    assert!(output.status.success());
    assert_eq!(
        stdout(&output),
        "Definition for 'kubectl' is valid: 3 command(s), 3 flag(s), 0 flag group(s).\n"
    );
}

#[test]
fn check_rejects_dangling_group_member() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    let json = serde_json::json!({
        "root": {
            "use": "app",
            "flags": [{ "name": "json", "kind": "bool" }],
            "groups": [{ "mutually_exclusive": ["json", "yaml"] }]
        }
    });
    fs::write(&path, serde_json::to_string_pretty(&json).unwrap()).unwrap();

    let output = run(&["check", "--tree", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    let err = stderr(&output);
    assert!(err.starts_with("error: Invalid definition"), "stderr: {err}");
    assert!(err.contains("unknown flag \"yaml\""), "stderr: {err}");
}

#[test]
fn check_missing_file_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing.yaml");
    let output = run(&["check", "--tree", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).starts_with("error: Failed to load"));
}

// ---------------------------------------------------------------------------
// script
// ---------------------------------------------------------------------------

#[test]
fn script_targets_the_program() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let tree = tree.to_str().unwrap();

    for shell in ["bash", "zsh", "fish", "powershell"] {
        let output = run(&["script", "--tree", tree, shell]);
        assert!(output.status.success(), "{shell}: {}", stderr(&output));
        let script = stdout(&output);
        assert!(script.contains("kubectl"), "{shell} script names the program");
        assert!(script.contains("__complete"), "{shell} script uses the protocol");
    }
}

#[test]
fn script_rejects_unknown_shell() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_tree(dir.path());
    let output = run(&["script", "--tree", tree.to_str().unwrap(), "tcsh"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("unsupported shell \"tcsh\""));
}
