use std::io::Write;
use std::path::{Path, PathBuf};

use command_dispatch_core::{CommandTree, ShellCompDirective, protocol};
use command_dispatch_schema::{SchemaError, TreeDefinition, load};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DEPLOY_YAML: &str = r#"
root:
  use: deployctl
  short: Deploy services
  persistent_flags:
    - name: verbose
      shorthand: v
      kind: count
      usage: Increase verbosity
  subcommands:
    - use: deploy <service>
      short: Deploy a service
      args: { kind: exact, n: 1 }
      flags:
        - name: env
          shorthand: e
          usage: Target environment
          choices: ["dev\tDevelopment", "staging", "prod\tProduction"]
        - name: manifest
          shorthand: f
          extensions: [yaml, yml]
        - name: replicas
          kind: int
          default: "1"
        - name: tag
          kind: string_slice
        - name: dry-run
          kind: bool
        - name: force
          kind: bool
      groups:
        - mutually_exclusive: [dry-run, force]
    - use: rollback
      hidden: true
"#;

fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    let mut f = std::fs::File::create(&path).unwrap();
    f.write_all(contents.as_bytes()).unwrap();
    f.flush().unwrap();
    path
}

fn deploy_tree() -> CommandTree {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "deployctl.yaml", DEPLOY_YAML);
    load(&path).unwrap().build().unwrap()
}

fn execute(tree: &CommandTree, args: &[&str]) -> Result<String, String> {
    let mut out = Vec::new();
    tree.execute(args, &mut out).map_err(|e| e.to_string())?;
    Ok(String::from_utf8(out).unwrap())
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

#[test]
fn test_yaml_and_json_files_compile_to_the_same_tree() {
    let dir = tempfile::tempdir().unwrap();
    let yaml_path = write_file(dir.path(), "tree.yml", DEPLOY_YAML);
    let definition = load(&yaml_path).unwrap();

    let json = serde_json::to_string_pretty(&definition).unwrap();
    let json_path = write_file(dir.path(), "tree.json", &json);
    let reloaded = load(&json_path).unwrap();
    assert_eq!(reloaded, definition);

    let from_yaml = definition.build().unwrap();
    let from_json = reloaded.build().unwrap();
    assert_eq!(from_yaml.len(), from_json.len());
    assert_eq!(
        from_yaml.complete(&["deploy", "--"]).values(),
        from_json.complete(&["deploy", "--"]).values()
    );
}

#[test]
fn test_missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load(dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, SchemaError::IoError(_)));
}

#[test]
fn test_unknown_field_is_rejected_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_file(dir.path(), "bad.yaml", "root:\n  use: app\n  colour: red\n");
    assert!(matches!(load(&path).unwrap_err(), SchemaError::YamlError(_)));
}

#[test]
fn test_default_definition_is_invalid() {
    let err = TreeDefinition::default().build().unwrap_err();
    assert!(err.to_string().starts_with("invalid definition: invalid command name"));
}

// ---------------------------------------------------------------------------
// Completion
// ---------------------------------------------------------------------------

#[test]
fn test_hidden_commands_are_not_offered() {
    let tree = deploy_tree();
    let outcome = tree.complete(&[""]);
    assert_eq!(outcome.values(), vec!["completion", "deploy", "help"]);
    assert_eq!(outcome.directive, ShellCompDirective::NO_FILE_COMP);
}

#[test]
fn test_choice_descriptions_travel_over_the_protocol() {
    let tree = deploy_tree();
    let out = execute(&tree, &["__complete", "deploy", "web", "--env", ""]).unwrap();
    assert_eq!(out, "dev\tDevelopment\nstaging\nprod\tProduction\n:4\n");

    let out = execute(&tree, &["__complete_no_desc", "deploy", "web", "-e", "p"]).unwrap();
    let (completions, directive) = protocol::decode(&out).unwrap();
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0].value(), "prod");
    assert_eq!(completions[0].description(), None);
    assert_eq!(directive, ShellCompDirective::NO_FILE_COMP);
}

#[test]
fn test_extension_filter_from_definition() {
    let tree = deploy_tree();
    let out = execute(&tree, &["__complete", "deploy", "web", "-f", ""]).unwrap();
    assert_eq!(out, "yaml\nyml\n:8\n");
}

#[test]
fn test_exclusive_group_hides_the_other_member() {
    let tree = deploy_tree();
    let completion = tree.complete(&["deploy", "web", "--dry-run", "--"]);
    let values = completion.values();
    assert!(!values.contains(&"--force"));
    assert!(values.contains(&"--replicas"));
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

#[test]
fn test_leaf_echoes_changed_flags() {
    let tree = deploy_tree();
    let out = execute(
        &tree,
        &["deploy", "web", "-vv", "--tag", "a,b", "--replicas=3", "--env", "prod"],
    )
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(
        value,
        serde_json::json!({
            "command": "deployctl deploy",
            "args": ["web"],
            "flags": {"env": "prod", "replicas": 3, "tag": ["a", "b"], "verbose": 2},
        })
    );
}

#[test]
fn test_definition_constraints_reject_bad_lines() {
    let tree = deploy_tree();
    assert!(execute(&tree, &["deploy"]).is_err());
    assert!(execute(&tree, &["deploy", "web", "--dry-run", "--force"]).is_err());
    assert!(execute(&tree, &["deploy", "web", "--replicas", "many"]).is_err());
}

#[test]
fn test_completion_command_emits_scripts() {
    let tree = deploy_tree();
    let out = execute(&tree, &["completion", "bash"]).unwrap();
    assert!(out.contains("deployctl"));
    assert!(out.contains("__complete"));
}
