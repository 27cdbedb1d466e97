// tests/build_scenario.rs
//
// End-to-end runs through the library entry point against a real project
// directory. The tool commands need a POSIX shell.
#![cfg(unix)]

mod common;

use buildflow::cli::{CliArgs, Command};
use buildflow::errors::BuildflowError;
use buildflow::{error_exit_code, run, RunOutcome};
use common::Project;

const FRONTEND: &str = r#"
default = "build"

[tasks.clean]
kind = "clean"
files = [".tmp/*", "dist/*"]

[tasks.compileStyles]
kind = "compile"
cmd = "mkdir -p .tmp/css && cat {inputs} > .tmp/css/style.css"
files = ["sass/**/*.scss"]

[tasks.cssmin]
kind = "minify"
files = [".tmp/css/style.css", "vendor/**/*.css"]
dest = "dist/style.min.css"
cmd = "tr -d ' '"

[tasks.bundleScripts]
kind = "bundle"
files = ["js/**/*.js", "!js/**/*.test.js"]
dest = "dist/main.js"
banner = "/* built */"

[tasks.build]
kind = "alias"
members = ["clean", "compileStyles", "cssmin", "bundleScripts"]
"#;

fn frontend(config: &str) -> Project {
    let project = Project::new(config);
    project
        .write("sass/a.scss", "a { color: red; }\n")
        .write("sass/b.scss", "b { margin: 0; }\n")
        .write("vendor/jqm/jqm.css", ".ui { x: 1; }\n")
        .write("js/main.js", "var main;")
        .write("js/lib/util.js", "var util;")
        .write("js/main.test.js", "var test;")
        .write(".tmp/stale.txt", "old");
    project
}

fn args(project: &Project, command: Option<Command>) -> CliArgs {
    CliArgs {
        config: project.config_path(),
        log_level: None,
        command,
    }
}

fn run_task(task: &str) -> Option<Command> {
    Some(Command::Run {
        task: Some(task.to_string()),
        dry_run: false,
    })
}

async fn exit_code(args: CliArgs) -> u8 {
    match run(args).await {
        Ok(outcome) => outcome.exit_code(),
        Err(err) => error_exit_code(&err),
    }
}

#[tokio::test]
async fn default_build_produces_all_outputs() {
    common::init_tracing();
    let project = frontend(FRONTEND);

    let outcome = run(args(&project, None)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Success);
    assert!(!project.exists(".tmp/stale.txt"), "clean ran first");
    assert_eq!(
        project.read(".tmp/css/style.css").unwrap(),
        "a { color: red; }\nb { margin: 0; }\n"
    );
    assert_eq!(
        project.read("dist/style.min.css").unwrap(),
        "a{color:red;}\nb{margin:0;}\n\n.ui{x:1;}\n"
    );
    assert_eq!(
        project.read("dist/main.js").unwrap(),
        "/* built */\nvar util;\nvar main;"
    );
}

#[tokio::test]
async fn rebuilding_unchanged_inputs_is_byte_identical() {
    let project = frontend(FRONTEND);

    assert_eq!(exit_code(args(&project, run_task("build"))).await, 0);
    let first = (project.read("dist/style.min.css"), project.read("dist/main.js"));

    assert_eq!(exit_code(args(&project, run_task("build"))).await, 0);
    let second = (project.read("dist/style.min.css"), project.read("dist/main.js"));

    assert_eq!(first, second);
}

#[tokio::test]
async fn compile_failure_exits_1_and_skips_later_leaves() {
    let config = FRONTEND.replace(
        "mkdir -p .tmp/css && cat {inputs} > .tmp/css/style.css",
        "echo 'sass: syntax error' >&2; exit 3",
    );
    let project = frontend(&config);

    let outcome = run(args(&project, run_task("build"))).await.unwrap();

    assert_eq!(outcome, RunOutcome::Failed);
    assert_eq!(outcome.exit_code(), 1);
    assert!(!project.exists(".tmp/stale.txt"), "clean already ran");
    assert!(!project.exists("dist/style.min.css"));
    assert!(!project.exists("dist/main.js"));
}

#[tokio::test]
async fn single_leaf_can_run_alone() {
    let project = frontend(FRONTEND);

    assert_eq!(exit_code(args(&project, run_task("bundleScripts"))).await, 0);
    assert!(project.exists("dist/main.js"));
    assert!(project.exists(".tmp/stale.txt"), "clean was not part of this run");
}

#[tokio::test]
async fn dry_run_touches_nothing() {
    let project = frontend(FRONTEND);

    let outcome = run(args(
        &project,
        Some(Command::Run {
            task: None,
            dry_run: true,
        }),
    ))
    .await
    .unwrap();

    assert_eq!(outcome, RunOutcome::Success);
    assert!(project.exists(".tmp/stale.txt"));
    assert!(!project.exists("dist"));
}

#[tokio::test]
async fn missing_default_is_skipped() {
    let config = FRONTEND.replace("default = \"build\"", "");
    let project = frontend(&config);

    let outcome = run(args(&project, None)).await.unwrap();

    assert_eq!(outcome, RunOutcome::Skipped);
    assert_eq!(outcome.exit_code(), 0);
    assert!(project.exists(".tmp/stale.txt"));
}

#[tokio::test]
async fn unknown_task_exits_2() {
    let project = frontend(FRONTEND);

    let err = run(args(&project, run_task("deploy"))).await.unwrap_err();

    assert!(matches!(err, BuildflowError::UnknownTask(ref name) if name == "deploy"));
    assert_eq!(error_exit_code(&err), 2);
}

#[tokio::test]
async fn unresolved_references_exit_2_with_every_name() {
    let config = format!(
        "{FRONTEND}\n[tasks.release]\nkind = \"alias\"\nmembers = [\"build\", \"upload\", \"notify\"]\n\n[watch.styles]\nfiles = [\"sass/**/*.scss\"]\ntasks = [\"compass\"]\n"
    );
    let project = frontend(&config);

    let err = run(args(&project, Some(Command::List))).await.unwrap_err();

    match &err {
        BuildflowError::ConfigValidation { issues } => {
            let all = issues.join("\n");
            for name in ["upload", "notify", "compass"] {
                assert!(all.contains(name), "missing {name} in {all}");
            }
        }
        other => panic!("expected ConfigValidation, got {other:?}"),
    }
    assert_eq!(error_exit_code(&err), 2);
}

#[tokio::test]
async fn broken_toml_exits_2_and_missing_file_exits_1() {
    let project = frontend("[tasks.clean\nkind = ");
    assert_eq!(exit_code(args(&project, None)).await, 2);

    let mut missing = args(&project, None);
    missing.config = project.root().join("nope/Buildflow.toml");
    assert_eq!(exit_code(missing).await, 1);
}

#[tokio::test]
async fn list_succeeds_without_running_anything() {
    let project = frontend(FRONTEND);

    assert_eq!(exit_code(args(&project, Some(Command::List))).await, 0);
    assert!(project.exists(".tmp/stale.txt"));
}
