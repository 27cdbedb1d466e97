// src/config/validate.rs

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::model::{
    ConfigFile, OutputSpec, RawConfigFile, TaskSpec, WatchGroupConfig, DEFAULT_DEBOUNCE,
};
use crate::dag::alias_cycles;
use crate::errors::{BuildflowError, Result};
use crate::fs::CompiledFileSet;
use crate::types::{parse_duration, DEFAULT_TASK};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildflowError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let watch = validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.default, raw.tasks, watch))
    }
}

/// Run every check and collect all issues before failing.
fn validate_raw_config(cfg: &RawConfigFile) -> Result<BTreeMap<String, WatchGroupConfig>> {
    let mut issues = Vec::new();

    validate_default(cfg, &mut issues);
    validate_tasks(cfg, &mut issues);
    validate_alias_cycles(cfg, &mut issues);
    let watch = validate_watch_groups(cfg, &mut issues);

    if !issues.is_empty() {
        return Err(BuildflowError::ConfigValidation { issues });
    }

    debug!(
        tasks = cfg.tasks.len(),
        watch_groups = watch.len(),
        "configuration validated"
    );
    Ok(watch)
}

fn task_exists(cfg: &RawConfigFile, name: &str) -> bool {
    cfg.tasks.contains_key(name) || (name == DEFAULT_TASK && cfg.default.is_some())
}

fn validate_default(cfg: &RawConfigFile, issues: &mut Vec<String>) {
    let Some(target) = &cfg.default else {
        return;
    };

    if cfg.tasks.contains_key(DEFAULT_TASK) {
        issues.push(format!(
            "top-level `default = \"{target}\"` conflicts with task '{DEFAULT_TASK}'"
        ));
    }
    if !cfg.tasks.contains_key(target) {
        issues.push(format!("`default` references unknown task '{target}'"));
    }
}

fn validate_tasks(cfg: &RawConfigFile, issues: &mut Vec<String>) {
    for (name, spec) in cfg.tasks.iter() {
        if let TaskSpec::Alias { members } = spec {
            if members.is_empty() {
                issues.push(format!("alias task '{name}' has no members"));
            }
            for member in members {
                if !task_exists(cfg, member) {
                    issues.push(format!(
                        "task '{name}' references unknown task '{member}' in `members`"
                    ));
                }
            }
        }

        for patterns in spec.pattern_lists() {
            if let Err(err) = CompiledFileSet::new(patterns) {
                issues.push(format!("task '{name}': {err:#}"));
            }
        }
        if let Some(output) = spec.outputs() {
            validate_outputs(name, output, issues);
        }
    }
}

fn validate_outputs(name: &str, output: &OutputSpec, issues: &mut Vec<String>) {
    match (&output.dest, output.files.is_empty()) {
        (Some(_), true) => issues.push(format!("task '{name}' has `dest` but no `files`")),
        (None, false) => issues.push(format!("task '{name}' has `files` but no `dest`")),
        _ => {}
    }
    if output.dest.is_none() && output.targets.is_empty() {
        issues.push(format!("task '{name}' declares no output (`dest` or `targets`)"));
    }
    if let Some(dest) = &output.dest {
        if output.targets.contains_key(dest) {
            issues.push(format!("task '{name}' writes '{dest}' twice"));
        }
    }
    for (dest, files) in output.targets.iter() {
        if files.is_empty() {
            issues.push(format!("task '{name}': target '{dest}' has no patterns"));
        }
    }
}

fn validate_alias_cycles(cfg: &RawConfigFile, issues: &mut Vec<String>) {
    let mut edges: Vec<(&str, Vec<&str>)> = cfg
        .tasks
        .iter()
        .map(|(name, spec)| {
            (
                name.as_str(),
                spec.members().iter().map(String::as_str).collect(),
            )
        })
        .collect();
    if let Some(target) = &cfg.default {
        edges.push((DEFAULT_TASK, vec![target.as_str()]));
    }

    for cycle in alias_cycles(edges) {
        issues.push(format!(
            "cycle detected among alias tasks: {}",
            cycle.join(", ")
        ));
    }
}

fn validate_watch_groups(
    cfg: &RawConfigFile,
    issues: &mut Vec<String>,
) -> BTreeMap<String, WatchGroupConfig> {
    let mut groups = BTreeMap::new();

    for (id, spec) in cfg.watch.iter() {
        if spec.files.is_empty() {
            issues.push(format!("watch group '{id}' has no `files` patterns"));
        }
        if spec.tasks.is_empty() {
            issues.push(format!("watch group '{id}' has no `tasks`"));
        }
        for task in spec.tasks.iter() {
            if !task_exists(cfg, task) {
                issues.push(format!(
                    "watch group '{id}' references unknown task '{task}' in `tasks`"
                ));
            }
        }
        if let Err(err) = CompiledFileSet::new(&spec.files) {
            issues.push(format!("watch group '{id}': {err:#}"));
        }

        let debounce = match spec.debounce.as_deref() {
            None => DEFAULT_DEBOUNCE,
            Some(s) => match parse_duration(s) {
                Ok(d) => d,
                Err(err) => {
                    issues.push(format!("watch group '{id}': {err}"));
                    continue;
                }
            },
        };

        groups.insert(
            id.clone(),
            WatchGroupConfig {
                files: spec.files.clone(),
                tasks: spec.tasks.clone(),
                debounce,
                spawn: spec.spawn,
                use_hash: spec.use_hash,
            },
        );
    }

    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::loader::parse_str;

    fn validate(toml: &str) -> Result<ConfigFile> {
        ConfigFile::try_from(parse_str(toml)?)
    }

    fn issues(toml: &str) -> Vec<String> {
        match validate(toml) {
            Err(BuildflowError::ConfigValidation { issues }) => issues,
            other => panic!("expected ConfigValidation, got {other:?}"),
        }
    }

    #[test]
    fn accepts_gruntfile_shaped_config() {
        let cfg = validate(
            r#"
default = "build"

[tasks.clean]
kind = "clean"
files = [".tmp/*"]

[tasks.compass]
kind = "compile"
cmd = "compass compile"
[tasks.compass.options]
sassDir = "sass"
cssDir = ".tmp/css"

[tasks.requirejs]
kind = "bundle"
files = ["js/**/*.js"]
dest = ".tmp/js/main.js"

[tasks.build]
kind = "alias"
members = ["clean", "requirejs"]

[watch.styles]
files = ["**/*.css"]
tasks = ["compass"]

[watch.scripts]
files = ["**/*.js", "!.tmp/**"]
tasks = ["build"]
spawn = "in-process"
debounce = "50ms"
"#,
        )
        .unwrap();

        assert_eq!(cfg.default_target(), Some("build"));
        assert_eq!(cfg.tasks().len(), 4);
        let styles = &cfg.watch_groups()["styles"];
        assert_eq!(styles.debounce, DEFAULT_DEBOUNCE);
        let scripts = &cfg.watch_groups()["scripts"];
        assert_eq!(scripts.debounce, std::time::Duration::from_millis(50));
        assert_eq!(scripts.spawn, crate::types::SpawnPolicy::InProcess);
    }

    #[test]
    fn reports_all_unknown_references_at_once() {
        let found = issues(
            r#"
default = "ship"

[tasks.build]
kind = "alias"
members = ["clean", "compileStyles"]

[watch.styles]
files = ["**/*.css"]
tasks = ["cssmin"]
"#,
        );
        assert_eq!(found.len(), 4, "{found:?}");
        assert!(found.iter().any(|i| i.contains("'ship'")));
        assert!(found.iter().any(|i| i.contains("'clean'")));
        assert!(found.iter().any(|i| i.contains("'compileStyles'")));
        assert!(found.iter().any(|i| i.contains("'cssmin'")));
    }

    #[test]
    fn reports_cycles_globs_and_durations() {
        let found = issues(
            r#"
[tasks.a]
kind = "alias"
members = ["b"]

[tasks.b]
kind = "alias"
members = ["a"]

[tasks.clean]
kind = "clean"
files = ["out/["]

[watch.w]
files = ["src/**"]
tasks = ["clean"]
debounce = "soon"
"#,
        );
        assert_eq!(found.len(), 3, "{found:?}");
        assert!(found.iter().any(|i| i.contains("cycle") && i.contains("a, b")));
        assert!(found.iter().any(|i| i.contains("out/[")));
        assert!(found.iter().any(|i| i.contains("soon")));
    }

    #[test]
    fn default_key_conflicts_with_task_named_default() {
        let found = issues(
            r#"
default = "x"

[tasks.x]
kind = "clean"
files = ["out/*"]

[tasks.default]
kind = "alias"
members = ["x"]
"#,
        );
        assert_eq!(found.len(), 1);
        assert!(found[0].contains("conflicts"));
    }

    #[test]
    fn watch_group_may_bind_implicit_default() {
        let cfg = validate(
            r#"
default = "clean"

[tasks.clean]
kind = "clean"
files = ["out/*"]

[watch.all]
files = ["src/**"]
tasks = ["default"]
"#,
        );
        assert!(cfg.is_ok());
    }

    #[test]
    fn missing_required_leaf_fields_fail_to_parse() {
        let err = parse_str(
            r#"
[tasks.cssmin]
kind = "minify"
files = ["a.css"]
dest = "b.css"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildflowError::TomlError(_)));
        assert!(err.is_config_error());
    }

    #[test]
    fn targets_table_declares_several_outputs() {
        let cfg = validate(
            r#"
[tasks.uglify]
kind = "minify"
cmd = "terser"

[tasks.uglify.targets]
"dist/main.js" = ["js/main.js", "js/views/**/*.js"]
"dist/admin.js" = ["js/admin/**/*.js"]
"#,
        )
        .unwrap();

        let output = cfg.tasks()["uglify"].outputs().unwrap();
        let dests: Vec<&str> = output.targets().iter().map(|(dest, _)| *dest).collect();
        assert_eq!(dests, ["dist/admin.js", "dist/main.js"]);
    }

    #[test]
    fn reports_broken_outputs() {
        let found = issues(
            r#"
[tasks.nothing]
kind = "bundle"

[tasks.orphanFiles]
kind = "bundle"
files = ["js/*.js"]

[tasks.twice]
kind = "bundle"
files = ["js/*.js"]
dest = "out.js"
[tasks.twice.targets]
"out.js" = ["lib/*.js"]
"empty.js" = []
"#,
        );
        assert_eq!(found.len(), 5, "{found:?}");
        assert!(found.iter().any(|i| i.contains("'nothing' declares no output")));
        assert!(found.iter().any(|i| i.contains("'orphanFiles' declares no output")));
        assert!(found.iter().any(|i| i.contains("'orphanFiles' has `files` but no `dest`")));
        assert!(found.iter().any(|i| i.contains("writes 'out.js' twice")));
        assert!(found.iter().any(|i| i.contains("'empty.js' has no patterns")));
    }

    #[test]
    fn overflowing_debounce_is_an_issue_not_a_panic() {
        let found = issues(
            r#"
[tasks.clean]
kind = "clean"
files = ["out/*"]

[watch.w]
files = ["src/**"]
tasks = ["clean"]
debounce = "9999999999999999h"
"#,
        );
        assert_eq!(found.len(), 1, "{found:?}");
        assert!(found[0].contains("too large"), "{found:?}");
    }
}
