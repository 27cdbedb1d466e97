// src/config/model.rs

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Deserialize;

use crate::dag::TaskOptions;
use crate::types::{SpawnPolicy, TaskName};

/// Debounce applied to watch groups that do not set one.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// default = "build"
///
/// [tasks.clean]
/// kind = "clean"
/// files = [".tmp/*"]
///
/// [tasks.build]
/// kind = "alias"
/// members = ["clean", "compileStyles", "bundleScripts"]
///
/// [watch.styles]
/// files = ["**/*.css"]
/// tasks = ["compileStyles", "cssmin"]
/// debounce = "250ms"
/// spawn = "in-process"
/// ```
///
/// All sections are optional.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    /// Target of the implicit `default` alias.
    #[serde(default)]
    pub default: Option<TaskName>,

    /// All tasks from `[tasks.<name>]`.
    #[serde(default)]
    pub tasks: BTreeMap<TaskName, TaskSpec>,

    /// All watch groups from `[watch.<id>]`.
    #[serde(default)]
    pub watch: BTreeMap<String, WatchGroupSpec>,
}

/// `[tasks.<name>]` section, tagged by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TaskSpec {
    Alias { members: Vec<TaskName> },
    Clean(CleanSpec),
    Compile(CompileSpec),
    Minify(MinifySpec),
    Bundle(BundleSpec),
}

impl TaskSpec {
    /// Alias members; empty for leaf specs.
    pub fn members(&self) -> &[TaskName] {
        match self {
            TaskSpec::Alias { members } => members,
            _ => &[],
        }
    }

    /// Every pattern list of a leaf spec: `files`, then each target's
    /// sources. Empty for aliases.
    pub fn pattern_lists(&self) -> Vec<&[String]> {
        match self {
            TaskSpec::Alias { .. } => Vec::new(),
            TaskSpec::Clean(s) => vec![s.files.as_slice()],
            TaskSpec::Compile(s) => vec![s.files.as_slice()],
            TaskSpec::Minify(s) => s.output.pattern_lists(),
            TaskSpec::Bundle(s) => s.output.pattern_lists(),
        }
    }

    /// Output files of a `minify` or `bundle` spec.
    pub fn outputs(&self) -> Option<&OutputSpec> {
        match self {
            TaskSpec::Minify(s) => Some(&s.output),
            TaskSpec::Bundle(s) => Some(&s.output),
            _ => None,
        }
    }

    pub fn options(&self) -> TaskOptions {
        match self {
            TaskSpec::Alias { .. } => TaskOptions::new(),
            TaskSpec::Clean(s) => s.options.clone(),
            TaskSpec::Compile(s) => s.options.clone(),
            TaskSpec::Minify(s) => s.options.clone(),
            TaskSpec::Bundle(s) => s.options.clone(),
        }
    }
}

/// `kind = "clean"`: delete everything matching `files`.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanSpec {
    pub files: Vec<String>,
    #[serde(default)]
    pub options: TaskOptions,
}

/// `kind = "compile"`: run `cmd` through the shell.
#[derive(Debug, Clone, Deserialize)]
pub struct CompileSpec {
    pub cmd: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub options: TaskOptions,
}

/// Where `minify` and `bundle` write.
///
/// Either a single `dest` fed by `files`, or a `targets` table mapping each
/// output to its own patterns, or both:
///
/// ```toml
/// [tasks.uglify.targets]
/// "dist/main.js" = ["js/main.js", "js/views/**/*.js"]
/// "dist/admin.js" = ["js/admin/**/*.js"]
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputSpec {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub dest: Option<String>,
    #[serde(default)]
    pub targets: BTreeMap<String, Vec<String>>,
}

impl OutputSpec {
    pub fn single(files: Vec<String>, dest: impl Into<String>) -> Self {
        Self {
            files,
            dest: Some(dest.into()),
            targets: BTreeMap::new(),
        }
    }

    /// `(dest, patterns)` pairs: `dest` first, then `targets` by path.
    pub fn targets(&self) -> Vec<(&str, &[String])> {
        let mut out = Vec::with_capacity(self.targets.len() + 1);
        if let Some(dest) = &self.dest {
            out.push((dest.as_str(), self.files.as_slice()));
        }
        for (dest, files) in self.targets.iter() {
            out.push((dest.as_str(), files.as_slice()));
        }
        out
    }

    fn pattern_lists(&self) -> Vec<&[String]> {
        std::iter::once(self.files.as_slice())
            .chain(self.targets.values().map(Vec::as_slice))
            .collect()
    }
}

/// `kind = "minify"`: join each target's sources through the `cmd` filter.
#[derive(Debug, Clone, Deserialize)]
pub struct MinifySpec {
    #[serde(flatten)]
    pub output: OutputSpec,
    pub cmd: String,
    #[serde(default)]
    pub options: TaskOptions,
}

/// `kind = "bundle"`: join each target's sources.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleSpec {
    #[serde(flatten)]
    pub output: OutputSpec,
    #[serde(default)]
    pub cmd: Option<String>,
    #[serde(default)]
    pub separator: Option<String>,
    #[serde(default)]
    pub banner: Option<String>,
    #[serde(default)]
    pub options: TaskOptions,
}

/// `[watch.<id>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchGroupSpec {
    /// Glob patterns (relative to the config directory) to monitor.
    pub files: Vec<String>,

    /// Tasks to run, in order, when a change is detected.
    pub tasks: Vec<TaskName>,

    /// Debounce window as a duration string (`"250ms"`, `"1s"`).
    #[serde(default)]
    pub debounce: Option<String>,

    /// `"new-process"` (default) or `"in-process"`.
    #[serde(default)]
    pub spawn: SpawnPolicy,

    /// Skip triggers when the watched files' contents did not change.
    #[serde(default)]
    pub use_hash: bool,
}

/// A watch group after validation, with its debounce parsed.
#[derive(Debug, Clone)]
pub struct WatchGroupConfig {
    pub files: Vec<String>,
    pub tasks: Vec<TaskName>,
    pub debounce: Duration,
    pub spawn: SpawnPolicy,
    pub use_hash: bool,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>` (see `validate.rs`), so
/// every task reference in it is known to resolve and alias graphs are
/// acyclic.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    default: Option<TaskName>,
    tasks: BTreeMap<TaskName, TaskSpec>,
    watch: BTreeMap<String, WatchGroupConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        default: Option<TaskName>,
        tasks: BTreeMap<TaskName, TaskSpec>,
        watch: BTreeMap<String, WatchGroupConfig>,
    ) -> Self {
        Self {
            default,
            tasks,
            watch,
        }
    }

    pub fn default_target(&self) -> Option<&str> {
        self.default.as_deref()
    }

    pub fn tasks(&self) -> &BTreeMap<TaskName, TaskSpec> {
        &self.tasks
    }

    pub fn watch_groups(&self) -> &BTreeMap<String, WatchGroupConfig> {
        &self.watch
    }
}
