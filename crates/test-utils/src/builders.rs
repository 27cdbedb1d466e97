use std::collections::BTreeMap;

use buildflow::config::{
    BundleSpec, CleanSpec, ConfigFile, OutputSpec, RawConfigFile, TaskSpec, WatchGroupSpec,
};
use buildflow::types::SpawnPolicy;

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Builder for `RawConfigFile` / `ConfigFile` to simplify test setup.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    config: RawConfigFile,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(mut self, target: &str) -> Self {
        self.config.default = Some(target.to_string());
        self
    }

    pub fn with_task(mut self, name: &str, spec: TaskSpec) -> Self {
        self.config.tasks.insert(name.to_string(), spec);
        self
    }

    pub fn alias(self, name: &str, members: &[&str]) -> Self {
        self.with_task(
            name,
            TaskSpec::Alias {
                members: strings(members),
            },
        )
    }

    pub fn clean(self, name: &str, files: &[&str]) -> Self {
        self.with_task(
            name,
            TaskSpec::Clean(CleanSpec {
                files: strings(files),
                options: BTreeMap::new(),
            }),
        )
    }

    /// A plain bundle writing `files` into `dest`.
    pub fn bundle(self, name: &str, files: &[&str], dest: &str) -> Self {
        self.bundle_output(name, OutputSpec::single(strings(files), dest))
    }

    /// A bundle with one output per `(dest, files)` pair.
    pub fn bundle_targets(self, name: &str, targets: Vec<(&str, Vec<&str>)>) -> Self {
        let output = OutputSpec {
            targets: targets
                .into_iter()
                .map(|(dest, files)| (dest.to_string(), strings(&files)))
                .collect(),
            ..OutputSpec::default()
        };
        self.bundle_output(name, output)
    }

    fn bundle_output(self, name: &str, output: OutputSpec) -> Self {
        self.with_task(
            name,
            TaskSpec::Bundle(BundleSpec {
                output,
                cmd: None,
                separator: None,
                banner: None,
                options: BTreeMap::new(),
            }),
        )
    }

    pub fn with_watch(mut self, id: &str, group: WatchGroupSpec) -> Self {
        self.config.watch.insert(id.to_string(), group);
        self
    }

    /// The unvalidated configuration.
    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

/// Builder for `WatchGroupSpec`.
#[derive(Debug)]
pub struct WatchGroupBuilder {
    spec: WatchGroupSpec,
}

impl WatchGroupBuilder {
    pub fn new(files: &[&str], tasks: &[&str]) -> Self {
        Self {
            spec: WatchGroupSpec {
                files: strings(files),
                tasks: strings(tasks),
                debounce: None,
                spawn: SpawnPolicy::default(),
                use_hash: false,
            },
        }
    }

    pub fn debounce(mut self, d: &str) -> Self {
        self.spec.debounce = Some(d.to_string());
        self
    }

    pub fn spawn(mut self, policy: SpawnPolicy) -> Self {
        self.spec.spawn = policy;
        self
    }

    pub fn build(self) -> WatchGroupSpec {
        self.spec
    }
}
