//! Executable discovery for external build and package tools.
//!
//! Resolution walks an ordered list of resolvers, each a pure function of the
//! override, a [`ToolEnv`] snapshot and the filesystem. The first resolver that
//! yields an existing path wins; if none does, the bare tool name is returned
//! and left to the `PATH` of the spawned process.

use std::collections::HashMap;
use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use openapi_server::ToolPathInfo;
use tracing::{debug, warn};

use crate::process::{CommandSpec, ProcessRunner};
use crate::tools::well_known;

/// Where a tool path came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSource {
    Override,
    Env,
    Which,
    WellKnown,
    Fallback,
}

impl ToolSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolSource::Override => "override",
            ToolSource::Env => "env",
            ToolSource::Which => "which",
            ToolSource::WellKnown => "well-known",
            ToolSource::Fallback => "fallback",
        }
    }
}

impl fmt::Display for ToolSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the environment used for tool resolution
#[derive(Debug, Clone, Default)]
pub struct ToolEnv {
    vars: HashMap<String, String>,
    home: Option<PathBuf>,
}

impl ToolEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Capture the current process environment
    pub fn from_process() -> Self {
        let vars: HashMap<String, String> = std::env::vars().collect();
        let home = vars
            .get("HOME")
            .or_else(|| vars.get("USERPROFILE"))
            .filter(|h| !h.is_empty())
            .map(PathBuf::from);
        Self { vars, home }
    }

    pub fn with_var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.vars.insert(key.into(), value.into());
        self
    }

    pub fn with_home(mut self, home: impl Into<PathBuf>) -> Self {
        self.home = Some(home.into());
        self
    }

    /// Non-empty value of a variable
    pub fn var(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str).filter(|v| !v.is_empty())
    }

    pub fn home(&self) -> Option<&Path> {
        self.home.as_deref()
    }

    /// Directories listed in `PATH`
    pub fn path_dirs(&self) -> Vec<PathBuf> {
        self.var("PATH")
            .map(|p| std::env::split_paths(p).collect())
            .unwrap_or_default()
    }
}

/// Tool-specific well-known install locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WellKnown {
    /// Node version manager tree: `<nvm>/versions/node/<highest>/bin/<bin>`
    NodeVersionManager { bin: String },
    /// `~/bin/<name>`
    UserBin,
    None,
}

/// What to look for when resolving a tool
#[derive(Debug, Clone)]
pub struct ToolSpec {
    /// Bare command name, also the last-resort fallback
    pub name: String,
    /// Environment variable holding an explicit path
    pub env_var: String,
    /// Names tried, in order, during the `PATH` lookup
    pub search_names: Vec<String>,
    pub well_known: WellKnown,
    /// Operator-configured locations checked after the built-in well-known ones
    pub extra_paths: Vec<PathBuf>,
}

impl ToolSpec {
    pub fn new(name: &str, env_var: &str) -> Self {
        Self {
            name: name.to_string(),
            env_var: env_var.to_string(),
            search_names: vec![name.to_string()],
            well_known: WellKnown::None,
            extra_paths: Vec::new(),
        }
    }

    pub fn npm() -> Self {
        Self {
            well_known: WellKnown::NodeVersionManager { bin: "npm".to_string() },
            ..Self::new("npm", "NPM_PATH")
        }
    }

    pub fn composer(extra_paths: Vec<PathBuf>) -> Self {
        Self {
            well_known: WellKnown::UserBin,
            extra_paths,
            ..Self::new("composer", "COMPOSER_PATH")
        }
    }

    pub fn php(preferred: &str) -> Self {
        let mut search_names = vec![preferred.to_string()];
        if preferred != "php" {
            search_names.push("php".to_string());
        }
        Self {
            search_names,
            ..Self::new("php", "PHP_PATH")
        }
    }
}

/// A resolved executable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPath {
    pub name: String,
    pub resolved_path: PathBuf,
    pub source: ToolSource,
}

impl ToolPath {
    /// Path as passed to the process runner
    pub fn program(&self) -> String {
        self.resolved_path.to_string_lossy().into_owned()
    }

    pub fn is_fallback(&self) -> bool {
        self.source == ToolSource::Fallback
    }

    /// Environment overrides for running this tool.
    ///
    /// A resolved (non-fallback) tool gets its directory prepended to `PATH`
    /// so that sibling binaries (`node` next to `npm`) are found. Tools from a
    /// node version manager also get `NVM_DIR`.
    pub fn exec_env(&self, env: &ToolEnv, spec: &ToolSpec) -> Vec<(String, String)> {
        combined_exec_env(&[(self, spec)], env)
    }

    fn dir(&self) -> Option<&Path> {
        if self.is_fallback() {
            return None;
        }
        self.resolved_path.parent().filter(|d| !d.as_os_str().is_empty())
    }

    pub fn info(&self, version: Option<String>) -> ToolPathInfo {
        ToolPathInfo {
            name: self.name.clone(),
            path: self.program(),
            source: self.source.as_str().to_string(),
            version,
        }
    }
}

impl fmt::Display for ToolPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.resolved_path.display(), self.source)
    }
}

/// Environment overrides for running several tools in one process.
///
/// The directories of the resolved tools are prepended to `PATH` in the given
/// order, each once, ahead of the inherited entries.
pub fn combined_exec_env(tools: &[(&ToolPath, &ToolSpec)], env: &ToolEnv) -> Vec<(String, String)> {
    let mut vars = Vec::new();

    let mut dirs: Vec<PathBuf> = Vec::new();
    for dir in tools.iter().filter_map(|(tool, _)| tool.dir()) {
        if !dirs.iter().any(|d| d == dir) {
            dirs.push(dir.to_path_buf());
        }
    }
    if !dirs.is_empty() {
        let prepended = dirs.len();
        for dir in env.path_dirs() {
            if !dirs[..prepended].contains(&dir) {
                dirs.push(dir);
            }
        }
        if let Ok(joined) = std::env::join_paths(dirs) {
            vars.push(("PATH".to_string(), os_to_string(joined)));
        }
    }

    let uses_nvm = tools.iter().any(|(tool, spec)| {
        !tool.is_fallback() && matches!(spec.well_known, WellKnown::NodeVersionManager { .. })
    });
    if uses_nvm {
        if let Some(nvm_dir) = well_known::nvm_dir(env) {
            vars.push(("NVM_DIR".to_string(), nvm_dir.to_string_lossy().into_owned()));
        }
    }

    vars
}

fn os_to_string(value: OsString) -> String {
    value.to_string_lossy().into_owned()
}

struct Query<'a> {
    spec: &'a ToolSpec,
    override_path: Option<&'a str>,
    env: &'a ToolEnv,
}

type Resolver = fn(&Query<'_>) -> Option<PathBuf>;

const RESOLVERS: [(ToolSource, Resolver); 4] = [
    (ToolSource::Override, from_override),
    (ToolSource::Env, from_env_var),
    (ToolSource::Which, from_path_lookup),
    (ToolSource::WellKnown, from_well_known),
];

/// Resolve a tool path; never fails, the last resort is the bare name
pub fn resolve(spec: &ToolSpec, override_path: Option<&str>, env: &ToolEnv) -> ToolPath {
    let query = Query {
        spec,
        override_path: override_path.filter(|p| !p.trim().is_empty()),
        env,
    };

    for (source, resolver) in RESOLVERS {
        if let Some(path) = resolver(&query) {
            debug!("Resolved {} via {}: {}", spec.name, source, path.display());
            return ToolPath {
                name: spec.name.clone(),
                resolved_path: path,
                source,
            };
        }
    }

    debug!("{} not found, falling back to the bare command name", spec.name);
    ToolPath {
        name: spec.name.clone(),
        resolved_path: PathBuf::from(&spec.name),
        source: ToolSource::Fallback,
    }
}

fn from_override(query: &Query<'_>) -> Option<PathBuf> {
    let path = PathBuf::from(query.override_path?);
    if path.exists() {
        Some(path)
    } else {
        warn!(
            "{} override {} does not exist, ignoring it",
            query.spec.name,
            path.display()
        );
        None
    }
}

fn from_env_var(query: &Query<'_>) -> Option<PathBuf> {
    let path = PathBuf::from(query.env.var(&query.spec.env_var)?);
    if path.exists() {
        Some(path)
    } else {
        warn!(
            "{}={} does not exist, ignoring it",
            query.spec.env_var,
            path.display()
        );
        None
    }
}

fn from_path_lookup(query: &Query<'_>) -> Option<PathBuf> {
    let dirs = query.env.path_dirs();
    query
        .spec
        .search_names
        .iter()
        .find_map(|name| which_in(name, &dirs))
}

/// First executable named `name` in `dirs`
pub fn which_in(name: &str, dirs: &[PathBuf]) -> Option<PathBuf> {
    dirs.iter()
        .flat_map(|dir| candidate_names(name).into_iter().map(move |n| dir.join(n)))
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn candidate_names(name: &str) -> Vec<String> {
    ["", ".exe", ".cmd", ".bat"]
        .iter()
        .map(|ext| format!("{}{}", name, ext))
        .collect()
}

#[cfg(not(windows))]
fn candidate_names(name: &str) -> Vec<String> {
    vec![name.to_string()]
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

fn from_well_known(query: &Query<'_>) -> Option<PathBuf> {
    let builtin = match &query.spec.well_known {
        WellKnown::NodeVersionManager { bin } => well_known::nvm_latest_bin(query.env, bin),
        WellKnown::UserBin => well_known::user_bin(query.env, &query.spec.name),
        WellKnown::None => None,
    };
    builtin.or_else(|| query.spec.extra_paths.iter().find(|p| p.exists()).cloned())
}

/// Check a tool is usable by running `<command> --version`.
///
/// Returns the trimmed version string, or the error output.
pub async fn probe(runner: &dyn ProcessRunner, command: CommandSpec) -> Result<String, String> {
    let command = command.arg("--version").timeout(Duration::from_secs(30));
    let result = runner.run(&command).await;
    if result.success() {
        Ok(result.stdout.trim().lines().next().unwrap_or_default().to_string())
    } else {
        let output = result.error_output();
        Err(if output.is_empty() {
            format!("`{}` exited with code {}", command, result.exit_code)
        } else {
            output.to_string()
        })
    }
}
