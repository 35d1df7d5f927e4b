//! Well-known install locations

use std::cmp::Ordering;
use std::path::PathBuf;

use crate::tools::locator::ToolEnv;

/// Node version manager root: `$NVM_DIR`, else `~/.nvm`
pub fn nvm_dir(env: &ToolEnv) -> Option<PathBuf> {
    env.var("NVM_DIR")
        .map(PathBuf::from)
        .or_else(|| env.home().map(|h| h.join(".nvm")))
}

/// `<nvm>/versions/node/<highest version>/bin/<bin>`, if it exists
pub fn nvm_latest_bin(env: &ToolEnv, bin: &str) -> Option<PathBuf> {
    let versions_dir = nvm_dir(env)?.join("versions").join("node");
    let entries = std::fs::read_dir(&versions_dir).ok()?;

    let latest = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| e.file_name().into_string().ok())
        .max_by(|a, b| compare_versions(a, b))?;

    let candidate = versions_dir.join(latest).join("bin").join(bin);
    candidate.exists().then_some(candidate)
}

/// `~/bin/<name>`, if it exists
pub fn user_bin(env: &ToolEnv, name: &str) -> Option<PathBuf> {
    let candidate = env.home()?.join("bin").join(name);
    candidate.exists().then_some(candidate)
}

/// Compare version-like directory names (`v18.17.0`, `20.1.0`).
///
/// Numeric components compare numerically; ties fall back to plain string
/// order so the result is total.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    version_key(a)
        .cmp(&version_key(b))
        .then_with(|| a.cmp(b))
}

fn version_key(name: &str) -> Vec<u64> {
    name.trim_start_matches(['v', 'V'])
        .split(['.', '-', '+'])
        .map(|part| {
            let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse().unwrap_or(0)
        })
        .collect()
}
