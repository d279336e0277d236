//! Textual scanners that seed the object graph: ref paths, bare object
//! ids, and pack advertisements.

use std::sync::LazyLock;

use regex::Regex;

static REF_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"refs(/[a-zA-Z0-9\-\._\*]+)+").unwrap());

static HASH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|\s)([a-f0-9]{40})($|\s)").unwrap());

static PACK_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pack-([a-f0-9]{40})\.pack").unwrap());

static HEAD_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(ref:.*|[0-9a-f]{40}$)").unwrap());

/// Scan a textual body for ref paths and produce the follow-up tasks.
///
/// Every accepted ref is fetched twice: the ref itself and its reflog.
/// Globbed refs (from config fetch lines like `refs/heads/*`) are dropped.
pub(crate) fn ref_tasks(text: &str) -> Vec<String> {
    let mut tasks = Vec::new();
    for found in REF_PATTERN.find_iter(text) {
        let reference = found.as_str();
        if reference.ends_with('*') {
            continue;
        }
        tasks.push(format!(".git/{reference}"));
        tasks.push(format!(".git/logs/{reference}"));
    }
    tasks
}

/// Every whitespace-delimited 40-hex token in a ref or log file.
pub(crate) fn object_hashes(text: &str) -> Vec<String> {
    HASH_PATTERN
        .captures_iter(text)
        .map(|captures| captures[2].to_string())
        .collect()
}

/// Download tasks for every pack advertised in `objects/info/packs`.
pub(crate) fn pack_tasks(info_packs: &str) -> Vec<String> {
    let mut tasks = Vec::new();
    for captures in PACK_PATTERN.captures_iter(info_packs) {
        let sha = &captures[1];
        tasks.push(format!(".git/objects/pack/pack-{sha}.idx"));
        tasks.push(format!(".git/objects/pack/pack-{sha}.pack"));
    }
    tasks
}

/// Whether a body looks like a `HEAD` file: a `ref:` pointer or a bare
/// 40-hex id, surrounding whitespace ignored.
pub(crate) fn is_head_like(body: &str) -> bool {
    HEAD_PATTERN.is_match(body.trim())
}
