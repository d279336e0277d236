//! The phase driver: probe, common files, refs, packs, objects, checkout.
//!
//! Each phase submits its seed tasks to the queue and blocks until it
//! quiesces, so a later phase always observes every file an earlier phase
//! left on disk.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Result, anyhow, bail};
use walkdir::WalkDir;

use crate::config::RunContext;
use crate::fetch::download::Download;
use crate::fetch::mirror::Mirror;
use crate::fetch::objects::ObjectDiscovery;
use crate::fetch::refs::RefDiscovery;
use crate::http::{FetchError, Session};
use crate::validate::Reject;
use crate::{index, pack, queue, sanitize, scan, validate};

/// Well-known paths a bare webserver will happily serve even without
/// directory listings.
const COMMON_FILES: &[&str] = &[
    ".gitignore",
    ".git/COMMIT_EDITMSG",
    ".git/description",
    ".git/hooks/applypatch-msg.sample",
    ".git/hooks/commit-msg.sample",
    ".git/hooks/post-commit.sample",
    ".git/hooks/post-receive.sample",
    ".git/hooks/post-update.sample",
    ".git/hooks/pre-applypatch.sample",
    ".git/hooks/pre-commit.sample",
    ".git/hooks/pre-push.sample",
    ".git/hooks/pre-rebase.sample",
    ".git/hooks/pre-receive.sample",
    ".git/hooks/prepare-commit-msg.sample",
    ".git/hooks/update.sample",
    ".git/index",
    ".git/info/exclude",
    ".git/objects/info/packs",
];

/// Plausible ref and reflog locations to start the ref walk from, including
/// the Magit work-in-progress refs.
const REF_SEEDS: &[&str] = &[
    ".git/FETCH_HEAD",
    ".git/HEAD",
    ".git/ORIG_HEAD",
    ".git/config",
    ".git/info/refs",
    ".git/logs/HEAD",
    ".git/logs/refs/heads/master",
    ".git/logs/refs/remotes/origin/HEAD",
    ".git/logs/refs/remotes/origin/master",
    ".git/logs/refs/stash",
    ".git/packed-refs",
    ".git/refs/heads/master",
    ".git/refs/remotes/origin/HEAD",
    ".git/refs/remotes/origin/master",
    ".git/refs/stash",
    ".git/refs/wip/wtree/refs/heads/master",
    ".git/refs/wip/index/refs/heads/master",
];

/// Files the hash scanner always visits, on top of everything under
/// `refs/` and `logs/`.
const HASH_SOURCES: &[&str] = &["packed-refs", "info/refs", "FETCH_HEAD", "ORIG_HEAD"];

pub(crate) fn run(ctx: &RunContext) -> Result<()> {
    if fs::read_dir(&ctx.output)?.next().is_some() {
        tracing::warn!("destination '{}' is not empty", ctx.output.display());
    }

    let session = Session::new(ctx)?;

    // The probe decides whether there is a repository here at all, and
    // whether the server hands out listings we can mirror wholesale.
    probe_head(&session)?;
    if probe_listing(&session)? {
        anstream::println!("[-] Fetching .git recursively");
        queue::run(
            ctx,
            &Mirror::new(ctx),
            vec![".git/".to_string(), ".gitignore".to_string()],
            &HashSet::new(),
        )?;
        finish(ctx);
        return Ok(());
    }

    anstream::println!("[-] Fetching common files");
    queue::run(ctx, &Download::new(ctx), seed(COMMON_FILES), &HashSet::new())?;
    sanitize::sanitize_output(&ctx.output);

    anstream::println!("[-] Finding refs/");
    queue::run(ctx, &RefDiscovery::new(ctx), seed(REF_SEEDS), &HashSet::new())?;

    anstream::println!("[-] Finding packs");
    let pack_tasks = match fs::read_to_string(ctx.output.join(".git/objects/info/packs")) {
        Ok(info_packs) => scan::pack_tasks(&info_packs),
        Err(_) => Vec::new(),
    };
    queue::run(ctx, &Download::new(ctx), pack_tasks, &HashSet::new())?;

    anstream::println!("[-] Finding objects");
    let (objects, packed) = collect_objects(ctx);

    anstream::println!("[-] Fetching objects");
    queue::run(
        ctx,
        &ObjectDiscovery::new(ctx),
        objects.into_iter().collect(),
        &packed,
    )?;

    finish(ctx);
    Ok(())
}

fn probe_head(session: &Session) -> Result<()> {
    let response = session.get(".git/HEAD")?;
    anstream::println!(
        "[-] Testing {}/.git/HEAD [{}]",
        session.base_url(),
        response.status().as_u16()
    );

    let head_url = format!("{}/.git/HEAD", session.base_url());
    validate::verify(&response, false).map_err(|reject| match reject {
        Reject::Status(status) => anyhow::Error::new(FetchError::Http {
            url: head_url.clone(),
            status,
        }),
        other => anyhow!("{head_url} {other}"),
    })?;

    let body = response.text()?;
    if !scan::is_head_like(&body) {
        bail!("{head_url} is not a git HEAD file");
    }
    Ok(())
}

/// Whether `.git/` is served as a directory index that really lists the
/// repository (a `HEAD` entry is the tell).
fn probe_listing(session: &Session) -> Result<bool> {
    let response = session.get(".git/")?;
    anstream::println!(
        "[-] Testing {}/.git/ [{}]",
        session.base_url(),
        response.status().as_u16()
    );

    if response.status().as_u16() != 200 || !validate::is_html(&response) {
        return Ok(false);
    }
    let listing = response.text()?;
    Ok(validate::indexed_files(&listing).iter().any(|f| f == "HEAD"))
}

/// The initial object id set: every scanner hit across downloaded ref and
/// log files, every id in the index, and everything packed objects point
/// at. Returns the candidates and the already-packed set.
fn collect_objects(ctx: &RunContext) -> (HashSet<String>, HashSet<String>) {
    let git_dir = ctx.output.join(".git");
    let mut objects = HashSet::new();

    let mut files: Vec<_> = HASH_SOURCES.iter().map(|name| git_dir.join(name)).collect();
    for tree in ["refs", "logs"] {
        for entry in WalkDir::new(git_dir.join(tree))
            .into_iter()
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
        {
            files.push(entry.into_path());
        }
    }
    for path in files {
        let Ok(raw) = fs::read(&path) else { continue };
        objects.extend(scan::object_hashes(&String::from_utf8_lossy(&raw)));
    }

    if let Ok(raw) = fs::read(git_dir.join("index")) {
        match index::parse(&raw) {
            Ok(entries) => {
                objects.extend(entries.iter().map(|entry| entry.oid.to_string()));
            }
            Err(err) => tracing::warn!("couldn't parse .git/index: {err}"),
        }
    }

    let pack_scan = pack::enumerate(&ctx.output);
    objects.extend(pack_scan.referenced);

    (objects, pack_scan.packed)
}

/// Sanitize whatever config arrived, then hand over to the external git
/// client. Its exit status is deliberately ignored: a partial dump that
/// fails to check out is still a successful dump.
fn finish(ctx: &RunContext) {
    sanitize::sanitize_output(&ctx.output);

    anstream::println!("[-] Running git checkout .");
    checkout(&ctx.output);
}

fn checkout(output: &Path) {
    let result = Command::new("git")
        .args(["checkout", "."])
        .current_dir(output)
        .stderr(Stdio::null())
        .status();
    match result {
        Ok(status) if !status.success() => {
            tracing::debug!("git checkout exited with {status}");
        }
        Ok(_) => {}
        Err(err) => tracing::warn!("couldn't run git checkout: {err}"),
    }
}

fn seed(paths: &[&str]) -> Vec<String> {
    paths.iter().map(ToString::to_string).collect()
}
