//! Enumeration of objects delivered inside downloaded packs.
//!
//! Pack internals (index formats, delta chains) are libgit2's problem; this
//! module only asks it which objects the packs contain and what those
//! objects reference, so the crawler can skip fetching them loose.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use git2::{ObjectType, Repository};

use crate::object::{self, ObjectKind};

#[derive(Debug, Default)]
pub(crate) struct PackScan {
    /// Ids already present in a pack; the object crawler seeds these as done.
    pub(crate) packed: HashSet<String>,
    /// Ids referenced by packed objects, candidates for loose fetching.
    pub(crate) referenced: HashSet<String>,
}

/// Walk every object in the dump's packs. Every failure here is survivable:
/// a bad pack simply contributes nothing.
pub(crate) fn enumerate(output: &Path) -> PackScan {
    let mut scan = PackScan::default();

    if !has_packs(output) {
        return scan;
    }

    let repo = match Repository::open(output) {
        Ok(repo) => repo,
        Err(err) => {
            tracing::warn!("couldn't open the dump to enumerate packs: {err}");
            return scan;
        }
    };
    let odb = match repo.odb() {
        Ok(odb) => odb,
        Err(err) => {
            tracing::warn!("couldn't open the object database: {err}");
            return scan;
        }
    };

    // No loose objects have been fetched by the time this runs, so the odb
    // holds exactly the packed objects.
    let mut ids = Vec::new();
    let result = odb.foreach(|oid| {
        ids.push(*oid);
        true
    });
    if let Err(err) = result {
        tracing::warn!("pack enumeration stopped early: {err}");
    }

    for oid in ids {
        let obj = match odb.read(oid) {
            Ok(obj) => obj,
            Err(err) => {
                tracing::warn!("couldn't read packed object {oid}: {err}");
                continue;
            }
        };
        scan.packed.insert(oid.to_string());

        let kind = match obj.kind() {
            ObjectType::Commit => ObjectKind::Commit,
            ObjectType::Tree => ObjectKind::Tree,
            ObjectType::Tag => ObjectKind::Tag,
            ObjectType::Blob => continue,
            other => {
                tracing::warn!("skipping packed object {oid} of unexpected type {other}");
                continue;
            }
        };
        match object::referenced_oids(kind, obj.data()) {
            Ok(oids) => scan
                .referenced
                .extend(oids.into_iter().map(|oid| oid.to_string())),
            Err(err) => tracing::warn!("couldn't walk packed object {oid}: {err}"),
        }
    }

    scan
}

fn has_packs(output: &Path) -> bool {
    let pack_dir = output.join(".git").join("objects").join("pack");
    let Ok(entries) = fs::read_dir(pack_dir) else {
        return false;
    };
    entries.filter_map(Result::ok).any(|entry| {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        name.starts_with("pack-") && name.ends_with(".pack")
    })
}
