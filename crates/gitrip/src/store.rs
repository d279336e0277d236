//! Materializing fetched payloads under the output directory.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result, bail};

const CHUNK_SIZE: usize = 4096;

/// Resolve a repository-relative task path inside the output directory.
///
/// Task identifiers come off the wire (directory listings, refs, logs), so
/// anything that could address a parent of the output directory is refused
/// before a single directory is created.
pub(crate) fn resolve(root: &Path, task: &str) -> Result<PathBuf> {
    let relative = Path::new(task);
    for component in relative.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                bail!("refusing to write outside the output directory: `{task}`")
            }
        }
    }
    Ok(root.join(relative))
}

pub(crate) fn exists(root: &Path, task: &str) -> bool {
    resolve(root, task).map(|path| path.is_file()).unwrap_or(false)
}

/// Stream a body to `root/<task>` in 4 KiB chunks, creating intermediate
/// directories as needed. Two workers may race on directory creation;
/// `create_dir_all` treats the loser's "already exists" as success.
/// Overwriting an existing file is permitted.
pub(crate) fn write_stream(root: &Path, task: &str, body: &mut dyn Read) -> Result<()> {
    let dest = resolve(root, task)?;
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("couldn't create directory {}", parent.display()))?;
    }

    let mut file =
        File::create(&dest).with_context(|| format!("couldn't create {}", dest.display()))?;
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let n = body
            .read(&mut chunk)
            .with_context(|| format!("read failed while fetching `{task}`"))?;
        if n == 0 {
            break;
        }
        file.write_all(&chunk[..n])
            .with_context(|| format!("write failed for {}", dest.display()))?;
    }
    Ok(())
}
