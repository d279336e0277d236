//! Inflating and walking loose objects.
//!
//! The walker only cares about which other objects a body mentions; it does
//! not verify that content hashes to its id, and it never rebuilds a
//! working tree. The same body walk is reused for objects read back out of
//! packs.

use std::fmt::{self, Display, Formatter};
use std::io::Read;
use std::str::FromStr;

use flate2::read::ZlibDecoder;
use thiserror::Error;

use crate::oid::{OID_SIZE, Oid};

#[derive(Debug, Error)]
pub(crate) enum ObjectError {
    #[error("couldn't inflate object: {0}")]
    Inflate(#[from] std::io::Error),
    #[error("object has no header terminator")]
    MissingHeader,
    #[error("malformed object header")]
    MalformedHeader,
    #[error("unexpected object type `{0}`")]
    UnexpectedType(String),
    #[error("truncated tree entry at byte {0}")]
    TruncatedTree(usize),
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub(crate) enum ObjectKind {
    Commit,
    Tree,
    Blob,
    Tag,
}

impl Display for ObjectKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectKind::Commit => "commit",
            ObjectKind::Tree => "tree",
            ObjectKind::Blob => "blob",
            ObjectKind::Tag => "tag",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ObjectKind {
    type Err = ObjectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "commit" => Ok(ObjectKind::Commit),
            "tree" => Ok(ObjectKind::Tree),
            "blob" => Ok(ObjectKind::Blob),
            "tag" => Ok(ObjectKind::Tag),
            _ => Err(ObjectError::UnexpectedType(s.to_string())),
        }
    }
}

#[derive(Debug)]
pub(crate) struct GitObject {
    pub(crate) kind: ObjectKind,
    pub(crate) body: Vec<u8>,
}

impl GitObject {
    /// Every object id this object points at.
    pub(crate) fn references(&self) -> Result<Vec<Oid>, ObjectError> {
        referenced_oids(self.kind, &self.body)
    }
}

/// Parse the raw bytes of a loose object file (`objects/xx/yyyy...`).
pub(crate) fn parse_loose(raw: &[u8]) -> Result<GitObject, ObjectError> {
    let mut inflated = Vec::new();
    ZlibDecoder::new(raw).read_to_end(&mut inflated)?;

    let nul = inflated
        .iter()
        .position(|&b| b == 0)
        .ok_or(ObjectError::MissingHeader)?;
    let header = std::str::from_utf8(&inflated[..nul]).map_err(|_| ObjectError::MalformedHeader)?;
    let (kind, size) = header.split_once(' ').ok_or(ObjectError::MalformedHeader)?;
    // The declared size is part of the header shape but is not trusted or
    // enforced; only parse success matters here.
    size.parse::<u64>().map_err(|_| ObjectError::MalformedHeader)?;

    Ok(GitObject {
        kind: kind.parse()?,
        body: inflated[nul + 1..].to_vec(),
    })
}

/// Walk a typed object body and collect the object ids it references:
/// a commit's tree and parents, a tag's target, every entry of a tree,
/// and nothing for a blob.
pub(crate) fn referenced_oids(kind: ObjectKind, body: &[u8]) -> Result<Vec<Oid>, ObjectError> {
    match kind {
        ObjectKind::Commit | ObjectKind::Tag => Ok(scan_header_lines(body)),
        ObjectKind::Tree => scan_tree(body),
        ObjectKind::Blob => Ok(Vec::new()),
    }
}

fn scan_header_lines(body: &[u8]) -> Vec<Oid> {
    let text = String::from_utf8_lossy(body);
    let mut oids = Vec::new();
    for line in text.lines() {
        let mut tokens = line.split_whitespace();
        if !matches!(tokens.next(), Some("tree" | "parent" | "object")) {
            continue;
        }
        // A message line can start with the same keyword; only a well-formed
        // id is a reference.
        if let Some(oid) = tokens.next().and_then(|token| token.parse().ok()) {
            oids.push(oid);
        }
    }
    oids
}

fn scan_tree(body: &[u8]) -> Result<Vec<Oid>, ObjectError> {
    let mut oids = Vec::new();
    let mut pos = 0;
    while pos < body.len() {
        // `<mode> <name>\0` followed by the raw entry id.
        let nul = body[pos..]
            .iter()
            .position(|&b| b == 0)
            .ok_or(ObjectError::TruncatedTree(pos))?;
        let id_start = pos + nul + 1;
        let id_end = id_start + OID_SIZE;
        let raw = body
            .get(id_start..id_end)
            .ok_or(ObjectError::TruncatedTree(id_start))?;
        oids.push(Oid::from_bytes(raw).map_err(|_| ObjectError::TruncatedTree(id_start))?);
        pos = id_end;
    }
    Ok(oids)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use flate2::Compression;
    use flate2::write::ZlibEncoder;
    use pretty_assertions::assert_eq;

    use super::*;

    fn deflate(kind: &str, body: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder
            .write_all(format!("{kind} {}\0", body.len()).as_bytes())
            .unwrap();
        encoder.write_all(body).unwrap();
        encoder.finish().unwrap()
    }

    const TREE: &str = "4b825dc642cb6eb9a060e54bf8d69288fbee4904";
    const PARENT: &str = "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391";

    #[test]
    fn commit_references_tree_and_parents() {
        let body = format!(
            "tree {TREE}\nparent {PARENT}\nauthor A <a@b.c> 0 +0000\n\
             committer A <a@b.c> 0 +0000\n\nparent of all bugs\n"
        );
        let object = parse_loose(&deflate("commit", body.as_bytes())).unwrap();
        assert_eq!(object.kind, ObjectKind::Commit);
        let refs = object.references().unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].to_string(), TREE);
        assert_eq!(refs[1].to_string(), PARENT);
    }

    #[test]
    fn tag_references_its_target() {
        let body = format!("object {PARENT}\ntype commit\ntag v1.0\n\nrelease\n");
        let object = parse_loose(&deflate("tag", body.as_bytes())).unwrap();
        let refs = object.references().unwrap();
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].to_string(), PARENT);
    }

    #[test]
    fn tree_references_every_entry() {
        let mut body = Vec::new();
        body.extend_from_slice(b"100644 hello.txt\0");
        body.extend_from_slice(&[0x11; OID_SIZE]);
        body.extend_from_slice(b"40000 subdir\0");
        body.extend_from_slice(&[0x22; OID_SIZE]);
        let object = parse_loose(&deflate("tree", &body)).unwrap();
        let refs = object.references().unwrap();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0], Oid::from_bytes(&[0x11; OID_SIZE]).unwrap());
        assert_eq!(refs[1], Oid::from_bytes(&[0x22; OID_SIZE]).unwrap());
    }

    #[test]
    fn blob_references_nothing() {
        let object = parse_loose(&deflate("blob", b"hello\n")).unwrap();
        assert_eq!(object.kind, ObjectKind::Blob);
        assert!(object.references().unwrap().is_empty());
    }

    #[test]
    fn unexpected_type_is_an_error() {
        let err = parse_loose(&deflate("refdelta", b"x")).unwrap_err();
        assert!(matches!(err, ObjectError::UnexpectedType(t) if t == "refdelta"));
    }

    #[test]
    fn garbage_and_truncation_are_errors() {
        assert!(matches!(
            parse_loose(b"not zlib at all"),
            Err(ObjectError::Inflate(_))
        ));

        let truncated_tree = &b"100644 hello.txt\0\x11\x11"[..];
        assert!(matches!(
            referenced_oids(ObjectKind::Tree, truncated_tree),
            Err(ObjectError::TruncatedTree(_))
        ));
    }

    #[test]
    fn message_lines_are_not_references() {
        let body = format!("tree {TREE}\n\nparent notahash in the message\ntree also-fake\n");
        let object = parse_loose(&deflate("commit", body.as_bytes())).unwrap();
        assert_eq!(object.references().unwrap().len(), 1);
    }
}
