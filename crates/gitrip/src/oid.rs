//! Object ids as they appear on disk and in task identifiers.

use std::fmt::{self, Debug, Display, Formatter};
use std::str::FromStr;

use thiserror::Error;

pub(crate) const OID_SIZE: usize = 20;

/// A 20-byte object id, rendered as 40 lowercase hex digits.
///
/// The tool never hashes anything itself; ids are only ever read out of
/// refs, logs, the index, and object bodies, and turned back into
/// `objects/xx/yyyy...` fetch paths.
#[derive(PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord)]
#[repr(transparent)]
pub(crate) struct Oid([u8; OID_SIZE]);

#[derive(Debug, Error)]
pub(crate) enum OidError {
    #[error("expected {OID_SIZE} object id bytes, got {0}")]
    Length(usize),
    #[error("object id is not lowercase hex")]
    NotHex,
}

impl Oid {
    pub(crate) fn from_bytes(bytes: &[u8]) -> Result<Self, OidError> {
        let raw: [u8; OID_SIZE] = bytes.try_into().map_err(|_| OidError::Length(bytes.len()))?;
        Ok(Self(raw))
    }

    pub(crate) fn as_bytes(&self) -> &[u8; OID_SIZE] {
        &self.0
    }

    /// The repository-relative loose object path for this id.
    pub(crate) fn loose_path(&self) -> String {
        let hex = self.to_string();
        format!(".git/objects/{}/{}", &hex[..2], &hex[2..])
    }
}

impl FromStr for Oid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != OID_SIZE * 2 {
            return Err(OidError::Length(s.len() / 2));
        }
        if !s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
            return Err(OidError::NotHex);
        }
        let mut raw = [0u8; OID_SIZE];
        hex::decode_to_slice(s, &mut raw).map_err(|_| OidError::NotHex)?;
        Ok(Self(raw))
    }
}

impl Display for Oid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl Debug for Oid {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Display::fmt(self, f)
    }
}
