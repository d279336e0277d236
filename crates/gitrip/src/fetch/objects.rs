//! Object discovery: fetch a loose object by id, walk it, and chase every
//! id it references.
//!
//! An object already on disk (from an earlier run) skips the network but is
//! still parsed, so its children stay reachable. Cycles in the commit graph
//! are the queue's problem; this strategy happily re-emits known ids.

use std::fs;

use anyhow::{Context, Result};

use super::Strategy;
use crate::config::RunContext;
use crate::http::Session;
use crate::oid::Oid;
use crate::{object, store};

pub(crate) struct ObjectDiscovery<'a> {
    ctx: &'a RunContext,
}

impl<'a> ObjectDiscovery<'a> {
    pub(crate) fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }
}

impl Strategy for ObjectDiscovery<'_> {
    fn execute(&self, session: &Session, task: &str) -> Result<Vec<String>> {
        let oid: Oid = task
            .parse()
            .with_context(|| format!("object task `{task}` is not an object id"))?;
        let path = oid.loose_path();

        if store::exists(&self.ctx.output, &path) {
            super::announce_skip(self.ctx, &path);
        } else {
            let mut response = session.get(&path)?;
            super::announce_fetch(session, &path, &response);

            if !super::usable(session, &path, &response, false) {
                return Ok(Vec::new());
            }
            store::write_stream(&self.ctx.output, &path, &mut response)?;
        }

        let raw = fs::read(store::resolve(&self.ctx.output, &path)?)?;
        let parsed = object::parse_loose(&raw)
            .with_context(|| format!("couldn't parse object {oid}"))?;

        Ok(parsed
            .references()?
            .into_iter()
            .map(|reference| reference.to_string())
            .collect())
    }
}
