//! Ref discovery: download a candidate ref or log file and scan its text
//! for further ref paths.
//!
//! Unlike the plain download, an existing file is re-fetched; the point of
//! this phase is the scan, not the bytes.

use anyhow::Result;

use super::Strategy;
use crate::config::RunContext;
use crate::http::Session;
use crate::{scan, store};

pub(crate) struct RefDiscovery<'a> {
    ctx: &'a RunContext,
}

impl<'a> RefDiscovery<'a> {
    pub(crate) fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }
}

impl Strategy for RefDiscovery<'_> {
    fn execute(&self, session: &Session, task: &str) -> Result<Vec<String>> {
        let response = session.get(task)?;
        super::announce_fetch(session, task, &response);

        if !super::usable(session, task, &response, false) {
            return Ok(Vec::new());
        }

        let text = response.text()?;
        store::write_stream(&self.ctx.output, task, &mut text.as_bytes())?;

        Ok(scan::ref_tasks(&text))
    }
}
