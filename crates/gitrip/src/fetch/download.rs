//! Plain file download: fetch a known path, keep the body, follow nothing.

use anyhow::Result;

use super::Strategy;
use crate::config::RunContext;
use crate::http::Session;
use crate::store;

pub(crate) struct Download<'a> {
    ctx: &'a RunContext,
}

impl<'a> Download<'a> {
    pub(crate) fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }
}

impl Strategy for Download<'_> {
    fn execute(&self, session: &Session, task: &str) -> Result<Vec<String>> {
        // Re-runs into a populated directory skip the network entirely.
        if store::exists(&self.ctx.output, task) {
            super::announce_skip(self.ctx, task);
            return Ok(Vec::new());
        }

        let mut response = session.get(task)?;
        super::announce_fetch(session, task, &response);

        if !super::usable(session, task, &response, false) {
            return Ok(Vec::new());
        }

        store::write_stream(&self.ctx.output, task, &mut response)?;
        Ok(Vec::new())
    }
}
