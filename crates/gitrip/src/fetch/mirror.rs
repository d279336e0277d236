//! Recursive directory mirror, used when the server exposes listings.
//!
//! Directory tasks end in `/` and expand to one task per anchor in the
//! index page; everything else is written to disk. The single redirect a
//! server legitimately issues, `p` to `p/`, is followed exactly once; any
//! other redirect is a dead end.

use anyhow::Result;
use reqwest::header::LOCATION;

use super::Strategy;
use crate::config::RunContext;
use crate::http::Session;
use crate::{store, validate};

pub(crate) struct Mirror<'a> {
    ctx: &'a RunContext,
}

impl<'a> Mirror<'a> {
    pub(crate) fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }
}

impl Strategy for Mirror<'_> {
    fn execute(&self, session: &Session, task: &str) -> Result<Vec<String>> {
        if store::exists(&self.ctx.output, task) {
            super::announce_skip(self.ctx, task);
            return Ok(Vec::new());
        }

        let mut response = session.get(task)?;
        super::announce_fetch(session, task, &response);

        if matches!(response.status().as_u16(), 301 | 302) {
            let slashed = format!("{task}/");
            let follows_slash = response
                .headers()
                .get(LOCATION)
                .and_then(|location| location.to_str().ok())
                .is_some_and(|location| location.ends_with(&slashed));
            return Ok(if follows_slash { vec![slashed] } else { Vec::new() });
        }

        if task.ends_with('/') {
            if !validate::is_html(&response) {
                tracing::warn!(
                    "{}/{} did not respond with an HTML index",
                    session.base_url(),
                    task
                );
                return Ok(Vec::new());
            }
            let listing = response.text()?;
            return Ok(validate::indexed_files(&listing)
                .into_iter()
                .map(|name| format!("{task}{name}"))
                .collect());
        }

        if !super::usable(session, task, &response, false) {
            return Ok(Vec::new());
        }
        store::write_stream(&self.ctx.output, task, &mut response)?;
        Ok(Vec::new())
    }
}
