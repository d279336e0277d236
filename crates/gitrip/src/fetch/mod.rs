//! Core namespace for the fetch strategies.
//!
//! The queue workers only ever see the [`Strategy`] capability; the four
//! implementations differ solely in how they interpret a response and
//! which follow-up tasks they derive from it.

use anyhow::Result;
use reqwest::blocking::Response;

use crate::config::RunContext;
use crate::http::Session;
use crate::validate;

pub(crate) mod download;
pub(crate) mod mirror;
pub(crate) mod objects;
pub(crate) mod refs;

/// A task handler: fetch (or reuse) `task` and return follow-up tasks.
///
/// Implementations are shared across worker threads; per-worker state lives
/// in the [`Session`] handed to each call.
pub(crate) trait Strategy: Sync {
    fn execute(&self, session: &Session, task: &str) -> Result<Vec<String>>;
}

/// The per-task progress line. Written as one atomic line so concurrent
/// workers do not interleave.
pub(super) fn announce_fetch(session: &Session, task: &str, response: &Response) {
    anstream::println!(
        "[-] Fetching {}/{} [{}]",
        session.base_url(),
        task,
        response.status().as_u16()
    );
}

pub(super) fn announce_skip(ctx: &RunContext, task: &str) {
    anstream::println!("[-] Already downloaded {}/{}", ctx.base_url, task);
}

/// Validate a response for on-disk content, warning and returning `false`
/// when it is rejected.
pub(super) fn usable(session: &Session, task: &str, response: &Response, html_ok: bool) -> bool {
    match validate::verify(response, html_ok) {
        Ok(()) => true,
        Err(reject) => {
            tracing::warn!("{}/{} {}", session.base_url(), task, reject);
            false
        }
    }
}
