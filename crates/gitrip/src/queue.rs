//! A bounded worker pool over two channels, with coordinator-owned
//! deduplication.
//!
//! Tasks fan out to `jobs` worker threads; every executed task sends back
//! exactly one follow-up list (possibly empty), which is what makes the
//! `outstanding` accounting exact and the loop terminate for any finite
//! task graph. Cycles are broken by the seen set.

use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::thread;

use anyhow::{Context, Result};
use crossbeam_channel as chan;

use crate::config::RunContext;
use crate::fetch::Strategy;
use crate::http::Session;

/// Run `initial` tasks and everything they transitively produce through
/// `strategy`, at most once each. `already_done` ids are skipped outright.
/// Returns the final seen set.
pub(crate) fn run(
    ctx: &RunContext,
    strategy: &dyn Strategy,
    initial: Vec<String>,
    already_done: &HashSet<String>,
) -> Result<HashSet<String>> {
    let mut seen = already_done.clone();
    if initial.is_empty() {
        return Ok(seen);
    }

    // `None` is the shutdown sentinel, one per worker.
    let (pending_tx, pending_rx) = chan::unbounded::<Option<String>>();
    let (done_tx, done_rx) = chan::unbounded::<Vec<String>>();

    let mut outstanding = 0usize;
    for task in initial {
        if seen.insert(task.clone()) {
            pending_tx.send(Some(task)).context("queue closed early")?;
            outstanding += 1;
        }
    }

    thread::scope(|scope| -> Result<HashSet<String>> {
        for _ in 0..ctx.jobs.max(1) {
            let pending_rx = pending_rx.clone();
            let done_tx = done_tx.clone();
            scope.spawn(move || worker(ctx, strategy, &pending_rx, &done_tx));
        }

        while outstanding > 0 {
            let follow_ups = done_rx.recv().context("all workers exited early")?;
            outstanding -= 1;
            for task in follow_ups {
                if seen.insert(task.clone()) {
                    pending_tx.send(Some(task)).context("queue closed early")?;
                    outstanding += 1;
                }
            }
        }

        for _ in 0..ctx.jobs.max(1) {
            pending_tx.send(None).context("queue closed early")?;
        }
        Ok(seen)
    })
}

fn worker(
    ctx: &RunContext,
    strategy: &dyn Strategy,
    pending: &chan::Receiver<Option<String>>,
    done: &chan::Sender<Vec<String>>,
) {
    // One session per worker; never shared, so there is no pool contention.
    let session = match Session::new(ctx) {
        Ok(session) => Some(session),
        Err(err) => {
            tracing::error!("couldn't build an HTTP session, failing this worker's tasks: {err:#}");
            None
        }
    };

    while let Ok(Some(task)) = pending.recv() {
        let follow_ups = match &session {
            Some(session) => execute(strategy, session, &task),
            None => Vec::new(),
        };
        // The coordinator counts one result per dispatched task; a broken
        // done channel means it already bailed.
        if done.send(follow_ups).is_err() {
            return;
        }
    }
}

/// A failing or panicking task yields an empty follow-up list; it must
/// never take the whole run down or starve the coordinator of its result.
fn execute(strategy: &dyn Strategy, session: &Session, task: &str) -> Vec<String> {
    match catch_unwind(AssertUnwindSafe(|| strategy.execute(session, task))) {
        Ok(Ok(follow_ups)) => follow_ups,
        Ok(Err(err)) => {
            tracing::warn!("task `{task}` failed: {err:#}");
            Vec::new()
        }
        Err(_) => {
            tracing::error!("task `{task}` panicked");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;

    fn ctx(jobs: usize) -> RunContext {
        RunContext {
            base_url: "http://127.0.0.1:1".into(),
            output: PathBuf::from("."),
            jobs,
            retry: 1,
            timeout: Duration::from_millis(100),
            user_agent: "gitrip-test".into(),
            headers: Vec::new(),
            proxy: None,
        }
    }

    /// Counts executions and replays a scripted set of follow-ups.
    struct Scripted {
        executed: Mutex<Vec<String>>,
        follow_ups: fn(&str) -> Vec<String>,
    }

    impl Strategy for Scripted {
        fn execute(&self, _session: &Session, task: &str) -> Result<Vec<String>> {
            self.executed.lock().unwrap().push(task.to_string());
            Ok((self.follow_ups)(task))
        }
    }

    #[test]
    fn executes_each_task_exactly_once() {
        let strategy = Scripted {
            executed: Mutex::new(Vec::new()),
            // Every task re-submits the whole universe, including itself.
            follow_ups: |_| vec!["a".into(), "b".into(), "c".into()],
        };
        let seen = run(
            &ctx(4),
            &strategy,
            vec!["a".into(), "b".into(), "a".into()],
            &HashSet::new(),
        )
        .unwrap();

        let mut executed = strategy.executed.into_inner().unwrap();
        executed.sort();
        assert_eq!(executed, vec!["a", "b", "c"]);
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn already_done_tasks_are_skipped() {
        let strategy = Scripted {
            executed: Mutex::new(Vec::new()),
            follow_ups: |_| Vec::new(),
        };
        let done = HashSet::from(["a".to_string()]);
        let seen = run(
            &ctx(2),
            &strategy,
            vec!["a".into(), "b".into()],
            &done,
        )
        .unwrap();

        assert_eq!(*strategy.executed.lock().unwrap(), vec!["b"]);
        assert!(seen.contains("a") && seen.contains("b"));
    }

    #[test]
    fn empty_initial_set_returns_immediately() {
        let strategy = Scripted {
            executed: Mutex::new(Vec::new()),
            follow_ups: |_| Vec::new(),
        };
        let done = HashSet::from(["x".to_string()]);
        let seen = run(&ctx(2), &strategy, Vec::new(), &done).unwrap();
        assert_eq!(seen, done);
        assert!(strategy.executed.lock().unwrap().is_empty());
    }

    struct Exploding(AtomicUsize);

    impl Strategy for Exploding {
        fn execute(&self, _session: &Session, task: &str) -> Result<Vec<String>> {
            self.0.fetch_add(1, Ordering::SeqCst);
            match task {
                "error" => anyhow::bail!("scripted failure"),
                "panic" => panic!("scripted panic"),
                _ => Ok(Vec::new()),
            }
        }
    }

    #[test]
    fn failures_and_panics_do_not_hang_the_queue() {
        let strategy = Exploding(AtomicUsize::new(0));
        let seen = run(
            &ctx(3),
            &strategy,
            vec!["error".into(), "panic".into(), "fine".into()],
            &HashSet::new(),
        )
        .unwrap();
        assert_eq!(strategy.0.load(Ordering::SeqCst), 3);
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn deep_chains_terminate() {
        // 0 -> 1 -> ... -> 99, each step also re-submitting its predecessor.
        let strategy = Scripted {
            executed: Mutex::new(Vec::new()),
            follow_ups: |task| {
                let n: usize = task.parse().unwrap();
                if n >= 99 {
                    return Vec::new();
                }
                vec![n.saturating_sub(1).to_string(), (n + 1).to_string()]
            },
        };
        let seen = run(&ctx(4), &strategy, vec!["0".into()], &HashSet::new()).unwrap();
        assert_eq!(seen.len(), 100);
        assert_eq!(strategy.executed.lock().unwrap().len(), 100);
    }
}
