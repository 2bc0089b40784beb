//! Background Jobs
//!
//! `cmd &` runs on its own thread against a copy of the runner. The table
//! tracks those threads by job id until they are waited for or reaped.

use std::collections::BTreeMap;
use std::io;
use std::thread::{self, JoinHandle};

use crate::interpreter::execution_engine::RUNNER_STACK_SIZE;

/// One background job.
#[derive(Debug)]
pub struct Job {
    pub id: u32,
    /// Rendered command line, for `jobs`
    pub command: String,
    handle: JoinHandle<i32>,
}

impl Job {
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    fn join(self) -> i32 {
        self.handle.join().unwrap_or(1)
    }
}

/// Background job table (job id -> handle).
#[derive(Debug, Default)]
pub struct JobTable {
    jobs: BTreeMap<u32, Job>,
    next_id: u32,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `task` on a new thread and register it. Ids start at 1 again
    /// once the table has been emptied.
    pub fn spawn<F>(&mut self, command: String, task: F) -> io::Result<u32>
    where
        F: FnOnce() -> i32 + Send + 'static,
    {
        if self.jobs.is_empty() {
            self.next_id = 0;
        }
        self.next_id += 1;
        let id = self.next_id;

        let handle = thread::Builder::new()
            .name(format!("job-{}", id))
            .stack_size(RUNNER_STACK_SIZE)
            .spawn(task)?;
        tracing::debug!(id, command = %command, "background job started");
        self.jobs.insert(id, Job { id, command, handle });
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.values()
    }

    /// Block until job `id` finishes. `None` if no such job exists.
    pub fn wait(&mut self, id: u32) -> Option<i32> {
        let status = self.jobs.remove(&id)?.join();
        tracing::debug!(id, status, "background job waited");
        Some(status)
    }

    /// Block until every job finishes; returns the status of the last one.
    pub fn wait_all(&mut self) -> Option<i32> {
        let mut last = None;
        while let Some((id, job)) = self.jobs.pop_first() {
            let status = job.join();
            tracing::debug!(id, status, "background job waited");
            last = Some(status);
        }
        last
    }

    /// Remove finished jobs without blocking, returning `(id, status)` pairs.
    pub fn reap(&mut self) -> Vec<(u32, i32)> {
        let done: Vec<u32> = self
            .jobs
            .values()
            .filter(|job| job.is_finished())
            .map(|job| job.id)
            .collect();
        done.into_iter()
            .filter_map(|id| {
                let status = self.jobs.remove(&id)?.join();
                tracing::debug!(id, status, "background job reaped");
                Some((id, status))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_ids_start_at_one() {
        let mut table = JobTable::new();
        let a = table.spawn("a".into(), || 0).unwrap();
        let b = table.spawn("b".into(), || 3).unwrap();
        assert_eq!((a, b), (1, 2));

        assert_eq!(table.wait(b), Some(3));
        assert_eq!(table.wait(b), None);
        assert_eq!(table.wait_all(), Some(0));
        assert!(table.is_empty());

        assert_eq!(table.spawn("c".into(), || 0).unwrap(), 1);
    }

    #[test]
    fn test_reap_only_finished() {
        let mut table = JobTable::new();
        let (tx, rx) = mpsc::channel::<()>();
        table.spawn("blocked".into(), move || {
            let _ = rx.recv();
            0
        })
        .unwrap();
        let quick = table.spawn("quick".into(), || 5).unwrap();

        while !table.iter().any(|j| j.id == quick && j.is_finished()) {
            thread::yield_now();
        }
        assert_eq!(table.reap(), vec![(quick, 5)]);
        assert_eq!(table.len(), 1);

        tx.send(()).unwrap();
        assert_eq!(table.wait_all(), Some(0));
    }
}
