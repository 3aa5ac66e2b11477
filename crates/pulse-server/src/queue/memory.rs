//! In-memory fetch queue for tests.

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use pulse_nats::stream::{DeadLetter, FetchRequest, FetchResult, PublishReceipt, Scope};

use super::FetchQueue;
use crate::{Error, Result};

#[derive(Default)]
struct State {
    seen: HashSet<String>,
    requests: Vec<FetchRequest>,
    results: Vec<FetchResult>,
    dead_letters: Vec<DeadLetter>,
    failing_scopes: HashSet<Scope>,
}

/// [`FetchQueue`] that records everything and dedupes by request id.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<State>,
    offline: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes enqueues for `scope` fail.
    pub fn fail_scope(&self, scope: Scope) {
        self.state().failing_scopes.insert(scope);
    }

    /// Makes `ping` report the queue as unreachable.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.state().requests.clone()
    }

    pub fn results(&self) -> Vec<FetchResult> {
        self.state().results.clone()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.state().dead_letters.clone()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("queue lock")
    }
}

#[async_trait]
impl FetchQueue for MemoryQueue {
    async fn enqueue(&self, request: &FetchRequest) -> Result<PublishReceipt> {
        let mut state = self.state();
        if state.failing_scopes.contains(&request.scope) {
            return Err(Error::external("nats", "publish rejected"));
        }

        let duplicate = !state.seen.insert(request.request_id.clone());
        if !duplicate {
            state.requests.push(request.clone());
        }

        Ok(PublishReceipt {
            sequence: state.requests.len() as u64,
            duplicate,
        })
    }

    async fn publish_result(&self, result: &FetchResult) -> Result<()> {
        self.state().results.push(result.clone());
        Ok(())
    }

    async fn publish_dead_letter(&self, letter: &DeadLetter) -> Result<()> {
        self.state().dead_letters.push(letter.clone());
        Ok(())
    }

    async fn ping(&self) -> bool {
        !self.offline.load(Ordering::SeqCst)
    }
}
