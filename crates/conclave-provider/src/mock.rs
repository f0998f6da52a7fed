//! Scripted provider pool for tests.

use crate::error::ProviderError;
use crate::pool::{ProviderPool, ProviderReply, ProviderRequest};
use async_trait::async_trait;
use conclave_types::{CouncilMember, MemberId, ProviderErrorKind};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

struct Scripted {
    outcome: Result<ProviderReply, ProviderError>,
    delay: Duration,
}

/// A provider pool that replays scripted outcomes per member.
///
/// When a member's script runs dry the pool answers with a canned reply
/// derived from the member id, so engine tests only script the paths
/// they care about.
#[derive(Default)]
pub struct MockProviderPool {
    scripts: Mutex<HashMap<MemberId, VecDeque<Scripted>>>,
    calls: Mutex<HashMap<MemberId, u32>>,
    requests: Mutex<Vec<(MemberId, ProviderRequest)>>,
}

impl MockProviderPool {
    /// Creates an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a successful reply for a member.
    pub fn script_ok(&self, member_id: &str, reply: ProviderReply) {
        self.script(member_id, Ok(reply), Duration::ZERO);
    }

    /// Queues a successful reply delivered after `delay`.
    pub fn script_ok_delayed(&self, member_id: &str, reply: ProviderReply, delay: Duration) {
        self.script(member_id, Ok(reply), delay);
    }

    /// Queues a failure of the given kind for a member.
    pub fn script_err(&self, member_id: &str, kind: ProviderErrorKind) {
        self.script(
            member_id,
            Err(ProviderError::new(kind, "scripted failure")),
            Duration::ZERO,
        );
    }

    /// Queues a failure delivered after `delay`.
    pub fn script_err_delayed(&self, member_id: &str, kind: ProviderErrorKind, delay: Duration) {
        self.script(
            member_id,
            Err(ProviderError::new(kind, "scripted failure")),
            delay,
        );
    }

    fn script(
        &self,
        member_id: &str,
        outcome: Result<ProviderReply, ProviderError>,
        delay: Duration,
    ) {
        self.scripts
            .lock()
            .entry(member_id.to_string())
            .or_default()
            .push_back(Scripted { outcome, delay });
    }

    /// How many calls a member has received.
    pub fn call_count(&self, member_id: &str) -> u32 {
        self.calls.lock().get(member_id).copied().unwrap_or(0)
    }

    /// Every request a member received, in order.
    pub fn requests_for(&self, member_id: &str) -> Vec<ProviderRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|(id, _)| id == member_id)
            .map(|(_, r)| r.clone())
            .collect()
    }

    fn canned_reply(member_id: &str) -> ProviderReply {
        ProviderReply {
            content: format!("{} response", member_id),
            prompt_tokens: 8,
            completion_tokens: 4,
            cost_usd: 0.0005,
        }
    }
}

#[async_trait]
impl ProviderPool for MockProviderPool {
    async fn complete(
        &self,
        member: &CouncilMember,
        request: &ProviderRequest,
    ) -> Result<ProviderReply, ProviderError> {
        *self.calls.lock().entry(member.id.clone()).or_insert(0) += 1;
        self.requests
            .lock()
            .push((member.id.clone(), request.clone()));

        let scripted = self
            .scripts
            .lock()
            .get_mut(&member.id)
            .and_then(|q| q.pop_front());

        match scripted {
            Some(s) => {
                if !s.delay.is_zero() {
                    tokio::time::sleep(s.delay).await;
                }
                s.outcome
            }
            None => Ok(Self::canned_reply(&member.id)),
        }
    }
}
