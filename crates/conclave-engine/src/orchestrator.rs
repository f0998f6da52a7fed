//! The request orchestrator.

use crate::deliberation::{deliberation_prompt, round_reached_consensus};
use crate::error::OrchestrationError;
use crate::metrics::OrchestrationMetrics;
use crate::traits::{MetricsSink, SessionStore};
use chrono::Utc;
use conclave_config::{ConfigStore, CouncilConfig, PresetResolver};
use conclave_provider::{call_member, ProviderPool, ProviderRequest};
use conclave_store::{IdempotencyCache, RequestRegistry};
use conclave_stream::{StreamEvent, StreamHub};
use conclave_synthesis::{looks_like_code, DevilsAdvocate, ModelRankings, Synthesizer};
use conclave_types::{
    Confidence, ConsensusDecision, CouncilMember, DeliberationRound, DeliberationThread, Exchange,
    InitialResponse, SessionContext, StoredRequest, UserRequest,
};
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Boot-time switches the engine honors.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Whether the devil's-advocate pass may run at all.
    pub devils_advocate_enabled: bool,
    /// Whether the per-request cost cap is enforced.
    pub budget_caps_enabled: bool,
}

/// Aborts a background task when dropped.
struct AbortOnDrop(tokio::task::JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Drives one request's lifecycle: dispatch → deliberation → synthesis
/// → persistence.
///
/// All I/O goes through collaborators; the orchestrator itself holds no
/// connections. One [`Orchestrator`] serves the whole process; each
/// request runs as its own task via [`Orchestrator::spawn`].
pub struct Orchestrator {
    pool: Arc<dyn ProviderPool>,
    config_store: Arc<ConfigStore>,
    presets: Arc<PresetResolver>,
    registry: Arc<RequestRegistry>,
    idempotency: Arc<IdempotencyCache>,
    hub: Arc<StreamHub>,
    sessions: Arc<dyn SessionStore>,
    metrics: Arc<dyn MetricsSink>,
    synthesizer: Synthesizer,
    advocate: DevilsAdvocate,
    options: EngineOptions,
}

impl Orchestrator {
    /// Wires an orchestrator to its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pool: Arc<dyn ProviderPool>,
        config_store: Arc<ConfigStore>,
        presets: Arc<PresetResolver>,
        registry: Arc<RequestRegistry>,
        idempotency: Arc<IdempotencyCache>,
        hub: Arc<StreamHub>,
        sessions: Arc<dyn SessionStore>,
        metrics: Arc<dyn MetricsSink>,
        rankings: Arc<ModelRankings>,
        options: EngineOptions,
    ) -> Self {
        Self {
            synthesizer: Synthesizer::new(pool.clone(), rankings),
            advocate: DevilsAdvocate::new(pool.clone()),
            pool,
            config_store,
            presets,
            registry,
            idempotency,
            hub,
            sessions,
            metrics,
            options,
        }
    }

    /// Spawns the orchestration task for a request.
    ///
    /// `idem_key` is the already-scoped idempotency key this submission
    /// claimed, if any; the task releases it on every exit path.
    pub fn spawn(self: &Arc<Self>, request: UserRequest, idem_key: Option<String>) {
        let this = self.clone();
        tokio::spawn(async move {
            this.run(request, idem_key).await;
        });
    }

    /// Runs one request to a terminal state.
    ///
    /// Panics inside orchestration convert to a `failed` record plus an
    /// idempotency error write, so no waiter hangs.
    pub async fn run(self: Arc<Self>, request: UserRequest, idem_key: Option<String>) {
        let request_id = request.id;
        let created_at = request.created_at;

        let outcome = AssertUnwindSafe(self.process(&request)).catch_unwind().await;
        match outcome {
            Ok(Ok((decision, metrics))) => {
                self.finish_success(&request, decision, metrics, idem_key)
                    .await;
            }
            Ok(Err(err)) => {
                tracing::warn!(request_id = %request_id, error = %err, "Orchestration failed");
                self.finish_failure(request_id, created_at, err.to_string(), idem_key);
            }
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(request_id = %request_id, panic = %reason, "Orchestration panicked");
                self.finish_failure(
                    request_id,
                    created_at,
                    OrchestrationError::Panicked(reason).to_string(),
                    idem_key,
                );
            }
        }
    }

    /// The orchestration algorithm itself.
    pub async fn process(
        &self,
        request: &UserRequest,
    ) -> Result<(ConsensusDecision, OrchestrationMetrics), OrchestrationError> {
        let started = Instant::now();
        let bundle = self.config_store.active_bundle()?;

        // Resolve the effective council. Preset names are validated
        // against the catalog before any store lookup.
        let (council, deliberation, synthesis) = match &request.preset {
            Some(name) => {
                let preset = self.presets.resolve(name)?;
                (preset.council, preset.deliberation, preset.synthesis)
            }
            None => (
                bundle.council.clone(),
                bundle.deliberation.clone(),
                bundle.synthesis.clone(),
            ),
        };
        council.validate()?;
        synthesis.validate()?;

        let context = if !request.context.is_empty() {
            request.context.clone()
        } else if let Some(session_id) = request.session_id {
            self.sessions.fetch_context(session_id).await
        } else {
            SessionContext::empty()
        };

        self.hub
            .publish(request.id, StreamEvent::Status("processing".to_string()));

        // Global deadline: a watchdog cancels every in-flight member
        // call; whatever responses are in hand proceed to synthesis.
        let cancel = CancellationToken::new();
        let _watchdog = AbortOnDrop({
            let cancel = cancel.clone();
            let timeout = bundle.performance.global_timeout();
            tokio::spawn(async move {
                tokio::time::sleep(timeout).await;
                cancel.cancel();
            })
        });

        // Round 0: parallel fan-out to the full council.
        let mut metrics = OrchestrationMetrics::default();
        let round0 = ProviderRequest::from_query(&request.query, &context);
        let responses = self
            .dispatch(&council.members, |_| round0.clone(), &cancel)
            .await;
        for r in &responses {
            metrics.absorb(r);
        }

        if bundle.transparency.retain_initial_responses {
            self.registry.save_responses(request.id, responses.clone());
        }

        let ok_count = responses.iter().filter(|r| r.ok).count();
        tracing::info!(
            request_id = %request.id,
            responded = ok_count,
            council = council.members.len(),
            "Initial dispatch settled"
        );
        if council.require_minimum_for_consensus && ok_count < council.minimum_size {
            return Err(OrchestrationError::InsufficientCouncil {
                returned: ok_count,
                required: council.minimum_size,
            });
        }

        // Deliberation rounds, strictly serial. Each member sees the
        // previous round in full before the next dispatch starts.
        let mut thread = DeliberationThread::new(request.id);
        let mut final_responses = responses;
        for round in 1..=deliberation.rounds {
            if cancel.is_cancelled() {
                tracing::warn!(request_id = %request.id, round = round, "Global deadline cut deliberation short");
                break;
            }
            if self.budget_exhausted(&bundle, &metrics) {
                tracing::info!(request_id = %request.id, round = round, "Cost cap reached, skipping remaining rounds");
                break;
            }

            let previous: Vec<(String, String)> = final_responses
                .iter()
                .filter(|r| r.ok)
                .map(|r| (r.member_id.clone(), r.content.clone()))
                .collect();

            let round_responses = self
                .dispatch(
                    &council.members,
                    |m| {
                        deliberation_prompt(
                            &request.query,
                            &previous,
                            &m.id,
                            round,
                            deliberation.redact_own_response,
                        )
                    },
                    &cancel,
                )
                .await;
            for r in &round_responses {
                metrics.absorb(r);
            }

            let exchanges: Vec<Exchange> = round_responses
                .iter()
                .filter(|r| r.ok)
                .map(|r| Exchange {
                    request_id: request.id,
                    round,
                    member_id: r.member_id.clone(),
                    content: r.content.clone(),
                    target_member_id: None,
                    timestamp: Utc::now(),
                })
                .collect();
            let contents: Vec<&str> = exchanges.iter().map(|e| e.content.as_str()).collect();
            let consensus =
                round_reached_consensus(&contents, deliberation.early_termination_threshold);

            for r in &round_responses {
                if r.ok {
                    if let Some(slot) = final_responses
                        .iter_mut()
                        .find(|f| f.member_id == r.member_id)
                    {
                        *slot = r.clone();
                    }
                }
            }

            thread.push_round(DeliberationRound {
                number: round,
                exchanges,
                consensus_reached: consensus,
                timestamp: Utc::now(),
            })?;
            metrics.deliberation_rounds = round;

            if consensus {
                tracing::info!(request_id = %request.id, round = round, "Early consensus, stopping deliberation");
                break;
            }
        }

        if bundle.transparency.retain_thread && !thread.rounds.is_empty() {
            self.registry.save_thread(thread.clone());
        }

        // Synthesis, then the optional critique pass.
        let decision = self
            .synthesizer
            .synthesize(
                &request.query,
                &final_responses,
                &thread,
                &synthesis.strategy,
                &council,
                &cancel,
            )
            .await?;

        let mut decision = self
            .maybe_critique(request, decision, &final_responses, &bundle, &council, &cancel)
            .await;

        // A partial council never reports more than low confidence.
        if ok_count < council.members.len() {
            decision.confidence = decision.confidence.capped_at(Confidence::Low);
        }

        metrics.duration_ms = started.elapsed().as_millis() as u64;
        Ok((decision, metrics))
    }

    fn budget_exhausted(
        &self,
        bundle: &conclave_config::ConfigBundle,
        metrics: &OrchestrationMetrics,
    ) -> bool {
        if !self.options.budget_caps_enabled {
            return false;
        }
        match bundle.performance.max_cost_usd {
            Some(cap) => metrics.total_cost_usd >= cap,
            None => false,
        }
    }

    async fn maybe_critique(
        &self,
        request: &UserRequest,
        decision: ConsensusDecision,
        responses: &[InitialResponse],
        bundle: &conclave_config::ConfigBundle,
        council: &CouncilConfig,
        cancel: &CancellationToken,
    ) -> ConsensusDecision {
        if !self.options.devils_advocate_enabled {
            return decision;
        }
        let Some(da) = bundle.devils_advocate.as_ref().filter(|da| da.enabled) else {
            return decision;
        };
        let applies = if looks_like_code(&request.query) {
            da.apply_to_code_requests
        } else {
            da.apply_to_text_requests
        };
        if !applies {
            tracing::info!(request_id = %request.id, "Devil's advocate skipped by domain gate");
            return decision;
        }

        let critic = da
            .critic_member_id
            .as_deref()
            .and_then(|id| council.member(id))
            .unwrap_or(&council.members[0]);
        self.advocate
            .synthesize_with_critique(&request.query, decision, responses, critic, cancel)
            .await
    }

    /// Fans one prompt builder out to every member in parallel; joins
    /// all outcomes before returning.
    async fn dispatch<F>(
        &self,
        members: &[CouncilMember],
        prompt_for: F,
        cancel: &CancellationToken,
    ) -> Vec<InitialResponse>
    where
        F: Fn(&CouncilMember) -> ProviderRequest,
    {
        let calls = members.iter().map(|member| {
            let request = prompt_for(member);
            async move { call_member(self.pool.as_ref(), member, &request, cancel).await }
        });
        join_all(calls).await
    }

    async fn finish_success(
        &self,
        request: &UserRequest,
        decision: ConsensusDecision,
        metrics: OrchestrationMetrics,
        idem_key: Option<String>,
    ) {
        let mut record = self
            .registry
            .fetch(request.id)
            .unwrap_or_else(|| StoredRequest::processing(request.id, request.created_at))
            .completed(decision.clone());
        record.has_deliberation = self.registry.fetch_thread(request.id).is_some();

        if let Err(err) = self.registry.save(record) {
            tracing::error!(request_id = %request.id, error = %err, "Failed to persist completion");
        }

        self.hub
            .publish(request.id, StreamEvent::Message(decision.content.clone()));
        self.hub.publish(request.id, StreamEvent::Done);

        if let Some(session_id) = request.session_id {
            self.sessions
                .append_decision(session_id, &request.query, &decision)
                .await;
        }

        self.metrics.log_cost(
            request.id,
            metrics.total_cost_usd,
            metrics.prompt_tokens,
            metrics.completion_tokens,
        );
        self.metrics.log_consensus_decision(request.id, &decision);

        if let Some(key) = idem_key {
            self.idempotency.cache_result(
                &key,
                serde_json::json!({
                    "requestId": request.id,
                    "status": "completed",
                    "createdAt": request.created_at,
                }),
            );
        }

        tracing::info!(
            request_id = %request.id,
            confidence = %decision.confidence,
            duration_ms = metrics.duration_ms,
            cost_usd = metrics.total_cost_usd,
            "Request completed"
        );
    }

    fn finish_failure(
        &self,
        request_id: Uuid,
        created_at: chrono::DateTime<Utc>,
        reason: String,
        idem_key: Option<String>,
    ) {
        let record = self
            .registry
            .fetch(request_id)
            .unwrap_or_else(|| StoredRequest::processing(request_id, created_at))
            .failed(reason.clone());
        if let Err(err) = self.registry.save(record) {
            tracing::error!(request_id = %request_id, error = %err, "Failed to persist failure");
        }

        self.hub.fail(request_id, reason.clone());

        if let Some(key) = idem_key {
            self.idempotency.cache_error(
                &key,
                serde_json::json!({
                    "requestId": request_id,
                    "status": "failed",
                    "error": reason,
                }),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{InMemorySessionStore, RecordingMetricsSink};
    use conclave_config::{
        ConfigBundle, ConfigType, DeliberationConfig, DevilsAdvocateConfig, PerformanceConfig,
        SynthesisConfig, SynthesisStrategy, TransparencyConfig,
    };
    use conclave_provider::{MockProviderPool, ProviderReply};
    use conclave_types::{ProviderErrorKind, RequestStatus, RetryPolicy};
    use std::time::Duration;

    fn member(id: &str) -> CouncilMember {
        CouncilMember {
            id: id.to_string(),
            provider: "mock".to_string(),
            model: "mock-1".to_string(),
            timeout_secs: 5,
            retry: RetryPolicy {
                max_attempts: 1,
                initial_delay_ms: 1,
                max_delay_ms: 2,
                backoff_multiplier: 2.0,
                ..RetryPolicy::default()
            },
            weight: None,
        }
    }

    fn bundle(rounds: u32) -> ConfigBundle {
        ConfigBundle {
            council: conclave_config::CouncilConfig {
                members: vec![member("m1"), member("m2"), member("m3")],
                minimum_size: 2,
                require_minimum_for_consensus: true,
            },
            deliberation: DeliberationConfig {
                rounds,
                ..Default::default()
            },
            synthesis: SynthesisConfig::default(),
            performance: PerformanceConfig::default(),
            transparency: TransparencyConfig::default(),
            devils_advocate: None,
        }
    }

    struct Harness {
        orchestrator: Arc<Orchestrator>,
        pool: Arc<MockProviderPool>,
        registry: Arc<RequestRegistry>,
        idempotency: Arc<IdempotencyCache>,
        hub: Arc<StreamHub>,
        sessions: Arc<InMemorySessionStore>,
        metrics: Arc<RecordingMetricsSink>,
    }

    fn harness_with(bundle: ConfigBundle, options: EngineOptions) -> Harness {
        harness_with_pool(Arc::new(MockProviderPool::new()), bundle, options)
    }

    fn harness_with_pool(
        pool: Arc<MockProviderPool>,
        bundle: ConfigBundle,
        options: EngineOptions,
    ) -> Harness {
        let registry = Arc::new(RequestRegistry::new());
        let idempotency = Arc::new(IdempotencyCache::new());
        let hub = Arc::new(StreamHub::new());
        let sessions = Arc::new(InMemorySessionStore::new());
        let metrics = Arc::new(RecordingMetricsSink::new());
        let config_store = Arc::new(ConfigStore::seeded(bundle).unwrap());
        let presets = Arc::new(PresetResolver::with_builtins());

        let orchestrator = Arc::new(Orchestrator::new(
            pool.clone(),
            config_store,
            presets,
            registry.clone(),
            idempotency.clone(),
            hub.clone(),
            sessions.clone(),
            metrics.clone(),
            Arc::new(ModelRankings::new()),
            options,
        ));
        Harness {
            orchestrator,
            pool,
            registry,
            idempotency,
            hub,
            sessions,
            metrics,
        }
    }

    fn reply(content: &str) -> ProviderReply {
        ProviderReply {
            content: content.to_string(),
            prompt_tokens: 10,
            completion_tokens: 5,
            cost_usd: 0.001,
        }
    }

    fn submit(query: &str) -> UserRequest {
        let mut request = UserRequest::new("alice", query).unwrap();
        request.created_at = Utc::now();
        request
    }

    fn processing_record(h: &Harness, request: &UserRequest) {
        h.registry
            .save(StoredRequest::processing(request.id, request.created_at))
            .unwrap();
    }

    #[tokio::test]
    async fn test_unanimous_council_completes_high_confidence() {
        let h = harness_with(bundle(0), EngineOptions::default());
        for m in ["m1", "m2", "m3"] {
            h.pool.script_ok(m, reply("the answer is 42"));
        }

        let request = submit("what is the answer");
        processing_record(&h, &request);
        let mut rx = h.hub.attach(request.id);

        h.orchestrator.clone().run(request.clone(), None).await;

        let record = h.registry.fetch(request.id).unwrap();
        assert_eq!(record.status, RequestStatus::Completed);
        let decision = record.decision.unwrap();
        assert_eq!(decision.content, "the answer is 42");
        assert_eq!(decision.confidence, Confidence::High);
        assert_eq!(decision.contributing_member_ids.len(), 3);

        // Stream saw status, message, done in order, then closed.
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Status("processing".into()))
        );
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Message("the answer is 42".into()))
        );
        assert_eq!(rx.recv().await, Some(StreamEvent::Done));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_partial_council_caps_confidence_low() {
        let h = harness_with(bundle(0), EngineOptions::default());
        h.pool.script_ok("m1", reply("shared answer"));
        h.pool.script_ok("m2", reply("shared answer"));
        h.pool.script_err("m3", ProviderErrorKind::Auth);

        let request = submit("q");
        processing_record(&h, &request);
        h.orchestrator.clone().run(request.clone(), None).await;

        let record = h.registry.fetch(request.id).unwrap();
        assert_eq!(record.status, RequestStatus::Completed);
        let decision = record.decision.unwrap();
        assert_eq!(decision.confidence, Confidence::Low);
        let mut contributors = decision.contributing_member_ids.clone();
        contributors.sort();
        assert_eq!(contributors, vec!["m1".to_string(), "m2".to_string()]);
    }

    #[tokio::test]
    async fn test_below_quorum_fails() {
        let h = harness_with(bundle(0), EngineOptions::default());
        h.pool.script_ok("m1", reply("alone"));
        h.pool.script_err("m2", ProviderErrorKind::Network);
        h.pool.script_err("m3", ProviderErrorKind::Overloaded);

        let request = submit("q");
        processing_record(&h, &request);
        let mut rx = h.hub.attach(request.id);

        let key = conclave_store::scoped_key("alice", "k1");
        h.idempotency
            .mark_in_progress(&key, request.id, Duration::from_secs(60));

        h.orchestrator
            .clone()
            .run(request.clone(), Some(key.clone()))
            .await;

        let record = h.registry.fetch(request.id).unwrap();
        assert_eq!(record.status, RequestStatus::Failed);
        assert!(record.error.unwrap().contains("insufficient council"));

        // Stream got the terminal error.
        assert_eq!(
            rx.recv().await,
            Some(StreamEvent::Status("processing".into()))
        );
        assert!(matches!(rx.recv().await, Some(StreamEvent::Error(_))));
        assert_eq!(rx.recv().await, None);

        // Idempotency waiters were released with the failure.
        let idem = h.idempotency.check(&key).unwrap();
        assert_eq!(idem.state, conclave_store::IdempotencyState::Failed);
    }

    #[tokio::test]
    async fn test_deliberation_early_termination() {
        let h = harness_with(bundle(3), EngineOptions::default());
        // Round 0: members disagree.
        h.pool.script_ok("m1", reply("alpha take"));
        h.pool.script_ok("m2", reply("beta take"));
        h.pool.script_ok("m3", reply("gamma take"));
        // Round 1: everyone converges.
        for m in ["m1", "m2", "m3"] {
            h.pool.script_ok(m, reply("converged answer"));
        }

        let request = submit("q");
        processing_record(&h, &request);
        h.orchestrator.clone().run(request.clone(), None).await;

        let record = h.registry.fetch(request.id).unwrap();
        assert_eq!(record.status, RequestStatus::Completed);
        assert!(record.has_deliberation);
        assert_eq!(record.decision.unwrap().content, "converged answer");

        // Only rounds 0 and 1 ran: early termination skipped rounds 2-3.
        for m in ["m1", "m2", "m3"] {
            assert_eq!(h.pool.call_count(m), 2);
        }

        let thread = h.registry.fetch_thread(request.id).unwrap();
        assert_eq!(thread.rounds.len(), 1);
        assert!(thread.rounds[0].consensus_reached);
    }

    #[tokio::test]
    async fn test_deliberation_runs_all_rounds_without_consensus() {
        let h = harness_with(bundle(2), EngineOptions::default());
        // Every reply differs, so no early termination.
        for (m, texts) in [
            ("m1", ["a0 alpha", "a1 bravo", "a2 charlie"]),
            ("m2", ["b0 delta", "b1 echo", "b2 foxtrot"]),
            ("m3", ["c0 golf", "c1 hotel", "c2 india"]),
        ] {
            for t in texts {
                h.pool.script_ok(m, reply(t));
            }
        }

        let request = submit("q");
        processing_record(&h, &request);
        h.orchestrator.clone().run(request.clone(), None).await;

        let thread = h.registry.fetch_thread(request.id).unwrap();
        assert_eq!(thread.rounds.len(), 2);
        assert!(!thread.consensus_reached());
        for m in ["m1", "m2", "m3"] {
            assert_eq!(h.pool.call_count(m), 3);
        }
    }

    #[tokio::test]
    async fn test_redaction_removes_own_response() {
        let mut b = bundle(1);
        b.deliberation.redact_own_response = true;
        let h = harness_with(b, EngineOptions::default());

        h.pool.script_ok("m1", reply("from m1 unique alpha"));
        h.pool.script_ok("m2", reply("from m2 unique beta"));
        h.pool.script_ok("m3", reply("from m3 unique gamma"));

        let request = submit("q");
        processing_record(&h, &request);
        h.orchestrator.clone().run(request.clone(), None).await;

        // m1's deliberation prompt must not contain m1's own round-0 text.
        let requests = h.pool.requests_for("m1");
        assert_eq!(requests.len(), 2);
        let deliberation_body = &requests[1].messages[1].content;
        assert!(!deliberation_body.contains("from m1 unique alpha"));
        assert!(deliberation_body.contains("from m2 unique beta"));
    }

    #[tokio::test]
    async fn test_unknown_preset_fails_before_any_provider_call() {
        let h = harness_with(bundle(0), EngineOptions::default());
        let request = submit("q").with_preset("invalid-preset");

        let err = h.orchestrator.process(&request).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestrationError::Config(conclave_config::ConfigError::UnknownPreset(_))
        ));
        for m in ["m1", "m2", "m3"] {
            assert_eq!(h.pool.call_count(m), 0);
        }
    }

    #[tokio::test]
    async fn test_invalid_weights_rejected_before_dispatch() {
        let h = harness_with(bundle(0), EngineOptions::default());
        // Overwrite the active synthesis config with unvalidated weights.
        let store = ConfigStore::seeded(bundle(0)).unwrap();
        store
            .update(
                ConfigType::Synthesis,
                &SynthesisConfig {
                    strategy: SynthesisStrategy::WeightedFusion {
                        weights: std::collections::HashMap::new(),
                    },
                },
            )
            .unwrap();
        let orchestrator = Arc::new(Orchestrator::new(
            h.pool.clone(),
            Arc::new(store),
            Arc::new(PresetResolver::with_builtins()),
            h.registry.clone(),
            h.idempotency.clone(),
            h.hub.clone(),
            h.sessions.clone(),
            h.metrics.clone(),
            Arc::new(ModelRankings::new()),
            EngineOptions::default(),
        ));

        let err = orchestrator.process(&submit("q")).await.unwrap_err();
        assert!(matches!(
            err,
            OrchestrationError::Config(conclave_config::ConfigError::InvalidWeights(_))
        ));
        assert_eq!(h.pool.call_count("m1"), 0);
    }

    #[tokio::test]
    async fn test_side_effects_exactly_once() {
        let h = harness_with(bundle(0), EngineOptions::default());
        for m in ["m1", "m2", "m3"] {
            h.pool.script_ok(m, reply("same"));
        }

        let session_id = Uuid::new_v4();
        let mut request = submit("q");
        request = request.with_session(session_id);
        processing_record(&h, &request);

        h.orchestrator.clone().run(request.clone(), None).await;

        assert_eq!(h.metrics.cost_calls(), 1);
        assert_eq!(h.metrics.decision_calls(), 1);
        assert_eq!(h.sessions.append_count(session_id), 1);
        assert!(h.metrics.total_cost() > 0.0);
    }

    #[tokio::test]
    async fn test_global_timeout_triggers_partial_synthesis() {
        let mut b = bundle(0);
        b.performance.global_timeout_ms = 100;
        let h = harness_with(b, EngineOptions::default());

        h.pool.script_ok("m1", reply("fast shared answer"));
        h.pool.script_ok("m2", reply("fast shared answer"));
        h.pool
            .script_ok_delayed("m3", reply("too slow"), Duration::from_secs(30));

        let request = submit("q");
        processing_record(&h, &request);
        h.orchestrator.clone().run(request.clone(), None).await;

        let record = h.registry.fetch(request.id).unwrap();
        assert_eq!(record.status, RequestStatus::Completed);
        let decision = record.decision.unwrap();
        assert_eq!(decision.confidence, Confidence::Low);
        assert!(!decision.contributing_member_ids.contains(&"m3".to_string()));
    }

    #[tokio::test]
    async fn test_budget_cap_skips_deliberation() {
        let mut b = bundle(3);
        b.performance.max_cost_usd = Some(0.0005);
        let h = harness_with(
            b,
            EngineOptions {
                budget_caps_enabled: true,
                ..Default::default()
            },
        );
        // Round 0 alone exceeds the cap (3 x 0.001).
        for m in ["m1", "m2", "m3"] {
            h.pool.script_ok(m, reply("answer"));
        }

        let request = submit("q");
        processing_record(&h, &request);
        h.orchestrator.clone().run(request.clone(), None).await;

        let record = h.registry.fetch(request.id).unwrap();
        assert_eq!(record.status, RequestStatus::Completed);
        // No deliberation calls happened.
        for m in ["m1", "m2", "m3"] {
            assert_eq!(h.pool.call_count(m), 1);
        }
    }

    #[tokio::test]
    async fn test_devils_advocate_gate_and_downgrade() {
        let mut b = bundle(0);
        b.devils_advocate = Some(DevilsAdvocateConfig {
            enabled: true,
            apply_to_code_requests: true,
            apply_to_text_requests: true,
            critic_member_id: Some("m1".to_string()),
        });
        let h = harness_with(
            b,
            EngineOptions {
                devils_advocate_enabled: true,
                ..Default::default()
            },
        );
        for m in ["m1", "m2", "m3"] {
            h.pool.script_ok(m, reply("identical answer text"));
        }
        // Critique then rewrite, both served by m1.
        h.pool.script_ok(
            "m1",
            reply(r#"{"weaknesses": ["overstated", "unsourced"], "severity": "moderate"}"#),
        );
        h.pool.script_ok("m1", reply("tempered answer"));

        let request = submit("q");
        processing_record(&h, &request);
        h.orchestrator.clone().run(request.clone(), None).await;

        let decision = h.registry.fetch(request.id).unwrap().decision.unwrap();
        assert_eq!(decision.content, "tempered answer");
        // 1.0 agreement downgraded by 0.3 * 0.5.
        assert!((decision.agreement_level - 0.85).abs() < 1e-9);
        assert_eq!(decision.confidence, Confidence::Medium);
    }

    #[tokio::test]
    async fn test_devils_advocate_disabled_by_engine_flag() {
        let mut b = bundle(0);
        b.devils_advocate = Some(DevilsAdvocateConfig {
            enabled: true,
            ..Default::default()
        });
        let h = harness_with(b, EngineOptions::default());
        for m in ["m1", "m2", "m3"] {
            h.pool.script_ok(m, reply("plain answer"));
        }

        let request = submit("q");
        processing_record(&h, &request);
        h.orchestrator.clone().run(request.clone(), None).await;

        let decision = h.registry.fetch(request.id).unwrap().decision.unwrap();
        assert_eq!(decision.content, "plain answer");
        // Only the fan-out calls happened; no critique call.
        assert_eq!(h.pool.call_count("m1"), 1);
    }

    struct PanickingPool;

    #[async_trait::async_trait]
    impl ProviderPool for PanickingPool {
        async fn complete(
            &self,
            _member: &CouncilMember,
            _request: &ProviderRequest,
        ) -> Result<conclave_provider::ProviderReply, conclave_provider::ProviderError> {
            panic!("provider blew up");
        }
    }

    #[tokio::test]
    async fn test_panic_converts_to_failed_and_releases_waiters() {
        let registry = Arc::new(RequestRegistry::new());
        let idempotency = Arc::new(IdempotencyCache::new());
        let hub = Arc::new(StreamHub::new());
        let orchestrator = Arc::new(Orchestrator::new(
            Arc::new(PanickingPool),
            Arc::new(ConfigStore::seeded(bundle(0)).unwrap()),
            Arc::new(PresetResolver::with_builtins()),
            registry.clone(),
            idempotency.clone(),
            hub.clone(),
            Arc::new(InMemorySessionStore::new()),
            Arc::new(RecordingMetricsSink::new()),
            Arc::new(ModelRankings::new()),
            EngineOptions::default(),
        ));

        let request = submit("q");
        registry
            .save(StoredRequest::processing(request.id, request.created_at))
            .unwrap();
        let key = conclave_store::scoped_key("alice", "k-panic");
        idempotency.mark_in_progress(&key, request.id, Duration::from_secs(60));

        orchestrator.run(request.clone(), Some(key.clone())).await;

        let record = registry.fetch(request.id).unwrap();
        assert_eq!(record.status, RequestStatus::Failed);
        assert_eq!(
            idempotency.check(&key).unwrap().state,
            conclave_store::IdempotencyState::Failed
        );
    }

    #[tokio::test]
    async fn test_seeded_preset_overrides_council_behavior() {
        let h = harness_with(bundle(3), EngineOptions::default());
        // The "fast" preset runs zero deliberation rounds with the
        // standard gpt/claude/gemini council.
        for m in ["gpt", "claude", "gemini"] {
            h.pool.script_ok(m, reply("preset answer"));
        }

        let request = submit("q").with_preset("fast");
        processing_record(&h, &request);
        h.orchestrator.clone().run(request.clone(), None).await;

        let record = h.registry.fetch(request.id).unwrap();
        assert_eq!(record.status, RequestStatus::Completed);
        for m in ["gpt", "claude", "gemini"] {
            assert_eq!(h.pool.call_count(m), 1);
        }
        assert_eq!(h.pool.call_count("m1"), 0);
    }
}
