//! Strategy-dispatched consensus synthesis.

use crate::error::SynthesisError;
use crate::rankings::ModelRankings;
use crate::similarity::{mean_pairwise, similarity};
use conclave_config::{validate_weights, CouncilConfig, ModeratorStrategy, SynthesisStrategy};
use conclave_provider::{call_member, PromptMessage, ProviderPool, ProviderRequest};
use conclave_types::{
    ConsensusDecision, CouncilMember, DeliberationThread, InitialResponse, MemberId,
    SynthesisStrategyKind,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Reduces member responses (plus the deliberation thread) into one
/// [`ConsensusDecision`] under the configured strategy.
pub struct Synthesizer {
    pool: Arc<dyn ProviderPool>,
    rankings: Arc<ModelRankings>,
    rotation: AtomicU64,
}

impl Synthesizer {
    /// Creates a synthesizer over the given pool and rankings table.
    pub fn new(pool: Arc<dyn ProviderPool>, rankings: Arc<ModelRankings>) -> Self {
        Self {
            pool,
            rankings,
            rotation: AtomicU64::new(0),
        }
    }

    /// Produces the consensus decision for a request.
    ///
    /// Every strategy guarantees non-empty content, non-empty
    /// contributing members, a fresh timestamp, and the strategy tag.
    pub async fn synthesize(
        &self,
        query: &str,
        responses: &[InitialResponse],
        thread: &DeliberationThread,
        strategy: &SynthesisStrategy,
        council: &CouncilConfig,
        cancel: &CancellationToken,
    ) -> Result<ConsensusDecision, SynthesisError> {
        let decision = match strategy {
            SynthesisStrategy::ConsensusExtraction {
                agreement_threshold,
            } => consensus_extraction(responses, *agreement_threshold)?,
            SynthesisStrategy::WeightedFusion { weights } => {
                weighted_fusion(responses, weights)?
            }
            SynthesisStrategy::MetaSynthesis { moderator } => {
                self.meta_synthesis(query, responses, thread, moderator, council, cancel)
                    .await?
            }
        };

        tracing::info!(
            strategy = %decision.synthesis_strategy,
            agreement = decision.agreement_level,
            confidence = %decision.confidence,
            contributors = decision.contributing_member_ids.len(),
            "Synthesis complete"
        );
        Ok(decision)
    }

    async fn meta_synthesis(
        &self,
        query: &str,
        responses: &[InitialResponse],
        thread: &DeliberationThread,
        moderator: &ModeratorStrategy,
        council: &CouncilConfig,
        cancel: &CancellationToken,
    ) -> Result<ConsensusDecision, SynthesisError> {
        let ok: Vec<&InitialResponse> = successes(responses);
        if ok.is_empty() {
            return Err(SynthesisError::NoResponses);
        }

        let member = self.select_moderator(moderator, council)?;
        let request = moderator_prompt(query, &ok, thread);
        let reply = call_member(self.pool.as_ref(), member, &request, cancel).await;

        if !reply.ok {
            tracing::warn!(
                moderator = %member.id,
                kind = ?reply.error_kind,
                "Moderator failed, falling back to consensus extraction"
            );
            return consensus_extraction(
                responses,
                conclave_config::DEFAULT_AGREEMENT_THRESHOLD,
            );
        }

        let texts: Vec<&str> = ok.iter().map(|r| r.content.as_str()).collect();
        let contributing: Vec<MemberId> = ok.iter().map(|r| r.member_id.clone()).collect();
        Ok(ConsensusDecision::new(
            reply.content,
            mean_pairwise(&texts),
            SynthesisStrategyKind::MetaSynthesis,
            contributing,
        )?)
    }

    fn select_moderator<'c>(
        &self,
        moderator: &ModeratorStrategy,
        council: &'c CouncilConfig,
    ) -> Result<&'c CouncilMember, SynthesisError> {
        match moderator {
            ModeratorStrategy::Permanent { member_id } => {
                council.member(member_id).ok_or_else(|| {
                    SynthesisError::Config(conclave_config::ConfigError::Invalid(format!(
                        "permanent moderator '{}' is not in the council",
                        member_id
                    )))
                })
            }
            ModeratorStrategy::Rotate => {
                let index =
                    self.rotation.fetch_add(1, Ordering::Relaxed) as usize % council.members.len();
                Ok(&council.members[index])
            }
            ModeratorStrategy::Strongest => {
                let ids = council.member_ids();
                let chosen = self
                    .rankings
                    .best_of(&ids)
                    .and_then(|id| council.member(&id))
                    .unwrap_or(&council.members[0]);
                Ok(chosen)
            }
        }
    }
}

fn successes(responses: &[InitialResponse]) -> Vec<&InitialResponse> {
    responses
        .iter()
        .filter(|r| r.ok && !r.content.is_empty())
        .collect()
}

/// Consensus extraction: find the maximal agreement subset and answer
/// from its centroid.
fn consensus_extraction(
    responses: &[InitialResponse],
    threshold: f64,
) -> Result<ConsensusDecision, SynthesisError> {
    let ok = successes(responses);
    if ok.is_empty() {
        return Err(SynthesisError::NoResponses);
    }
    if ok.len() == 1 {
        return Ok(ConsensusDecision::new(
            ok[0].content.clone(),
            1.0,
            SynthesisStrategyKind::ConsensusExtraction,
            vec![ok[0].member_id.clone()],
        )?);
    }

    let n = ok.len();
    let mut sims = vec![vec![0.0f64; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let s = similarity(&ok[i].content, &ok[j].content);
            sims[i][j] = s;
            sims[j][i] = s;
        }
    }

    // Seed with the most similar pair, then greedily grow with any
    // response whose mean similarity to the subset clears the threshold.
    let mut subset: Vec<usize> = Vec::new();
    let mut best_pair = (0usize, 1usize, f64::MIN);
    for i in 0..n {
        for j in (i + 1)..n {
            if sims[i][j] > best_pair.2 {
                best_pair = (i, j, sims[i][j]);
            }
        }
    }

    if best_pair.2 >= threshold {
        subset.push(best_pair.0);
        subset.push(best_pair.1);
        loop {
            let candidate = (0..n)
                .filter(|i| !subset.contains(i))
                .map(|i| {
                    let mean =
                        subset.iter().map(|&j| sims[i][j]).sum::<f64>() / subset.len() as f64;
                    (i, mean)
                })
                .max_by(|a, b| a.1.total_cmp(&b.1));
            match candidate {
                Some((i, mean)) if mean >= threshold => subset.push(i),
                _ => break,
            }
        }
    } else {
        // No pair clears the threshold; synthesize over everyone and let
        // the low agreement speak through the confidence band.
        subset = (0..n).collect();
    }

    // Centroid: the subset member most similar to the rest of the subset.
    let centroid = subset
        .iter()
        .copied()
        .max_by(|&a, &b| {
            let mean = |idx: usize| {
                subset
                    .iter()
                    .filter(|&&j| j != idx)
                    .map(|&j| sims[idx][j])
                    .sum::<f64>()
                    / (subset.len() - 1).max(1) as f64
            };
            mean(a).total_cmp(&mean(b))
        })
        .unwrap_or(subset[0]);

    let texts: Vec<&str> = subset.iter().map(|&i| ok[i].content.as_str()).collect();
    let contributing: Vec<MemberId> = subset.iter().map(|&i| ok[i].member_id.clone()).collect();

    Ok(ConsensusDecision::new(
        ok[centroid].content.clone(),
        mean_pairwise(&texts),
        SynthesisStrategyKind::ConsensusExtraction,
        contributing,
    )?)
}

/// Weighted fusion: concatenate member answers ordered by weight share.
fn weighted_fusion(
    responses: &[InitialResponse],
    weights: &HashMap<MemberId, f64>,
) -> Result<ConsensusDecision, SynthesisError> {
    validate_weights(weights)?;

    let mut participants: Vec<(&InitialResponse, f64)> = successes(responses)
        .into_iter()
        .filter_map(|r| weights.get(&r.member_id).map(|&w| (r, w)))
        .collect();
    if participants.is_empty() {
        return Err(SynthesisError::NoResponses);
    }
    participants.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.member_id.cmp(&b.0.member_id)));

    let total: f64 = participants.iter().map(|(_, w)| w).sum();
    let sections: Vec<String> = participants
        .iter()
        .map(|(r, w)| {
            format!(
                "### {} ({:.0}%)\n\n{}",
                r.member_id,
                w / total * 100.0,
                r.content
            )
        })
        .collect();

    // Weighted mean pairwise similarity: pairs weighted by the product
    // of their shares.
    let agreement = if participants.len() < 2 {
        1.0
    } else {
        let mut num = 0.0;
        let mut den = 0.0;
        for i in 0..participants.len() {
            for j in (i + 1)..participants.len() {
                let w = participants[i].1 * participants[j].1;
                num += w * similarity(&participants[i].0.content, &participants[j].0.content);
                den += w;
            }
        }
        num / den
    };

    let contributing: Vec<MemberId> = participants
        .iter()
        .map(|(r, _)| r.member_id.clone())
        .collect();

    Ok(ConsensusDecision::new(
        sections.join("\n\n"),
        agreement,
        SynthesisStrategyKind::WeightedFusion,
        contributing,
    )?)
}

fn moderator_prompt(
    query: &str,
    responses: &[&InitialResponse],
    thread: &DeliberationThread,
) -> ProviderRequest {
    let mut body = format!(
        "Original question:\n{}\n\nCouncil answers:\n",
        query
    );
    for r in responses {
        body.push_str(&format!("\n[{}]\n{}\n", r.member_id, r.content));
    }
    if !thread.rounds.is_empty() {
        body.push_str("\nDeliberation:\n");
        for round in &thread.rounds {
            body.push_str(&format!("\nRound {}:\n", round.number));
            for exchange in &round.exchanges {
                body.push_str(&format!("[{}] {}\n", exchange.member_id, exchange.content));
            }
        }
    }
    ProviderRequest {
        messages: vec![
            PromptMessage::system(
                "You are the moderator of a model council. Synthesize the council's \
                 answers into a single, best answer to the original question. Reply \
                 with the answer only.",
            ),
            PromptMessage::user(body),
        ],
        tools: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_provider::{MockProviderPool, ProviderReply};
    use conclave_types::{ProviderErrorKind, RetryPolicy};
    use uuid::Uuid;

    fn member(id: &str) -> CouncilMember {
        CouncilMember {
            id: id.to_string(),
            provider: "mock".to_string(),
            model: "mock-1".to_string(),
            timeout_secs: 5,
            retry: RetryPolicy {
                max_attempts: 1,
                ..RetryPolicy::default()
            },
            weight: None,
        }
    }

    fn council(ids: &[&str]) -> CouncilConfig {
        CouncilConfig {
            members: ids.iter().map(|id| member(id)).collect(),
            minimum_size: 2,
            require_minimum_for_consensus: true,
        }
    }

    fn response(id: &str, content: &str) -> InitialResponse {
        InitialResponse::success(id, content, 100)
    }

    fn synthesizer(pool: MockProviderPool) -> Synthesizer {
        Synthesizer::new(Arc::new(pool), Arc::new(ModelRankings::new()))
    }

    #[test]
    fn test_extraction_picks_agreeing_subset() {
        let responses = vec![
            response("a", "the capital of france is paris"),
            response("b", "paris is the capital of france"),
            response("c", "completely unrelated text about rust"),
        ];
        let decision = consensus_extraction(&responses, 0.8).unwrap();

        assert_eq!(decision.contributing_member_ids.len(), 2);
        assert!(decision.contributing_member_ids.contains(&"a".to_string()));
        assert!(decision.contributing_member_ids.contains(&"b".to_string()));
        assert!(decision.content.contains("paris"));
        assert!(decision.agreement_level > 0.85);
    }

    #[test]
    fn test_extraction_falls_back_to_full_set() {
        let responses = vec![
            response("a", "alpha beta gamma"),
            response("b", "delta epsilon zeta"),
            response("c", "eta theta iota"),
        ];
        let decision = consensus_extraction(&responses, 0.8).unwrap();

        assert_eq!(decision.contributing_member_ids.len(), 3);
        assert!(decision.agreement_level < 0.6);
        assert_eq!(decision.confidence, conclave_types::Confidence::Low);
    }

    #[test]
    fn test_extraction_single_response() {
        let responses = vec![response("a", "only answer")];
        let decision = consensus_extraction(&responses, 0.8).unwrap();
        assert_eq!(decision.content, "only answer");
        assert_eq!(decision.contributing_member_ids, vec!["a".to_string()]);
    }

    #[test]
    fn test_extraction_ignores_failures() {
        let responses = vec![
            InitialResponse::failure("a", ProviderErrorKind::Timeout, 10),
            response("b", "answer"),
        ];
        let decision = consensus_extraction(&responses, 0.8).unwrap();
        assert_eq!(decision.contributing_member_ids, vec!["b".to_string()]);
    }

    #[test]
    fn test_extraction_no_responses() {
        let responses = vec![InitialResponse::failure("a", ProviderErrorKind::Timeout, 10)];
        assert!(matches!(
            consensus_extraction(&responses, 0.8),
            Err(SynthesisError::NoResponses)
        ));
    }

    #[test]
    fn test_fusion_orders_by_weight() {
        let responses = vec![response("a", "answer a"), response("b", "answer b")];
        let mut weights = HashMap::new();
        weights.insert("a".to_string(), 1.0);
        weights.insert("b".to_string(), 3.0);

        let decision = weighted_fusion(&responses, &weights).unwrap();
        let b_pos = decision.content.find("### b").unwrap();
        let a_pos = decision.content.find("### a").unwrap();
        assert!(b_pos < a_pos, "heavier member comes first");
        assert!(decision.content.contains("(75%)"));
        assert_eq!(
            decision.synthesis_strategy,
            SynthesisStrategyKind::WeightedFusion
        );
    }

    #[test]
    fn test_fusion_rejects_bad_weights() {
        let responses = vec![response("a", "x")];
        let empty: HashMap<MemberId, f64> = HashMap::new();
        assert!(matches!(
            weighted_fusion(&responses, &empty),
            Err(SynthesisError::Config(_))
        ));

        let mut negative = HashMap::new();
        negative.insert("a".to_string(), -1.0);
        assert!(matches!(
            weighted_fusion(&responses, &negative),
            Err(SynthesisError::Config(_))
        ));
    }

    #[test]
    fn test_fusion_needs_a_weighted_responder() {
        let responses = vec![response("a", "x")];
        let mut weights = HashMap::new();
        weights.insert("other".to_string(), 1.0);
        assert!(matches!(
            weighted_fusion(&responses, &weights),
            Err(SynthesisError::NoResponses)
        ));
    }

    #[tokio::test]
    async fn test_meta_synthesis_uses_moderator_reply() {
        let pool = MockProviderPool::new();
        pool.script_ok(
            "gpt",
            ProviderReply {
                content: "moderated answer".to_string(),
                prompt_tokens: 50,
                completion_tokens: 10,
                cost_usd: 0.002,
            },
        );
        let synth = synthesizer(pool);

        let responses = vec![response("gpt", "a1"), response("claude", "a2")];
        let strategy = SynthesisStrategy::MetaSynthesis {
            moderator: ModeratorStrategy::Permanent {
                member_id: "gpt".to_string(),
            },
        };
        let decision = synth
            .synthesize(
                "q",
                &responses,
                &DeliberationThread::new(Uuid::new_v4()),
                &strategy,
                &council(&["gpt", "claude"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(decision.content, "moderated answer");
        assert_eq!(
            decision.synthesis_strategy,
            SynthesisStrategyKind::MetaSynthesis
        );
        assert_eq!(decision.contributing_member_ids.len(), 2);
    }

    #[tokio::test]
    async fn test_meta_synthesis_falls_back_on_moderator_failure() {
        let pool = MockProviderPool::new();
        pool.script_err("gpt", ProviderErrorKind::Auth);
        let synth = synthesizer(pool);

        let responses = vec![
            response("gpt", "shared answer text"),
            response("claude", "shared answer text"),
        ];
        let strategy = SynthesisStrategy::MetaSynthesis {
            moderator: ModeratorStrategy::Permanent {
                member_id: "gpt".to_string(),
            },
        };
        let decision = synth
            .synthesize(
                "q",
                &responses,
                &DeliberationThread::new(Uuid::new_v4()),
                &strategy,
                &council(&["gpt", "claude"]),
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            decision.synthesis_strategy,
            SynthesisStrategyKind::ConsensusExtraction
        );
        assert_eq!(decision.content, "shared answer text");
    }

    #[tokio::test]
    async fn test_meta_synthesis_rotates_moderator() {
        let pool = MockProviderPool::new();
        let synth = synthesizer(pool);
        let cfg = council(&["gpt", "claude"]);

        let first = synth
            .select_moderator(&ModeratorStrategy::Rotate, &cfg)
            .unwrap()
            .id
            .clone();
        let second = synth
            .select_moderator(&ModeratorStrategy::Rotate, &cfg)
            .unwrap()
            .id
            .clone();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn test_meta_synthesis_strongest_uses_rankings() {
        let pool = MockProviderPool::new();
        let rankings = Arc::new(ModelRankings::new());
        rankings.set("claude", 0.9);
        rankings.set("gpt", 0.5);
        let synth = Synthesizer::new(Arc::new(pool), rankings);

        let cfg = council(&["gpt", "claude"]);
        let chosen = synth
            .select_moderator(&ModeratorStrategy::Strongest, &cfg)
            .unwrap();
        assert_eq!(chosen.id, "claude");
    }

    #[tokio::test]
    async fn test_meta_synthesis_permanent_must_be_in_council() {
        let pool = MockProviderPool::new();
        let synth = synthesizer(pool);
        let err = synth
            .select_moderator(
                &ModeratorStrategy::Permanent {
                    member_id: "ghost".to_string(),
                },
                &council(&["gpt", "claude"]),
            )
            .unwrap_err();
        assert!(matches!(err, SynthesisError::Config(_)));
    }
}
