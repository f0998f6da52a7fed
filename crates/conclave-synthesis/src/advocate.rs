//! Devil's-advocate critique and rewrite.

use crate::error::SynthesisError;
use conclave_provider::{call_member, PromptMessage, ProviderPool, ProviderRequest};
use conclave_types::{ConsensusDecision, CouncilMember, InitialResponse};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fraction of confidence removed per unit of critique strength.
const CONFIDENCE_PENALTY: f64 = 0.3;

static LIST_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s+(.{3,})$").expect("invalid regex"));

/// How damaging a critique is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CritiqueSeverity {
    /// Cosmetic issues only.
    Minor,
    /// Substantive but recoverable issues.
    Moderate,
    /// The synthesis is likely wrong or misleading.
    Critical,
}

impl CritiqueSeverity {
    /// Critique strength in `[0, 1]` used for confidence adjustment.
    pub fn strength(&self) -> f64 {
        match self {
            Self::Minor => 0.0,
            Self::Moderate => 0.5,
            Self::Critical => 1.0,
        }
    }

    /// Infers severity from a weakness count when the critic did not
    /// state one.
    pub fn from_weakness_count(count: usize) -> Self {
        if count >= 5 {
            Self::Critical
        } else if count >= 2 {
            Self::Moderate
        } else {
            Self::Minor
        }
    }
}

/// A parsed critique of a synthesis.
#[derive(Debug, Clone)]
pub struct Critique {
    /// Specific weaknesses found.
    pub weaknesses: Vec<String>,
    /// Suggested improvements.
    pub suggestions: Vec<String>,
    /// Overall severity.
    pub severity: CritiqueSeverity,
}

impl Critique {
    /// Whether the critique warrants a rewrite.
    pub fn warrants_rewrite(&self) -> bool {
        self.severity != CritiqueSeverity::Minor || !self.weaknesses.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct StructuredCritique {
    #[serde(default)]
    weaknesses: Vec<String>,
    #[serde(default)]
    suggestions: Vec<String>,
    severity: Option<CritiqueSeverity>,
}

/// The optional critique+rewrite pass over a synthesis result.
pub struct DevilsAdvocate {
    pool: Arc<dyn ProviderPool>,
}

impl DevilsAdvocate {
    /// Creates an advocate over the given pool.
    pub fn new(pool: Arc<dyn ProviderPool>) -> Self {
        Self { pool }
    }

    /// Asks the critic member to critique a synthesis.
    ///
    /// The critic's reply is parsed as structured JSON first; on parse
    /// failure, numbered and bulleted lines are scanned as weaknesses,
    /// and severity is inferred from their count.
    pub async fn critique(
        &self,
        query: &str,
        synthesis: &ConsensusDecision,
        responses: &[InitialResponse],
        critic: &CouncilMember,
        cancel: &CancellationToken,
    ) -> Result<Critique, SynthesisError> {
        let request = critique_prompt(query, synthesis, responses);
        let reply = call_member(self.pool.as_ref(), critic, &request, cancel).await;
        if !reply.ok {
            return Err(SynthesisError::Provider(
                conclave_provider::ProviderError::new(
                    reply
                        .error_kind
                        .unwrap_or(conclave_types::ProviderErrorKind::InvalidResponse),
                    "critic call failed",
                ),
            ));
        }
        Ok(parse_critique(&reply.content))
    }

    /// Asks the critic to rewrite the synthesis given a critique.
    ///
    /// Any failure (provider error, empty reply) yields the original
    /// synthesis content unchanged.
    pub async fn rewrite(
        &self,
        query: &str,
        synthesis: &ConsensusDecision,
        critique: &Critique,
        critic: &CouncilMember,
        cancel: &CancellationToken,
    ) -> String {
        let request = rewrite_prompt(query, synthesis, critique);
        let reply = call_member(self.pool.as_ref(), critic, &request, cancel).await;
        if reply.ok && !reply.content.is_empty() {
            reply.content
        } else {
            tracing::warn!(kind = ?reply.error_kind, "Rewrite failed, keeping original synthesis");
            synthesis.content.clone()
        }
    }

    /// Runs critique, then rewrite iff the critique warrants it, and
    /// applies the confidence adjustment.
    ///
    /// A critique failure never fails the request: the original
    /// synthesis is returned untouched.
    pub async fn synthesize_with_critique(
        &self,
        query: &str,
        synthesis: ConsensusDecision,
        responses: &[InitialResponse],
        critic: &CouncilMember,
        cancel: &CancellationToken,
    ) -> ConsensusDecision {
        let critique = match self
            .critique(query, &synthesis, responses, critic, cancel)
            .await
        {
            Ok(c) => c,
            Err(err) => {
                tracing::warn!(error = %err, "Critique failed, returning original synthesis");
                return synthesis;
            }
        };

        if !critique.warrants_rewrite() {
            tracing::info!(severity = ?critique.severity, "Critique found nothing actionable");
            return synthesis;
        }

        let content = self
            .rewrite(query, &synthesis, &critique, critic, cancel)
            .await;
        let decision = apply_adjustment(synthesis, content, &critique);
        tracing::info!(
            severity = ?critique.severity,
            weaknesses = critique.weaknesses.len(),
            confidence = %decision.confidence,
            "Critique applied"
        );
        decision
    }
}

/// Applies `adjusted = clamp(score - 0.3 * strength, 0, 1)` and
/// re-derives the confidence band.
fn apply_adjustment(
    synthesis: ConsensusDecision,
    content: String,
    critique: &Critique,
) -> ConsensusDecision {
    let adjusted =
        (synthesis.agreement_level - CONFIDENCE_PENALTY * critique.severity.strength())
            .clamp(0.0, 1.0);
    ConsensusDecision::new(
        content,
        adjusted,
        synthesis.synthesis_strategy,
        synthesis.contributing_member_ids.clone(),
    )
    .unwrap_or(synthesis)
}

/// Parses a critic reply: strict JSON first, list scanning second.
pub fn parse_critique(text: &str) -> Critique {
    if let Some(structured) = parse_structured(text) {
        let severity = structured
            .severity
            .unwrap_or_else(|| CritiqueSeverity::from_weakness_count(structured.weaknesses.len()));
        return Critique {
            weaknesses: structured.weaknesses,
            suggestions: structured.suggestions,
            severity,
        };
    }

    let weaknesses: Vec<String> = text
        .lines()
        .filter_map(|line| LIST_ITEM.captures(line))
        .map(|caps| caps[1].trim().to_string())
        .collect();
    let severity = CritiqueSeverity::from_weakness_count(weaknesses.len());
    Critique {
        weaknesses,
        suggestions: Vec::new(),
        severity,
    }
}

fn parse_structured(text: &str) -> Option<StructuredCritique> {
    // The critic may wrap JSON in a code fence or prose; try the whole
    // body first, then the outermost braces.
    if let Ok(parsed) = serde_json::from_str::<StructuredCritique>(text.trim()) {
        return Some(parsed);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    serde_json::from_str(&text[start..=end]).ok()
}

fn critique_prompt(
    query: &str,
    synthesis: &ConsensusDecision,
    responses: &[InitialResponse],
) -> ProviderRequest {
    let mut body = format!(
        "Question:\n{}\n\nProposed consensus answer:\n{}\n\nIndividual answers:\n",
        query, synthesis.content
    );
    for r in responses.iter().filter(|r| r.ok) {
        body.push_str(&format!("\n[{}]\n{}\n", r.member_id, r.content));
    }
    body.push_str(
        "\nCritique the consensus answer. Reply as JSON: \
         {\"weaknesses\": [..], \"suggestions\": [..], \
         \"severity\": \"minor\"|\"moderate\"|\"critical\"}",
    );
    ProviderRequest {
        messages: vec![
            PromptMessage::system(
                "You are a rigorous devil's advocate. Find what is wrong, missing, \
                 or overstated in the proposed answer.",
            ),
            PromptMessage::user(body),
        ],
        tools: Vec::new(),
    }
}

fn rewrite_prompt(
    query: &str,
    synthesis: &ConsensusDecision,
    critique: &Critique,
) -> ProviderRequest {
    let mut body = format!(
        "Question:\n{}\n\nCurrent answer:\n{}\n\nWeaknesses found:\n",
        query, synthesis.content
    );
    for w in &critique.weaknesses {
        body.push_str(&format!("- {}\n", w));
    }
    if !critique.suggestions.is_empty() {
        body.push_str("\nSuggestions:\n");
        for s in &critique.suggestions {
            body.push_str(&format!("- {}\n", s));
        }
    }
    body.push_str("\nRewrite the answer addressing every weakness. Reply with the answer only.");
    ProviderRequest {
        messages: vec![
            PromptMessage::system("You improve answers based on critique."),
            PromptMessage::user(body),
        ],
        tools: Vec::new(),
    }
}

/// Rough heuristic for whether a query is code-shaped, used by the
/// orchestrator's domain gate.
pub fn looks_like_code(query: &str) -> bool {
    if query.contains("```") {
        return true;
    }
    const MARKERS: &[&str] = &[
        "fn ", "def ", "class ", "import ", "function ", "#include", "pub fn", "=>", "};",
        "stack trace", "compile error", "traceback",
    ];
    MARKERS.iter().any(|m| query.contains(m))
}
