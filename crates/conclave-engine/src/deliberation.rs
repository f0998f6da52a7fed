//! Deliberation prompt composition and round consensus.

use conclave_provider::{PromptMessage, ProviderRequest};
use conclave_synthesis::similarity;

/// Builds the prompt one member sees in deliberation round `round`.
///
/// The prompt carries the original query plus the previous round's
/// responses labeled by member. When `redact_own` is set, the member's
/// own previous response is omitted.
pub fn deliberation_prompt(
    query: &str,
    previous: &[(String, String)],
    member_id: &str,
    round: u32,
    redact_own: bool,
) -> ProviderRequest {
    let mut body = format!(
        "Original question:\n{}\n\nCouncil responses from the previous round:\n",
        query
    );
    for (author, content) in previous {
        if redact_own && author == member_id {
            continue;
        }
        let label = if author == member_id {
            format!("{} (you)", author)
        } else {
            author.clone()
        };
        body.push_str(&format!("\n[{}]\n{}\n", label, content));
    }
    body.push_str(&format!(
        "\nThis is deliberation round {}. Considering the other responses, \
         restate or revise your answer. Reply with your answer only.",
        round
    ));

    ProviderRequest {
        messages: vec![
            PromptMessage::system(
                "You are one member of a model council deliberating toward a \
                 consensus answer.",
            ),
            PromptMessage::user(body),
        ],
        tools: Vec::new(),
    }
}

/// Whether a round's exchanges are textually near-identical.
///
/// True when every pairwise similarity meets the threshold; a round
/// with fewer than two exchanges cannot demonstrate consensus.
pub fn round_reached_consensus(contents: &[&str], threshold: f64) -> bool {
    if contents.len() < 2 {
        return false;
    }
    for i in 0..contents.len() {
        for j in (i + 1)..contents.len() {
            if similarity(contents[i], contents[j]) < threshold {
                return false;
            }
        }
    }
    true
}
