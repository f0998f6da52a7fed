//! Resilient single-member calls.

use crate::error::ProviderError;
use crate::pool::{ProviderPool, ProviderRequest};
use conclave_types::{CouncilMember, InitialResponse, ProviderErrorKind, RetryPolicy};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Delay before retry `attempt` (1-based) under `policy`.
///
/// Grows as `initial * multiplier^(attempt-1)`, capped at the policy
/// maximum, with up to 25 % additive jitter.
pub fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }
    let base = policy.initial_delay_ms as f64;
    let raw = base * policy.backoff_multiplier.powi(attempt as i32 - 1);
    let capped = raw.min(policy.max_delay_ms as f64);
    let jitter = 1.0 + rand::random::<f64>() * 0.25;
    Duration::from_millis((capped * jitter) as u64)
}

/// Calls one member through the pool with its own timeout and retry
/// policy, always producing an [`InitialResponse`].
///
/// Each attempt gets a fresh `timeout_secs` clock. Only error kinds in
/// the member's retry policy are retried; everything else settles the
/// call immediately. The cancellation token aborts in-flight attempts
/// and backoff waits alike.
pub async fn call_member(
    pool: &dyn ProviderPool,
    member: &CouncilMember,
    request: &ProviderRequest,
    cancel: &CancellationToken,
) -> InitialResponse {
    let started = Instant::now();
    let attempt_timeout = Duration::from_secs(member.timeout_secs);
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        if cancel.is_cancelled() {
            return InitialResponse::failure(
                member.id.clone(),
                ProviderErrorKind::Cancelled,
                started.elapsed().as_millis() as u64,
            );
        }

        let outcome = tokio::select! {
            _ = cancel.cancelled() => Err(ProviderError::cancelled()),
            result = tokio::time::timeout(attempt_timeout, pool.complete(member, request)) => {
                match result {
                    Ok(inner) => inner,
                    Err(_) => Err(ProviderError::timeout(format!(
                        "no reply within {}s",
                        member.timeout_secs
                    ))),
                }
            }
        };

        match outcome {
            Ok(reply) if reply.content.is_empty() => {
                // Treat an empty body as a failed attempt; fall through
                // to the retry decision below.
                let err = ProviderError::invalid_response("empty completion");
                if let Some(response) =
                    settle_failure(member, err, attempt, started, cancel).await
                {
                    return response;
                }
            }
            Ok(reply) => {
                tracing::debug!(
                    member_id = %member.id,
                    attempt = attempt,
                    latency_ms = started.elapsed().as_millis() as u64,
                    "Member call succeeded"
                );
                return InitialResponse::success(
                    member.id.clone(),
                    reply.content,
                    started.elapsed().as_millis() as u64,
                )
                .with_usage(reply.prompt_tokens, reply.completion_tokens, reply.cost_usd);
            }
            Err(err) => {
                if let Some(response) =
                    settle_failure(member, err, attempt, started, cancel).await
                {
                    return response;
                }
            }
        }
    }
}

/// Decides whether a failed attempt settles the call; waits out the
/// backoff when it does not.
async fn settle_failure(
    member: &CouncilMember,
    err: ProviderError,
    attempt: u32,
    started: Instant,
    cancel: &CancellationToken,
) -> Option<InitialResponse> {
    let exhausted = attempt >= member.retry.max_attempts;
    let retryable =
        err.kind != ProviderErrorKind::Cancelled && member.retry.is_retryable(err.kind);

    if exhausted || !retryable {
        tracing::warn!(
            member_id = %member.id,
            attempt = attempt,
            kind = %err.kind,
            error = %err,
            "Member call settled as failure"
        );
        return Some(InitialResponse::failure(
            member.id.clone(),
            err.kind,
            started.elapsed().as_millis() as u64,
        ));
    }

    let delay = backoff_delay(&member.retry, attempt);
    tracing::debug!(
        member_id = %member.id,
        attempt = attempt,
        delay_ms = delay.as_millis() as u64,
        kind = %err.kind,
        "Retrying member call after delay"
    );

    tokio::select! {
        _ = cancel.cancelled() => Some(InitialResponse::failure(
            member.id.clone(),
            ProviderErrorKind::Cancelled,
            started.elapsed().as_millis() as u64,
        )),
        _ = tokio::time::sleep(delay) => None,
    }
}
