//! Request id generation (§9): rejects truncating a `uuid::Uuid` into the
//! wire's `u32` space in favor of sourcing `request_id` from a CSPRNG over
//! the full 32-bit range, re-rolling on collision against the datachannel's
//! live action registry (documented as a deliberate strengthening, see
//! DESIGN.md).

use rand::RngCore;
use std::future::Future;

/// How many re-rolls to attempt before giving up — at `u32` width, a
/// collision against a registry with even thousands of live actions is
/// astronomically unlikely; this bound only guards against a broken
/// `is_taken` implementation that always returns true.
const MAX_ATTEMPTS: u32 = 64;

/// Generates a fresh `request_id`, re-rolling while `is_taken` reports a
/// collision with an already-live action. `is_taken` is async so callers can
/// check it directly against `ActionRegistry::contains` without a blocking
/// lock acquisition.
///
/// Returns `None` if no free id was found within `MAX_ATTEMPTS` draws.
pub async fn generate_request_id<F, Fut>(is_taken: F) -> Option<u32>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = bool>,
{
    let mut rng = rand::rngs::OsRng;
    for _ in 0..MAX_ATTEMPTS {
        let candidate = rng.next_u32();
        if !is_taken(candidate).await {
            return Some(candidate);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn avoids_ids_reported_as_taken() {
        let taken = std::collections::HashSet::from([1u32, 2, 3]);
        let id = generate_request_id(|candidate| std::future::ready(taken.contains(&candidate))).await.unwrap();
        assert!(!taken.contains(&id));
    }

    #[tokio::test]
    async fn gives_up_after_the_attempt_budget_if_everything_collides() {
        assert!(generate_request_id(|_| std::future::ready(true)).await.is_none());
    }
}
