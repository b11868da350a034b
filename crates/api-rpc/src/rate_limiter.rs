//! Rate Limiter (Token Bucket)
//!
//! Caps operator request throughput without taking a lock on the hot path:
//! tokens and the last-refill timestamp are packed into one AtomicU64 and
//! updated with a CAS loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub struct RateLimiter {
    // Upper 32 bits: token count. Lower 32 bits: last refill offset in
    // milliseconds since creation.
    packed: AtomicU64,
    creation_time: Instant,
    max_tokens: u32,
    refill_rate: u32, // tokens per second
}

impl RateLimiter {
    /// `max_tokens` is the burst ceiling, `refill_rate` the steady-state
    /// requests per second.
    pub fn new(max_tokens: u32, refill_rate: u32) -> Self {
        Self {
            packed: AtomicU64::new((max_tokens as u64) << 32),
            creation_time: Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Consume one token. Returns false when the caller should be throttled.
    pub fn try_acquire(&self) -> bool {
        loop {
            let packed = self.packed.load(Ordering::Acquire);
            let tokens = (packed >> 32) as u32;
            let last_refill_ms = (packed & 0xFFFF_FFFF) as u32;

            let elapsed_ms = Instant::now()
                .duration_since(self.creation_time)
                .as_millis() as u32;
            let delta_ms = elapsed_ms.saturating_sub(last_refill_ms);

            let tokens_to_add = (delta_ms as u64 * self.refill_rate as u64) / 1000;
            let refilled = ((tokens as u64 + tokens_to_add).min(self.max_tokens as u64)) as u32;

            if refilled >= 1 {
                let new_packed = (((refilled - 1) as u64) << 32) | (elapsed_ms as u64);
                match self.packed.compare_exchange(
                    packed,
                    new_packed,
                    Ordering::Release,
                    Ordering::Acquire,
                ) {
                    Ok(_) => return true,
                    Err(_) => continue,
                }
            } else {
                // Out of tokens; still advance the refill timestamp.
                let new_packed = ((refilled as u64) << 32) | (elapsed_ms as u64);
                let _ = self.packed.compare_exchange(
                    packed,
                    new_packed,
                    Ordering::Release,
                    Ordering::Acquire,
                );
                return false;
            }
        }
    }
}
