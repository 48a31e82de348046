use std::time::Duration;

use gamekey_common::Coins;

pub const DEFAULT_REFUND_RETRY_ATTEMPTS: u32 = 5;
pub const DEFAULT_REFUND_RETRY_DELAY: Duration = Duration::from_millis(500);
pub const DEFAULT_SIGNUP_BONUS: i64 = 50;
pub const DEFAULT_FIRST_PURCHASE_BONUS: i64 = 100;

/// Tunables for the purchase orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurchaseConfig {
    /// How many times a compensating refund is attempted before it is escalated as a `RefundFailed` alert.
    pub refund_retry_attempts: u32,
    /// The pause between refund attempts. Doubles after each failure.
    pub refund_retry_delay: Duration,
}

impl Default for PurchaseConfig {
    fn default() -> Self {
        Self { refund_retry_attempts: DEFAULT_REFUND_RETRY_ATTEMPTS, refund_retry_delay: DEFAULT_REFUND_RETRY_DELAY }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferralConfig {
    /// Paid to the referrer when a referred account signs up.
    pub signup_bonus: Coins,
    /// Paid to the referrer once, when the referred account completes its first purchase.
    pub first_purchase_bonus: Coins,
}

impl Default for ReferralConfig {
    fn default() -> Self {
        Self {
            signup_bonus: Coins::from(DEFAULT_SIGNUP_BONUS),
            first_purchase_bonus: Coins::from(DEFAULT_FIRST_PURCHASE_BONUS),
        }
    }
}
