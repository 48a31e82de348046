use gamekey_common::Coins;
use thiserror::Error;

use crate::{
    db_types::Referral,
    traits::{AccountApiError, LedgerError, Pagination, ReferralStatistics},
};

#[derive(Debug, Clone, Error)]
pub enum ReferralError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("The requested account {0} does not exist")]
    AccountNotFound(i64),
    #[error("An account cannot refer itself")]
    SelfReferral,
}

impl From<sqlx::Error> for ReferralError {
    fn from(e: sqlx::Error) -> Self {
        ReferralError::DatabaseError(e.to_string())
    }
}

impl From<LedgerError> for ReferralError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::AccountNotFound(id) => ReferralError::AccountNotFound(id),
            e => ReferralError::DatabaseError(e.to_string()),
        }
    }
}

impl From<AccountApiError> for ReferralError {
    fn from(e: AccountApiError) -> Self {
        match e {
            AccountApiError::AccountNotFound(id) => ReferralError::AccountNotFound(id),
            e => ReferralError::DatabaseError(e.to_string()),
        }
    }
}

/// Behaviour for recording referrals and paying referral bonuses.
///
/// Bonus payments go through the ledger (as `ReferralBonus` entries) in the same transaction as the referral record
/// change that justifies them.
#[allow(async_fn_in_trait)]
pub trait ReferralManagement {
    /// Records that `referrer_id` referred `referred_id`, credits the referrer with `signup_bonus` and adds it to their
    /// referral earnings.
    ///
    /// An account can only ever be referred once. If the referred account already has a referral, nothing changes and
    /// `None` is returned.
    async fn insert_referral(
        &self,
        referrer_id: i64,
        referred_id: i64,
        signup_bonus: Coins,
    ) -> Result<Option<Referral>, ReferralError>;

    /// Pays the first-purchase bonus for the referral of `referred_id`.
    ///
    /// The referral is only eligible while it is `Pending` and its first-purchase flag is clear. Flipping the status
    /// and flag is a conditional write in the same transaction as the credit, so the bonus is paid at most once no
    /// matter how often, or how concurrently, this is called. Returns `None` if nothing was paid.
    async fn claim_first_purchase_bonus(&self, referred_id: i64, bonus: Coins)
        -> Result<Option<Referral>, ReferralError>;

    async fn fetch_referral_for_referred(&self, referred_id: i64) -> Result<Option<Referral>, ReferralError>;

    /// The referrals made by the account, newest first.
    async fn fetch_referrals_for_referrer(
        &self,
        referrer_id: i64,
        pagination: &Pagination,
    ) -> Result<Vec<Referral>, ReferralError>;

    async fn referral_statistics(&self, referrer_id: i64) -> Result<ReferralStatistics, ReferralError>;
}
