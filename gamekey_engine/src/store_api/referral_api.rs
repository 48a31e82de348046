//! The referral reward trigger.
//!
//! Referral bonuses are paid through the ledger, in the same storage transaction that records the referral state
//! change, so a bonus can never be paid without the referral reflecting it, or vice versa.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Account, Referral},
    store_api::ReferralConfig,
    traits::{AccountManagement, Pagination, ReferralError, ReferralManagement, ReferralStatistics},
};

pub struct ReferralApi<B> {
    db: B,
    config: ReferralConfig,
}

impl<B: Debug> Debug for ReferralApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReferralApi ({:?})", self.db)
    }
}

impl<B: Clone> Clone for ReferralApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), config: self.config }
    }
}

impl<B> ReferralApi<B>
where B: ReferralManagement + AccountManagement
{
    pub fn new(db: B, config: ReferralConfig) -> Self {
        Self { db, config }
    }

    pub fn config(&self) -> &ReferralConfig {
        &self.config
    }

    /// Links a freshly registered account to the owner of `referral_code` and pays the referrer the signup bonus.
    ///
    /// Returns `false` without changing anything if the account is not new, the code does not belong to anyone, the
    /// code is the account's own, or the account has already been referred.
    pub async fn on_signup(
        &self,
        referral_code: &str,
        account: &Account,
        is_new_account: bool,
    ) -> Result<bool, ReferralError> {
        if !is_new_account {
            debug!("🤝️ Account #{} already existed. Referral code ignored.", account.id);
            return Ok(false);
        }
        let Some(referrer) = self.db.fetch_account_by_referral_code(referral_code).await? else {
            debug!("🤝️ Referral code {referral_code} does not belong to any account");
            return Ok(false);
        };
        if referrer.id == account.id {
            debug!("🤝️ Account #{} tried to refer itself", account.id);
            return Ok(false);
        }
        let referral = self.db.insert_referral(referrer.id, account.id, self.config.signup_bonus).await?;
        Ok(referral.is_some())
    }

    /// Pays the first-purchase bonus for `account_id`, if there is an unpaid, pending referral for it.
    ///
    /// This is safe to call after every completed order. Only the first call for a given referral pays anything.
    pub async fn on_first_purchase_completed(&self, account_id: i64) -> Result<Option<Referral>, ReferralError> {
        let result = self.db.claim_first_purchase_bonus(account_id, self.config.first_purchase_bonus).await?;
        if let Some(referral) = &result {
            info!(
                "🤝️ First purchase by account #{account_id} earned referrer #{} {}",
                referral.referrer_id, self.config.first_purchase_bonus
            );
        }
        Ok(result)
    }

    pub async fn referral_for(&self, referred_id: i64) -> Result<Option<Referral>, ReferralError> {
        self.db.fetch_referral_for_referred(referred_id).await
    }

    pub async fn referrals_for(&self, referrer_id: i64, pagination: &Pagination) -> Result<Vec<Referral>, ReferralError> {
        self.db.fetch_referrals_for_referrer(referrer_id, pagination).await
    }

    pub async fn statistics(&self, referrer_id: i64) -> Result<ReferralStatistics, ReferralError> {
        self.db.referral_statistics(referrer_id).await
    }
}
