//! Customer registration and lookup.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{Account, NewAccount},
    helpers::generate_referral_code,
    store_api::{ReferralApi, RegistrationResult},
    traits::{AccountApiError, AccountManagement, ReferralManagement},
};

const MAX_REFERRAL_CODE_ATTEMPTS: usize = 5;

/// The `AccountApi` registers chat users as store customers and looks them up.
pub struct AccountApi<B> {
    db: B,
    referrals: ReferralApi<B>,
}

impl<B: Debug> Debug for AccountApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AccountApi ({:?})", self.db)
    }
}

impl<B> AccountApi<B>
where B: AccountManagement + ReferralManagement
{
    pub fn new(db: B, referrals: ReferralApi<B>) -> Self {
        Self { db, referrals }
    }

    /// Registers the chat user with the given external id. Calling this again for the same user returns the existing
    /// account, with `is_new` set to `false`, and ignores `referral_code`.
    ///
    /// A failure to record the referral is logged but does not fail the registration.
    pub async fn register(
        &self,
        external_id: &str,
        username: Option<&str>,
        referral_code: Option<&str>,
    ) -> Result<RegistrationResult, AccountApiError> {
        if external_id.trim().is_empty() {
            return Err(AccountApiError::InvalidAccount("External id cannot be empty".into()));
        }
        let (mut account, is_new) = self.insert_with_fresh_code(external_id, username).await?;
        let mut referred = false;
        if let Some(code) = referral_code.filter(|c| !c.trim().is_empty()) {
            match self.referrals.on_signup(code, &account, is_new).await {
                Ok(true) => {
                    referred = true;
                    account = self.db.fetch_account(account.id).await?.ok_or(AccountApiError::AccountNotFound(account.id))?;
                },
                Ok(false) => {},
                Err(e) => warn!("🤝️ Could not record referral for account #{}: {e}", account.id),
            }
        }
        if is_new {
            info!("🗃️ New account #{} registered for [{external_id}]", account.id);
        }
        Ok(RegistrationResult { account, is_new, referred })
    }

    async fn insert_with_fresh_code(
        &self,
        external_id: &str,
        username: Option<&str>,
    ) -> Result<(Account, bool), AccountApiError> {
        let mut last_error = None;
        for _ in 0..MAX_REFERRAL_CODE_ATTEMPTS {
            let mut account = NewAccount::new(external_id.to_string(), generate_referral_code());
            if let Some(name) = username {
                account = account.with_username(name);
            }
            match self.db.insert_account(account).await {
                Err(e @ AccountApiError::ReferralCodeTaken(_)) => {
                    debug!("🗃️ Referral code collision. Trying again.");
                    last_error = Some(e);
                },
                result => return result,
            }
        }
        Err(last_error.unwrap_or_else(|| AccountApiError::DatabaseError("Could not allocate a referral code".into())))
    }

    pub async fn account_by_id(&self, account_id: i64) -> Result<Option<Account>, AccountApiError> {
        self.db.fetch_account(account_id).await
    }

    pub async fn account_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AccountApiError> {
        self.db.fetch_account_by_external_id(external_id).await
    }

    pub async fn account_by_referral_code(&self, code: &str) -> Result<Option<Account>, AccountApiError> {
        self.db.fetch_account_by_referral_code(code).await
    }
}
