use std::{env, fmt::Display, str::FromStr, time::Duration as StdDuration};

use chrono::Duration;
use gamekey_common::{parse_boolean_flag, Coins, Secret};
use gamekey_engine::{
    store_api::config::{
        DEFAULT_FIRST_PURCHASE_BONUS,
        DEFAULT_REFUND_RETRY_ATTEMPTS,
        DEFAULT_REFUND_RETRY_DELAY,
        DEFAULT_SIGNUP_BONUS,
    },
    PurchaseConfig,
    ReferralConfig,
};
use log::*;

const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_PAYMENT_POLL_INTERVAL: StdDuration = StdDuration::from_secs(60);
const DEFAULT_PAYMENT_STALE_AFTER_HOURS: i64 = 24;
pub const DEFAULT_NOWPAYMENTS_API_URL: &str = "https://api.nowpayments.io/v1";
pub const DEFAULT_NOWPAYMENTS_PAY_CURRENCY: &str = "usdttrc20";
pub const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

#[derive(Clone, Debug)]
pub struct WorkerConfig {
    /// Empty means "let the engine decide", i.e. `GK_DATABASE_URL` or its built-in default.
    pub database_url: String,
    pub max_connections: u32,
    /// When false, the worker never asks the provider about pending payments. Webhooks must then do all the work.
    pub poller_enabled: bool,
    pub poll_interval: StdDuration,
    /// Pending payments older than this are expired by the poller.
    pub stale_after: Duration,
    pub purchase: PurchaseConfig,
    pub referral: ReferralConfig,
    pub nowpayments: NowPaymentsConfig,
    pub telegram: TelegramConfig,
}

#[derive(Clone, Debug)]
pub struct NowPaymentsConfig {
    pub api_url: String,
    pub api_key: Secret<String>,
    pub pay_currency: String,
    pub ipn_callback_url: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TelegramConfig {
    pub api_url: String,
    pub bot_token: Secret<String>,
    /// Where operational alerts are sent. Alerts are only logged when this is not set.
    pub admin_chat_id: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: String::default(),
            max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            poller_enabled: true,
            poll_interval: DEFAULT_PAYMENT_POLL_INTERVAL,
            stale_after: Duration::hours(DEFAULT_PAYMENT_STALE_AFTER_HOURS),
            purchase: PurchaseConfig::default(),
            referral: ReferralConfig::default(),
            nowpayments: NowPaymentsConfig::default(),
            telegram: TelegramConfig::default(),
        }
    }
}

impl Default for NowPaymentsConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_NOWPAYMENTS_API_URL.to_string(),
            api_key: Secret::default(),
            pay_currency: DEFAULT_NOWPAYMENTS_PAY_CURRENCY.to_string(),
            ipn_callback_url: None,
        }
    }
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self { api_url: DEFAULT_TELEGRAM_API_URL.to_string(), bot_token: Secret::default(), admin_chat_id: None }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("GK_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ GK_DATABASE_URL is not set. The engine will use its default database location.");
            String::default()
        });
        let max_connections = parse_env("GK_DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS);
        let poller_enabled = parse_boolean_flag(env::var("GK_PAYMENT_POLLER").ok(), true);
        let poll_secs = parse_env("GK_PAYMENT_POLL_INTERVAL", DEFAULT_PAYMENT_POLL_INTERVAL.as_secs());
        let poll_interval = StdDuration::from_secs(poll_secs.max(1));
        let stale_after = Duration::hours(parse_env("GK_PAYMENT_STALE_AFTER", DEFAULT_PAYMENT_STALE_AFTER_HOURS));
        let purchase = PurchaseConfig {
            refund_retry_attempts: parse_env("GK_REFUND_RETRY_ATTEMPTS", DEFAULT_REFUND_RETRY_ATTEMPTS),
            refund_retry_delay: StdDuration::from_millis(parse_env(
                "GK_REFUND_RETRY_DELAY_MS",
                DEFAULT_REFUND_RETRY_DELAY.as_millis() as u64,
            )),
        };
        let referral = ReferralConfig {
            signup_bonus: Coins::from(parse_env("GK_REFERRAL_SIGNUP_BONUS", DEFAULT_SIGNUP_BONUS)),
            first_purchase_bonus: Coins::from(parse_env("GK_REFERRAL_PURCHASE_BONUS", DEFAULT_FIRST_PURCHASE_BONUS)),
        };
        Self {
            database_url,
            max_connections,
            poller_enabled,
            poll_interval,
            stale_after,
            purchase,
            referral,
            nowpayments: NowPaymentsConfig::from_env_or_default(),
            telegram: TelegramConfig::from_env_or_default(),
        }
    }
}

impl NowPaymentsConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("GK_NOWPAYMENTS_API_URL").unwrap_or_else(|_| DEFAULT_NOWPAYMENTS_API_URL.into());
        let api_key = env::var("GK_NOWPAYMENTS_API_KEY").ok().unwrap_or_else(|| {
            error!("🪛️ GK_NOWPAYMENTS_API_KEY is not set. External payments will be rejected by the provider.");
            String::default()
        });
        let pay_currency =
            env::var("GK_NOWPAYMENTS_PAY_CURRENCY").unwrap_or_else(|_| DEFAULT_NOWPAYMENTS_PAY_CURRENCY.into());
        let ipn_callback_url = env::var("GK_NOWPAYMENTS_IPN_CALLBACK_URL").ok().filter(|s| !s.trim().is_empty());
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key: Secret::new(api_key),
            pay_currency,
            ipn_callback_url,
        }
    }
}

impl TelegramConfig {
    pub fn from_env_or_default() -> Self {
        let api_url = env::var("GK_TELEGRAM_API_URL").unwrap_or_else(|_| DEFAULT_TELEGRAM_API_URL.into());
        let bot_token = env::var("GK_TELEGRAM_BOT_TOKEN").ok().unwrap_or_else(|| {
            error!("🪛️ GK_TELEGRAM_BOT_TOKEN is not set. Customer notifications will not be delivered.");
            String::default()
        });
        let admin_chat_id = env::var("GK_ADMIN_CHAT_ID").ok().filter(|s| !s.trim().is_empty());
        if admin_chat_id.is_none() {
            info!("🪛️ GK_ADMIN_CHAT_ID is not set. Operational alerts will only be logged.");
        }
        Self { api_url: api_url.trim_end_matches('/').to_string(), bot_token: Secret::new(bot_token), admin_chat_id }
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            warn!("🪛️ {s} is not a valid value for {name}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default, {default}.");
            default
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        env::set_var("GK_TEST_PARSE_ENV_BAD", "ten");
        env::set_var("GK_TEST_PARSE_ENV_GOOD", " 25 ");
        assert_eq!(parse_env("GK_TEST_PARSE_ENV_BAD", 10u32), 10);
        assert_eq!(parse_env("GK_TEST_PARSE_ENV_GOOD", 10u32), 25);
        assert_eq!(parse_env("GK_TEST_PARSE_ENV_MISSING", -3i64), -3);
    }

    #[test]
    fn defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.poll_interval, StdDuration::from_secs(60));
        assert_eq!(config.stale_after, Duration::hours(24));
        assert_eq!(config.referral.signup_bonus, Coins::from(50));
        assert_eq!(config.nowpayments.api_url, DEFAULT_NOWPAYMENTS_API_URL);
        assert!(config.telegram.admin_chat_id.is_none());
    }

    #[test]
    fn secrets_stay_out_of_debug_output() {
        let mut config = WorkerConfig::default();
        config.telegram.bot_token = Secret::new("123456:SECRET".into());
        config.nowpayments.api_key = Secret::new("NP-SECRET".into());
        let printed = format!("{config:?}");
        assert!(!printed.contains("SECRET"));
    }
}
