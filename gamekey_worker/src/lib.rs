//! GameKey Worker
//!
//! The long-running half of the GameKey storefront. The bot front end takes orders and webhooks; this service keeps
//! external payments in step with the payment provider, delivers customer notifications and forwards operational
//! alerts to the admin chat.
//!
//! Configuration is read from the environment. See [`config::WorkerConfig::from_env_or_default`].
pub mod alerts;
pub mod cli;
pub mod config;
pub mod errors;
pub mod nowpayments;
pub mod reconcile_worker;
pub mod telegram;

#[cfg(test)]
mod test;
