mod credentials;
mod referral_code;

pub use credentials::Credential;
pub use referral_code::{generate_referral_code, is_valid_referral_code, REFERRAL_CODE_LENGTH};
