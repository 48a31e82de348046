use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub const REFERRAL_CODE_LENGTH: usize = 8;

/// Generates a random upper-case alphanumeric referral code. Uniqueness is enforced by the database, so callers must
/// be prepared to retry on a collision.
pub fn generate_referral_code() -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(REFERRAL_CODE_LENGTH)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect()
}

pub fn is_valid_referral_code(code: &str) -> bool {
    code.len() == REFERRAL_CODE_LENGTH && code.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn generated_codes_are_valid() {
        for _ in 0..100 {
            let code = generate_referral_code();
            assert!(is_valid_referral_code(&code), "{code}");
        }
        assert!(!is_valid_referral_code("abc"));
        assert!(!is_valid_referral_code("abcdefgh"));
    }
}
