use std::env;

const HELP: &str = include_str!("./cli-help.txt");

/// Variables shown by `--env`. Secrets are deliberately absent from this list.
const PUBLIC_ENVS: [&str; 14] = [
    "RUST_LOG",
    "GK_DATABASE_URL",
    "GK_DB_MAX_CONNECTIONS",
    "GK_PAYMENT_POLLER",
    "GK_PAYMENT_POLL_INTERVAL",
    "GK_PAYMENT_STALE_AFTER",
    "GK_REFUND_RETRY_ATTEMPTS",
    "GK_REFUND_RETRY_DELAY_MS",
    "GK_REFERRAL_SIGNUP_BONUS",
    "GK_REFERRAL_PURCHASE_BONUS",
    "GK_NOWPAYMENTS_API_URL",
    "GK_NOWPAYMENTS_PAY_CURRENCY",
    "GK_TELEGRAM_API_URL",
    "GK_ADMIN_CHAT_ID",
];

/// The worker is configured through the environment only. Returns true if an argument was given, in which case the
/// help text and the visible configuration have been printed and the worker should exit.
pub fn handle_command_line_args() -> bool {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        return false;
    }
    if !args.iter().any(|a| a == "--env") {
        println!("\n{HELP}\n");
    }
    println!("{}", env_report(|name| env::var(name).ok()));
    true
}

fn env_report<F: Fn(&str) -> Option<String>>(lookup: F) -> String {
    let mut lines = vec!["Configuration from the environment (secrets are not shown):".to_string()];
    lines.extend(PUBLIC_ENVS.iter().map(|&name| {
        let value = lookup(name).unwrap_or_else(|| "<default>".to_string());
        format!("  {name:<32} {value}")
    }));
    lines.join("\n")
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn report_marks_unset_variables() {
        let report = env_report(|name| (name == "GK_ADMIN_CHAT_ID").then(|| "-100200".to_string()));
        assert!(report.contains("GK_ADMIN_CHAT_ID                 -100200"));
        assert!(report.contains("GK_PAYMENT_POLLER                <default>"));
        assert!(!report.contains("TOKEN"));
        assert!(!report.contains("API_KEY"));
    }
}
