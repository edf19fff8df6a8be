//! Plain-text output.

use std::fmt::Write as _;

use super::AccountCredit;
use crate::core::models::GenerationOutput;

/// One URL per line; items without a URL print as `null`.
#[must_use]
pub fn render_generation(output: &GenerationOutput) -> String {
    output
        .urls()
        .into_iter()
        .map(|url| url.unwrap_or("null"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Aligned balance table, one row per account.
#[must_use]
pub fn render_credit(accounts: &[AccountCredit]) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<10} {:>8} {:>8} {:>8} {:>8}",
        "Account", "Gift", "Purchase", "VIP", "Total"
    );
    for account in accounts {
        let b = &account.balance;
        let _ = writeln!(
            out,
            "{:<10} {:>8} {:>8} {:>8} {:>8}",
            account.fingerprint,
            b.gift,
            b.purchase,
            b.vip,
            b.total()
        );
    }
    out.trim_end().to_string()
}
