//! `credit` command: report each pooled account's balance.

use std::sync::Arc;

use crate::cli::context::CommandContext;
use crate::core::credit::CreditGate;
use crate::error::{GenError, Result};
use crate::render::{self, AccountCredit};

/// Execute the `credit` command. Balances are read only, never replenished.
///
/// # Errors
/// Fails with the first account whose balance query fails.
pub async fn execute(ctx: &CommandContext) -> Result<()> {
    let accounts = tokio::select! {
        biased;
        () = ctx.cancel.cancelled() => return Err(GenError::Cancelled),
        result = fetch_balances(ctx) => result?,
    };
    println!(
        "{}",
        render::render_credit(&accounts, ctx.config.format, ctx.config.pretty)?
    );
    Ok(())
}

/// Query every pooled credential in pool order.
///
/// # Errors
/// Propagates the first transport failure.
pub async fn fetch_balances(ctx: &CommandContext) -> Result<Vec<AccountCredit>> {
    let gate = CreditGate::new(Arc::clone(&ctx.transport));
    let mut accounts = Vec::with_capacity(ctx.pool.len());
    for credential in ctx.pool.iter() {
        let balance = gate.balance(credential).await?;
        accounts.push(AccountCredit {
            fingerprint: credential.fingerprint(),
            balance,
        });
    }
    Ok(accounts)
}
