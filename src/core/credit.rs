//! Per-account credit gating.
//!
//! Before every submission the live balance of the selected credential is
//! read. An exhausted account gets exactly one replenish call; nothing is
//! cached between orchestration calls.

use std::sync::Arc;

use reqwest::Method;
use serde_json::{Value, json};

use super::credentials::Credential;
use super::http::{RequestParts, Transport};
use super::models::CreditBalance;
use crate::error::Result;

pub const USER_CREDIT_PATH: &str = "/commerce/v1/benefits/user_credit";
pub const CREDIT_RECEIVE_PATH: &str = "/commerce/v1/benefits/credit_receive";

const REPLENISH_TIME_ZONE: &str = "Asia/Shanghai";

/// Reads and replenishes account credit through a [`Transport`].
#[derive(Clone)]
pub struct CreditGate {
    transport: Arc<dyn Transport>,
}

impl CreditGate {
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch the live balance for `credential`.
    ///
    /// # Errors
    /// Propagates any transport failure.
    pub async fn balance(&self, credential: &Credential) -> Result<CreditBalance> {
        let data = self
            .transport
            .call(
                Method::POST,
                USER_CREDIT_PATH,
                credential,
                RequestParts::new().json(json!({})),
            )
            .await?;
        Ok(parse_balance(&data))
    }

    /// Make sure `credential` has credit, replenishing once if it has none.
    ///
    /// Returns the balance observed before any replenish.
    ///
    /// # Errors
    /// A failed balance query or a failed replenish aborts the orchestration.
    pub async fn ensure_credit(&self, credential: &Credential) -> Result<CreditBalance> {
        let balance = self.balance(credential).await?;
        tracing::info!(
            credential = %credential.fingerprint(),
            gift = balance.gift,
            purchase = balance.purchase,
            vip = balance.vip,
            total = balance.total(),
            "Credit balance"
        );

        if balance.is_exhausted() {
            self.replenish(credential).await?;
        }
        Ok(balance)
    }

    async fn replenish(&self, credential: &Credential) -> Result<()> {
        tracing::info!(credential = %credential.fingerprint(), "Credit exhausted, claiming daily credit");
        let data = self
            .transport
            .call(
                Method::POST,
                CREDIT_RECEIVE_PATH,
                credential,
                RequestParts::new().json(json!({ "time_zone": REPLENISH_TIME_ZONE })),
            )
            .await?;
        let cur_total_credits = data.get("cur_total_credits").cloned().unwrap_or_default();
        let receive_quota = data.get("receive_quota").cloned().unwrap_or_default();
        tracing::info!(
            credential = %credential.fingerprint(),
            %cur_total_credits,
            %receive_quota,
            "Credit replenished"
        );
        Ok(())
    }
}

fn parse_balance(data: &Value) -> CreditBalance {
    let credit = data.get("credit");
    let part = |name: &str| {
        credit
            .and_then(|c| c.get(name))
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
    };
    CreditBalance {
        gift: part("gift_credit"),
        purchase: part("purchase_credit"),
        vip: part("vip_credit"),
    }
}
