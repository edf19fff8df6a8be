//! Robot-mode output (JSON).
//!
//! Generation results use the `{"created", "data": [{"url"}]}` shape so that
//! scripts written against image-generation APIs can consume them unchanged.

use serde::Serialize;

use super::AccountCredit;
use crate::core::models::GenerationOutput;
use crate::error::Result;

#[derive(Debug, Serialize)]
struct GenerationJson<'a> {
    created: i64,
    data: Vec<UrlJson<'a>>,
}

#[derive(Debug, Serialize)]
struct UrlJson<'a> {
    url: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct CreditJson<'a> {
    accounts: Vec<AccountJson<'a>>,
}

#[derive(Debug, Serialize)]
struct AccountJson<'a> {
    account: &'a str,
    gift: f64,
    purchase: f64,
    vip: f64,
    total: f64,
}

/// Render any value as JSON.
///
/// # Errors
/// Propagates serialization failures.
pub fn render_json<T: Serialize>(output: &T, pretty: bool) -> Result<String> {
    if pretty {
        Ok(serde_json::to_string_pretty(output)?)
    } else {
        Ok(serde_json::to_string(output)?)
    }
}

/// Render generation output.
///
/// # Errors
/// Propagates serialization failures.
pub fn render_generation_json(output: &GenerationOutput, created: i64, pretty: bool) -> Result<String> {
    let body = GenerationJson {
        created,
        data: output.urls().into_iter().map(|url| UrlJson { url }).collect(),
    };
    render_json(&body, pretty)
}

/// Render account balances.
///
/// # Errors
/// Propagates serialization failures.
pub fn render_credit_json(accounts: &[AccountCredit], pretty: bool) -> Result<String> {
    let body = CreditJson {
        accounts: accounts
            .iter()
            .map(|a| AccountJson {
                account: &a.fingerprint,
                gift: a.balance.gift,
                purchase: a.balance.purchase,
                vip: a.balance.vip,
                total: a.balance.total(),
            })
            .collect(),
    };
    render_json(&body, pretty)
}

/// Render an upload result.
///
/// # Errors
/// Propagates serialization failures.
pub fn render_upload_json(url: &str, pretty: bool) -> Result<String> {
    render_json(&serde_json::json!({ "url": url }), pretty)
}
