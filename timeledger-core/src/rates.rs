//! Exchange-rate lookup against an external provider.
//!
//! Rates are for display only; nothing in the ledger converts currencies.
//! The provider is treated strictly: a non-200 answer, a missing symbol or a
//! non-positive rate all fail the whole request rather than returning a
//! partial table.

use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::Json;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::AppState;

/// Currencies the lookup accepts, as both base and target symbols.
pub const SUPPORTED_SYMBOLS: &[&str] = &["USD", "EUR", "GBP", "CAD", "AUD", "INR"];

fn is_supported(symbol: &str) -> bool {
    SUPPORTED_SYMBOLS.contains(&symbol)
}

#[derive(Debug, Default, Deserialize)]
pub struct RatesQuery {
    /// Base currency, defaults to USD
    pub base: Option<String>,

    /// Comma-separated target symbols, defaults to every supported symbol
    /// except the base
    pub symbols: Option<String>,
}

/// Rate table as returned by the provider and passed through to the UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatesResponse {
    pub base: String,
    pub rates: HashMap<String, Decimal>,
}

/// Normalizes and validates the query into a base plus target symbols.
fn parse_request(query: RatesQuery) -> Result<(String, Vec<String>), AppError> {
    let base = query
        .base
        .map(|b| b.trim().to_uppercase())
        .unwrap_or_else(|| "USD".to_string());
    if !is_supported(&base) {
        return Err(AppError::validation(
            "base",
            format!("unsupported base currency {base}"),
        ));
    }

    let symbols: Vec<String> = match query.symbols {
        Some(raw) => {
            let mut symbols = Vec::new();
            for part in raw.split(',') {
                let symbol = part.trim().to_uppercase();
                if symbol.is_empty() {
                    continue;
                }
                if !is_supported(&symbol) {
                    return Err(AppError::validation(
                        "symbols",
                        format!("unsupported currency {symbol}"),
                    ));
                }
                if !symbols.contains(&symbol) {
                    symbols.push(symbol);
                }
            }
            symbols
        }
        None => SUPPORTED_SYMBOLS
            .iter()
            .filter(|s| **s != base)
            .map(|s| s.to_string())
            .collect(),
    };

    if symbols.is_empty() {
        return Err(AppError::validation(
            "symbols",
            "at least one target symbol is required",
        ));
    }

    Ok((base, symbols))
}

/// Rejects rate tables that do not cover every requested symbol with a
/// positive rate.
fn check_rates(
    symbols: &[String],
    rates: &HashMap<String, Decimal>,
) -> Result<(), AppError> {
    for symbol in symbols {
        match rates.get(symbol) {
            None => {
                return Err(AppError::UpstreamService(format!(
                    "rate provider returned no rate for {symbol}"
                )))
            }
            Some(rate) if *rate <= Decimal::ZERO => {
                return Err(AppError::UpstreamService(format!(
                    "rate provider returned a non-positive rate for {symbol}"
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Fetches today's rates for the given base and symbols.
pub async fn fetch_rates(
    http: &reqwest::Client,
    rates_url: &str,
    base: &str,
    symbols: &[String],
) -> Result<RatesResponse, AppError> {
    let response = http
        .get(rates_url)
        .query(&[("base", base), ("symbols", &symbols.join(","))])
        .send()
        .await
        .map_err(|e| AppError::UpstreamService(format!("rate provider unreachable: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(AppError::UpstreamService(format!(
            "rate provider answered with {status}"
        )));
    }

    let table: RatesResponse = response
        .json()
        .await
        .map_err(|e| AppError::UpstreamService(format!("rate provider sent bad data: {e}")))?;

    check_rates(symbols, &table.rates)?;

    // Hand back exactly what was asked for, whatever else the provider sent.
    let rates = table
        .rates
        .into_iter()
        .filter(|(symbol, _)| symbols.contains(symbol))
        .collect();
    Ok(RatesResponse {
        base: base.to_string(),
        rates,
    })
}

/// GET /api/rates
pub async fn get_rates_handler(
    State(state): State<AppState>,
    Query(query): Query<RatesQuery>,
) -> Result<Json<RatesResponse>, AppError> {
    let (base, symbols) = parse_request(query)?;
    let table = fetch_rates(&state.http, &state.config.rates_url, &base, &symbols).await?;
    Ok(Json(table))
}
