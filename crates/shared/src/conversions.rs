//! Conversions between human decimal amounts, atomic integer amounts and
//! basis points. Amounts never touch floating point.

use anyhow::{bail, Context, Result};
use num::{BigUint, Integer, Zero};

/// Converts a human readable decimal amount into an atomic integer string
/// given the token's decimal precision. Excess fractional digits are
/// truncated, not rounded.
///
/// `human_to_atomic("0.5", 18)` is `"500000000000000000"`.
pub fn human_to_atomic(amount: &str, decimals: u32) -> Result<String> {
    let amount = amount.trim();
    if amount.is_empty() {
        bail!("empty amount");
    }

    let (whole, frac) = match amount.split_once('.') {
        Some((whole, frac)) => {
            if frac.contains('.') {
                bail!("invalid amount: multiple decimal points");
            }
            (whole, frac)
        }
        None => (amount, ""),
    };
    let whole = if whole.is_empty() { "0" } else { whole };

    let decimals = decimals as usize;
    let mut frac = frac.to_string();
    if frac.len() > decimals {
        frac.truncate(decimals);
    } else {
        frac.extend(std::iter::repeat('0').take(decimals - frac.len()));
    }

    let combined = format!("{whole}{frac}");
    let value = BigUint::parse_bytes(combined.as_bytes(), 10)
        .with_context(|| format!("invalid amount: {amount:?}"))?;
    Ok(value.to_string())
}

/// Converts an atomic integer amount back to a human readable decimal string
/// with trailing zeros removed. Unparseable input renders as `"0"`.
pub fn atomic_to_human(atomic: &str, decimals: u32) -> String {
    let value = match BigUint::parse_bytes(atomic.as_bytes(), 10) {
        Some(value) => value,
        None => return "0".to_string(),
    };
    if decimals == 0 {
        return value.to_string();
    }

    let divisor = BigUint::from(10u32).pow(decimals);
    let (whole, remainder) = value.div_rem(&divisor);
    if remainder.is_zero() {
        return whole.to_string();
    }

    let frac = format!("{remainder:0>width$}", width = decimals as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

/// Converts a user facing slippage percentage like `"0.5"` to basis points.
/// An empty string means the 1% default. Results outside [1, 5000] are
/// rejected.
pub fn slippage_to_bps(percent: &str) -> Result<u32> {
    let percent = percent.trim();
    if percent.is_empty() {
        return Ok(100);
    }
    // Slippage is a small user facing number, not a financial amount, so
    // float precision is acceptable here.
    let value: f64 = percent
        .parse()
        .with_context(|| format!("invalid slippage: {percent:?}"))?;
    let bps = (value * 100.0) as i64;
    if !(1..=5000).contains(&bps) {
        bail!("slippage out of range: {bps} bps");
    }
    Ok(bps as u32)
}
