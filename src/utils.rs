use alloy::primitives::utils::format_units;
use alloy::primitives::{Address, I256, U256};

const SECONDS_PER_HOUR: f64 = 3_600.0;
const SECONDS_PER_DAY: f64 = 86_400.0;
const SECONDS_PER_MONTH: f64 = 2_592_000.0;

/// `0x1234...5678` form of an address.
pub fn format_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}

/// Whole-token amount with exactly `display_decimals` fractional digits, truncated.
pub fn format_token_amount(raw: U256, decimals: u8, display_decimals: usize) -> String {
    let formatted = format_units(raw, decimals).unwrap_or_else(|_| raw.to_string());
    let (whole, fraction) = formatted.split_once('.').unwrap_or((&formatted, ""));
    if display_decimals == 0 {
        return whole.to_string();
    }
    let mut fraction: String = fraction.chars().take(display_decimals).collect();
    while fraction.len() < display_decimals {
        fraction.push('0');
    }
    format!("{}.{}", whole, fraction)
}

/// Flow rate scaled to the largest unit of time that keeps it readable.
pub fn format_flow_rate(raw: I256, decimals: u8) -> String {
    let per_second = format_units(raw, decimals)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0);
    let magnitude = per_second.abs();

    if per_second == 0.0 || magnitude >= 0.01 {
        format!("{:.6} / second", per_second)
    } else if magnitude < 0.000001 {
        format!("{:.6} / month", per_second * SECONDS_PER_MONTH)
    } else if magnitude < 0.0001 {
        format!("{:.6} / day", per_second * SECONDS_PER_DAY)
    } else {
        format!("{:.6} / hour", per_second * SECONDS_PER_HOUR)
    }
}

pub fn truncate_string(value: &str, max_len: usize) -> String {
    if value.chars().count() <= max_len {
        return value.to_string();
    }
    let kept: String = value.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
}
