//! Input model for streamed funding.
//!
//! The user supplies any two of flow rate (tokens per second), duration
//! (seconds) and total amount (tokens); the third is derived. Derivation is
//! done in smallest units so no precision is lost before the contract call.

use alloy::primitives::U256;
use derive_more::Display;

use crate::errors::{FundingError, InputField, Result};
use crate::models::token::{to_human_amount, to_raw_amount};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StreamField {
    #[display(fmt = "flow rate")]
    FlowRate,
    #[display(fmt = "duration")]
    Duration,
    #[display(fmt = "total amount")]
    TotalAmount,
}

impl From<StreamField> for InputField {
    fn from(field: StreamField) -> Self {
        match field {
            StreamField::FlowRate => InputField::FlowRate,
            StreamField::Duration => InputField::Duration,
            StreamField::TotalAmount => InputField::TotalAmount,
        }
    }
}

/// Stream parameters ready for submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedStream {
    pub total_raw: U256,
    pub duration: u64,
    pub flow_rate_raw: U256,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamForm {
    flow_rate: String,
    duration: String,
    total_amount: String,
    last_edited: Option<StreamField>,
    decimals: u8,
}

impl StreamForm {
    pub fn new(decimals: u8) -> Self {
        Self {
            flow_rate: String::new(),
            duration: String::new(),
            total_amount: String::new(),
            last_edited: None,
            decimals,
        }
    }

    /// Builds a form from up to three inputs, deriving the missing one.
    ///
    /// Exactly two inputs must be present.
    pub fn from_inputs<'a>(
        decimals: u8,
        flow_rate: Option<&'a str>,
        duration: Option<&'a str>,
        total_amount: Option<&'a str>,
    ) -> Result<Self> {
        let present = |v: Option<&'a str>| v.filter(|s| !s.trim().is_empty());
        let mut form = Self::new(decimals);

        // Order the edits so the missing field is the one recomputed.
        match (present(flow_rate), present(duration), present(total_amount)) {
            (Some(rate), Some(duration), None) => {
                form.edit(StreamField::FlowRate, rate);
                form.edit(StreamField::Duration, duration);
            }
            (Some(rate), None, Some(total)) => {
                form.edit(StreamField::FlowRate, rate);
                form.edit(StreamField::TotalAmount, total);
            }
            (None, Some(duration), Some(total)) => {
                form.edit(StreamField::Duration, duration);
                form.edit(StreamField::TotalAmount, total);
            }
            _ => {
                return Err(FundingError::validation(
                    InputField::TotalAmount,
                    "provide exactly two of flow rate, duration and total amount",
                ))
            }
        }
        Ok(form)
    }

    pub fn flow_rate(&self) -> &str {
        &self.flow_rate
    }

    pub fn duration(&self) -> &str {
        &self.duration
    }

    pub fn total_amount(&self) -> &str {
        &self.total_amount
    }

    pub fn last_edited(&self) -> Option<StreamField> {
        self.last_edited
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Records a user edit and recomputes a dependent field when possible.
    ///
    /// Returns the field that was recomputed. The edited field itself is
    /// never overwritten, and nothing changes when derivation fails.
    pub fn edit(&mut self, field: StreamField, value: &str) -> Option<StreamField> {
        *self.field_mut(field) = value.to_string();
        self.last_edited = Some(field);

        let rate = self.parse_rate().ok();
        let duration = parse_duration(&self.duration).ok();
        let total = self.parse_total().ok();

        // A duration is only ever derived into a blank field, never over a typo.
        let duration_blank = self.duration.trim().is_empty();

        let (target, derived) = match field {
            StreamField::FlowRate => match (rate, duration, total) {
                (Some(rate), Some(duration), _) => (
                    StreamField::TotalAmount,
                    derive_total_amount(rate, duration).map(|t| self.human(t)),
                ),
                (Some(rate), None, Some(total)) if duration_blank => (
                    StreamField::Duration,
                    derive_duration(total, rate).map(|d| d.to_string()),
                ),
                _ => return None,
            },
            StreamField::Duration => match (rate, duration, total) {
                (Some(rate), Some(duration), _) => (
                    StreamField::TotalAmount,
                    derive_total_amount(rate, duration).map(|t| self.human(t)),
                ),
                (None, Some(duration), Some(total)) => (
                    StreamField::FlowRate,
                    derive_flow_rate(total, duration).map(|r| self.human(r)),
                ),
                _ => return None,
            },
            StreamField::TotalAmount => match (rate, duration, total) {
                (Some(rate), _, Some(total)) if duration_blank => (
                    StreamField::Duration,
                    derive_duration(total, rate).map(|d| d.to_string()),
                ),
                (_, Some(duration), Some(total)) => (
                    StreamField::FlowRate,
                    derive_flow_rate(total, duration).map(|r| self.human(r)),
                ),
                _ => return None,
            },
        };

        let derived = derived.ok()?;
        *self.field_mut(target) = derived;
        Some(target)
    }

    /// Validates all three fields and returns the values to submit.
    ///
    /// The total and duration are authoritative; the flow rate is recomputed
    /// from them so the submitted triple is consistent.
    pub fn resolve(&self) -> Result<ResolvedStream> {
        let total_raw = self.parse_total()?;
        let duration = parse_duration(&self.duration)?;
        let flow_rate_raw = derive_flow_rate(total_raw, duration)?;
        Ok(ResolvedStream {
            total_raw,
            duration,
            flow_rate_raw,
        })
    }

    fn parse_rate(&self) -> Result<U256> {
        to_raw_amount(InputField::FlowRate, &self.flow_rate, self.decimals)
    }

    fn parse_total(&self) -> Result<U256> {
        to_raw_amount(InputField::TotalAmount, &self.total_amount, self.decimals)
    }

    fn human(&self, raw: U256) -> String {
        to_human_amount(raw, self.decimals)
    }

    fn field_mut(&mut self, field: StreamField) -> &mut String {
        match field {
            StreamField::FlowRate => &mut self.flow_rate,
            StreamField::Duration => &mut self.duration,
            StreamField::TotalAmount => &mut self.total_amount,
        }
    }
}

/// Parses a duration in whole seconds.
pub fn parse_duration(value: &str) -> Result<u64> {
    let value = value.trim();
    if value.is_empty() {
        return Err(FundingError::validation(InputField::Duration, "is required"));
    }
    match value.parse::<u64>() {
        Ok(0) | Err(_) => Err(FundingError::validation(
            InputField::Duration,
            "must be a positive whole number of seconds",
        )),
        Ok(seconds) => Ok(seconds),
    }
}

pub fn derive_total_amount(flow_rate_raw: U256, duration: u64) -> Result<U256> {
    flow_rate_raw
        .checked_mul(U256::from(duration))
        .filter(|total| !total.is_zero())
        .ok_or_else(|| FundingError::validation(InputField::TotalAmount, "is out of range"))
}

/// Per-second rate that streams at most `total_raw` over `duration`.
pub fn derive_flow_rate(total_raw: U256, duration: u64) -> Result<U256> {
    if duration == 0 {
        return Err(FundingError::validation(
            InputField::Duration,
            "must be a positive whole number of seconds",
        ));
    }
    let rate = total_raw / U256::from(duration);
    if rate.is_zero() {
        return Err(FundingError::validation(
            InputField::FlowRate,
            "rounds to zero for this total amount and duration",
        ));
    }
    Ok(rate)
}

pub fn derive_duration(total_raw: U256, flow_rate_raw: U256) -> Result<u64> {
    if flow_rate_raw.is_zero() {
        return Err(FundingError::validation(
            InputField::FlowRate,
            "must be a positive number",
        ));
    }
    let duration = total_raw / flow_rate_raw;
    if duration.is_zero() {
        return Err(FundingError::validation(
            InputField::Duration,
            "rounds to zero for this total amount and flow rate",
        ));
    }
    u64::try_from(duration)
        .map_err(|_| FundingError::validation(InputField::Duration, "is out of range"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ether(value: u64) -> U256 {
        U256::from(value) * U256::from(10u64).pow(U256::from(18u64))
    }

    #[test]
    fn test_flow_rate_and_duration_derive_total() {
        let mut form = StreamForm::new(18);
        assert_eq!(form.edit(StreamField::FlowRate, "0.01"), None);
        assert_eq!(
            form.edit(StreamField::Duration, "86400"),
            Some(StreamField::TotalAmount)
        );
        assert_eq!(form.total_amount(), "864");
        assert_eq!(form.flow_rate(), "0.01");
    }

    #[test]
    fn test_total_with_duration_derives_flow_rate() {
        let mut form = StreamForm::new(18);
        form.edit(StreamField::Duration, "86400");
        assert_eq!(
            form.edit(StreamField::TotalAmount, "864"),
            Some(StreamField::FlowRate)
        );
        assert_eq!(form.flow_rate(), "0.01");
        assert_eq!(form.duration(), "86400");
    }

    #[test]
    fn test_total_with_blank_duration_derives_duration() {
        let mut form = StreamForm::new(18);
        form.edit(StreamField::FlowRate, "2");
        assert_eq!(
            form.edit(StreamField::TotalAmount, "100"),
            Some(StreamField::Duration)
        );
        assert_eq!(form.duration(), "50");
        assert_eq!(form.total_amount(), "100");
    }

    #[test]
    fn test_edited_field_is_never_overwritten() {
        let mut form = StreamForm::new(18);
        form.edit(StreamField::FlowRate, "1");
        form.edit(StreamField::Duration, "10");
        assert_eq!(form.total_amount(), "10");

        // Editing the total now recomputes the flow rate, not the total.
        assert_eq!(
            form.edit(StreamField::TotalAmount, "40"),
            Some(StreamField::FlowRate)
        );
        assert_eq!(form.total_amount(), "40");
        assert_eq!(form.flow_rate(), "4");
        assert_eq!(form.last_edited(), Some(StreamField::TotalAmount));
    }

    #[test]
    fn test_invalid_edit_leaves_other_fields_unchanged() {
        let mut form = StreamForm::new(18);
        form.edit(StreamField::FlowRate, "1");
        form.edit(StreamField::Duration, "10");
        assert_eq!(form.edit(StreamField::Duration, "ten"), None);
        assert_eq!(form.total_amount(), "10");
        assert_eq!(form.duration(), "ten");
        assert!(form.resolve().is_err());
    }

    #[test]
    fn test_round_trip_is_consistent() {
        let mut form = StreamForm::new(18);
        form.edit(StreamField::FlowRate, "0.01");
        form.edit(StreamField::Duration, "86400");
        let resolved = form.resolve().unwrap();
        assert_eq!(resolved.total_raw, ether(864));
        assert_eq!(resolved.duration, 86_400);
        assert_eq!(
            resolved.flow_rate_raw,
            U256::from(10_000_000_000_000_000u64)
        );
        assert_eq!(
            derive_total_amount(resolved.flow_rate_raw, resolved.duration).unwrap(),
            resolved.total_raw
        );
    }

    #[test]
    fn test_round_trip_holds_across_rates_and_decimals() {
        let rates = ["0.333333333333333333", "0.01", "1", "0.000001", "7", "1234.5678"];
        let durations = [1u64, 7, 3_600, 86_400, 2_592_000, 31_536_000];

        for decimals in [18u8, 6, 0] {
            for rate in rates {
                let rate_raw = match to_raw_amount(InputField::FlowRate, rate, decimals) {
                    Ok(raw) if !raw.is_zero() => raw,
                    _ => continue,
                };
                for duration in durations {
                    let total = derive_total_amount(rate_raw, duration).unwrap();
                    let derived = derive_duration(total, rate_raw).unwrap();
                    assert_eq!(derived, duration, "rate {} at {} decimals", rate, decimals);
                    assert_eq!(
                        derive_total_amount(rate_raw, derived).unwrap(),
                        total,
                        "rate {} over {}s at {} decimals",
                        rate,
                        duration,
                        decimals
                    );
                }
            }
        }
    }

    #[test]
    fn test_resolved_rate_follows_total_and_duration() {
        let form = StreamForm::from_inputs(18, Some("3"), None, Some("10")).unwrap();
        assert_eq!(form.duration(), "3");
        assert_eq!(form.flow_rate(), "3");

        let resolved = form.resolve().unwrap();
        assert_eq!(resolved.total_raw, ether(10));
        assert_eq!(resolved.duration, 3);
        assert_eq!(
            to_human_amount(resolved.flow_rate_raw, 18),
            "3.333333333333333333"
        );
    }

    #[test]
    fn test_flow_rate_edit_keeps_typed_duration() {
        let mut form = StreamForm::new(18);
        form.edit(StreamField::TotalAmount, "100");
        form.edit(StreamField::Duration, "1o0");
        assert_eq!(form.edit(StreamField::FlowRate, "2"), None);
        assert_eq!(form.duration(), "1o0");
        assert_eq!(form.total_amount(), "100");
        assert!(form.resolve().is_err());
    }

    #[test]
    fn test_derivations_reject_zero_results() {
        assert!(derive_flow_rate(U256::from(5u64), 10).is_err());
        assert!(derive_flow_rate(U256::from(5u64), 0).is_err());
        assert!(derive_duration(U256::from(5u64), U256::from(10u64)).is_err());
        assert!(derive_duration(U256::from(5u64), U256::ZERO).is_err());
        assert_eq!(
            derive_duration(U256::from(100u64), U256::from(3u64)).unwrap(),
            33
        );
    }

    #[test]
    fn test_from_inputs_requires_exactly_two() {
        assert!(StreamForm::from_inputs(18, Some("1"), None, None).is_err());
        assert!(StreamForm::from_inputs(18, Some("1"), Some("10"), Some("10")).is_err());

        let form = StreamForm::from_inputs(18, None, Some("100"), Some("50")).unwrap();
        assert_eq!(form.flow_rate(), "0.5");

        let form = StreamForm::from_inputs(6, Some("0.25"), None, Some("1")).unwrap();
        assert_eq!(form.duration(), "4");
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration(" 60 ").unwrap(), 60);
        assert!(parse_duration("0").is_err());
        assert!(parse_duration("1.5").is_err());
        assert!(parse_duration("").is_err());
    }
}
