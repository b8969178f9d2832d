// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Destination address normalization.
//!
//! The provider addresses individual accounts as `<digits>@c.us`. User
//! input arrives as phone numbers in whatever shape the tenant's customers
//! typed them, so everything funnels through [`to_provider_address`] before
//! touching the provider.

use courier_core::CourierError;

const INDIVIDUAL_SUFFIX: &str = "@c.us";

/// Length of a bare national number that gets the default country code
/// prepended. Longer digit strings are assumed to already carry one.
const NATIONAL_NUMBER_LEN: usize = 10;

/// Normalize a raw phone number into a provider address.
///
/// Already-suffixed addresses (as seen on inbound traffic) pass through
/// untouched. Otherwise all non-digits are stripped, a leading `0` is
/// replaced by the default country code, a bare 10-digit national number is
/// prefixed with it, and the individual-account suffix is appended.
pub fn to_provider_address(raw: &str, default_country_code: &str) -> Result<String, CourierError> {
    if raw.contains('@') {
        return Ok(raw.to_string());
    }
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(CourierError::InvalidAddress(raw.to_string()));
    }
    let normalized = if let Some(rest) = digits.strip_prefix('0') {
        if rest.is_empty() {
            return Err(CourierError::InvalidAddress(raw.to_string()));
        }
        format!("{default_country_code}{rest}")
    } else if digits.len() == NATIONAL_NUMBER_LEN {
        format!("{default_country_code}{digits}")
    } else {
        digits
    };
    Ok(format!("{normalized}{INDIVIDUAL_SUFFIX}"))
}
