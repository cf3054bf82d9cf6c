// VAT number format verification
//
// Only the format is checked here. Registry lookups (VIES) need network
// access and are left to the caller.

use serde::Serialize;

/// Country prefixes served by the EU VIES registry (`EL` is Greece, `XI` Northern Ireland)
pub const VIES_COUNTRIES: [&str; 28] = [
    "AT", "BE", "BG", "CY", "CZ", "DE", "DK", "EE", "EL", "ES",
    "FI", "FR", "HR", "HU", "IE", "IT", "LT", "LU", "LV", "MT",
    "NL", "PL", "PT", "RO", "SE", "SI", "SK", "XI",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VatCheck {
    pub valid: bool,
    pub country_code: String,
    pub vat_number: String,
    /// Country participates in VIES and could be verified online
    pub vies: bool,
    pub error: Option<String>,
}

/// Check a VAT number's format: two-letter country prefix followed by at
/// least two characters. Spaces and dashes are ignored, case is folded.
pub fn check_vat(input: &str) -> VatCheck {
    let clean: String = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .collect::<String>()
        .to_uppercase();

    let country_code: String = clean.chars().take(2).collect();
    let vat_number: String = clean.chars().skip(2).collect();

    let prefix_ok = country_code.len() == 2 && country_code.chars().all(|c| c.is_ascii_uppercase());
    let number_ok = vat_number.chars().count() >= 2
        && vat_number.chars().all(|c| c.is_ascii_alphanumeric());

    if !prefix_ok || !number_ok {
        return VatCheck {
            valid: false,
            country_code,
            vat_number,
            vies: false,
            error: Some("Invalid VAT number format. Use country code prefix (e.g., DK12345678)".to_string()),
        };
    }

    let vies = VIES_COUNTRIES.contains(&country_code.as_str());
    VatCheck { valid: true, country_code, vat_number, vies, error: None }
}
