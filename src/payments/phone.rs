//! Phone and amount canonicalization shared by every boundary that accepts
//! payment input. The rules are a fixed contract, applied identically on the
//! client-facing and provider-facing side.

const COUNTRY_CODE: &str = "254";
const SUBSCRIBER_PREFIX: char = '7';

/// Canonicalize a freeform Kenyan phone number into `254XXXXXXXXX` form.
///
/// Strips all non-digit characters, then accepts, in order:
/// a 12-digit string already starting with the country code, a 10-digit
/// string with a leading zero, or a bare 9-digit subscriber number starting
/// with `7`. Anything else is rejected.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    if digits.starts_with(COUNTRY_CODE) && digits.len() == 12 {
        return Some(digits);
    }
    if digits.starts_with('0') && digits.len() == 10 {
        return Some(format!("{COUNTRY_CODE}{}", &digits[1..]));
    }
    if digits.starts_with(SUBSCRIBER_PREFIX) && digits.len() == 9 {
        return Some(format!("{COUNTRY_CODE}{digits}"));
    }
    None
}

/// Round to the nearest whole unit; rejects non-finite values and anything
/// below 1.
pub fn normalize_amount(raw: f64) -> Option<u64> {
    if !raw.is_finite() {
        return None;
    }
    let rounded = raw.round();
    if rounded < 1.0 {
        return None;
    }
    Some(rounded as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_forms_are_equivalent() {
        assert_eq!(normalize_phone("0710236087").as_deref(), Some("254710236087"));
        assert_eq!(normalize_phone("710236087").as_deref(), Some("254710236087"));
        assert_eq!(
            normalize_phone("254710236087").as_deref(),
            Some("254710236087")
        );
    }

    #[test]
    fn leading_zero_numbers_keep_their_last_nine_digits() {
        for subscriber in ["710236087", "722000111", "799999999"] {
            let canonical = normalize_phone(&format!("0{subscriber}")).expect("valid");
            assert_eq!(canonical.len(), 12);
            assert!(canonical.starts_with("254"));
            assert_eq!(&canonical[3..], subscriber);
        }
    }

    #[test]
    fn formatting_characters_are_stripped() {
        assert_eq!(
            normalize_phone("+254 710-236-087").as_deref(),
            Some("254710236087")
        );
        assert_eq!(
            normalize_phone("(0710) 236 087").as_deref(),
            Some("254710236087")
        );
    }

    #[test]
    fn garbage_and_short_inputs_are_rejected() {
        assert_eq!(normalize_phone(""), None);
        assert_eq!(normalize_phone("hello"), None);
        assert_eq!(normalize_phone("12345"), None);
        assert_eq!(normalize_phone("07102360"), None); // 8 significant digits
        assert_eq!(normalize_phone("25471023608"), None); // 11 digits
        assert_eq!(normalize_phone("2547102360877"), None); // 13 digits
    }

    #[test]
    fn wrong_prefix_nine_digit_is_rejected() {
        assert_eq!(normalize_phone("810236087"), None);
    }

    #[test]
    fn amounts_round_and_reject_out_of_range() {
        assert_eq!(normalize_amount(1.0), Some(1));
        assert_eq!(normalize_amount(1500.0), Some(1500));
        assert_eq!(normalize_amount(99.6), Some(100));
        assert_eq!(normalize_amount(0.0), None);
        assert_eq!(normalize_amount(-5.0), None);
        assert_eq!(normalize_amount(0.4), None);
        assert_eq!(normalize_amount(f64::NAN), None);
        assert_eq!(normalize_amount(f64::INFINITY), None);
    }
}
