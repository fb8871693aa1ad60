//! Barcode (GTIN) checks

/// Placeholder codes found in supplier feeds that must not be imported
const PLACEHOLDER_BARCODES: [&str; 4] = ["0", "00000000", "0000000000000", "4017980000000"];

/// Digits only, at least 8 long, not a placeholder
pub fn is_valid_barcode(barcode: &str) -> bool {
    let code = barcode.trim();
    code.len() >= 8
        && code.chars().all(|c| c.is_ascii_digit())
        && !code.chars().all(|c| c == '0')
        && !PLACEHOLDER_BARCODES.contains(&code)
}

/// Remote barcode type for a code, derived from its length and prefix
pub fn barcode_type(barcode: &str) -> &'static str {
    let code = barcode.trim();
    match code.len() {
        13 if code.starts_with("978") || code.starts_with("979") => "ISBN",
        12 => "UPC-A",
        8 => "EAN-8",
        _ => "EAN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_barcode_validation() {
        assert!(is_valid_barcode("4006381333931"));
        assert!(is_valid_barcode(" 12345670 "));
        assert!(!is_valid_barcode("1234567"));
        assert!(!is_valid_barcode("40063813339AB"));
        assert!(!is_valid_barcode("4017980000000"));
        assert!(!is_valid_barcode("000000000000"));
        assert!(!is_valid_barcode(""));
    }

    #[test]
    fn test_barcode_type() {
        assert_eq!(barcode_type("9783161484100"), "ISBN");
        assert_eq!(barcode_type("4006381333931"), "EAN");
        assert_eq!(barcode_type("036000291452"), "UPC-A");
        assert_eq!(barcode_type("12345670"), "EAN-8");
    }
}
