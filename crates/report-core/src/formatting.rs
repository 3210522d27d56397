/// Format a floating-point number with thousands separators and a fixed number
/// of decimal places.
///
/// # Examples
///
/// ```
/// use report_core::formatting::format_number;
///
/// assert_eq!(format_number(1234.5,  1), "1,234.5");
/// assert_eq!(format_number(1234567.0, 0), "1,234,567");
/// assert_eq!(format_number(0.0, 2), "0.00");
/// assert_eq!(format_number(-9876.5, 1), "-9,876.5");
/// assert_eq!(format_number(f64::NAN, 2), "n/a");
/// ```
pub fn format_number(value: f64, decimals: u32) -> String {
    if !value.is_finite() {
        return NOT_A_NUMBER.to_string();
    }

    let negative = value < 0.0;
    let abs_value = value.abs();

    // Nudge by half an ULP at the target precision so exact midpoints round up.
    let factor = 10_f64.powi(decimals as i32);
    let epsilon = f64::EPSILON * abs_value * factor;
    let rounded = ((abs_value * factor) + epsilon).round() / factor;

    let integer_part = rounded.trunc() as u64;
    let grouped = group_thousands(&integer_part.to_string());

    let result = if decimals == 0 {
        grouped
    } else {
        let frac_str = format!("{:.prec$}", rounded - rounded.trunc(), prec = decimals as usize);
        // "0.50" -> ".50"
        format!("{}{}", grouped, &frac_str[1..])
    };

    if negative && rounded != 0.0 {
        format!("-{}", result)
    } else {
        result
    }
}

/// Format a count with thousands separators.
///
/// ```
/// use report_core::formatting::format_count;
///
/// assert_eq!(format_count(1_234_567), "1,234,567");
/// assert_eq!(format_count(12), "12");
/// ```
pub fn format_count(value: u64) -> String {
    group_thousands(&value.to_string())
}

/// Format a monetary amount as a USD string with two decimal places and
/// thousands separators. Negative savings keep the sign before the symbol.
///
/// ```
/// use report_core::formatting::format_currency;
///
/// assert_eq!(format_currency(1234.56),  "$1,234.56");
/// assert_eq!(format_currency(0.0),      "$0.00");
/// assert_eq!(format_currency(-9.99),    "-$9.99");
/// ```
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return NOT_A_NUMBER.to_string();
    }
    let body = format_number(amount.abs(), 2);
    if amount < 0.0 && body != "0.00" {
        format!("-${}", body)
    } else {
        format!("${}", body)
    }
}

/// Format a value already expressed in percent.
///
/// ```
/// use report_core::formatting::format_percentage;
///
/// assert_eq!(format_percentage(87.5, 1), "87.5%");
/// assert_eq!(format_percentage(100.0, 0), "100%");
/// ```
pub fn format_percentage(percent: f64, decimals: u32) -> String {
    if !percent.is_finite() {
        return NOT_A_NUMBER.to_string();
    }
    format!("{}%", format_number(percent, decimals))
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Shown in place of `NaN` and infinities.
const NOT_A_NUMBER: &str = "n/a";

/// Insert commas every three digits from the right of an integer string.
fn group_thousands(s: &str) -> String {
    if s.len() <= 3 {
        return s.to_string();
    }
    let chars: Vec<char> = s.chars().collect();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    let remainder = chars.len() % 3;
    for (i, &c) in chars.iter().enumerate() {
        if i != 0 && (i % 3 == remainder) {
            result.push(',');
        }
        result.push(c);
    }
    result
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_number_zero() {
        assert_eq!(format_number(0.0, 0), "0");
        assert_eq!(format_number(0.0, 2), "0.00");
    }

    #[test]
    fn test_format_number_with_thousands() {
        assert_eq!(format_number(1_234.5, 1), "1,234.5");
        assert_eq!(format_number(1_000.0, 0), "1,000");
    }

    #[test]
    fn test_format_number_negative() {
        assert_eq!(format_number(-9_876.5, 1), "-9,876.5");
    }

    #[test]
    fn test_format_number_negative_rounding_to_zero_has_no_sign() {
        assert_eq!(format_number(-0.001, 2), "0.00");
    }

    #[test]
    fn test_format_number_rounds_up() {
        assert_eq!(format_number(1.005, 2), "1.01");
    }

    #[test]
    fn test_non_finite_values_render_as_placeholder() {
        assert_eq!(format_number(f64::NAN, 2), "n/a");
        assert_eq!(format_number(f64::INFINITY, 0), "n/a");
        assert_eq!(format_currency(f64::NAN), "n/a");
        assert_eq!(format_currency(f64::NEG_INFINITY), "n/a");
        assert_eq!(format_percentage(f64::NAN, 1), "n/a");
    }

    #[test]
    fn test_format_count() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(1_000), "1,000");
    }

    #[test]
    fn test_format_currency_negative() {
        assert_eq!(format_currency(-1_234.5), "-$1,234.50");
    }

    #[test]
    fn test_format_currency_large() {
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
    }

    #[test]
    fn test_format_percentage() {
        assert_eq!(format_percentage(0.0, 1), "0.0%");
        assert_eq!(format_percentage(33.333, 2), "33.33%");
    }
}
