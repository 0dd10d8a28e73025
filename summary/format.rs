//! C `%g` number formatting for header fields.

/// Significant digits printed by `%g`.
const PRECISION: usize = 6;

/// Formats `value` the way C's `printf("%g")` does: six significant digits,
/// fixed notation for exponents in `-4..6`, scientific notation otherwise, and
/// trailing zeros removed in both forms.
pub(crate) fn format_general(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Rounding to the target precision can carry into the next decade, so the
    // exponent is read back from the rounded scientific rendering.
    let scientific = format!("{:.*e}", PRECISION - 1, value);
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return scientific;
    };
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if exponent < -4 || exponent >= PRECISION as i32 {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            trim_fraction(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = (PRECISION as i32 - 1 - exponent) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}
