/// Render a minimal-unit amount as a decimal string.
///
/// KILT amounts carry 15 decimal places (femto), so
/// `500000000000000` renders as `0.5`.
///
/// # Examples
/// ```
/// use reward_scanner::utils::format::format_amount;
///
/// assert_eq!(format_amount(500_000_000_000_000, 15), "0.5");
/// assert_eq!(format_amount(0, 15), "0");
/// assert_eq!(format_amount(42, 0), "42");
/// ```
pub fn format_amount(minimal_units: u128, decimals: u32) -> String {
    // 10^39 overflows u128; anything on chain fits well below that.
    let decimals = decimals.min(38);
    let base = 10u128.pow(decimals);

    let whole = minimal_units / base;
    let frac = minimal_units % base;

    if frac == 0 {
        return whole.to_string();
    }

    let frac_str = format!("{:0width$}", frac, width = decimals as usize);
    format!("{}.{}", whole, frac_str.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(0, 15), "0");
        assert_eq!(format_amount(1, 15), "0.000000000000001");
        assert_eq!(format_amount(500_000_000_000_000, 15), "0.5");
        assert_eq!(format_amount(1_000_000_000_000_000, 15), "1");
        assert_eq!(format_amount(1_234_500_000_000_000_000, 15), "1234.5");
        assert_eq!(format_amount(1_000_000_000_000_001, 15), "1.000000000000001");
        assert_eq!(format_amount(42, 0), "42");
    }
}
