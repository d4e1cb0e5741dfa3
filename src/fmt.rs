/// Format an amount with thousands separators and two decimals: 1,234.56.
/// Amounts are in the HOA's local currency, so no symbol is attached.
pub fn money(val: f64) -> String {
    let cents = format!("{:.2}", val.abs());
    let (int_part, dec_part) = cents.split_once('.').unwrap_or((&cents, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    if val < 0.0 && cents != "0.00" {
        format!("-{grouped}.{dec_part}")
    } else {
        format!("{grouped}.{dec_part}")
    }
}

/// A percentage with one decimal: 87.5%.
pub fn percent(val: f64) -> String {
    format!("{val:.1}%")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56), "1,234.56");
        assert_eq!(money(-500.00), "-500.00");
        assert_eq!(money(0.0), "0.00");
        assert_eq!(money(1000000.99), "1,000,000.99");
        assert_eq!(money(42.10), "42.10");
        assert_eq!(money(-0.001), "0.00");
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(87.5), "87.5%");
        assert_eq!(percent(100.0), "100.0%");
    }
}
