use bigdecimal::BigDecimal;
use num_traits::ToPrimitive;

pub trait BigDecimalHelpers {
    fn to_f64_or_zero(&self) -> f64;
}

impl BigDecimalHelpers for BigDecimal {
    fn to_f64_or_zero(&self) -> f64 {
        self.to_f64().unwrap_or(0.0)
    }
}

/// Rounds half away from zero to one decimal place.
pub fn round_to_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn converts_decimal_to_f64() {
        let value = BigDecimal::from_str("600000.50").unwrap();
        assert_eq!(value.to_f64_or_zero(), 600000.5);
    }

    #[test]
    fn rounds_to_one_decimal() {
        assert_eq!(round_to_one_decimal(4.25), 4.3);
        assert_eq!(round_to_one_decimal(4.333), 4.3);
        assert_eq!(round_to_one_decimal(0.0), 0.0);
    }
}
