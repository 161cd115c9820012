//! Arbitrary-precision decimal floating-point arithmetic.
//!
//! `APFloat` stores a sign, an integer-part digit vector, and a fractional-part
//! digit vector (both big-endian, most significant digit first). Division and
//! exponentiation by a fraction both require an explicit precision bound since
//! a decimal quotient need not terminate; this is [`APFloat::MAX_SIGNIFICANT_FRAC_DIGITS`],
//! carried over unchanged from the original long-division cutoff.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::apint::{compare_digits, long_divide, strip_leading_zeros, sub_digits};

fn sub_digits_magnitude(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut result = sub_digits(a, b);
    strip_leading_zeros(&mut result);
    result
}

/// Arbitrary-precision decimal floating-point value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct APFloat {
    negative: bool,
    int_part: Vec<u8>,
    frac_part: Vec<u8>,
}

impl APFloat {
    /// Long division never produces more significant fractional digits than
    /// this; beyond it the remainder is discarded and the quotient truncated.
    /// Mirrors the original generator's division cutoff exactly.
    pub const MAX_SIGNIFICANT_FRAC_DIGITS: usize = 50;

    /// Constructs the value zero.
    pub fn zero() -> Self {
        APFloat { negative: false, int_part: vec![0], frac_part: vec![] }
    }

    fn normalize(negative: bool, mut int_part: Vec<u8>, mut frac_part: Vec<u8>) -> Self {
        strip_leading_zeros(&mut int_part);
        while frac_part.last() == Some(&0) {
            frac_part.pop();
        }
        let negative = negative && !(is_zero(&int_part) && frac_part.is_empty());
        APFloat { negative, int_part, frac_part }
    }

    /// Whether this value is exactly zero.
    pub fn is_zero(&self) -> bool {
        is_zero(&self.int_part) && self.frac_part.is_empty()
    }

    /// Whether this value is negative.
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Evaluates the value as an `f32` via Horner's method over the decimal
    /// digit vectors (no reliance on `str::parse`, mirroring the original's
    /// digit-by-digit accumulation so rounding behavior is ported rather than
    /// reinvented).
    pub fn to_f32(&self) -> f32 {
        self.to_f64() as f32
    }

    /// Evaluates the value as an `f64` via Horner's method.
    pub fn to_f64(&self) -> f64 {
        let mut int_val = 0f64;
        for &d in &self.int_part {
            int_val = int_val * 10.0 + d as f64;
        }
        let mut frac_val = 0f64;
        for &d in self.frac_part.iter().rev() {
            frac_val = (frac_val + d as f64) / 10.0;
        }
        let magnitude = int_val + frac_val;
        if self.negative { -magnitude } else { magnitude }
    }

    /// Truncates toward zero to an [`crate::apint::APInt`], discarding the
    /// fractional part entirely (no rounding).
    pub fn to_apint(&self) -> crate::apint::APInt {
        let s = if self.negative && !is_zero(&self.int_part) {
            format!("-{}", digits_to_string(&self.int_part))
        } else {
            digits_to_string(&self.int_part)
        };
        crate::apint::APInt::from_str(&s).expect("digit vector is always well-formed")
    }

    /// Raises `self` to the power of `exponent`.
    ///
    /// Integer exponents use binary exponentiation over repeated
    /// multiplication. A non-integer (fractional) exponent is a fatal
    /// compiler-internal error (spec.md §7 tier 2; the original asserts here
    /// because the language has no real-exponent builtin).
    pub fn pow(&self, exponent: &APFloat) -> APFloat {
        assert!(exponent.frac_part.is_empty(), "APFloat::pow: fractional exponent is not supported");
        if exponent.negative {
            // original semantics: integer power of a fraction < 1 truncates toward zero via apint rules.
            let positive_exp = APFloat { negative: false, ..exponent.clone() };
            let raised = self.pow(&positive_exp);
            let one = APFloat::from_str("1").unwrap();
            return one.div_with_precision(&raised, Self::MAX_SIGNIFICANT_FRAC_DIGITS);
        }
        if self.is_zero() {
            return if exponent.is_zero() { APFloat::from_str("1").unwrap() } else { APFloat::zero() };
        }
        if exponent.is_zero() {
            return APFloat::from_str("1").unwrap();
        }

        let exp_int = exponent.to_apint();
        let mut n = exp_int.to_u64().expect("exponent magnitude exceeds u64 range");
        let mut base = self.clone();
        let mut result = APFloat::from_str("1").unwrap();
        while n > 0 {
            if n % 2 == 1 {
                result = &result * &base;
            }
            base = &base * &base;
            n /= 2;
        }
        result
    }

    fn div_with_precision(&self, other: &APFloat, max_frac_digits: usize) -> APFloat {
        assert!(!other.is_zero(), "APFloat division by zero");

        let negative = self.negative != other.negative;

        let dividend = join(&self.int_part, &self.frac_part);
        let divisor = join(&other.int_part, &other.frac_part);

        let (mut quotient, mut remainder) = long_divide(&dividend, &divisor);
        strip_leading_zeros(&mut quotient);

        // Continue the division past the decimal point, one digit at a time,
        // up to `max_frac_digits` *significant* fractional digits -- leading
        // zeros right after the point (magnitudes below 0.1, e.g. 1/30 =
        // 0.0333...) don't count against the bound, only digits from the
        // first nonzero one onward do.
        let mut frac_digits = Vec::new();
        let mut produced = 0usize;
        let mut seen_nonzero = !is_zero(&quotient);
        while !is_zero(&remainder) && produced < max_frac_digits {
            remainder.push(0);
            strip_leading_zeros(&mut remainder);
            let mut count = 0u8;
            while compare_digits(&remainder, &divisor) != Ordering::Less {
                remainder = sub_digits_magnitude(&remainder, &divisor);
                count += 1;
            }
            frac_digits.push(count);
            if count != 0 {
                seen_nonzero = true;
            }
            if seen_nonzero {
                produced += 1;
            }
        }
        APFloat::normalize(negative, quotient, frac_digits)
    }
}

fn is_zero(digits: &[u8]) -> bool {
    digits.iter().all(|&d| d == 0)
}

fn digits_to_string(digits: &[u8]) -> String {
    digits.iter().map(|d| (b'0' + d) as char).collect()
}

// ---------------------------------------------------------------------------
// Parsing / formatting
// ---------------------------------------------------------------------------

impl FromStr for APFloat {
    type Err = std::convert::Infallible;

    /// Parses a decimal float literal (`-?[0-9]+(\.[0-9]+)?`).
    ///
    /// # Panics
    /// Panics on a malformed literal; the lexer/parser must never construct
    /// this from anything but a well-formed float token.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        assert!(!value.is_empty(), "APFloat::from_str: empty literal");
        let (negative, rest) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        let (int_str, frac_str) = match rest.split_once('.') {
            Some((i, f)) => (i, f),
            None => (rest, ""),
        };
        assert!(!int_str.is_empty(), "APFloat::from_str: missing integer part");
        let int_part: Vec<u8> = int_str
            .bytes()
            .map(|b| {
                assert!(b.is_ascii_digit(), "APFloat::from_str: non-digit in integer part");
                b - b'0'
            })
            .collect();
        let frac_part: Vec<u8> = frac_str
            .bytes()
            .map(|b| {
                assert!(b.is_ascii_digit(), "APFloat::from_str: non-digit in fractional part");
                b - b'0'
            })
            .collect();
        Ok(APFloat::normalize(negative, int_part, frac_part))
    }
}

impl fmt::Display for APFloat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "{}", digits_to_string(&self.int_part))?;
        if !self.frac_part.is_empty() {
            write!(f, ".{}", digits_to_string(&self.frac_part))?;
        }
        Ok(())
    }
}

impl PartialEq for APFloat {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for APFloat {}

impl PartialOrd for APFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for APFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => compare_magnitude(self, other),
            (true, true) => compare_magnitude(other, self),
        }
    }
}

fn compare_magnitude(a: &APFloat, b: &APFloat) -> Ordering {
    match compare_digits(&a.int_part, &b.int_part) {
        Ordering::Equal => compare_frac(&a.frac_part, &b.frac_part),
        other => other,
    }
}

fn compare_frac(a: &[u8], b: &[u8]) -> Ordering {
    let max_len = a.len().max(b.len());
    for i in 0..max_len {
        let da = a.get(i).copied().unwrap_or(0);
        let db = b.get(i).copied().unwrap_or(0);
        match da.cmp(&db) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    Ordering::Equal
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

impl std::ops::Add for &APFloat {
    type Output = APFloat;
    fn add(self, other: &APFloat) -> APFloat {
        let frac_len = self.frac_part.len().max(other.frac_part.len());
        let a_combined = join(&self.int_part, &scale_frac(&self.frac_part, frac_len));
        let b_combined = join(&other.int_part, &scale_frac(&other.frac_part, frac_len));

        let a_int = crate::apint::APInt::from_str(&digits_to_string(&a_combined)).unwrap();
        let b_int = crate::apint::APInt::from_str(&digits_to_string(&b_combined)).unwrap();
        let a_signed = if self.negative { &crate::apint::APInt::zero() - &a_int } else { a_int };
        let b_signed = if other.negative { &crate::apint::APInt::zero() - &b_int } else { b_int };
        let sum = &a_signed + &b_signed;
        let sum_negative = sum.is_negative();
        let magnitude_str = sum.to_canonical_string();
        let magnitude_str = magnitude_str.trim_start_matches('-');
        split_at_frac_len(magnitude_str, frac_len, sum_negative)
    }
}

impl std::ops::Sub for &APFloat {
    type Output = APFloat;
    fn sub(self, other: &APFloat) -> APFloat {
        if self.negative != other.negative {
            let other_flipped = APFloat { negative: !other.negative, ..other.clone() };
            return self + &other_flipped;
        }
        let frac_len = self.frac_part.len().max(other.frac_part.len());
        let a_scaled = join(&self.int_part, &scale_frac(&self.frac_part, frac_len));
        let b_scaled = join(&other.int_part, &scale_frac(&other.frac_part, frac_len));

        let a_int = crate::apint::APInt::from_str(&digits_to_string(&a_scaled)).unwrap();
        let b_int = crate::apint::APInt::from_str(&digits_to_string(&b_scaled)).unwrap();
        let a_signed = if self.negative { &crate::apint::APInt::zero() - &a_int } else { a_int };
        let b_signed = if other.negative { &crate::apint::APInt::zero() - &b_int } else { b_int };
        let diff = &a_signed - &b_signed;
        let diff_negative = diff.is_negative();
        let magnitude_str = diff.to_canonical_string();
        let magnitude_str = magnitude_str.trim_start_matches('-');
        split_at_frac_len(magnitude_str, frac_len, diff_negative)
    }
}

impl std::ops::Mul for &APFloat {
    type Output = APFloat;
    fn mul(self, other: &APFloat) -> APFloat {
        let frac_len = self.frac_part.len() + other.frac_part.len();
        let a_int = crate::apint::APInt::from_str(&digits_to_string(&join(&self.int_part, &self.frac_part))).unwrap();
        let b_int = crate::apint::APInt::from_str(&digits_to_string(&join(&other.int_part, &other.frac_part))).unwrap();
        let product = &a_int * &b_int;
        let negative = self.negative != other.negative;
        let magnitude_str = product.to_canonical_string();
        let magnitude_str = magnitude_str.trim_start_matches('-');
        split_at_frac_len(magnitude_str, frac_len, negative)
    }
}

impl std::ops::Div for &APFloat {
    type Output = APFloat;
    /// Division with the implementation's fixed significant-fractional-digit
    /// cutoff ([`APFloat::MAX_SIGNIFICANT_FRAC_DIGITS`]).
    ///
    /// # Panics
    /// Panics on division by zero.
    fn div(self, other: &APFloat) -> APFloat {
        self.div_with_precision(other, APFloat::MAX_SIGNIFICANT_FRAC_DIGITS)
    }
}

fn scale_frac(frac: &[u8], target_len: usize) -> Vec<u8> {
    let mut scaled = frac.to_vec();
    scaled.resize(target_len, 0);
    scaled
}

fn join(int_part: &[u8], frac_part: &[u8]) -> Vec<u8> {
    let mut combined = int_part.to_vec();
    combined.extend_from_slice(frac_part);
    combined
}

fn split_at_frac_len(magnitude: &str, frac_len: usize, negative: bool) -> APFloat {
    let digits: Vec<u8> = magnitude.bytes().map(|b| b - b'0').collect();
    let split_at = digits.len().saturating_sub(frac_len);
    let (int_digits, frac_digits) = digits.split_at(split_at);
    let mut int_part = int_digits.to_vec();
    if int_part.is_empty() {
        int_part.push(0);
    }
    APFloat::normalize(negative, int_part, frac_digits.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_roundtrip() {
        assert_eq!(APFloat::from_str("3.140").unwrap().to_string(), "3.14");
        assert_eq!(APFloat::from_str("-0.0").unwrap().to_string(), "0");
        assert_eq!(APFloat::from_str("5").unwrap().to_string(), "5");
    }

    #[test]
    fn add_basic() {
        let a = APFloat::from_str("1.5").unwrap();
        let b = APFloat::from_str("2.25").unwrap();
        assert_eq!((&a + &b).to_string(), "3.75");
    }

    #[test]
    fn sub_basic() {
        let a = APFloat::from_str("5.0").unwrap();
        let b = APFloat::from_str("2.5").unwrap();
        assert_eq!((&a - &b).to_string(), "2.5");
    }

    #[test]
    fn sub_goes_negative() {
        let a = APFloat::from_str("2.5").unwrap();
        let b = APFloat::from_str("5.0").unwrap();
        assert_eq!((&a - &b).to_string(), "-2.5");
    }

    #[test]
    fn mul_basic() {
        let a = APFloat::from_str("1.5").unwrap();
        let b = APFloat::from_str("2.0").unwrap();
        assert_eq!((&a * &b).to_string(), "3");
    }

    #[test]
    fn div_terminating() {
        let a = APFloat::from_str("10").unwrap();
        let b = APFloat::from_str("4").unwrap();
        assert_eq!((&a / &b).to_string(), "2.5");
    }

    #[test]
    fn div_truncates_at_precision_bound() {
        let a = APFloat::from_str("1").unwrap();
        let b = APFloat::from_str("3").unwrap();
        let quotient = &a / &b;
        let s = quotient.to_string();
        let frac = s.split('.').nth(1).unwrap();
        assert!(frac.len() <= APFloat::MAX_SIGNIFICANT_FRAC_DIGITS);
        assert!(frac.chars().all(|c| c == '3'));
    }

    #[test]
    #[should_panic(expected = "division by zero")]
    fn div_by_zero_panics() {
        let a = APFloat::from_str("1").unwrap();
        let z = APFloat::zero();
        let _ = &a / &z;
    }

    #[test]
    #[should_panic(expected = "fractional exponent")]
    fn pow_fractional_exponent_panics() {
        let base = APFloat::from_str("2").unwrap();
        let exp = APFloat::from_str("0.5").unwrap();
        let _ = base.pow(&exp);
    }

    #[test]
    fn pow_integer_exponent() {
        let base = APFloat::from_str("2.0").unwrap();
        let exp = APFloat::from_str("10").unwrap();
        assert_eq!(base.pow(&exp).to_string(), "1024");
    }

    #[test]
    fn ordering() {
        let a = APFloat::from_str("1.2").unwrap();
        let b = APFloat::from_str("1.25").unwrap();
        assert!(a < b);
        let neg = APFloat::from_str("-5").unwrap();
        assert!(neg < a);
    }

    #[test]
    fn to_apint_truncates() {
        let f = APFloat::from_str("9.999").unwrap();
        assert_eq!(f.to_apint().to_string(), "9");
        let neg = APFloat::from_str("-9.999").unwrap();
        assert_eq!(neg.to_apint().to_string(), "-9");
    }
}
