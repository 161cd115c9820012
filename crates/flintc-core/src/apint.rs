//! Arbitrary-precision decimal integer arithmetic.
//!
//! `APInt` stores a sign flag and a big-endian vector of decimal digits
//! (`0..=9`, most significant first). All public arithmetic returns fresh
//! values; construction from a malformed string is a fatal programmer error
//! (spec.md §7 tier 2), matching the original `assert`-based implementation
//! this was ported from.
//!
//! Invariants (checked by `debug_assert!` at the boundary of every operation
//! that could violate them): the digit vector is never empty; there is no
//! leading zero except for the single-digit value `0`; `0` is never negative.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// An arbitrary-precision decimal integer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct APInt {
    negative: bool,
    /// Big-endian decimal digits, `0..=9`. Never empty; no leading zero
    /// except for the lone digit representing zero.
    digits: Vec<u8>,
}

impl APInt {
    /// Constructs the value zero.
    pub fn zero() -> Self {
        APInt {
            negative: false,
            digits: vec![0],
        }
    }

    /// Constructs an `APInt` from a native `i64`, for convenience in callers
    /// that fold small constants.
    pub fn from_i64(value: i64) -> Self {
        Self::from_str(&value.to_string()).expect("i64::to_string is always well-formed")
    }

    fn from_digits(negative: bool, mut digits: Vec<u8>) -> Self {
        strip_leading_zeros(&mut digits);
        let negative = negative && !is_zero_digits(&digits);
        APInt { negative, digits }
    }

    /// Whether this value is negative (never true for zero).
    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Whether this value is exactly zero.
    pub fn is_zero(&self) -> bool {
        is_zero_digits(&self.digits)
    }

    /// The canonical decimal string form (no leading zeros, no `-0`).
    pub fn to_canonical_string(&self) -> String {
        self.to_string()
    }

    /// Converts to an unsigned `N`-bit integer. Returns `None` if the value
    /// is negative or too big to fit.
    fn to_unsigned<T>(&self, max_digits: &[u8]) -> Option<T>
    where
        T: Copy + From<u8> + std::ops::Shl<u32, Output = T> + std::ops::Add<Output = T>,
    {
        if self.negative {
            return None;
        }
        if compare_digits(&self.digits, max_digits) == Ordering::Greater {
            return None;
        }
        let mut result = T::from(0u8);
        for &d in &self.digits {
            // result * 10 == (result << 3) + (result << 1), per spec.md §4.1.1.
            result = (result << 3) + (result << 1) + T::from(d);
        }
        Some(result)
    }

    /// Converts to `u8`. `None` if negative or out of range.
    pub fn to_u8(&self) -> Option<u8> {
        self.to_unsigned(&max_unsigned_digits(8))
    }
    /// Converts to `u16`. `None` if negative or out of range.
    pub fn to_u16(&self) -> Option<u16> {
        self.to_unsigned(&max_unsigned_digits(16))
    }
    /// Converts to `u32`. `None` if negative or out of range.
    pub fn to_u32(&self) -> Option<u32> {
        self.to_unsigned(&max_unsigned_digits(32))
    }
    /// Converts to `u64`. `None` if negative or out of range.
    pub fn to_u64(&self) -> Option<u64> {
        self.to_unsigned(&max_unsigned_digits(64))
    }

    /// Converts to `i8`. `None` if out of range.
    pub fn to_i8(&self) -> Option<i8> {
        self.to_signed_via_u8(8, i8::MIN)
    }
    /// Converts to `i16`. `None` if out of range.
    pub fn to_i16(&self) -> Option<i16> {
        self.to_signed_via_u16(16, i16::MIN)
    }
    /// Converts to `i32`. `None` if out of range.
    pub fn to_i32(&self) -> Option<i32> {
        self.to_signed_via_u32(32, i32::MIN)
    }
    /// Converts to `i64`. `None` if out of range.
    pub fn to_i64(&self) -> Option<i64> {
        self.to_signed_via_u64(64, i64::MIN)
    }

    // The four conversions below accumulate the magnitude in the
    // *unsigned* counterpart of the target width rather than the signed
    // type itself: the magnitude of `$signed::MIN` (e.g. `2147483648` for
    // `i32`) does not fit in the signed type, so accumulating it there
    // would overflow before the final negation ever runs. `$signed::MIN`
    // itself is special-cased since `-(magnitude as $signed)` would still
    // overflow for exactly that one magnitude.

    fn to_signed_via_u8(&self, bits: u32, min: i8) -> Option<i8> {
        if self.negative {
            if compare_digits(&self.digits, &min_signed_digits(bits)) == Ordering::Greater {
                return None;
            }
            let mut magnitude: u8 = 0;
            for &d in &self.digits {
                magnitude = (magnitude << 3) + (magnitude << 1) + d;
            }
            if magnitude == min.unsigned_abs() {
                return Some(min);
            }
            Some(-(magnitude as i8))
        } else {
            if compare_digits(&self.digits, &max_signed_digits(bits)) == Ordering::Greater {
                return None;
            }
            let mut magnitude: u8 = 0;
            for &d in &self.digits {
                magnitude = (magnitude << 3) + (magnitude << 1) + d;
            }
            Some(magnitude as i8)
        }
    }

    fn to_signed_via_u16(&self, bits: u32, min: i16) -> Option<i16> {
        if self.negative {
            if compare_digits(&self.digits, &min_signed_digits(bits)) == Ordering::Greater {
                return None;
            }
            let mut magnitude: u16 = 0;
            for &d in &self.digits {
                magnitude = (magnitude << 3) + (magnitude << 1) + d as u16;
            }
            if magnitude == min.unsigned_abs() {
                return Some(min);
            }
            Some(-(magnitude as i16))
        } else {
            if compare_digits(&self.digits, &max_signed_digits(bits)) == Ordering::Greater {
                return None;
            }
            let mut magnitude: u16 = 0;
            for &d in &self.digits {
                magnitude = (magnitude << 3) + (magnitude << 1) + d as u16;
            }
            Some(magnitude as i16)
        }
    }

    fn to_signed_via_u32(&self, bits: u32, min: i32) -> Option<i32> {
        if self.negative {
            if compare_digits(&self.digits, &min_signed_digits(bits)) == Ordering::Greater {
                return None;
            }
            let mut magnitude: u32 = 0;
            for &d in &self.digits {
                magnitude = (magnitude << 3) + (magnitude << 1) + d as u32;
            }
            if magnitude == min.unsigned_abs() {
                return Some(min);
            }
            Some(-(magnitude as i32))
        } else {
            if compare_digits(&self.digits, &max_signed_digits(bits)) == Ordering::Greater {
                return None;
            }
            let mut magnitude: u32 = 0;
            for &d in &self.digits {
                magnitude = (magnitude << 3) + (magnitude << 1) + d as u32;
            }
            Some(magnitude as i32)
        }
    }

    fn to_signed_via_u64(&self, bits: u32, min: i64) -> Option<i64> {
        if self.negative {
            if compare_digits(&self.digits, &min_signed_digits(bits)) == Ordering::Greater {
                return None;
            }
            let mut magnitude: u64 = 0;
            for &d in &self.digits {
                magnitude = (magnitude << 3) + (magnitude << 1) + d as u64;
            }
            if magnitude == min.unsigned_abs() {
                return Some(min);
            }
            Some(-(magnitude as i64))
        } else {
            if compare_digits(&self.digits, &max_signed_digits(bits)) == Ordering::Greater {
                return None;
            }
            let mut magnitude: u64 = 0;
            for &d in &self.digits {
                magnitude = (magnitude << 3) + (magnitude << 1) + d as u64;
            }
            Some(magnitude as i64)
        }
    }

    /// Raises `self` to the power of a non-negative `exponent` using binary
    /// exponentiation. A negative exponent yields `0` (integer division
    /// semantics, matching the original). `0^0 == 1` by convention.
    pub fn pow(&self, exponent: &APInt) -> APInt {
        if exponent.negative {
            return APInt::zero();
        }
        if self.is_zero() {
            return if exponent.is_zero() { APInt::from_i64(1) } else { APInt::zero() };
        }
        if exponent.is_zero() {
            return APInt::from_i64(1);
        }
        if exponent.digits == [1] {
            return self.clone();
        }

        let result_negative = self.negative && exponent.digits.last().copied().unwrap_or(0) % 2 == 1;

        let mut base = APInt {
            negative: false,
            digits: self.digits.clone(),
        };
        let mut exp = exponent.clone();
        let mut result = APInt::from_i64(1);

        while !exp.is_zero() {
            if exp.digits.last().copied().unwrap_or(0) % 2 == 1 {
                result = &result * &base;
            }
            base = &base * &base;
            exp = divide_by_two(&exp);
        }

        result.negative = result_negative && !result.is_zero();
        result
    }
}

// ---------------------------------------------------------------------------
// Parsing / formatting
// ---------------------------------------------------------------------------

impl FromStr for APInt {
    type Err = std::convert::Infallible;

    /// Parses a decimal integer literal, with an optional leading `-`.
    ///
    /// # Panics
    /// Panics on a malformed literal (empty digit run, non-digit character).
    /// Per spec.md §7 tier 2, this is a fatal compiler-internal error: the
    /// lexer/parser must never hand this constructor anything but a
    /// well-formed integer literal.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        assert!(!value.is_empty(), "APInt::from_str: empty literal");
        let (negative, rest) = match value.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, value),
        };
        assert!(!rest.is_empty(), "APInt::from_str: bare sign with no digits");
        let digits: Vec<u8> = rest
            .bytes()
            .map(|b| {
                assert!(b.is_ascii_digit(), "APInt::from_str: non-digit byte in literal");
                b - b'0'
            })
            .collect();
        Ok(APInt::from_digits(negative, digits))
    }
}

impl fmt::Display for APInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        for &d in &self.digits {
            write!(f, "{}", d)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Equality / ordering
// ---------------------------------------------------------------------------

impl PartialEq for APInt {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for APInt {}

impl PartialOrd for APInt {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for APInt {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
            (false, false) => compare_digits(&self.digits, &other.digits),
            (true, true) => compare_digits(&other.digits, &self.digits),
        }
    }
}

// ---------------------------------------------------------------------------
// Arithmetic
// ---------------------------------------------------------------------------

impl std::ops::Add for &APInt {
    type Output = APInt;
    fn add(self, other: &APInt) -> APInt {
        if self.negative != other.negative {
            // a + (-b) == a - b ; (-a) + b == b - a
            if self.negative {
                let a_pos = APInt { negative: false, digits: self.digits.clone() };
                return other - &a_pos;
            } else {
                let b_pos = APInt { negative: false, digits: other.digits.clone() };
                return self - &b_pos;
            }
        }
        let digits = add_digits(&self.digits, &other.digits);
        APInt::from_digits(self.negative, digits)
    }
}

impl std::ops::Sub for &APInt {
    type Output = APInt;
    fn sub(self, other: &APInt) -> APInt {
        if self.negative != other.negative {
            let a_mag = APInt { negative: false, digits: self.digits.clone() };
            let b_mag = APInt { negative: false, digits: other.digits.clone() };
            let mut sum = &a_mag + &b_mag;
            sum.negative = self.negative && !sum.is_zero();
            return sum;
        }
        if self.negative {
            // (-a) - (-b) == b - a
            let a_mag = APInt { negative: false, digits: self.digits.clone() };
            let b_mag = APInt { negative: false, digits: other.digits.clone() };
            return &b_mag - &a_mag;
        }
        // both non-negative: a - b
        match compare_digits(&self.digits, &other.digits) {
            Ordering::Less => {
                let mut result = sub_digits(&other.digits, &self.digits);
                strip_leading_zeros(&mut result);
                APInt { negative: !is_zero_digits(&result), digits: result }
            }
            _ => {
                let mut result = sub_digits(&self.digits, &other.digits);
                strip_leading_zeros(&mut result);
                APInt { negative: false, digits: result }
            }
        }
    }
}

impl std::ops::Mul for &APInt {
    type Output = APInt;
    fn mul(self, other: &APInt) -> APInt {
        let digits = mul_digits(&self.digits, &other.digits);
        APInt::from_digits(self.negative != other.negative, digits)
    }
}

impl std::ops::Div for &APInt {
    type Output = APInt;
    /// Truncating integer division (toward zero).
    ///
    /// # Panics
    /// Panics on division by zero (spec.md §4.1.2: "Division by zero is a
    /// fatal programming error").
    fn div(self, other: &APInt) -> APInt {
        assert!(!other.is_zero(), "APInt division by zero");
        if compare_digits(&self.digits, &other.digits) == Ordering::Less {
            return APInt::zero();
        }
        let quotient = long_divide(&self.digits, &other.digits).0;
        APInt::from_digits(self.negative != other.negative, quotient)
    }
}

impl std::ops::AddAssign<&APInt> for APInt {
    fn add_assign(&mut self, other: &APInt) {
        *self = &*self + other;
    }
}
impl std::ops::SubAssign<&APInt> for APInt {
    fn sub_assign(&mut self, other: &APInt) {
        *self = &*self - other;
    }
}
impl std::ops::MulAssign<&APInt> for APInt {
    fn mul_assign(&mut self, other: &APInt) {
        *self = &*self * other;
    }
}
impl std::ops::DivAssign<&APInt> for APInt {
    fn div_assign(&mut self, other: &APInt) {
        *self = &*self / other;
    }
}

// ---------------------------------------------------------------------------
// Digit-vector helpers (free functions; operate MSB-first, no sign)
// ---------------------------------------------------------------------------

pub(crate) fn strip_leading_zeros(digits: &mut Vec<u8>) {
    let mut start = 0;
    while start + 1 < digits.len() && digits[start] == 0 {
        start += 1;
    }
    digits.drain(0..start);
    if digits.is_empty() {
        digits.push(0);
    }
}

fn is_zero_digits(digits: &[u8]) -> bool {
    digits.iter().all(|&d| d == 0)
}

/// Compares two non-negative digit vectors (MSB-first).
pub(crate) fn compare_digits(a: &[u8], b: &[u8]) -> Ordering {
    let a_start = a.iter().position(|&d| d != 0).unwrap_or(a.len() - 1);
    let b_start = b.iter().position(|&d| d != 0).unwrap_or(b.len() - 1);
    let a_sig = &a[a_start..];
    let b_sig = &b[b_start..];
    match a_sig.len().cmp(&b_sig.len()) {
        Ordering::Equal => a_sig.cmp(b_sig),
        other => other,
    }
}

fn add_digits(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(a.len().max(b.len()) + 1);
    let mut carry = 0u8;
    let mut i = a.len() as isize - 1;
    let mut j = b.len() as isize - 1;
    while i >= 0 || j >= 0 || carry > 0 {
        let mut sum = carry;
        if i >= 0 {
            sum += a[i as usize];
            i -= 1;
        }
        if j >= 0 {
            sum += b[j as usize];
            j -= 1;
        }
        result.push(sum % 10);
        carry = sum / 10;
    }
    result.reverse();
    result
}

/// Subtracts `b` from `a`. Requires `a >= b` (as digit magnitudes).
pub(crate) fn sub_digits(a: &[u8], b: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(a.len());
    let mut borrow = 0i8;
    let mut i = a.len() as isize - 1;
    let mut j = b.len() as isize - 1;
    while i >= 0 {
        let mut diff = a[i as usize] as i8 - borrow;
        if j >= 0 {
            diff -= b[j as usize] as i8;
            j -= 1;
        }
        if diff < 0 {
            diff += 10;
            borrow = 1;
        } else {
            borrow = 0;
        }
        result.push(diff as u8);
        i -= 1;
    }
    result.reverse();
    result
}

fn mul_digits(a: &[u8], b: &[u8]) -> Vec<u8> {
    if is_zero_digits(a) || is_zero_digits(b) {
        return vec![0];
    }
    let mut product = vec![0u8; a.len() + b.len()];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            let pos = i + j + 1;
            let mul = a[i] * b[j] + product[pos];
            product[pos] = mul % 10;
            product[pos - 1] += mul / 10;
        }
    }
    for i in (1..product.len()).rev() {
        if product[i] >= 10 {
            product[i - 1] += product[i] / 10;
            product[i] %= 10;
        }
    }
    product
}

/// Long division of non-negative digit vectors. Returns `(quotient, remainder)`.
pub(crate) fn long_divide(dividend: &[u8], divisor: &[u8]) -> (Vec<u8>, Vec<u8>) {
    let mut quotient = Vec::with_capacity(dividend.len());
    let mut current: Vec<u8> = vec![0];
    for &d in dividend {
        if current == [0] {
            current = vec![d];
        } else {
            current.push(d);
        }
        let mut count = 0u8;
        while compare_digits(&current, divisor) != Ordering::Less {
            current = sub_digits(&current, divisor);
            strip_leading_zeros(&mut current);
            count += 1;
        }
        quotient.push(count);
    }
    strip_leading_zeros(&mut quotient);
    (quotient, current)
}

fn divide_by_two(value: &APInt) -> APInt {
    if value.is_zero() {
        return APInt::zero();
    }
    let mut result = Vec::with_capacity(value.digits.len());
    let mut carry = 0u8;
    for &d in &value.digits {
        let current = carry * 10 + d;
        result.push(current / 2);
        carry = current % 2;
    }
    strip_leading_zeros(&mut result);
    APInt { negative: value.negative, digits: result }
}

fn max_unsigned_digits(bits: u32) -> Vec<u8> {
    // 2^bits - 1
    let mut digits = vec![1u8];
    for _ in 0..bits {
        double_digits(&mut digits);
    }
    subtract_one_digits(&mut digits);
    digits
}

fn max_signed_digits(bits: u32) -> Vec<u8> {
    // 2^(bits-1) - 1
    let mut digits = vec![1u8];
    for _ in 0..bits - 1 {
        double_digits(&mut digits);
    }
    subtract_one_digits(&mut digits);
    digits
}

fn min_signed_digits(bits: u32) -> Vec<u8> {
    // 2^(bits-1) (magnitude only; caller applies the sign)
    let mut digits = vec![1u8];
    for _ in 0..bits - 1 {
        double_digits(&mut digits);
    }
    digits
}

fn double_digits(digits: &mut Vec<u8>) {
    let mut carry = 0u8;
    for d in digits.iter_mut().rev() {
        let val = *d * 2 + carry;
        *d = val % 10;
        carry = val / 10;
    }
    if carry > 0 {
        digits.insert(0, carry);
    }
}

fn subtract_one_digits(digits: &mut Vec<u8>) {
    for d in digits.iter_mut().rev() {
        if *d > 0 {
            *d -= 1;
            break;
        } else {
            *d = 9;
        }
    }
    strip_leading_zeros(digits);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn canonical_roundtrip() {
        assert_eq!(APInt::from_str("042").unwrap().to_string(), "42");
        assert_eq!(APInt::from_str("-0").unwrap().to_string(), "0");
        assert_eq!(APInt::from_str("0").unwrap().to_string(), "0");
        assert_eq!(APInt::from_str("-17").unwrap().to_string(), "-17");
    }

    #[test]
    fn large_square_matches_scenario_1() {
        let x = APInt::from_str("170141183460469231731687303715884105727").unwrap();
        let sq = &x * &x;
        assert!(sq
            .to_string()
            .starts_with("28948022309329048855892746252171976963317496166410141009864396001978282409984"));
    }

    #[test]
    fn add_sub_inverse() {
        let a = APInt::from_str("12345").unwrap();
        let b = APInt::from_str("-6789").unwrap();
        let sum = &a + &b;
        let back = &sum - &b;
        assert_eq!(a, back);
    }

    #[test]
    fn mul_commutative() {
        let a = APInt::from_str("123456789").unwrap();
        let b = APInt::from_str("-987654321").unwrap();
        assert_eq!(&a * &b, &b * &a);
    }

    #[test]
    fn div_rem_identity() {
        let a = APInt::from_str("1000").unwrap();
        let b = APInt::from_str("7").unwrap();
        let q = &a / &b;
        let r = &a - &(&q * &b);
        assert_eq!(&(&q * &b) + &r, a);
    }

    #[test]
    #[should_panic(expected = "division by zero")]
    fn div_by_zero_panics() {
        let a = APInt::from_str("5").unwrap();
        let z = APInt::zero();
        let _ = &a / &z;
    }

    #[test]
    fn pow_zero_to_zero_is_one() {
        let zero = APInt::zero();
        assert_eq!(zero.pow(&zero), APInt::from_i64(1));
    }

    #[test]
    fn pow_negative_base_odd_exponent_is_negative() {
        let base = APInt::from_str("-2").unwrap();
        let exp = APInt::from_i64(3);
        assert_eq!(base.pow(&exp), APInt::from_str("-8").unwrap());
    }

    #[test]
    fn pow_negative_base_even_exponent_is_positive() {
        let base = APInt::from_str("-2").unwrap();
        let exp = APInt::from_i64(4);
        assert_eq!(base.pow(&exp), APInt::from_i64(16));
    }

    #[test]
    fn narrowing_roundtrips_for_fitting_values() {
        let n = APInt::from_i64(250);
        let back = n.to_u8().unwrap();
        assert_eq!(back, 250u8);
        assert_eq!(APInt::from_i64(back as i64).to_u8(), Some(250));
    }

    #[test]
    fn narrowing_fails_when_out_of_range() {
        let n = APInt::from_i64(300);
        assert_eq!(n.to_u8(), None);
        let neg = APInt::from_i64(-1);
        assert_eq!(neg.to_u8(), None);
    }

    #[test]
    fn i32_bounds() {
        assert_eq!(APInt::from_i64(2147483647).to_i32(), Some(i32::MAX));
        assert_eq!(APInt::from_i64(2147483648).to_i32(), None);
        assert_eq!(APInt::from_i64(-2147483648).to_i32(), Some(i32::MIN));
        assert_eq!(APInt::from_i64(-2147483649).to_i32(), None);
    }

    proptest! {
        #[test]
        fn add_sub_roundtrip_arbitrary(a in -100_000i64..100_000, b in -100_000i64..100_000) {
            let ai = APInt::from_i64(a);
            let bi = APInt::from_i64(b);
            let sum = &ai + &bi;
            let back = &sum - &bi;
            prop_assert_eq!(back, ai);
        }

        #[test]
        fn mul_matches_native(a in -10_000i64..10_000, b in -10_000i64..10_000) {
            let ai = APInt::from_i64(a);
            let bi = APInt::from_i64(b);
            let product = &ai * &bi;
            prop_assert_eq!(product, APInt::from_i64(a * b));
        }

        #[test]
        fn div_truncates_toward_zero(a in -10_000i64..10_000, b in 1i64..500) {
            let ai = APInt::from_i64(a);
            let bi = APInt::from_i64(b);
            let q = &ai / &bi;
            prop_assert_eq!(q, APInt::from_i64(a / b));
        }
    }
}
