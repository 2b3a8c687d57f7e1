// Copyright 2024 Cornell University
// released under BSD 3-Clause License
// author: Kevin Laeufer <laeufer@cornell.edu>

use baa::{BitVecOps, BitVecValue, WidthInt};
use num_bigint::BigUint;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;

/// The result of evaluating an expression: either a bit-vector or an array model.
#[derive(Debug, Clone)]
pub enum Value {
    BitVec(BitVecValue),
    Array(ArrayModel),
}

impl Value {
    pub fn is_bit_vec(&self) -> bool {
        matches!(self, Value::BitVec(_))
    }

    pub fn as_bit_vec(&self) -> Option<&BitVecValue> {
        match self {
            Value::BitVec(v) => Some(v),
            Value::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayModel> {
        match self {
            Value::BitVec(_) => None,
            Value::Array(a) => Some(a),
        }
    }
}

/// Lazily populated model of an array value.
///
/// Entries are keyed by the bit string of the index. Since all keys have the
/// same length, lexicographic order coincides with numeric order which gives
/// us deterministic iteration for the waveform dump. An index that was never
/// accessed is backed by the constant init element, the random seed or zero.
#[derive(Debug, Clone)]
pub struct ArrayModel {
    index_width: WidthInt,
    element_width: WidthInt,
    const_init: Option<BitVecValue>,
    random_seed: u64,
    data: BTreeMap<String, BitVecValue>,
}

impl ArrayModel {
    pub fn new(index_width: WidthInt, element_width: WidthInt) -> Self {
        ArrayModel {
            index_width,
            element_width,
            const_init: None,
            random_seed: 0,
            data: BTreeMap::new(),
        }
    }

    pub fn with_seed(index_width: WidthInt, element_width: WidthInt, seed: u64) -> Self {
        ArrayModel {
            random_seed: seed,
            ..ArrayModel::new(index_width, element_width)
        }
    }

    pub fn index_width(&self) -> WidthInt {
        self.index_width
    }

    pub fn element_width(&self) -> WidthInt {
        self.element_width
    }

    pub fn const_init(&self) -> Option<&BitVecValue> {
        self.const_init.as_ref()
    }

    pub fn set_const_init(&mut self, value: BitVecValue) {
        debug_assert_eq!(value.width(), self.element_width);
        self.const_init = Some(value);
    }

    /// Iterates over all materialized (index bit string, element) pairs in index order.
    pub fn entries(&self) -> impl Iterator<Item = (&String, &BitVecValue)> {
        self.data.iter()
    }

    /// The materialized element for an index bit string, if any.
    pub fn entry(&self, key: &str) -> Option<&BitVecValue> {
        self.data.get(key)
    }

    /// The element an unaccessed index would produce on first read.
    fn background(&self, key: &str) -> BitVecValue {
        if let Some(value) = self.const_init.as_ref() {
            value.clone()
        } else if self.random_seed != 0 {
            random_init_element(self.random_seed, index_to_u64(key), self.element_width)
        } else {
            BitVecValue::zero(self.element_width)
        }
    }

    /// Reads the element at `index`, materializing it first if it was never
    /// accessed. Materialization is required so that later equality
    /// comparisons observe the same element again.
    pub fn read(&mut self, index: &BitVecValue) -> BitVecValue {
        debug_assert_eq!(index.width(), self.index_width);
        let key = index.to_bit_str();
        if let Some(value) = self.data.get(&key) {
            return value.clone();
        }
        let value = self.background(&key);
        self.data.insert(key, value.clone());
        value
    }

    /// Returns a fresh array with the element at `index` replaced.
    pub fn write(&self, index: &BitVecValue, element: &BitVecValue) -> ArrayModel {
        debug_assert_eq!(index.width(), self.index_width);
        debug_assert_eq!(element.width(), self.element_width);
        let mut res = self.clone();
        res.data.insert(index.to_bit_str(), element.clone());
        res
    }

    /// Stores an element in place. Used when a witness constrains a single index.
    pub fn store(&mut self, index: &BitVecValue, element: BitVecValue) {
        debug_assert_eq!(index.width(), self.index_width);
        debug_assert_eq!(element.width(), self.element_width);
        self.data.insert(index.to_bit_str(), element);
    }

    /// The value this array is committed to at `index` without materializing:
    /// a stored entry, the constant init, or the seed derived element.
    /// `None` means the index is still unconstrained.
    pub fn check(&self, index: &BitVecValue) -> Option<BitVecValue> {
        debug_assert_eq!(index.width(), self.index_width);
        let key = index.to_bit_str();
        if let Some(value) = self.data.get(&key) {
            return Some(value.clone());
        }
        if let Some(value) = self.const_init.as_ref() {
            return Some(value.clone());
        }
        if self.random_seed != 0 {
            return Some(random_init_element(
                self.random_seed,
                index_to_u64(&key),
                self.element_width,
            ));
        }
        None
    }

    fn fully_materialized(&self) -> bool {
        self.index_width < 64 && self.data.len() as u128 == 1u128 << self.index_width
    }
}

impl PartialEq for ArrayModel {
    /// Behavioral equality: the backgrounds have to agree unless every index
    /// has been materialized on both sides, and every materialized element has
    /// to agree with what the other side would produce at that index.
    fn eq(&self, other: &Self) -> bool {
        if self.index_width != other.index_width || self.element_width != other.element_width {
            return false;
        }
        if !(self.fully_materialized() && other.fully_materialized())
            && (self.const_init_bits() != other.const_init_bits()
                || self.random_seed != other.random_seed)
        {
            return false;
        }
        for (key, value) in self.data.iter() {
            let expected = other.data.get(key).cloned().unwrap_or_else(|| other.background(key));
            if !value.is_equal(&expected) {
                return false;
            }
        }
        for (key, value) in other.data.iter() {
            let expected = self.data.get(key).cloned().unwrap_or_else(|| self.background(key));
            if !value.is_equal(&expected) {
                return false;
            }
        }
        true
    }
}

impl ArrayModel {
    fn const_init_bits(&self) -> Option<String> {
        self.const_init.as_ref().map(|v| v.to_bit_str())
    }
}

/// Deterministic first-read element for a seeded array. The exact definition
/// matters for cross-tool replay and must not be changed.
fn random_init_element(seed: u64, index: u64, width: WidthInt) -> BitVecValue {
    let t = seed.wrapping_add(index);
    let raw = t.wrapping_mul(t.wrapping_add(1)) / 2;
    from_u64_trunc(raw.wrapping_add(index), width)
}

/// Interprets the low 64 bits of an index bit string.
fn index_to_u64(key: &str) -> u64 {
    let low = if key.len() > 64 {
        &key[key.len() - 64..]
    } else {
        key
    };
    u64::from_str_radix(low, 2).unwrap()
}

/// Builds a bit-vector of the given width from a `u64`, truncating or
/// zero-extending as necessary.
pub(crate) fn from_u64_trunc(value: u64, width: WidthInt) -> BitVecValue {
    if width < 64 {
        BitVecValue::from_u64(value & ((1u64 << width) - 1), width)
    } else if width == 64 {
        BitVecValue::from_u64(value, width)
    } else {
        let low = BitVecValue::from_u64(value, 64);
        low.zero_extend(width - 64)
    }
}

pub(crate) fn bv_zero(width: WidthInt) -> BitVecValue {
    BitVecValue::zero(width)
}

pub(crate) fn bv_one(width: WidthInt) -> BitVecValue {
    let mut bits = "0".repeat(width as usize - 1);
    bits.push('1');
    BitVecValue::from_bit_str(&bits)
}

pub(crate) fn bv_ones(width: WidthInt) -> BitVecValue {
    BitVecValue::from_bit_str(&"1".repeat(width as usize))
}

pub(crate) fn bv_bool(value: bool) -> BitVecValue {
    if value {
        BitVecValue::tru()
    } else {
        BitVecValue::fals()
    }
}

pub(crate) fn bv_is_zero(value: &BitVecValue) -> bool {
    !value.to_bit_str().contains('1')
}

pub(crate) fn bv_is_negative(value: &BitVecValue) -> bool {
    value.to_bit_str().starts_with('1')
}

pub(crate) fn to_biguint(value: &BitVecValue) -> BigUint {
    BigUint::parse_bytes(value.to_bit_str().as_bytes(), 2).unwrap()
}

pub(crate) fn from_biguint(value: &BigUint, width: WidthInt) -> BitVecValue {
    let mask = (BigUint::from(1u8) << width as usize) - BigUint::from(1u8);
    let bits = (value & &mask).to_str_radix(2);
    debug_assert!(bits.len() <= width as usize);
    let mut padded = "0".repeat(width as usize - bits.len());
    padded.push_str(&bits);
    BitVecValue::from_bit_str(&padded)
}

/// Unsigned division with the usual bit-vector convention for division by zero.
pub(crate) fn bv_udiv(a: &BitVecValue, b: &BitVecValue) -> BitVecValue {
    debug_assert_eq!(a.width(), b.width());
    if bv_is_zero(b) {
        bv_ones(a.width())
    } else {
        from_biguint(&(to_biguint(a) / to_biguint(b)), a.width())
    }
}

/// Unsigned remainder; the dividend is returned when dividing by zero.
pub(crate) fn bv_urem(a: &BitVecValue, b: &BitVecValue) -> BitVecValue {
    debug_assert_eq!(a.width(), b.width());
    if bv_is_zero(b) {
        a.clone()
    } else {
        from_biguint(&(to_biguint(a) % to_biguint(b)), a.width())
    }
}

/// Two's complement division by sign decomposition. The division-by-zero
/// behavior of `bv_udiv` carries over (`-1` for a non-negative dividend,
/// `1` otherwise).
pub(crate) fn bv_sdiv(a: &BitVecValue, b: &BitVecValue) -> BitVecValue {
    let (neg_a, neg_b) = (bv_is_negative(a), bv_is_negative(b));
    let abs_a = if neg_a { a.negate() } else { a.clone() };
    let abs_b = if neg_b { b.negate() } else { b.clone() };
    let quotient = bv_udiv(&abs_a, &abs_b);
    if neg_a != neg_b {
        quotient.negate()
    } else {
        quotient
    }
}

/// Two's complement remainder; takes the sign of the dividend.
pub(crate) fn bv_srem(a: &BitVecValue, b: &BitVecValue) -> BitVecValue {
    let neg_a = bv_is_negative(a);
    let abs_a = if neg_a { a.negate() } else { a.clone() };
    let abs_b = if bv_is_negative(b) { b.negate() } else { b.clone() };
    let remainder = bv_urem(&abs_a, &abs_b);
    if neg_a {
        remainder.negate()
    } else {
        remainder
    }
}

/// Reduction ops produce a single bit.
pub(crate) fn bv_redand(value: &BitVecValue) -> BitVecValue {
    bv_bool(!value.to_bit_str().contains('0'))
}

pub(crate) fn bv_redor(value: &BitVecValue) -> BitVecValue {
    bv_bool(value.to_bit_str().contains('1'))
}

pub(crate) fn bv_redxor(value: &BitVecValue) -> BitVecValue {
    let ones = value.to_bit_str().chars().filter(|c| *c == '1').count();
    bv_bool(ones % 2 == 1)
}

/// Supplies fresh values for states and inputs that are not bound by an
/// init/next expression or a witness assignment.
pub struct RandomValueGenerator {
    rng: rand_xoshiro::Xoshiro256PlusPlus,
}

impl RandomValueGenerator {
    pub fn from_seed(seed: u64) -> Self {
        RandomValueGenerator {
            rng: rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }

    pub fn bit_vec(&mut self, width: WidthInt) -> BitVecValue {
        let mut bits = String::with_capacity(width as usize);
        for _ in 0..width {
            bits.push(if self.rng.gen_bool(0.5) { '1' } else { '0' });
        }
        BitVecValue::from_bit_str(&bits)
    }

    /// A nonzero seed for the lazy init of an array state.
    pub fn array_seed(&mut self) -> u64 {
        loop {
            let seed = self.rng.gen::<u64>();
            if seed != 0 {
                return seed;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bv(bits: &str) -> BitVecValue {
        BitVecValue::from_bit_str(bits)
    }

    #[test]
    fn test_bv_helpers() {
        assert_eq!(bv_one(4).to_bit_str(), "0001");
        assert_eq!(bv_ones(4).to_bit_str(), "1111");
        assert_eq!(bv_zero(4).to_bit_str(), "0000");
        assert!(bv_is_zero(&bv("0000")));
        assert!(!bv_is_zero(&bv("0100")));
        assert!(bv_is_negative(&bv("100")));
        assert!(!bv_is_negative(&bv("011")));
        assert_eq!(from_u64_trunc(0xaa, 8).to_bit_str(), "10101010");
        assert_eq!(from_u64_trunc(0x1aa, 8).to_bit_str(), "10101010");
    }

    #[test]
    fn test_reductions() {
        assert!(!bv_redand(&bv("1111")).is_zero());
        assert!(bv_redand(&bv("1101")).is_zero());
        assert!(!bv_redor(&bv("0010")).is_zero());
        assert!(bv_redor(&bv("0000")).is_zero());
        assert!(!bv_redxor(&bv("0111")).is_zero());
        assert!(bv_redxor(&bv("0110")).is_zero());
    }

    #[test]
    fn test_division() {
        let a = BitVecValue::from_u64(13, 8);
        let b = BitVecValue::from_u64(5, 8);
        assert_eq!(bv_udiv(&a, &b).to_u64().unwrap(), 2);
        assert_eq!(bv_urem(&a, &b).to_u64().unwrap(), 3);
        // division by zero yields all ones, remainder returns the dividend
        let zero = BitVecValue::from_u64(0, 8);
        assert_eq!(bv_udiv(&a, &zero).to_u64().unwrap(), 0xff);
        assert_eq!(bv_urem(&a, &zero).to_u64().unwrap(), 13);
        // signed: -13 / 5 = -2, -13 % 5 = -3
        let minus_a = a.negate();
        assert_eq!(bv_sdiv(&minus_a, &b).to_i64().unwrap(), -2);
        assert_eq!(bv_srem(&minus_a, &b).to_i64().unwrap(), -3);
        assert_eq!(bv_sdiv(&minus_a, &zero).to_i64().unwrap(), 1);
        assert_eq!(bv_srem(&minus_a, &zero).to_i64().unwrap(), -13);
    }

    #[test]
    fn test_array_read_populates() {
        let mut a = ArrayModel::new(2, 8);
        let idx = bv("01");
        assert!(a.check(&idx).is_none());
        let first = a.read(&idx);
        assert!(bv_is_zero(&first));
        // after the read the index is committed
        assert!(a.check(&idx).unwrap().is_equal(&first));
    }

    #[test]
    fn test_array_const_init() {
        let mut a = ArrayModel::new(2, 8);
        a.set_const_init(bv("10101010"));
        assert_eq!(a.read(&bv("11")).to_bit_str(), "10101010");
        assert_eq!(a.check(&bv("00")).unwrap().to_bit_str(), "10101010");
    }

    #[test]
    fn test_array_random_init_function() {
        // (s + i) * (s + i + 1) / 2 + i truncated to the element width
        let mut a = ArrayModel::with_seed(4, 16, 3);
        let i5 = bv("0101");
        let expected = (8u64 * 9 / 2 + 5) & 0xffff;
        assert_eq!(a.read(&i5).to_u64().unwrap(), expected);
        // reads are deterministic
        assert_eq!(a.read(&i5).to_u64().unwrap(), expected);
    }

    #[test]
    fn test_array_equality() {
        let mut a = ArrayModel::new(2, 4);
        let mut b = ArrayModel::new(2, 4);
        assert_eq!(a, b);
        // materializing a zero does not break equality with the zero background
        a.read(&bv("01"));
        assert_eq!(a, b);
        b.store(&bv("01"), bv("1000"));
        assert_ne!(a, b);
        // different seeds differ even without materialized entries
        let c = ArrayModel::with_seed(2, 4, 1);
        let d = ArrayModel::with_seed(2, 4, 2);
        assert_ne!(c, d);
        assert_eq!(
            ArrayModel::with_seed(2, 4, 1),
            ArrayModel::with_seed(2, 4, 1)
        );
    }

    #[test]
    fn test_array_write_is_a_value() {
        let a = ArrayModel::new(2, 4);
        let b = a.write(&bv("10"), &bv("0110"));
        assert!(a.check(&bv("10")).is_none());
        assert_eq!(b.check(&bv("10")).unwrap().to_bit_str(), "0110");
    }

    #[test]
    fn test_random_generator_reproducible() {
        let mut g1 = RandomValueGenerator::from_seed(0);
        let mut g2 = RandomValueGenerator::from_seed(0);
        assert!(g1.bit_vec(77).is_equal(&g2.bit_vec(77)));
        assert_eq!(g1.array_seed(), g2.array_seed());
    }
}
