use std::fmt;

use crate::{HarnessError, HarnessResult};

pub const MAX_WIDTH: u32 = 64;

/// Two-state value of a fixed-width signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BinaryValue {
    width: u32,
    bits: u64,
}

#[inline]
pub(crate) fn mask(width: u32) -> u64 {
    if width >= 64 {
        u64::MAX
    } else {
        (1 << width) - 1
    }
}

impl BinaryValue {
    pub fn new(width: u32, value: u64) -> HarnessResult<Self> {
        if width == 0 || width > MAX_WIDTH {
            return Err(HarnessError::config(format!(
                "signal width {} outside 1..={}",
                width, MAX_WIDTH
            )));
        }
        if value & !mask(width) != 0 {
            return Err(HarnessError::config(format!(
                "value {:#x} does not fit in {} bits",
                value, width
            )));
        }
        Ok(Self { width, bits: value })
    }

    /// Keeps the low `width` bits of `value`.
    pub fn truncated(width: u32, value: u64) -> HarnessResult<Self> {
        Self::new(width, value & mask(width.min(MAX_WIDTH)))
    }

    pub fn bit(b: bool) -> Self {
        Self {
            width: 1,
            bits: b as u64,
        }
    }

    pub fn from_bin_str(s: &str) -> HarnessResult<Self> {
        // remove '_' and 0b
        let stripped = s.trim_start_matches("0b").replace('_', "");
        if let Some(c) = stripped.chars().find(|c| *c != '0' && *c != '1') {
            return Err(HarnessError::config(format!(
                "invalid character '{}' in binary string '{}'",
                c, s
            )));
        }
        let width = stripped.len() as u32;
        if width == 0 || width > MAX_WIDTH {
            return Err(HarnessError::config(format!(
                "binary string '{}' has unsupported width {}",
                s, width
            )));
        }
        let bits = stripped
            .chars()
            .fold(0u64, |acc, c| (acc << 1) | (c == '1') as u64);
        Ok(Self { width, bits })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn as_integer(&self) -> u64 {
        self.bits
    }

    pub fn as_bool(&self) -> bool {
        self.bits != 0
    }

    /// MSB-first, zero padded to the full width.
    pub fn bin_str(&self) -> String {
        format!("{:0w$b}", self.bits, w = self.width as usize)
    }

    /// Bits indexed from the least significant one.
    ///
    /// The binary string is MSB-first, so it is reversed before indexing.
    pub fn bits_lsb_first(&self) -> Vec<bool> {
        self.bin_str().chars().rev().map(|c| c == '1').collect()
    }

    pub fn bit_at(&self, index: u32) -> Option<bool> {
        (index < self.width).then(|| (self.bits >> index) & 1 == 1)
    }
}

impl fmt::Display for BinaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.width <= 8 {
            write!(f, "{}'b{}", self.width, self.bin_str())
        } else {
            let digits = ((self.width + 3) / 4) as usize;
            write!(f, "{}'h{:0w$X}", self.width, self.bits, w = digits)
        }
    }
}

impl fmt::LowerHex for BinaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.bits, f)
    }
}

impl fmt::Binary for BinaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Binary::fmt(&self.bits, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_values_wider_than_the_signal() {
        assert!(BinaryValue::new(3, 7).is_ok());
        assert!(matches!(
            BinaryValue::new(3, 8),
            Err(HarnessError::Config(_))
        ));
        assert!(BinaryValue::new(0, 0).is_err());
        assert!(BinaryValue::new(65, 0).is_err());
    }

    #[test]
    fn bin_str_is_msb_first_and_padded() {
        let v = BinaryValue::new(8, 0b0001_0010).unwrap();
        assert_eq!(v.bin_str(), "00010010");
        assert_eq!(v.to_string(), "8'b00010010");
        assert_eq!(BinaryValue::new(16, 0xE1F0).unwrap().to_string(), "16'hE1F0");
    }

    #[test]
    fn lsb_first_indexing_reverses_the_bit_string() {
        let v = BinaryValue::new(8, 0b1000_0010).unwrap();
        let bits = v.bits_lsb_first();
        assert!(!bits[0]);
        assert!(bits[1]);
        assert!(bits[7]);
        for i in 0..8 {
            assert_eq!(v.bit_at(i), Some(bits[i as usize]));
        }
        assert_eq!(v.bit_at(8), None);
    }

    #[test]
    fn parses_binary_strings() {
        let v = BinaryValue::from_bin_str("0b1010_0001").unwrap();
        assert_eq!(v.width(), 8);
        assert_eq!(v.as_integer(), 0xA1);
        assert!(BinaryValue::from_bin_str("10x1").is_err());
        assert!(BinaryValue::from_bin_str("").is_err());
    }
}
