//! Registers, operand parsing and the ARM immediate encodability test.

use std::fmt;
use std::str::FromStr;

/// Number of general-purpose registers the allocator may hand out (R0-R12;
/// R13-R15 are SP, LR and PC).
pub const NUM_REGISTERS: usize = 13;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Register(u8);

impl Register {
    pub fn new(index: u8) -> Option<Self> {
        (usize::from(index) < NUM_REGISTERS).then_some(Self(index))
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    pub fn all() -> impl Iterator<Item = Register> {
        (0..NUM_REGISTERS as u8).map(Register)
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

impl FromStr for Register {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix('R').or_else(|| s.strip_prefix('r')).ok_or(())?;
        if rest.is_empty() || rest.len() > 2 || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return Err(());
        }
        let index: u8 = rest.parse().map_err(|_| ())?;
        Register::new(index).ok_or(())
    }
}

/// One operand of a source statement after tokenization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Reg(Register),
    Int(i64),
    Char(char),
    Var(String),
}

impl Operand {
    /// Classify a raw token: register, decimal or hex number, quoted char,
    /// anything else is a variable name.
    pub fn parse(token: &str) -> Operand {
        let token = token.trim();
        if let Ok(reg) = token.parse::<Register>() {
            return Operand::Reg(reg);
        }
        if let Some(hex) = token
            .strip_prefix("0x")
            .or_else(|| token.strip_prefix("0X"))
        {
            if let Ok(value) = i64::from_str_radix(hex, 16) {
                return Operand::Int(value);
            }
        }
        if let Ok(value) = token.parse::<i64>() {
            return Operand::Int(value);
        }
        let chars: Vec<char> = token.chars().collect();
        if chars.len() == 3 && (chars[0] == '\'' || chars[0] == '"') && chars[2] == chars[0] {
            return Operand::Char(chars[1]);
        }
        Operand::Var(token.to_string())
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Operand::Int(value) => Some(*value),
            _ => None,
        }
    }
}

/// True iff `value` can be encoded as an instruction immediate: an 8-bit
/// base rotated right by an even bit count within a 32-bit word.
pub fn is_encodable(value: u32) -> bool {
    encode_immediate(value).is_some()
}

/// The (base, rotation) pair the hardware encoding would use, smallest
/// rotation first, or `None` when the value has no valid encoding.
pub fn encode_immediate(value: u32) -> Option<(u8, u8)> {
    for rot in (0..32u32).step_by(2) {
        let base = value.rotate_left(rot);
        if base <= 0xFF {
            return Some((base as u8, rot as u8));
        }
    }
    None
}

/// Inverse of [`encode_immediate`], for round-trip checking.
pub fn decode_immediate(base: u8, rot: u8) -> u32 {
    u32::from(base).rotate_right(u32::from(rot))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_parsing_bounds() {
        assert_eq!("R0".parse(), Ok(Register(0)));
        assert_eq!("r12".parse(), Ok(Register(12)));
        assert!("R13".parse::<Register>().is_err());
        assert!("R".parse::<Register>().is_err());
        assert!("Rx".parse::<Register>().is_err());
    }

    #[test]
    fn operand_classification() {
        assert_eq!(Operand::parse("R3"), Operand::Reg(Register(3)));
        assert_eq!(Operand::parse("-42"), Operand::Int(-42));
        assert_eq!(Operand::parse("0xFF"), Operand::Int(255));
        assert_eq!(Operand::parse("'a'"), Operand::Char('a'));
        assert_eq!(Operand::parse("total"), Operand::Var("total".into()));
    }

    #[test]
    fn immediates_follow_the_rotation_rule() {
        for value in [0u32, 1, 255, 256, 0xFF0, 0xFF00_0000, 0x3FC, 0xC000_003F] {
            assert!(is_encodable(value), "{value:#x} should be encodable");
        }
        for value in [0x101u32, 0x1FE00_u32 | 1, 0xFF1, 0x1004] {
            assert!(!is_encodable(value), "{value:#x} should not be encodable");
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        for value in [0u32, 5, 0xAB, 0x3FC, 0xFF00, 0xF000_000F] {
            let (base, rot) = encode_immediate(value).unwrap();
            assert_eq!(decode_immediate(base, rot), value);
            assert_eq!(rot % 2, 0);
        }
    }
}
