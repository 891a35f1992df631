//! Lowering of assignment and single-operator binary expression lines.
//!
//! Produces one to three target instructions per line. At most one operand
//! of the general binary case may be an immediate; multiplication has no
//! immediate form at all, so constant factors are either strength-reduced
//! to shifts or materialized into a temporary register.

use crate::classify::{self, BinaryParts};
use crate::dialect::Dialect;
use crate::operand::{self, Operand, Register};
use crate::registers::{AddressTable, RegisterBank};
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BinOp {
    #[strum(serialize = "ADD")]
    Add,
    #[strum(serialize = "SUB")]
    Sub,
    #[strum(serialize = "MUL")]
    Mul,
    #[strum(serialize = "AND")]
    And,
    #[strum(serialize = "ORR")]
    Orr,
}

impl BinOp {
    fn parse(symbol: &str) -> Option<BinOp> {
        match symbol {
            "+" => Some(BinOp::Add),
            "-" => Some(BinOp::Sub),
            "*" => Some(BinOp::Mul),
            "and" => Some(BinOp::And),
            "or" => Some(BinOp::Orr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LowerError {
    /// The register pool was exhausted; the statement is abandoned, nothing
    /// is emitted and translation continues with the next line.
    NoFreeRegister,
    Malformed(String),
}

impl std::fmt::Display for LowerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LowerError::NoFreeRegister => write!(f, "no free register available"),
            LowerError::Malformed(line) => write!(f, "cannot translate '{}'", line),
        }
    }
}

pub struct ExprLowerer<'a> {
    bank: &'a mut RegisterBank,
    addr: &'a mut AddressTable,
    dialect: Dialect,
}

impl<'a> ExprLowerer<'a> {
    pub fn new(
        bank: &'a mut RegisterBank,
        addr: &'a mut AddressTable,
        dialect: Dialect,
    ) -> Self {
        Self {
            bank,
            addr,
            dialect,
        }
    }

    /// Lower a pure assignment `x <- y`.
    pub fn lower_assignment(&mut self, line: &str) -> Result<Vec<String>, LowerError> {
        let (dest, src) = classify::parse_assignment(line)
            .ok_or_else(|| LowerError::Malformed(line.to_string()))?;
        self.lower_move(&dest, &src)
    }

    /// Lower a move between already-tokenized destination and source, used
    /// for the char/boolean assignment forms the line patterns rewrite.
    pub fn lower_move(&mut self, dest: &str, src: &str) -> Result<Vec<String>, LowerError> {
        let dest = self.destination(dest)?;
        let mut lines = Vec::new();
        self.move_into(dest, src, &mut lines)?;
        self.addr.invalidate(dest);
        Ok(lines)
    }

    /// Lower `x <- a OP b`.
    pub fn lower_binary(&mut self, line: &str) -> Result<Vec<String>, LowerError> {
        let parts = classify::parse_binary(line)
            .ok_or_else(|| LowerError::Malformed(line.to_string()))?;
        let BinaryParts { dest, lhs, op, rhs } = parts;
        let op = BinOp::parse(&op).ok_or_else(|| LowerError::Malformed(line.to_string()))?;
        let dest = self.destination(&dest)?;

        let mut lhs = Operand::parse(&lhs);
        let mut rhs = Operand::parse(&rhs);
        let mut lines = Vec::new();

        // Two immediates: fold the first into the destination, then reduce
        // to `x <- x OP b`.
        if is_immediate(&lhs) && is_immediate(&rhs) {
            self.move_operand(dest, &lhs, &mut lines)?;
            self.addr.invalidate(dest);
            lhs = Operand::Reg(dest);
        }
        // Immediate on the left swaps to the right (commutative semantics
        // are assumed for the source language's operators).
        if is_immediate(&lhs) {
            std::mem::swap(&mut lhs, &mut rhs);
        }

        let lhs_reg = self.operand_to_register(&lhs)?;

        if op == BinOp::Mul {
            self.lower_multiply(dest, lhs_reg, &rhs, &mut lines)?;
        } else {
            let (rhs_text, scratch) = self.flexible_operand(&rhs, &mut lines)?;
            lines.push(format!("{} {}, {}, {}", op, dest, lhs_reg, rhs_text));
            if let Some(reg) = scratch {
                self.bank.release(reg);
            }
        }
        self.addr.invalidate(dest);
        Ok(lines)
    }

    /// Multiply with constant strength reduction: powers of two become left
    /// shifts, 2^n + 1 becomes an add-with-shift, anything else goes through
    /// a genuine MUL with the constant in a temporary (the target has no
    /// multiply-by-immediate form).
    fn lower_multiply(
        &mut self,
        dest: Register,
        lhs: Register,
        rhs: &Operand,
        lines: &mut Vec<String>,
    ) -> Result<(), LowerError> {
        let imm = self.dialect.descriptor().imm_prefix;
        match rhs {
            Operand::Int(value) if *value > 0 && (*value as u64).is_power_of_two() => {
                lines.push(format!(
                    "LSL {}, {}, {}{}",
                    dest,
                    lhs,
                    imm,
                    value.trailing_zeros()
                ));
            }
            Operand::Int(value) if *value > 1 && ((*value - 1) as u64).is_power_of_two() => {
                lines.push(format!(
                    "ADD {}, {}, {}, LSL {}{}",
                    dest,
                    lhs,
                    lhs,
                    imm,
                    (*value - 1).trailing_zeros()
                ));
            }
            Operand::Int(value) => {
                let temp = self.bank.acquire_temp().ok_or(LowerError::NoFreeRegister)?;
                lines.push(crate::conditions::materialize_constant(
                    temp,
                    *value,
                    self.dialect,
                ));
                lines.push(format!("MUL {}, {}, {}", dest, lhs, temp));
                self.bank.release(temp);
            }
            other => {
                let rhs_reg = self.operand_to_register(other)?;
                lines.push(format!("MUL {}, {}, {}", dest, lhs, rhs_reg));
            }
        }
        Ok(())
    }

    /// Target register for an assignment destination: the literal register,
    /// or the register bound (possibly freshly) to the variable.
    pub fn destination(&mut self, token: &str) -> Result<Register, LowerError> {
        match Operand::parse(token) {
            Operand::Reg(reg) => Ok(reg),
            Operand::Var(name) => self.bank.bind(&name).ok_or(LowerError::NoFreeRegister),
            _ => Err(LowerError::Malformed(token.to_string())),
        }
    }

    fn operand_to_register(&mut self, operand: &Operand) -> Result<Register, LowerError> {
        match operand {
            Operand::Reg(reg) => Ok(*reg),
            Operand::Var(name) => self.bank.bind(name).ok_or(LowerError::NoFreeRegister),
            _ => Err(LowerError::NoFreeRegister),
        }
    }

    /// Render an operand for the flexible second-operand slot: a register as
    /// itself, a legal immediate inline, anything else via a temporary
    /// register returned for the caller to release.
    fn flexible_operand(
        &mut self,
        operand: &Operand,
        lines: &mut Vec<String>,
    ) -> Result<(String, Option<Register>), LowerError> {
        let imm = self.dialect.descriptor().imm_prefix;
        match operand {
            Operand::Reg(reg) => Ok((reg.to_string(), None)),
            Operand::Var(name) => {
                let reg = self.bank.bind(name).ok_or(LowerError::NoFreeRegister)?;
                Ok((reg.to_string(), None))
            }
            Operand::Int(value) if *value >= 0 && operand::is_encodable(*value as u32) => {
                Ok((format!("{}{}", imm, value), None))
            }
            Operand::Int(value) => {
                let temp = self.bank.acquire_temp().ok_or(LowerError::NoFreeRegister)?;
                lines.push(crate::conditions::materialize_constant(
                    temp,
                    *value,
                    self.dialect,
                ));
                Ok((temp.to_string(), Some(temp)))
            }
            Operand::Char(c) => Ok((format!("{}'{}'", imm, c), None)),
        }
    }

    fn move_into(
        &mut self,
        dest: Register,
        src: &str,
        lines: &mut Vec<String>,
    ) -> Result<(), LowerError> {
        let operand = Operand::parse(src);
        self.move_operand(dest, &operand, lines)
    }

    fn move_operand(
        &mut self,
        dest: Register,
        src: &Operand,
        lines: &mut Vec<String>,
    ) -> Result<(), LowerError> {
        let imm = self.dialect.descriptor().imm_prefix;
        match src {
            Operand::Reg(reg) => lines.push(format!("MOV {}, {}", dest, reg)),
            Operand::Var(name) => {
                let reg = self.bank.bind(name).ok_or(LowerError::NoFreeRegister)?;
                lines.push(format!("MOV {}, {}", dest, reg));
            }
            Operand::Int(value) => {
                lines.push(crate::conditions::materialize_constant(
                    dest,
                    *value,
                    self.dialect,
                ));
            }
            Operand::Char(c) => lines.push(format!("MOV {}, {}'{}'", dest, imm, c)),
        }
        Ok(())
    }
}

fn is_immediate(operand: &Operand) -> bool {
    matches!(operand, Operand::Int(_) | Operand::Char(_))
}
