//! Lowering of structured conditions to compare-and-branch sequences.
//!
//! Only a uniform chain of ANDs or a uniform chain of ORs is supported;
//! mixing both in one clause is rejected (and reported, never a crash).
//! Each of the six comparison operators maps to a fixed branch mnemonic plus
//! an inverted counterpart used when the caller asks for branch-on-false
//! semantics.

use crate::classify;
use crate::dialect::Dialect;
use crate::operand::{self, Operand, Register};
use crate::registers::RegisterBank;
use once_cell::sync::Lazy;
use regex::Regex;
use strum_macros::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum BranchOp {
    #[strum(serialize = "BEQ")]
    Beq,
    #[strum(serialize = "BNE")]
    Bne,
    #[strum(serialize = "BLT")]
    Blt,
    #[strum(serialize = "BGT")]
    Bgt,
    #[strum(serialize = "BLE")]
    Ble,
    #[strum(serialize = "BGE")]
    Bge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl CmpOp {
    /// Branch taken when the comparison holds (`inverse = false`) or when it
    /// fails (`inverse = true`).
    pub fn branch(self, inverse: bool) -> BranchOp {
        match (self, inverse) {
            (CmpOp::Eq, false) => BranchOp::Beq,
            (CmpOp::Eq, true) => BranchOp::Bne,
            (CmpOp::Ne, false) => BranchOp::Bne,
            (CmpOp::Ne, true) => BranchOp::Beq,
            (CmpOp::Lt, false) => BranchOp::Blt,
            (CmpOp::Lt, true) => BranchOp::Bge,
            (CmpOp::Gt, false) => BranchOp::Bgt,
            (CmpOp::Gt, true) => BranchOp::Ble,
            (CmpOp::Le, false) => BranchOp::Ble,
            (CmpOp::Le, true) => BranchOp::Bgt,
            (CmpOp::Ge, false) => BranchOp::Bge,
            (CmpOp::Ge, true) => BranchOp::Blt,
        }
    }

    /// The operator with swapped operand order.
    fn mirrored(self) -> CmpOp {
        match self {
            CmpOp::Lt => CmpOp::Gt,
            CmpOp::Gt => CmpOp::Lt,
            CmpOp::Le => CmpOp::Ge,
            CmpOp::Ge => CmpOp::Le,
            CmpOp::Eq | CmpOp::Ne => self,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    /// Both conjunction and disjunction operators in one clause.
    MixedChain,
    /// No comparison operator and not an atomic variable term.
    NoComparison(String),
    /// A term needed a scratch register and the pool was empty.
    NoFreeRegister,
    /// Both sides of a comparison were literals.
    ConstantComparison(String),
}

impl std::fmt::Display for ConditionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionError::MixedChain => {
                write!(f, "conditions mixing 'and' with 'or' are not supported")
            }
            ConditionError::NoComparison(term) => {
                write!(f, "no comparison operator found in '{}'", term)
            }
            ConditionError::NoFreeRegister => write!(f, "no free register for condition operand"),
            ConditionError::ConstantComparison(term) => {
                write!(f, "comparison between two constants in '{}'", term)
            }
        }
    }
}

/// Branch targets for a lowered condition. `primary` is taken by the final
/// term (with the requested polarity); `secondary` is the fall-through-side
/// label some chains need. The caller must define the secondary label right
/// after the emitted sequence iff `used_secondary` is set in the result.
#[derive(Debug, Clone, Copy)]
pub struct LabelKeys<'a> {
    pub primary: &'a str,
    pub secondary: &'a str,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoweredCondition {
    pub lines: Vec<String>,
    pub used_secondary: bool,
}

static WORD_AND: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?i:and)\b").unwrap());
static WORD_OR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?i:or)\b").unwrap());
static WORD_NOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(?i:not)\b").unwrap());

/// Canonical form: verbose logical operators unified to symbols, parentheses
/// and whitespace dropped.
pub fn normalize(condition: &str) -> String {
    let mut text = condition.to_string();
    text = WORD_AND.replace_all(&text, "&&").into_owned();
    text = WORD_OR.replace_all(&text, "||").into_owned();
    text = WORD_NOT.replace_all(&text, "!").into_owned();
    text.chars()
        .filter(|c| !c.is_whitespace() && *c != '(' && *c != ')')
        .collect()
}

static RESTRICTED: Lazy<Regex> = Lazy::new(|| {
    let operand = format!("(?:{}|{}|{}|'\\w')", classify::REG, classify::NUM, classify::VAR);
    let term = format!("!?{operand}(?:==|!=|<=|>=|<|>|=){operand}");
    Regex::new(&format!(r"^{term}(?:(?:&&|\|\|){term})*$")).unwrap_or_else(|e| panic!("bad pattern: {e}"))
});

/// Strict-mode gate: only chains of plain comparisons are admitted.
pub fn matches_restricted_syntax(condition: &str) -> bool {
    RESTRICTED.is_match(&normalize(condition))
}

pub struct ConditionLowerer<'a> {
    bank: &'a mut RegisterBank,
    dialect: Dialect,
}

impl<'a> ConditionLowerer<'a> {
    pub fn new(bank: &'a mut RegisterBank, dialect: Dialect) -> Self {
        Self { bank, dialect }
    }

    /// Lower `condition` into compare/branch lines. With `inverse = true` the
    /// primary label is taken when the whole condition is false (the `if` and
    /// `while` encoding); with `inverse = false` it is taken when the
    /// condition holds.
    pub fn lower(
        &mut self,
        condition: &str,
        keys: LabelKeys<'_>,
        inverse: bool,
    ) -> Result<LoweredCondition, ConditionError> {
        let normalized = normalize(condition);
        let has_and = normalized.contains("&&");
        let has_or = normalized.contains("||");
        if has_and && has_or {
            return Err(ConditionError::MixedChain);
        }

        let mut lines = Vec::new();
        let mut scratch: Vec<Register> = Vec::new();
        let mut used_secondary = false;
        let terms: Vec<&str> = if has_and {
            normalized.split("&&").collect()
        } else if has_or {
            normalized.split("||").collect()
        } else {
            vec![normalized.as_str()]
        };

        let count = terms.len();
        for (index, term) in terms.iter().enumerate() {
            let final_term = index + 1 == count;
            // Polarity and target per spec: AND-chains send every failing
            // non-final term where the whole condition fails; OR-chains send
            // every succeeding non-final term where it succeeds.
            let (target, invert) = if final_term {
                (keys.primary, inverse)
            } else if has_and {
                if inverse {
                    (keys.primary, true)
                } else {
                    used_secondary = true;
                    (keys.secondary, true)
                }
            } else if inverse {
                used_secondary = true;
                (keys.secondary, false)
            } else {
                (keys.primary, false)
            };
            self.lower_term(term, target, invert, &mut lines, &mut scratch)?;
        }

        for reg in scratch {
            self.bank.release(reg);
        }
        Ok(LoweredCondition {
            lines,
            used_secondary,
        })
    }

    fn lower_term(
        &mut self,
        term: &str,
        target: &str,
        invert: bool,
        lines: &mut Vec<String>,
        scratch: &mut Vec<Register>,
    ) -> Result<(), ConditionError> {
        let (negated, term) = match term.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, term),
        };
        let invert = invert ^ negated;

        let (mut op, mut lhs, mut rhs) = match split_comparison(term) {
            Some(parts) => parts,
            // An atomic variable/register term is an implicit test against
            // zero: `x` means `x != 0`.
            None if is_atomic(term) => (CmpOp::Ne, term.to_string(), "0".to_string()),
            None => return Err(ConditionError::NoComparison(term.to_string())),
        };

        // A literal on the left swaps to the right so CMP gets a register
        // first operand.
        if matches!(Operand::parse(&lhs), Operand::Int(_) | Operand::Char(_)) {
            if matches!(Operand::parse(&rhs), Operand::Int(_) | Operand::Char(_)) {
                return Err(ConditionError::ConstantComparison(term.to_string()));
            }
            std::mem::swap(&mut lhs, &mut rhs);
            op = op.mirrored();
        }

        let lhs_reg = self.operand_register(&lhs, lines, scratch)?;
        let rhs_text = self.comparison_operand(&rhs, lines, scratch)?;
        lines.push(format!("CMP {}, {}", lhs_reg, rhs_text));
        lines.push(format!("{} {}", op.branch(invert), target));
        Ok(())
    }

    fn operand_register(
        &mut self,
        token: &str,
        lines: &mut Vec<String>,
        scratch: &mut Vec<Register>,
    ) -> Result<Register, ConditionError> {
        match Operand::parse(token) {
            Operand::Reg(reg) => Ok(reg),
            Operand::Var(name) => self
                .bank
                .bind(&name)
                .ok_or(ConditionError::NoFreeRegister),
            Operand::Int(value) => {
                let reg = self
                    .bank
                    .acquire_temp()
                    .ok_or(ConditionError::NoFreeRegister)?;
                scratch.push(reg);
                lines.push(materialize_constant(reg, value, self.dialect));
                Ok(reg)
            }
            Operand::Char(c) => {
                let reg = self
                    .bank
                    .acquire_temp()
                    .ok_or(ConditionError::NoFreeRegister)?;
                scratch.push(reg);
                lines.push(materialize_constant(reg, c as i64, self.dialect));
                Ok(reg)
            }
        }
    }

    fn comparison_operand(
        &mut self,
        token: &str,
        lines: &mut Vec<String>,
        scratch: &mut Vec<Register>,
    ) -> Result<String, ConditionError> {
        let imm = self.dialect.descriptor().imm_prefix;
        match Operand::parse(token) {
            Operand::Reg(reg) => Ok(reg.to_string()),
            Operand::Var(name) => self
                .bank
                .bind(&name)
                .map(|reg| reg.to_string())
                .ok_or(ConditionError::NoFreeRegister),
            Operand::Int(value) => {
                if operand::is_encodable(value as u32) {
                    Ok(format!("{}{}", imm, value))
                } else {
                    let reg = self
                        .bank
                        .acquire_temp()
                        .ok_or(ConditionError::NoFreeRegister)?;
                    scratch.push(reg);
                    lines.push(format!("LDR {}, ={}", reg, value));
                    Ok(reg.to_string())
                }
            }
            Operand::Char(c) => Ok(format!("{}'{}'", imm, c)),
        }
    }
}

/// Constant materialization shared with the condition path: plain move when
/// the immediate encodes, constant-pool load otherwise.
pub fn materialize_constant(reg: Register, value: i64, dialect: Dialect) -> String {
    let imm = dialect.descriptor().imm_prefix;
    if value >= 0 && operand::is_encodable(value as u32) {
        format!("MOV {}, {}{}", reg, imm, value)
    } else if value < 0 && operand::is_encodable(!(value as u32)) {
        format!("MVN {}, {}0x{:X}", reg, imm, !(value as u32))
    } else {
        format!("LDR {}, ={}", reg, value)
    }
}

fn is_atomic(term: &str) -> bool {
    !term.is_empty()
        && term
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && term.chars().next().map(|c| !c.is_ascii_digit()).unwrap_or(false)
}

/// Split one comparison term on its operator. `==` is unified with `=`; the
/// two-character operators are tried first so `<=` never reads as `<`.
fn split_comparison(term: &str) -> Option<(CmpOp, String, String)> {
    const OPS: [(&str, CmpOp); 7] = [
        (">=", CmpOp::Ge),
        ("<=", CmpOp::Le),
        ("==", CmpOp::Eq),
        ("!=", CmpOp::Ne),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
        ("=", CmpOp::Eq),
    ];
    for (symbol, op) in OPS {
        if let Some(pos) = term.find(symbol) {
            let lhs = term[..pos].to_string();
            let rhs = term[pos + symbol.len()..].to_string();
            if lhs.is_empty() || rhs.is_empty() {
                return None;
            }
            return Some((op, lhs, rhs));
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lower(condition: &str, inverse: bool) -> Result<LoweredCondition, ConditionError> {
        let mut bank = RegisterBank::new();
        // The generator reserves literally named registers before lowering.
        bank.reserve_named_registers([condition]);
        let mut lowerer = ConditionLowerer::new(&mut bank, Dialect::Gnu);
        lowerer.lower(
            condition,
            LabelKeys {
                primary: "end_0",
                secondary: "then_0",
            },
            inverse,
        )
    }

    #[test]
    fn every_operator_inverts_to_its_complement() {
        let cases = [
            ("R0 == R1", BranchOp::Beq, BranchOp::Bne),
            ("R0 != R1", BranchOp::Bne, BranchOp::Beq),
            ("R0 < R1", BranchOp::Blt, BranchOp::Bge),
            ("R0 > R1", BranchOp::Bgt, BranchOp::Ble),
            ("R0 <= R1", BranchOp::Ble, BranchOp::Bgt),
            ("R0 >= R1", BranchOp::Bge, BranchOp::Blt),
        ];
        for (condition, direct, inverted) in cases {
            let plain = lower(condition, false).unwrap();
            assert_eq!(plain.lines[1], format!("{} end_0", direct));
            let inverse = lower(condition, true).unwrap();
            assert_eq!(inverse.lines[1], format!("{} end_0", inverted));
        }
    }

    #[test]
    fn atomic_variable_becomes_test_against_zero() {
        let lowered = lower("(done)", true).unwrap();
        assert_eq!(lowered.lines, vec!["CMP R0, #0", "BEQ end_0"]);
        let negated = lower("!done", true).unwrap();
        assert_eq!(negated.lines, vec!["CMP R0, #0", "BNE end_0"]);
    }

    #[test]
    fn mixed_chains_are_rejected() {
        assert_eq!(
            lower("R0 < 1 and R1 > 2 or R2 == 3", true),
            Err(ConditionError::MixedChain)
        );
    }

    #[test]
    fn and_chain_branches_every_failure_to_the_primary_label() {
        let lowered = lower("R0 < 1 and R1 > 2", true).unwrap();
        assert_eq!(
            lowered.lines,
            vec![
                "CMP R0, #1",
                "BGE end_0",
                "CMP R1, #2",
                "BLE end_0",
            ]
        );
        assert!(!lowered.used_secondary);
    }

    #[test]
    fn or_chain_branches_success_to_the_secondary_label() {
        let lowered = lower("R0 == 1 or R1 == 2", true).unwrap();
        assert_eq!(
            lowered.lines,
            vec![
                "CMP R0, #1",
                "BEQ then_0",
                "CMP R1, #2",
                "BNE end_0",
            ]
        );
        assert!(lowered.used_secondary);
    }

    #[test]
    fn literal_on_the_left_swaps_with_mirrored_operator() {
        let lowered = lower("3 < R1", false).unwrap();
        assert_eq!(lowered.lines, vec!["CMP R1, #3", "BGT end_0"]);
    }

    #[test]
    fn unencodable_literal_goes_through_a_scratch_register() {
        let lowered = lower("R0 == 4097", false).unwrap();
        assert_eq!(
            lowered.lines,
            vec!["LDR R1, =4097", "CMP R0, R1", "BEQ end_0"]
        );
    }

    #[test]
    fn verbose_operators_normalize() {
        assert_eq!(normalize("(x AND not y)"), "x&&!y");
        assert_eq!(normalize("a or b"), "a||b");
    }

    #[test]
    fn restricted_syntax_admits_comparison_chains_only() {
        assert!(matches_restricted_syntax("x == 3"));
        assert!(matches_restricted_syntax("(R0 < limit) and (y != 0)"));
        assert!(!matches_restricted_syntax("x"));
        assert!(!matches_restricted_syntax("x + 1 == 3"));
    }
}
