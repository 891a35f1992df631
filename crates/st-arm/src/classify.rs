//! Ordered, first-match-wins classification of one source statement line.
//!
//! The order is load-bearing: several categories are deliberate supersets of
//! others (boolean literals would otherwise classify as plain assignments,
//! array initializers as binary expressions), and the raw-mnemonic
//! passthrough is tried only after every higher-level form has failed.

use crate::dialect::ElemType;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    BooleanAssignment,
    Assignment,
    BinaryExpression,
    MemoryLoad,
    MemoryStore,
    ArrayElementRead,
    ArrayElementWrite,
    StringInitializer,
    CharInitializer,
    ArrayInitializer,
    AddressOf,
    Input,
    Output,
    RawInstruction,
    Unsupported,
}

pub(crate) const REG: &str = r"[Rr](?:1[0-2]|[0-9])";
pub(crate) const VAR: &str = r"[A-Za-z_][A-Za-z0-9_]*";
pub(crate) const NUM: &str = r"-?[0-9]+|0[xX][0-9a-fA-F]+";
const UNUM: &str = r"[0-9]+|0[xX][0-9a-fA-F]+";
const ASSIGN: &str = r"(?:<-|:=)";

fn anchored(body: String) -> Regex {
    Regex::new(&format!("^{}$", body)).unwrap_or_else(|e| panic!("bad pattern: {e}"))
}

static BOOL_ASSIGN: Lazy<Regex> =
    Lazy::new(|| anchored(format!("(?:{REG}|{VAR}){ASSIGN}(?:true|false)")));
static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| anchored(format!("({REG}|{VAR}){ASSIGN}({REG}|{NUM}|{VAR})")));
static BINARY: Lazy<Regex> = Lazy::new(|| {
    anchored(format!(
        "({REG}|{VAR}){ASSIGN}({REG}|{UNUM}|{VAR})(\\+|-|\\*|and|or)({REG}|{UNUM}|{VAR})"
    ))
});
static MEM_LOAD: Lazy<Regex> = Lazy::new(|| {
    anchored(format!(
        "({REG}|{VAR}){ASSIGN}memory\\[({REG}|{UNUM}|{VAR})(?:\\+({REG}|{UNUM}|{VAR}))?\\]"
    ))
});
static MEM_STORE: Lazy<Regex> = Lazy::new(|| {
    anchored(format!(
        "memory\\[({REG}|{UNUM}|{VAR})(?:\\+({REG}|{UNUM}|{VAR}))?\\]{ASSIGN}({REG}|{VAR})"
    ))
});
static ARRAY_READ: Lazy<Regex> = Lazy::new(|| {
    anchored(format!(
        "({REG}|{VAR}){ASSIGN}({REG}|{VAR})\\[({REG}|{UNUM}|{VAR})\\]"
    ))
});
static ARRAY_WRITE: Lazy<Regex> = Lazy::new(|| {
    anchored(format!(
        "({REG}|{VAR})\\[({REG}|{UNUM}|{VAR})\\]{ASSIGN}({REG}|{VAR})"
    ))
});
static STRING_INIT: Lazy<Regex> =
    Lazy::new(|| anchored(format!("({REG}|{VAR}){ASSIGN}\"(\\w{{2,}})\"")));
static CHAR_INIT: Lazy<Regex> =
    Lazy::new(|| anchored(format!("({REG}|{VAR}){ASSIGN}(\"\\w\"|'\\w')")));
static ARRAY_INIT: Lazy<Regex> = Lazy::new(|| {
    anchored(format!(
        "(byte|hword|word|quad|octa)?({REG}|{VAR}){ASSIGN}\\{{({UNUM})(?:,(?:{UNUM}))*\\}}"
    ))
});
static ADDRESS_OF: Lazy<Regex> =
    Lazy::new(|| anchored(format!("({REG}|{VAR}){ASSIGN}address\\(({REG}|{VAR})\\)")));
static INPUT: Lazy<Regex> = Lazy::new(|| Regex::new(&format!("^(?i:input)\\s+({REG}|{VAR})$")).unwrap());
static OUTPUT: Lazy<Regex> =
    Lazy::new(|| Regex::new(&format!("^(?i:output)\\s+({REG}|{VAR})$")).unwrap());

/// Target mnemonics accepted for raw passthrough lines.
static MNEMONICS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "lsl", "lsr", "asr", "ror", "rrx", "adcs", "and", "eor", "sub", "rsb", "add", "adc",
        "sbc", "rsc", "bic", "orr", "mov", "mvn", "tst", "teq", "cmp", "cmn", "sel", "mul",
        "mla", "smla", "smuadx", "smlsd", "smmla", "smmls", "mrs", "msr", "b", "bl", "ldr",
        "str", "ldm", "stm", "ldmfd", "stmfd", "cpsie", "cpsid", "srs", "rfe", "setend", "cdp",
        "ldc", "stc", "mcr", "mrc", "mrrc", "swi", "bkpt", "pkhbt", "pkhtb", "sxtb", "sxth",
        "uxtb", "uxth", "sxtab", "sxtah", "uxtab", "uxtah", "ssat", "usat", "rev", "clz",
        "cpy", "cdc",
    ]
    .into_iter()
    .collect()
});

fn squeeze(line: &str) -> String {
    line.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Classify one trimmed statement line. `is_variable` reports whether a name
/// is already known as a source variable; it guards the raw-mnemonic case so
/// a line like `mov <- 3` is never misread as an instruction named `mov`.
pub fn classify(line: &str, is_variable: &dyn Fn(&str) -> bool) -> LineKind {
    let trimmed = line.trim();
    let packed = squeeze(trimmed);
    if BOOL_ASSIGN.is_match(&packed) {
        LineKind::BooleanAssignment
    } else if ASSIGNMENT.is_match(&packed) {
        LineKind::Assignment
    } else if BINARY.is_match(&packed) {
        LineKind::BinaryExpression
    } else if MEM_LOAD.is_match(&packed) {
        LineKind::MemoryLoad
    } else if MEM_STORE.is_match(&packed) {
        LineKind::MemoryStore
    } else if ARRAY_READ.is_match(&packed) {
        LineKind::ArrayElementRead
    } else if ARRAY_WRITE.is_match(&packed) {
        LineKind::ArrayElementWrite
    } else if STRING_INIT.is_match(&packed) {
        LineKind::StringInitializer
    } else if CHAR_INIT.is_match(&packed) {
        LineKind::CharInitializer
    } else if ARRAY_INIT.is_match(&packed) {
        LineKind::ArrayInitializer
    } else if ADDRESS_OF.is_match(&packed) {
        LineKind::AddressOf
    } else if INPUT.is_match(trimmed) {
        LineKind::Input
    } else if OUTPUT.is_match(trimmed) {
        LineKind::Output
    } else if is_raw_instruction(trimmed, is_variable) {
        LineKind::RawInstruction
    } else {
        LineKind::Unsupported
    }
}

fn is_raw_instruction(line: &str, is_variable: &dyn Fn(&str) -> bool) -> bool {
    let Some(token) = line.split_whitespace().next() else {
        return false;
    };
    MNEMONICS.contains(token.to_ascii_lowercase().as_str()) && !is_variable(token)
}

// ---------------------------------------------------------------------------
// Capture helpers used by the lowering engines. Each reuses the classifying
// pattern, so a line that classified as kind K always parses as kind K.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryParts {
    pub dest: String,
    pub lhs: String,
    pub op: String,
    pub rhs: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemAccess {
    /// Destination register for a load, source register for a store.
    pub value: String,
    pub base: String,
    pub offset: Option<String>,
    pub is_load: bool,
}

pub fn parse_assignment(line: &str) -> Option<(String, String)> {
    let packed = squeeze(line);
    let caps = ASSIGNMENT.captures(&packed)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

pub fn parse_binary(line: &str) -> Option<BinaryParts> {
    let packed = squeeze(line);
    let caps = BINARY.captures(&packed)?;
    Some(BinaryParts {
        dest: caps[1].to_string(),
        lhs: caps[2].to_string(),
        op: caps[3].to_string(),
        rhs: caps[4].to_string(),
    })
}

pub fn parse_memory(line: &str) -> Option<MemAccess> {
    let packed = squeeze(line);
    if let Some(caps) = MEM_LOAD.captures(&packed) {
        return Some(MemAccess {
            value: caps[1].to_string(),
            base: caps[2].to_string(),
            offset: caps.get(3).map(|m| m.as_str().to_string()),
            is_load: true,
        });
    }
    let caps = MEM_STORE.captures(&packed)?;
    Some(MemAccess {
        value: caps[3].to_string(),
        base: caps[1].to_string(),
        offset: caps.get(2).map(|m| m.as_str().to_string()),
        is_load: false,
    })
}

pub fn parse_array_read(line: &str) -> Option<(String, String, String)> {
    let packed = squeeze(line);
    let caps = ARRAY_READ.captures(&packed)?;
    Some((caps[1].to_string(), caps[2].to_string(), caps[3].to_string()))
}

pub fn parse_array_write(line: &str) -> Option<(String, String, String)> {
    let packed = squeeze(line);
    let caps = ARRAY_WRITE.captures(&packed)?;
    Some((caps[1].to_string(), caps[2].to_string(), caps[3].to_string()))
}

pub fn parse_string_init(line: &str) -> Option<(String, String)> {
    let packed = squeeze(line);
    let caps = STRING_INIT.captures(&packed)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

pub fn parse_address_of(line: &str) -> Option<(String, String)> {
    let packed = squeeze(line);
    let caps = ADDRESS_OF.captures(&packed)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

pub fn parse_io(line: &str) -> Option<String> {
    let caps = INPUT
        .captures(line.trim())
        .or_else(|| OUTPUT.captures(line.trim()))?;
    Some(caps[1].to_string())
}

/// Array initializer split from the raw (unsqueezed) line, so the optional
/// element-type keyword is separated from the target name by whitespace
/// rather than by guessing at a prefix.
pub fn parse_array_init(line: &str) -> Option<(Option<ElemType>, String, Vec<String>)> {
    if !ARRAY_INIT.is_match(&squeeze(line)) {
        return None;
    }
    let (lhs, rhs) = split_assign(line)?;
    let mut elem = None;
    let mut name = lhs.trim();
    if let Some((first, rest)) = name.split_once(char::is_whitespace) {
        if let Ok(parsed) = first.parse::<ElemType>() {
            elem = Some(parsed);
            name = rest.trim();
        }
    }
    let values = rhs
        .trim()
        .trim_start_matches('{')
        .trim_end_matches('}')
        .split(',')
        .map(|v| v.trim().to_string())
        .collect();
    Some((elem, name.to_string(), values))
}

pub fn split_assign(line: &str) -> Option<(&str, &str)> {
    line.split_once("<-").or_else(|| line.split_once(":="))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kind(line: &str) -> LineKind {
        classify(line, &|_| false)
    }

    #[test]
    fn boolean_is_tried_before_generic_assignment() {
        assert_eq!(kind("flag <- true"), LineKind::BooleanAssignment);
        assert_eq!(kind("flag <- other"), LineKind::Assignment);
    }

    #[test]
    fn initializer_forms_win_over_binary_expression() {
        assert_eq!(kind("word vals <- {1, 2, 3}"), LineKind::ArrayInitializer);
        assert_eq!(kind("x <- a + b"), LineKind::BinaryExpression);
        assert_eq!(kind("x <- arr[3]"), LineKind::ArrayElementRead);
        assert_eq!(kind("arr[3] <- R2"), LineKind::ArrayElementWrite);
    }

    #[test]
    fn string_and_char_initializers() {
        assert_eq!(kind("s <- \"hello\""), LineKind::StringInitializer);
        assert_eq!(kind("c <- 'a'"), LineKind::CharInitializer);
        assert_eq!(kind("c <- \"a\""), LineKind::CharInitializer);
    }

    #[test]
    fn memory_and_address_forms() {
        assert_eq!(kind("x <- memory[R1]"), LineKind::MemoryLoad);
        assert_eq!(kind("memory[R1 + 4] <- R0"), LineKind::MemoryStore);
        assert_eq!(kind("R0 <- address(vals)"), LineKind::AddressOf);
    }

    #[test]
    fn io_statements() {
        assert_eq!(kind("input x"), LineKind::Input);
        assert_eq!(kind("OUTPUT total"), LineKind::Output);
    }

    #[test]
    fn raw_mnemonic_only_when_not_a_variable() {
        assert_eq!(kind("CMP R0, R1"), LineKind::RawInstruction);
        assert_eq!(kind("mov <- 3"), LineKind::Assignment);
        // `mov` as a bare leading token is an instruction unless the name is
        // a known variable.
        assert_eq!(kind("mov R0, R1"), LineKind::RawInstruction);
        let as_var = classify("mov R0, R1", &|name| name == "mov");
        assert_eq!(as_var, LineKind::Unsupported);
    }

    #[test]
    fn garbage_is_unsupported_not_fatal() {
        assert_eq!(kind("x <- a + b + c"), LineKind::Unsupported);
        assert_eq!(kind("???"), LineKind::Unsupported);
    }

    #[test]
    fn array_init_split_keeps_type_keyword_separate() {
        let (elem, name, values) = parse_array_init("word vals <- {1, 2, 3}").unwrap();
        assert_eq!(elem, Some(ElemType::Word));
        assert_eq!(name, "vals");
        assert_eq!(values, vec!["1", "2", "3"]);
        let (elem, name, _) = parse_array_init("R3 <- {4, 5}").unwrap();
        assert_eq!(elem, None);
        assert_eq!(name, "R3");
    }
}
