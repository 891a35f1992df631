//! The two supported assembly syntax dialects, expressed as a small
//! descriptor table keyed by an enum. Everything dialect-specific is a
//! string lookup here; there is no subtype polymorphism in the backend.

use crate::operand::Register;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString, Serialize, Deserialize,
)]
pub enum Dialect {
    /// GNU as: `label:`, `#` immediates, `.data`/`.text`, `//` comments.
    #[default]
    Gnu,
    /// Keil armasm: bare labels, `AREA` sections, `;` comments.
    Keil,
}

pub struct DialectDescriptor {
    pub label_suffix: &'static str,
    pub imm_prefix: &'static str,
    pub comment_token: &'static str,
    pub data_section: &'static str,
    pub text_section: &'static str,
    pub align_directive: &'static str,
}

static GNU: DialectDescriptor = DialectDescriptor {
    label_suffix: ":",
    imm_prefix: "#",
    comment_token: "//",
    data_section: ".data",
    text_section: ".text",
    align_directive: ".align 2",
};

static KEIL: DialectDescriptor = DialectDescriptor {
    label_suffix: "",
    imm_prefix: "",
    comment_token: ";",
    data_section: "AREA data, DATA, READWRITE",
    text_section: "AREA text, CODE, READONLY",
    align_directive: "ALIGN 4",
};

/// Element widths accepted in array initializers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ElemType {
    Byte,
    Hword,
    Word,
    Quad,
    Octa,
}

impl ElemType {
    pub fn size_log2(self) -> u32 {
        match self {
            ElemType::Byte => 0,
            ElemType::Hword => 1,
            ElemType::Word => 2,
            ElemType::Quad => 3,
            ElemType::Octa => 4,
        }
    }

    pub fn from_size_log2(log2: u32) -> Option<Self> {
        match log2 {
            0 => Some(ElemType::Byte),
            1 => Some(ElemType::Hword),
            2 => Some(ElemType::Word),
            3 => Some(ElemType::Quad),
            4 => Some(ElemType::Octa),
            _ => None,
        }
    }
}

impl Dialect {
    pub fn descriptor(self) -> &'static DialectDescriptor {
        match self {
            Dialect::Gnu => &GNU,
            Dialect::Keil => &KEIL,
        }
    }

    /// Data directive announcing elements of the given width.
    pub fn data_directive(self, elem: ElemType) -> &'static str {
        match self {
            Dialect::Gnu => match elem {
                ElemType::Byte => ".byte",
                ElemType::Hword => ".hword",
                ElemType::Word => ".word",
                ElemType::Quad => ".quad",
                ElemType::Octa => ".octa",
            },
            Dialect::Keil => match elem {
                ElemType::Byte => "DCB",
                ElemType::Hword => "DCW",
                ElemType::Word | ElemType::Quad | ElemType::Octa => "DCD",
            },
        }
    }

    /// Recover the element width from a directive found in an emitted
    /// declaration line.
    pub fn elem_of_directive(self, directive: &str) -> Option<ElemType> {
        match directive {
            ".byte" | "DCB" => Some(ElemType::Byte),
            ".hword" | "DCW" => Some(ElemType::Hword),
            ".word" | "DCD" => Some(ElemType::Word),
            ".quad" => Some(ElemType::Quad),
            ".octa" => Some(ElemType::Octa),
            _ => None,
        }
    }

    /// Instruction loading the address of a data label into a register.
    pub fn address_load(self, reg: Register, label: &str) -> String {
        match self {
            Dialect::Gnu => format!("ADR {}, {}", reg, label),
            Dialect::Keil => format!("LDR {}, ={}", reg, label),
        }
    }

    pub fn label_def(self, name: &str) -> String {
        format!("{}{}", name, self.descriptor().label_suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptors_differ_where_documented() {
        let gnu = Dialect::Gnu.descriptor();
        let keil = Dialect::Keil.descriptor();
        assert_ne!(gnu.label_suffix, keil.label_suffix);
        assert_ne!(gnu.imm_prefix, keil.imm_prefix);
        assert_ne!(gnu.data_section, keil.data_section);
    }

    #[test]
    fn directive_round_trip() {
        for elem in [
            ElemType::Byte,
            ElemType::Hword,
            ElemType::Word,
            ElemType::Quad,
            ElemType::Octa,
        ] {
            let directive = Dialect::Gnu.data_directive(elem);
            assert_eq!(Dialect::Gnu.elem_of_directive(directive), Some(elem));
        }
    }
}
