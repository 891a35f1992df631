use crate::dialect::Dialect;
use serde::{Deserialize, Serialize};

/// Options read once per translation unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArmOptions {
    /// Target assembly syntax dialect.
    pub dialect: Dialect,
    /// Emit an alignment directive before each array declaration.
    pub align_arrays: bool,
    /// Zero-terminate string literals lowered to char arrays.
    pub terminate_strings: bool,
    /// Reject condition text that does not match the restricted input syntax
    /// instead of trying a best-effort translation.
    pub strict_syntax: bool,
}

impl Default for ArmOptions {
    fn default() -> Self {
        Self {
            dialect: Dialect::Gnu,
            align_arrays: false,
            terminate_strings: true,
            strict_syntax: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn options_round_trip_through_json() {
        let options = ArmOptions {
            dialect: Dialect::Keil,
            align_arrays: true,
            ..ArmOptions::default()
        };
        let text = serde_json::to_string(&options).unwrap();
        let back: ArmOptions = serde_json::from_str(&text).unwrap();
        assert_eq!(back.dialect, Dialect::Keil);
        assert!(back.align_arrays);
        assert!(back.terminate_strings);
    }
}
