//! The register bank and the per-register address-association table.
//!
//! Both structures are unit-scoped mutable state owned by the generator
//! instance and reset at the start of every routine; nothing here is shared
//! across translations.

use crate::operand::{Register, NUM_REGISTERS};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SlotState {
    #[default]
    Free,
    /// Currently holds the value of a source variable.
    Bound(String),
    /// The source text names this physical register literally; the allocator
    /// must never hand it to a different variable.
    UserReserved,
    /// Short-lived scratch allocation, released by its acquirer.
    Temporary,
}

#[derive(Debug, Clone)]
pub struct RegisterBank {
    slots: Vec<SlotState>,
}

impl Default for RegisterBank {
    fn default() -> Self {
        Self::new()
    }
}

impl RegisterBank {
    pub fn new() -> Self {
        Self {
            slots: vec![SlotState::Free; NUM_REGISTERS],
        }
    }

    pub fn reset(&mut self) {
        for slot in &mut self.slots {
            *slot = SlotState::Free;
        }
    }

    pub fn state(&self, reg: Register) -> &SlotState {
        &self.slots[reg.index()]
    }

    /// First free register in canonical (ascending) order, or `None` when the
    /// pool is exhausted. Exhaustion is a hard resource limit, not a
    /// retryable condition; there is no spilling.
    pub fn acquire_free(&mut self) -> Option<Register> {
        Register::all().find(|reg| self.slots[reg.index()] == SlotState::Free)
    }

    /// Register already bound to `var`, or a freshly bound one.
    pub fn bind(&mut self, var: &str) -> Option<Register> {
        if let Some(reg) = self.lookup(var) {
            return Some(reg);
        }
        let reg = self.acquire_free()?;
        self.slots[reg.index()] = SlotState::Bound(var.to_string());
        Some(reg)
    }

    pub fn lookup(&self, var: &str) -> Option<Register> {
        Register::all().find(|reg| matches!(&self.slots[reg.index()], SlotState::Bound(name) if name == var))
    }

    pub fn is_known_variable(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Acquire a scratch register for the lifetime of a single statement.
    pub fn acquire_temp(&mut self) -> Option<Register> {
        let reg = self.acquire_free()?;
        self.slots[reg.index()] = SlotState::Temporary;
        Some(reg)
    }

    /// Give a slot back to the pool. Only temporaries and variable bindings
    /// may be released; a user-reserved register stays reserved and the call
    /// reports the refusal.
    pub fn release(&mut self, reg: Register) -> bool {
        match self.slots[reg.index()] {
            SlotState::Temporary | SlotState::Bound(_) => {
                self.slots[reg.index()] = SlotState::Free;
                true
            }
            SlotState::UserReserved => false,
            SlotState::Free => true,
        }
    }

    pub fn reserve(&mut self, reg: Register) {
        self.slots[reg.index()] = SlotState::UserReserved;
    }

    /// Pre-pass run once per routine: every register named literally anywhere
    /// in the routine text is marked user-reserved before any statement is
    /// lowered.
    pub fn reserve_named_registers<'a>(&mut self, lines: impl IntoIterator<Item = &'a str>) {
        for line in lines {
            for token in line.split(|c: char| !c.is_ascii_alphanumeric()) {
                if let Ok(reg) = token.parse::<Register>() {
                    self.reserve(reg);
                }
            }
        }
    }

    /// Registers currently holding anything, in canonical order. Used for
    /// save/restore lists around conservative calls.
    pub fn in_use(&self) -> Vec<Register> {
        Register::all()
            .filter(|reg| self.slots[reg.index()] != SlotState::Free)
            .collect()
    }
}

/// One flag per register: true iff the register's current content is known
/// to be the load address of a specific declared array.
#[derive(Debug, Clone, Default)]
pub struct AddressTable {
    flags: [bool; NUM_REGISTERS],
}

impl AddressTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.flags = [false; NUM_REGISTERS];
    }

    /// Record that an address-load instruction for `reg` was just emitted.
    pub fn note_loaded(&mut self, reg: Register) {
        self.flags[reg.index()] = true;
    }

    /// Must be called whenever `reg` is the target of any instruction other
    /// than an explicit address load.
    pub fn invalidate(&mut self, reg: Register) {
        self.flags[reg.index()] = false;
    }

    pub fn invalidate_all(&mut self) {
        self.reset();
    }

    pub fn has_address(&self, reg: Register) -> bool {
        self.flags[reg.index()]
    }
}
