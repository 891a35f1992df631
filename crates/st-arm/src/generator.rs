//! Tree walk driving the ARM backend.
//!
//! The generator owns all unit-scoped mutable state (register bank, address
//! table, label counter) and threads it through a single synchronous pass
//! over the structured-program tree. Nothing here is fatal: every failure
//! recovers by skipping the statement at hand and leaving a diagnostic
//! comment in the output.

use crate::classify::{self, LineKind};
use crate::conditions::{self, ConditionLowerer, LabelKeys};
use crate::config::ArmOptions;
use crate::dialect::{Dialect, ElemType};
use crate::expr::ExprLowerer;
use crate::jumps::{JumpManager, ERROR_MARKER_LABEL};
use crate::operand::{self, Operand, Register};
use crate::peephole;
use crate::registers::{AddressTable, RegisterBank};
use itertools::Itertools;
use st_core::ast::{CaseBranch, Element, ElementKind, ForStyle, JumpKind, Routine};
use st_core::diagnostics::Diagnostic;
use st_core::emit::CodeBuffer;
use st_core::jump::JumpTable;
use st_core::symbols::{ArrayInfo, CallResolver};
use st_core::tracing::debug;
use st_core::Result;

const LOG_AREA: &str = "[tree→arm]";
const INDENT: &str = "\t\t";

/// Result of translating one routine: the assembly text plus every
/// diagnostic raised along the way.
#[derive(Debug)]
pub struct GeneratedUnit {
    pub text: String,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct ArmGenerator<'a> {
    options: ArmOptions,
    dialect: Dialect,
    buf: CodeBuffer,
    bank: RegisterBank,
    addr: AddressTable,
    jumps: JumpManager,
    jump_table: &'a JumpTable,
    resolver: &'a dyn CallResolver,
    diagnostics: Vec<Diagnostic>,
    data_counter: u32,
}

impl<'a> ArmGenerator<'a> {
    pub fn new(
        options: ArmOptions,
        jump_table: &'a JumpTable,
        resolver: &'a dyn CallResolver,
    ) -> Self {
        let dialect = options.dialect;
        Self {
            options,
            dialect,
            buf: CodeBuffer::new(dialect.descriptor().comment_token),
            bank: RegisterBank::new(),
            addr: AddressTable::new(),
            jumps: JumpManager::new(),
            jump_table,
            resolver,
            diagnostics: Vec::new(),
            data_counter: 0,
        }
    }

    /// Translate one routine to linear assembly text. Always runs to
    /// completion; recoverable problems surface as diagnostics.
    pub fn generate(mut self, routine: &Routine) -> Result<GeneratedUnit> {
        debug!("{} translating routine '{}'", LOG_AREA, routine.name);
        let descriptor = self.dialect.descriptor();
        self.buf.add(descriptor.data_section, "", false);
        self.buf.mark_insertion();
        self.buf.add(descriptor.text_section, "", false);
        self.buf.add("", "", false);

        // Per-routine state; nothing survives from a previous translation.
        self.bank.reset();
        self.addr.reset();
        self.bank.reserve_named_registers(routine.text_lines());
        for param in &routine.params {
            if self.bank.bind(param).is_none() {
                self.diagnose(format!("no free register for parameter '{}'", param));
            }
        }

        self.buf
            .add(&self.dialect.label_def(&routine.name), "", false);
        self.walk(&routine.body, false);

        if self.jumps.error_label_used {
            self.buf
                .add(&self.dialect.label_def(ERROR_MARKER_LABEL), "", false);
        }
        self.buf.add("MOV PC, LR", INDENT, false);

        debug!(
            "{} finished '{}', {} lines, {} diagnostics",
            LOG_AREA,
            routine.name,
            self.buf.len(),
            self.diagnostics.len()
        );
        Ok(GeneratedUnit {
            text: self.buf.text(),
            diagnostics: self.diagnostics,
        })
    }

    fn walk(&mut self, elements: &[Element], disabled: bool) {
        for element in elements {
            self.element(element, disabled);
        }
    }

    fn element(&mut self, element: &Element, inherited_disabled: bool) {
        let disabled = inherited_disabled || element.disabled;
        if let Some(header) = element.header_text() {
            self.buf.add_comment(&header, INDENT);
        }
        match &element.kind {
            ElementKind::Sequence(inner) => self.walk(inner, disabled),
            ElementKind::Instruction { lines } => {
                for line in lines {
                    self.instruction_line(line, disabled);
                }
            }
            ElementKind::Alternative {
                condition,
                q_true,
                q_false,
            } => self.alternative(condition, q_true, q_false, disabled),
            ElementKind::Case {
                discriminant,
                branches,
                default,
            } => self.case(element, discriminant, branches, default.as_deref(), disabled),
            ElementKind::For {
                counter,
                style,
                body,
            } => match style {
                ForStyle::Counting { start, end, step } => {
                    self.counting_for(element, counter, start, end, step, body, disabled)
                }
                ForStyle::Traversing { value_list } => {
                    self.traversing_for(element, counter, value_list, body, disabled)
                }
            },
            ElementKind::While { condition, body } => {
                self.while_loop(element, condition, body, disabled)
            }
            ElementKind::Repeat { body, until } => self.repeat(element, body, until, disabled),
            ElementKind::Forever { body } => self.forever(element, body, disabled),
            ElementKind::Call { text } => self.call(text, disabled),
            ElementKind::Jump { kind, argument } => {
                self.jump(element, *kind, argument.as_deref(), disabled)
            }
            ElementKind::Parallel { branches } => {
                self.diagnose(format!(
                    "parallel sections are not supported ({} branches dropped)",
                    branches.len()
                ));
            }
            ElementKind::Try { .. } => {
                self.diagnose("try/catch blocks are not supported".to_string());
            }
        }
    }

    // ------------------------------------------------------------------
    // Instruction lines
    // ------------------------------------------------------------------

    fn instruction_line(&mut self, line: &str, disabled: bool) {
        let bank = &self.bank;
        let kind = classify::classify(line, &|name| bank.is_known_variable(name));
        match kind {
            LineKind::BooleanAssignment => {
                let rewritten = line.replace("true", "1").replace("false", "0");
                let result = self.expr_lowerer().lower_assignment(&rewritten);
                self.emit_lowered(result, line, disabled);
            }
            LineKind::Assignment => {
                let result = self.expr_lowerer().lower_assignment(line);
                self.emit_lowered(result, line, disabled);
            }
            LineKind::CharInitializer => {
                let rewritten = line.replace('"', "'");
                let result = classify::split_assign(&rewritten)
                    .ok_or(crate::expr::LowerError::Malformed(line.to_string()))
                    .and_then(|(dest, src)| {
                        self.expr_lowerer().lower_move(dest.trim(), src.trim())
                    });
                self.emit_lowered(result, line, disabled);
            }
            LineKind::BinaryExpression => {
                let result = self.expr_lowerer().lower_binary(line);
                self.emit_lowered(result, line, disabled);
            }
            LineKind::MemoryLoad | LineKind::MemoryStore => self.memory_access(line, disabled),
            LineKind::ArrayElementRead => self.array_read(line, disabled),
            LineKind::ArrayElementWrite => self.array_write(line, disabled),
            LineKind::ArrayInitializer => self.array_init(line, disabled),
            LineKind::StringInitializer => self.string_init(line, disabled),
            LineKind::AddressOf => self.address_of(line, disabled),
            LineKind::Input | LineKind::Output => self.io_line(line, kind, disabled),
            LineKind::RawInstruction => {
                self.buf.add(line.trim(), INDENT, disabled);
                // The passthrough line may overwrite anything.
                self.addr.invalidate_all();
            }
            LineKind::Unsupported => {
                self.diagnose(format!("cannot translate statement '{}'", line.trim()));
            }
        }
    }

    fn expr_lowerer(&mut self) -> ExprLowerer<'_> {
        ExprLowerer::new(&mut self.bank, &mut self.addr, self.dialect)
    }

    fn emit_lowered(
        &mut self,
        result: std::result::Result<Vec<String>, crate::expr::LowerError>,
        line: &str,
        disabled: bool,
    ) {
        match result {
            Ok(lines) => {
                for instr in lines {
                    self.buf.add(&instr, INDENT, disabled);
                }
            }
            Err(error) => self.diagnose(format!("{} in '{}'", error, line.trim())),
        }
    }

    fn memory_access(&mut self, line: &str, disabled: bool) {
        let Some(access) = classify::parse_memory(line) else {
            self.diagnose(format!("cannot translate statement '{}'", line.trim()));
            return;
        };
        let mut lines = Vec::new();
        let mut scratch = Vec::new();
        let value_reg = match self.token_register(&access.value, &mut lines, &mut scratch) {
            Some(reg) => reg,
            None => {
                self.diagnose(format!("no free register in '{}'", line.trim()));
                return;
            }
        };
        let base_reg = match self.token_register(&access.base, &mut lines, &mut scratch) {
            Some(reg) => reg,
            None => {
                self.diagnose(format!("no free register in '{}'", line.trim()));
                return;
            }
        };
        let location = match &access.offset {
            None => format!("[{}]", base_reg),
            Some(offset) => match Operand::parse(offset) {
                Operand::Int(value) => format!(
                    "[{}, {}{}]",
                    base_reg,
                    self.dialect.descriptor().imm_prefix,
                    value
                ),
                _ => match self.token_register(offset, &mut lines, &mut scratch) {
                    Some(reg) => format!("[{}, {}]", base_reg, reg),
                    None => {
                        self.diagnose(format!("no free register in '{}'", line.trim()));
                        return;
                    }
                },
            },
        };
        if access.is_load {
            lines.push(format!("LDR {}, {}", value_reg, location));
            self.addr.invalidate(value_reg);
        } else {
            lines.push(format!("STR {}, {}", value_reg, location));
        }
        for instr in lines {
            self.buf.add(&instr, INDENT, disabled);
        }
        for reg in scratch {
            self.bank.release(reg);
        }
    }

    /// Resolve a token to a register, materializing constants through a
    /// scratch register when needed.
    fn token_register(
        &mut self,
        token: &str,
        lines: &mut Vec<String>,
        scratch: &mut Vec<Register>,
    ) -> Option<Register> {
        match Operand::parse(token) {
            Operand::Reg(reg) => Some(reg),
            Operand::Var(name) => self.bank.bind(&name),
            Operand::Int(value) => {
                let reg = self.bank.acquire_temp()?;
                scratch.push(reg);
                lines.push(conditions::materialize_constant(reg, value, self.dialect));
                Some(reg)
            }
            Operand::Char(c) => {
                let reg = self.bank.acquire_temp()?;
                scratch.push(reg);
                lines.push(conditions::materialize_constant(reg, c as i64, self.dialect));
                Some(reg)
            }
        }
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    fn array_read(&mut self, line: &str, disabled: bool) {
        let Some((dest, array, index)) = classify::parse_array_read(line) else {
            self.diagnose(format!("cannot translate statement '{}'", line.trim()));
            return;
        };
        let Some(dest_reg) = self.value_register(&dest) else {
            self.diagnose(format!("no free register in '{}'", line.trim()));
            return;
        };
        let Some((base_reg, info)) = self.array_base(&array, disabled) else {
            self.diagnose(format!("the array '{}' is not initialized", array));
            return;
        };
        let Some(location) = self.element_location(base_reg, &index, &info) else {
            self.diagnose(format!("no free register in '{}'", line.trim()));
            return;
        };
        self.buf
            .add(&format!("LDR {}, {}", dest_reg, location), INDENT, disabled);
        self.addr.invalidate(dest_reg);
    }

    fn array_write(&mut self, line: &str, disabled: bool) {
        let Some((array, index, src)) = classify::parse_array_write(line) else {
            self.diagnose(format!("cannot translate statement '{}'", line.trim()));
            return;
        };
        let Some(src_reg) = self.value_register(&src) else {
            self.diagnose(format!("no free register in '{}'", line.trim()));
            return;
        };
        let Some((base_reg, info)) = self.array_base(&array, disabled) else {
            self.diagnose(format!("the array '{}' is not initialized", array));
            return;
        };
        let Some(location) = self.element_location(base_reg, &index, &info) else {
            self.diagnose(format!("no free register in '{}'", line.trim()));
            return;
        };
        self.buf
            .add(&format!("STR {}, {}", src_reg, location), INDENT, disabled);
    }

    fn value_register(&mut self, token: &str) -> Option<Register> {
        match Operand::parse(token) {
            Operand::Reg(reg) => Some(reg),
            Operand::Var(name) => self.bank.bind(&name),
            _ => None,
        }
    }

    /// Scaled element address within a declared array.
    fn element_location(
        &mut self,
        base: Register,
        index: &str,
        info: &ArrayInfo,
    ) -> Option<String> {
        let imm = self.dialect.descriptor().imm_prefix;
        match Operand::parse(index) {
            Operand::Int(value) => {
                let offset = info.offset_of(value.max(0) as usize);
                Some(format!("[{}, {}{}]", base, imm, offset))
            }
            Operand::Reg(reg) => Some(self.scaled_location(base, reg, info)),
            Operand::Var(name) => {
                let reg = self.bank.bind(&name)?;
                Some(self.scaled_location(base, reg, info))
            }
            Operand::Char(_) => None,
        }
    }

    fn scaled_location(&self, base: Register, index: Register, info: &ArrayInfo) -> String {
        let imm = self.dialect.descriptor().imm_prefix;
        if info.elem_size_log2 > 0 {
            format!("[{}, {}, LSL {}{}]", base, index, imm, info.elem_size_log2)
        } else {
            format!("[{}, {}]", base, index)
        }
    }

    /// Register holding the array's base address, loading it if the
    /// address-tracking table does not already vouch for it.
    fn array_base(&mut self, token: &str, disabled: bool) -> Option<(Register, ArrayInfo)> {
        match Operand::parse(token) {
            Operand::Reg(reg) => {
                // A literal register: recover the array it was loaded with
                // from the previously emitted address-load line.
                let label = self.loaded_label(reg)?;
                let info = self.array_info(&label)?;
                Some((reg, info))
            }
            Operand::Var(name) => {
                let info = self.array_info(&name)?;
                let reg = self.bank.bind(&name)?;
                if !self.addr.has_address(reg) {
                    let load = self.dialect.address_load(reg, &name);
                    self.buf.add(&load, INDENT, disabled);
                    self.addr.note_loaded(reg);
                }
                Some((reg, info))
            }
            _ => None,
        }
    }

    /// The data label most recently address-loaded into `reg`, scanning the
    /// emitted lines backwards.
    fn loaded_label(&self, reg: Register) -> Option<String> {
        let adr_prefix = format!("ADR {}, ", reg);
        let ldr_prefix = format!("LDR {}, =", reg);
        for line in self.buf.lines().iter().rev() {
            let trimmed = line.trim();
            if let Some(label) = trimmed
                .strip_prefix(&adr_prefix)
                .or_else(|| trimmed.strip_prefix(&ldr_prefix))
            {
                return Some(label.trim().to_string());
            }
        }
        None
    }

    /// Array facts recovered by scanning previously emitted declaration
    /// lines in the data section.
    fn array_info(&self, name: &str) -> Option<ArrayInfo> {
        for line in self.buf.lines() {
            let trimmed = line.trim();
            let Some(rest) = trimmed.strip_prefix(name) else {
                continue;
            };
            let rest = rest.trim_start_matches(':').trim();
            let mut tokens = rest.splitn(2, char::is_whitespace);
            let directive = tokens.next()?;
            let Some(elem) = self.dialect.elem_of_directive(directive) else {
                continue;
            };
            let values = tokens.next().unwrap_or("");
            let len = values.split(',').filter(|v| !v.trim().is_empty()).count();
            return Some(ArrayInfo {
                elem_size_log2: elem.size_log2(),
                len,
            });
        }
        None
    }

    fn array_init(&mut self, line: &str, disabled: bool) {
        let Some((elem, name, values)) = classify::parse_array_init(line) else {
            self.diagnose(format!("cannot translate statement '{}'", line.trim()));
            return;
        };
        self.emit_array_data(&name, elem.unwrap_or(ElemType::Word), &values, disabled);
    }

    fn string_init(&mut self, line: &str, disabled: bool) {
        let Some((dest, content)) = classify::parse_string_init(line) else {
            self.diagnose(format!("cannot translate statement '{}'", line.trim()));
            return;
        };
        let mut values: Vec<String> = content.chars().map(|c| format!("'{}'", c)).collect();
        if self.options.terminate_strings {
            values.push("0".to_string());
        }
        self.emit_array_data(&dest, ElemType::Word, &values, disabled);
    }

    /// Place an array declaration into the data section and, for a register
    /// target, load its address.
    fn emit_array_data(&mut self, target: &str, elem: ElemType, values: &[String], disabled: bool) {
        let directive = self.dialect.data_directive(elem);
        let rendered = values.iter().join(", ");
        let (label, load_into) = match Operand::parse(target) {
            Operand::Reg(reg) => {
                let label = format!("v_{}", self.data_counter);
                self.data_counter += 1;
                (label, Some(reg))
            }
            _ => (target.to_string(), None),
        };
        if self.options.align_arrays {
            self.buf
                .insert_top(format!("\t{}", self.dialect.descriptor().align_directive));
        }
        self.buf.insert_top(format!(
            "{}\t{}\t{}",
            self.dialect.label_def(&label),
            directive,
            rendered
        ));
        if let Some(reg) = load_into {
            let load = self.dialect.address_load(reg, &label);
            self.buf.add(&load, INDENT, disabled);
            self.addr.note_loaded(reg);
        }
    }

    fn address_of(&mut self, line: &str, disabled: bool) {
        let Some((dest, target)) = classify::parse_address_of(line) else {
            self.diagnose(format!("cannot translate statement '{}'", line.trim()));
            return;
        };
        let Some(dest_reg) = self.value_register(&dest) else {
            self.diagnose(format!("no free register in '{}'", line.trim()));
            return;
        };
        let load = self.dialect.address_load(dest_reg, &target);
        self.buf.add(&load, INDENT, disabled);
        if self.array_info(&target).is_some() {
            self.addr.note_loaded(dest_reg);
        } else {
            self.addr.invalidate(dest_reg);
        }
    }

    fn io_line(&mut self, line: &str, kind: LineKind, disabled: bool) {
        let Some(token) = classify::parse_io(line) else {
            self.diagnose(format!("cannot translate statement '{}'", line.trim()));
            return;
        };
        let Some(reg) = self.value_register(&token) else {
            self.diagnose(format!("no free register in '{}'", line.trim()));
            return;
        };
        let mnemonic = if kind == LineKind::Input { "LDR" } else { "STR" };
        self.buf
            .add(&format!("{} {}", mnemonic, reg), INDENT, disabled);
        if kind == LineKind::Input {
            self.addr.invalidate(reg);
        }
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------

    fn alternative(
        &mut self,
        condition: &str,
        q_true: &[Element],
        q_false: &[Element],
        disabled: bool,
    ) {
        if self.reject_in_strict_mode(condition) {
            return;
        }
        let start = self.buf.len();
        let counter = self.jumps.fresh_label();
        let fail = if q_false.is_empty() {
            format!("end_{}", counter)
        } else {
            format!("else_{}", counter)
        };
        let then_label = format!("then_{}", counter);
        let lowered = ConditionLowerer::new(&mut self.bank, self.dialect).lower(
            condition,
            LabelKeys {
                primary: &fail,
                secondary: &then_label,
            },
            true,
        );
        match lowered {
            Ok(lowered) => {
                for instr in &lowered.lines {
                    self.buf.add(instr, INDENT, disabled);
                }
                if lowered.used_secondary || !q_true.is_empty() {
                    self.buf
                        .add(&self.dialect.label_def(&then_label), "", disabled);
                }
            }
            // The branch condition is abandoned but the body still emitted.
            Err(error) => self.diagnose(format!("{} in '{}'", error, condition.trim())),
        }
        self.walk(q_true, disabled);
        if !q_false.is_empty() {
            if !q_true.is_empty() {
                self.buf.add(&format!("B end_{}", counter), INDENT, disabled);
            }
            self.buf.add(
                &self.dialect.label_def(&format!("else_{}", counter)),
                "",
                disabled,
            );
            self.walk(q_false, disabled);
        }
        self.buf.add(
            &self.dialect.label_def(&format!("end_{}", counter)),
            "",
            disabled,
        );
        peephole::unify_labels(&mut self.buf, start);
    }

    fn case(
        &mut self,
        element: &Element,
        discriminant: &str,
        branches: &[CaseBranch],
        default: Option<&[Element]>,
        disabled: bool,
    ) {
        let counter = self.jumps.construct_label(element.id, self.jump_table);
        for (index, branch) in branches.iter().enumerate() {
            let target = format!("case_{}_{}", counter, index);
            for selector in &branch.selectors {
                let condition = format!("{} == {}", discriminant, selector);
                let lowered = ConditionLowerer::new(&mut self.bank, self.dialect).lower(
                    &condition,
                    LabelKeys {
                        primary: &target,
                        secondary: &target,
                    },
                    false,
                );
                match lowered {
                    Ok(lowered) => {
                        for instr in &lowered.lines {
                            self.buf.add(instr, INDENT, disabled);
                        }
                    }
                    Err(error) => {
                        self.diagnose(format!("{} in selector '{}'", error, selector))
                    }
                }
            }
        }
        let fallback = if default.is_some() {
            format!("default_{}", counter)
        } else {
            format!("end_{}", counter)
        };
        self.buf.add(&format!("B {}", fallback), INDENT, disabled);
        for (index, branch) in branches.iter().enumerate() {
            let label = format!("case_{}_{}", counter, index);
            self.buf.add(&self.dialect.label_def(&label), "", disabled);
            self.walk(&branch.body, disabled);
            self.buf.add(&format!("B end_{}", counter), INDENT, disabled);
        }
        if let Some(default) = default {
            self.buf.add(
                &self.dialect.label_def(&format!("default_{}", counter)),
                "",
                disabled,
            );
            self.walk(default, disabled);
        }
        self.buf.add(
            &self.dialect.label_def(&format!("end_{}", counter)),
            "",
            disabled,
        );
    }

    fn while_loop(&mut self, element: &Element, condition: &str, body: &[Element], disabled: bool) {
        if self.reject_in_strict_mode(condition) {
            return;
        }
        let counter = self.jumps.construct_label(element.id, self.jump_table);
        let end = format!("end_{}", counter);
        let body_label = format!("code_{}", counter);
        self.buf.add(
            &self.dialect.label_def(&format!("while_{}", counter)),
            "",
            disabled,
        );
        let lowered = ConditionLowerer::new(&mut self.bank, self.dialect).lower(
            condition,
            LabelKeys {
                primary: &end,
                secondary: &body_label,
            },
            true,
        );
        match lowered {
            Ok(lowered) => {
                for instr in &lowered.lines {
                    self.buf.add(instr, INDENT, disabled);
                }
                if lowered.used_secondary {
                    self.buf
                        .add(&self.dialect.label_def(&body_label), "", disabled);
                }
            }
            Err(error) => self.diagnose(format!("{} in '{}'", error, condition.trim())),
        }
        self.walk(body, disabled);
        self.buf
            .add(&format!("B while_{}", counter), INDENT, disabled);
        self.buf.add(&self.dialect.label_def(&end), "", disabled);
    }

    fn repeat(&mut self, element: &Element, body: &[Element], until: &str, disabled: bool) {
        if self.reject_in_strict_mode(until) {
            return;
        }
        let counter = self.jumps.construct_label(element.id, self.jump_table);
        let do_label = format!("do_{}", counter);
        let continue_label = format!("continue_{}", counter);
        self.buf
            .add(&self.dialect.label_def(&do_label), "", disabled);
        self.walk(body, disabled);
        // Branch back while the exit condition does not hold yet.
        let lowered = ConditionLowerer::new(&mut self.bank, self.dialect).lower(
            until,
            LabelKeys {
                primary: &do_label,
                secondary: &continue_label,
            },
            true,
        );
        match lowered {
            Ok(lowered) => {
                for instr in &lowered.lines {
                    self.buf.add(instr, INDENT, disabled);
                }
                if lowered.used_secondary {
                    self.buf
                        .add(&self.dialect.label_def(&continue_label), "", disabled);
                }
            }
            Err(error) => self.diagnose(format!("{} in '{}'", error, until.trim())),
        }
        if self.jump_table.resolve(element.id).is_some() {
            self.buf.add(
                &self.dialect.label_def(&format!("end_{}", counter)),
                "",
                disabled,
            );
        }
    }

    fn forever(&mut self, element: &Element, body: &[Element], disabled: bool) {
        let counter = self.jumps.construct_label(element.id, self.jump_table);
        self.buf.add(
            &self.dialect.label_def(&format!("whileTrue_{}", counter)),
            "",
            disabled,
        );
        self.walk(body, disabled);
        self.buf
            .add(&format!("B whileTrue_{}", counter), INDENT, disabled);
        if self.jump_table.resolve(element.id).is_some() {
            self.buf.add(
                &self.dialect.label_def(&format!("end_{}", counter)),
                "",
                disabled,
            );
        }
    }

    fn counting_for(
        &mut self,
        element: &Element,
        counter_var: &str,
        start: &str,
        end: &str,
        step: &str,
        body: &[Element],
        disabled: bool,
    ) {
        let first_line = self.buf.len();
        let counter = self.jumps.construct_label(element.id, self.jump_table);
        let Some(counter_reg) = self.value_register(counter_var) else {
            self.diagnose(format!("no free register for loop counter '{}'", counter_var));
            return;
        };

        let init = self.expr_lowerer().lower_move(counter_var, start.trim());
        match init {
            Ok(lines) => {
                for instr in lines {
                    self.buf.add(&instr, INDENT, disabled);
                }
            }
            Err(error) => {
                self.diagnose(format!("{} in loop start '{}'", error, start.trim()));
                return;
            }
        }

        // The end bound is evaluated every iteration; keep an unencodable
        // literal in a scratch register for the loop's whole extent.
        let mut head = Vec::new();
        let mut scratch = Vec::new();
        let imm = self.dialect.descriptor().imm_prefix;
        let bound = match Operand::parse(end.trim()) {
            Operand::Int(value) if value >= 0 && operand::is_encodable(value as u32) => {
                format!("{}{}", imm, value)
            }
            other => match self.operand_register_for(&other, &mut head, &mut scratch) {
                Some(reg) => reg.to_string(),
                None => {
                    self.diagnose(format!("no free register for loop bound '{}'", end.trim()));
                    return;
                }
            },
        };
        for instr in head {
            self.buf.add(&instr, INDENT, disabled);
        }

        let (step_op, step_text, downward) = self.step_operand(step);
        self.buf.add(
            &self.dialect.label_def(&format!("for_{}", counter)),
            "",
            disabled,
        );
        self.buf
            .add(&format!("CMP {}, {}", counter_reg, bound), INDENT, disabled);
        let exit_branch = if downward { "BLT" } else { "BGT" };
        self.buf
            .add(&format!("{} end_{}", exit_branch, counter), INDENT, disabled);

        self.walk(body, disabled);

        self.buf.add(
            &format!("{} {}, {}, {}", step_op, counter_reg, counter_reg, step_text),
            INDENT,
            disabled,
        );
        self.buf.add(&format!("B for_{}", counter), INDENT, disabled);
        self.buf.add(
            &self.dialect.label_def(&format!("end_{}", counter)),
            "",
            disabled,
        );
        for reg in scratch {
            self.bank.release(reg);
        }
        self.addr.invalidate(counter_reg);
        peephole::unify_labels(&mut self.buf, first_line);
    }

    fn step_operand(&self, step: &str) -> (&'static str, String, bool) {
        let imm = self.dialect.descriptor().imm_prefix;
        let step = step.trim();
        if let Some(rest) = step.strip_prefix('-') {
            ("SUB", format!("{}{}", imm, rest.trim()), true)
        } else if step.is_empty() {
            ("ADD", format!("{}1", imm), false)
        } else {
            match Operand::parse(step) {
                Operand::Reg(reg) => ("ADD", reg.to_string(), false),
                _ => ("ADD", format!("{}{}", imm, step), false),
            }
        }
    }

    fn operand_register_for(
        &mut self,
        operand: &Operand,
        lines: &mut Vec<String>,
        scratch: &mut Vec<Register>,
    ) -> Option<Register> {
        match operand {
            Operand::Reg(reg) => Some(*reg),
            Operand::Var(name) => self.bank.bind(name),
            Operand::Int(value) => {
                let reg = self.bank.acquire_temp()?;
                scratch.push(reg);
                lines.push(conditions::materialize_constant(reg, *value, self.dialect));
                Some(reg)
            }
            Operand::Char(c) => {
                let reg = self.bank.acquire_temp()?;
                scratch.push(reg);
                lines.push(conditions::materialize_constant(
                    reg,
                    *c as i64,
                    self.dialect,
                ));
                Some(reg)
            }
        }
    }

    fn traversing_for(
        &mut self,
        element: &Element,
        counter_var: &str,
        value_list: &[String],
        body: &[Element],
        disabled: bool,
    ) {
        let counter = self.jumps.construct_label(element.id, self.jump_table);
        let Some(counter_reg) = self.value_register(counter_var) else {
            self.diagnose(format!("no free register for loop counter '{}'", counter_var));
            return;
        };
        let (Some(base), Some(index)) = (self.bank.acquire_temp(), self.bank.acquire_temp())
        else {
            self.diagnose("no free register for list traversal".to_string());
            return;
        };
        let label = format!("v_{}", self.data_counter);
        self.data_counter += 1;
        self.buf.insert_top(format!(
            "{}\t{}\t{}",
            self.dialect.label_def(&label),
            self.dialect.data_directive(ElemType::Word),
            value_list.iter().join(", ")
        ));
        let imm = self.dialect.descriptor().imm_prefix;
        let load = self.dialect.address_load(base, &label);
        self.buf.add(&load, INDENT, disabled);
        self.addr.note_loaded(base);
        self.buf
            .add(&format!("MOV {}, {}0", index, imm), INDENT, disabled);
        self.buf.add(
            &self.dialect.label_def(&format!("for_{}", counter)),
            "",
            disabled,
        );
        self.buf.add(
            &format!("CMP {}, {}{}", index, imm, value_list.len()),
            INDENT,
            disabled,
        );
        self.buf
            .add(&format!("BGE end_{}", counter), INDENT, disabled);
        self.buf.add(
            &format!("LDR {}, [{}, {}, LSL {}2]", counter_reg, base, index, imm),
            INDENT,
            disabled,
        );
        self.addr.invalidate(counter_reg);

        self.walk(body, disabled);

        self.buf.add(
            &format!("ADD {}, {}, {}1", index, index, imm),
            INDENT,
            disabled,
        );
        self.buf.add(&format!("B for_{}", counter), INDENT, disabled);
        self.buf.add(
            &self.dialect.label_def(&format!("end_{}", counter)),
            "",
            disabled,
        );
        self.addr.invalidate(base);
        self.bank.release(base);
        self.bank.release(index);
    }

    fn reject_in_strict_mode(&mut self, condition: &str) -> bool {
        if self.options.strict_syntax && !conditions::matches_restricted_syntax(condition) {
            self.diagnose(format!("wrong condition syntax '{}'", condition.trim()));
            return true;
        }
        false
    }

    // ------------------------------------------------------------------
    // Calls and jumps
    // ------------------------------------------------------------------

    fn call(&mut self, text: &str, disabled: bool) {
        let (dest, call_text) = match classify::split_assign(text) {
            Some((dest, rhs)) => (Some(dest.trim().to_string()), rhs.trim().to_string()),
            None => (None, text.trim().to_string()),
        };
        let Some((name, args)) = parse_call(&call_text) else {
            self.diagnose(format!("cannot translate call '{}'", text.trim()));
            return;
        };
        match self.resolver.resolve(&name, args.len()) {
            Some(signature) => {
                debug!("{} call to '{}' resolved", LOG_AREA, signature.name);
                match self.convention_call(dest.as_deref(), &name, &args) {
                    Ok(lines) => {
                        for instr in lines {
                            self.buf.add(&instr, INDENT, disabled);
                        }
                    }
                    Err(message) => self.diagnose(format!("{} in call '{}'", message, text.trim())),
                }
            }
            None => {
                // Unknown callee: conservatively save and restore every
                // live register around the branch.
                let used = self
                    .bank
                    .in_use()
                    .iter()
                    .map(Register::to_string)
                    .chain(std::iter::once("LR".to_string()))
                    .join(", ");
                self.buf
                    .add(&format!("STMFD SP!, {{{}}}", used), INDENT, disabled);
                self.buf.add(&format!("BL {}", name), INDENT, disabled);
                self.buf
                    .add(&format!("LDMFD SP!, {{{}}}", used), INDENT, disabled);
            }
        }
    }

    /// Stack-based convention for a resolved callee: link register, actual
    /// arguments in declaration order, a zeroed result slot, branch-and-link,
    /// result pop, frame deallocation.
    fn convention_call(
        &mut self,
        dest: Option<&str>,
        name: &str,
        args: &[String],
    ) -> std::result::Result<Vec<String>, String> {
        let imm = self.dialect.descriptor().imm_prefix;
        let mut lines = vec!["STMFD SP!, {LR}".to_string()];
        for arg in args {
            let mut scratch = Vec::new();
            let reg = self
                .operand_register_for(&Operand::parse(arg), &mut lines, &mut scratch)
                .ok_or_else(|| format!("no free register for argument '{}'", arg))?;
            lines.push(format!("STMFD SP!, {{{}}}", reg));
            for reg in scratch {
                self.bank.release(reg);
            }
        }
        let slot = self
            .bank
            .acquire_temp()
            .ok_or_else(|| "no free register for result slot".to_string())?;
        lines.push(format!("MOV {}, {}0", slot, imm));
        lines.push(format!("STMFD SP!, {{{}}}", slot));
        self.bank.release(slot);
        lines.push(format!("BL {}", name));
        if let Some(dest) = dest {
            let dest_reg = self
                .value_register(dest)
                .ok_or_else(|| format!("no free register for result '{}'", dest))?;
            lines.push(format!("LDR {}, [SP]", dest_reg));
            self.addr.invalidate(dest_reg);
        }
        lines.push(format!("ADD SP, SP, {}{}", imm, 4 * (args.len() + 1)));
        lines.push("LDMFD SP!, {LR}".to_string());
        Ok(lines)
    }

    fn jump(
        &mut self,
        element: &Element,
        kind: JumpKind,
        argument: Option<&str>,
        disabled: bool,
    ) {
        match kind {
            JumpKind::Leave => match self.jumps.leave_target(element.id, self.jump_table) {
                Some(target) => self.buf.add(&format!("B {}", target), INDENT, disabled),
                None => {
                    self.buf
                        .add(&format!("B {}", ERROR_MARKER_LABEL), INDENT, disabled);
                    self.diagnose(
                        "leave exceeds the nesting depth of enclosing loops".to_string(),
                    );
                }
            },
            JumpKind::Return => {
                if let Some(argument) = argument {
                    let result = self.expr_lowerer().lower_move("R0", argument.trim());
                    self.emit_lowered(result, argument, disabled);
                }
                self.buf.add("MOV PC, LR", INDENT, disabled);
            }
            JumpKind::Exit => {
                if let Some(argument) = argument {
                    let result = self.expr_lowerer().lower_move("R0", argument.trim());
                    self.emit_lowered(result, argument, disabled);
                }
                self.buf.add("SWI 0x11", INDENT, disabled);
            }
            JumpKind::Throw | JumpKind::Plain => {
                self.diagnose(format!("{:?} jumps are not supported", kind));
            }
        }
    }

    fn diagnose(&mut self, message: String) {
        debug!("{} {}", LOG_AREA, message);
        self.buf.add_comment(&format!("FIXME: {}", message), INDENT);
        self.diagnostics.push(Diagnostic::warning(message));
    }
}

fn parse_call(text: &str) -> Option<(String, Vec<String>)> {
    let open = text.find('(')?;
    let close = text.rfind(')')?;
    if close < open {
        return None;
    }
    let name = text[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let inner = text[open + 1..close].trim();
    let args = if inner.is_empty() {
        Vec::new()
    } else {
        inner.split(',').map(|a| a.trim().to_string()).collect()
    };
    Some((name.to_string(), args))
}
