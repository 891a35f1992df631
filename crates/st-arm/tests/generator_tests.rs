use pretty_assertions::assert_eq;
use st_arm::{ArmGenerator, ArmOptions, Dialect, GeneratedUnit};
use st_core::ast::{CaseBranch, Element, ElementKind, ForStyle, JumpKind, Routine};
use st_core::jump::JumpTable;
use st_core::symbols::{NoCallResolver, RoutineSignature};

fn generate(routine: &Routine) -> GeneratedUnit {
    generate_with(routine, ArmOptions::default(), &JumpTable::new())
}

fn generate_with(routine: &Routine, options: ArmOptions, table: &JumpTable) -> GeneratedUnit {
    ArmGenerator::new(options, table, &NoCallResolver)
        .generate(routine)
        .unwrap()
}

fn while_loop(condition: &str, body: Vec<Element>) -> Element {
    Element::new(ElementKind::While {
        condition: condition.to_string(),
        body,
    })
}

#[test]
fn while_loop_compares_and_branches_out_on_false() {
    let routine = Routine::new(
        "main",
        vec![while_loop("x < 10", vec![Element::instruction(vec!["x <- x + 1"])])],
    );
    let unit = generate(&routine);
    let expected = [
        ".data",
        ".text",
        "",
        "main:",
        "\t\t// while x < 10",
        "while_0:",
        "\t\tCMP R0, #10",
        "\t\tBGE end_0",
        "\t\tADD R0, R0, #1",
        "\t\tB while_0",
        "end_0:",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
    assert!(unit.diagnostics.is_empty());
}

#[test]
fn alternative_with_else_branch() {
    let routine = Routine::new(
        "main",
        vec![Element::new(ElementKind::Alternative {
            condition: "a == b".to_string(),
            q_true: vec![Element::instruction(vec!["y <- 1"])],
            q_false: vec![Element::instruction(vec!["y <- 2"])],
        })],
    );
    let unit = generate(&routine);
    let expected = [
        ".data",
        ".text",
        "",
        "main:",
        "\t\t// if a == b",
        "\t\tCMP R0, R1",
        "\t\tBNE else_0",
        "then_0:",
        "\t\tMOV R2, #1",
        "\t\tB end_0",
        "else_0:",
        "\t\tMOV R2, #2",
        "end_0:",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
}

#[test]
fn nested_alternatives_share_their_end_label() {
    // The inner end label collapses into the outer one.
    let inner = Element::new(ElementKind::Alternative {
        condition: "b == 1".to_string(),
        q_true: vec![Element::instruction(vec!["y <- 1"])],
        q_false: vec![],
    });
    let routine = Routine::new(
        "main",
        vec![Element::new(ElementKind::Alternative {
            condition: "a == 1".to_string(),
            q_true: vec![inner],
            q_false: vec![],
        })],
    );
    let unit = generate(&routine);
    let expected = [
        ".data",
        ".text",
        "",
        "main:",
        "\t\t// if a == 1",
        "\t\tCMP R0, #1",
        "\t\tBNE end_0",
        "then_0:",
        "\t\t// if b == 1",
        "\t\tCMP R1, #1",
        "\t\tBNE end_0",
        "then_1:",
        "\t\tMOV R2, #1",
        "end_0:",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
}

#[test]
fn array_declaration_lands_in_the_data_section_and_reads_scale_the_index() {
    let routine = Routine::new(
        "main",
        vec![Element::instruction(vec![
            "word arr <- {1, 2, 3}",
            "y <- arr[2]",
            "z <- arr[0]",
        ])],
    );
    let unit = generate(&routine);
    let expected = [
        ".data",
        "arr:\t.word\t1, 2, 3",
        ".text",
        "",
        "main:",
        "\t\tADR R1, arr",
        "\t\tLDR R0, [R1, #8]",
        "\t\tLDR R2, [R1, #0]",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    // The address is loaded once; the second read reuses the register.
    assert_eq!(unit.text, expected);
}

#[test]
fn string_initializer_becomes_a_terminated_char_array() {
    let routine = Routine::new(
        "main",
        vec![Element::instruction(vec!["R3 <- \"hi\""])],
    );
    let unit = generate(&routine);
    let expected = [
        ".data",
        "v_0:\t.word\t'h', 'i', 0",
        ".text",
        "",
        "main:",
        "\t\tADR R3, v_0",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
}

#[test]
fn align_option_prefixes_array_data() {
    let options = ArmOptions {
        align_arrays: true,
        ..ArmOptions::default()
    };
    let routine = Routine::new(
        "main",
        vec![Element::instruction(vec!["byte flags <- {1, 0, 1}"])],
    );
    let unit = generate_with(&routine, options, &JumpTable::new());
    assert!(unit.text.contains("\t.align 2\nflags:\t.byte\t1, 0, 1"));
}

#[test]
fn counting_for_loop_with_inclusive_bound() {
    let routine = Routine::new(
        "main",
        vec![Element::new(ElementKind::For {
            counter: "i".to_string(),
            style: ForStyle::Counting {
                start: "0".to_string(),
                end: "5".to_string(),
                step: "1".to_string(),
            },
            body: vec![Element::instruction(vec!["sum <- sum + i"])],
        })],
    );
    let unit = generate(&routine);
    let expected = [
        ".data",
        ".text",
        "",
        "main:",
        "\t\t// for i <- 0 to 5 by 1",
        "\t\tMOV R0, #0",
        "for_0:",
        "\t\tCMP R0, #5",
        "\t\tBGT end_0",
        "\t\tADD R1, R1, R0",
        "\t\tADD R0, R0, #1",
        "\t\tB for_0",
        "end_0:",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
}

#[test]
fn downward_counting_loop_subtracts_and_exits_below_the_bound() {
    let routine = Routine::new(
        "main",
        vec![Element::new(ElementKind::For {
            counter: "i".to_string(),
            style: ForStyle::Counting {
                start: "10".to_string(),
                end: "1".to_string(),
                step: "-2".to_string(),
            },
            body: vec![],
        })],
    );
    let unit = generate(&routine);
    assert!(unit.text.contains("BLT end_0"));
    assert!(unit.text.contains("SUB R0, R0, #2"));
}

#[test]
fn traversing_for_materializes_the_list_and_walks_it_by_index() {
    let routine = Routine::new(
        "main",
        vec![Element::new(ElementKind::For {
            counter: "v".to_string(),
            style: ForStyle::Traversing {
                value_list: vec!["4".to_string(), "5".to_string(), "6".to_string()],
            },
            body: vec![],
        })],
    );
    let unit = generate(&routine);
    let expected = [
        ".data",
        "v_0:\t.word\t4, 5, 6",
        ".text",
        "",
        "main:",
        "\t\t// foreach v in [4, 5, 6]",
        "\t\tADR R1, v_0",
        "\t\tMOV R2, #0",
        "for_0:",
        "\t\tCMP R2, #3",
        "\t\tBGE end_0",
        "\t\tLDR R0, [R1, R2, LSL #2]",
        "\t\tADD R2, R2, #1",
        "\t\tB for_0",
        "end_0:",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
}

#[test]
fn repeat_loops_back_while_the_exit_condition_is_false() {
    let routine = Routine::new(
        "main",
        vec![Element::new(ElementKind::Repeat {
            body: vec![Element::instruction(vec!["x <- x + 1"])],
            until: "x == 10".to_string(),
        })],
    );
    let unit = generate(&routine);
    let expected = [
        ".data",
        ".text",
        "",
        "main:",
        "\t\t// repeat until x == 10",
        "do_0:",
        "\t\tADD R0, R0, #1",
        "\t\tCMP R0, #10",
        "\t\tBNE do_0",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
}

#[test]
fn case_dispatch_with_shared_selectors_and_default() {
    let routine = Routine::new(
        "main",
        vec![Element::new(ElementKind::Case {
            discriminant: "x".to_string(),
            branches: vec![
                CaseBranch {
                    selectors: vec!["1".to_string(), "2".to_string()],
                    body: vec![Element::instruction(vec!["y <- 1"])],
                },
                CaseBranch {
                    selectors: vec!["3".to_string()],
                    body: vec![Element::instruction(vec!["y <- 2"])],
                },
            ],
            default: Some(vec![Element::instruction(vec!["y <- 3"])]),
        })],
    );
    let unit = generate(&routine);
    let expected = [
        ".data",
        ".text",
        "",
        "main:",
        "\t\t// case x",
        "\t\tCMP R0, #1",
        "\t\tBEQ case_0_0",
        "\t\tCMP R0, #2",
        "\t\tBEQ case_0_0",
        "\t\tCMP R0, #3",
        "\t\tBEQ case_0_1",
        "\t\tB default_0",
        "case_0_0:",
        "\t\tMOV R1, #1",
        "\t\tB end_0",
        "case_0_1:",
        "\t\tMOV R1, #2",
        "\t\tB end_0",
        "default_0:",
        "\t\tMOV R1, #3",
        "end_0:",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
}

#[test]
fn leave_inside_forever_branches_to_the_shared_end_label() {
    let mut table = JumpTable::new();
    let leave = Element::jump(JumpKind::Leave, None).with_id(9);
    let forever = Element::new(ElementKind::Forever {
        body: vec![Element::instruction(vec!["x <- 1"]), leave],
    })
    .with_id(7);
    table.insert(forever.id, 0);
    table.insert(st_core::ast::ElementId(9), 0);
    let routine = Routine::new("main", vec![forever]);
    let unit = generate_with(&routine, ArmOptions::default(), &table);
    let expected = [
        ".data",
        ".text",
        "",
        "main:",
        "\t\t// forever",
        "whileTrue_0:",
        "\t\tMOV R0, #1",
        "\t\tB end_0",
        "\t\tB whileTrue_0",
        "end_0:",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
    assert!(unit.diagnostics.is_empty());
}

#[test]
fn illegal_leave_targets_the_error_marker() {
    let mut table = JumpTable::new();
    let leave = Element::jump(JumpKind::Leave, None).with_id(4);
    table.insert(st_core::ast::ElementId(4), st_core::jump::ILLEGAL_JUMP);
    let routine = Routine::new("main", vec![leave]);
    let unit = generate_with(&routine, ArmOptions::default(), &table);
    assert!(unit.text.contains("B leave_error"));
    assert!(unit.text.contains("leave_error:"));
    assert_eq!(unit.diagnostics.len(), 1);
}

#[test]
fn resolved_call_marshals_arguments_and_result_over_the_stack() {
    let resolver = vec![RoutineSignature::new("foo", vec!["a"]).with_result()];
    let routine = Routine::new("main", vec![Element::call("y <- foo(3)")]);
    let unit = ArmGenerator::new(ArmOptions::default(), &JumpTable::new(), &resolver)
        .generate(&routine)
        .unwrap();
    let expected = [
        ".data",
        ".text",
        "",
        "main:",
        "\t\t// y <- foo(3)",
        "\t\tSTMFD SP!, {LR}",
        "\t\tMOV R0, #3",
        "\t\tSTMFD SP!, {R0}",
        "\t\tMOV R0, #0",
        "\t\tSTMFD SP!, {R0}",
        "\t\tBL foo",
        "\t\tLDR R0, [SP]",
        "\t\tADD SP, SP, #8",
        "\t\tLDMFD SP!, {LR}",
        "\t\tMOV PC, LR",
    ]
    .join("\n");
    assert_eq!(unit.text, expected);
}

#[test]
fn unresolved_call_saves_every_live_register() {
    let routine = Routine::new(
        "main",
        vec![
            Element::instruction(vec!["x <- 1"]),
            Element::call("helper(x)"),
        ],
    );
    let unit = generate(&routine);
    assert!(unit.text.contains("STMFD SP!, {R0, LR}"));
    assert!(unit.text.contains("BL helper"));
    assert!(unit.text.contains("LDMFD SP!, {R0, LR}"));
}

#[test]
fn register_exhaustion_degrades_to_a_diagnostic() {
    let lines: Vec<String> = (0..14).map(|i| format!("a{} <- 1", i)).collect();
    let routine = Routine::new("main", vec![Element::instruction(lines)]);
    let unit = generate(&routine);
    assert_eq!(unit.diagnostics.len(), 1);
    assert!(unit.text.contains("FIXME"));
    assert!(unit.text.contains("MOV R12, #1"));
    assert!(!unit.text.contains("a13") || unit.text.contains("FIXME"));
}

#[test]
fn mixed_boolean_chain_is_reported_but_the_loop_still_closes() {
    let routine = Routine::new(
        "main",
        vec![while_loop(
            "a == 1 && b == 2 || c == 3",
            vec![Element::instruction(vec!["x <- 1"])],
        )],
    );
    let unit = generate(&routine);
    assert_eq!(unit.diagnostics.len(), 1);
    assert!(unit.text.contains("while_0:"));
    assert!(unit.text.contains("end_0:"));
    assert!(unit.text.contains("MOV R0, #1"));
}

#[test]
fn strict_mode_rejects_free_form_conditions() {
    let options = ArmOptions {
        strict_syntax: true,
        ..ArmOptions::default()
    };
    let routine = Routine::new(
        "main",
        vec![while_loop("x + 1 == 3", vec![Element::instruction(vec!["x <- 1"])])],
    );
    let unit = generate_with(&routine, options, &JumpTable::new());
    assert_eq!(unit.diagnostics.len(), 1);
    assert!(!unit.text.contains("while_0:"));
}

#[test]
fn disabled_elements_are_emitted_as_comments() {
    let routine = Routine::new(
        "main",
        vec![Element::instruction(vec!["x <- 1"]).disabled()],
    );
    let unit = generate(&routine);
    assert!(unit.text.contains("\t\t// MOV R0, #1"));
}

#[test]
fn keil_dialect_switches_sections_labels_and_comments() {
    let options = ArmOptions {
        dialect: Dialect::Keil,
        ..ArmOptions::default()
    };
    let routine = Routine::new(
        "main",
        vec![while_loop("x < 10", vec![Element::instruction(vec!["x <- x + 1"])])],
    );
    let unit = generate_with(&routine, options, &JumpTable::new());
    assert!(unit.text.starts_with("AREA data, DATA, READWRITE\nAREA text, CODE, READONLY"));
    assert!(unit.text.contains("\nwhile_0\n"));
    assert!(unit.text.contains("; while x < 10"));
    assert!(!unit.text.contains("while_0:"));
}

#[test]
fn exit_jump_loads_the_code_and_issues_the_software_interrupt() {
    let routine = Routine::new(
        "main",
        vec![Element::jump(JumpKind::Exit, Some("0".to_string()))],
    );
    let unit = generate(&routine);
    assert!(unit.text.contains("MOV R0, #0\n\t\tSWI 0x11"));
}

#[test]
fn raw_mnemonic_lines_pass_through_unchanged() {
    let routine = Routine::new(
        "main",
        vec![Element::instruction(vec!["LDR R0, [R1]", "ADD R0, R0, #1"])],
    );
    let unit = generate(&routine);
    assert!(unit.text.contains("\t\tLDR R0, [R1]\n\t\tADD R0, R0, #1"));
    assert!(unit.diagnostics.is_empty());
}
