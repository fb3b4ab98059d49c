mod common;

use common::{compile_source, run, Machine};
use jlite::arm::{self, Reg};
use jlite::ast::{BinaryOp, UnaryOp};
use jlite::codegen::{generate, CodeGenerator, DataTable, Frame, MALLOC, PRINTF, READ_INT};
use jlite::descriptors::build_descriptors;
use jlite::emit::emit;
use jlite::ir3::{Instr, LabelId};
use jlite::ivec::IIndex;
use jlite::tables::{ClassTables, SymbolTable, SymbolTableBuilder, SymbolTables};
use jlite::ty::Type;
use rstest::rstest;

const CLASSES: &str = "class Main { Void main() { } } class Point { Int x; Int y; Point next; }";

fn classes() -> ClassTables {
    let program = common::parse(CLASSES);
    ClassTables::from_descriptors(&build_descriptors(&program).unwrap())
}

fn point() -> Type {
    Type::Reference("Point".to_string())
}

/// `Main_f(this, p, q)` with a handful of locals of every type.
fn table() -> SymbolTable {
    let mut builder = SymbolTableBuilder::new("Main_f");
    builder.add_param("this", Type::Reference("Main".to_string()));
    builder.add_param("p", Type::Int);
    builder.add_param("q", Type::Int);
    for name in ["x", "y", "z"] {
        builder.add_local(name, Type::Int);
    }
    builder.add_local("b", Type::Bool);
    builder.add_local("s", Type::String);
    builder.add_local("o", point());
    builder.add_local("v", Type::Void);
    builder.finalize()
}

fn lower(table: &SymbolTable, instr: &Instr) -> (Vec<arm::Instr>, DataTable) {
    let classes = classes();
    let mut generator = CodeGenerator::new(&classes);
    generator.lower_instruction(&Frame::new(table), instr);
    generator.finish()
}

/// Lowers `instr`, runs it with `inputs` preloaded, and returns the machine.
fn execute(table: &SymbolTable, instr: &Instr, inputs: &[(&str, i32)]) -> Machine {
    let (code, data) = lower(table, instr);
    let mut machine = Machine::with_data(&data);
    machine.enter_frame(table.frame_size());
    for (name, value) in inputs {
        machine.set_symbol(table, name, *value);
    }
    machine.execute(&code);
    machine
}

fn binary(op: BinaryOp, dest: &str, lhs: &str, rhs: &str) -> Instr {
    Instr::Binary {
        dest: dest.to_string(),
        op,
        lhs: lhs.to_string(),
        rhs: rhs.to_string(),
    }
}

#[rstest]
#[case(BinaryOp::Add, 7, 3, 10)]
#[case(BinaryOp::Sub, 7, 3, 4)]
#[case(BinaryOp::Mul, 7, -3, -21)]
#[case(BinaryOp::Div, 7, 2, 3)]
#[case(BinaryOp::Lt, 2, 3, 1)]
#[case(BinaryOp::Lt, 3, 3, 0)]
#[case(BinaryOp::Gt, 4, 3, 1)]
#[case(BinaryOp::Le, 3, 3, 1)]
#[case(BinaryOp::Ge, 2, 3, 0)]
#[case(BinaryOp::Eq, 5, 5, 1)]
#[case(BinaryOp::Ne, 5, 5, 0)]
#[case(BinaryOp::And, 1, 0, 0)]
#[case(BinaryOp::And, 1, 1, 1)]
#[case(BinaryOp::Or, 0, 1, 1)]
#[case(BinaryOp::Or, 0, 0, 0)]
fn binary_operations(#[case] op: BinaryOp, #[case] lhs: i32, #[case] rhs: i32, #[case] expected: i32) {
    let table = table();

    let machine = execute(&table, &binary(op, "z", "x", "y"), &[("x", lhs), ("y", rhs)]);
    assert_eq!(machine.symbol(&table, "z"), expected);

    // Parameters are read from registers and results written back to them.
    let machine = execute(&table, &binary(op, "q", "p", "x"), &[("p", lhs), ("x", rhs)]);
    assert_eq!(machine.reg(Reg::A3), expected);
}

#[rstest]
#[case(UnaryOp::Neg, 5, -5)]
#[case(UnaryOp::Neg, -8, 8)]
#[case(UnaryOp::Not, 1, 0)]
#[case(UnaryOp::Not, 0, 1)]
fn unary_operations(#[case] op: UnaryOp, #[case] operand: i32, #[case] expected: i32) {
    let table = table();
    let instr = Instr::Unary {
        dest: "z".to_string(),
        op,
        operand: "x".to_string(),
    };
    let machine = execute(&table, &instr, &[("x", operand)]);
    assert_eq!(machine.symbol(&table, "z"), expected);
}

#[test]
fn literals_and_copies() {
    let table = table();

    let int = Instr::Int {
        dest: "x".to_string(),
        value: -42,
    };
    assert_eq!(execute(&table, &int, &[]).symbol(&table, "x"), -42);

    let flag = Instr::Bool {
        dest: "b".to_string(),
        value: true,
    };
    assert_eq!(execute(&table, &flag, &[]).symbol(&table, "b"), 1);

    let copy = Instr::Assign {
        dest: "y".to_string(),
        src: "p".to_string(),
    };
    assert_eq!(execute(&table, &copy, &[("p", 9)]).symbol(&table, "y"), 9);

    let text = Instr::Str {
        dest: "s".to_string(),
        value: "hi\\n".to_string(),
    };
    let machine = execute(&table, &text, &[]);
    assert_eq!(machine.string_at(machine.symbol(&table, "s")), "hi\\n");
}

#[test]
fn fields_are_read_and_written_at_their_offsets() {
    let table = table();
    let object = 0x4000;

    let load = Instr::LoadField {
        dest: "z".to_string(),
        object: "o".to_string(),
        field: "y".to_string(),
    };
    let (code, data) = lower(&table, &load);
    let mut machine = Machine::with_data(&data);
    machine.enter_frame(table.frame_size());
    machine.set_symbol(&table, "o", object);
    machine.set_word(object + 4, 77);
    machine.execute(&code);
    assert_eq!(machine.symbol(&table, "z"), 77);

    let store = Instr::StoreField {
        object: "o".to_string(),
        field: "next".to_string(),
        value: "x".to_string(),
    };
    let machine = execute(&table, &store, &[("o", object), ("x", 5)]);
    assert_eq!(machine.word(object + 8), 5);
}

#[test]
fn new_allocates_the_instance_size() {
    let table = table();
    let instr = Instr::New {
        dest: "o".to_string(),
        class: "Point".to_string(),
    };
    let machine = execute(&table, &instr, &[]);

    assert_eq!(machine.calls.len(), 1);
    assert_eq!(machine.calls[0].0, MALLOC);
    assert_eq!(machine.calls[0].1[0], 12);
    assert_ne!(machine.symbol(&table, "o"), 0);
}

#[test]
fn calls_pass_arguments_and_preserve_the_callers_registers() {
    let table = table();
    let instr = Instr::Call {
        dest: "z".to_string(),
        function: READ_INT.to_string(),
        args: vec!["q".to_string(), "p".to_string(), "x".to_string()],
    };
    let (code, _) = lower(&table, &instr);

    let mut machine = Machine::with_data(&DataTable::new()).with_input(&["31"]);
    machine.enter_frame(table.frame_size());
    machine.set_symbol(&table, "this", 100);
    machine.set_symbol(&table, "p", 1);
    machine.set_symbol(&table, "q", 2);
    machine.set_symbol(&table, "x", 3);
    machine.execute(&code);

    // Arguments arrive in order, even when they were themselves arguments.
    assert_eq!(machine.calls[0].1[..3], [2, 1, 3]);
    assert_eq!(machine.symbol(&table, "z"), 31);
    assert_eq!(machine.reg(Reg::A1), 100);
    assert_eq!(machine.reg(Reg::A2), 1);
    assert_eq!(machine.reg(Reg::Sp), common::STACK_TOP - table.frame_size() as i32);
}

#[test]
fn void_results_are_not_stored() {
    let table = table();
    let instr = Instr::Call {
        dest: "v".to_string(),
        function: "Main_g".to_string(),
        args: vec!["this".to_string()],
    };
    let (code, _) = lower(&table, &instr);
    assert!(!code.iter().any(|i| matches!(i, arm::Instr::Store { .. })));
    assert!(code.contains(&arm::Instr::BranchLink("Main_g".to_string())));
}

#[test]
#[should_panic(expected = "too many arguments")]
fn five_arguments_cannot_be_passed() {
    let table = table();
    let instr = Instr::Call {
        dest: "z".to_string(),
        function: "Main_g".to_string(),
        args: ["this", "p", "q", "x", "y"].map(String::from).to_vec(),
    };
    lower(&table, &instr);
}

#[rstest]
#[case("x", 42, "42")]
#[case("b", 1, "true")]
#[case("b", 0, "false")]
fn print_formats_by_type(#[case] name: &str, #[case] value: i32, #[case] expected: &str) {
    let table = table();
    let instr = Instr::Print {
        value: name.to_string(),
    };
    let machine = execute(&table, &instr, &[(name, value)]);

    assert_eq!(machine.calls[0].0, PRINTF);
    assert_eq!(machine.output, vec![expected.to_string()]);
}

#[test]
fn conditional_goto_branches_on_non_zero() {
    let table = table();
    let instr = Instr::Goto {
        label: LabelId::from_index(0),
        cond: Some("b".to_string()),
    };
    let (mut code, _) = lower(&table, &instr);
    code.push(arm::Instr::LoadImm {
        dest: Reg::V4,
        value: 99,
    });
    code.push(arm::Instr::Label(".L0".to_string()));

    for (cond, skipped) in [(1, true), (0, false)] {
        let mut machine = Machine::new();
        machine.enter_frame(table.frame_size());
        machine.set_symbol(&table, "b", cond);
        machine.execute(&code);
        assert_eq!(machine.reg(Reg::V4) != 99, skipped);
    }
}

#[test]
fn return_moves_the_value_and_leaves_through_the_exit() {
    let table = table();
    let (code, _) = lower(&table, &Instr::Return(Some("x".to_string())));
    let Some(arm::Instr::Branch { cond: None, label }) = code.last() else {
        panic!("expected a branch to the exit");
    };
    assert_eq!(label, ".LMain_f_exit");
    assert!(matches!(code[0], arm::Instr::Load { dest: Reg::A1, base: Reg::Fp, .. }));
}

#[test]
fn large_frames_use_the_offset_register() {
    let mut builder = SymbolTableBuilder::new("Main_big");
    builder.add_param("this", Type::Reference("Main".to_string()));
    for i in 0..2000 {
        builder.add_local(format!("l{}", i), Type::Int);
    }
    let table = builder.finalize();

    let instr = Instr::Assign {
        dest: "l0".to_string(),
        src: "l1999".to_string(),
    };
    let (code, _) = lower(&table, &instr);
    assert!(code.iter().any(|i| matches!(
        i,
        arm::Instr::LoadImm { dest: Reg::V5, .. }
    )));

    let machine = execute(&table, &instr, &[("l1999", 6)]);
    assert_eq!(machine.symbol(&table, "l0"), 6);
}

#[test]
fn function_frame_is_reserved_and_released() {
    let mut builder = SymbolTableBuilder::new("Main_main");
    builder.add_param("this", Type::Reference("Main".to_string()));
    builder.add_local("x", Type::Int);
    let mut tables = SymbolTables::new();
    tables.insert(builder.finalize());

    let code = [
        Instr::FunctionStart {
            class: "Main".to_string(),
            return_ty: Type::Void,
            name: "Main_main".to_string(),
            params: vec![("this".to_string(), Type::Reference("Main".to_string()))],
        },
        Instr::FunctionEnd,
    ];
    let (arm_code, _) = generate(&code, &tables, &classes());
    let text: Vec<_> = arm_code.iter().map(|i| i.to_string()).collect();

    assert_eq!(
        text,
        [
            "Main_main:",
            "stmfd sp!, {v1, v2, v3, v4, v5, fp, lr}",
            "mov fp, sp",
            "ldr v5, =4",
            "sub sp, sp, v5",
            ".LMain_main_exit:",
            "ldr v5, =4",
            "add sp, sp, v5",
            "ldmfd sp!, {v1, v2, v3, v4, v5, fp, pc}",
        ]
    );
}

#[test]
#[should_panic(expected = "outside of a function")]
fn instructions_need_an_active_frame() {
    generate(
        &[Instr::Return(None)],
        &SymbolTables::new(),
        &ClassTables::default(),
    );
}

#[test]
fn programs_run_end_to_end() {
    let compilation = compile_source(
        r#"
        class Main {
            Void main() {
                Fib f;
                Int i;
                f = new Fib();
                i = 0;
                while (i < 6) {
                    println(f.at(i));
                    i = i + 1;
                }
                println(f.describe(true));
            }
        }

        class Fib {
            Int at(Int n) {
                if (n < 2) {
                    return n;
                } else {
                    return this.at(n - 1) + this.at(n - 2);
                }
            }

            String describe(Bool loud) {
                if (loud) {
                    return "FIB";
                } else {
                    return "fib";
                }
            }
        }
        "#,
    );

    let machine = run(&compilation, &[]);
    assert_eq!(machine.output, ["0", "1", "1", "2", "3", "5", "FIB"]);
}

#[test]
fn strings_are_interned_once() {
    let compilation = compile_source(
        r#"class Main { Void main() { println("a"); println("a"); println("b"); println(1); } }"#,
    );
    let texts: Vec<_> = compilation.data.iter().map(|(_, text)| text).collect();
    assert_eq!(texts, ["a", "%s\\n", "b", "%d\\n"]);
    assert_eq!(compilation.data.label_of("a"), Some(".LC0"));
}

#[test]
fn emitted_unit_has_data_entry_and_functions() {
    let compilation =
        compile_source(r#"class Main { Void main() { println("hi"); } Int f() { return 1; } }"#);
    let assembly = emit(&compilation);

    assert!(assembly.starts_with("    .data\n"));
    assert!(assembly.contains(".LC0:\n    .asciz \"hi\"\n"));
    assert!(assembly.contains("    .global main\n"));
    assert!(assembly.contains("main:\n    stmfd sp!, {v1, v2, v3, v4, v5, fp, lr}\n    ldr a1, =0\n    bl Main_main\n.Lhalt:\n"));
    assert!(assembly.contains("\nMain_main:\n"));
    assert!(assembly.contains("\n.LMain_f_exit:\n"));
    assert!(assembly.contains("    bl printf\n"));
}

#[test]
fn exit_labels_never_collide_with_function_names() {
    let compilation = compile_source(
        "class Main { Void main() { println(this.f()); println(this.f_exit()); } \
         Int f() { return 1; } Int f_exit() { return 2; } }",
    );

    let mut labels = std::collections::HashSet::new();
    for instr in &compilation.code {
        if let arm::Instr::Label(label) = instr {
            assert!(labels.insert(label.clone()), "label {} defined twice", label);
        }
    }
    assert!(labels.contains("Main_f_exit"));
    assert!(labels.contains(".LMain_f_exit"));

    let machine = run(&compilation, &[]);
    assert_eq!(machine.output, ["1", "2"]);
}

#[test]
fn callers_scratch_registers_survive_a_call() {
    let compilation = compile_source(
        "class Main { Void main() { } Int f() { Int x; x = 7 * 6; return x; } }",
    );
    let mut code = vec![
        arm::Instr::LoadImm {
            dest: Reg::V4,
            value: 11,
        },
        arm::Instr::LoadImm {
            dest: Reg::V5,
            value: 12,
        },
        arm::Instr::BranchLink("Main_f".to_string()),
        arm::Instr::Branch {
            cond: None,
            label: "done".to_string(),
        },
    ];
    code.extend(compilation.code.iter().cloned());
    code.push(arm::Instr::Label("done".to_string()));

    let mut machine = Machine::with_data(&compilation.data);
    machine.execute(&code);
    assert_eq!(machine.reg(Reg::A1), 42);
    assert_eq!(machine.reg(Reg::V4), 11);
    assert_eq!(machine.reg(Reg::V5), 12);
    assert_eq!(machine.reg(Reg::Sp), common::STACK_TOP);
}
