//! Lowering of IR3 to target instructions.
//!
//! Every IR3 operation becomes a short fixed sequence that stages operands in
//! the scratch registers `v1`-`v4`. Parameters live in `a1`-`a4`; locals and
//! temporaries live in the frame below `fp`.

use crate::arm::{
    self, ArithOp, Cond, Operand, Reg, ARGUMENT_REGISTERS, OFFSET_REGISTER, RETURN_REGISTER,
    SCRATCH_REGISTERS,
};
use crate::ast::{BinaryOp, UnaryOp};
use crate::ir3::{self, LabelId};
use crate::ivec::IIndex;
use crate::tables::{ClassTables, Entry, Storage, SymbolTable, SymbolTables};
use crate::ty::Type;
use indexmap::IndexMap;
use std::fmt;

pub const MALLOC: &str = "malloc";
pub const PRINTF: &str = "printf";
pub const READ_INT: &str = "readln_int";
pub const READ_BOOL: &str = "readln_bool";
pub const READ_STRING: &str = "readln_string";

const INT_FORMAT: &str = "%d\\n";
const STRING_FORMAT: &str = "%s\\n";
const TRUE_TEXT: &str = "true";
const FALSE_TEXT: &str = "false";

/// Largest offset encodable directly in a load or store.
const MAX_IMMEDIATE_OFFSET: i32 = 4095;

pub fn label_name(label: LabelId) -> String {
    format!(".L{}", label.index())
}

/// Local label, so it can never collide with a function's own name.
pub fn exit_label(function: &str) -> String {
    format!(".L{}_exit", function)
}

/// Interned string literals, in order of first use.
#[derive(Debug, Clone, Default)]
pub struct DataTable {
    labels: IndexMap<String, String>,
}

impl DataTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the label of `text`, adding it on first use. The text is kept
    /// as written in source, escapes included.
    pub fn intern(&mut self, text: &str) -> String {
        if let Some(label) = self.labels.get(text) {
            return label.clone();
        }
        let label = format!(".LC{}", self.labels.len());
        self.labels.insert(text.to_string(), label.clone());
        label
    }

    pub fn label_of(&self, text: &str) -> Option<&str> {
        self.labels.get(text).map(String::as_str)
    }

    /// `(label, text)` pairs in order of first use.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.labels
            .iter()
            .map(|(text, label)| (label.as_str(), text.as_str()))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl fmt::Display for DataTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (label, text) in self.iter() {
            writeln!(f, "{}: \"{}\"", label, text)?;
        }
        Ok(())
    }
}

/// The closed symbol table of the function being lowered.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'t> {
    table: &'t SymbolTable,
}

impl<'t> Frame<'t> {
    pub fn new(table: &'t SymbolTable) -> Self {
        Self { table }
    }

    pub fn function(&self) -> &'t str {
        self.table.function()
    }

    pub fn size(&self) -> u32 {
        self.table.frame_size()
    }

    pub fn entry(&self, name: &str) -> &'t Entry {
        self.table.entry(name)
    }

    pub fn ty(&self, name: &str) -> &'t Type {
        &self.entry(name).ty
    }

    /// Offset of a stack slot from `fp`.
    fn fp_offset(&self, offset: u32) -> i32 {
        offset as i32 - self.size() as i32
    }
}

/// A value passed to a called function.
enum Arg<'a> {
    Symbol(&'a str),
    Imm(i32),
    Label(String),
    /// Address of `"true"` or `"false"` depending on a Bool symbol.
    BoolText(&'a str),
}

pub struct CodeGenerator<'c> {
    classes: &'c ClassTables,
    data: DataTable,
    code: Vec<arm::Instr>,
}

impl<'c> CodeGenerator<'c> {
    pub fn new(classes: &'c ClassTables) -> Self {
        Self {
            classes,
            data: DataTable::new(),
            code: Vec::new(),
        }
    }

    pub fn finish(self) -> (Vec<arm::Instr>, DataTable) {
        (self.code, self.data)
    }

    fn emit(&mut self, instr: arm::Instr) {
        self.code.push(instr);
    }

    /// `base + offset` as an addressing operand, staging large offsets in
    /// the offset register.
    fn offset(&mut self, offset: i32) -> Operand {
        if offset.abs() <= MAX_IMMEDIATE_OFFSET {
            Operand::Imm(offset)
        } else {
            self.emit(arm::Instr::LoadImm {
                dest: OFFSET_REGISTER,
                value: offset,
            });
            Operand::Reg(OFFSET_REGISTER)
        }
    }

    fn load(&mut self, frame: &Frame, dest: Reg, name: &str) {
        match frame.entry(name).storage {
            Storage::Register(src) => self.emit(arm::Instr::Mov { dest, src }),
            Storage::Stack(offset) => {
                let offset = self.offset(frame.fp_offset(offset));
                self.emit(arm::Instr::Load {
                    dest,
                    base: Reg::Fp,
                    offset,
                });
            }
        }
    }

    fn store(&mut self, frame: &Frame, src: Reg, name: &str) {
        match frame.entry(name).storage {
            Storage::Register(dest) => self.emit(arm::Instr::Mov { dest, src }),
            Storage::Stack(offset) => {
                let offset = self.offset(frame.fp_offset(offset));
                self.emit(arm::Instr::Store {
                    src,
                    base: Reg::Fp,
                    offset,
                });
            }
        }
    }

    fn load_arg(&mut self, frame: &Frame, dest: Reg, arg: &Arg) {
        match arg {
            Arg::Symbol(name) => self.load(frame, dest, name),
            Arg::Imm(value) => self.emit(arm::Instr::LoadImm {
                dest,
                value: *value,
            }),
            Arg::Label(label) => self.emit(arm::Instr::LoadLabel {
                cond: None,
                dest,
                label: label.clone(),
            }),
            Arg::BoolText(name) => {
                let true_label = self.data.intern(TRUE_TEXT);
                let false_label = self.data.intern(FALSE_TEXT);
                self.load(frame, dest, name);
                self.emit(arm::Instr::Cmp {
                    lhs: dest,
                    rhs: Operand::Imm(0),
                });
                self.emit(arm::Instr::LoadLabel {
                    cond: Some(Cond::Ne),
                    dest,
                    label: true_label,
                });
                self.emit(arm::Instr::LoadLabel {
                    cond: Some(Cond::Eq),
                    dest,
                    label: false_label,
                });
            }
        }
    }

    /// Calls `function` with `args` in the argument registers, preserving
    /// the caller's own arguments, and stores the result into `dest` unless
    /// it is Void.
    fn call(&mut self, frame: &Frame, function: &str, args: &[Arg], dest: Option<&str>) {
        if args.len() > ARGUMENT_REGISTERS.len() {
            panic!(
                "too many arguments: `{}` called with {}, at most {} are supported",
                function,
                args.len(),
                ARGUMENT_REGISTERS.len()
            );
        }

        self.emit(arm::Instr::Push(ARGUMENT_REGISTERS.to_vec()));
        for (arg, scratch) in args.iter().zip(SCRATCH_REGISTERS) {
            self.load_arg(frame, scratch, arg);
        }
        for (scratch, reg) in SCRATCH_REGISTERS.into_iter().zip(ARGUMENT_REGISTERS).take(args.len()) {
            self.emit(arm::Instr::Mov {
                dest: reg,
                src: scratch,
            });
        }
        self.emit(arm::Instr::BranchLink(function.to_string()));
        self.emit(arm::Instr::Mov {
            dest: Reg::V1,
            src: RETURN_REGISTER,
        });
        self.emit(arm::Instr::Pop(ARGUMENT_REGISTERS.to_vec()));

        if let Some(dest) = dest {
            if *frame.ty(dest) != Type::Void {
                self.store(frame, Reg::V1, dest);
            }
        }
    }

    fn field_offset(&self, frame: &Frame, object: &str, field: &str) -> i32 {
        let Some(class) = frame.ty(object).class_name() else {
            panic!("`{}` in `{}` is not an object", object, frame.function());
        };
        self.classes.get(class).field(field).offset as i32
    }

    /// Appends the target code of one IR3 instruction, resolving its
    /// operands through `frame`.
    pub fn lower_instruction(&mut self, frame: &Frame, instr: &ir3::Instr) {
        match instr {
            ir3::Instr::Label(label) => self.emit(arm::Instr::Label(label_name(*label))),
            ir3::Instr::Goto { label, cond: None } => self.emit(arm::Instr::Branch {
                cond: None,
                label: label_name(*label),
            }),
            ir3::Instr::Goto {
                label,
                cond: Some(cond),
            } => {
                self.load(frame, Reg::V1, cond);
                self.emit(arm::Instr::Cmp {
                    lhs: Reg::V1,
                    rhs: Operand::Imm(0),
                });
                self.emit(arm::Instr::Branch {
                    cond: Some(Cond::Ne),
                    label: label_name(*label),
                });
            }
            ir3::Instr::FunctionStart { name, .. } => {
                if name != frame.function() {
                    panic!("frame of `{}` used to lower `{}`", frame.function(), name);
                }
                self.emit(arm::Instr::Label(name.clone()));
                self.emit(arm::Instr::Push(arm::frame_registers(Reg::Lr)));
                self.emit(arm::Instr::Mov {
                    dest: Reg::Fp,
                    src: Reg::Sp,
                });
                self.emit(arm::Instr::LoadImm {
                    dest: OFFSET_REGISTER,
                    value: frame.size() as i32,
                });
                self.emit(arm::Instr::Arith {
                    op: ArithOp::Sub,
                    cond: None,
                    dest: Reg::Sp,
                    lhs: Reg::Sp,
                    rhs: Operand::Reg(OFFSET_REGISTER),
                });
            }
            ir3::Instr::FunctionEnd => {
                self.emit(arm::Instr::Label(exit_label(frame.function())));
                self.emit(arm::Instr::LoadImm {
                    dest: OFFSET_REGISTER,
                    value: frame.size() as i32,
                });
                self.emit(arm::Instr::Arith {
                    op: ArithOp::Add,
                    cond: None,
                    dest: Reg::Sp,
                    lhs: Reg::Sp,
                    rhs: Operand::Reg(OFFSET_REGISTER),
                });
                self.emit(arm::Instr::Pop(arm::frame_registers(Reg::Pc)));
            }
            ir3::Instr::Return(value) => {
                if let Some(value) = value {
                    self.load(frame, RETURN_REGISTER, value);
                }
                self.emit(arm::Instr::Branch {
                    cond: None,
                    label: exit_label(frame.function()),
                });
            }
            ir3::Instr::Call {
                dest,
                function,
                args,
            } => {
                let args: Vec<_> = args.iter().map(|arg| Arg::Symbol(arg)).collect();
                self.call(frame, function, &args, Some(dest));
            }
            ir3::Instr::Print { value } => {
                let (format, arg) = match frame.ty(value) {
                    Type::Int => (INT_FORMAT, Arg::Symbol(value)),
                    Type::String => (STRING_FORMAT, Arg::Symbol(value)),
                    Type::Bool => (STRING_FORMAT, Arg::BoolText(value)),
                    ty => panic!("cannot print `{}` of type {}", value, ty),
                };
                let format = Arg::Label(self.data.intern(format));
                self.call(frame, PRINTF, &[format, arg], None);
            }
            ir3::Instr::Read { target } => {
                let function = match frame.ty(target) {
                    Type::Int => READ_INT,
                    Type::Bool => READ_BOOL,
                    Type::String => READ_STRING,
                    ty => panic!("cannot read into `{}` of type {}", target, ty),
                };
                self.call(frame, function, &[], Some(target));
            }
            ir3::Instr::New { dest, class } => {
                let size = self.classes.get(class).size() as i32;
                self.call(frame, MALLOC, &[Arg::Imm(size)], Some(dest));
            }
            ir3::Instr::Assign { dest, src } => {
                self.load(frame, Reg::V1, src);
                self.store(frame, Reg::V1, dest);
            }
            ir3::Instr::StoreField {
                object,
                field,
                value,
            } => {
                let offset = self.field_offset(frame, object, field);
                self.load(frame, Reg::V1, object);
                self.load(frame, Reg::V2, value);
                let offset = self.offset(offset);
                self.emit(arm::Instr::Store {
                    src: Reg::V2,
                    base: Reg::V1,
                    offset,
                });
            }
            ir3::Instr::LoadField {
                dest,
                object,
                field,
            } => {
                let offset = self.field_offset(frame, object, field);
                self.load(frame, Reg::V1, object);
                let offset = self.offset(offset);
                self.emit(arm::Instr::Load {
                    dest: Reg::V2,
                    base: Reg::V1,
                    offset,
                });
                self.store(frame, Reg::V2, dest);
            }
            ir3::Instr::Unary { dest, op, operand } => {
                let (op, imm) = match op {
                    UnaryOp::Neg => (ArithOp::Rsb, 0),
                    UnaryOp::Not => (ArithOp::Eor, 1),
                };
                self.load(frame, Reg::V1, operand);
                self.emit(arm::Instr::Arith {
                    op,
                    cond: None,
                    dest: Reg::V1,
                    lhs: Reg::V1,
                    rhs: Operand::Imm(imm),
                });
                self.store(frame, Reg::V1, dest);
            }
            ir3::Instr::Binary { dest, op, lhs, rhs } => {
                self.load(frame, Reg::V1, lhs);
                self.load(frame, Reg::V2, rhs);
                match comparison(*op) {
                    Some(cond) => {
                        self.emit(arm::Instr::LoadImm {
                            dest: Reg::V3,
                            value: 0,
                        });
                        self.emit(arm::Instr::Cmp {
                            lhs: Reg::V1,
                            rhs: Operand::Reg(Reg::V2),
                        });
                        self.emit(arm::Instr::Arith {
                            op: ArithOp::Add,
                            cond: Some(cond),
                            dest: Reg::V3,
                            lhs: Reg::V3,
                            rhs: Operand::Imm(1),
                        });
                    }
                    None => self.emit(arm::Instr::Arith {
                        op: arithmetic(*op),
                        cond: None,
                        dest: Reg::V3,
                        lhs: Reg::V1,
                        rhs: Operand::Reg(Reg::V2),
                    }),
                }
                self.store(frame, Reg::V3, dest);
            }
            ir3::Instr::Int { dest, value } => {
                self.emit(arm::Instr::LoadImm {
                    dest: Reg::V1,
                    value: *value,
                });
                self.store(frame, Reg::V1, dest);
            }
            ir3::Instr::Bool { dest, value } => {
                self.emit(arm::Instr::LoadImm {
                    dest: Reg::V1,
                    value: *value as i32,
                });
                self.store(frame, Reg::V1, dest);
            }
            ir3::Instr::Str { dest, value } => {
                let label = self.data.intern(value);
                self.emit(arm::Instr::LoadLabel {
                    cond: None,
                    dest: Reg::V1,
                    label,
                });
                self.store(frame, Reg::V1, dest);
            }
        }
    }
}

fn comparison(op: BinaryOp) -> Option<Cond> {
    match op {
        BinaryOp::Lt => Some(Cond::Lt),
        BinaryOp::Gt => Some(Cond::Gt),
        BinaryOp::Le => Some(Cond::Le),
        BinaryOp::Ge => Some(Cond::Ge),
        BinaryOp::Eq => Some(Cond::Eq),
        BinaryOp::Ne => Some(Cond::Ne),
        _ => None,
    }
}

fn arithmetic(op: BinaryOp) -> ArithOp {
    match op {
        BinaryOp::Add => ArithOp::Add,
        BinaryOp::Sub => ArithOp::Sub,
        BinaryOp::Mul => ArithOp::Mul,
        BinaryOp::Div => ArithOp::Sdiv,
        BinaryOp::And => ArithOp::And,
        BinaryOp::Or => ArithOp::Orr,
        op => panic!("`{}` is not an arithmetic operator", op.symbol()),
    }
}

/// Lowers a whole program. Each function's instructions are resolved against
/// its own closed table, selected by `FunctionStart` and released by
/// `FunctionEnd`.
pub fn generate(
    code: &[ir3::Instr],
    tables: &SymbolTables,
    classes: &ClassTables,
) -> (Vec<arm::Instr>, DataTable) {
    let mut generator = CodeGenerator::new(classes);
    let mut frame: Option<Frame> = None;

    for instr in code {
        match instr {
            ir3::Instr::FunctionStart { name, .. } => {
                if let Some(active) = frame {
                    panic!("`{}` starts inside `{}`", name, active.function());
                }
                let Some(table) = tables.get(name) else {
                    panic!("function `{}` has no symbol table", name);
                };
                let active = Frame::new(table);
                generator.lower_instruction(&active, instr);
                frame = Some(active);
            }
            ir3::Instr::FunctionEnd => {
                let Some(active) = frame.take() else {
                    panic!("function end outside of a function");
                };
                generator.lower_instruction(&active, instr);
                tracing::trace!(
                    function = active.function(),
                    frame_size = active.size(),
                    "generated function"
                );
            }
            _ => match &frame {
                Some(active) => generator.lower_instruction(active, instr),
                None => panic!("`{}` outside of a function", instr),
            },
        }
    }

    if let Some(active) = frame {
        panic!("function `{}` is never closed", active.function());
    }

    generator.finish()
}
