//! Three-address intermediate representation.
//!
//! Every operand is a name: a parameter, a local variable or a temporary.
//! Temporaries are spelled `_t<n>`, which no source identifier can be.

use crate::ast::{BinaryOp, UnaryOp};
use crate::create_index;
use crate::ivec::IIndex;
use crate::ty::Type;
use std::fmt;

create_index!(pub LabelId);
create_index!(pub TempId);

impl fmt::Display for LabelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.index())
    }
}

impl fmt::Display for TempId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_t{}", self.index())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instr {
    Label(LabelId),
    /// Jumps when `cond` is absent or holds a non-zero value.
    Goto {
        label: LabelId,
        cond: Option<String>,
    },
    FunctionStart {
        class: String,
        return_ty: Type,
        name: String,
        /// The receiver `this` comes first.
        params: Vec<(String, Type)>,
    },
    FunctionEnd,
    Call {
        dest: String,
        function: String,
        /// The receiver comes first.
        args: Vec<String>,
    },
    Print {
        value: String,
    },
    Read {
        target: String,
    },
    New {
        dest: String,
        class: String,
    },
    Return(Option<String>),
    Assign {
        dest: String,
        src: String,
    },
    StoreField {
        object: String,
        field: String,
        value: String,
    },
    LoadField {
        dest: String,
        object: String,
        field: String,
    },
    Unary {
        dest: String,
        op: UnaryOp,
        operand: String,
    },
    Binary {
        dest: String,
        op: BinaryOp,
        lhs: String,
        rhs: String,
    },
    Int {
        dest: String,
        value: i32,
    },
    Bool {
        dest: String,
        value: bool,
    },
    Str {
        dest: String,
        value: String,
    },
}

impl Instr {
    /// The name this instruction writes, if any.
    pub fn result(&self) -> Option<&str> {
        match self {
            Instr::Call { dest, .. }
            | Instr::New { dest, .. }
            | Instr::Assign { dest, .. }
            | Instr::LoadField { dest, .. }
            | Instr::Unary { dest, .. }
            | Instr::Binary { dest, .. }
            | Instr::Int { dest, .. }
            | Instr::Bool { dest, .. }
            | Instr::Str { dest, .. } => Some(dest),
            Instr::Label(_)
            | Instr::Goto { .. }
            | Instr::FunctionStart { .. }
            | Instr::FunctionEnd
            | Instr::Print { .. }
            | Instr::Read { .. }
            | Instr::Return(_)
            | Instr::StoreField { .. } => None,
        }
    }
}

/// Name holding the value computed by `code`.
///
/// Panics if `code` is empty or its last instruction produces no value.
pub fn result_of(code: &[Instr]) -> &str {
    match code.last() {
        Some(last) => match last.result() {
            Some(name) => name,
            None => panic!("`{}` produces no value", last),
        },
        None => panic!("empty instruction sequence has no result"),
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Label(label) => write!(f, "{}:", label),
            Instr::Goto { label, cond: None } => write!(f, "goto {};", label),
            Instr::Goto {
                label,
                cond: Some(cond),
            } => write!(f, "if ({}) goto {};", cond, label),
            Instr::FunctionStart {
                return_ty,
                name,
                params,
                ..
            } => {
                write!(f, "{} {}(", return_ty, name)?;
                for (i, (param, ty)) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", ty, param)?;
                }
                write!(f, ") {{")
            }
            Instr::FunctionEnd => write!(f, "}}"),
            Instr::Call {
                dest,
                function,
                args,
            } => write!(f, "{} = {}({});", dest, function, args.join(", ")),
            Instr::Print { value } => write!(f, "println({});", value),
            Instr::Read { target } => write!(f, "readln({});", target),
            Instr::New { dest, class } => write!(f, "{} = new {}();", dest, class),
            Instr::Return(None) => write!(f, "return;"),
            Instr::Return(Some(value)) => write!(f, "return {};", value),
            Instr::Assign { dest, src } => write!(f, "{} = {};", dest, src),
            Instr::StoreField {
                object,
                field,
                value,
            } => write!(f, "{}.{} = {};", object, field, value),
            Instr::LoadField {
                dest,
                object,
                field,
            } => write!(f, "{} = {}.{};", dest, object, field),
            Instr::Unary { dest, op, operand } => {
                write!(f, "{} = {}{};", dest, op.symbol(), operand)
            }
            Instr::Binary { dest, op, lhs, rhs } => {
                write!(f, "{} = {} {} {};", dest, lhs, op.symbol(), rhs)
            }
            Instr::Int { dest, value } => write!(f, "{} = {};", dest, value),
            Instr::Bool { dest, value } => write!(f, "{} = {};", dest, value),
            Instr::Str { dest, value } => write!(f, "{} = \"{}\";", dest, value),
        }
    }
}

/// Renders a flat instruction list, indenting function bodies.
pub fn dump(code: &[Instr]) -> String {
    let mut out = String::new();
    for instr in code {
        let indent = match instr {
            Instr::FunctionStart { .. } | Instr::FunctionEnd | Instr::Label(_) => "",
            _ => "  ",
        };
        out.push_str(indent);
        out.push_str(&instr.to_string());
        out.push('\n');
    }
    out
}
