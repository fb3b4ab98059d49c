//! Instructions of the 32-bit ARM-style target.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    A1,
    A2,
    A3,
    A4,
    V1,
    V2,
    V3,
    V4,
    V5,
    Fp,
    Sp,
    Lr,
    Pc,
}

/// Parameter registers, in order. The receiver goes first.
pub const ARGUMENT_REGISTERS: [Reg; 4] = [Reg::A1, Reg::A2, Reg::A3, Reg::A4];

pub const RETURN_REGISTER: Reg = Reg::A1;

/// Scratch registers used to stage operands, in order.
pub const SCRATCH_REGISTERS: [Reg; 4] = [Reg::V1, Reg::V2, Reg::V3, Reg::V4];

/// Holds offsets and sizes too large for an immediate.
pub const OFFSET_REGISTER: Reg = Reg::V5;

/// Registers a callee must restore before returning.
pub const CALLEE_SAVED_REGISTERS: [Reg; 5] = [Reg::V1, Reg::V2, Reg::V3, Reg::V4, Reg::V5];

/// Register list saved on entry and restored on exit: the callee-saved
/// registers, `fp`, then `link` (`lr` when pushing, `pc` when popping).
pub fn frame_registers(link: Reg) -> Vec<Reg> {
    let mut regs = CALLEE_SAVED_REGISTERS.to_vec();
    regs.extend([Reg::Fp, link]);
    regs
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Reg::A1 => "a1",
            Reg::A2 => "a2",
            Reg::A3 => "a3",
            Reg::A4 => "a4",
            Reg::V1 => "v1",
            Reg::V2 => "v2",
            Reg::V3 => "v3",
            Reg::V4 => "v4",
            Reg::V5 => "v5",
            Reg::Fp => "fp",
            Reg::Sp => "sp",
            Reg::Lr => "lr",
            Reg::Pc => "pc",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
}

impl Cond {
    pub fn holds(&self, lhs: i32, rhs: i32) -> bool {
        match self {
            Cond::Eq => lhs == rhs,
            Cond::Ne => lhs != rhs,
            Cond::Lt => lhs < rhs,
            Cond::Gt => lhs > rhs,
            Cond::Le => lhs <= rhs,
            Cond::Ge => lhs >= rhs,
        }
    }
}

impl fmt::Display for Cond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Cond::Eq => "eq",
            Cond::Ne => "ne",
            Cond::Lt => "lt",
            Cond::Gt => "gt",
            Cond::Le => "le",
            Cond::Ge => "ge",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(Reg),
    Imm(i32),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Reg(reg) => write!(f, "{}", reg),
            Operand::Imm(value) => write!(f, "#{}", value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    /// Reverse subtract: `dest = rhs - lhs`.
    Rsb,
    Mul,
    Sdiv,
    And,
    Orr,
    Eor,
}

impl ArithOp {
    pub fn apply(&self, lhs: i32, rhs: i32) -> i32 {
        match self {
            ArithOp::Add => lhs.wrapping_add(rhs),
            ArithOp::Sub => lhs.wrapping_sub(rhs),
            ArithOp::Rsb => rhs.wrapping_sub(lhs),
            ArithOp::Mul => lhs.wrapping_mul(rhs),
            ArithOp::Sdiv => {
                if rhs == 0 {
                    0
                } else {
                    lhs.wrapping_div(rhs)
                }
            }
            ArithOp::And => lhs & rhs,
            ArithOp::Orr => lhs | rhs,
            ArithOp::Eor => lhs ^ rhs,
        }
    }
}

impl fmt::Display for ArithOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Rsb => "rsb",
            ArithOp::Mul => "mul",
            ArithOp::Sdiv => "sdiv",
            ArithOp::And => "and",
            ArithOp::Orr => "orr",
            ArithOp::Eor => "eor",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instr {
    Label(String),
    Mov {
        dest: Reg,
        src: Reg,
    },
    /// `ldr dest, =value`
    LoadImm {
        dest: Reg,
        value: i32,
    },
    /// `ldr dest, =label`, the address of a label.
    LoadLabel {
        cond: Option<Cond>,
        dest: Reg,
        label: String,
    },
    /// Word load from `base + offset`.
    Load {
        dest: Reg,
        base: Reg,
        offset: Operand,
    },
    /// Word store to `base + offset`.
    Store {
        src: Reg,
        base: Reg,
        offset: Operand,
    },
    Arith {
        op: ArithOp,
        cond: Option<Cond>,
        dest: Reg,
        lhs: Reg,
        rhs: Operand,
    },
    Cmp {
        lhs: Reg,
        rhs: Operand,
    },
    Branch {
        cond: Option<Cond>,
        label: String,
    },
    BranchLink(String),
    Push(Vec<Reg>),
    Pop(Vec<Reg>),
}

struct Cc(Option<Cond>);

impl fmt::Display for Cc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(cond) => write!(f, "{}", cond),
            None => Ok(()),
        }
    }
}

struct RegList<'a>(&'a [Reg]);

impl fmt::Display for RegList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, reg) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", reg)?;
        }
        write!(f, "}}")
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Label(label) => write!(f, "{}:", label),
            Instr::Mov { dest, src } => write!(f, "mov {}, {}", dest, src),
            Instr::LoadImm { dest, value } => write!(f, "ldr {}, ={}", dest, value),
            Instr::LoadLabel { cond, dest, label } => {
                write!(f, "ldr{} {}, ={}", Cc(*cond), dest, label)
            }
            Instr::Load { dest, base, offset } => write!(f, "ldr {}, [{}, {}]", dest, base, offset),
            Instr::Store { src, base, offset } => write!(f, "str {}, [{}, {}]", src, base, offset),
            Instr::Arith {
                op,
                cond,
                dest,
                lhs,
                rhs,
            } => write!(f, "{}{} {}, {}, {}", op, Cc(*cond), dest, lhs, rhs),
            Instr::Cmp { lhs, rhs } => write!(f, "cmp {}, {}", lhs, rhs),
            Instr::Branch { cond, label } => write!(f, "b{} {}", Cc(*cond), label),
            Instr::BranchLink(label) => write!(f, "bl {}", label),
            Instr::Push(regs) => write!(f, "stmfd sp!, {}", RegList(regs)),
            Instr::Pop(regs) => write!(f, "ldmfd sp!, {}", RegList(regs)),
        }
    }
}
