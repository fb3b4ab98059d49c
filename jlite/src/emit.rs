use crate::arm::{self, Reg, RETURN_REGISTER};
use crate::codegen::DataTable;
use crate::descriptors::{function_name, ENTRY_METHOD};
use crate::pipeline::Compilation;
use std::fmt::Write;

pub const ENTRY_SYMBOL: &str = "main";
pub const HALT_LABEL: &str = ".Lhalt";

const INDENT: &str = "    ";

struct Builder {
    result: String,
}

impl Builder {
    fn new() -> Self {
        Self {
            result: String::new(),
        }
    }

    fn commit(self) -> String {
        self.result
    }
}

impl Write for Builder {
    fn write_str(&mut self, s: &str) -> std::fmt::Result {
        self.result.push_str(s);
        Ok(())
    }
}

/// Renders a complete assembly unit: the data section, the `main` stub that
/// enters the program, then every lowered function.
pub fn emit(compilation: &Compilation) -> String {
    let mut builder = Builder::new();
    emit_unit(&mut builder, compilation).expect("writing to a string cannot fail");
    builder.commit()
}

/// The stub the runtime enters through. It passes a null receiver to the
/// entry class's `main`.
pub fn entry_stub(entry_class: &str) -> Vec<arm::Instr> {
    vec![
        arm::Instr::Label(ENTRY_SYMBOL.to_string()),
        arm::Instr::Push(arm::frame_registers(Reg::Lr)),
        arm::Instr::LoadImm {
            dest: RETURN_REGISTER,
            value: 0,
        },
        arm::Instr::BranchLink(function_name(entry_class, ENTRY_METHOD)),
        arm::Instr::Label(HALT_LABEL.to_string()),
        arm::Instr::LoadImm {
            dest: RETURN_REGISTER,
            value: 0,
        },
        arm::Instr::Pop(arm::frame_registers(Reg::Pc)),
    ]
}

fn emit_unit(builder: &mut Builder, compilation: &Compilation) -> std::fmt::Result {
    emit_data(builder, &compilation.data)?;

    writeln!(builder)?;
    writeln!(builder, "{}.text", INDENT)?;
    writeln!(builder, "{}.global {}", INDENT, ENTRY_SYMBOL)?;
    writeln!(builder, "{}.type {}, %function", INDENT, ENTRY_SYMBOL)?;
    writeln!(builder)?;

    emit_code(builder, &entry_stub(&compilation.entry_class))?;
    writeln!(builder)?;
    emit_code(builder, &compilation.code)
}

fn emit_data(builder: &mut Builder, data: &DataTable) -> std::fmt::Result {
    writeln!(builder, "{}.data", INDENT)?;
    for (label, text) in data.iter() {
        writeln!(builder, "{}:", label)?;
        writeln!(builder, "{}.asciz \"{}\"", INDENT, text)?;
    }
    Ok(())
}

fn emit_code(builder: &mut Builder, code: &[arm::Instr]) -> std::fmt::Result {
    for instr in code {
        match instr {
            arm::Instr::Label(_) => writeln!(builder, "{}", instr)?,
            _ => writeln!(builder, "{}{}", INDENT, instr)?,
        }
    }
    Ok(())
}
