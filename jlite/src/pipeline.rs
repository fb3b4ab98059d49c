use crate::arm;
use crate::ast::Program;
use crate::codegen::{self, DataTable};
use crate::descriptors::{build_descriptors, Descriptors};
use crate::error::CompileError;
use crate::ir3;
use crate::lower::Generator;
use crate::names::check_distinct_names;
use crate::tables::{ClassTables, SymbolTables};
use crate::types::check_types;

/// Everything produced by compiling one program.
#[derive(Debug, Clone)]
pub struct Compilation {
    pub entry_class: String,
    pub ir3: Vec<ir3::Instr>,
    pub symbol_tables: SymbolTables,
    pub class_tables: ClassTables,
    pub code: Vec<arm::Instr>,
    pub data: DataTable,
}

/// Runs the naming check, builds descriptors and type checks `program` in
/// place.
pub fn analyze(program: &mut Program) -> Result<Descriptors, CompileError> {
    check_distinct_names(program)?;
    tracing::debug!("names are distinct");

    let descriptors = build_descriptors(program)?;
    tracing::debug!(entry = descriptors.entry_class(), "built descriptors");

    check_types(program, &descriptors)?;
    Ok(descriptors)
}

pub fn compile(mut program: Program) -> Result<Compilation, CompileError> {
    let descriptors = analyze(&mut program)?;

    let mut generator = Generator::new();
    let mut code = Vec::new();
    let mut symbol_tables = SymbolTables::new();
    for class in &program.classes {
        for method in &class.methods {
            let (method_code, table) = generator.lower_method(&class.ident.0, method);
            code.extend(method_code);
            symbol_tables.insert(table.finalize());
        }
    }
    tracing::debug!(
        functions = symbol_tables.len(),
        instructions = code.len(),
        "generated IR3"
    );

    let class_tables = ClassTables::from_descriptors(&descriptors);
    let (arm_code, data) = codegen::generate(&code, &symbol_tables, &class_tables);
    tracing::debug!(
        instructions = arm_code.len(),
        strings = data.len(),
        "generated target code"
    );

    Ok(Compilation {
        entry_class: descriptors.entry_class().to_string(),
        ir3: code,
        symbol_tables,
        class_tables,
        code: arm_code,
        data,
    })
}
