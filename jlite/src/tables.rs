//! Per-function symbol tables and per-class layouts.
//!
//! A function's table is built open while its IR3 is generated, then closed
//! exactly once by [`SymbolTableBuilder::finalize`], which assigns every
//! symbol its storage. Code generation only ever sees closed tables.

use crate::arm::{Reg, ARGUMENT_REGISTERS};
use crate::descriptors::{ClassDescriptor, Descriptors};
use crate::ty::Type;
use indexmap::IndexMap;
use std::fmt;

/// Receiver plus parameters passed in registers.
pub const MAX_ARGUMENTS: usize = ARGUMENT_REGISTERS.len();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    Register(Reg),
    /// Byte offset from the bottom of the frame.
    Stack(u32),
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::Register(reg) => write!(f, "{}", reg),
            Storage::Stack(offset) => write!(f, "[frame+{}]", offset),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub ty: Type,
    pub storage: Storage,
}

#[derive(Debug, Clone)]
pub struct SymbolTableBuilder {
    function: String,
    params: IndexMap<String, Type>,
    locals: IndexMap<String, Type>,
}

impl SymbolTableBuilder {
    pub fn new(function: impl Into<String>) -> Self {
        Self {
            function: function.into(),
            params: IndexMap::new(),
            locals: IndexMap::new(),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn add_param(&mut self, name: impl Into<String>, ty: Type) {
        let name = name.into();
        self.ensure_fresh(&name);
        self.params.insert(name, ty);
    }

    /// Registers a local variable or a temporary.
    pub fn add_local(&mut self, name: impl Into<String>, ty: Type) {
        let name = name.into();
        self.ensure_fresh(&name);
        self.locals.insert(name, ty);
    }

    pub fn ty(&self, name: &str) -> Option<&Type> {
        self.params.get(name).or_else(|| self.locals.get(name))
    }

    pub fn len(&self) -> usize {
        self.params.len() + self.locals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn ensure_fresh(&self, name: &str) {
        if self.ty(name).is_some() {
            panic!("symbol `{}` registered twice in `{}`", name, self.function);
        }
    }

    /// Assigns argument registers to parameters in declaration order and
    /// consecutive stack slots to locals.
    pub fn finalize(self) -> SymbolTable {
        if self.params.len() > MAX_ARGUMENTS {
            unimplemented!(
                "`{}` takes {} parameters, passing more than {} on the stack",
                self.function,
                self.params.len(),
                MAX_ARGUMENTS
            );
        }

        let params = self
            .params
            .into_iter()
            .zip(ARGUMENT_REGISTERS)
            .map(|((name, ty), reg)| {
                let entry = Entry {
                    ty,
                    storage: Storage::Register(reg),
                };
                (name, entry)
            })
            .collect();

        let mut frame_size = 0;
        let locals = self
            .locals
            .into_iter()
            .map(|(name, ty)| {
                let entry = Entry {
                    storage: Storage::Stack(frame_size),
                    ty,
                };
                frame_size += entry.ty.width();
                (name, entry)
            })
            .collect();

        SymbolTable {
            function: self.function,
            params,
            locals,
            frame_size,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SymbolTable {
    function: String,
    params: IndexMap<String, Entry>,
    locals: IndexMap<String, Entry>,
    frame_size: u32,
}

impl SymbolTable {
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn frame_size(&self) -> u32 {
        self.frame_size
    }

    pub fn get(&self, name: &str) -> Option<&Entry> {
        self.params.get(name).or_else(|| self.locals.get(name))
    }

    /// Panics if `name` was never registered.
    pub fn entry(&self, name: &str) -> &Entry {
        match self.get(name) {
            Some(entry) => entry,
            None => panic!("symbol `{}` is not registered in `{}`", name, self.function),
        }
    }

    pub fn params(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.params.iter()
    }

    pub fn locals(&self) -> impl Iterator<Item = (&String, &Entry)> {
        self.locals.iter()
    }
}

impl fmt::Display for SymbolTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "function {} (frame {} bytes)", self.function, self.frame_size)?;
        for (name, entry) in self.params.iter().chain(&self.locals) {
            writeln!(f, "  {}: {} @ {}", name, entry.ty, entry.storage)?;
        }
        Ok(())
    }
}

/// Closed tables of every lowered function, keyed by function name.
#[derive(Debug, Clone, Default)]
pub struct SymbolTables(IndexMap<String, SymbolTable>);

impl SymbolTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: SymbolTable) {
        if self.0.contains_key(table.function()) {
            panic!("function `{}` already has a symbol table", table.function());
        }
        self.0.insert(table.function.clone(), table);
    }

    pub fn get(&self, function: &str) -> Option<&SymbolTable> {
        self.0.get(function)
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolTable> {
        self.0.values()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SymbolTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in self.iter() {
            write!(f, "{}", table)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSlot {
    pub ty: Type,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassTable {
    pub name: String,
    fields: IndexMap<String, FieldSlot>,
    size: u32,
}

impl ClassTable {
    /// Lays fields out in declaration order.
    pub fn layout(class: &ClassDescriptor) -> Self {
        let mut size = 0;
        let fields = class
            .fields
            .iter()
            .map(|(name, ty)| {
                let slot = FieldSlot {
                    ty: ty.clone(),
                    offset: size,
                };
                size += ty.width();
                (name.clone(), slot)
            })
            .collect();

        Self {
            name: class.name.clone(),
            fields,
            size,
        }
    }

    /// Instance size in bytes.
    pub fn size(&self) -> u32 {
        self.size
    }

    /// Panics if the class has no such field.
    pub fn field(&self, name: &str) -> &FieldSlot {
        match self.fields.get(name) {
            Some(slot) => slot,
            None => panic!("class `{}` has no field `{}`", self.name, name),
        }
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &FieldSlot)> {
        self.fields.iter()
    }
}

impl fmt::Display for ClassTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "class {} ({} bytes)", self.name, self.size)?;
        for (name, slot) in &self.fields {
            writeln!(f, "  {}: {} @ {}", name, slot.ty, slot.offset)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ClassTables(IndexMap<String, ClassTable>);

impl ClassTables {
    /// Lays out every class. Tables are kept sorted by class name.
    pub fn from_descriptors(descriptors: &Descriptors) -> Self {
        let mut classes: Vec<_> = descriptors.classes().collect();
        classes.sort_by(|a, b| a.name.cmp(&b.name));

        let mut tables = Self::default();
        for class in classes {
            tables.insert(ClassTable::layout(class));
        }
        tables
    }

    pub fn insert(&mut self, table: ClassTable) {
        if self.0.contains_key(&table.name) {
            panic!("class `{}` already has a layout", table.name);
        }
        self.0.insert(table.name.clone(), table);
    }

    /// Panics if the class was never laid out.
    pub fn get(&self, class: &str) -> &ClassTable {
        match self.0.get(class) {
            Some(table) => table,
            None => panic!("class `{}` has no layout", class),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassTable> {
        self.0.values()
    }
}

impl fmt::Display for ClassTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for table in self.iter() {
            write!(f, "{}", table)?;
        }
        Ok(())
    }
}
