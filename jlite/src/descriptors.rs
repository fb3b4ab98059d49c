//! Program-wide registry of class and method shapes.
//!
//! Built once from the syntax tree after the distinct-name check and never
//! modified afterwards.

use crate::ast;
use crate::error::NamingError;
use crate::ty::Type;
use indexmap::IndexMap;
use std::collections::HashMap;

pub const ENTRY_METHOD: &str = "main";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub return_ty: Type,
    pub name: String,
    pub class: String,
    pub params: Vec<(String, Type)>,
}

impl MethodDescriptor {
    /// Name of the lowered function, `<Class>_<method>`.
    pub fn function_name(&self) -> String {
        function_name(&self.class, &self.name)
    }
}

pub fn function_name(class: &str, method: &str) -> String {
    format!("{}_{}", class, method)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDescriptor {
    pub name: String,
    /// Declaration order is kept: class layout depends on it.
    pub fields: IndexMap<String, Type>,
    pub methods: HashMap<String, MethodDescriptor>,
}

impl ClassDescriptor {
    pub fn field(&self, name: &str) -> Option<&Type> {
        self.fields.get(name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.get(name)
    }
}

#[derive(Debug, Clone)]
pub struct Descriptors {
    classes: HashMap<String, ClassDescriptor>,
    entry_class: String,
}

impl Descriptors {
    pub fn class(&self, name: &str) -> Option<&ClassDescriptor> {
        self.classes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// True for primitive types and declared classes.
    pub fn is_known(&self, ty: &Type) -> bool {
        match ty {
            Type::Reference(name) => self.contains(name),
            _ => true,
        }
    }

    pub fn entry_class(&self) -> &str {
        &self.entry_class
    }

    /// Iteration order is unspecified.
    pub fn classes(&self) -> impl Iterator<Item = &ClassDescriptor> {
        self.classes.values()
    }
}

pub fn build_descriptors(program: &ast::Program) -> Result<Descriptors, NamingError> {
    let mut classes: HashMap<String, ClassDescriptor> = HashMap::new();
    let mut function_owners: HashMap<String, (String, String)> = HashMap::new();
    let mut entry_class: Option<String> = None;

    for class in &program.classes {
        let name = class.ident.0.clone();
        if classes.contains_key(&name) {
            return Err(NamingError::DuplicateClass {
                name,
                span: class.ident.1,
            });
        }

        let fields = class
            .fields
            .iter()
            .map(|field| (field.ident.0.clone(), field.ty.0.clone()))
            .collect();

        let mut methods = HashMap::new();
        for method in &class.methods {
            let descriptor = MethodDescriptor {
                return_ty: method.return_ty.0.clone(),
                name: method.ident.0.clone(),
                class: name.clone(),
                params: method
                    .params
                    .iter()
                    .map(|param| (param.ident.0.clone(), param.ty.0.clone()))
                    .collect(),
            };

            let function = descriptor.function_name();
            if let Some((class, method)) = function_owners.get(&function) {
                return Err(NamingError::FunctionNameClash {
                    function,
                    first: format!("{}.{}", class, method),
                    second: format!("{}.{}", name, descriptor.name),
                });
            }
            function_owners.insert(function, (name.clone(), descriptor.name.clone()));

            if descriptor.name == ENTRY_METHOD {
                if let Some(first) = &entry_class {
                    return Err(NamingError::AmbiguousEntryClass {
                        first: first.clone(),
                        second: name,
                    });
                }
                entry_class = Some(name.clone());
            }

            methods.insert(descriptor.name.clone(), descriptor);
        }

        tracing::trace!(class = %name, methods = methods.len(), "built class descriptor");
        classes.insert(
            name.clone(),
            ClassDescriptor {
                name,
                fields,
                methods,
            },
        );
    }

    let entry_class = entry_class.ok_or(NamingError::MissingEntryClass)?;
    Ok(Descriptors {
        classes,
        entry_class,
    })
}
