use crate::ast;
use crate::ast::{Ast, StmtKind};
use crate::error::NamingError;
use std::collections::HashSet;

type NameResult<T> = Result<T, NamingError>;

/// Tracks the names declared in a single scope.
struct Scope<'a> {
    seen: HashSet<&'a str>,
}

impl<'a> Scope<'a> {
    fn new() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }

    /// Returns `false` if `name` was already declared.
    fn declare(&mut self, name: &'a Ast<String>) -> bool {
        self.seen.insert(&name.0)
    }
}

/// Rejects the first duplicate declaration in any scope.
///
/// Class names are scanned first, then each class's fields and methods, then
/// each method's parameters and locals.
pub fn check_distinct_names(program: &ast::Program) -> NameResult<()> {
    let mut classes = Scope::new();
    for class in &program.classes {
        if !classes.declare(&class.ident) {
            return Err(NamingError::DuplicateClass {
                name: class.ident.0.clone(),
                span: class.ident.1,
            });
        }
    }

    for class in &program.classes {
        check_class(class)?;
    }

    Ok(())
}

fn check_class(class: &ast::Class) -> NameResult<()> {
    let mut fields = Scope::new();
    for field in &class.fields {
        if !fields.declare(&field.ident) {
            return Err(NamingError::DuplicateField {
                class: class.ident.0.clone(),
                name: field.ident.0.clone(),
                span: field.ident.1,
            });
        }
    }

    let mut methods = Scope::new();
    for method in &class.methods {
        if !methods.declare(&method.ident) {
            return Err(NamingError::DuplicateMethod {
                class: class.ident.0.clone(),
                name: method.ident.0.clone(),
                span: method.ident.1,
            });
        }
    }

    for method in &class.methods {
        check_method(method)?;
    }

    Ok(())
}

fn check_method(method: &ast::Method) -> NameResult<()> {
    let mut scope = Scope::new();
    for param in &method.params {
        if !scope.declare(&param.ident) {
            return Err(NamingError::DuplicateParameter {
                method: method.ident.0.clone(),
                name: param.ident.0.clone(),
                span: param.ident.1,
            });
        }
    }

    // Parameters and locals share one symbol table per function.
    for var in &method.body.vars {
        if !scope.declare(&var.ident) {
            return Err(NamingError::DuplicateLocal {
                method: method.ident.0.clone(),
                name: var.ident.0.clone(),
                span: var.ident.1,
            });
        }
    }

    check_nested_blocks(method, &method.body.stmts)
}

/// Locals share one flat frame per function, so branches and loop bodies may
/// not declare their own.
fn check_nested_blocks(method: &ast::Method, stmts: &[ast::Stmt]) -> NameResult<()> {
    for stmt in stmts {
        let blocks = match &stmt.kind {
            StmtKind::If {
                then_branch,
                else_branch,
                ..
            } => vec![then_branch, else_branch],
            StmtKind::While { body, .. } => vec![body],
            _ => continue,
        };

        for block in blocks {
            if let Some(var) = block.vars.first() {
                return Err(NamingError::NestedDeclaration {
                    method: method.ident.0.clone(),
                    name: var.ident.0.clone(),
                    span: var.ident.1,
                });
            }
            check_nested_blocks(method, &block.stmts)?;
        }
    }
    Ok(())
}
