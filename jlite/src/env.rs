use crate::ty::Type;
use std::collections::HashMap;

/// Variables visible in one scope during type checking.
///
/// Nested scopes are made with [`LocalEnvironment::scope`], which copies the
/// parent, so declarations in one branch are never seen by a sibling.
#[derive(Debug, Clone)]
pub struct LocalEnvironment {
    vars: HashMap<String, Type>,
    pub class: String,
    pub method: String,
    pub return_ty: Type,
}

impl LocalEnvironment {
    pub fn new(class: &str) -> Self {
        Self {
            vars: HashMap::new(),
            class: class.to_string(),
            method: String::new(),
            return_ty: Type::Void,
        }
    }

    pub fn scope(&self) -> Self {
        self.clone()
    }

    pub fn method_scope(&self, method: &str, return_ty: &Type) -> Self {
        let mut env = self.scope();
        env.method = method.to_string();
        env.return_ty = return_ty.clone();
        env
    }

    pub fn extend(&mut self, name: &str, ty: Type) {
        self.vars.insert(name.to_string(), ty);
    }

    pub fn get(&self, name: &str) -> Option<&Type> {
        self.vars.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }
}
