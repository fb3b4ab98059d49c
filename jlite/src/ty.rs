use std::fmt;

/// Size of a machine word on the target, in bytes.
pub const WORD: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Type {
    Void,
    Int,
    Bool,
    String,
    Float,
    Reference(String),
}

impl Type {
    pub fn from_name(name: &str) -> Type {
        match name {
            "Void" => Type::Void,
            "Int" => Type::Int,
            "Bool" => Type::Bool,
            "String" => Type::String,
            "Float" => Type::Float,
            class => Type::Reference(class.to_string()),
        }
    }

    /// Storage width in bytes. Strings and references are pointers.
    pub fn width(&self) -> u32 {
        match self {
            Type::Void => 0,
            Type::Int | Type::Bool | Type::Float => WORD,
            Type::String | Type::Reference(_) => WORD,
        }
    }

    pub fn is_primitive(&self) -> bool {
        !matches!(self, Type::Reference(_))
    }

    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Reference(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => f.write_str("Void"),
            Type::Int => f.write_str("Int"),
            Type::Bool => f.write_str("Bool"),
            Type::String => f.write_str("String"),
            Type::Float => f.write_str("Float"),
            Type::Reference(name) => f.write_str(name),
        }
    }
}
