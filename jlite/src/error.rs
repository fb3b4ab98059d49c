use crate::span::Span;
use crate::ty::Type;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NamingError {
    #[error("duplicate class declaration `{name}`")]
    DuplicateClass { name: String, span: Span },

    #[error("duplicate field `{name}` in class `{class}`")]
    DuplicateField {
        class: String,
        name: String,
        span: Span,
    },

    #[error("duplicate method `{name}` in class `{class}`")]
    DuplicateMethod {
        class: String,
        name: String,
        span: Span,
    },

    #[error("duplicate parameter `{name}` in method `{method}`")]
    DuplicateParameter {
        method: String,
        name: String,
        span: Span,
    },

    #[error("duplicate local variable `{name}` in method `{method}`")]
    DuplicateLocal {
        method: String,
        name: String,
        span: Span,
    },

    #[error("local variable `{name}` in method `{method}` must be declared at the top of the method body")]
    NestedDeclaration {
        method: String,
        name: String,
        span: Span,
    },

    #[error("classes `{first}` and `{second}` both declare `main`")]
    AmbiguousEntryClass { first: String, second: String },

    #[error("no class declares a `main` method")]
    MissingEntryClass,

    #[error("methods {first} and {second} both lower to function `{function}`")]
    FunctionNameClash {
        function: String,
        first: String,
        second: String,
    },
}

impl NamingError {
    pub fn span(&self) -> Option<Span> {
        match self {
            NamingError::DuplicateClass { span, .. }
            | NamingError::DuplicateField { span, .. }
            | NamingError::DuplicateMethod { span, .. }
            | NamingError::DuplicateParameter { span, .. }
            | NamingError::DuplicateLocal { span, .. }
            | NamingError::NestedDeclaration { span, .. } => Some(*span),
            NamingError::AmbiguousEntryClass { .. }
            | NamingError::MissingEntryClass
            | NamingError::FunctionNameClash { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}")]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub span: Span,
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TypeErrorKind {
    #[error("operator `{op}` expects {expected}, found {found}")]
    OperandMismatch {
        op: &'static str,
        expected: Type,
        found: Type,
    },

    #[error("cannot assign a value of type {value} to a target of type {target}")]
    AssignMismatch { target: Type, value: Type },

    #[error("argument `{param}` of `{method}` expects {expected}, found {found}")]
    ArgumentMismatch {
        method: String,
        param: String,
        expected: Type,
        found: Type,
    },

    #[error("`{method}` takes {expected} argument(s), {found} given")]
    ArityMismatch {
        method: String,
        expected: usize,
        found: usize,
    },

    #[error("undefined variable `{name}`")]
    UndefinedVariable { name: String },

    #[error("unknown type `{name}`")]
    UnknownType { name: String },

    #[error("`{name}` cannot be declared Void")]
    VoidVariable { name: String },

    #[error("class `{class}` has no member `{member}`")]
    UnknownMember { class: String, member: String },

    #[error("cannot access member `{member}` of primitive type {ty}")]
    PrimitiveMemberAccess { ty: Type, member: String },

    #[error("method `{class}.{method}` can only be called")]
    MethodAsValue { class: String, method: String },

    #[error("only methods can be called")]
    NotCallable,

    #[error("only variables and fields can be assigned to")]
    NotAssignable,

    #[error("{construct} condition must be Bool, found {found}")]
    ConditionNotBool {
        construct: &'static str,
        found: Type,
    },

    #[error("method `{class}.{method}` returns {expected}, found {found}")]
    ReturnMismatch {
        class: String,
        method: String,
        expected: Type,
        found: Type,
    },

    #[error("cannot print a value of type {found}")]
    UnsupportedPrint { found: Type },

    #[error("cannot read into a variable of type {found}")]
    UnsupportedRead { found: Type },

    #[error("null is not a valid {expected}")]
    MisplacedNull { expected: String },

    #[error("method `{method}` takes {count} parameters including the receiver, at most 4 are supported")]
    TooManyParameters { method: String, count: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("naming error: {0}")]
    Naming(#[from] NamingError),

    #[error("type error: {0}")]
    Type(#[from] TypeError),
}

impl CompileError {
    pub fn span(&self) -> Option<Span> {
        match self {
            CompileError::Naming(error) => error.span(),
            CompileError::Type(error) => Some(error.span),
        }
    }
}
