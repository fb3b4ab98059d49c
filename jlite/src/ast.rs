use crate::descriptors::MethodDescriptor;
use crate::span::Span;
use crate::ty::Type;

#[derive(Debug, Clone, PartialEq)]
pub struct Ast<T>(pub T, pub Span);

#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub classes: Vec<Class>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Class {
    pub ident: Ast<String>,
    pub fields: Vec<VarDecl>,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub ty: Ast<Type>,
    pub ident: Ast<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Method {
    pub return_ty: Ast<Type>,
    pub ident: Ast<String>,
    pub params: Vec<VarDecl>,
    pub body: Block,
}

/// Variable declarations only appear in method bodies; `if`/`while` branches
/// carry an empty `vars`, which the naming check enforces.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub vars: Vec<VarDecl>,
    pub stmts: Vec<Stmt>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StmtKind {
    Assign {
        target: Expr,
        value: Expr,
    },
    Return(Option<Expr>),
    If {
        cond: Expr,
        then_branch: Block,
        else_branch: Block,
    },
    While {
        cond: Expr,
        body: Block,
    },
    Print(Expr),
    Read(Ast<String>),
    /// A call evaluated for its side effects.
    Call(Expr),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Ord, PartialOrd, Eq, PartialEq)]
pub enum Precedence {
    Or,
    And,
    Compare,
    Add,
    Mul,
}

impl BinaryOp {
    pub fn precedence(&self) -> Precedence {
        match self {
            BinaryOp::Or => Precedence::Or,
            BinaryOp::And => Precedence::And,
            BinaryOp::Lt
            | BinaryOp::Gt
            | BinaryOp::Le
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne => Precedence::Compare,
            BinaryOp::Add | BinaryOp::Sub => Precedence::Add,
            BinaryOp::Mul | BinaryOp::Div => Precedence::Mul,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::Le => "<=",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == Precedence::Compare
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i32),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
    /// Filled in by type checking.
    pub ty: Option<Type>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    This,
    Null,
    New(Ast<String>),
    Field {
        object: Box<Expr>,
        field: Ast<String>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        /// The matched method, filled in by type checking.
        method: Option<MethodDescriptor>,
    },
    Var(String),
    Literal(Literal),
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            ty: None,
        }
    }

    pub fn resolved_ty(&self) -> &Type {
        match &self.ty {
            Some(ty) => ty,
            None => panic!("expression at {} was not type checked", self.span),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsingError {
    #[error("unknown token: {0} at {1}")]
    UnknownToken(String, Span),
    #[error("unexpected token: {0} at {1}")]
    UnexpectedToken(String, Span),
    #[error("invalid integer literal `{0}` at {1}")]
    InvalidInteger(String, Span),
    #[error("unexpected end of file")]
    UnexpectedEof,
}

impl ParsingError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParsingError::UnknownToken(_, span)
            | ParsingError::UnexpectedToken(_, span)
            | ParsingError::InvalidInteger(_, span) => Some(*span),
            ParsingError::UnexpectedEof => None,
        }
    }
}
