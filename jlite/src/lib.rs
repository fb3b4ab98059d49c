pub mod span;
pub mod ivec;
pub mod ty;
pub mod error;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod descriptors;
pub mod env;
pub mod names;
pub mod types;
pub mod ir3;
pub mod lower;
pub mod tables;
pub mod arm;
pub mod codegen;
pub mod emit;
pub mod pipeline;

#[macro_use(paste)]
extern crate paste;
