//! Lowering of the checked syntax tree to IR3.

use crate::ast::{self, ExprKind, Literal, StmtKind};
use crate::descriptors::function_name;
use crate::ir3::{result_of, Instr, LabelId, TempId};
use crate::ivec::ISource;
use crate::tables::SymbolTableBuilder;
use crate::ty::Type;

/// Owns the label and temporary counters shared by every method, so ids are
/// unique across the whole program.
#[derive(Debug, Default)]
pub struct Generator {
    labels: ISource<LabelId>,
    temps: ISource<TempId>,
}

impl Generator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lowers one type-checked method into a function framed by
    /// `FunctionStart`/`FunctionEnd`, and returns it with the open symbol
    /// table holding its receiver, parameters, locals and temporaries.
    pub fn lower_method(
        &mut self,
        class: &str,
        method: &ast::Method,
    ) -> (Vec<Instr>, SymbolTableBuilder) {
        let name = function_name(class, &method.ident.0);
        let mut table = SymbolTableBuilder::new(name.clone());

        let mut params = vec![("this".to_string(), Type::Reference(class.to_string()))];
        params.extend(
            method
                .params
                .iter()
                .map(|param| (param.ident.0.clone(), param.ty.0.clone())),
        );
        for (param, ty) in &params {
            table.add_param(param.clone(), ty.clone());
        }
        for var in &method.body.vars {
            table.add_local(var.ident.0.clone(), var.ty.0.clone());
        }

        let mut code = vec![Instr::FunctionStart {
            class: class.to_string(),
            return_ty: method.return_ty.0.clone(),
            name,
            params,
        }];

        let mut lowering = FunctionLowering {
            generator: self,
            table,
        };
        for stmt in &method.body.stmts {
            code.extend(lowering.lower_stmt(stmt));
        }
        code.push(Instr::FunctionEnd);

        let table = lowering.table;
        tracing::trace!(
            function = table.function(),
            instructions = code.len(),
            symbols = table.len(),
            "lowered method to IR3"
        );
        (code, table)
    }
}

struct FunctionLowering<'g> {
    generator: &'g mut Generator,
    table: SymbolTableBuilder,
}

impl FunctionLowering<'_> {
    fn label(&mut self) -> LabelId {
        self.generator.labels.next()
    }

    fn temp(&mut self, ty: &Type) -> String {
        let name = self.generator.temps.next().to_string();
        self.table.add_local(name.clone(), ty.clone());
        name
    }

    fn lower_block(&mut self, block: &ast::Block) -> Vec<Instr> {
        block
            .stmts
            .iter()
            .flat_map(|stmt| self.lower_stmt(stmt))
            .collect()
    }

    fn lower_stmt(&mut self, stmt: &ast::Stmt) -> Vec<Instr> {
        match &stmt.kind {
            StmtKind::Assign { target, value } => {
                let mut code = self.lower_expr(value);
                let value = result_of(&code).to_string();
                match &target.kind {
                    ExprKind::Var(name) => code.push(Instr::Assign {
                        dest: name.clone(),
                        src: value,
                    }),
                    ExprKind::Field { object, field } => {
                        let object = match &object.kind {
                            ExprKind::Var(name) => name.clone(),
                            ExprKind::This => "this".to_string(),
                            _ => {
                                let receiver = self.lower_expr(object);
                                let object = result_of(&receiver).to_string();
                                code.extend(receiver);
                                object
                            }
                        };
                        code.push(Instr::StoreField {
                            object,
                            field: field.0.clone(),
                            value,
                        });
                    }
                    _ => panic!("assignment target at {} is not assignable", target.span),
                }
                code
            }
            StmtKind::Return(None) => vec![Instr::Return(None)],
            StmtKind::Return(Some(value)) => {
                let mut code = self.lower_expr(value);
                let result = match value.resolved_ty() {
                    Type::Void => None,
                    _ => Some(result_of(&code).to_string()),
                };
                code.push(Instr::Return(result));
                code
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let mut code = self.lower_expr(cond);
                let cond = result_of(&code).to_string();
                let then_code = self.lower_block(then_branch);
                let else_code = self.lower_block(else_branch);
                let success = self.label();
                let end = self.label();

                code.push(Instr::Goto {
                    label: success,
                    cond: Some(cond),
                });
                code.extend(else_code);
                code.push(Instr::Goto {
                    label: end,
                    cond: None,
                });
                code.push(Instr::Label(success));
                code.extend(then_code);
                code.push(Instr::Label(end));
                code
            }
            StmtKind::While { cond, body } => {
                let cond_code = self.lower_expr(cond);
                let cond = result_of(&cond_code).to_string();
                let body_code = self.lower_block(body);
                let start = self.label();
                let success = self.label();
                let end = self.label();

                let mut code = vec![Instr::Label(start)];
                code.extend(cond_code);
                code.push(Instr::Goto {
                    label: success,
                    cond: Some(cond),
                });
                code.push(Instr::Goto {
                    label: end,
                    cond: None,
                });
                code.push(Instr::Label(success));
                code.extend(body_code);
                code.push(Instr::Goto {
                    label: start,
                    cond: None,
                });
                code.push(Instr::Label(end));
                code
            }
            StmtKind::Print(value) => {
                let mut code = self.lower_expr(value);
                let value = result_of(&code).to_string();
                code.push(Instr::Print { value });
                code
            }
            StmtKind::Read(target) => vec![Instr::Read {
                target: target.0.clone(),
            }],
            StmtKind::Call(call) => self.lower_expr(call),
        }
    }

    fn lower_expr(&mut self, expr: &ast::Expr) -> Vec<Instr> {
        let ty = expr.resolved_ty();
        match &expr.kind {
            ExprKind::Literal(Literal::Int(value)) => vec![Instr::Int {
                dest: self.temp(ty),
                value: *value,
            }],
            ExprKind::Literal(Literal::Bool(value)) => vec![Instr::Bool {
                dest: self.temp(ty),
                value: *value,
            }],
            ExprKind::Literal(Literal::String(value)) => vec![Instr::Str {
                dest: self.temp(ty),
                value: value.clone(),
            }],
            ExprKind::Var(name) => vec![Instr::Assign {
                dest: self.temp(ty),
                src: name.clone(),
            }],
            ExprKind::This => vec![Instr::Assign {
                dest: self.temp(ty),
                src: "this".to_string(),
            }],
            // A null reference is the address zero.
            ExprKind::Null => vec![Instr::Int {
                dest: self.temp(ty),
                value: 0,
            }],
            ExprKind::New(class) => vec![Instr::New {
                dest: self.temp(ty),
                class: class.0.clone(),
            }],
            ExprKind::Unary { op, operand } => {
                let mut code = self.lower_expr(operand);
                let operand = result_of(&code).to_string();
                code.push(Instr::Unary {
                    dest: self.temp(ty),
                    op: *op,
                    operand,
                });
                code
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let mut code = self.lower_expr(lhs);
                let lhs = result_of(&code).to_string();
                let rhs_code = self.lower_expr(rhs);
                let rhs = result_of(&rhs_code).to_string();
                code.extend(rhs_code);
                code.push(Instr::Binary {
                    dest: self.temp(ty),
                    op: *op,
                    lhs,
                    rhs,
                });
                code
            }
            ExprKind::Field { object, field } => {
                let mut code = self.lower_expr(object);
                let object = result_of(&code).to_string();
                code.push(Instr::LoadField {
                    dest: self.temp(ty),
                    object,
                    field: field.0.clone(),
                });
                code
            }
            ExprKind::Call {
                callee,
                args,
                method,
            } => {
                let (Some(method), ExprKind::Field { object, .. }) = (method, &callee.kind) else {
                    panic!("call at {} was not resolved", expr.span);
                };

                let mut code = self.lower_expr(object);
                let mut names = vec![result_of(&code).to_string()];
                for arg in args {
                    let arg_code = self.lower_expr(arg);
                    names.push(result_of(&arg_code).to_string());
                    code.extend(arg_code);
                }
                code.push(Instr::Call {
                    dest: self.temp(ty),
                    function: method.function_name(),
                    args: names,
                });
                code
            }
        }
    }
}
