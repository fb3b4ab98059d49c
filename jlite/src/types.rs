use crate::ast::{self, Ast, BinaryOp, ExprKind, Literal, StmtKind, UnaryOp};
use crate::descriptors::{function_name, ClassDescriptor, Descriptors};
use crate::env::LocalEnvironment;
use crate::error::{TypeError, TypeErrorKind};
use crate::tables::MAX_ARGUMENTS;
use crate::ty::Type;

type TypeResult<T> = Result<T, TypeError>;

/// Checks every method of every class and records the resolved type on each
/// expression node, and the matched method on each call node.
///
/// Stops at the first error.
pub fn check_types(program: &mut ast::Program, descriptors: &Descriptors) -> TypeResult<()> {
    let checker = Checker { descriptors };
    for class in &mut program.classes {
        checker.check_class(class)?;
    }
    tracing::debug!(classes = program.classes.len(), "type checked program");
    Ok(())
}

struct Checker<'d> {
    descriptors: &'d Descriptors,
}

fn error<T>(kind: TypeErrorKind, span: crate::span::Span) -> TypeResult<T> {
    Err(TypeError::new(kind, span))
}

impl<'d> Checker<'d> {
    fn ensure_known(&self, ty: &Ast<Type>) -> TypeResult<()> {
        if self.descriptors.is_known(&ty.0) {
            Ok(())
        } else {
            error(
                TypeErrorKind::UnknownType {
                    name: ty.0.to_string(),
                },
                ty.1,
            )
        }
    }

    /// Fields, parameters and locals need a storable type; Void is only a
    /// return type.
    fn ensure_storable(&self, var: &ast::VarDecl) -> TypeResult<()> {
        self.ensure_known(&var.ty)?;
        if var.ty.0 == Type::Void {
            return error(
                TypeErrorKind::VoidVariable {
                    name: var.ident.0.clone(),
                },
                var.ty.1,
            );
        }
        Ok(())
    }

    fn check_class(&self, class: &mut ast::Class) -> TypeResult<()> {
        for field in &class.fields {
            self.ensure_storable(field)?;
        }

        let env = LocalEnvironment::new(&class.ident.0);
        for method in &mut class.methods {
            self.check_method(&env, method)?;
        }
        Ok(())
    }

    fn check_method(&self, env: &LocalEnvironment, method: &mut ast::Method) -> TypeResult<()> {
        self.ensure_known(&method.return_ty)?;

        // The receiver occupies the first argument register.
        let count = method.params.len() + 1;
        if count > MAX_ARGUMENTS {
            return error(
                TypeErrorKind::TooManyParameters {
                    method: function_name(&env.class, &method.ident.0),
                    count,
                },
                method.ident.1,
            );
        }

        let mut env = env.method_scope(&method.ident.0, &method.return_ty.0);
        for param in &method.params {
            self.ensure_storable(param)?;
            env.extend(&param.ident.0, param.ty.0.clone());
        }

        self.check_block(&env, &mut method.body)
    }

    fn check_block(&self, env: &LocalEnvironment, block: &mut ast::Block) -> TypeResult<()> {
        let mut env = env.scope();
        for var in &block.vars {
            self.ensure_storable(var)?;
            env.extend(&var.ident.0, var.ty.0.clone());
        }

        for stmt in &mut block.stmts {
            self.check_stmt(&env, stmt)?;
        }
        Ok(())
    }

    fn check_stmt(&self, env: &LocalEnvironment, stmt: &mut ast::Stmt) -> TypeResult<()> {
        let span = stmt.span;
        match &mut stmt.kind {
            StmtKind::Assign { target, value } => {
                if !matches!(target.kind, ExprKind::Var(_) | ExprKind::Field { .. }) {
                    return error(TypeErrorKind::NotAssignable, target.span);
                }
                let target_ty = self.check_expr(env, target)?;
                self.check_against(env, value, &target_ty, |found| {
                    TypeErrorKind::AssignMismatch {
                        target: target_ty.clone(),
                        value: found,
                    }
                })
            }
            StmtKind::Return(Some(value)) => {
                self.check_against(env, value, &env.return_ty, |found| {
                    TypeErrorKind::ReturnMismatch {
                        class: env.class.clone(),
                        method: env.method.clone(),
                        expected: env.return_ty.clone(),
                        found,
                    }
                })
            }
            StmtKind::Return(None) => {
                if env.return_ty == Type::Void {
                    Ok(())
                } else {
                    error(
                        TypeErrorKind::ReturnMismatch {
                            class: env.class.clone(),
                            method: env.method.clone(),
                            expected: env.return_ty.clone(),
                            found: Type::Void,
                        },
                        span,
                    )
                }
            }
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.check_condition(env, cond, "if")?;
                self.check_block(env, then_branch)?;
                self.check_block(env, else_branch)
            }
            StmtKind::While { cond, body } => {
                self.check_condition(env, cond, "while")?;
                self.check_block(env, body)
            }
            StmtKind::Print(value) => match self.check_expr(env, value)? {
                Type::Int | Type::Bool | Type::String => Ok(()),
                found => error(TypeErrorKind::UnsupportedPrint { found }, value.span),
            },
            StmtKind::Read(Ast(name, span)) => match env.get(name) {
                Some(Type::Int | Type::Bool | Type::String) => Ok(()),
                Some(found) => error(
                    TypeErrorKind::UnsupportedRead {
                        found: found.clone(),
                    },
                    *span,
                ),
                None => error(
                    TypeErrorKind::UndefinedVariable { name: name.clone() },
                    *span,
                ),
            },
            StmtKind::Call(call) => self.check_expr(env, call).map(|_| ()),
        }
    }

    fn check_condition(
        &self,
        env: &LocalEnvironment,
        cond: &mut ast::Expr,
        construct: &'static str,
    ) -> TypeResult<()> {
        self.check_against(env, cond, &Type::Bool, |found| {
            TypeErrorKind::ConditionNotBool { construct, found }
        })
    }

    /// Checks `expr` where a value of type `expected` is required. `null` is
    /// accepted for any reference type and takes that type.
    fn check_against(
        &self,
        env: &LocalEnvironment,
        expr: &mut ast::Expr,
        expected: &Type,
        mismatch: impl FnOnce(Type) -> TypeErrorKind,
    ) -> TypeResult<()> {
        if let ExprKind::Null = expr.kind {
            return match expected {
                Type::Reference(_) => {
                    expr.ty = Some(expected.clone());
                    Ok(())
                }
                _ => error(
                    TypeErrorKind::MisplacedNull {
                        expected: expected.to_string(),
                    },
                    expr.span,
                ),
            };
        }

        let found = self.check_expr(env, expr)?;
        if found == *expected {
            Ok(())
        } else {
            error(mismatch(found), expr.span)
        }
    }

    fn check_operand(
        &self,
        env: &LocalEnvironment,
        operand: &mut ast::Expr,
        op: &'static str,
        expected: &Type,
    ) -> TypeResult<()> {
        self.check_against(env, operand, expected, |found| {
            TypeErrorKind::OperandMismatch {
                op,
                expected: expected.clone(),
                found,
            }
        })
    }

    /// Checks the receiver of a member access and returns its class.
    fn receiver_class(
        &self,
        env: &LocalEnvironment,
        object: &mut ast::Expr,
        member: &str,
    ) -> TypeResult<&'d ClassDescriptor> {
        let descriptors: &'d Descriptors = self.descriptors;
        match self.check_expr(env, object)? {
            Type::Reference(name) => match descriptors.class(&name) {
                Some(class) => Ok(class),
                None => error(TypeErrorKind::UnknownType { name }, object.span),
            },
            ty => error(
                TypeErrorKind::PrimitiveMemberAccess {
                    ty,
                    member: member.to_string(),
                },
                object.span,
            ),
        }
    }

    fn check_expr(&self, env: &LocalEnvironment, expr: &mut ast::Expr) -> TypeResult<Type> {
        let span = expr.span;
        let ty = match &mut expr.kind {
            ExprKind::Literal(Literal::Int(_)) => Type::Int,
            ExprKind::Literal(Literal::Bool(_)) => Type::Bool,
            ExprKind::Literal(Literal::String(_)) => Type::String,
            ExprKind::Var(name) => match env.get(name) {
                Some(ty) => ty.clone(),
                None => {
                    return error(
                        TypeErrorKind::UndefinedVariable { name: name.clone() },
                        span,
                    )
                }
            },
            ExprKind::This => Type::Reference(env.class.clone()),
            ExprKind::Null => {
                return error(
                    TypeErrorKind::MisplacedNull {
                        expected: "a value without a reference type".to_string(),
                    },
                    span,
                )
            }
            ExprKind::New(Ast(class, class_span)) => {
                if !self.descriptors.contains(class) {
                    return error(
                        TypeErrorKind::UnknownType {
                            name: class.clone(),
                        },
                        *class_span,
                    );
                }
                Type::Reference(class.clone())
            }
            ExprKind::Unary { op, operand } => {
                let (operand_ty, result) = match op {
                    UnaryOp::Neg => (Type::Int, Type::Int),
                    UnaryOp::Not => (Type::Bool, Type::Bool),
                };
                self.check_operand(env, operand, op.symbol(), &operand_ty)?;
                result
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let (operand_ty, result) = match op {
                    BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div => {
                        (Type::Int, Type::Int)
                    }
                    BinaryOp::Lt
                    | BinaryOp::Gt
                    | BinaryOp::Le
                    | BinaryOp::Ge
                    | BinaryOp::Eq
                    | BinaryOp::Ne => (Type::Int, Type::Bool),
                    BinaryOp::And | BinaryOp::Or => (Type::Bool, Type::Bool),
                };
                self.check_operand(env, lhs, op.symbol(), &operand_ty)?;
                self.check_operand(env, rhs, op.symbol(), &operand_ty)?;
                result
            }
            ExprKind::Field { object, field } => {
                let class = self.receiver_class(env, object, &field.0)?;
                if let Some(ty) = class.field(&field.0) {
                    ty.clone()
                } else if class.method(&field.0).is_some() {
                    return error(
                        TypeErrorKind::MethodAsValue {
                            class: class.name.clone(),
                            method: field.0.clone(),
                        },
                        field.1,
                    );
                } else {
                    return error(
                        TypeErrorKind::UnknownMember {
                            class: class.name.clone(),
                            member: field.0.clone(),
                        },
                        field.1,
                    );
                }
            }
            ExprKind::Call {
                callee,
                args,
                method,
            } => {
                let callee_span = callee.span;
                let ExprKind::Field { object, field } = &mut callee.kind else {
                    return error(TypeErrorKind::NotCallable, callee_span);
                };

                let class = self.receiver_class(env, object, &field.0)?;
                let descriptor = match class.method(&field.0) {
                    Some(descriptor) => descriptor,
                    None if class.field(&field.0).is_some() => {
                        return error(TypeErrorKind::NotCallable, callee_span)
                    }
                    None => {
                        return error(
                            TypeErrorKind::UnknownMember {
                                class: class.name.clone(),
                                member: field.0.clone(),
                            },
                            field.1,
                        )
                    }
                };

                if args.len() != descriptor.params.len() {
                    return error(
                        TypeErrorKind::ArityMismatch {
                            method: format!("{}.{}", descriptor.class, descriptor.name),
                            expected: descriptor.params.len(),
                            found: args.len(),
                        },
                        span,
                    );
                }

                for (arg, (param, param_ty)) in args.iter_mut().zip(&descriptor.params) {
                    self.check_against(env, arg, param_ty, |found| {
                        TypeErrorKind::ArgumentMismatch {
                            method: format!("{}.{}", descriptor.class, descriptor.name),
                            param: param.clone(),
                            expected: param_ty.clone(),
                            found,
                        }
                    })?;
                }

                *method = Some(descriptor.clone());
                descriptor.return_ty.clone()
            }
        };

        expr.ty = Some(ty.clone());
        Ok(ty)
    }
}
