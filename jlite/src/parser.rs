use crate::ast::*;
use crate::lexer::*;
use crate::span::Span;
use crate::ty::Type;

type ParsingResult<T> = Result<T, ParsingError>;

macro_rules! eat {
    ($lex:expr, $pattern:pat) => {
        eat!($lex, $pattern, span => Ast((), span))
    };

    ($lex:expr, $($pattern:pat, $span:ident => $result:expr),+) => {
        match $lex.next() {
            $(Some((Ok($pattern), span)) => {
                let $span: crate::span::Span = span.into();
                Ok($result)
            },)+
            #[allow(unreachable_patterns)]
            Some((Ok(..), span)) => Err(ParsingError::UnexpectedToken(
                format!("expected {:?}", [$(stringify!($pattern)),+]),
                span.into()
            )),
            Some((Err(..), span)) => Err(ParsingError::UnknownToken(
                format!("expected {:?}", [$(stringify!($pattern),)+]),
                span.into()
            )),
            None => Err(ParsingError::UnexpectedEof),
        }
    };
}

macro_rules! maybe_eat {
    ($lex:expr, $($pattern:pat, $span:ident => $result:expr),+ $(,)?) => {
        match $lex.peek() {
            $(
                #[allow(unused_variables)]
                Some((Ok($pattern), _)) => {
                    match $lex.next() {
                        Some((Ok($pattern), span)) => {
                            let $span: crate::span::Span = span.into();
                            Ok(Some($result))
                        }
                        _ => unreachable!(),
                    }
                }
            )+
            Some((Ok(..), _)) => Ok(None),
            Some((Err(..), span)) => Err(ParsingError::UnknownToken(
                format!("expected {:?}", [$(stringify!($pattern),)+]),
                span.clone().into()
            )),
            None => Ok(None),
        }
    };
}

macro_rules! peek {
    ($lex:expr, $pattern:pat) => {
        peek_nth!($lex, 0, $pattern)
    };
}

macro_rules! peek_nth {
    ($lex:expr, $n:expr, $pattern:pat) => {
        match $lex.peek_nth($n) {
            Some((Ok($pattern), _)) => Ok(true),
            Some((Ok(..), _)) => Ok(false),
            Some((Err(..), span)) => Err(ParsingError::UnknownToken(
                format!("expected {:?}", stringify!($pattern)),
                span.clone().into(),
            )),
            None => Err(ParsingError::UnexpectedEof),
        }
    };
}

pub fn parse_program(lex: &mut Lex) -> ParsingResult<Program> {
    let mut classes = Vec::new();

    while lex.peek().is_some() {
        if peek!(lex, Token::Class)? {
            classes.push(parse_class(lex)?);
        } else {
            let span = eat!(lex, _)?.1;
            return Err(ParsingError::UnexpectedToken(
                "expected class declaration".to_string(),
                span,
            ));
        }
    }

    if classes.is_empty() {
        return Err(ParsingError::UnexpectedEof);
    }

    Ok(Program { classes })
}

fn parse_ident(lex: &mut Lex) -> ParsingResult<Ast<String>> {
    eat!(lex, Token::Ident(s), span => Ast(s.to_string(), span))
}

fn parse_type(lex: &mut Lex) -> ParsingResult<Ast<Type>> {
    eat!(lex, Token::Ident(s), span => Ast(Type::from_name(s), span))
}

fn parse_var_decl(lex: &mut Lex) -> ParsingResult<VarDecl> {
    let ty = parse_type(lex)?;
    let ident = parse_ident(lex)?;
    Ok(VarDecl { ty, ident })
}

/// `Type name ;` ahead, as opposed to a method header or a statement.
fn at_var_decl(lex: &mut Lex) -> ParsingResult<bool> {
    Ok(peek!(lex, Token::Ident(_))?
        && peek_nth!(lex, 1, Token::Ident(_))?
        && peek_nth!(lex, 2, Token::Semi)?)
}

fn parse_class(lex: &mut Lex) -> ParsingResult<Class> {
    eat!(lex, Token::Class)?;
    let ident = parse_ident(lex)?;
    eat!(lex, Token::LBrace)?;

    let mut fields = Vec::new();
    while at_var_decl(lex)? {
        fields.push(parse_var_decl(lex)?);
        eat!(lex, Token::Semi)?;
    }

    let mut methods = Vec::new();
    while !peek!(lex, Token::RBrace)? {
        methods.push(parse_method(lex)?);
    }
    eat!(lex, Token::RBrace)?;

    Ok(Class {
        ident,
        fields,
        methods,
    })
}

fn parse_method(lex: &mut Lex) -> ParsingResult<Method> {
    let return_ty = parse_type(lex)?;
    let ident = parse_ident(lex)?;

    let mut params = Vec::new();
    eat!(lex, Token::LParen)?;
    while !peek!(lex, Token::RParen)? {
        params.push(parse_var_decl(lex)?);
        if peek!(lex, Token::RParen)? {
            break;
        }
        eat!(lex, Token::Comma)?;
    }
    eat!(lex, Token::RParen)?;

    eat!(lex, Token::LBrace)?;
    let mut vars = Vec::new();
    while at_var_decl(lex)? {
        vars.push(parse_var_decl(lex)?);
        eat!(lex, Token::Semi)?;
    }
    let stmts = parse_stmts(lex)?;
    eat!(lex, Token::RBrace)?;

    Ok(Method {
        return_ty,
        ident,
        params,
        body: Block { vars, stmts },
    })
}

fn parse_block(lex: &mut Lex) -> ParsingResult<Block> {
    eat!(lex, Token::LBrace)?;
    let stmts = parse_stmts(lex)?;
    eat!(lex, Token::RBrace)?;
    Ok(Block {
        vars: Vec::new(),
        stmts,
    })
}

fn parse_stmts(lex: &mut Lex) -> ParsingResult<Vec<Stmt>> {
    let mut stmts = Vec::new();
    while !peek!(lex, Token::RBrace)? {
        stmts.push(parse_stmt(lex)?);
    }
    Ok(stmts)
}

fn parse_parenthesized(lex: &mut Lex) -> ParsingResult<Expr> {
    eat!(lex, Token::LParen)?;
    let expr = parse_expression(lex)?;
    eat!(lex, Token::RParen)?;
    Ok(expr)
}

fn parse_stmt(lex: &mut Lex) -> ParsingResult<Stmt> {
    let stmt = maybe_eat!(lex,
        Token::If, start => {
            let cond = parse_parenthesized(lex)?;
            let then_branch = parse_block(lex)?;
            let else_branch = if maybe_eat!(lex, Token::Else, _span => ())?.is_some() {
                parse_block(lex)?
            } else {
                Block::default()
            };
            Stmt {
                kind: StmtKind::If { cond, then_branch, else_branch },
                span: start,
            }
        },
        Token::While, start => {
            let cond = parse_parenthesized(lex)?;
            let body = parse_block(lex)?;
            Stmt {
                kind: StmtKind::While { cond, body },
                span: start,
            }
        },
        Token::Readln, start => {
            eat!(lex, Token::LParen)?;
            let target = parse_ident(lex)?;
            eat!(lex, Token::RParen)?;
            let end = eat!(lex, Token::Semi)?.1;
            Stmt {
                kind: StmtKind::Read(target),
                span: start.merge(end),
            }
        },
        Token::Println, start => {
            let value = parse_parenthesized(lex)?;
            let end = eat!(lex, Token::Semi)?.1;
            Stmt {
                kind: StmtKind::Print(value),
                span: start.merge(end),
            }
        },
        Token::Return, start => {
            let value = if peek!(lex, Token::Semi)? {
                None
            } else {
                Some(parse_expression(lex)?)
            };
            let end = eat!(lex, Token::Semi)?.1;
            Stmt {
                kind: StmtKind::Return(value),
                span: start.merge(end),
            }
        },
    )?;
    if let Some(stmt) = stmt {
        return Ok(stmt);
    }

    let target = parse_expression(lex)?;
    let start = target.span;
    if maybe_eat!(lex, Token::Assign, _span => ())?.is_some() {
        let value = parse_expression(lex)?;
        let end = eat!(lex, Token::Semi)?.1;
        return Ok(Stmt {
            kind: StmtKind::Assign { target, value },
            span: start.merge(end),
        });
    }

    let end = eat!(lex, Token::Semi)?.1;
    match target.kind {
        ExprKind::Call { .. } => Ok(Stmt {
            kind: StmtKind::Call(target),
            span: start.merge(end),
        }),
        _ => Err(ParsingError::UnexpectedToken(
            "expected assignment or call statement".to_string(),
            start,
        )),
    }
}

fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Expr {
    let span = lhs.span.merge(rhs.span);
    Expr::new(
        ExprKind::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        },
        span,
    )
}

fn parse_expression(lex: &mut Lex) -> ParsingResult<Expr> {
    let first = parse_unary(lex)?;
    let mut expr_stack: Vec<(Expr, Option<(BinaryOp, Precedence)>)> = vec![(first, None)];

    while let Some(op) = maybe_eat!(
        lex,
        Token::Plus, _span => BinaryOp::Add,
        Token::Minus, _span => BinaryOp::Sub,
        Token::Star, _span => BinaryOp::Mul,
        Token::Slash, _span => BinaryOp::Div,
        Token::Lt, _span => BinaryOp::Lt,
        Token::Gt, _span => BinaryOp::Gt,
        Token::Le, _span => BinaryOp::Le,
        Token::Ge, _span => BinaryOp::Ge,
        Token::EqEq, _span => BinaryOp::Eq,
        Token::NotEq, _span => BinaryOp::Ne,
        Token::AndAnd, _span => BinaryOp::And,
        Token::OrOr, _span => BinaryOp::Or,
    )? {
        let prec = op.precedence();
        let rhs = parse_unary(lex)?;
        while let Some((_, Some((_, p)))) = expr_stack.last() {
            if prec > *p {
                break;
            }

            let (prev_rhs, op_data) = expr_stack.pop().unwrap();
            let (prev_lhs, prev_op) = expr_stack.pop().unwrap();
            expr_stack.push((binary(op_data.unwrap().0, prev_lhs, prev_rhs), prev_op));
        }

        expr_stack.push((rhs, Some((op, prec))));
    }

    while let Some((_, Some(_))) = expr_stack.last() {
        let (prev_rhs, op_data) = expr_stack.pop().unwrap();
        let (prev_lhs, prev_op) = expr_stack.pop().unwrap();
        expr_stack.push((binary(op_data.unwrap().0, prev_lhs, prev_rhs), prev_op));
    }

    assert!(matches!(expr_stack[..], [(_, None)]));
    Ok(expr_stack.pop().unwrap().0)
}

fn parse_unary(lex: &mut Lex) -> ParsingResult<Expr> {
    let unary = maybe_eat!(lex,
        Token::Minus, start => (UnaryOp::Neg, start),
        Token::Bang, start => (UnaryOp::Not, start),
    )?;

    match unary {
        Some((op, start)) => {
            let operand = parse_unary(lex)?;
            let span = start.merge(operand.span);
            Ok(Expr::new(
                ExprKind::Unary {
                    op,
                    operand: Box::new(operand),
                },
                span,
            ))
        }
        None => parse_postfix(lex),
    }
}

fn parse_args(lex: &mut Lex) -> ParsingResult<(Vec<Expr>, Span)> {
    let mut args = Vec::new();
    eat!(lex, Token::LParen)?;
    while !peek!(lex, Token::RParen)? {
        args.push(parse_expression(lex)?);
        if peek!(lex, Token::RParen)? {
            break;
        }
        eat!(lex, Token::Comma)?;
    }
    let end = eat!(lex, Token::RParen)?.1;
    Ok((args, end))
}

fn call(callee: Expr, args: Vec<Expr>, end: Span) -> Expr {
    let span = callee.span.merge(end);
    Expr::new(
        ExprKind::Call {
            callee: Box::new(callee),
            args,
            method: None,
        },
        span,
    )
}

fn parse_postfix(lex: &mut Lex) -> ParsingResult<Expr> {
    let mut expr = parse_primary(lex)?;

    loop {
        if maybe_eat!(lex, Token::Dot, _span => ())?.is_some() {
            let field = parse_ident(lex)?;
            let span = expr.span.merge(field.1);
            expr = Expr::new(
                ExprKind::Field {
                    object: Box::new(expr),
                    field,
                },
                span,
            );
        } else if peek!(lex, Token::LParen)? {
            let (args, end) = parse_args(lex)?;
            expr = call(expr, args, end);
        } else {
            return Ok(expr);
        }
    }
}

fn parse_primary(lex: &mut Lex) -> ParsingResult<Expr> {
    let expr = maybe_eat!(lex,
        Token::Number(s), span => match s.parse() {
            Ok(n) => Expr::new(ExprKind::Literal(Literal::Int(n)), span),
            Err(_) => return Err(ParsingError::InvalidInteger(s.to_string(), span)),
        },
        Token::String(s), span => Expr::new(ExprKind::Literal(Literal::String(s.to_string())), span),
        Token::True, span => Expr::new(ExprKind::Literal(Literal::Bool(true)), span),
        Token::False, span => Expr::new(ExprKind::Literal(Literal::Bool(false)), span),
        Token::This, span => Expr::new(ExprKind::This, span),
        Token::Null, span => Expr::new(ExprKind::Null, span),
        Token::New, start => {
            let class = parse_ident(lex)?;
            eat!(lex, Token::LParen)?;
            let end = eat!(lex, Token::RParen)?.1;
            Expr::new(ExprKind::New(class), start.merge(end))
        },
        Token::Ident(s), span => {
            // A bare call `m(args)` is a call on `this`.
            if peek!(lex, Token::LParen)? {
                let field = Ast(s.to_string(), span);
                let callee = Expr::new(
                    ExprKind::Field {
                        object: Box::new(Expr::new(ExprKind::This, span)),
                        field,
                    },
                    span,
                );
                let (args, end) = parse_args(lex)?;
                call(callee, args, end)
            } else {
                Expr::new(ExprKind::Var(s.to_string()), span)
            }
        },
        Token::LParen, start => {
            let expr = parse_expression(lex)?;
            let end = eat!(lex, Token::RParen)?.1;
            Expr { span: start.merge(end), ..expr }
        },
    )?;

    match expr {
        Some(expr) => Ok(expr),
        None => match lex.peek() {
            Some(_) => {
                let span = eat!(lex, _)?.1;
                Err(ParsingError::UnexpectedToken(
                    "expected expression".to_string(),
                    span,
                ))
            }
            None => Err(ParsingError::UnexpectedEof),
        },
    }
}
