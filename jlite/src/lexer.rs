use logos::Logos;
use std::ops::Range;

#[derive(logos::Logos, Debug, Clone, PartialEq)]
#[logos(skip r"\s+|//[^\n]*|/\*([^*]|\*+[^*/])*\*+/")]
pub enum Token<'s> {
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(".")]
    Dot,
    #[token("=")]
    Assign,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token("<=")]
    Le,
    #[token(">=")]
    Ge,
    #[token("==")]
    EqEq,
    #[token("!=")]
    NotEq,
    #[token("!")]
    Bang,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("class")]
    Class,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("while")]
    While,
    #[token("return")]
    Return,
    #[token("readln")]
    Readln,
    #[token("println")]
    Println,
    #[token("new")]
    New,
    #[token("this")]
    This,
    #[token("null")]
    Null,
    #[token("true")]
    True,
    #[token("false")]
    False,
    #[regex(r"\d+")]
    Number(&'s str),
    /// Contents between the quotes, escapes left as written.
    #[regex(r#""(\\"|\\\\|\\n|\\t|\\r|[^"\\\n])*""#, |lex| {
        let s = lex.slice();
        &s[1..s.len()-1]
    })]
    String(&'s str),
    #[regex(r"[a-zA-Z][a-zA-Z0-9_]*")]
    Ident(&'s str),
}

pub type Spanned<'s> = (Result<Token<'s>, ()>, Range<usize>);

/// Token stream with arbitrary lookahead.
#[derive(Debug, Clone)]
pub struct Lex<'s> {
    tokens: Vec<Spanned<'s>>,
    position: usize,
}

impl<'s> Lex<'s> {
    pub fn peek(&self) -> Option<&Spanned<'s>> {
        self.peek_nth(0)
    }

    /// Looks `n` tokens past the next one.
    pub fn peek_nth(&self, n: usize) -> Option<&Spanned<'s>> {
        self.tokens.get(self.position + n)
    }
}

impl<'s> Iterator for Lex<'s> {
    type Item = Spanned<'s>;

    fn next(&mut self) -> Option<Self::Item> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }
}

pub fn lex(source: &str) -> Lex<'_> {
    Lex {
        tokens: Token::lexer(source).spanned().collect(),
        position: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(source: &str) -> Vec<Token> {
        lex(source).map(|(token, _)| token.unwrap()).collect()
    }

    #[test]
    fn keywords_win_over_identifiers() {
        assert_eq!(
            tokens("class classy this thisOne"),
            vec![
                Token::Class,
                Token::Ident("classy"),
                Token::This,
                Token::Ident("thisOne"),
            ]
        );
    }

    #[test]
    fn comments_are_skipped() {
        assert_eq!(
            tokens("a // b\n/* c\n * d */ <= e"),
            vec![Token::Ident("a"), Token::Le, Token::Ident("e")]
        );
    }

    #[test]
    fn strings_keep_their_escapes() {
        assert_eq!(tokens(r#""say \"hi\"\n""#), vec![Token::String(r#"say \"hi\"\n"#)]);
    }

    #[test]
    fn lookahead_does_not_consume() {
        let mut lex = lex("x y ;");
        assert_eq!(lex.peek_nth(2).map(|(t, _)| t.clone()), Some(Ok(Token::Semi)));
        assert_eq!(lex.next(), Some((Ok(Token::Ident("x")), 0..1)));
        assert_eq!(lex.peek().map(|(t, _)| t.clone()), Some(Ok(Token::Ident("y"))));
    }
}
