use logos::Logos;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\f]+")]
#[logos(skip r"#[^\r\n]*")]
#[logos(skip r"\\\r?\n")]
pub enum Token {
    #[regex(r"\r?\n")]
    Newline,

    #[regex(r"[A-Za-z_][A-Za-z0-9_]*")]
    Name,
    #[regex(r"[0-9][0-9_]*")]
    Int,
    #[regex(r"0[xX][0-9a-fA-F][0-9a-fA-F_]*")]
    HexInt,
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+")]
    Float,
    #[regex(r"[0-9][0-9_]*[jJ]")]
    #[regex(r"[0-9][0-9_]*\.[0-9_]*([eE][+-]?[0-9]+)?[jJ]")]
    #[regex(r"\.[0-9][0-9_]*([eE][+-]?[0-9]+)?[jJ]")]
    #[regex(r"[0-9][0-9_]*[eE][+-]?[0-9]+[jJ]")]
    Imaginary,
    #[regex(r#"[rRbBuU]?'([^'\\\r\n]|\\.)*'"#)]
    #[regex(r#"[rRbBuU]?"([^"\\\r\n]|\\.)*""#)]
    Str,

    #[token("**=")]
    PowAssign,
    #[token("//=")]
    FloorDivAssign,
    #[token("+=")]
    PlusAssign,
    #[token("-=")]
    MinusAssign,
    #[token("*=")]
    StarAssign,
    #[token("/=")]
    SlashAssign,
    #[token("%=")]
    PercentAssign,
    #[token("@=")]
    AtAssign,
    #[token("**")]
    DoubleStar,
    #[token("//")]
    DoubleSlash,
    #[token("==")]
    Equal,
    #[token("!=")]
    NotEqual,
    #[token("<=")]
    LessEqual,
    #[token(">=")]
    GreaterEqual,
    #[token("<<")]
    ShiftLeft,
    #[token(">>")]
    ShiftRight,
    #[token("->")]
    Arrow,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("@")]
    At,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("=")]
    Assign,
    #[token("~")]
    Tilde,
    #[token("&")]
    Amp,
    #[token("|")]
    Pipe,
    #[token("^")]
    Caret,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token(";")]
    Semicolon,
    #[token(".")]
    Dot,

    /// Synthesized: a logical line that starts after leading whitespace.
    Indent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub lexeme: String,
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexError {
    pub lexeme: String,
    pub start: usize,
}

/// Tokenizes `input` into logical lines. Newlines inside brackets are
/// dropped, consecutive newlines collapse, and a line whose first token is
/// not at column zero is preceded by [`Token::Indent`].
pub fn tokenize(input: &str) -> Result<Vec<SpannedToken>, LexError> {
    let mut lex = Token::lexer(input);
    let mut out: Vec<SpannedToken> = Vec::new();
    let mut depth = 0usize;
    let mut at_line_start = true;
    let mut line_start = 0usize;

    while let Some(result) = lex.next() {
        let span = lex.span();
        let Ok(token) = result else {
            return Err(LexError {
                lexeme: lex.slice().to_string(),
                start: span.start,
            });
        };

        if token == Token::Newline {
            if depth == 0 && out.last().is_some_and(|last| last.token != Token::Newline) {
                out.push(SpannedToken {
                    token,
                    lexeme: String::new(),
                    start: span.start,
                    end: span.end,
                });
            }
            if depth == 0 {
                at_line_start = true;
            }
            line_start = span.end;
            continue;
        }

        if at_line_start {
            at_line_start = false;
            if span.start > line_start {
                out.push(SpannedToken {
                    token: Token::Indent,
                    lexeme: input[line_start..span.start].to_string(),
                    start: line_start,
                    end: span.start,
                });
            }
        }

        match token {
            Token::LParen | Token::LBracket | Token::LBrace => depth += 1,
            Token::RParen | Token::RBracket | Token::RBrace => depth = depth.saturating_sub(1),
            _ => {}
        }
        out.push(SpannedToken {
            token,
            lexeme: lex.slice().to_string(),
            start: span.start,
            end: span.end,
        });
    }
    Ok(out)
}

/// One-based line number of a byte offset.
#[must_use]
pub fn line_of(input: &str, offset: usize) -> usize {
    let end = offset.min(input.len());
    input.as_bytes()[..end].iter().filter(|b| **b == b'\n').count() + 1
}
