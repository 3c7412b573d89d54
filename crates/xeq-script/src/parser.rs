use crate::lexer::{SpannedToken, Token, line_of, tokenize};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    MatMul,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
}

impl BinOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::MatMul => "@",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Neg,
    Invert,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    NotEq,
    Lt,
    LtE,
    Gt,
    GtE,
    In,
    NotIn,
    Is,
    IsNot,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Subscript {
    Index(Expr),
    Slice {
        lower: Option<Expr>,
        upper: Option<Expr>,
        step: Option<Expr>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Float(f64),
    Imaginary(f64),
    Str(String),
    Bool(bool),
    None,
    Name(String),
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(Box<Expr>, BinOp, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Compare(Box<Expr>, Vec<(CmpOp, Expr)>),
    Conditional {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Attribute(Box<Expr>, String),
    Index(Box<Expr>, Vec<Subscript>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Name(String),
    Unpack(Vec<Target>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportName {
    pub path: Vec<String>,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Import(Vec<ImportName>),
    FromImport {
        module: Vec<String>,
        names: Vec<(String, Option<String>)>,
    },
    Assign {
        targets: Vec<Target>,
        value: Expr,
    },
    AugAssign {
        target: String,
        op: BinOp,
        value: Expr,
    },
    Expr(Expr),
    Pass,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    Syntax,
    Indentation,
    Unsupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub message: String,
    pub line: usize,
}

const KEYWORDS: &[&str] = &[
    "False", "None", "True", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global",
    "if", "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return",
    "try", "while", "with", "yield",
];

const COMPOUND_KEYWORDS: &[&str] = &[
    "if", "for", "while", "def", "class", "with", "try", "async", "elif", "else", "except",
    "finally",
];

const SIMPLE_UNSUPPORTED: &[&str] = &[
    "return", "break", "continue", "raise", "assert", "del", "global", "nonlocal", "yield",
    "await", "lambda",
];

pub fn parse_program(input: &str) -> Result<Vec<Stmt>, ParseError> {
    let mut parser = Parser::new(input)?;
    parser.program()
}

/// Parses `input` as a single expression (surrounding blank lines allowed).
pub fn parse_expression(input: &str) -> Result<Expr, ParseError> {
    let mut parser = Parser::new(input)?;
    parser.skip_newlines();
    parser.eat(Token::Indent);
    let expr = parser.expr_list()?;
    parser.skip_newlines();
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<SpannedToken>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, ParseError> {
        let tokens = tokenize(input).map_err(|err| ParseError {
            kind: ParseErrorKind::Syntax,
            message: format!("invalid character '{}'", err.lexeme),
            line: line_of(input, err.start),
        })?;
        Ok(Self {
            input,
            tokens,
            pos: 0,
        })
    }

    fn program(&mut self) -> Result<Vec<Stmt>, ParseError> {
        let mut body = Vec::new();
        loop {
            self.skip_newlines();
            if self.at_end() {
                return Ok(body);
            }
            body.push(self.statement()?);
            while self.eat(Token::Semicolon) {
                if self.at_line_end() {
                    break;
                }
                body.push(self.statement()?);
            }
            if !self.at_line_end() {
                return Err(self.error("invalid syntax"));
            }
        }
    }

    fn statement(&mut self) -> Result<Stmt, ParseError> {
        if self.peek() == Some(Token::Indent) {
            return Err(self.error_of(ParseErrorKind::Indentation, "unexpected indent"));
        }
        if let Some(word) = self.peek_keyword() {
            match word {
                "import" => return self.import(),
                "from" => return self.from_import(),
                "pass" => {
                    self.pos += 1;
                    return Ok(Stmt::Pass);
                }
                _ if COMPOUND_KEYWORDS.contains(&word) => {
                    return Err(self.unsupported(&format!("'{word}' blocks are not supported")));
                }
                _ if SIMPLE_UNSUPPORTED.contains(&word) => {
                    return Err(self.unsupported(&format!("'{word}' is not supported")));
                }
                _ => {}
            }
        }

        let first = self.expr_list()?;
        if let Some(op) = self.peek().and_then(augmented_op) {
            self.pos += 1;
            let Expr::Name(target) = first else {
                return Err(self.unsupported("augmented assignment needs a plain name"));
            };
            let value = self.expr_list()?;
            return Ok(Stmt::AugAssign { target, op, value });
        }
        if self.peek() == Some(Token::Colon) {
            return Err(self.unsupported("annotated assignments are not supported"));
        }
        if self.peek() != Some(Token::Assign) {
            return Ok(Stmt::Expr(first));
        }

        let mut chain = vec![first];
        while self.eat(Token::Assign) {
            chain.push(self.expr_list()?);
        }
        let value = chain.pop().unwrap_or(Expr::None);
        let targets = chain
            .into_iter()
            .map(|expr| self.target(expr))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Stmt::Assign { targets, value })
    }

    fn target(&self, expr: Expr) -> Result<Target, ParseError> {
        match expr {
            Expr::Name(name) => Ok(Target::Name(name)),
            Expr::Tuple(items) | Expr::List(items) => items
                .into_iter()
                .map(|item| self.target(item))
                .collect::<Result<Vec<_>, _>>()
                .map(Target::Unpack),
            Expr::Index(..) => Err(self.unsupported("item assignment is not supported")),
            Expr::Attribute(..) => Err(self.unsupported("attribute assignment is not supported")),
            _ => Err(self.error("cannot assign to expression")),
        }
    }

    fn import(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        let mut names = Vec::new();
        loop {
            let path = self.dotted_name()?;
            let alias = if self.eat_keyword("as") {
                Some(self.identifier()?)
            } else {
                None
            };
            names.push(ImportName { path, alias });
            if !self.eat(Token::Comma) {
                return Ok(Stmt::Import(names));
            }
        }
    }

    fn from_import(&mut self) -> Result<Stmt, ParseError> {
        self.pos += 1;
        if self.peek() == Some(Token::Dot) {
            return Err(self.unsupported("relative imports are not supported"));
        }
        let module = self.dotted_name()?;
        if !self.eat_keyword("import") {
            return Err(self.error("expected 'import'"));
        }
        if self.peek() == Some(Token::Star) {
            return Err(self.unsupported("wildcard imports are not supported"));
        }
        let parenthesized = self.eat(Token::LParen);
        let mut names = Vec::new();
        loop {
            let name = self.identifier()?;
            let alias = if self.eat_keyword("as") {
                Some(self.identifier()?)
            } else {
                None
            };
            names.push((name, alias));
            if !self.eat(Token::Comma) {
                break;
            }
            if parenthesized && self.peek() == Some(Token::RParen) {
                break;
            }
        }
        if parenthesized {
            self.expect(Token::RParen, "')'")?;
        }
        Ok(Stmt::FromImport { module, names })
    }

    fn dotted_name(&mut self) -> Result<Vec<String>, ParseError> {
        let mut path = vec![self.identifier()?];
        while self.eat(Token::Dot) {
            path.push(self.identifier()?);
        }
        Ok(path)
    }

    fn identifier(&mut self) -> Result<String, ParseError> {
        match self.tokens.get(self.pos) {
            Some(tok) if tok.token == Token::Name && !KEYWORDS.contains(&tok.lexeme.as_str()) => {
                let name = tok.lexeme.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("expected a name")),
        }
    }

    /// Comma-separated expressions; more than one (or a trailing comma)
    /// forms a tuple.
    fn expr_list(&mut self) -> Result<Expr, ParseError> {
        let first = self.expr()?;
        if self.peek() != Some(Token::Comma) {
            return Ok(first);
        }
        let mut items = vec![first];
        while self.eat(Token::Comma) {
            if !self.starts_expr() {
                break;
            }
            items.push(self.expr()?);
        }
        Ok(Expr::Tuple(items))
    }

    fn expr(&mut self) -> Result<Expr, ParseError> {
        if self.peek_keyword() == Some("lambda") {
            return Err(self.unsupported("lambda expressions are not supported"));
        }
        let body = self.or_test()?;
        if !self.eat_keyword("if") {
            return Ok(body);
        }
        let test = self.or_test()?;
        if !self.eat_keyword("else") {
            return Err(self.error("expected 'else' in conditional expression"));
        }
        let orelse = self.expr()?;
        Ok(Expr::Conditional {
            test: Box::new(test),
            body: Box::new(body),
            orelse: Box::new(orelse),
        })
    }

    fn or_test(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.and_test()?;
        while self.eat_keyword("or") {
            let rhs = self.and_test()?;
            lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and_test(&mut self) -> Result<Expr, ParseError> {
        let mut lhs = self.not_test()?;
        while self.eat_keyword("and") {
            let rhs = self.not_test()?;
            lhs = Expr::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn not_test(&mut self) -> Result<Expr, ParseError> {
        if self.eat_keyword("not") {
            let operand = self.not_test()?;
            return Ok(Expr::Unary(UnaryOp::Not, Box::new(operand)));
        }
        self.comparison()
    }

    fn comparison(&mut self) -> Result<Expr, ParseError> {
        let lhs = self.bit_or()?;
        let mut rest = Vec::new();
        while let Some(op) = self.comparison_op() {
            rest.push((op, self.bit_or()?));
        }
        if rest.is_empty() {
            Ok(lhs)
        } else {
            Ok(Expr::Compare(Box::new(lhs), rest))
        }
    }

    fn comparison_op(&mut self) -> Option<CmpOp> {
        let op = match self.peek()? {
            Token::Equal => CmpOp::Eq,
            Token::NotEqual => CmpOp::NotEq,
            Token::Less => CmpOp::Lt,
            Token::LessEqual => CmpOp::LtE,
            Token::Greater => CmpOp::Gt,
            Token::GreaterEqual => CmpOp::GtE,
            Token::Name => match self.peek_keyword()? {
                "in" => CmpOp::In,
                "is" => {
                    if self.keyword_at(1) == Some("not") {
                        self.pos += 2;
                        return Some(CmpOp::IsNot);
                    }
                    CmpOp::Is
                }
                "not" if self.keyword_at(1) == Some("in") => {
                    self.pos += 2;
                    return Some(CmpOp::NotIn);
                }
                _ => return None,
            },
            _ => return None,
        };
        self.pos += 1;
        Some(op)
    }

    fn bit_or(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(Token::Pipe, BinOp::BitOr)], Self::bit_xor)
    }

    fn bit_xor(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(Token::Caret, BinOp::BitXor)], Self::bit_and)
    }

    fn bit_and(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(&[(Token::Amp, BinOp::BitAnd)], Self::shift)
    }

    fn shift(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[(Token::ShiftLeft, BinOp::Shl), (Token::ShiftRight, BinOp::Shr)],
            Self::arith,
        )
    }

    fn arith(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[(Token::Plus, BinOp::Add), (Token::Minus, BinOp::Sub)],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr, ParseError> {
        self.binary_level(
            &[
                (Token::Star, BinOp::Mul),
                (Token::Slash, BinOp::Div),
                (Token::DoubleSlash, BinOp::FloorDiv),
                (Token::Percent, BinOp::Mod),
                (Token::At, BinOp::MatMul),
            ],
            Self::factor,
        )
    }

    fn binary_level(
        &mut self,
        ops: &[(Token, BinOp)],
        next: fn(&mut Self) -> Result<Expr, ParseError>,
    ) -> Result<Expr, ParseError> {
        let mut lhs = next(self)?;
        while let Some(op) = self
            .peek()
            .and_then(|tok| ops.iter().find(|(candidate, _)| *candidate == tok))
            .map(|(_, op)| *op)
        {
            self.pos += 1;
            let rhs = next(self)?;
            lhs = Expr::Binary(Box::new(lhs), op, Box::new(rhs));
        }
        Ok(lhs)
    }

    fn factor(&mut self) -> Result<Expr, ParseError> {
        let op = match self.peek() {
            Some(Token::Plus) => UnaryOp::Plus,
            Some(Token::Minus) => UnaryOp::Neg,
            Some(Token::Tilde) => UnaryOp::Invert,
            _ => return self.power(),
        };
        self.pos += 1;
        let operand = self.factor()?;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn power(&mut self) -> Result<Expr, ParseError> {
        let base = self.postfix()?;
        if self.eat(Token::DoubleStar) {
            let exponent = self.factor()?;
            return Ok(Expr::Binary(Box::new(base), BinOp::Pow, Box::new(exponent)));
        }
        Ok(base)
    }

    fn postfix(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.atom()?;
        loop {
            if self.eat(Token::LParen) {
                expr = self.call(expr)?;
            } else if self.eat(Token::LBracket) {
                let subscripts = self.subscripts()?;
                expr = Expr::Index(Box::new(expr), subscripts);
            } else if self.eat(Token::Dot) {
                let name = self.attribute_name()?;
                expr = Expr::Attribute(Box::new(expr), name);
            } else {
                return Ok(expr);
            }
        }
    }

    fn attribute_name(&mut self) -> Result<String, ParseError> {
        match self.tokens.get(self.pos) {
            Some(tok) if tok.token == Token::Name => {
                let name = tok.lexeme.clone();
                self.pos += 1;
                Ok(name)
            }
            _ => Err(self.error("expected attribute name")),
        }
    }

    fn call(&mut self, func: Expr) -> Result<Expr, ParseError> {
        let mut args = Vec::new();
        let mut kwargs: Vec<(String, Expr)> = Vec::new();
        while !self.eat(Token::RParen) {
            if matches!(self.peek(), Some(Token::Star | Token::DoubleStar)) {
                return Err(self.unsupported("argument unpacking is not supported"));
            }
            if self.peek() == Some(Token::Name) && self.peek_at(1) == Some(Token::Assign) {
                let name = self.identifier()?;
                self.pos += 1;
                if kwargs.iter().any(|(existing, _)| *existing == name) {
                    return Err(self.error(&format!("keyword argument repeated: {name}")));
                }
                kwargs.push((name, self.expr()?));
            } else {
                if !kwargs.is_empty() {
                    return Err(self.error("positional argument follows keyword argument"));
                }
                args.push(self.expr()?);
            }
            if self.peek_keyword() == Some("for") {
                return Err(self.unsupported("generator expressions are not supported"));
            }
            if !self.eat(Token::Comma) {
                self.expect(Token::RParen, "')'")?;
                break;
            }
        }
        Ok(Expr::Call {
            func: Box::new(func),
            args,
            kwargs,
        })
    }

    fn subscripts(&mut self) -> Result<Vec<Subscript>, ParseError> {
        let mut out = Vec::new();
        loop {
            out.push(self.subscript()?);
            if !self.eat(Token::Comma) || self.peek() == Some(Token::RBracket) {
                break;
            }
        }
        self.expect(Token::RBracket, "']'")?;
        Ok(out)
    }

    fn subscript(&mut self) -> Result<Subscript, ParseError> {
        let lower = if self.peek() == Some(Token::Colon) {
            None
        } else {
            let expr = self.expr()?;
            if self.peek() != Some(Token::Colon) {
                return Ok(Subscript::Index(expr));
            }
            Some(expr)
        };
        self.expect(Token::Colon, "':'")?;
        let upper = self.optional_slice_part()?;
        let step = if self.eat(Token::Colon) {
            self.optional_slice_part()?
        } else {
            None
        };
        Ok(Subscript::Slice { lower, upper, step })
    }

    fn optional_slice_part(&mut self) -> Result<Option<Expr>, ParseError> {
        if matches!(
            self.peek(),
            Some(Token::Colon | Token::Comma | Token::RBracket)
        ) {
            Ok(None)
        } else {
            self.expr().map(Some)
        }
    }

    fn atom(&mut self) -> Result<Expr, ParseError> {
        let Some(tok) = self.tokens.get(self.pos).cloned() else {
            return Err(self.error("unexpected end of input"));
        };
        match tok.token {
            Token::Int | Token::HexInt => {
                self.pos += 1;
                self.int_literal(&tok.lexeme)
            }
            Token::Float => {
                self.pos += 1;
                parse_float_lexeme(&tok.lexeme)
                    .map(Expr::Float)
                    .ok_or_else(|| self.error("invalid decimal literal"))
            }
            Token::Imaginary => {
                self.pos += 1;
                parse_float_lexeme(&tok.lexeme[..tok.lexeme.len() - 1])
                    .map(Expr::Imaginary)
                    .ok_or_else(|| self.error("invalid imaginary literal"))
            }
            Token::Str => {
                let mut text = String::new();
                while let Some(next) = self.tokens.get(self.pos) {
                    if next.token != Token::Str {
                        break;
                    }
                    text.push_str(&decode_string(&next.lexeme));
                    self.pos += 1;
                }
                Ok(Expr::Str(text))
            }
            Token::Name => self.name_atom(&tok.lexeme),
            Token::LParen => {
                self.pos += 1;
                if self.eat(Token::RParen) {
                    return Ok(Expr::Tuple(Vec::new()));
                }
                let inner = self.expr_list()?;
                if self.peek_keyword() == Some("for") {
                    return Err(self.unsupported("generator expressions are not supported"));
                }
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::LBracket => {
                self.pos += 1;
                let mut items = Vec::new();
                while !self.eat(Token::RBracket) {
                    items.push(self.expr()?);
                    if self.peek_keyword() == Some("for") {
                        return Err(self.unsupported("list comprehensions are not supported"));
                    }
                    if !self.eat(Token::Comma) {
                        self.expect(Token::RBracket, "']'")?;
                        break;
                    }
                }
                Ok(Expr::List(items))
            }
            Token::LBrace => Err(self.unsupported("dict and set literals are not supported")),
            Token::Indent => Err(self.error_of(ParseErrorKind::Indentation, "unexpected indent")),
            _ => Err(self.error("invalid syntax")),
        }
    }

    fn name_atom(&mut self, lexeme: &str) -> Result<Expr, ParseError> {
        let expr = match lexeme {
            "True" => Expr::Bool(true),
            "False" => Expr::Bool(false),
            "None" => Expr::None,
            "lambda" => return Err(self.unsupported("lambda expressions are not supported")),
            "await" | "yield" => {
                return Err(self.unsupported(&format!("'{lexeme}' is not supported")));
            }
            word if KEYWORDS.contains(&word) => return Err(self.error("invalid syntax")),
            name => Expr::Name(name.to_string()),
        };
        self.pos += 1;
        Ok(expr)
    }

    fn int_literal(&self, lexeme: &str) -> Result<Expr, ParseError> {
        let cleaned = lexeme.replace('_', "");
        let parsed = match cleaned.strip_prefix("0x").or_else(|| cleaned.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16).ok(),
            None => {
                let leading_zero = cleaned.len() > 1 && cleaned.starts_with('0');
                if leading_zero && cleaned.bytes().any(|b| b != b'0') {
                    return Err(self.error(
                        "leading zeros in decimal integer literals are not permitted",
                    ));
                }
                cleaned.parse::<i64>().ok()
            }
        };
        match parsed {
            Some(value) => Ok(Expr::Int(value)),
            None => cleaned
                .parse::<f64>()
                .map(Expr::Float)
                .map_err(|_| self.unsupported("integer literal is too large")),
        }
    }

    fn starts_expr(&self) -> bool {
        match self.tokens.get(self.pos) {
            None => false,
            Some(tok) => match tok.token {
                Token::Name => {
                    let word = tok.lexeme.as_str();
                    !KEYWORDS.contains(&word)
                        || matches!(word, "True" | "False" | "None" | "not" | "lambda")
                }
                Token::Int
                | Token::HexInt
                | Token::Float
                | Token::Imaginary
                | Token::Str
                | Token::LParen
                | Token::LBracket
                | Token::LBrace
                | Token::Plus
                | Token::Minus
                | Token::Tilde => true,
                _ => false,
            },
        }
    }

    fn skip_newlines(&mut self) {
        while matches!(self.peek(), Some(Token::Newline | Token::Semicolon)) {
            self.pos += 1;
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn at_line_end(&self) -> bool {
        matches!(self.peek(), None | Some(Token::Newline))
    }

    fn peek(&self) -> Option<Token> {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> Option<Token> {
        self.tokens.get(self.pos + offset).map(|tok| tok.token)
    }

    fn keyword_at(&self, offset: usize) -> Option<&str> {
        self.tokens
            .get(self.pos + offset)
            .filter(|tok| tok.token == Token::Name)
            .map(|tok| tok.lexeme.as_str())
            .filter(|word| KEYWORDS.contains(word))
    }

    fn peek_keyword(&self) -> Option<&str> {
        self.keyword_at(0)
    }

    fn eat(&mut self, token: Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.peek_keyword() == Some(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), ParseError> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected {what}")))
        }
    }

    fn current_line(&self) -> usize {
        let offset = self
            .tokens
            .get(self.pos)
            .map_or(self.input.len(), |tok| tok.start);
        line_of(self.input, offset)
    }

    fn error_of(&self, kind: ParseErrorKind, message: &str) -> ParseError {
        ParseError {
            kind,
            message: message.to_string(),
            line: self.current_line(),
        }
    }

    fn error(&self, message: &str) -> ParseError {
        self.error_of(ParseErrorKind::Syntax, message)
    }

    fn unsupported(&self, message: &str) -> ParseError {
        self.error_of(ParseErrorKind::Unsupported, message)
    }
}

fn augmented_op(token: Token) -> Option<BinOp> {
    Some(match token {
        Token::PlusAssign => BinOp::Add,
        Token::MinusAssign => BinOp::Sub,
        Token::StarAssign => BinOp::Mul,
        Token::SlashAssign => BinOp::Div,
        Token::FloorDivAssign => BinOp::FloorDiv,
        Token::PercentAssign => BinOp::Mod,
        Token::PowAssign => BinOp::Pow,
        Token::AtAssign => BinOp::MatMul,
        _ => return None,
    })
}

fn parse_float_lexeme(lexeme: &str) -> Option<f64> {
    lexeme.replace('_', "").parse::<f64>().ok()
}

/// Strips the optional prefix and quotes and resolves escapes; raw strings
/// keep backslashes.
fn decode_string(lexeme: &str) -> String {
    let raw = lexeme
        .chars()
        .next()
        .is_some_and(|ch| matches!(ch, 'r' | 'R'));
    let body_start = lexeme.find(['\'', '"']).map_or(0, |idx| idx + 1);
    let body = &lexeme[body_start..lexeme.len().saturating_sub(1).max(body_start)];
    if raw {
        return body.to_string();
    }

    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('0') => out.push('\0'),
            Some('\\') => out.push('\\'),
            Some('\'') => out.push('\''),
            Some('"') => out.push('"'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}
