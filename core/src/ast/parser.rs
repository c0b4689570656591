use std::rc::Rc;

use crate::ast::{BlockTemplate, MessagePart, Node, PseudoVar};
use crate::token::{Lexer, ParseError, Position, Tok, Token};
use crate::val::Val;

/// Recursive-descent parser over the token stream.
///
/// Precedence is the classic three levels: unary binds tightest, then
/// binary, then keyword. Cascades (`;`) resend to the receiver of the
/// preceding message. The top-level method-definition form
/// `Receiver >> pattern [ body ]` desugars to a `selector:put:` send
/// carrying a method block, so nothing downstream of the parser knows the
/// form exists.
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

/// A parsed operand, which may still be a bare `super` waiting to become
/// the receiver of a send.
enum Unit {
    Plain(Rc<Node>),
    Super { qualifier: Option<Rc<str>> },
}

impl Unit {
    fn into_node(self, at: Position) -> Result<Rc<Node>, ParseError> {
        match self {
            Unit::Plain(node) => Ok(node),
            Unit::Super { .. } => Err(ParseError::at(
                "'super' can only be the receiver of a message",
                at,
            )),
        }
    }
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    /// Lex and parse a whole source text into top-level statements.
    pub fn parse_source(src: &str) -> Result<Vec<Rc<Node>>, ParseError> {
        let tokens = Lexer::new(src).tokenize()?;
        Self::new(tokens).parse_program()
    }

    pub fn parse_program(mut self) -> Result<Vec<Rc<Node>>, ParseError> {
        let stmts = self.parse_statements_until(&Tok::Eof)?;
        self.expect(&Tok::Eof)?;
        Ok(stmts)
    }

    fn peek(&self) -> &Tok {
        self.tokens
            .get(self.pos)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn peek_at(&self, offset: usize) -> &Tok {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.tok)
            .unwrap_or(&Tok::Eof)
    }

    fn position(&self) -> Position {
        self.tokens
            .get(self.pos)
            .map(|t| t.span.start)
            .unwrap_or_else(Position::start)
    }

    fn bump(&mut self) -> Tok {
        let tok = self.peek().clone();
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == tok {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: &Tok) -> Result<(), ParseError> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(ParseError::at(
                format!("expected {:?}, found {:?}", tok, self.peek()),
                self.position(),
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<Rc<str>, ParseError> {
        match self.bump() {
            Tok::Id(name) => Ok(Rc::from(name.as_str())),
            other => Err(ParseError::at(
                format!("expected {}, found {:?}", what, other),
                self.position(),
            )),
        }
    }

    fn is_binsel(&self, sel: &str) -> bool {
        matches!(self.peek(), Tok::BinSel(s) if s == sel)
    }

    // ---- statements -----------------------------------------------------

    fn parse_statements_until(&mut self, end: &Tok) -> Result<Vec<Rc<Node>>, ParseError> {
        let mut stmts = Vec::new();
        while self.peek() != end {
            stmts.push(self.parse_statement()?);
            if !self.eat(&Tok::Dot) {
                break;
            }
        }
        Ok(stmts)
    }

    fn parse_statement(&mut self) -> Result<Rc<Node>, ParseError> {
        if self.eat(&Tok::Caret) {
            if matches!(self.peek(), Tok::Dot | Tok::RBracket | Tok::Eof) {
                return Ok(Rc::new(Node::Return(None)));
            }
            let expr = self.parse_expression()?;
            return Ok(Rc::new(Node::Return(Some(expr))));
        }
        if self.at_method_definition() {
            return self.parse_method_definition();
        }
        self.parse_expression()
    }

    fn at_method_definition(&self) -> bool {
        let Tok::Id(_) = self.peek() else {
            return false;
        };
        match self.peek_at(1) {
            Tok::BinSel(s) if s == ">>" => true,
            Tok::Id(w) if w == "class" => matches!(self.peek_at(2), Tok::BinSel(s) if s == ">>"),
            _ => false,
        }
    }

    /// `Receiver >> pattern [ body ]` / `Receiver class >> pattern [ body ]`.
    fn parse_method_definition(&mut self) -> Result<Rc<Node>, ParseError> {
        let class_name = self.expect_ident("class name")?;
        let class_side = matches!(self.peek(), Tok::Id(w) if w == "class");
        if class_side {
            self.bump();
        }
        self.bump(); // >>

        let mut selector = String::new();
        let mut parameters = Vec::new();
        match self.bump() {
            Tok::Keyword(first) => {
                selector.push_str(&first);
                parameters.push(self.expect_ident("parameter name")?);
                while let Tok::Keyword(part) = self.peek().clone() {
                    self.bump();
                    selector.push_str(&part);
                    parameters.push(self.expect_ident("parameter name")?);
                }
            }
            Tok::BinSel(op) => {
                selector.push_str(&op);
                parameters.push(self.expect_ident("parameter name")?);
            }
            Tok::Id(name) => selector.push_str(&name),
            other => {
                return Err(ParseError::at(
                    format!("expected method pattern, found {:?}", other),
                    self.position(),
                ));
            }
        }

        self.expect(&Tok::LBracket)?;
        let temporaries = self.parse_temporaries()?;
        let body = self.parse_method_body()?;
        self.expect(&Tok::RBracket)?;

        let template = Rc::new(BlockTemplate {
            parameters,
            temporaries,
            body,
            is_method: true,
        });
        let installer: Rc<str> = if class_side {
            Rc::from("classSelector:put:")
        } else {
            Rc::from("selector:put:")
        };
        Ok(Rc::new(Node::Message {
            receiver: Some(Rc::new(Node::Ident(class_name))),
            selector: installer,
            args: vec![
                Rc::new(Node::Literal(Val::Symbol(Rc::from(selector.as_str())))),
                Rc::new(Node::Block(template)),
            ],
        }))
    }

    /// Method body, which may start with a `<primitive: "name">` marker.
    fn parse_method_body(&mut self) -> Result<Vec<Rc<Node>>, ParseError> {
        if self.is_binsel("<") && matches!(self.peek_at(1), Tok::Keyword(k) if k == "primitive:") {
            self.bump(); // <
            self.bump(); // primitive:
            let name = match self.bump() {
                Tok::Str(s) => Rc::from(s.as_str()),
                other => {
                    return Err(ParseError::at(
                        format!("expected primitive name string, found {:?}", other),
                        self.position(),
                    ));
                }
            };
            if !self.is_binsel(">") {
                return Err(ParseError::at("expected '>' closing primitive marker", self.position()));
            }
            self.bump();
            self.eat(&Tok::Dot);
            let fallback = self.parse_statements_until(&Tok::RBracket)?;
            return Ok(vec![Rc::new(Node::Primitive { name, fallback })]);
        }
        self.parse_statements_until(&Tok::RBracket)
    }

    // ---- expressions ----------------------------------------------------

    fn parse_expression(&mut self) -> Result<Rc<Node>, ParseError> {
        if let Tok::Id(name) = self.peek().clone() {
            if *self.peek_at(1) == Tok::Assign {
                self.bump();
                self.bump();
                let expr = self.parse_expression()?;
                return Ok(Rc::new(Node::Assign {
                    name: Rc::from(name.as_str()),
                    expr,
                }));
            }
        }
        self.parse_cascade_expr()
    }

    fn parse_cascade_expr(&mut self) -> Result<Rc<Node>, ParseError> {
        let at = self.position();
        let node = self.parse_keyword_expr()?;
        if self.peek() != &Tok::Semi {
            return Ok(node);
        }
        // The cascade receiver is the receiver of the last message parsed.
        let (receiver, first) = match node.as_ref() {
            Node::Message {
                receiver: Some(receiver),
                selector,
                args,
            } => (
                receiver.clone(),
                MessagePart {
                    selector: selector.clone(),
                    args: args.clone(),
                },
            ),
            _ => {
                return Err(ParseError::at("cascade requires a message send before ';'", at));
            }
        };
        let mut messages = vec![first];
        while self.eat(&Tok::Semi) {
            messages.push(self.parse_cascade_part()?);
        }
        Ok(Rc::new(Node::Cascade { receiver, messages }))
    }

    /// One message after `;`: a single unary, binary or keyword send.
    fn parse_cascade_part(&mut self) -> Result<MessagePart, ParseError> {
        match self.bump() {
            Tok::Id(sel) => Ok(MessagePart {
                selector: Rc::from(sel.as_str()),
                args: Vec::new(),
            }),
            Tok::BinSel(op) => {
                let at = self.position();
                let arg = self.parse_unary_expr()?.into_node(at)?;
                Ok(MessagePart {
                    selector: Rc::from(op.as_str()),
                    args: vec![arg],
                })
            }
            Tok::Keyword(first) => {
                let mut selector = first;
                let mut args = Vec::new();
                let at = self.position();
                args.push(self.parse_binary_expr()?.into_node(at)?);
                while let Tok::Keyword(part) = self.peek().clone() {
                    self.bump();
                    selector.push_str(&part);
                    let at = self.position();
                    args.push(self.parse_binary_expr()?.into_node(at)?);
                }
                Ok(MessagePart {
                    selector: Rc::from(selector.as_str()),
                    args,
                })
            }
            other => Err(ParseError::at(
                format!("expected cascade message, found {:?}", other),
                self.position(),
            )),
        }
    }

    fn parse_keyword_expr(&mut self) -> Result<Rc<Node>, ParseError> {
        let at = self.position();
        let receiver = self.parse_binary_expr()?;
        if !matches!(self.peek(), Tok::Keyword(_)) {
            return receiver.into_node(at);
        }
        let mut selector = String::new();
        let mut args = Vec::new();
        while let Tok::Keyword(part) = self.peek().clone() {
            self.bump();
            selector.push_str(&part);
            let arg_at = self.position();
            args.push(self.parse_binary_expr()?.into_node(arg_at)?);
        }
        Ok(build_send(receiver, Rc::from(selector.as_str()), args))
    }

    fn parse_binary_expr(&mut self) -> Result<Unit, ParseError> {
        let mut lhs = self.parse_unary_expr()?;
        loop {
            let op = match self.peek() {
                Tok::BinSel(op) if op != ">>" => op.clone(),
                Tok::Pipe => "|".to_string(),
                _ => break,
            };
            self.bump();
            let at = self.position();
            let rhs = self.parse_unary_expr()?.into_node(at)?;
            lhs = Unit::Plain(build_send(lhs, Rc::from(op.as_str()), vec![rhs]));
        }
        Ok(lhs)
    }

    fn parse_unary_expr(&mut self) -> Result<Unit, ParseError> {
        let mut base = self.parse_primary()?;
        loop {
            match self.peek() {
                // A trailing `class` before `>>` belongs to a method
                // definition, not to this expression.
                Tok::Id(_) if self.at_method_definition() => break,
                Tok::Id(sel) => {
                    let sel = Rc::from(sel.as_str());
                    self.bump();
                    base = Unit::Plain(build_send(base, sel, Vec::new()));
                }
                _ => break,
            }
        }
        Ok(base)
    }

    fn parse_primary(&mut self) -> Result<Unit, ParseError> {
        let at = self.position();
        match self.bump() {
            Tok::Id(name) => Ok(match name.as_str() {
                "self" => Unit::Plain(Rc::new(Node::PseudoVar(PseudoVar::SelfRef))),
                "nil" => Unit::Plain(Rc::new(Node::PseudoVar(PseudoVar::Nil))),
                "true" => Unit::Plain(Rc::new(Node::PseudoVar(PseudoVar::True))),
                "false" => Unit::Plain(Rc::new(Node::PseudoVar(PseudoVar::False))),
                "super" => Unit::Super {
                    qualifier: self.parse_super_qualifier(),
                },
                _ => Unit::Plain(Rc::new(Node::Ident(Rc::from(name.as_str())))),
            }),
            Tok::Int(i) => Ok(Unit::Plain(Rc::new(Node::Literal(Val::Int(i))))),
            Tok::Float(f) => Ok(Unit::Plain(Rc::new(Node::Literal(Val::Float(f))))),
            Tok::Str(s) => Ok(Unit::Plain(Rc::new(Node::Literal(Val::Str(Rc::from(
                s.as_str(),
            )))))),
            Tok::Sym(s) => Ok(Unit::Plain(Rc::new(Node::Literal(Val::Symbol(Rc::from(
                s.as_str(),
            )))))),
            Tok::LParen => {
                let inner = self.parse_expression()?;
                self.expect(&Tok::RParen)?;
                Ok(Unit::Plain(inner))
            }
            Tok::LBracket => Ok(Unit::Plain(self.parse_block()?)),
            Tok::LBrace => {
                let elements = self.parse_statements_until(&Tok::RBrace)?;
                self.expect(&Tok::RBrace)?;
                Ok(Unit::Plain(Rc::new(Node::Array(elements))))
            }
            Tok::HashParen => Ok(Unit::Plain(self.parse_literal_array()?)),
            Tok::HashBrace => Ok(Unit::Plain(self.parse_table_literal()?)),
            other => Err(ParseError::at(
                format!("unexpected {:?}", other),
                at,
            )),
        }
    }

    /// `super<Parent>` qualifier, when the next tokens spell exactly that.
    fn parse_super_qualifier(&mut self) -> Option<Rc<str>> {
        if !self.is_binsel("<") {
            return None;
        }
        let (Tok::Id(name), Tok::BinSel(close)) = (self.peek_at(1), self.peek_at(2)) else {
            return None;
        };
        if close != ">" {
            return None;
        }
        let name = Rc::from(name.as_str());
        self.bump();
        self.bump();
        self.bump();
        Some(name)
    }

    fn parse_block(&mut self) -> Result<Rc<Node>, ParseError> {
        let mut parameters = Vec::new();
        while self.eat(&Tok::Colon) {
            parameters.push(self.expect_ident("block parameter")?);
        }
        if !parameters.is_empty() {
            self.expect(&Tok::Pipe)?;
        }
        let temporaries = self.parse_temporaries()?;
        let body = self.parse_statements_until(&Tok::RBracket)?;
        self.expect(&Tok::RBracket)?;
        Ok(Rc::new(Node::Block(Rc::new(BlockTemplate {
            parameters,
            temporaries,
            body,
            is_method: false,
        }))))
    }

    /// `| a b |` temporary declarations at the head of a block or method.
    fn parse_temporaries(&mut self) -> Result<Vec<Rc<str>>, ParseError> {
        let mut temps = Vec::new();
        if self.peek() != &Tok::Pipe {
            return Ok(temps);
        }
        self.bump();
        while let Tok::Id(name) = self.peek().clone() {
            self.bump();
            temps.push(Rc::from(name.as_str()));
        }
        self.expect(&Tok::Pipe)?;
        Ok(temps)
    }

    /// `#( ... )`: literal elements only; bare identifiers become symbols,
    /// nested parens become nested arrays.
    fn parse_literal_array(&mut self) -> Result<Rc<Node>, ParseError> {
        let mut elements = Vec::new();
        loop {
            let at = self.position();
            match self.bump() {
                Tok::RParen => break,
                Tok::Int(i) => elements.push(Rc::new(Node::Literal(Val::Int(i)))),
                Tok::Float(f) => elements.push(Rc::new(Node::Literal(Val::Float(f)))),
                Tok::Str(s) => {
                    elements.push(Rc::new(Node::Literal(Val::Str(Rc::from(s.as_str())))));
                }
                Tok::Sym(s) => {
                    elements.push(Rc::new(Node::Literal(Val::Symbol(Rc::from(s.as_str())))));
                }
                Tok::BinSel(op) if op == "-" => match self.bump() {
                    Tok::Int(i) => elements.push(Rc::new(Node::Literal(Val::Int(-i)))),
                    Tok::Float(f) => elements.push(Rc::new(Node::Literal(Val::Float(-f)))),
                    other => {
                        return Err(ParseError::at(
                            format!("expected number after '-', found {:?}", other),
                            at,
                        ));
                    }
                },
                Tok::BinSel(op) => {
                    elements.push(Rc::new(Node::Literal(Val::Symbol(Rc::from(op.as_str())))));
                }
                Tok::Id(word) => match word.as_str() {
                    "nil" => elements.push(Rc::new(Node::Literal(Val::Nil))),
                    "true" => elements.push(Rc::new(Node::Literal(Val::Bool(true)))),
                    "false" => elements.push(Rc::new(Node::Literal(Val::Bool(false)))),
                    _ => elements.push(Rc::new(Node::Literal(Val::Symbol(Rc::from(
                        word.as_str(),
                    ))))),
                },
                Tok::Keyword(first) => {
                    // Keyword runs inside a literal array merge into one
                    // symbol: #(at:put:) is the two-part selector.
                    let mut sym = first;
                    while let Tok::Keyword(part) = self.peek().clone() {
                        self.bump();
                        sym.push_str(&part);
                    }
                    elements.push(Rc::new(Node::Literal(Val::Symbol(Rc::from(sym.as_str())))));
                }
                Tok::HashParen | Tok::LParen => {
                    elements.push(self.parse_literal_array()?);
                }
                other => {
                    return Err(ParseError::at(
                        format!("unexpected {:?} in literal array", other),
                        at,
                    ));
                }
            }
        }
        Ok(Rc::new(Node::Array(elements)))
    }

    /// `#{ key -> value. ... }`: keys parse at unary level, values at
    /// keyword level.
    fn parse_table_literal(&mut self) -> Result<Rc<Node>, ParseError> {
        let mut entries = Vec::new();
        while self.peek() != &Tok::RBrace {
            let at = self.position();
            let key = self.parse_unary_expr()?.into_node(at)?;
            if !self.is_binsel("->") {
                return Err(ParseError::at("expected '->' in table literal", self.position()));
            }
            self.bump();
            let value = self.parse_keyword_expr()?;
            entries.push((key, value));
            if !self.eat(&Tok::Dot) {
                break;
            }
        }
        self.expect(&Tok::RBrace)?;
        Ok(Rc::new(Node::Table(entries)))
    }
}

fn build_send(receiver: Unit, selector: Rc<str>, args: Vec<Rc<Node>>) -> Rc<Node> {
    match receiver {
        Unit::Plain(receiver) => Rc::new(Node::Message {
            receiver: Some(receiver),
            selector,
            args,
        }),
        Unit::Super { qualifier } => Rc::new(Node::SuperSend {
            selector,
            args,
            qualifier,
        }),
    }
}
