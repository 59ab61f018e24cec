//! Sandboxed evaluator for report scripts.
//!
//! Report pages build their data with a flat list of assignments into one
//! object. This module implements exactly that slice of JavaScript: variable
//! declarations, property assignment, string and numeric literals, `+`/`-`,
//! object/array literals, `new Array()` and a single builtin,
//! `JSON.stringify`. Nothing else is reachable from a script: there is no
//! function definition, no loop, no I/O and no access to the host.
//!
//! Every call to [`evaluate`] builds a fresh interpreter, so no state can
//! leak from one page into the next.

use std::collections::HashMap;
use std::time::Instant;

use super::lexer::{tokenize, Spanned, Token};
use super::EvalOptions;
use crate::error::ExtractionError;
use crate::raw::RawFieldMap;

/// Identifiers that start constructs outside the supported subset.
const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "function", "if", "else", "for", "while", "do", "return", "switch", "case", "break",
    "continue", "try", "catch", "finally", "throw", "class", "this", "delete", "typeof",
    "instanceof", "in", "with", "import", "export", "async", "await", "yield",
];

/// Runs a transformed script and parses its final string value as a field map.
pub fn evaluate(script: &str, options: &EvalOptions) -> Result<RawFieldMap, ExtractionError> {
    let program = Parser::new(tokenize(script)?, options.max_depth).program()?;
    let mut interpreter = Interpreter::new(options);
    match interpreter.run(&program)? {
        Value::Str(text) => RawFieldMap::from_json(&text),
        other => Err(ExtractionError::InvalidResult(format!(
            "script completed with {} instead of a string",
            other.type_name()
        ))),
    }
}

// ---------------------------------------------------------------------------
// Syntax tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum Expr {
    Str(String),
    Num(f64),
    Bool(bool),
    Null,
    Ident(String),
    Member(Box<Expr>, Box<Expr>),
    Call(Box<Expr>, Vec<Expr>),
    New(String, Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Array(Vec<Expr>),
    Neg(Box<Expr>),
    Plus(Box<Expr>),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Assign(Box<Expr>, Box<Expr>),
}

#[derive(Debug)]
enum Stmt {
    Var(Vec<(String, Option<Expr>)>),
    Expr(Expr),
    Empty,
}

#[derive(Debug)]
struct Line {
    stmt: Stmt,
    line: usize,
}

// ---------------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------------

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    max_depth: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, max_depth: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            max_depth,
        }
    }

    fn current(&self) -> &Spanned {
        // The token list always ends with `Eof`, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek(&self) -> &Token {
        &self.current().token
    }

    fn advance(&mut self) -> Token {
        let token = self.current().token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error(&self, msg: impl std::fmt::Display) -> ExtractionError {
        let at = self.current();
        ExtractionError::Syntax(format!("line {}, column {}: {}", at.line, at.col, msg))
    }

    fn unexpected(&self) -> ExtractionError {
        match self.peek() {
            Token::Eof => self.error("unexpected end of input"),
            Token::Ident(name) => self.error(format!("unexpected identifier `{}`", name)),
            Token::Str(_) => self.error("unexpected string"),
            Token::Num(n) => self.error(format!("unexpected number {}", n)),
            Token::Punct(c) => self.error(format!("unexpected token `{}`", c)),
        }
    }

    fn eat(&mut self, c: char) -> bool {
        if *self.peek() == Token::Punct(c) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> Result<(), ExtractionError> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn ident(&mut self) -> Result<String, ExtractionError> {
        match self.peek().clone() {
            Token::Ident(name) => {
                self.advance();
                Ok(name)
            }
            _ => Err(self.unexpected()),
        }
    }

    fn enter(&mut self) -> Result<(), ExtractionError> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(self.error("expression nesting too deep"));
        }
        Ok(())
    }

    fn program(mut self) -> Result<Vec<Line>, ExtractionError> {
        let mut lines = Vec::new();
        while *self.peek() != Token::Eof {
            let line = self.current().line;
            let stmt = self.statement()?;
            lines.push(Line { stmt, line });
        }
        Ok(lines)
    }

    fn statement(&mut self) -> Result<Stmt, ExtractionError> {
        if self.eat(';') {
            return Ok(Stmt::Empty);
        }
        let stmt = match self.peek().clone() {
            Token::Ident(kw) if kw == "var" || kw == "let" || kw == "const" => {
                self.advance();
                let mut decls = Vec::new();
                loop {
                    let name = self.ident()?;
                    let init = if self.eat('=') {
                        Some(self.expression()?)
                    } else {
                        None
                    };
                    decls.push((name, init));
                    if !self.eat(',') {
                        break;
                    }
                }
                Stmt::Var(decls)
            }
            Token::Ident(kw) if UNSUPPORTED_KEYWORDS.contains(&kw.as_str()) => {
                return Err(self.error(format!("unsupported statement `{}`", kw)));
            }
            _ => Stmt::Expr(self.expression()?),
        };
        self.end_of_statement()?;
        Ok(stmt)
    }

    /// A statement ends with `;`, a line break, or the end of input.
    fn end_of_statement(&mut self) -> Result<(), ExtractionError> {
        if self.eat(';') || *self.peek() == Token::Eof || self.current().newline_before {
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn expression(&mut self) -> Result<Expr, ExtractionError> {
        self.enter()?;
        let target = self.additive()?;
        let expr = if self.eat('=') {
            if !matches!(target, Expr::Ident(_) | Expr::Member(..)) {
                return Err(self.error("invalid assignment target"));
            }
            Expr::Assign(Box::new(target), Box::new(self.expression()?))
        } else {
            target
        };
        self.depth -= 1;
        Ok(expr)
    }

    /// Left-associative `+`/`-` chain. Every link deepens the tree by one
    /// level, so each one counts against the nesting limit.
    fn additive(&mut self) -> Result<Expr, ExtractionError> {
        let mut links = 0;
        let mut left = self.unary()?;
        loop {
            if self.eat('+') {
                self.enter()?;
                links += 1;
                left = Expr::Add(Box::new(left), Box::new(self.unary()?));
            } else if self.eat('-') {
                self.enter()?;
                links += 1;
                left = Expr::Sub(Box::new(left), Box::new(self.unary()?));
            } else {
                self.depth -= links;
                return Ok(left);
            }
        }
    }

    fn unary(&mut self) -> Result<Expr, ExtractionError> {
        self.enter()?;
        let expr = if self.eat('-') {
            Expr::Neg(Box::new(self.unary()?))
        } else if self.eat('+') {
            Expr::Plus(Box::new(self.unary()?))
        } else {
            self.postfix()?
        };
        self.depth -= 1;
        Ok(expr)
    }

    fn postfix(&mut self) -> Result<Expr, ExtractionError> {
        let mut links = 0;
        let mut expr = self.primary()?;
        loop {
            if matches!(self.peek(), Token::Punct('.' | '[' | '(')) {
                self.enter()?;
                links += 1;
            }
            if self.eat('.') {
                let name = self.ident()?;
                expr = Expr::Member(Box::new(expr), Box::new(Expr::Str(name)));
            } else if self.eat('[') {
                let key = self.expression()?;
                self.expect(']')?;
                expr = Expr::Member(Box::new(expr), Box::new(key));
            } else if self.eat('(') {
                let args = self.arguments()?;
                expr = Expr::Call(Box::new(expr), args);
            } else {
                self.depth -= links;
                return Ok(expr);
            }
        }
    }

    /// Comma-separated expressions up to `)`; the `(` is already consumed.
    fn arguments(&mut self) -> Result<Vec<Expr>, ExtractionError> {
        self.list(')')
    }

    fn list(&mut self, close: char) -> Result<Vec<Expr>, ExtractionError> {
        let mut items = Vec::new();
        while !self.eat(close) {
            items.push(self.expression()?);
            if !self.eat(',') {
                self.expect(close)?;
                break;
            }
        }
        Ok(items)
    }

    fn primary(&mut self) -> Result<Expr, ExtractionError> {
        match self.peek().clone() {
            Token::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            Token::Num(n) => {
                self.advance();
                Ok(Expr::Num(n))
            }
            Token::Punct('(') => {
                self.advance();
                let expr = self.expression()?;
                self.expect(')')?;
                Ok(expr)
            }
            Token::Punct('[') => {
                self.advance();
                Ok(Expr::Array(self.list(']')?))
            }
            Token::Punct('{') => {
                self.advance();
                self.object_literal()
            }
            Token::Ident(name) => {
                self.advance();
                match name.as_str() {
                    "true" => Ok(Expr::Bool(true)),
                    "false" => Ok(Expr::Bool(false)),
                    "null" => Ok(Expr::Null),
                    "new" => {
                        let ctor = self.ident()?;
                        let args = if self.eat('(') {
                            self.arguments()?
                        } else {
                            Vec::new()
                        };
                        Ok(Expr::New(ctor, args))
                    }
                    kw if UNSUPPORTED_KEYWORDS.contains(&kw) => {
                        Err(self.error(format!("unsupported expression `{}`", kw)))
                    }
                    _ => Ok(Expr::Ident(name)),
                }
            }
            _ => Err(self.unexpected()),
        }
    }

    fn object_literal(&mut self) -> Result<Expr, ExtractionError> {
        let mut props = Vec::new();
        while !self.eat('}') {
            let key = match self.advance() {
                Token::Ident(name) => name,
                Token::Str(s) => s,
                Token::Num(n) => number_to_string(n),
                _ => return Err(self.error("invalid property name")),
            };
            self.expect(':')?;
            props.push((key, self.expression()?));
            if !self.eat(',') {
                self.expect('}')?;
                break;
            }
        }
        Ok(Expr::Object(props))
    }
}

// ---------------------------------------------------------------------------
// Values
// ---------------------------------------------------------------------------

type ObjId = usize;

#[derive(Debug, Clone, PartialEq)]
enum Value {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    Object(ObjId),
    /// The global `JSON` namespace.
    Json,
    /// `JSON.stringify`.
    Stringify,
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "a boolean",
            Value::Num(_) => "a number",
            Value::Str(_) => "a string",
            Value::Object(_) | Value::Json => "an object",
            Value::Stringify => "a function",
        }
    }
}

#[derive(Debug, Default)]
struct Object {
    array: bool,
    keys: Vec<String>,
    props: HashMap<String, Value>,
}

impl Object {
    fn get(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }

    fn set(&mut self, key: String, value: Value) {
        if !self.props.contains_key(&key) {
            self.keys.push(key.clone());
        }
        self.props.insert(key, value);
    }

    /// Array length: one past the highest index key.
    fn length(&self) -> usize {
        self.keys
            .iter()
            .filter_map(|k| array_index(k))
            .map(|i| i + 1)
            .max()
            .unwrap_or(0)
    }
}

fn array_index(key: &str) -> Option<usize> {
    if key == "0" || (!key.starts_with('0') && !key.is_empty()) {
        if key.chars().all(|c| c.is_ascii_digit()) {
            return key.parse().ok();
        }
    }
    None
}

/// JavaScript `Number.prototype.toString()` for the values the portal uses.
fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

fn string_to_number(s: &str) -> f64 {
    let t = s.trim();
    if t.is_empty() {
        return 0.0;
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).map(|n| n as f64).unwrap_or(f64::NAN);
    }
    match t {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if t.chars().any(|c| c.is_ascii_alphabetic() && c != 'e' && c != 'E') => f64::NAN,
        _ => t.parse().unwrap_or(f64::NAN),
    }
}

// ---------------------------------------------------------------------------
// Interpreter
// ---------------------------------------------------------------------------

/// One evaluation context. Holds the globals and the object heap of a single
/// script run and is dropped afterwards.
struct Interpreter<'o> {
    options: &'o EvalOptions,
    globals: HashMap<String, Value>,
    heap: Vec<Object>,
    steps: u64,
    started: Instant,
    line: usize,
}

impl<'o> Interpreter<'o> {
    fn new(options: &'o EvalOptions) -> Self {
        let mut globals = HashMap::new();
        globals.insert("JSON".to_string(), Value::Json);
        globals.insert("undefined".to_string(), Value::Undefined);
        globals.insert("NaN".to_string(), Value::Num(f64::NAN));
        globals.insert("Infinity".to_string(), Value::Num(f64::INFINITY));
        Self {
            options,
            globals,
            heap: Vec::new(),
            steps: 0,
            started: Instant::now(),
            line: 0,
        }
    }

    fn runtime(&self, msg: impl std::fmt::Display) -> ExtractionError {
        ExtractionError::Runtime(format!("line {}: {}", self.line, msg))
    }

    fn tick(&mut self) -> Result<(), ExtractionError> {
        self.steps += 1;
        if self.steps > self.options.max_steps || self.started.elapsed() > self.options.timeout {
            return Err(ExtractionError::Timeout(self.options.timeout));
        }
        Ok(())
    }

    fn alloc(&mut self, object: Object) -> Value {
        self.heap.push(object);
        Value::Object(self.heap.len() - 1)
    }

    /// Executes the program and returns the value of the last expression
    /// statement, like `eval` does.
    fn run(&mut self, program: &[Line]) -> Result<Value, ExtractionError> {
        // `var` declarations are hoisted to `undefined`.
        for line in program {
            if let Stmt::Var(decls) = &line.stmt {
                for (name, _) in decls {
                    self.globals.entry(name.clone()).or_insert(Value::Undefined);
                }
            }
        }

        let mut completion = Value::Undefined;
        for line in program {
            self.line = line.line;
            self.tick()?;
            match &line.stmt {
                Stmt::Var(decls) => {
                    for (name, init) in decls {
                        if let Some(init) = init {
                            let value = self.eval(init)?;
                            self.globals.insert(name.clone(), value);
                        }
                    }
                }
                Stmt::Expr(expr) => completion = self.eval(expr)?,
                Stmt::Empty => {}
            }
        }
        if self.started.elapsed() >= self.options.timeout {
            return Err(ExtractionError::Timeout(self.options.timeout));
        }
        Ok(completion)
    }

    fn eval(&mut self, expr: &Expr) -> Result<Value, ExtractionError> {
        self.tick()?;
        match expr {
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Num(n) => Ok(Value::Num(*n)),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => self
                .globals
                .get(name)
                .cloned()
                .ok_or_else(|| self.runtime(format!("ReferenceError: {} is not defined", name))),
            Expr::Member(object, key) => {
                let object = self.eval(object)?;
                let key = self.eval(key)?;
                let key = self.to_property_key(&key)?;
                self.get_member(&object, &key)
            }
            Expr::Call(callee, args) => {
                let function = self.eval(callee)?;
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                match function {
                    Value::Stringify => {
                        let value = values.into_iter().next().unwrap_or(Value::Undefined);
                        self.stringify_top(&value)
                    }
                    other => Err(self.runtime(format!(
                        "TypeError: {} is not a function",
                        self.describe(&other)
                    ))),
                }
            }
            Expr::New(ctor, args) => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.construct(ctor, values)
            }
            Expr::Object(props) => {
                let mut object = Object::default();
                for (key, value) in props {
                    let value = self.eval(value)?;
                    object.set(key.clone(), value);
                }
                Ok(self.alloc(object))
            }
            Expr::Array(items) => {
                let mut object = Object {
                    array: true,
                    ..Object::default()
                };
                for (i, item) in items.iter().enumerate() {
                    let value = self.eval(item)?;
                    object.set(i.to_string(), value);
                }
                Ok(self.alloc(object))
            }
            Expr::Neg(inner) => {
                let value = self.eval(inner)?;
                Ok(Value::Num(-self.to_number(&value)))
            }
            Expr::Plus(inner) => {
                let value = self.eval(inner)?;
                Ok(Value::Num(self.to_number(&value)))
            }
            Expr::Add(left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                self.add(left, right)
            }
            Expr::Sub(left, right) => {
                let left = self.eval(left)?;
                let right = self.eval(right)?;
                Ok(Value::Num(self.to_number(&left) - self.to_number(&right)))
            }
            Expr::Assign(target, value) => self.assign(target, value),
        }
    }

    fn assign(&mut self, target: &Expr, value: &Expr) -> Result<Value, ExtractionError> {
        match target {
            Expr::Ident(name) => {
                let value = self.eval(value)?;
                if matches!(self.globals.get(name), Some(Value::Json)) {
                    return Err(self.runtime(format!("TypeError: cannot reassign {}", name)));
                }
                self.globals.insert(name.clone(), value.clone());
                Ok(value)
            }
            Expr::Member(object, key) => {
                let object = self.eval(object)?;
                let key = self.eval(key)?;
                let key = self.to_property_key(&key)?;
                let value = self.eval(value)?;
                match object {
                    Value::Object(id) => {
                        self.heap[id].set(key, value.clone());
                        Ok(value)
                    }
                    Value::Undefined | Value::Null => Err(self.runtime(format!(
                        "TypeError: Cannot set properties of {} (setting '{}')",
                        self.describe(&object),
                        key
                    ))),
                    Value::Json | Value::Stringify => Err(self.runtime(format!(
                        "TypeError: cannot modify builtin (setting '{}')",
                        key
                    ))),
                    // Writes to primitives are silently dropped.
                    _ => Ok(value),
                }
            }
            _ => Err(self.runtime("SyntaxError: invalid assignment target")),
        }
    }

    fn construct(&mut self, ctor: &str, args: Vec<Value>) -> Result<Value, ExtractionError> {
        match ctor {
            "Array" => {
                let mut object = Object {
                    array: true,
                    ..Object::default()
                };
                // `new Array(n)` only reserves a length; there is nothing to store.
                if !(args.len() == 1 && matches!(args[0], Value::Num(_))) {
                    for (i, arg) in args.into_iter().enumerate() {
                        object.set(i.to_string(), arg);
                    }
                }
                Ok(self.alloc(object))
            }
            "Object" => Ok(self.alloc(Object::default())),
            other if self.globals.contains_key(other) => Err(self.runtime(format!(
                "TypeError: {} is not a constructor",
                other
            ))),
            other => Err(self.runtime(format!("ReferenceError: {} is not defined", other))),
        }
    }

    fn get_member(&self, object: &Value, key: &str) -> Result<Value, ExtractionError> {
        match object {
            Value::Object(id) => {
                let object = &self.heap[*id];
                if object.array && key == "length" {
                    return Ok(Value::Num(object.length() as f64));
                }
                Ok(object.get(key).cloned().unwrap_or(Value::Undefined))
            }
            Value::Json if key == "stringify" => Ok(Value::Stringify),
            Value::Str(s) if key == "length" => Ok(Value::Num(s.encode_utf16().count() as f64)),
            Value::Str(s) => Ok(array_index(key)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .unwrap_or(Value::Undefined)),
            Value::Undefined | Value::Null => Err(self.runtime(format!(
                "TypeError: Cannot read properties of {} (reading '{}')",
                self.describe(object),
                key
            ))),
            _ => Ok(Value::Undefined),
        }
    }

    fn describe(&self, value: &Value) -> String {
        match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Str(s) => format!("{:?}", s),
            Value::Num(n) => number_to_string(*n),
            Value::Bool(b) => b.to_string(),
            Value::Object(_) => "object".to_string(),
            Value::Json => "JSON".to_string(),
            Value::Stringify => "JSON.stringify".to_string(),
        }
    }

    fn to_property_key(&mut self, value: &Value) -> Result<String, ExtractionError> {
        self.to_string(value)
    }

    fn to_number(&self, value: &Value) -> f64 {
        match value {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => f64::from(u8::from(*b)),
            Value::Num(n) => *n,
            Value::Str(s) => string_to_number(s),
            Value::Object(_) | Value::Json | Value::Stringify => f64::NAN,
        }
    }

    fn to_string(&mut self, value: &Value) -> Result<String, ExtractionError> {
        Ok(match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Num(n) => number_to_string(*n),
            Value::Str(s) => s.clone(),
            Value::Object(id) => {
                let id = *id;
                if !self.heap[id].array {
                    return Ok("[object Object]".to_string());
                }
                // Holes count too: a sparse array walks every index up to its length.
                let length = self.heap[id].length();
                let mut out = String::new();
                for i in 0..length {
                    self.tick()?;
                    if i > 0 {
                        out.push(',');
                    }
                    match self.heap[id].get(&i.to_string()).cloned() {
                        None | Some(Value::Undefined) | Some(Value::Null) => {}
                        // Nested arrays would need cycle tracking; the portal never builds them.
                        Some(Value::Object(_)) => out.push_str("[object]"),
                        Some(other) => {
                            let part = self.to_string(&other)?;
                            out.push_str(&part);
                        }
                    }
                    if out.len() > self.options.max_string_len {
                        return Err(self.runtime("RangeError: string exceeds maximum length"));
                    }
                }
                out
            }
            Value::Json => "[object JSON]".to_string(),
            Value::Stringify => "function stringify() { [native code] }".to_string(),
        })
    }

    fn add(&mut self, left: Value, right: Value) -> Result<Value, ExtractionError> {
        let is_stringy = |v: &Value| !matches!(v, Value::Undefined | Value::Null | Value::Bool(_) | Value::Num(_));
        if is_stringy(&left) || is_stringy(&right) {
            let mut out = self.to_string(&left)?;
            out.push_str(&self.to_string(&right)?);
            if out.len() > self.options.max_string_len {
                return Err(self.runtime("RangeError: string exceeds maximum length"));
            }
            Ok(Value::Str(out))
        } else {
            Ok(Value::Num(self.to_number(&left) + self.to_number(&right)))
        }
    }

    fn stringify_top(&mut self, value: &Value) -> Result<Value, ExtractionError> {
        let mut out = String::new();
        let mut stack = Vec::new();
        if self.stringify(value, &mut out, &mut stack)? {
            Ok(Value::Str(out))
        } else {
            Ok(Value::Undefined)
        }
    }

    /// Appends the JSON form of `value`; returns `false` when the value has
    /// no JSON form (undefined, functions) and nothing was written.
    fn stringify(
        &mut self,
        value: &Value,
        out: &mut String,
        stack: &mut Vec<ObjId>,
    ) -> Result<bool, ExtractionError> {
        self.tick()?;
        if out.len() > self.options.max_string_len {
            return Err(self.runtime("RangeError: string exceeds maximum length"));
        }
        match value {
            Value::Undefined | Value::Stringify => return Ok(false),
            Value::Null => out.push_str("null"),
            Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
            Value::Num(n) if n.is_finite() => out.push_str(&number_to_string(*n)),
            Value::Num(_) => out.push_str("null"),
            Value::Str(s) => push_json_string(out, s),
            Value::Json => out.push_str("{}"),
            Value::Object(id) => {
                let id = *id;
                if stack.contains(&id) {
                    return Err(self.runtime("TypeError: Converting circular structure to JSON"));
                }
                if stack.len() >= self.options.max_depth {
                    return Err(self.runtime("RangeError: object nesting too deep"));
                }
                stack.push(id);
                if self.heap[id].array {
                    out.push('[');
                    for i in 0..self.heap[id].length() {
                        if i > 0 {
                            out.push(',');
                        }
                        let item = self.heap[id]
                            .get(&i.to_string())
                            .cloned()
                            .unwrap_or(Value::Undefined);
                        if !self.stringify(&item, out, stack)? {
                            out.push_str("null");
                        }
                    }
                    out.push(']');
                } else {
                    out.push('{');
                    let mut first = true;
                    for key in ordered_keys(&self.heap[id].keys) {
                        let item = self.heap[id].get(&key).cloned().unwrap_or(Value::Undefined);
                        if matches!(item, Value::Undefined | Value::Stringify) {
                            continue;
                        }
                        if !first {
                            out.push(',');
                        }
                        first = false;
                        push_json_string(out, &key);
                        out.push(':');
                        self.stringify(&item, out, stack)?;
                    }
                    out.push('}');
                }
                stack.pop();
            }
        }
        Ok(true)
    }
}

/// Property enumeration order: integer keys ascending, then insertion order.
fn ordered_keys(keys: &[String]) -> Vec<String> {
    let mut indexed: Vec<(usize, &String)> = keys
        .iter()
        .filter_map(|k| array_index(k).map(|i| (i, k)))
        .collect();
    indexed.sort_by_key(|(i, _)| *i);
    indexed
        .into_iter()
        .map(|(_, k)| k.clone())
        .chain(keys.iter().filter(|k| array_index(k).is_none()).cloned())
        .collect()
}

fn push_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
}
