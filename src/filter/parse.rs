/*!
Tokeniser and recursive-descent parser for filter expressions.

```text
expr       := and ( "or" and )*
and        := not ( "and" not )*
not        := "not" not | comparison
comparison := postfix ( cmp postfix | "in" postfix | "not" "in" postfix | "=~" STRING )?
cmp        := "==" | "!=" | "<" | "<=" | ">" | ">="
postfix    := primary ( "." NAME | "[" STRING "]" | "[" INTEGER "]" )*
primary    := STRING | NUMBER | "true" | "false" | "null"
            | "v" | "graph" | "trail"
            | "len" "(" expr ")" | "(" expr ")" | "[" ( expr ( "," expr )* )? "]"
```
*/

use serde_json::Value;

use super::FilterError;

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum Var {
  /// the candidate value
  V,
  Graph,
  Trail,
}

#[derive(Debug,Clone,PartialEq,Eq)]
pub enum Accessor {
  Field(String),
  Index(i64),
}

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum CmpOp {
  Eq,
  Ne,
  Lt,
  Le,
  Gt,
  Ge,
}

#[derive(Debug,Clone)]
pub enum Expr {
  Literal(Value),
  List(Vec<Expr>),
  Var(Var),
  Access(Box<Expr>, Accessor),
  Len(Box<Expr>),
  Not(Box<Expr>),
  And(Box<Expr>, Box<Expr>),
  Or(Box<Expr>, Box<Expr>),
  Compare(Box<Expr>, CmpOp, Box<Expr>),
  /// needle, haystack
  In(Box<Expr>, Box<Expr>),
  Matches(Box<Expr>, regex::Regex),
}

#[derive(Debug,Clone,PartialEq)]
enum Token {
  Name(String),
  Str(String),
  Num(serde_json::Number),
  Cmp(CmpOp),
  Tilde,
  Dot,
  Comma,
  LParen,
  RParen,
  LBracket,
  RBracket,
  Eof,
}

fn syntax<T>(pos : usize, msg : impl Into<String>) -> Result<T, FilterError> {
  Err(FilterError::Syntax { pos, msg: msg.into() })
}

fn is_name_char(c : char) -> bool {
  c.is_alphanumeric() || c == '_' || c == '@'
}

/// Tokens paired with their byte offset in the source.
fn tokenise(source : &str) -> Result<Vec<(usize, Token)>, FilterError> {
  let mut tokens = vec![];
  let mut chars = source.char_indices().peekable();

  while let Some(&(pos, c)) = chars.peek() {
    let token = match c {
      c if c.is_whitespace() => { chars.next(); continue }
      '.' => { chars.next(); Token::Dot }
      ',' => { chars.next(); Token::Comma }
      '(' => { chars.next(); Token::LParen }
      ')' => { chars.next(); Token::RParen }
      '[' => { chars.next(); Token::LBracket }
      ']' => { chars.next(); Token::RBracket }
      '=' | '!' | '<' | '>' => {
        chars.next();
        let next = chars.peek().map(|&(_, c)| c);
        let (token, two) = match (c, next) {
          ('=', Some('=')) => (Token::Cmp(CmpOp::Eq), true),
          ('=', Some('~')) => (Token::Tilde, true),
          ('!', Some('=')) => (Token::Cmp(CmpOp::Ne), true),
          ('<', Some('=')) => (Token::Cmp(CmpOp::Le), true),
          ('>', Some('=')) => (Token::Cmp(CmpOp::Ge), true),
          ('<', _) => (Token::Cmp(CmpOp::Lt), false),
          ('>', _) => (Token::Cmp(CmpOp::Gt), false),
          _ => return syntax(pos, format!("unexpected '{c}'")),
        };
        if two { chars.next(); }
        token
      }
      '\'' | '"' => {
        let quote = c;
        chars.next();
        let mut s = String::new();
        loop {
          match chars.next() {
            Some((_, '\\')) => match chars.next() {
              Some((_, 'n')) => s.push('\n'),
              Some((_, 't')) => s.push('\t'),
              Some((_, escaped)) => s.push(escaped),
              None => return syntax(pos, "unterminated string"),
            },
            Some((_, c)) if c == quote => break,
            Some((_, c)) => s.push(c),
            None => return syntax(pos, "unterminated string"),
          }
        }
        Token::Str(s)
      }
      c if c.is_ascii_digit() || c == '-' => {
        let text = &source[pos..pos + number_len(&source[pos..])];
        while chars.peek().is_some_and(|&(i, _)| i < pos + text.len()) {
          chars.next();
        }
        Token::Num(number(pos, text)?)
      }
      c if is_name_char(c) => {
        let mut name = String::new();
        while let Some(&(_, c)) = chars.peek() {
          if !is_name_char(c) { break }
          name.push(c);
          chars.next();
        }
        Token::Name(name)
      }
      c => return syntax(pos, format!("unexpected '{c}'")),
    };
    tokens.push((pos, token));
  }
  tokens.push((source.len(), Token::Eof));
  Ok(tokens)
}

/// Length of the number at the start of `s`: `-? digits (. digits)? ([eE] [+-]? digits)?`
///
/// A `.` only belongs to the number when a digit follows, so `graph[0].x` still works.
fn number_len(s : &str) -> usize {
  let bytes = s.as_bytes();
  let digits = |mut i : usize| { while i < bytes.len() && bytes[i].is_ascii_digit() { i += 1 } i };

  let mut end = if bytes.first() == Some(&b'-') { 1 } else { 0 };
  end = digits(end);
  if bytes.get(end) == Some(&b'.') && bytes.get(end + 1).is_some_and(u8::is_ascii_digit) {
    end = digits(end + 1);
  }
  if matches!(bytes.get(end), Some(b'e' | b'E')) {
    let mut exp = end + 1;
    if matches!(bytes.get(exp), Some(b'+' | b'-')) { exp += 1 }
    if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
      end = digits(exp);
    }
  }
  // a lone '-' still has to make progress
  end.max(1)
}

fn number(pos : usize, text : &str) -> Result<serde_json::Number, FilterError> {
  if let Ok(i) = text.parse::<i64>() {
    return Ok(i.into())
  }
  match text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
    Some(n) => Ok(n),
    None => syntax(pos, format!("'{text}' is not a number")),
  }
}

struct Parser {
  tokens : Vec<(usize, Token)>,
  index : usize,
}

impl Parser {
  fn peek(&self) -> &Token {
    &self.tokens[self.index].1
  }

  fn pos(&self) -> usize {
    self.tokens[self.index].0
  }

  fn advance(&mut self) -> Token {
    let token = self.tokens[self.index].1.clone();
    // Eof is never consumed
    if self.index + 1 < self.tokens.len() { self.index += 1 }
    token
  }

  fn at_name(&self, name : &str) -> bool {
    matches!(self.peek(), Token::Name(n) if n == name)
  }

  // "not" followed by "in" is the negated membership operator, not a negation.
  fn at_not_in(&self) -> bool {
    self.at_name("not")
      && matches!(self.tokens.get(self.index + 1), Some((_, Token::Name(n))) if n == "in")
  }

  fn expect(&mut self, token : Token) -> Result<(), FilterError> {
    if *self.peek() == token {
      self.advance();
      Ok(())
    } else {
      syntax(self.pos(), format!("expected {token:?}, found {:?}", self.peek()))
    }
  }

  fn or(&mut self) -> Result<Expr, FilterError> {
    let mut lhs = self.and()?;
    while self.at_name("or") {
      self.advance();
      let rhs = self.and()?;
      lhs = Expr::Or(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
  }

  fn and(&mut self) -> Result<Expr, FilterError> {
    let mut lhs = self.not()?;
    while self.at_name("and") {
      self.advance();
      let rhs = self.not()?;
      lhs = Expr::And(Box::new(lhs), Box::new(rhs));
    }
    Ok(lhs)
  }

  fn not(&mut self) -> Result<Expr, FilterError> {
    if self.at_name("not") {
      self.advance();
      Ok(Expr::Not(Box::new(self.not()?)))
    } else {
      self.comparison()
    }
  }

  fn comparison(&mut self) -> Result<Expr, FilterError> {
    let lhs = self.postfix()?;
    let lhs = Box::new(lhs);
    match self.peek().clone() {
      Token::Cmp(op) => {
        self.advance();
        Ok(Expr::Compare(lhs, op, Box::new(self.postfix()?)))
      }
      Token::Name(n) if n == "in" => {
        self.advance();
        Ok(Expr::In(lhs, Box::new(self.postfix()?)))
      }
      Token::Name(_) if self.at_not_in() => {
        self.advance();
        self.advance();
        Ok(Expr::Not(Box::new(Expr::In(lhs, Box::new(self.postfix()?)))))
      }
      Token::Tilde => {
        self.advance();
        let pos = self.pos();
        match self.advance() {
          Token::Str(pattern) => Ok(Expr::Matches(lhs, regex::Regex::new(&pattern)?)),
          other => syntax(pos, format!("=~ needs a string pattern, found {other:?}")),
        }
      }
      _ => Ok(*lhs),
    }
  }

  fn postfix(&mut self) -> Result<Expr, FilterError> {
    let mut expr = self.primary()?;
    loop {
      match self.peek() {
        Token::Dot => {
          self.advance();
          let pos = self.pos();
          match self.advance() {
            Token::Name(name) => expr = Expr::Access(Box::new(expr), Accessor::Field(name)),
            other => return syntax(pos, format!("expected a field name after '.', found {other:?}")),
          }
        }
        Token::LBracket => {
          self.advance();
          let pos = self.pos();
          let accessor = match self.advance() {
            Token::Str(field) => Accessor::Field(field),
            Token::Num(n) => match n.as_i64() {
              Some(i) => Accessor::Index(i),
              None => return syntax(pos, format!("index {n} is not an integer")),
            },
            other => return syntax(pos, format!("expected a string or an integer index, found {other:?}")),
          };
          self.expect(Token::RBracket)?;
          expr = Expr::Access(Box::new(expr), accessor);
        }
        _ => return Ok(expr),
      }
    }
  }

  fn primary(&mut self) -> Result<Expr, FilterError> {
    let pos = self.pos();
    match self.advance() {
      Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
      Token::Num(n) => Ok(Expr::Literal(Value::Number(n))),
      Token::LParen => {
        let expr = self.or()?;
        self.expect(Token::RParen)?;
        Ok(expr)
      }
      Token::LBracket => {
        let mut items = vec![];
        if *self.peek() != Token::RBracket {
          items.push(self.or()?);
          while *self.peek() == Token::Comma {
            self.advance();
            items.push(self.or()?);
          }
        }
        self.expect(Token::RBracket)?;
        Ok(Expr::List(items))
      }
      Token::Name(name) => match name.as_str() {
        "v" => Ok(Expr::Var(Var::V)),
        "graph" => Ok(Expr::Var(Var::Graph)),
        "trail" => Ok(Expr::Var(Var::Trail)),
        "true" => Ok(Expr::Literal(Value::Bool(true))),
        "false" => Ok(Expr::Literal(Value::Bool(false))),
        "null" => Ok(Expr::Literal(Value::Null)),
        "len" => {
          self.expect(Token::LParen)?;
          let expr = self.or()?;
          self.expect(Token::RParen)?;
          Ok(Expr::Len(Box::new(expr)))
        }
        _ => syntax(pos, format!("unknown name '{name}', expected v, graph or trail")),
      },
      Token::Eof => syntax(pos, "unexpected end of filter"),
      other => syntax(pos, format!("unexpected {other:?}")),
    }
  }
}

/// Parse a whole filter expression. Trailing input is an error.
pub fn parse(source : &str) -> Result<Expr, FilterError> {
  let mut parser = Parser { tokens: tokenise(source)?, index: 0 };
  let expr = parser.or()?;
  match parser.peek() {
    Token::Eof => Ok(expr),
    other => syntax(parser.pos(), format!("unexpected {other:?} after expression")),
  }
}

#[cfg(test)]
mod test_parse {
  use super::*;

  #[test]
  fn comparison() {
    let expr = parse("v != 'baz'").unwrap();
    assert!(matches!(expr, Expr::Compare(_, CmpOp::Ne, _)), "{expr:?}");
  }

  #[test]
  fn precedence() {
    // and binds tighter than or
    let expr = parse("v == 1 or v == 2 and v == 3").unwrap();
    match expr {
      Expr::Or(_, rhs) => assert!(matches!(*rhs, Expr::And(..))),
      other => panic!("expected or, got {other:?}"),
    }
  }

  #[test]
  fn not_in() {
    let expr = parse("v not in ['a', 'b']").unwrap();
    match expr {
      Expr::Not(inner) => assert!(matches!(*inner, Expr::In(..))),
      other => panic!("expected not in, got {other:?}"),
    }
  }

  #[test]
  fn access_chain() {
    let expr = parse("graph[0]['@id'].x").unwrap();
    match expr {
      Expr::Access(base, Accessor::Field(f)) => {
        assert_eq!(f, "x");
        assert!(matches!(*base, Expr::Access(_, Accessor::Field(_))));
      }
      other => panic!("expected access, got {other:?}"),
    }
  }

  #[test]
  fn numbers() {
    assert!(matches!(parse("-1").unwrap(), Expr::Literal(Value::Number(n)) if n.as_i64() == Some(-1)));
    assert!(matches!(parse("2.5e1").unwrap(), Expr::Literal(Value::Number(n)) if n.as_f64() == Some(25.0)));
    // the dot after an index is field access, not a decimal point
    assert!(matches!(parse("graph[0].x").unwrap(), Expr::Access(_, Accessor::Field(f)) if f == "x"));
  }

  #[test]
  fn escapes() {
    assert!(matches!(parse(r#""a\"b""#).unwrap(), Expr::Literal(Value::String(s)) if s == "a\"b"));
  }

  #[test]
  fn errors() {
    for bad in ["", "v ==", "v = 1", "x == 1", "(v == 1", "v == 1 2", "v =~ 1", "v[1.5]", "'open", "v =~ '('"] {
      assert!(parse(bad).is_err(), "{bad} should not parse");
    }
  }

  #[test]
  fn error_position() {
    match parse("v == 1 )") {
      Err(FilterError::Syntax { pos, .. }) => assert_eq!(pos, 7),
      other => panic!("expected syntax error, got {other:?}"),
    }
  }
}
