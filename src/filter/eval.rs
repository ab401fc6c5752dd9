//! Evaluates a parsed filter expression against one candidate.

use std::cmp::Ordering;

use serde_json::Value;

use super::FilterError;
use super::parse::{Accessor, CmpOp, Expr, Var};

static NULL : Value = Value::Null;

/// The variables an expression can refer to.
pub struct Scope<'a> {
  pub v : &'a Value,
  pub graph : &'a [Value],
  /// the trail as an array of labels
  pub trail : &'a Value,
}

/// Intermediate result. Borrows from the scope or the expression where it can,
/// so that looking at `graph` doesn't copy the whole record.
#[derive(Debug,Clone)]
pub enum Val<'a> {
  Ref(&'a Value),
  Owned(Value),
  Nodes(&'a [Value]),
}

impl<'a> Val<'a> {
  pub fn truthy(&self) -> bool {
    match self {
      Val::Ref(v) => truthy(v),
      Val::Owned(v) => truthy(v),
      Val::Nodes(nodes) => !nodes.is_empty(),
    }
  }

  fn value(&self) -> std::borrow::Cow<'_, Value> {
    use std::borrow::Cow;
    match self {
      Val::Ref(v) => Cow::Borrowed(*v),
      Val::Owned(v) => Cow::Borrowed(v),
      Val::Nodes(nodes) => Cow::Owned(Value::Array(nodes.to_vec())),
    }
  }
}

/// Python-ish truthiness, which is also what decides whether a key's value is worth visiting.
pub fn truthy(value : &Value) -> bool {
  match value {
    Value::Null => false,
    Value::Bool(b) => *b,
    Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
    Value::String(s) => !s.is_empty(),
    Value::Array(a) => !a.is_empty(),
    Value::Object(o) => !o.is_empty(),
  }
}

fn eval_error<T>(msg : impl Into<String>) -> Result<T, FilterError> {
  Err(FilterError::Eval(msg.into()))
}

/// Resolve a possibly negative index against a length.
fn resolve(index : i64, len : usize) -> Option<usize> {
  let resolved = if index < 0 { len as i64 + index } else { index };
  (0..len as i64).contains(&resolved).then_some(resolved as usize)
}

fn step<'v>(value : &'v Value, accessor : &Accessor) -> Option<&'v Value> {
  match (value, accessor) {
    (Value::Object(object), Accessor::Field(field)) => object.get(field),
    (Value::Array(items), Accessor::Index(i)) => resolve(*i, items.len()).map(|i| &items[i]),
    _ => None,
  }
}

fn access<'a>(base : Val<'a>, accessor : &Accessor) -> Val<'a> {
  match base {
    Val::Ref(v) => Val::Ref(step(v, accessor).unwrap_or(&NULL)),
    Val::Owned(v) => Val::Owned(step(&v, accessor).cloned().unwrap_or(Value::Null)),
    Val::Nodes(nodes) => match accessor {
      Accessor::Index(i) => Val::Ref(resolve(*i, nodes.len()).map(|i| &nodes[i]).unwrap_or(&NULL)),
      Accessor::Field(_) => Val::Ref(&NULL),
    },
  }
}

fn equal(lhs : &Value, rhs : &Value) -> bool {
  match (lhs, rhs) {
    // so that 1 == 1.0
    (Value::Number(l), Value::Number(r)) => l.as_f64() == r.as_f64(),
    (l, r) => l == r,
  }
}

fn order(lhs : &Value, rhs : &Value) -> Result<Ordering, FilterError> {
  let ordering = match (lhs, rhs) {
    (Value::Number(l), Value::Number(r)) => l.as_f64().partial_cmp(&r.as_f64()),
    (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
    (Value::Bool(l), Value::Bool(r)) => Some(l.cmp(r)),
    _ => None,
  };
  match ordering {
    Some(ordering) => Ok(ordering),
    None => eval_error(format!("cannot order {lhs} and {rhs}")),
  }
}

fn contains(haystack : &Val, needle : &Value) -> Result<bool, FilterError> {
  if let Val::Nodes(nodes) = haystack {
    return Ok(nodes.iter().any(|node| equal(node, needle)))
  }
  match (&*haystack.value(), needle) {
    (Value::String(h), Value::String(n)) => Ok(h.contains(n.as_str())),
    (Value::Array(items), needle) => Ok(items.iter().any(|item| equal(item, needle))),
    (Value::Object(object), Value::String(key)) => Ok(object.contains_key(key)),
    (haystack, needle) => eval_error(format!("cannot look for {needle} in {haystack}")),
  }
}

fn len(val : &Val) -> Result<usize, FilterError> {
  match val {
    Val::Nodes(nodes) => Ok(nodes.len()),
    val => match &*val.value() {
      Value::String(s) => Ok(s.chars().count()),
      Value::Array(a) => Ok(a.len()),
      Value::Object(o) => Ok(o.len()),
      other => eval_error(format!("{other} has no length")),
    },
  }
}

pub fn evaluate<'a>(expr : &'a Expr, scope : &Scope<'a>) -> Result<Val<'a>, FilterError> {
  let result = match expr {
    Expr::Literal(value) => Val::Ref(value),
    Expr::List(items) => {
      let values = items
        .iter()
        .map(|item| evaluate(item, scope).map(|val| val.value().into_owned()))
        .collect::<Result<Vec<Value>, FilterError>>()?;
      Val::Owned(Value::Array(values))
    }
    Expr::Var(Var::V) => Val::Ref(scope.v),
    Expr::Var(Var::Graph) => Val::Nodes(scope.graph),
    Expr::Var(Var::Trail) => Val::Ref(scope.trail),
    Expr::Access(base, accessor) => access(evaluate(base, scope)?, accessor),
    Expr::Len(inner) => Val::Owned(Value::from(len(&evaluate(inner, scope)?)?)),
    Expr::Not(inner) => Val::Owned(Value::Bool(!evaluate(inner, scope)?.truthy())),
    // both short-circuit, like python
    Expr::And(lhs, rhs) => {
      let lhs = evaluate(lhs, scope)?;
      if lhs.truthy() { evaluate(rhs, scope)? } else { lhs }
    }
    Expr::Or(lhs, rhs) => {
      let lhs = evaluate(lhs, scope)?;
      if lhs.truthy() { lhs } else { evaluate(rhs, scope)? }
    }
    Expr::Compare(lhs, op, rhs) => {
      let lhs = evaluate(lhs, scope)?;
      let rhs = evaluate(rhs, scope)?;
      let (lhs, rhs) = (lhs.value(), rhs.value());
      let result = match op {
        CmpOp::Eq => equal(&lhs, &rhs),
        CmpOp::Ne => !equal(&lhs, &rhs),
        CmpOp::Lt => order(&lhs, &rhs)? == Ordering::Less,
        CmpOp::Le => order(&lhs, &rhs)? != Ordering::Greater,
        CmpOp::Gt => order(&lhs, &rhs)? == Ordering::Greater,
        CmpOp::Ge => order(&lhs, &rhs)? != Ordering::Less,
      };
      Val::Owned(Value::Bool(result))
    }
    Expr::In(needle, haystack) => {
      let needle = evaluate(needle, scope)?;
      let haystack = evaluate(haystack, scope)?;
      Val::Owned(Value::Bool(contains(&haystack, &needle.value())?))
    }
    Expr::Matches(lhs, regex) => match &*evaluate(lhs, scope)?.value() {
      Value::String(s) => Val::Owned(Value::Bool(regex.is_match(s))),
      other => return eval_error(format!("cannot match {other} against /{regex}/")),
    },
  };
  Ok(result)
}

#[cfg(test)]
mod test_eval {
  use super::*;
  use serde_json::json;

  fn eval(source : &str, v : Value) -> Result<bool, FilterError> {
    let graph = vec![
      json!({"@id": "https://example.org/rec/1"}),
      json!({"@type": "Instance", "language": [{"code": "swe"}], "extent": ""}),
    ];
    let trail = json!(["instanceOf", "subject"]);
    let expr = super::super::parse::parse(source)?;
    let scope = Scope { v: &v, graph: &graph, trail: &trail };
    let truthy = evaluate(&expr, &scope)?.truthy();
    Ok(truthy)
  }

  #[test]
  fn truthiness() {
    for falsy in [json!(null), json!(false), json!(0), json!(0.0), json!(""), json!([]), json!({})] {
      assert!(!truthy(&falsy), "{falsy}");
    }
    for truthy_value in [json!(true), json!(1), json!(-0.5), json!("x"), json!([0]), json!({"a": null})] {
      assert!(truthy(&truthy_value), "{truthy_value}");
    }
  }

  #[test]
  fn comparisons() {
    assert!(eval("v == 1.0", json!(1)).unwrap());
    assert!(eval("v < 2 and v >= 1", json!(1)).unwrap());
    assert!(eval("v > 'a'", json!("b")).unwrap());
    assert!(eval("v <= 'a'", json!("a")).unwrap());
    assert!(!eval("v != v", json!({"x": [1, 2]})).unwrap());
  }

  #[test]
  fn bad_ordering() {
    assert!(matches!(eval("v < 1", json!("a")), Err(FilterError::Eval(_))));
  }

  #[test]
  fn membership() {
    assert!(eval("v in ['a', 'b']", json!("b")).unwrap());
    assert!(eval("v not in ['a', 'b']", json!("c")).unwrap());
    assert!(eval("'ell' in v", json!("hello")).unwrap());
    assert!(eval("'code' in v", json!({"code": "swe"})).unwrap());
    assert!(eval("graph[1] in graph", json!(null)).unwrap());
    assert!(matches!(eval("1 in v", json!(5)), Err(FilterError::Eval(_))));
  }

  #[test]
  fn regex() {
    assert!(eval("v =~ '^sw'", json!("swe")).unwrap());
    assert!(!eval("v =~ '^sw'", json!("eng")).unwrap());
    assert!(matches!(eval("v =~ 'x'", json!(1)), Err(FilterError::Eval(_))));
  }

  #[test]
  fn access() {
    assert!(eval("graph[1].language[0].code == 'swe'", json!(null)).unwrap());
    assert!(eval("graph[-1]['@type'] == 'Instance'", json!(null)).unwrap());
    assert!(eval("trail[0] == 'instanceOf' and trail[-1] == 'subject'", json!(null)).unwrap());
    // missing things are null
    assert!(eval("graph[5] == null and v.nope == null and graph.nope == null", json!({"a": 1})).unwrap());
    assert!(!eval("graph[1].extent", json!(null)).unwrap());
  }

  #[test]
  fn lengths() {
    assert!(eval("len(graph) == 2", json!(null)).unwrap());
    assert!(eval("len(v) == 3", json!("åäö")).unwrap());
    assert!(eval("len(v) == 1", json!({"k": 1})).unwrap());
    assert!(matches!(eval("len(v)", json!(3)), Err(FilterError::Eval(_))));
  }

  #[test]
  fn short_circuit() {
    // the right hand side would fail, but is never evaluated
    assert!(!eval("false and v < 1", json!("a")).unwrap());
    assert!(eval("true or v < 1", json!("a")).unwrap());
    assert!(eval("not (v == 'a')", json!("b")).unwrap());
  }

  #[test]
  fn suffix_of_id() {
    assert!(eval("graph[0]['@id'] =~ '/1$'", json!(null)).unwrap());
  }
}
