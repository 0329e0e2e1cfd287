//! Label and field selector parsing and matching
//!
//! Label selectors follow the Kubernetes grammar: comma-separated
//! requirements, each an equality (`k=v`, `k==v`, `k!=v`), a set expression
//! (`k in (a,b)`, `k notin (a,b)`), or an existence check (`k`, `!k`).
//! Field selectors support equality and inequality only.

use std::fmt;

use serde_json::{Map, Value};

use crate::objects;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid selector: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Exists(String),
    NotExists(String),
}

impl Requirement {
    fn matches(&self, labels: Option<&Map<String, Value>>) -> bool {
        let get = |key: &str| labels.and_then(|l| l.get(key)).and_then(Value::as_str);
        match self {
            Requirement::Equals(key, value) => get(key) == Some(value.as_str()),
            Requirement::NotEquals(key, value) => get(key) != Some(value.as_str()),
            Requirement::In(key, values) => {
                get(key).is_some_and(|v| values.iter().any(|want| want == v))
            }
            Requirement::NotIn(key, values) => {
                !get(key).is_some_and(|v| values.iter().any(|want| want == v))
            }
            Requirement::Exists(key) => get(key).is_some(),
            Requirement::NotExists(key) => get(key).is_none(),
        }
    }
}

/// A parsed `labelSelector`. The empty selector matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn parse(selector: &str) -> Result<Self, ParseError> {
        let mut requirements = Vec::new();
        for chunk in split_requirements(selector) {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                continue;
            }
            requirements.push(parse_requirement(chunk)?);
        }
        Ok(Self { requirements })
    }

    pub fn matches(&self, obj: &Value) -> bool {
        let labels = objects::labels(obj);
        self.requirements.iter().all(|req| req.matches(labels))
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

/// Split on commas outside parentheses, so `k in (a,b),x=y` yields two
/// requirements.
fn split_requirements(selector: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in selector.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                chunks.push(&selector[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    chunks.push(&selector[start..]);
    chunks
}

fn parse_requirement(chunk: &str) -> Result<Requirement, ParseError> {
    if let Some(key) = chunk.strip_prefix('!') {
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError(chunk.to_string()));
        }
        return Ok(Requirement::NotExists(key.to_string()));
    }
    for (token, not) in [(" notin ", true), (" in ", false)] {
        if let Some((key, rest)) = split_keyword(chunk, token) {
            let values = parse_value_set(rest).ok_or_else(|| ParseError(chunk.to_string()))?;
            let key = key.to_string();
            return Ok(if not {
                Requirement::NotIn(key, values)
            } else {
                Requirement::In(key, values)
            });
        }
    }
    if let Some((key, value)) = chunk.split_once("!=") {
        return Ok(Requirement::NotEquals(
            key.trim().to_string(),
            value.trim().to_string(),
        ));
    }
    if let Some((key, value)) = chunk.split_once("==").or_else(|| chunk.split_once('=')) {
        let key = key.trim();
        if key.is_empty() {
            return Err(ParseError(chunk.to_string()));
        }
        return Ok(Requirement::Equals(key.to_string(), value.trim().to_string()));
    }
    if chunk.contains(|c: char| c.is_whitespace() || c == '(' || c == ')') {
        return Err(ParseError(chunk.to_string()));
    }
    Ok(Requirement::Exists(chunk.to_string()))
}

fn split_keyword<'a>(chunk: &'a str, keyword: &str) -> Option<(&'a str, &'a str)> {
    let idx = chunk.find(keyword)?;
    let key = chunk[..idx].trim();
    if key.is_empty() || key.contains('=') {
        return None;
    }
    Some((key, chunk[idx + keyword.len()..].trim()))
}

fn parse_value_set(rest: &str) -> Option<Vec<String>> {
    let inner = rest.strip_prefix('(')?.strip_suffix(')')?;
    Some(
        inner
            .split(',')
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect(),
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FieldOp {
    Equals,
    NotEquals,
}

/// A parsed `fieldSelector`: equality and inequality over dotted field
/// paths such as `metadata.name` or `status.phase`. Fields the object does
/// not carry compare as the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelector {
    requirements: Vec<(String, FieldOp, String)>,
}

impl FieldSelector {
    pub fn parse(selector: &str) -> Result<Self, ParseError> {
        let mut requirements = Vec::new();
        for chunk in selector.split(',') {
            let chunk = chunk.trim();
            if chunk.is_empty() {
                continue;
            }
            let (path, op, value) = if let Some((path, value)) = chunk.split_once("!=") {
                (path, FieldOp::NotEquals, value)
            } else if let Some((path, value)) =
                chunk.split_once("==").or_else(|| chunk.split_once('='))
            {
                (path, FieldOp::Equals, value)
            } else {
                return Err(ParseError(chunk.to_string()));
            };
            let path = path.trim();
            if path.is_empty() {
                return Err(ParseError(chunk.to_string()));
            }
            requirements.push((path.to_string(), op, value.trim().to_string()));
        }
        Ok(Self { requirements })
    }

    pub fn matches(&self, obj: &Value) -> bool {
        self.requirements.iter().all(|(path, op, want)| {
            let actual = objects::field(obj, path);
            let actual = match &actual {
                Some(Value::String(s)) => s.as_str(),
                Some(Value::Null) | None => "",
                Some(other) => return compare_non_string(other, op, want),
            };
            match op {
                FieldOp::Equals => actual == want,
                FieldOp::NotEquals => actual != want,
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }
}

fn compare_non_string(actual: &Value, op: &FieldOp, want: &str) -> bool {
    let rendered = actual.to_string();
    match op {
        FieldOp::Equals => rendered == want,
        FieldOp::NotEquals => rendered != want,
    }
}
