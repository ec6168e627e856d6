//! A small JSONPath-style expression language over `serde_json::Value`.
//!
//! Supported syntax:
//!
//! * `$` root (optional; `status.phase` and `$.status.phase` are equivalent)
//! * `.name` and `['name']` / `["name"]` member access
//! * `.*` and `[*]` wildcards
//! * `[2]` and `[-1]` array indexes
//! * `..name`, `..*` and `..[...]` recursive descent
//! * bracket unions such as `['a','b']` or `[0,2]`
//!
//! Evaluation returns every match in document order. Callers that only want
//! a single value take the first one.

use std::fmt;
use std::str::FromStr;

use serde_json::Value;

use crate::error::WatchDiffError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Selector {
    Name(String),
    Index(i64),
    Wildcard,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Child(Vec<Selector>),
    Descendant(Vec<Selector>),
}

/// A parsed path expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    source: String,
    segments: Vec<Segment>,
}

impl JsonPath {
    pub fn parse(expr: &str) -> Result<Self, WatchDiffError> {
        let segments = Parser::new(expr).parse()?;
        Ok(Self {
            source: expr.to_string(),
            segments,
        })
    }

    /// The expression exactly as it was written.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Evaluate against `root`, returning zero or more matches.
    pub fn query<'a>(&self, root: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![root];
        for segment in &self.segments {
            let mut next = Vec::new();
            match segment {
                Segment::Child(selectors) => {
                    for value in current {
                        select_into(value, selectors, &mut next);
                    }
                }
                Segment::Descendant(selectors) => {
                    for value in current {
                        let mut nodes = Vec::new();
                        collect_descendants(value, &mut nodes);
                        for node in nodes {
                            select_into(node, selectors, &mut next);
                        }
                    }
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    pub fn first<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.query(root).into_iter().next()
    }
}

impl FromStr for JsonPath {
    type Err = WatchDiffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

fn select_into<'a>(value: &'a Value, selectors: &[Selector], out: &mut Vec<&'a Value>) {
    for selector in selectors {
        match (selector, value) {
            (Selector::Name(name), Value::Object(map)) => {
                if let Some(child) = map.get(name) {
                    out.push(child);
                }
            }
            (Selector::Index(index), Value::Array(items)) => {
                let len = items.len() as i64;
                let resolved = if *index < 0 { len + index } else { *index };
                if (0..len).contains(&resolved) {
                    out.push(&items[resolved as usize]);
                }
            }
            (Selector::Wildcard, Value::Object(map)) => out.extend(map.values()),
            (Selector::Wildcard, Value::Array(items)) => out.extend(items.iter()),
            _ => {}
        }
    }
}

/// Pre-order walk: the node itself, then every nested value.
fn collect_descendants<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(value);
    match value {
        Value::Object(map) => map.values().for_each(|child| collect_descendants(child, out)),
        Value::Array(items) => items.iter().for_each(|child| collect_descendants(child, out)),
        _ => {}
    }
}

struct Parser<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> Parser<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 0 }
    }

    fn error(&self, reason: impl Into<String>) -> WatchDiffError {
        WatchDiffError::PathParse {
            expr: self.src.to_string(),
            offset: self.pos,
            reason: reason.into(),
        }
    }

    fn rest(&self) -> &'s str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
            self.pos += c.len_utf8();
        }
    }

    fn parse(mut self) -> Result<Vec<Segment>, WatchDiffError> {
        let mut segments = Vec::new();
        if self.src.trim().is_empty() {
            return Err(self.error("empty expression"));
        }

        if !self.eat('$') {
            // A bare leading member, e.g. `status.phase`.
            if matches!(self.peek(), Some(c) if is_name_char(c)) {
                segments.push(Segment::Child(vec![Selector::Name(self.name()?)]));
            }
        }

        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    if self.eat('.') {
                        segments.push(Segment::Descendant(self.dotted_or_bracket()?));
                    } else {
                        segments.push(Segment::Child(self.dotted()?));
                    }
                }
                '[' => segments.push(Segment::Child(self.bracket()?)),
                _ => return Err(self.error(format!("unexpected character {c:?}"))),
            }
        }
        Ok(segments)
    }

    fn dotted_or_bracket(&mut self) -> Result<Vec<Selector>, WatchDiffError> {
        if self.peek() == Some('[') {
            self.bracket()
        } else {
            self.dotted()
        }
    }

    fn dotted(&mut self) -> Result<Vec<Selector>, WatchDiffError> {
        if self.eat('*') {
            return Ok(vec![Selector::Wildcard]);
        }
        Ok(vec![Selector::Name(self.name()?)])
    }

    fn name(&mut self) -> Result<String, WatchDiffError> {
        let len: usize = self
            .rest()
            .chars()
            .take_while(|c| is_name_char(*c))
            .map(char::len_utf8)
            .sum();
        if len == 0 {
            return Err(self.error("expected a member name"));
        }
        let name = self.rest()[..len].to_string();
        self.pos += len;
        Ok(name)
    }

    fn bracket(&mut self) -> Result<Vec<Selector>, WatchDiffError> {
        self.eat('[');
        let mut selectors = Vec::new();
        loop {
            self.skip_whitespace();
            let selector = match self.peek() {
                Some('*') => {
                    self.pos += 1;
                    Selector::Wildcard
                }
                Some(q @ ('\'' | '"')) => Selector::Name(self.quoted(q)?),
                Some(c) if c == '-' || c.is_ascii_digit() => Selector::Index(self.index()?),
                Some(c) => return Err(self.error(format!("unexpected character {c:?} in brackets"))),
                None => return Err(self.error("unterminated bracket")),
            };
            selectors.push(selector);
            self.skip_whitespace();
            if self.eat(',') {
                continue;
            }
            if self.eat(']') {
                return Ok(selectors);
            }
            return Err(self.error("expected ',' or ']'"));
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, WatchDiffError> {
        self.pos += 1;
        let mut out = String::new();
        let mut chars = self.rest().chars();
        let mut consumed = 0;
        loop {
            let Some(c) = chars.next() else {
                self.pos += consumed;
                return Err(self.error("unterminated string"));
            };
            consumed += c.len_utf8();
            if c == quote {
                break;
            }
            if c == '\\' {
                let Some(escaped) = chars.next() else {
                    self.pos += consumed;
                    return Err(self.error("dangling escape"));
                };
                consumed += escaped.len_utf8();
                out.push(escaped);
            } else {
                out.push(c);
            }
        }
        self.pos += consumed;
        Ok(out)
    }

    fn index(&mut self) -> Result<i64, WatchDiffError> {
        let len = self
            .rest()
            .char_indices()
            .take_while(|(i, c)| c.is_ascii_digit() || (*i == 0 && *c == '-'))
            .count();
        let digits = &self.rest()[..len];
        let value = digits
            .parse::<i64>()
            .map_err(|_| self.error(format!("invalid index {digits:?}")))?;
        self.pos += len;
        Ok(value)
    }
}

fn is_name_char(c: char) -> bool {
    !matches!(c, '.' | '[' | ']' | '\'' | '"' | ',' | '*' | '$') && !c.is_whitespace()
}
