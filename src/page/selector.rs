//! CSS selector subset used for matching watched elements and delegated handlers.
//!
//! Supports type, universal, `#id`, `.class` and attribute steps, the four
//! combinators (descendant, `>`, `+`, `~`) and comma-separated groups.

use std::fmt;

use super::dom::{Document, ElementData, NodeId};
use crate::error::SelectorError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrOp {
    Exists,
    Equals(String),
    Includes(String),
    DashMatch(String),
    Prefix(String),
    Suffix(String),
    Substring(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct AttrCondition {
    name: String,
    op: AttrOp,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Step {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
    Adjacent,
    Sibling,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Part {
    step: Step,
    // Relation to the part on the left.
    combinator: Option<Combinator>,
}

/// A parsed selector list. Keeps its source text for logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    groups: Vec<Vec<Part>>,
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl Selector {
    pub fn parse(source: &str) -> Result<Self, SelectorError> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(SelectorError::Empty);
        }
        let groups = split_groups(trimmed)?
            .iter()
            .map(|group| parse_chain(group))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: source.to_string(),
            groups,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Exact policy: only the node itself. Non-elements never match.
    pub fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if !doc.is_element(node) {
            return false;
        }
        self.groups
            .iter()
            .any(|parts| match_part(doc, parts, parts.len() - 1, node))
    }

    /// First matching descendant of `root` in document order; `root` itself is not considered.
    pub fn query_first(&self, doc: &Document, root: NodeId) -> Option<NodeId> {
        doc.descendants(root)
            .into_iter()
            .find(|candidate| self.matches(doc, *candidate))
    }

    pub fn query_all(&self, doc: &Document, root: NodeId) -> Vec<NodeId> {
        doc.descendants(root)
            .into_iter()
            .filter(|candidate| self.matches(doc, *candidate))
            .collect()
    }
}

fn match_part(doc: &Document, parts: &[Part], index: usize, node: NodeId) -> bool {
    let part = &parts[index];
    let Some(el) = doc.element(node) else {
        return false;
    };
    if !step_matches(&part.step, el) {
        return false;
    }
    if index == 0 {
        return true;
    }
    match part.combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Child => doc
            .parent_element(node)
            .is_some_and(|parent| match_part(doc, parts, index - 1, parent)),
        Combinator::Descendant => doc
            .ancestors(node)
            .any(|ancestor| match_part(doc, parts, index - 1, ancestor)),
        Combinator::Adjacent => doc
            .preceding_element_siblings(node)
            .first()
            .is_some_and(|prev| match_part(doc, parts, index - 1, *prev)),
        Combinator::Sibling => doc
            .preceding_element_siblings(node)
            .into_iter()
            .any(|prev| match_part(doc, parts, index - 1, prev)),
    }
}

fn step_matches(step: &Step, el: &ElementData) -> bool {
    if let Some(tag) = &step.tag {
        if !tag.eq_ignore_ascii_case(el.tag_name()) {
            return false;
        }
    }
    if let Some(id) = &step.id {
        if el.id() != Some(id.as_str()) {
            return false;
        }
    }
    if !step.classes.iter().all(|c| el.has_class(c)) {
        return false;
    }
    step.attrs.iter().all(|cond| {
        let Some(value) = el.attribute(&cond.name) else {
            return false;
        };
        match &cond.op {
            AttrOp::Exists => true,
            AttrOp::Equals(expected) => value == expected,
            AttrOp::Includes(expected) => value.split_ascii_whitespace().any(|v| v == expected),
            AttrOp::DashMatch(expected) => {
                value == expected || value.starts_with(&format!("{expected}-"))
            }
            AttrOp::Prefix(expected) => !expected.is_empty() && value.starts_with(expected.as_str()),
            AttrOp::Suffix(expected) => !expected.is_empty() && value.ends_with(expected.as_str()),
            AttrOp::Substring(expected) => !expected.is_empty() && value.contains(expected.as_str()),
        }
    })
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

fn unsupported(source: &str) -> SelectorError {
    SelectorError::UnsupportedSelector(source.to_string())
}

/// Splits on top-level commas, honoring brackets and quotes.
fn split_groups(source: &str) -> Result<Vec<String>, SelectorError> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in source.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, '[') => {
                depth += 1;
                current.push(ch);
            }
            (None, ']') => {
                depth = depth.checked_sub(1).ok_or_else(|| unsupported(source))?;
                current.push(ch);
            }
            (None, ',') if depth == 0 => {
                let group = current.trim();
                if group.is_empty() {
                    return Err(unsupported(source));
                }
                groups.push(group.to_string());
                current.clear();
            }
            (None, c) => current.push(c),
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(unsupported(source));
    }
    let group = current.trim();
    if group.is_empty() {
        return Err(unsupported(source));
    }
    groups.push(group.to_string());
    Ok(groups)
}

fn tokenize(source: &str) -> Result<Vec<String>, SelectorError> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    let flush = |current: &mut String, tokens: &mut Vec<String>| {
        if !current.is_empty() {
            tokens.push(std::mem::take(current));
        }
    };

    for ch in source.chars() {
        match (quote, ch) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"') | (None, '\'') if depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            (None, '[') => {
                depth += 1;
                current.push(ch);
            }
            (None, ']') => {
                depth = depth.checked_sub(1).ok_or_else(|| unsupported(source))?;
                current.push(ch);
            }
            (None, '>') | (None, '+') | (None, '~') if depth == 0 => {
                flush(&mut current, &mut tokens);
                tokens.push(ch.to_string());
            }
            (None, c) if c.is_whitespace() && depth == 0 => flush(&mut current, &mut tokens),
            (None, c) => current.push(c),
        }
    }
    if depth != 0 || quote.is_some() {
        return Err(unsupported(source));
    }
    flush(&mut current, &mut tokens);
    Ok(tokens)
}

fn parse_chain(source: &str) -> Result<Vec<Part>, SelectorError> {
    let mut parts: Vec<Part> = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in tokenize(source)? {
        let combinator = match token.as_str() {
            ">" => Some(Combinator::Child),
            "+" => Some(Combinator::Adjacent),
            "~" => Some(Combinator::Sibling),
            _ => None,
        };
        if let Some(combinator) = combinator {
            if pending.is_some() || parts.is_empty() {
                return Err(unsupported(source));
            }
            pending = Some(combinator);
            continue;
        }

        let step = parse_step(&token).ok_or_else(|| unsupported(source))?;
        let combinator = if parts.is_empty() {
            None
        } else {
            Some(pending.take().unwrap_or(Combinator::Descendant))
        };
        parts.push(Part { step, combinator });
    }

    if parts.is_empty() || pending.is_some() {
        return Err(unsupported(source));
    }
    Ok(parts)
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii()
}

fn take_ident(chars: &[char], start: usize) -> Option<(String, usize)> {
    let end = chars[start..]
        .iter()
        .position(|c| !is_ident_char(*c))
        .map_or(chars.len(), |offset| start + offset);
    if end == start || chars[start].is_ascii_digit() {
        return None;
    }
    Some((chars[start..end].iter().collect(), end))
}

fn parse_step(token: &str) -> Option<Step> {
    let chars: Vec<char> = token.chars().collect();
    let mut step = Step::default();
    let mut universal = false;
    let mut i = 0usize;

    while i < chars.len() {
        match chars[i] {
            '*' if i == 0 => {
                universal = true;
                i += 1;
            }
            '#' => {
                let (id, next) = take_ident(&chars, i + 1)?;
                if step.id.replace(id).is_some() {
                    return None;
                }
                i = next;
            }
            '.' => {
                let (class, next) = take_ident(&chars, i + 1)?;
                step.classes.push(class);
                i = next;
            }
            '[' => {
                let close = chars[i..].iter().position(|c| *c == ']')? + i;
                let body: String = chars[i + 1..close].iter().collect();
                step.attrs.push(parse_attr(&body)?);
                i = close + 1;
            }
            _ if i == 0 => {
                let (tag, next) = take_ident(&chars, 0)?;
                step.tag = Some(tag.to_ascii_lowercase());
                i = next;
            }
            _ => return None,
        }
    }

    let empty = step.tag.is_none() && step.id.is_none() && step.classes.is_empty() && step.attrs.is_empty();
    if empty && !universal {
        return None;
    }
    Some(step)
}

fn parse_attr(body: &str) -> Option<AttrCondition> {
    let body = body.trim();
    let op_start = body.find(['=', '~', '|', '^', '$', '*']);
    let Some(op_start) = op_start else {
        let name = body.to_ascii_lowercase();
        if name.is_empty() || !name.chars().all(is_ident_char) {
            return None;
        }
        return Some(AttrCondition {
            name,
            op: AttrOp::Exists,
        });
    };

    let name = body[..op_start].trim().to_ascii_lowercase();
    if name.is_empty() || !name.chars().all(is_ident_char) {
        return None;
    }
    let rest = &body[op_start..];
    let (op_len, make): (usize, fn(String) -> AttrOp) = if rest.starts_with('=') {
        (1, AttrOp::Equals)
    } else if rest.starts_with("~=") {
        (2, AttrOp::Includes)
    } else if rest.starts_with("|=") {
        (2, AttrOp::DashMatch)
    } else if rest.starts_with("^=") {
        (2, AttrOp::Prefix)
    } else if rest.starts_with("$=") {
        (2, AttrOp::Suffix)
    } else if rest.starts_with("*=") {
        (2, AttrOp::Substring)
    } else {
        return None;
    };

    let raw = rest[op_len..].trim();
    let value = match raw.chars().next() {
        Some(q @ ('"' | '\'')) => {
            if raw.len() < 2 || !raw.ends_with(q) {
                return None;
            }
            raw[1..raw.len() - 1].to_string()
        }
        Some(_) if raw.chars().all(is_ident_char) => raw.to_string(),
        _ => return None,
    };
    Some(AttrCondition {
        name,
        op: make(value),
    })
}
