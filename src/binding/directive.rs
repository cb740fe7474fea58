//! Directive value grammar.
//!
//! ```text
//! value  := clause ("," clause)*
//! clause := path (":" param)? ("|" parse)?
//! path   := name ("." name)*
//! ```
//!
//! `cb-class="isActive:active, isBusy:busy"` has two clauses; only
//! directives flagged `multiple` read past the first.

use logos::Logos;

/// Directive value token.
#[derive(Logos, Debug, Clone, Copy, PartialEq)]
pub enum DirectiveToken {
    #[token(",")]
    Comma,

    #[token(":")]
    Colon,

    #[token("|")]
    Pipe,

    /// Anything between separators: a path, a parameter or a parse
    /// function name.
    #[regex(r"[^,:|]+")]
    Text,
}

/// One parsed `path:param|parse` clause.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Clause {
    /// The clause text as written, trimmed.
    pub raw: String,
    /// Cleaned property path, e.g. `["model", "name"]`. Empty for a
    /// value-less clause.
    pub path: Vec<String>,
    pub param: Option<String>,
    /// Cleaned path of the parse function, resolved against the view.
    pub parse: Option<String>,
}

impl Clause {
    /// The property the clause binds: the last path segment.
    pub fn property(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    /// Path segments leading to the object owning [`property`](Self::property).
    pub fn owner_path(&self) -> &[String] {
        match self.path.split_last() {
            Some((_, owner)) => owner,
            None => &[],
        }
    }

    /// Whether the clause carries no property at all.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }
}

/// Strip everything except ASCII alphanumerics, `_` and `.`.
pub fn clean_property_name(value: &str) -> String {
    value
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.')
        .collect()
}

fn split_path(text: &str) -> Vec<String> {
    clean_property_name(text)
        .split('.')
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

#[derive(Clone, Copy, PartialEq)]
enum Part {
    Path,
    Param,
    Parse,
}

/// Parse a directive value into clauses. With `multiple` false only the
/// first clause is returned. An empty value yields a single empty clause.
pub fn parse_clauses(value: &str, multiple: bool) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let mut current = Clause::default();
    let mut raw = String::new();
    let mut part = Part::Path;

    let mut finish = |current: &mut Clause, raw: &mut String| {
        current.raw = raw.trim().to_owned();
        clauses.push(std::mem::take(current));
        raw.clear();
    };

    for (result, span) in DirectiveToken::lexer(value).spanned() {
        let Ok(token) = result else { continue };
        let text = &value[span];
        match token {
            DirectiveToken::Comma => {
                finish(&mut current, &mut raw);
                part = Part::Path;
                continue;
            }
            DirectiveToken::Colon if part == Part::Path => part = Part::Param,
            DirectiveToken::Pipe => part = Part::Parse,
            DirectiveToken::Colon => {}
            DirectiveToken::Text => match part {
                Part::Path => current.path = split_path(text),
                Part::Param => {
                    if current.param.is_none() {
                        let param = text.trim();
                        current.param = (!param.is_empty()).then(|| param.to_owned());
                    }
                }
                Part::Parse => {
                    let parse = clean_property_name(text);
                    current.parse = (!parse.is_empty()).then_some(parse);
                }
            },
        }
        raw.push_str(text);
    }
    finish(&mut current, &mut raw);

    if !multiple {
        clauses.truncate(1);
    }
    clauses
}
