//! Run-sequence grammar.
//!
//! ```text
//! sequence := group ( '*' group )*
//! group    := NAME ( '|' NAME )*
//! ```
//!
//! `*` orders groups: every event of a group depends on every event of the
//! group on its left. `|` puts events side by side inside one group.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::{error::ConfigurationError, event::EventName};

const THEN: char = '*';
const PARALLEL: char = '|';

#[derive(Debug, PartialEq, Eq)]
enum Token {
    Name(String),
    Then,
    Parallel,
}

fn tokenize(source: &str) -> Result<Vec<Token>, ConfigurationError> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            THEN => tokens.push(Token::Then),
            PARALLEL => tokens.push(Token::Parallel),
            c if c.is_whitespace() => {}
            c if c.is_ascii_alphanumeric() || c == '_' => {
                let mut end = start + c.len_utf8();
                while let Some(&(index, next)) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_') {
                        break;
                    }
                    end = index + next.len_utf8();
                    chars.next();
                }
                tokens.push(Token::Name(source[start..end].to_owned()));
            }
            other => {
                return Err(ConfigurationError::run_sequence(
                    source,
                    format!("unexpected character `{other}` at offset {start}"),
                ))
            }
        }
    }

    Ok(tokens)
}

/// Parsed run sequence: an ordered list of groups of event names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunSequence {
    source: String,
    groups: Vec<Vec<EventName>>,
}

impl RunSequence {
    pub fn parse(source: &str) -> Result<Self, ConfigurationError> {
        let tokens = tokenize(source)?;
        if tokens.is_empty() {
            return Ok(Self {
                source: source.to_owned(),
                groups: Vec::new(),
            });
        }

        let mut groups: Vec<Vec<EventName>> = vec![Vec::new()];
        let mut seen = HashSet::new();
        let mut expect_name = true;

        for token in tokens {
            match (token, expect_name) {
                (Token::Name(name), true) => {
                    if !seen.insert(name.clone()) {
                        return Err(ConfigurationError::run_sequence(
                            source,
                            format!("event `{name}` appears more than once"),
                        ));
                    }
                    let name = EventName::new(name)?;
                    if let Some(group) = groups.last_mut() {
                        group.push(name);
                    }
                    expect_name = false;
                }
                (Token::Name(name), false) => {
                    return Err(ConfigurationError::run_sequence(
                        source,
                        format!("missing operator before `{name}`"),
                    ));
                }
                (Token::Then, false) => {
                    groups.push(Vec::new());
                    expect_name = true;
                }
                (Token::Parallel, false) => expect_name = true,
                (Token::Then | Token::Parallel, true) => {
                    return Err(ConfigurationError::run_sequence(
                        source,
                        "operator without an event on its left",
                    ));
                }
            }
        }

        if expect_name {
            return Err(ConfigurationError::run_sequence(
                source,
                "sequence ends with an operator",
            ));
        }

        Ok(Self {
            source: source.to_owned(),
            groups,
        })
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn groups(&self) -> &[Vec<EventName>] {
        &self.groups
    }

    pub fn tokens(&self) -> impl Iterator<Item = &EventName> {
        self.groups.iter().flatten()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.tokens().any(|token| token.as_str() == name)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Prerequisites of every token: the members of the group on its left.
    #[must_use]
    pub fn dependencies(&self) -> BTreeMap<EventName, BTreeSet<EventName>> {
        let mut dependencies = BTreeMap::new();
        let mut previous: &[EventName] = &[];

        for group in &self.groups {
            for name in group {
                dependencies.insert(name.clone(), previous.iter().cloned().collect());
            }
            previous = group.as_slice();
        }

        dependencies
    }
}
