//! Path pattern compilation.
//!
//! Compiles `path-to-regexp` style patterns into anchored regular
//! expressions:
//!
//! - `/about/:path` matches `/about/a` but not `/about/a/c`
//! - `/about/:path*` (zero or more), `:path?` (zero or one), `:path+` (one or more)
//! - `/about/(.*)` uses a raw regular expression group instead of a name
//! - `{/segment}?` groups an optional prefix with its parameter
//!
//! Matching is case-insensitive, tolerates one trailing delimiter and is
//! anchored at both ends. Only the request path is ever tested.

use regex::Regex;

use crate::error::{Error, Result};

const DEFAULT_PATTERN: &str = "[^/#?]+?";
const DELIMITER: &str = "[/#?]";
const PREFIXES: &str = "./";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexKind {
    Open,
    Close,
    Pattern,
    Name,
    Char,
    EscapedChar,
    Modifier,
    End,
}

#[derive(Debug, Clone)]
struct LexToken {
    kind: LexKind,
    index: usize,
    value: String,
}

/// Name of a captured parameter: explicit (`:id`) or positional (`(\d+)`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamKey {
    Named(String),
    Positional(usize),
}

#[derive(Debug, Clone)]
struct Param {
    key: Option<ParamKey>,
    prefix: String,
    suffix: String,
    pattern: String,
    modifier: String,
}

#[derive(Debug, Clone)]
enum Token {
    Literal(String),
    Param(Param),
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    regex: Regex,
    keys: Vec<ParamKey>,
}

impl PathPattern {
    /// Compile `source` into a matcher regular expression.
    pub fn compile(source: &str) -> Result<Self> {
        let invalid = |reason: String| Error::InvalidPattern {
            pattern: source.to_string(),
            reason,
        };

        let lexed = lex(source).map_err(invalid)?;
        let tokens = parse(&lexed).map_err(invalid)?;
        let route = to_regex_source(&tokens);
        let regex = Regex::new(&route).map_err(|e| invalid(e.to_string()))?;

        let keys = tokens
            .into_iter()
            .filter_map(|t| match t {
                Token::Param(p) => p.key,
                Token::Literal(_) => None,
            })
            .collect();

        Ok(Self {
            source: source.to_string(),
            regex,
            keys,
        })
    }

    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn keys(&self) -> &[ParamKey] {
        &self.keys
    }

    /// The generated regular expression, for diagnostics.
    pub fn as_regex(&self) -> &Regex {
        &self.regex
    }
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn lex(input: &str) -> std::result::Result<Vec<LexToken>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    let token = |kind, index, value: String| LexToken { kind, index, value };

    while i < chars.len() {
        let c = chars[i];
        match c {
            '*' | '+' | '?' => {
                tokens.push(token(LexKind::Modifier, i, c.to_string()));
                i += 1;
            }
            '\\' => {
                let escaped = chars
                    .get(i + 1)
                    .ok_or_else(|| format!("Dangling escape at {}", i))?;
                tokens.push(token(LexKind::EscapedChar, i, escaped.to_string()));
                i += 2;
            }
            '{' => {
                tokens.push(token(LexKind::Open, i, c.to_string()));
                i += 1;
            }
            '}' => {
                tokens.push(token(LexKind::Close, i, c.to_string()));
                i += 1;
            }
            ':' => {
                let mut j = i + 1;
                let mut name = String::new();
                while j < chars.len() && is_name_char(chars[j]) {
                    name.push(chars[j]);
                    j += 1;
                }
                if name.is_empty() {
                    return Err(format!("Missing parameter name at {}", i));
                }
                tokens.push(token(LexKind::Name, i, name));
                i = j;
            }
            '(' => {
                let mut count = 1;
                let mut pattern = String::new();
                let mut j = i + 1;

                if chars.get(j) == Some(&'?') {
                    return Err(format!("Pattern cannot start with \"?\" at {}", j));
                }

                while j < chars.len() {
                    if chars[j] == '\\' {
                        pattern.push(chars[j]);
                        if let Some(next) = chars.get(j + 1) {
                            pattern.push(*next);
                        }
                        j += 2;
                        continue;
                    }

                    if chars[j] == ')' {
                        count -= 1;
                        if count == 0 {
                            j += 1;
                            break;
                        }
                    } else if chars[j] == '(' {
                        count += 1;
                        if chars.get(j + 1) != Some(&'?') {
                            return Err(format!("Capturing groups are not allowed at {}", j));
                        }
                    }

                    pattern.push(chars[j]);
                    j += 1;
                }

                if count != 0 {
                    return Err(format!("Unbalanced pattern at {}", i));
                }
                if pattern.is_empty() {
                    return Err(format!("Missing pattern at {}", i));
                }

                tokens.push(token(LexKind::Pattern, i, pattern));
                i = j;
            }
            _ => {
                tokens.push(token(LexKind::Char, i, c.to_string()));
                i += 1;
            }
        }
    }

    tokens.push(token(LexKind::End, chars.len(), String::new()));
    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [LexToken],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn try_consume(&mut self, kind: LexKind) -> Option<String> {
        match self.tokens.get(self.pos) {
            Some(t) if t.kind == kind => {
                self.pos += 1;
                Some(t.value.clone())
            }
            _ => None,
        }
    }

    fn must_consume(&mut self, kind: LexKind) -> std::result::Result<String, String> {
        self.try_consume(kind).ok_or_else(|| match self.tokens.get(self.pos) {
            Some(t) => format!("Unexpected {:?} at {}, expected {:?}", t.kind, t.index, kind),
            None => format!("Unexpected end of pattern, expected {:?}", kind),
        })
    }

    fn consume_text(&mut self) -> String {
        let mut text = String::new();
        while let Some(value) = self
            .try_consume(LexKind::Char)
            .or_else(|| self.try_consume(LexKind::EscapedChar))
        {
            text.push_str(&value);
        }
        text
    }
}

fn parse(tokens: &[LexToken]) -> std::result::Result<Vec<Token>, String> {
    let mut parser = Parser { tokens, pos: 0 };
    let mut result = Vec::new();
    let mut path = String::new();
    let mut positional = 0;

    let mut next_key = |name: Option<String>, has_pattern: bool| match name {
        Some(name) => Some(ParamKey::Named(name)),
        None if has_pattern => {
            let key = ParamKey::Positional(positional);
            positional += 1;
            Some(key)
        }
        None => None,
    };

    while parser.pos < tokens.len() {
        let ch = parser.try_consume(LexKind::Char);
        let name = parser.try_consume(LexKind::Name);
        let pattern = parser.try_consume(LexKind::Pattern);

        if name.is_some() || pattern.is_some() {
            let mut prefix = ch.unwrap_or_default();
            if !prefix.is_empty() && !PREFIXES.contains(prefix.as_str()) {
                path.push_str(&prefix);
                prefix.clear();
            }
            if !path.is_empty() {
                result.push(Token::Literal(std::mem::take(&mut path)));
            }

            result.push(Token::Param(Param {
                key: next_key(name, true),
                prefix,
                suffix: String::new(),
                pattern: pattern.unwrap_or_else(|| DEFAULT_PATTERN.to_string()),
                modifier: parser.try_consume(LexKind::Modifier).unwrap_or_default(),
            }));
            continue;
        }

        if let Some(value) = ch.or_else(|| parser.try_consume(LexKind::EscapedChar)) {
            path.push_str(&value);
            continue;
        }

        if !path.is_empty() {
            result.push(Token::Literal(std::mem::take(&mut path)));
        }

        if parser.try_consume(LexKind::Open).is_some() {
            let prefix = parser.consume_text();
            let name = parser.try_consume(LexKind::Name);
            let pattern = parser.try_consume(LexKind::Pattern);
            let suffix = parser.consume_text();
            parser.must_consume(LexKind::Close)?;

            let pattern = match (&name, pattern) {
                (_, Some(p)) => p,
                (Some(_), None) => DEFAULT_PATTERN.to_string(),
                (None, None) => String::new(),
            };
            let has_pattern = !pattern.is_empty();

            result.push(Token::Param(Param {
                key: next_key(name, has_pattern),
                prefix,
                suffix,
                pattern,
                modifier: parser.try_consume(LexKind::Modifier).unwrap_or_default(),
            }));
            continue;
        }

        parser.must_consume(LexKind::End)?;
    }

    Ok(result)
}

fn to_regex_source(tokens: &[Token]) -> String {
    let mut route = String::from("(?i)^");

    for token in tokens {
        match token {
            Token::Literal(text) => route.push_str(&regex::escape(text)),
            Token::Param(param) => {
                let prefix = regex::escape(&param.prefix);
                let suffix = regex::escape(&param.suffix);
                let modifier = param.modifier.as_str();
                let repeated = modifier == "+" || modifier == "*";

                if param.pattern.is_empty() {
                    route.push_str(&format!("(?:{prefix}{suffix}){modifier}"));
                } else if !prefix.is_empty() || !suffix.is_empty() {
                    let pattern = &param.pattern;
                    if repeated {
                        let optional = if modifier == "*" { "?" } else { "" };
                        route.push_str(&format!(
                            "(?:{prefix}((?:{pattern})(?:{suffix}{prefix}(?:{pattern}))*){suffix}){optional}"
                        ));
                    } else {
                        route.push_str(&format!("(?:{prefix}({pattern}){suffix}){modifier}"));
                    }
                } else if repeated {
                    route.push_str(&format!("((?:{}){modifier})", param.pattern));
                } else {
                    route.push_str(&format!("({}){modifier}", param.pattern));
                }
            }
        }
    }

    route.push_str(DELIMITER);
    route.push_str("?$");
    route
}
