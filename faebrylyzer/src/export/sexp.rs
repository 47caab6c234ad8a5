//! Minimal S-expression tree with a writer and a reader.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SExpError {
    #[error("Unexpected end of input")]
    UnexpectedEof,
    #[error("Unexpected token at position {0}: {1}")]
    UnexpectedToken(usize, String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SExp {
    /// Bare word such as `export` or `comp`.
    Symbol(String),
    /// Always written quoted.
    Str(String),
    List(Vec<SExp>),
}

impl SExp {
    pub fn symbol(s: impl Into<String>) -> Self {
        SExp::Symbol(s.into())
    }

    pub fn string(s: impl Into<String>) -> Self {
        SExp::Str(s.into())
    }

    /// `(head items...)`
    pub fn list(head: &str, items: impl IntoIterator<Item = SExp>) -> Self {
        let mut all = vec![SExp::symbol(head)];
        all.extend(items);
        SExp::List(all)
    }

    /// `(key "value")`
    pub fn field(key: &str, value: impl Into<String>) -> Self {
        SExp::list(key, [SExp::string(value)])
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SExp::Symbol(s) | SExp::Str(s) => Some(s),
            SExp::List(_) => None,
        }
    }

    pub fn as_list(&self) -> Option<&[SExp]> {
        match self {
            SExp::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn head(&self) -> Option<&str> {
        self.as_list().and_then(|items| items.first()).and_then(SExp::as_str)
    }

    /// First child list starting with `key`.
    pub fn get(&self, key: &str) -> Option<&SExp> {
        self.as_list()?.iter().find(|item| item.head() == Some(key))
    }

    /// Every child list starting with `key`.
    pub fn get_all(&self, key: &str) -> Vec<&SExp> {
        self.as_list()
            .map(|items| items.iter().filter(|item| item.head() == Some(key)).collect())
            .unwrap_or_default()
    }

    /// Value of a `(key "value")` child.
    pub fn value_of(&self, key: &str) -> Option<&str> {
        self.get(key)?.as_list()?.get(1)?.as_str()
    }

    /// Indented rendering: lists holding only atoms stay on one line.
    pub fn to_pretty(&self) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, 0);
        out.push('\n');
        out
    }

    fn write_pretty(&self, out: &mut String, indent: usize) {
        let SExp::List(items) = self else {
            out.push_str(&self.to_string());
            return;
        };
        if items.iter().all(|i| !matches!(i, SExp::List(_))) {
            out.push_str(&self.to_string());
            return;
        }
        out.push('(');
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                if matches!(item, SExp::List(_)) {
                    out.push('\n');
                    out.push_str(&"  ".repeat(indent + 1));
                } else {
                    out.push(' ');
                }
            }
            item.write_pretty(out, indent + 1);
        }
        out.push(')');
    }
}

impl fmt::Display for SExp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SExp::Symbol(s) => write!(f, "{}", s),
            SExp::Str(s) => write!(f, "\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
            SExp::List(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

pub fn parse(input: &str) -> Result<SExp, SExpError> {
    let mut parser = Parser {
        input: input.chars().collect(),
        pos: 0,
    };
    parser.skip_whitespace();
    parser.parse_sexp()
}

struct Parser {
    input: Vec<char>,
    pos: usize,
}

impl Parser {
    fn parse_sexp(&mut self) -> Result<SExp, SExpError> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(SExpError::UnexpectedEof),
            Some('(') => self.parse_list(),
            Some(')') => Err(SExpError::UnexpectedToken(self.pos, ")".to_string())),
            Some('"') => self.parse_string(),
            Some(_) => Ok(self.parse_symbol()),
        }
    }

    fn parse_list(&mut self) -> Result<SExp, SExpError> {
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                None => return Err(SExpError::UnexpectedEof),
                Some(')') => {
                    self.pos += 1;
                    return Ok(SExp::List(items));
                }
                Some(_) => items.push(self.parse_sexp()?),
            }
        }
    }

    fn parse_string(&mut self) -> Result<SExp, SExpError> {
        self.pos += 1;
        let mut s = String::new();
        let mut escaped = false;
        while let Some(ch) = self.peek() {
            self.pos += 1;
            match (escaped, ch) {
                (true, 'n') => s.push('\n'),
                (true, c) => s.push(c),
                (false, '\\') => {
                    escaped = true;
                    continue;
                }
                (false, '"') => return Ok(SExp::Str(s)),
                (false, c) => s.push(c),
            }
            escaped = false;
        }
        Err(SExpError::UnexpectedEof)
    }

    fn parse_symbol(&mut self) -> SExp {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == '(' || ch == ')' {
                break;
            }
            self.pos += 1;
        }
        SExp::Symbol(self.input[start..self.pos].iter().collect())
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_are_quoted_and_escaped() {
        let s = SExp::list("name", [SExp::string("say \"hi\"")]);
        assert_eq!(s.to_string(), r#"(name "say \"hi\"")"#);
    }

    #[test]
    fn test_pretty_keeps_flat_lists_inline() {
        let s = SExp::list(
            "export",
            [
                SExp::field("version", "E"),
                SExp::list("nets", [SExp::field("name", "gnd")]),
            ],
        );
        assert_eq!(
            s.to_pretty(),
            "(export\n  (version \"E\")\n  (nets\n    (name \"gnd\")))\n"
        );
    }

    #[test]
    fn test_parse_reads_back_pretty_output() {
        let s = SExp::list(
            "comp",
            [SExp::field("ref", "R1"), SExp::list("pin", [SExp::symbol("1")])],
        );
        let parsed = parse(&s.to_pretty()).unwrap();
        assert_eq!(parsed.head(), Some("comp"));
        assert_eq!(parsed.value_of("ref"), Some("R1"));
        assert_eq!(parsed.get_all("pin").len(), 1);
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(parse("(a (b)"), Err(SExpError::UnexpectedEof)));
        assert!(matches!(parse(")"), Err(SExpError::UnexpectedToken(0, _))));
        assert!(matches!(parse("\"open"), Err(SExpError::UnexpectedEof)));
    }
}
