//! Recursive-descent parser for the path grammar.
//!
//! ```text
//! path      := ('$' | '@') segment*
//! segment   := '.' member | '[' subscript ']'
//! member    := '*' | quoted | ident
//! subscript := '*' | digits | quoted | '?(' path '==' quoted ')'
//! ident     := [A-Za-z0-9_-]+
//! quoted    := "'" chars "'" | '"' chars '"'      (backslash escapes the next char)
//! ```

use crate::rule::Rule;
use crate::PathError;

pub(crate) fn parse(src: &str) -> Result<Vec<Rule>, PathError> {
    let mut p = Parser { src, pos: 0 };
    let rules = p.path()?;
    p.skip_ws();
    if p.peek().is_some() {
        return Err(p.error("unexpected trailing input"));
    }
    Ok(rules)
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn expect(&mut self, want: char, message: &'static str) -> Result<(), PathError> {
        match self.peek() {
            Some(c) if c == want => {
                self.bump();
                Ok(())
            }
            _ => Err(self.error(message)),
        }
    }

    fn error(&self, message: &'static str) -> PathError {
        PathError::Parse { path: self.src.to_string(), offset: self.pos, message }
    }

    fn path(&mut self) -> Result<Vec<Rule>, PathError> {
        match self.peek() {
            Some('$') | Some('@') => {
                self.bump();
            }
            _ => return Err(self.error("expected '$' or '@'")),
        }
        let mut rules = Vec::new();
        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    rules.push(self.member()?);
                }
                Some('[') => {
                    self.bump();
                    rules.push(self.subscript()?);
                }
                _ => return Ok(rules),
            }
        }
    }

    fn member(&mut self) -> Result<Rule, PathError> {
        match self.peek() {
            Some('*') => {
                self.bump();
                Ok(Rule::AnyKey)
            }
            Some('\'') | Some('"') => Ok(Rule::Key(self.quoted()?)),
            _ => {
                let name = self.ident();
                if name.is_empty() {
                    return Err(self.error("expected key after '.'"));
                }
                Ok(Rule::Key(name))
            }
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn subscript(&mut self) -> Result<Rule, PathError> {
        self.skip_ws();
        let rule = match self.peek() {
            Some('*') => {
                self.bump();
                Rule::AnyIndex
            }
            Some('?') => {
                self.bump();
                self.filter()?
            }
            Some('\'') | Some('"') => Rule::Key(self.quoted()?),
            Some(c) if c.is_ascii_digit() => Rule::Index(self.index()?),
            _ => return Err(self.error("expected index, '*', quoted key or filter")),
        };
        self.skip_ws();
        self.expect(']', "expected ']'")?;
        Ok(rule)
    }

    fn index(&mut self) -> Result<usize, PathError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        self.src[start..self.pos].parse().map_err(|_| self.error("index out of range"))
    }

    fn filter(&mut self) -> Result<Rule, PathError> {
        self.expect('(', "expected '(' after '?'")?;
        self.skip_ws();
        let rules = self.path()?;
        self.skip_ws();
        self.expect('=', "expected '=='")?;
        self.expect('=', "expected '=='")?;
        self.skip_ws();
        let value = self.quoted()?;
        self.skip_ws();
        self.expect(')', "expected ')'")?;
        Ok(Rule::Filter { rules, value })
    }

    fn quoted(&mut self) -> Result<String, PathError> {
        let quote = match self.bump() {
            Some(q @ ('\'' | '"')) => q,
            _ => return Err(self.error("expected quoted string")),
        };
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some('\\') => match self.bump() {
                    Some(c) => out.push(c),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_keys_wildcards_and_indices() {
        let rules = parse("$.spec.containers[*].ports[0].*").unwrap();
        assert_eq!(
            rules,
            vec![
                Rule::Key("spec".into()),
                Rule::Key("containers".into()),
                Rule::AnyIndex,
                Rule::Key("ports".into()),
                Rule::Index(0),
                Rule::AnyKey,
            ]
        );
    }

    #[test]
    fn quoted_keys_may_contain_separators() {
        let rules = parse("$.metadata.annotations.'kubectl.kubernetes.io/last-applied-configuration'").unwrap();
        assert_eq!(rules[2], Rule::Key("kubectl.kubernetes.io/last-applied-configuration".into()));

        let rules = parse(r#"$["it's"]"#).unwrap();
        assert_eq!(rules, vec![Rule::Key("it's".into())]);

        let rules = parse(r"$.'a\'b'").unwrap();
        assert_eq!(rules, vec![Rule::Key("a'b".into())]);
    }

    #[test]
    fn parses_filters() {
        let rules = parse("$.spec.containers[?(@.name == 'manager')].image").unwrap();
        assert_eq!(
            rules[2],
            Rule::Filter { rules: vec![Rule::Key("name".into())], value: "manager".into() }
        );
        assert_eq!(rules[3], Rule::Key("image".into()));
    }

    #[test]
    fn root_only_is_empty_pipeline() {
        assert!(parse("$").unwrap().is_empty());
    }

    #[test]
    fn reports_offsets() {
        match parse("$.spec[").unwrap_err() {
            PathError::Parse { offset, .. } => assert_eq!(offset, 7),
            e => panic!("unexpected error {e:?}"),
        }
        assert!(parse("spec").is_err());
        assert!(parse("$.").is_err());
        assert!(parse("$.a b").is_err());
        assert!(parse("$['open").is_err());
        assert!(parse("$[?(@.a = 'x')]").is_err());
    }
}
