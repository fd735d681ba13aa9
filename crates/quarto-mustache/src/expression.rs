/*
 * expression.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Tag expressions: `.`, `name`, `a.b.c`, `.key` and filter calls `f(x, y)`.

use crate::context::Context;
use crate::error::{ExpressionError, RenderError, RenderResult};
use crate::value::Value;
use std::fmt;

/// The parsed content of a variable or section tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    /// `.`, the top of the context stack.
    ImplicitIterator,
    /// `name`, looked up in the context stack.
    Identifier(String),
    /// `base.key`, looked up in the value of `base` only.
    Scoped { base: Box<Expression>, key: String },
    /// `filter(argument, ...)`
    Filter {
        filter: Box<Expression>,
        arguments: Vec<Expression>,
    },
}

impl Expression {
    /// Parse the content of a tag. Surrounding whitespace is ignored.
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let mut parser = ExpressionParser { text, pos: 0 };
        parser.skip_whitespace();
        if parser.at_end() {
            return Err(ExpressionError::Empty);
        }
        let expression = parser.expression()?;
        parser.skip_whitespace();
        match parser.peek() {
            None => Ok(expression),
            Some(c) => Err(ExpressionError::UnexpectedCharacter(c)),
        }
    }

    /// Evaluate against a context.
    pub fn evaluate(&self, context: &Context) -> RenderResult<Value> {
        match self {
            Expression::ImplicitIterator => Ok(context.top_value()),
            Expression::Identifier(name) => Ok(context.lookup(name)),
            Expression::Scoped { base, key } => Ok(base.evaluate(context)?.lookup(key)),
            Expression::Filter { filter, arguments } => {
                let filter_value = filter.evaluate(context)?;
                if filter_value.is_empty() {
                    return Err(RenderError::MissingFilter {
                        name: filter.to_string(),
                    });
                }
                let Some(filter_fn) = filter_value.filter_fn() else {
                    return Err(RenderError::NotAFilter {
                        name: filter.to_string(),
                    });
                };
                let arguments = arguments
                    .iter()
                    .map(|argument| argument.evaluate(context))
                    .collect::<RenderResult<Vec<_>>>()?;
                filter_fn(&arguments)
            }
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::ImplicitIterator => write!(f, "."),
            Expression::Identifier(name) => write!(f, "{name}"),
            Expression::Scoped { base, key } => match base.as_ref() {
                Expression::ImplicitIterator => write!(f, ".{key}"),
                base => write!(f, "{base}.{key}"),
            },
            Expression::Filter { filter, arguments } => {
                write!(f, "{filter}(")?;
                for (i, argument) in arguments.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                write!(f, ")")
            }
        }
    }
}

struct ExpressionParser<'a> {
    text: &'a str,
    pos: usize,
}

impl ExpressionParser<'_> {
    fn peek(&self) -> Option<char> {
        self.text[self.pos..].chars().next()
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn bump(&mut self) {
        if let Some(c) = self.peek() {
            self.pos += c.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn identifier(&mut self) -> Option<String> {
        let start = self.pos;
        while self.peek().is_some_and(is_identifier_char) {
            self.bump();
        }
        (self.pos > start).then(|| self.text[start..self.pos].to_string())
    }

    fn expression(&mut self) -> Result<Expression, ExpressionError> {
        let mut expression = match self.peek() {
            Some('.') => {
                self.bump();
                match self.identifier() {
                    Some(key) => Expression::Scoped {
                        base: Box::new(Expression::ImplicitIterator),
                        key,
                    },
                    None => Expression::ImplicitIterator,
                }
            }
            Some(c) if is_identifier_char(c) => {
                Expression::Identifier(self.identifier().unwrap_or_default())
            }
            Some(c) => return Err(ExpressionError::UnexpectedCharacter(c)),
            None => return Err(ExpressionError::MissingIdentifier),
        };

        loop {
            match self.peek() {
                Some('.') => {
                    self.bump();
                    let key = self
                        .identifier()
                        .ok_or(ExpressionError::MissingIdentifier)?;
                    expression = Expression::Scoped {
                        base: Box::new(expression),
                        key,
                    };
                }
                Some('(') => {
                    self.bump();
                    let arguments = self.arguments()?;
                    expression = Expression::Filter {
                        filter: Box::new(expression),
                        arguments,
                    };
                }
                _ => return Ok(expression),
            }
        }
    }

    /// Arguments of a filter call, after the opening parenthesis.
    fn arguments(&mut self) -> Result<Vec<Expression>, ExpressionError> {
        let mut arguments = Vec::new();
        self.skip_whitespace();
        if self.peek() == Some(')') {
            self.bump();
            return Ok(arguments);
        }
        loop {
            self.skip_whitespace();
            arguments.push(self.expression()?);
            self.skip_whitespace();
            match self.peek() {
                Some(',') => self.bump(),
                Some(')') => {
                    self.bump();
                    return Ok(arguments);
                }
                Some(c) => return Err(ExpressionError::UnexpectedCharacter(c)),
                None => return Err(ExpressionError::UnclosedFilterCall),
            }
        }
    }
}

fn is_identifier_char(c: char) -> bool {
    !c.is_whitespace() && !matches!(c, '.' | '(' | ')' | ',')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ident(name: &str) -> Expression {
        Expression::Identifier(name.to_string())
    }

    #[test]
    fn test_parse_simple() {
        assert_eq!(Expression::parse("name").unwrap(), ident("name"));
        assert_eq!(Expression::parse("  name \n").unwrap(), ident("name"));
        assert_eq!(Expression::parse(".").unwrap(), Expression::ImplicitIterator);
    }

    #[test]
    fn test_parse_scoped() {
        assert_eq!(
            Expression::parse("a.b").unwrap(),
            Expression::Scoped {
                base: Box::new(ident("a")),
                key: "b".to_string(),
            }
        );
        assert_eq!(
            Expression::parse(".name").unwrap(),
            Expression::Scoped {
                base: Box::new(Expression::ImplicitIterator),
                key: "name".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_filter_call() {
        let expression = Expression::parse("f(a.b, .)").unwrap();
        assert_eq!(expression.to_string(), "f(a.b, .)");
        assert_eq!(Expression::parse("f()(x)").unwrap().to_string(), "f()(x)");
        assert_eq!(
            Expression::parse("each(items).count").unwrap().to_string(),
            "each(items).count"
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(Expression::parse("  "), Err(ExpressionError::Empty));
        assert_eq!(
            Expression::parse("a."),
            Err(ExpressionError::MissingIdentifier)
        );
        assert_eq!(
            Expression::parse("a b"),
            Err(ExpressionError::UnexpectedCharacter('b'))
        );
        assert_eq!(
            Expression::parse("f(a"),
            Err(ExpressionError::UnclosedFilterCall)
        );
        assert_eq!(
            Expression::parse(")"),
            Err(ExpressionError::UnexpectedCharacter(')'))
        );
    }

    #[test]
    fn test_evaluate_lookup() {
        let context = Context::with_value(Value::map([(
            "user",
            Value::map([("name", "Ada")]),
        )]))
        .extended(Value::map([("name", "top")]));

        let value = Expression::parse("user.name").unwrap().evaluate(&context);
        assert_eq!(value.unwrap(), Value::from("Ada"));

        let value = Expression::parse(".name").unwrap().evaluate(&context);
        assert_eq!(value.unwrap(), Value::from("top"));

        // Scoped lookups do not dig into the context stack
        let value = Expression::parse(".user").unwrap().evaluate(&context);
        assert_eq!(value.unwrap(), Value::Null);
    }

    #[test]
    fn test_evaluate_filter() {
        let shout = Value::filter(|arguments| {
            let text = match arguments.first() {
                Some(Value::String(s)) => s.to_uppercase(),
                _ => String::new(),
            };
            Ok(Value::from(text))
        });
        let context = Context::with_value(Value::map([
            ("shout", shout),
            ("name", Value::from("ada")),
        ]));

        let value = Expression::parse("shout(name)").unwrap().evaluate(&context);
        assert_eq!(value.unwrap(), Value::from("ADA"));
    }

    #[test]
    fn test_evaluate_filter_errors() {
        let context = Context::with_value(Value::map([("name", "ada")]));

        let error = Expression::parse("missing(name)")
            .unwrap()
            .evaluate(&context)
            .unwrap_err();
        assert_eq!(error.to_string(), "Missing filter `missing`");

        let error = Expression::parse("name(name)")
            .unwrap()
            .evaluate(&context)
            .unwrap_err();
        assert_eq!(error.to_string(), "`name` is not a filter");
    }
}
