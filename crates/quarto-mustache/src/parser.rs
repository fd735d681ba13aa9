/*
 * parser.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Template tokenizer.
//!
//! [`TemplateParser`] scans a template string character by character and hands
//! every token to a [`TokenConsumer`]. The set of delimiters in effect can be
//! changed by the template itself with a `{{=<% %>=}}` tag; the new pair applies
//! to everything that follows.

use crate::error::{ParseError, SourceLocation};
use crate::token::{TagDelimiterPair, Token, TokenKind};
use std::ops::Range;
use std::sync::Arc;

/// Receiver of the tokens produced by a [`TemplateParser`].
pub trait TokenConsumer {
    /// Handle a token. Returning `false` stops scanning immediately.
    fn on_token(&mut self, token: Token) -> bool;

    /// Handle a tokenizer failure. Scanning stops after this call.
    fn on_parse_failure(&mut self, error: ParseError);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Text,
    Tag,
    UnescapedTag,
    SetDelimitersTag,
}

/// Marker strings derived from the current delimiter pair.
#[derive(Debug)]
struct ParserTagDelimiters {
    pair: TagDelimiterPair,
    unescaped_tag_start: Option<&'static str>,
    unescaped_tag_end: Option<&'static str>,
    set_delimiters_start: String,
    set_delimiters_end: String,
}

impl ParserTagDelimiters {
    fn new(pair: TagDelimiterPair) -> Self {
        let uses_default = pair.is_default();
        Self {
            unescaped_tag_start: uses_default.then_some("{{{"),
            unescaped_tag_end: uses_default.then_some("}}}"),
            set_delimiters_start: format!("{}=", pair.start),
            set_delimiters_end: format!("={}", pair.end),
            pair,
        }
    }

    /// The tag state entered at the start of `rest`, with the length of its marker.
    fn opening_at(&self, rest: &str) -> Option<(State, usize)> {
        if let Some(marker) = self.unescaped_tag_start {
            if rest.starts_with(marker) {
                return Some((State::UnescapedTag, marker.len()));
            }
        }
        if rest.starts_with(&self.set_delimiters_start) {
            return Some((State::SetDelimitersTag, self.set_delimiters_start.len()));
        }
        if rest.starts_with(&self.pair.start) {
            return Some((State::Tag, self.pair.start.len()));
        }
        None
    }
}

/// Character-level scanner for Mustache templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateParser {
    tag_delimiter_pair: TagDelimiterPair,
}

/// Bookkeeping shared by every token emitted during one `parse` call.
struct Emitter<'a> {
    template_string: Arc<str>,
    template_id: Option<Arc<str>>,
    consumer: &'a mut dyn TokenConsumer,
}

impl Emitter<'_> {
    fn emit(&mut self, kind: TokenKind, line: usize, range: Range<usize>) -> bool {
        self.consumer.on_token(Token {
            kind,
            line,
            template_id: self.template_id.clone(),
            template_string: Arc::clone(&self.template_string),
            range,
        })
    }

    fn fail(&mut self, error: ParseError) {
        self.consumer.on_parse_failure(error);
    }

    fn location(&self, line: usize) -> SourceLocation {
        SourceLocation::new(line, self.template_id.clone())
    }
}

impl TemplateParser {
    /// Create a parser whose templates start with the given delimiters.
    pub fn new(tag_delimiter_pair: TagDelimiterPair) -> Self {
        Self { tag_delimiter_pair }
    }

    /// Scan `template_string`, feeding tokens to `consumer`.
    pub fn parse(
        &self,
        template_string: &str,
        template_id: Option<&str>,
        consumer: &mut dyn TokenConsumer,
    ) {
        let mut emitter = Emitter {
            template_string: Arc::from(template_string),
            template_id: template_id.map(Arc::from),
            consumer,
        };
        let mut delimiters = ParserTagDelimiters::new(self.tag_delimiter_pair.clone());

        let end = template_string.len();
        let mut i = 0;
        let mut state = State::Start;
        let mut state_start = 0;
        let mut line = 1;
        let mut start_line = line;

        while i < end {
            let rest = &template_string[i..];
            let Some(c) = rest.chars().next() else {
                break;
            };
            let mut step = c.len_utf8();

            match state {
                State::Start | State::Text => {
                    if c == '\n' {
                        if state == State::Start {
                            start_line = line;
                            state_start = i;
                            state = State::Text;
                        }
                        line += 1;
                    } else if let Some((tag_state, marker_len)) = delimiters.opening_at(rest) {
                        if state == State::Text && state_start != i {
                            let text = template_string[state_start..i].to_string();
                            if !emitter.emit(TokenKind::Text(text), start_line, state_start..i) {
                                return;
                            }
                        }
                        start_line = line;
                        state_start = i;
                        state = tag_state;
                        step = marker_len;
                    } else if state == State::Start {
                        start_line = line;
                        state_start = i;
                        state = State::Text;
                    }
                }
                State::Tag => {
                    if c == '\n' {
                        line += 1;
                    } else if rest.starts_with(&delimiters.pair.end) {
                        let tag_end = i + delimiters.pair.end.len();
                        let kind = classify_tag(
                            &template_string[state_start + delimiters.pair.start.len()..i],
                            &delimiters.pair,
                        );
                        if !emitter.emit(kind, start_line, state_start..tag_end) {
                            return;
                        }
                        state_start = tag_end;
                        state = State::Start;
                        step = delimiters.pair.end.len();
                    }
                }
                State::UnescapedTag => {
                    let (start_marker, end_marker) = match (
                        delimiters.unescaped_tag_start,
                        delimiters.unescaped_tag_end,
                    ) {
                        (Some(start_marker), Some(end_marker)) => (start_marker, end_marker),
                        _ => break,
                    };
                    if c == '\n' {
                        line += 1;
                    } else if rest.starts_with(end_marker) {
                        let tag_end = i + end_marker.len();
                        let content = template_string[state_start + start_marker.len()..i].to_string();
                        let kind = TokenKind::UnescapedVariable {
                            content,
                            delimiters: delimiters.pair.clone(),
                        };
                        if !emitter.emit(kind, start_line, state_start..tag_end) {
                            return;
                        }
                        state_start = tag_end;
                        state = State::Start;
                        step = end_marker.len();
                    }
                }
                State::SetDelimitersTag => {
                    if c == '\n' {
                        line += 1;
                    } else if rest.starts_with(&delimiters.set_delimiters_end) {
                        let tag_end = i + delimiters.set_delimiters_end.len();
                        let content =
                            &template_string[state_start + delimiters.set_delimiters_start.len()..i];
                        let new_delimiters: Vec<&str> = content.split_whitespace().collect();
                        let [new_start, new_end] = new_delimiters.as_slice() else {
                            emitter.fail(ParseError::InvalidSetDelimiters {
                                location: emitter.location(start_line),
                            });
                            return;
                        };
                        let new_pair = TagDelimiterPair::new(*new_start, *new_end);

                        if !emitter.emit(TokenKind::SetDelimiters, start_line, state_start..tag_end) {
                            return;
                        }
                        tracing::trace!(
                            start = %new_pair.start,
                            end = %new_pair.end,
                            line = start_line,
                            "Switching tag delimiters"
                        );
                        state_start = tag_end;
                        state = State::Start;
                        step = delimiters.set_delimiters_end.len();
                        delimiters = ParserTagDelimiters::new(new_pair);
                    }
                }
            }

            i += step;
        }

        match state {
            State::Start => {}
            State::Text => {
                let text = template_string[state_start..end].to_string();
                emitter.emit(TokenKind::Text(text), start_line, state_start..end);
            }
            State::Tag | State::UnescapedTag | State::SetDelimitersTag => {
                emitter.fail(ParseError::UnclosedTag {
                    location: emitter.location(start_line),
                });
            }
        }
    }
}

/// Classify the interior of a `{{...}}` tag by its leading sigil.
fn classify_tag(interior: &str, delimiters: &TagDelimiterPair) -> TokenKind {
    let mut chars = interior.chars();
    let sigil = chars.next();
    let content = chars.as_str().to_string();
    match sigil {
        Some('!') => TokenKind::Comment,
        Some('#') => TokenKind::Section {
            content,
            delimiters: delimiters.clone(),
        },
        Some('^') => TokenKind::InvertedSection {
            content,
            delimiters: delimiters.clone(),
        },
        Some('$') => TokenKind::InheritableSection { content },
        Some('/') => TokenKind::Close { content },
        Some('>') => TokenKind::Partial { content },
        Some('<') => TokenKind::InheritedPartial { content },
        Some('&') => TokenKind::UnescapedVariable {
            content,
            delimiters: delimiters.clone(),
        },
        Some('%') => TokenKind::Pragma { content },
        _ => TokenKind::EscapedVariable {
            content: interior.to_string(),
            delimiters: delimiters.clone(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Collects everything the parser emits.
    #[derive(Default)]
    struct Recorder {
        tokens: Vec<Token>,
        error: Option<ParseError>,
        stop_after: Option<usize>,
    }

    impl TokenConsumer for Recorder {
        fn on_token(&mut self, token: Token) -> bool {
            self.tokens.push(token);
            self.stop_after.is_none_or(|limit| self.tokens.len() < limit)
        }

        fn on_parse_failure(&mut self, error: ParseError) {
            self.error = Some(error);
        }
    }

    fn scan(source: &str) -> Recorder {
        let mut recorder = Recorder::default();
        TemplateParser::default().parse(source, None, &mut recorder);
        recorder
    }

    fn kinds(source: &str) -> Vec<TokenKind> {
        scan(source).tokens.into_iter().map(|t| t.kind).collect()
    }

    fn default_pair() -> TagDelimiterPair {
        TagDelimiterPair::default()
    }

    #[test]
    fn test_plain_text_is_one_token() {
        let recorder = scan("hello world");
        assert_eq!(recorder.tokens.len(), 1);
        assert_eq!(recorder.tokens[0].kind, TokenKind::Text("hello world".to_string()));
        assert_eq!(recorder.tokens[0].range, 0..11);
        assert!(recorder.error.is_none());
    }

    #[test]
    fn test_empty_template_emits_nothing() {
        let recorder = scan("");
        assert!(recorder.tokens.is_empty());
        assert!(recorder.error.is_none());
    }

    #[test]
    fn test_sigils() {
        let pair = default_pair();
        assert_eq!(
            kinds("{{!c}}{{#s}}{{^i}}{{$b}}{{/s}}{{>p}}{{<q}}{{&u}}{{%P}}{{e}}"),
            vec![
                TokenKind::Comment,
                TokenKind::Section {
                    content: "s".to_string(),
                    delimiters: pair.clone()
                },
                TokenKind::InvertedSection {
                    content: "i".to_string(),
                    delimiters: pair.clone()
                },
                TokenKind::InheritableSection {
                    content: "b".to_string()
                },
                TokenKind::Close {
                    content: "s".to_string()
                },
                TokenKind::Partial {
                    content: "p".to_string()
                },
                TokenKind::InheritedPartial {
                    content: "q".to_string()
                },
                TokenKind::UnescapedVariable {
                    content: "u".to_string(),
                    delimiters: pair.clone()
                },
                TokenKind::Pragma {
                    content: "P".to_string()
                },
                TokenKind::EscapedVariable {
                    content: "e".to_string(),
                    delimiters: pair
                },
            ]
        );
    }

    #[test]
    fn test_triple_mustache() {
        let recorder = scan("a{{{ name }}}b");
        let tokens: Vec<_> = recorder.tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            tokens,
            vec![
                TokenKind::Text("a".to_string()),
                TokenKind::UnescapedVariable {
                    content: " name ".to_string(),
                    delimiters: default_pair()
                },
                TokenKind::Text("b".to_string()),
            ]
        );
        assert_eq!(recorder.tokens[1].source(), "{{{ name }}}");
    }

    #[test]
    fn test_set_delimiters() {
        let recorder = scan("{{=<% %>=}}<%name%>{{name}}");
        let tokens: Vec<_> = recorder.tokens.iter().map(|t| t.kind.clone()).collect();
        assert_eq!(
            tokens,
            vec![
                TokenKind::SetDelimiters,
                TokenKind::EscapedVariable {
                    content: "name".to_string(),
                    delimiters: TagDelimiterPair::new("<%", "%>")
                },
                TokenKind::Text("{{name}}".to_string()),
            ]
        );
    }

    #[test]
    fn test_custom_delimiters_disable_triple_mustache() {
        let mut recorder = Recorder::default();
        TemplateParser::new(TagDelimiterPair::new("<%", "%>")).parse(
            "{{{x}}}<%&x%>",
            None,
            &mut recorder,
        );
        assert_eq!(recorder.tokens[0].kind, TokenKind::Text("{{{x}}}".to_string()));
        assert!(matches!(
            recorder.tokens[1].kind,
            TokenKind::UnescapedVariable { .. }
        ));
    }

    #[test]
    fn test_invalid_set_delimiters() {
        let recorder = scan("{{=<%=}}");
        assert!(recorder.tokens.is_empty());
        let error = recorder.error.expect("expected a parse error");
        assert!(matches!(error, ParseError::InvalidSetDelimiters { .. }));
        assert_eq!(error.location().line, 1);
    }

    #[test]
    fn test_unclosed_tag_reports_opening_line() {
        let recorder = scan("one\ntwo {{#a\n\n");
        let error = recorder.error.expect("expected a parse error");
        assert_eq!(error, ParseError::UnclosedTag {
            location: SourceLocation::new(2, None)
        });
        assert_eq!(recorder.tokens[0].kind, TokenKind::Text("one\ntwo ".to_string()));
    }

    #[test]
    fn test_line_numbers() {
        let recorder = scan("a\nb{{x}}\n\n{{y\n}}");
        let lines: Vec<usize> = recorder.tokens.iter().map(|t| t.line).collect();
        // "a\nb", {{x}}, "\n\n", {{y\n}}
        assert_eq!(lines, vec![1, 2, 2, 4]);
    }

    #[test]
    fn test_leading_newline_starts_text() {
        let recorder = scan("\n{{x}}");
        assert_eq!(recorder.tokens[0].kind, TokenKind::Text("\n".to_string()));
        assert_eq!(recorder.tokens[0].line, 1);
        assert_eq!(recorder.tokens[1].line, 2);
    }

    #[test]
    fn test_consumer_can_stop_scanning() {
        let mut recorder = Recorder {
            stop_after: Some(2),
            ..Recorder::default()
        };
        TemplateParser::default().parse("a{{b}}c{{d", None, &mut recorder);
        assert_eq!(recorder.tokens.len(), 2);
        // The unclosed tag is never reached.
        assert!(recorder.error.is_none());
    }

    #[test]
    fn test_template_id_is_attached() {
        let mut recorder = Recorder::default();
        TemplateParser::default().parse("{{#a}", Some("page"), &mut recorder);
        assert_eq!(
            recorder.error.map(|e| e.to_string()),
            Some("Parse error at line 1 of template `page`: Unclosed Mustache tag".to_string())
        );
    }

    #[test]
    fn test_multibyte_text() {
        assert_eq!(
            kinds("héllo {{wörld}} ✓"),
            vec![
                TokenKind::Text("héllo ".to_string()),
                TokenKind::EscapedVariable {
                    content: "wörld".to_string(),
                    delimiters: default_pair()
                },
                TokenKind::Text(" ✓".to_string()),
            ]
        );
    }
}
