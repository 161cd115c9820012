//! Token-pattern signature engine (spec.md §4.2).
//!
//! A [`Signature`] is an ordered sequence of elements, each either a token
//! kind or a free-form string fragment that acts as a literal regex piece.
//! `stringify` renders a token list as a single string (`"#Kind"` or
//! `"#Kind(lexeme)"`, space-joined); signatures lower to a regex over that
//! string. Balanced-bracket extraction is a separate linear scan,
//! independent of the regex path (spec.md §4.2.3).

use regex::Regex;

use crate::token::{Token, TokenKind};

/// One element of a [`Signature`]: a token kind to match, or a literal
/// regex fragment inserted verbatim (spec.md §4.2.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SigElem {
    Token(TokenKind),
    Literal(String),
}

/// An ordered pattern over a token stream (spec.md §4.2.1).
pub type Signature = Vec<SigElem>;

/// Concatenates several signatures into one (spec.md §4.2.1: `combine`).
pub fn combine<I: IntoIterator<Item = Signature>>(sigs: I) -> Signature {
    sigs.into_iter().flatten().collect()
}

fn kind_name(kind: TokenKind) -> String {
    format!("{:?}", kind)
}

fn render_token(t: &Token) -> String {
    if t.kind.carries_lexeme() {
        format!("#{}({})", kind_name(t.kind), t.lexeme)
    } else {
        format!("#{}", kind_name(t.kind))
    }
}

/// Renders a token list as a single encoded, whitespace-separated string
/// (spec.md §4.2.2: `stringify`).
pub fn stringify(tokens: &[Token]) -> String {
    tokens.iter().map(render_token).collect::<Vec<_>>().join(" ")
}

/// As [`stringify`], but also returns the `(start, end)` byte span of each
/// token's rendering, so regex matches over the joined string can be mapped
/// back to token indices.
fn stringify_with_spans(tokens: &[Token]) -> (String, Vec<(usize, usize)>) {
    let mut out = String::new();
    let mut spans = Vec::with_capacity(tokens.len());
    for (i, t) in tokens.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        let start = out.len();
        out.push_str(&render_token(t));
        spans.push((start, out.len()));
    }
    (out, spans)
}

/// Matches exactly one stringified token of the given kind, with an
/// optional `(lexeme)` suffix, followed by its separating whitespace.
fn token_pattern(kind: TokenKind) -> String {
    format!(r"#{}(?:\([^)]*\))?\s*", kind_name(kind))
}

/// Matches exactly one stringified token of the given kind with a specific
/// lexeme (used by the prebuilt vocabulary in [`crate::signatures`] to pick
/// out individual keywords/operators that this crate's coarser `TokenKind`
/// groups together).
pub fn token_lexeme(kind: TokenKind, lexeme: &str) -> Signature {
    vec![SigElem::Literal(format!(
        r"#{}\({}\)\s*",
        kind_name(kind),
        regex::escape(lexeme)
    ))]
}

/// A bare token kind, any lexeme.
pub fn token(kind: TokenKind) -> Signature {
    vec![SigElem::Token(kind)]
}

fn literal(s: impl Into<String>) -> Signature {
    vec![SigElem::Literal(s.into())]
}

/// Any single token, any kind (spec.md's `anytoken` basic signature).
pub fn any_token() -> Signature {
    literal(r"#\S+(?:\([^)]*\))?\s*")
}

fn sig_to_regex(sig: &Signature) -> String {
    let mut out = String::new();
    for elem in sig {
        match elem {
            SigElem::Token(kind) => out.push_str(&token_pattern(*kind)),
            SigElem::Literal(s) => out.push_str(s),
        }
    }
    out
}

/// Compiles a signature to its underlying regex. Exposed for callers that
/// want to reuse a compiled pattern across many token lists.
pub fn compile(sig: &Signature) -> Regex {
    Regex::new(&sig_to_regex(sig)).expect("signature lowers to a valid regex")
}

fn compile_anchored(sig: &Signature) -> Regex {
    Regex::new(&format!("^{}$", sig_to_regex(sig))).expect("signature lowers to a valid anchored regex")
}

/// Whether `signature` matches any substring of the stringified token list
/// (spec.md §4.2.2: `tokens_contain`).
pub fn tokens_contain(tokens: &[Token], sig: &Signature) -> bool {
    compile(sig).is_match(&stringify(tokens))
}

/// Whether `signature` matches the entire stringified token list (spec.md
/// §4.2.2: `tokens_match`).
pub fn tokens_match(tokens: &[Token], sig: &Signature) -> bool {
    compile_anchored(sig).is_match(&stringify(tokens))
}

/// `tokens_contain`, restricted to a half-open token index range (spec.md
/// §4.2.2: `tokens_contain_in_range`).
pub fn tokens_contain_in_range(tokens: &[Token], sig: &Signature, range: (usize, usize)) -> bool {
    let (lo, hi) = range;
    tokens_contain(&tokens[lo..hi], sig)
}

/// Every non-overlapping match of `signature`, as half-open token-index
/// ranges in strictly increasing order of start index (spec.md §4.2.2:
/// `get_match_ranges`; invariant 5 of spec.md §8).
pub fn get_match_ranges(tokens: &[Token], sig: &Signature) -> Vec<(usize, usize)> {
    let (joined, spans) = stringify_with_spans(tokens);
    let regex = compile(sig);
    let mut ranges = Vec::new();
    for m in regex.find_iter(&joined) {
        if m.start() == m.end() {
            continue;
        }
        let lo = spans.iter().position(|&(start, _)| start >= m.start());
        let hi = spans.iter().rposition(|&(_, end)| end <= m.end()).map(|i| i + 1);
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if lo < hi {
                ranges.push((lo, hi));
            }
        }
    }
    ranges
}

/// The first match range, if any (spec.md §4.2.2: `get_next_match_range`).
pub fn get_next_match_range(tokens: &[Token], sig: &Signature) -> Option<(usize, usize)> {
    get_match_ranges(tokens, sig).into_iter().next()
}

/// The half-open token-index range whose tokens all lie on `line` (spec.md
/// §4.2.2: `get_tokens_line_range`).
pub fn get_tokens_line_range(tokens: &[Token], line: u32) -> Option<(usize, usize)> {
    let start = tokens.iter().position(|t| t.line == line)?;
    let count = tokens[start..].iter().take_while(|t| t.line == line).count();
    Some((start, start + count))
}

/// Semantic alias for [`get_tokens_line_range`] (spec.md §4.2.2 explicitly
/// calls out both names as a deliberate duplicate).
pub fn get_line_token_indices(tokens: &[Token], line: u32) -> Option<(usize, usize)> {
    get_tokens_line_range(tokens, line)
}

/// Count of leading indentation tokens on `line` (spec.md §4.2.2:
/// `get_leading_indents`).
pub fn get_leading_indents(tokens: &[Token], line: u32) -> Option<usize> {
    let (lo, hi) = get_tokens_line_range(tokens, line)?;
    Some(tokens[lo..hi].iter().take_while(|t| t.kind == TokenKind::Indent).count())
}

fn matches_one(tok: &Token, sig: &Signature) -> bool {
    tokens_match(std::slice::from_ref(tok), sig)
}

/// The half-open range of the first balanced region, where `inc` increments
/// depth and `dec` decrements it (spec.md §4.2.2: `balanced_range_extraction`).
/// `None` if unbalanced or absent. Independent of the regex-matching path:
/// a plain linear scan with a depth counter (spec.md §4.2.3).
pub fn balanced_range_extraction(tokens: &[Token], inc: &Signature, dec: &Signature) -> Option<(usize, usize)> {
    let start = tokens.iter().position(|t| matches_one(t, inc))?;
    let mut depth = 0i32;
    for (offset, t) in tokens[start..].iter().enumerate() {
        let i = start + offset;
        if matches_one(t, inc) {
            depth += 1;
        } else if matches_one(t, dec) {
            depth -= 1;
            if depth == 0 {
                return Some((start, i + 1));
            }
        }
    }
    None
}

/// Every top-level balanced region (spec.md §4.2.2:
/// `balanced_range_extraction_vec`).
pub fn balanced_range_extraction_vec(tokens: &[Token], inc: &Signature, dec: &Signature) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut cursor = 0;
    while cursor < tokens.len() {
        match balanced_range_extraction(&tokens[cursor..], inc, dec) {
            Some((lo, hi)) => {
                out.push((cursor + lo, cursor + hi));
                cursor += hi;
            }
            None => break,
        }
    }
    out
}

/// A meta-signature meaning "any tokens up to but not including `sig`"
/// (spec.md §4.2.2: `match_until_signature`), expanding to a non-greedy
/// wildcard terminated by `sig`'s pattern (spec.md §4.2.3).
pub fn match_until_signature(sig: &Signature) -> Signature {
    let mut out = literal(r"(?:#\S+(?:\([^)]*\))?\s*)*?");
    out.extend(sig.iter().cloned());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tok(kind: TokenKind, lexeme: &str, line: u32) -> Token {
        Token::new(kind, lexeme, line)
    }

    #[test]
    fn stringify_renders_lexeme_only_for_value_kinds() {
        let tokens = vec![tok(TokenKind::Identifier, "x", 1), tok(TokenKind::LeftParen, "(", 1)];
        assert_eq!(stringify(&tokens), "#Identifier(x) #LeftParen");
    }

    #[test]
    fn tokens_match_requires_whole_stream() {
        let tokens = vec![tok(TokenKind::Identifier, "x", 1)];
        let sig = token(TokenKind::Identifier);
        assert!(tokens_match(&tokens, &sig));
        let tokens2 = vec![tok(TokenKind::Identifier, "x", 1), tok(TokenKind::LeftParen, "(", 1)];
        assert!(!tokens_match(&tokens2, &sig));
        assert!(tokens_contain(&tokens2, &sig));
    }

    #[test]
    fn match_implies_contain_invariant() {
        let tokens = vec![tok(TokenKind::Identifier, "foo", 1), tok(TokenKind::LeftParen, "(", 1), tok(TokenKind::RightParen, ")", 1)];
        let sig = combine([token(TokenKind::Identifier), token(TokenKind::LeftParen), token(TokenKind::RightParen)]);
        assert!(tokens_match(&tokens, &sig));
        assert!(tokens_contain(&tokens, &sig));
    }

    #[test]
    fn match_ranges_are_ordered_and_non_overlapping() {
        let tokens = vec![
            tok(TokenKind::Identifier, "a", 1),
            tok(TokenKind::Comma, ",", 1),
            tok(TokenKind::Identifier, "b", 1),
            tok(TokenKind::Comma, ",", 1),
            tok(TokenKind::Identifier, "c", 1),
        ];
        let pair = combine([token(TokenKind::Identifier), token(TokenKind::Comma)]);
        let ranges = get_match_ranges(&tokens, &pair);
        assert_eq!(ranges, vec![(0, 2), (2, 4)]);
        for w in ranges.windows(2) {
            assert!(w[0].1 <= w[1].0);
            assert!(w[0].0 < w[1].0);
        }
    }

    #[test]
    fn balanced_extraction_finds_matching_region() {
        let tokens = vec![
            tok(TokenKind::LeftBrace, "{", 1),
            tok(TokenKind::Identifier, "a", 1),
            tok(TokenKind::LeftBrace, "{", 1),
            tok(TokenKind::Identifier, "b", 1),
            tok(TokenKind::RightBrace, "}", 1),
            tok(TokenKind::RightBrace, "}", 1),
        ];
        let inc = token(TokenKind::LeftBrace);
        let dec = token(TokenKind::RightBrace);
        assert_eq!(balanced_range_extraction(&tokens, &inc, &dec), Some((0, 6)));
    }

    #[test]
    fn balanced_extraction_vec_finds_top_level_regions() {
        let tokens = vec![
            tok(TokenKind::LeftBrace, "{", 1),
            tok(TokenKind::RightBrace, "}", 1),
            tok(TokenKind::Identifier, "x", 1),
            tok(TokenKind::LeftBrace, "{", 1),
            tok(TokenKind::RightBrace, "}", 1),
        ];
        let inc = token(TokenKind::LeftBrace);
        let dec = token(TokenKind::RightBrace);
        let regions = balanced_range_extraction_vec(&tokens, &inc, &dec);
        assert_eq!(regions, vec![(0, 2), (3, 5)]);
    }

    #[test]
    fn unbalanced_extraction_returns_none() {
        let tokens = vec![tok(TokenKind::LeftBrace, "{", 1), tok(TokenKind::Identifier, "a", 1)];
        let inc = token(TokenKind::LeftBrace);
        let dec = token(TokenKind::RightBrace);
        assert_eq!(balanced_range_extraction(&tokens, &inc, &dec), None);
    }

    #[test]
    fn line_range_and_leading_indents() {
        let tokens = vec![
            tok(TokenKind::Indent, "", 1),
            tok(TokenKind::Indent, "", 1),
            tok(TokenKind::Identifier, "x", 1),
            tok(TokenKind::Identifier, "y", 2),
        ];
        assert_eq!(get_tokens_line_range(&tokens, 1), Some((0, 3)));
        assert_eq!(get_line_token_indices(&tokens, 1), Some((0, 3)));
        assert_eq!(get_leading_indents(&tokens, 1), Some(2));
        assert_eq!(get_leading_indents(&tokens, 2), Some(0));
    }

    #[test]
    fn match_until_signature_stops_before_terminator() {
        let tokens = vec![
            tok(TokenKind::Keyword, "for", 1),
            tok(TokenKind::Identifier, "i", 1),
            tok(TokenKind::Colon, ":", 1),
        ];
        let sig = combine([token_lexeme(TokenKind::Keyword, "for"), match_until_signature(&token(TokenKind::Colon))]);
        assert!(tokens_match(&tokens, &sig));
    }
}
