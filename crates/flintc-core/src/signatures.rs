//! Prebuilt signature vocabulary for language constructs (spec.md §4.2,
//! supplemented from `original_source/include/parser/signature.hpp`: these
//! are the concrete signatures the out-of-scope parser-facing surface would
//! otherwise have to duplicate, and they double as the signature engine's
//! own test fixture data).

use crate::signature::{any_token, combine, match_until_signature, token, token_lexeme, Signature};
use crate::token::TokenKind;

fn keyword(word: &str) -> Signature {
    token_lexeme(TokenKind::Keyword, word)
}

fn binop(op: &str) -> Signature {
    token_lexeme(TokenKind::BinaryOperator, op)
}

pub fn anytoken() -> Signature {
    any_token()
}

pub fn type_prim() -> Signature {
    token(TokenKind::TypePrimitive)
}

pub fn literal() -> Signature {
    combine([
        token(TokenKind::StringLiteral),
        token(TokenKind::IntLiteral),
        token(TokenKind::FloatLiteral),
        token(TokenKind::CharLiteral),
        token(TokenKind::BoolLiteral),
    ])
}

pub fn type_sig() -> Signature {
    combine([type_prim(), token(TokenKind::Identifier)])
}

pub fn operational_binop() -> Signature {
    combine([binop("+"), binop("-"), binop("*"), binop("/"), binop("^")])
}

pub fn relational_binop() -> Signature {
    combine([binop("=="), binop("!="), binop("<"), binop("<="), binop(">"), binop(">=")])
}

pub fn boolean_binop() -> Signature {
    combine([binop("and"), binop("or")])
}

pub fn binary_operator() -> Signature {
    combine([operational_binop(), relational_binop(), boolean_binop()])
}

pub fn unary_operator() -> Signature {
    combine([
        token_lexeme(TokenKind::UnaryOperator, "++"),
        token_lexeme(TokenKind::UnaryOperator, "--"),
        token_lexeme(TokenKind::UnaryOperator, "!"),
    ])
}

pub fn args() -> Signature {
    combine([
        type_sig(),
        token(TokenKind::Identifier),
        match_until_signature(&token(TokenKind::RightParen)),
    ])
}

// --- Definitions ---

pub fn use_statement() -> Signature {
    combine([keyword("use"), match_until_signature(&token(TokenKind::Semicolon))])
}

pub fn function_definition() -> Signature {
    combine([
        keyword("def"),
        token(TokenKind::Identifier),
        token(TokenKind::LeftParen),
        match_until_signature(&token(TokenKind::RightParen)),
        match_until_signature(&token(TokenKind::Colon)),
    ])
}

pub fn data_definition() -> Signature {
    combine([keyword("data"), token(TokenKind::Identifier), token(TokenKind::Colon)])
}

pub fn entity_definition() -> Signature {
    combine([
        keyword("entity"),
        token(TokenKind::Identifier),
        match_until_signature(&token(TokenKind::Colon)),
    ])
}

pub fn error_definition() -> Signature {
    combine([
        keyword("error"),
        token(TokenKind::Identifier),
        match_until_signature(&token(TokenKind::Colon)),
    ])
}

pub fn enum_definition() -> Signature {
    combine([keyword("enum"), token(TokenKind::Identifier), token(TokenKind::Colon)])
}

pub fn variant_definition() -> Signature {
    combine([keyword("variant"), token(TokenKind::Identifier), token(TokenKind::Colon)])
}

pub fn test_definition() -> Signature {
    combine([keyword("test"), token(TokenKind::StringLiteral), token(TokenKind::Colon)])
}

// --- Statements ---

pub fn declaration_without_initializer() -> Signature {
    combine([type_sig(), token(TokenKind::Identifier), token(TokenKind::Semicolon)])
}

pub fn declaration_explicit() -> Signature {
    combine([type_sig(), token(TokenKind::Identifier), token(TokenKind::AssignOperator)])
}

pub fn assignment() -> Signature {
    combine([token(TokenKind::Identifier), token(TokenKind::AssignOperator)])
}

pub fn for_loop() -> Signature {
    combine([
        keyword("for"),
        match_until_signature(&token(TokenKind::Semicolon)),
        match_until_signature(&token(TokenKind::Semicolon)),
        match_until_signature(&token(TokenKind::Colon)),
    ])
}

pub fn enhanced_for_loop() -> Signature {
    combine([
        keyword("for"),
        token(TokenKind::Identifier),
        token(TokenKind::Comma),
        token(TokenKind::Identifier),
        keyword("in"),
        match_until_signature(&token(TokenKind::Colon)),
    ])
}

pub fn par_for_loop() -> Signature {
    combine([keyword("parallel"), enhanced_for_loop()])
}

pub fn while_loop() -> Signature {
    combine([keyword("while"), match_until_signature(&token(TokenKind::Colon))])
}

pub fn if_statement() -> Signature {
    combine([keyword("if"), match_until_signature(&token(TokenKind::Colon))])
}

pub fn else_if_statement() -> Signature {
    combine([keyword("else"), keyword("if"), match_until_signature(&token(TokenKind::Colon))])
}

pub fn else_statement() -> Signature {
    combine([keyword("else"), token(TokenKind::Colon)])
}

pub fn return_statement() -> Signature {
    combine([keyword("return"), match_until_signature(&token(TokenKind::Semicolon))])
}

pub fn throw_statement() -> Signature {
    combine([keyword("throw"), match_until_signature(&token(TokenKind::Semicolon))])
}

// --- Expressions ---

pub fn function_call() -> Signature {
    combine([
        token(TokenKind::Identifier),
        token(TokenKind::LeftParen),
        match_until_signature(&token(TokenKind::RightParen)),
    ])
}

pub fn type_cast() -> Signature {
    combine([
        type_prim(),
        token(TokenKind::LeftParen),
        match_until_signature(&token(TokenKind::RightParen)),
    ])
}

pub fn variable_expr() -> Signature {
    token(TokenKind::Identifier)
}

/// `function_call` followed by `catch [name]:` (spec.md §4.2: error
/// handling signatures require `function_call` to already be defined).
pub fn catch_statement() -> Signature {
    combine([function_call(), keyword("catch"), match_until_signature(&token(TokenKind::Colon))])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{tokens_match, get_match_ranges};
    use crate::token::Token;

    fn t(kind: TokenKind, lexeme: &str, line: u32) -> Token {
        Token::new(kind, lexeme, line)
    }

    #[test]
    fn enhanced_for_loop_matches_scenario_3() {
        // for i, x in xs:
        let tokens = vec![
            t(TokenKind::Keyword, "for", 1),
            t(TokenKind::Identifier, "i", 1),
            t(TokenKind::Comma, ",", 1),
            t(TokenKind::Identifier, "x", 1),
            t(TokenKind::Keyword, "in", 1),
            t(TokenKind::Identifier, "xs", 1),
            t(TokenKind::Colon, ":", 1),
        ];
        let sig = enhanced_for_loop();
        assert!(tokens_match(&tokens, &sig));
        let ranges = get_match_ranges(&tokens, &sig);
        assert_eq!(ranges, vec![(0, 7)]);
    }

    #[test]
    fn function_definition_matches_simple_add() {
        // def add(int a, int b) -> int: return a + b ;  (simplified, only the header matters)
        let tokens = vec![
            t(TokenKind::Keyword, "def", 1),
            t(TokenKind::Identifier, "add", 1),
            t(TokenKind::LeftParen, "(", 1),
            t(TokenKind::TypePrimitive, "i32", 1),
            t(TokenKind::Identifier, "a", 1),
            t(TokenKind::Comma, ",", 1),
            t(TokenKind::TypePrimitive, "i32", 1),
            t(TokenKind::Identifier, "b", 1),
            t(TokenKind::RightParen, ")", 1),
            t(TokenKind::Arrow, "->", 1),
            t(TokenKind::TypePrimitive, "i32", 1),
            t(TokenKind::Colon, ":", 1),
        ];
        assert!(tokens_match(&tokens, &function_definition()));
    }

    #[test]
    fn catch_statement_requires_trailing_colon() {
        let tokens = vec![
            t(TokenKind::Identifier, "might_fail", 1),
            t(TokenKind::LeftParen, "(", 1),
            t(TokenKind::RightParen, ")", 1),
            t(TokenKind::Keyword, "catch", 1),
            t(TokenKind::Identifier, "e", 1),
            t(TokenKind::Colon, ":", 1),
        ];
        assert!(tokens_match(&tokens, &catch_statement()));
    }
}
