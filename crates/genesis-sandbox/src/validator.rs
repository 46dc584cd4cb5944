//! The nine-step trait source validator.
//!
//! Every step short-circuits on its first failure, reporting one of the
//! closed [`ErrorCode`] values — never a raw internal error type, and never
//! more than one finding per submission.

use crate::ast::TraitDef;
use crate::lexer::{self, Token};
use crate::parser::{self, ParseError};
use genesis_protocol::ErrorCode;
use sha2::{Digest, Sha256};

/// A validator rejection: one stable code, a human-readable reason, and the
/// steps that had already passed — the Coder Agent appends this `log` to
/// its single re-prompt attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ValidationError {
    /// The stable wire code.
    pub code: ErrorCode,
    /// Detail for logs and the operator surface.
    pub message: String,
    /// One line per step that ran before this failure, steps 1..N in order.
    pub log: Vec<String>,
}

impl ValidationError {
    fn new(log: Vec<String>, code: ErrorCode, message: impl Into<String>) -> Self {
        ValidationError { code, message: message.into(), log }
    }
}

/// Everything produced by a successful [`validate`] call: the parsed
/// definition and the full nine-line audit trail, including the steps the
/// DSL's grammar makes structurally unconditional.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    /// The parsed, fully-checked trait.
    pub def: TraitDef,
    /// One line per step, in order, all reading "passed".
    pub log: Vec<String>,
}

const BANNED_KEYWORDS: &[(&str, ErrorCode)] = &[
    ("import", ErrorCode::ImportForbidden),
    ("use", ErrorCode::ImportForbidden),
    ("await", ErrorCode::AwaitOnSync),
    ("async", ErrorCode::AwaitOnSync),
];

/// Run all nine validation steps against `source`, returning the parsed
/// definition and audit log on success.
///
/// `already_seen` is consulted only in the final step, letting the caller
/// (the mutation store, in production) decide what "already registered"
/// means without this crate depending on it directly.
pub fn validate(source: &str, already_seen: &dyn Fn(&[u8; 32]) -> bool) -> Result<ValidationReport, ValidationError> {
    let mut log = Vec::with_capacity(9);

    let tokens = step1_lex(source, &mut log)?;
    step2_import_whitelist(&tokens, &mut log)?;
    let def = step3_through_8_parse(&tokens, &mut log)?;
    step9_duplicate_content(source, already_seen, &mut log)?;

    Ok(ValidationReport { def, log })
}

fn step1_lex(source: &str, log: &mut Vec<String>) -> Result<Vec<Token>, ValidationError> {
    match lexer::lex(source) {
        Ok(tokens) => {
            log.push("1. parse: passed".to_string());
            Ok(tokens)
        }
        Err(e) => Err(ValidationError::new(log.clone(), ErrorCode::SyntaxError, e.to_string())),
    }
}

fn step2_import_whitelist(tokens: &[Token], log: &mut Vec<String>) -> Result<(), ValidationError> {
    for token in tokens {
        if let Token::Ident(name) = token {
            if let Some((_, code)) = BANNED_KEYWORDS.iter().find(|(kw, _)| kw == name) {
                return Err(ValidationError::new(log.clone(), *code, format!("'{name}' is not permitted in a trait body")));
            }
        }
    }
    log.push("2. import whitelist: passed (no import statement exists in the grammar)".to_string());
    Ok(())
}

fn step3_through_8_parse(tokens: &[Token], log: &mut Vec<String>) -> Result<TraitDef, ValidationError> {
    let def = parser::parse(tokens).map_err(|e| ValidationError::new(log.clone(), parse_error_code(&e), e.to_string()))?;
    log.push("3. banned calls: passed (builtin whitelist enforced during parse)".to_string());
    log.push("4. banned attribute access: passed (no reflective member access in the grammar)".to_string());
    log.push("5. module-level execution: passed".to_string());
    log.push(format!("6. contract: passed (trait '{}')", def.name));
    log.push("7. entity attribute whitelist: passed".to_string());
    log.push("8. initialisation signature: passed (traits are stateless across invocations)".to_string());
    Ok(def)
}

fn parse_error_code(err: &ParseError) -> ErrorCode {
    match err {
        ParseError::WrongTraitBlockCount => ErrorCode::NoTraitClass,
        ParseError::TrailingTokens => ErrorCode::ModuleLevelCode,
        ParseError::Unknown { what, .. } if *what == "function" => ErrorCode::BannedCall,
        ParseError::Unknown { .. } => ErrorCode::EntityAttrForbidden,
        ParseError::Expected { expected: "execute", .. } => ErrorCode::InitRequiredArgs,
        ParseError::LoopBoundTooLarge(_) => ErrorCode::SyntaxError,
        ParseError::Expected { .. } | ParseError::UnexpectedEof(_) => ErrorCode::SyntaxError,
    }
}

fn step9_duplicate_content(
    source: &str,
    already_seen: &dyn Fn(&[u8; 32]) -> bool,
    log: &mut Vec<String>,
) -> Result<(), ValidationError> {
    let hash = content_hash(source);
    if already_seen(&hash) {
        return Err(ValidationError::new(
            log.clone(),
            ErrorCode::DuplicateCode,
            "identical source already registered",
        ));
    }
    log.push("9. duplicate content: passed".to_string());
    Ok(())
}

/// The content hash used by [`step9_duplicate_content`], exposed so a
/// caller (the mutation store) can index by the same key it will later be
/// asked about.
pub fn content_hash(source: &str) -> [u8; 32] {
    Sha256::digest(source.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn never_seen(_: &[u8; 32]) -> bool {
        false
    }

    #[test]
    fn accepts_a_well_formed_trait() {
        let src = "trait wander { fn execute(entity) { entity.move(1.0, 0.0); } }";
        assert!(validate(src, &never_seen).is_ok());
    }

    #[test]
    fn rejects_import_keyword() {
        let src = "import foo; trait x { fn execute(entity) {} }";
        let err = validate(src, &never_seen).unwrap_err();
        assert_eq!(err.code, ErrorCode::ImportForbidden);
    }

    #[test]
    fn rejects_await_keyword() {
        let src = "trait x { fn execute(entity) { await entity.energy; } }";
        let err = validate(src, &never_seen).unwrap_err();
        assert_eq!(err.code, ErrorCode::AwaitOnSync);
    }

    #[test]
    fn rejects_a_banned_attribute() {
        let src = "trait x { fn execute(entity) { entity.secret = 1; } }";
        let err = validate(src, &never_seen).unwrap_err();
        assert_eq!(err.code, ErrorCode::EntityAttrForbidden);
    }

    #[test]
    fn rejects_a_banned_function_call() {
        let src = "trait x { fn execute(entity) { entity.energy += system_call(1); } }";
        let err = validate(src, &never_seen).unwrap_err();
        assert_eq!(err.code, ErrorCode::BannedCall);
    }

    #[test]
    fn rejects_missing_trait_block() {
        let src = "const X = 1;";
        let err = validate(src, &never_seen).unwrap_err();
        assert_eq!(err.code, ErrorCode::NoTraitClass);
    }

    #[test]
    fn rejects_duplicate_content() {
        let src = "trait wander { fn execute(entity) { entity.move(1.0, 0.0); } }";
        let err = validate(src, &|_| true).unwrap_err();
        assert_eq!(err.code, ErrorCode::DuplicateCode);
    }

    #[test]
    fn rejects_trailing_tokens_as_module_level_code() {
        let src = "trait x { fn execute(entity) {} } entity.energy = 1;";
        let err = validate(src, &never_seen).unwrap_err();
        assert_eq!(err.code, ErrorCode::ModuleLevelCode);
    }
}
