//! The closed, wire-stable error taxonomy shared by the sandbox validator,
//! the runtime patcher, and the operator HTTP surface.
//!
//! Every internal `thiserror` error type in the other crates maps into one
//! of these codes at the boundary; nothing upstream of the wire ever sees
//! a raw internal error type.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stable, serializable error code.
///
/// Variant names are kept `SCREAMING_SNAKE_CASE` in their `Display`/`Serialize`
/// form because operator tooling and narration feeds match on the string,
/// not the Rust identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// The trait source failed to lex or parse.
    SyntaxError,
    /// The source referenced an import, which the DSL grammar forbids.
    ImportForbidden,
    /// The source called a function outside the builtin whitelist.
    BannedCall,
    /// The source accessed an attribute or field outside the allowed set.
    BannedAttr,
    /// The source contained executable statements outside a trait body.
    ModuleLevelCode,
    /// The source did not define a trait class.
    NoTraitClass,
    /// The trait body accessed an entity attribute not on the allowed list.
    EntityAttrForbidden,
    /// The trait's `init` did not match the required argument signature.
    InitRequiredArgs,
    /// The source attempted to await inside a synchronous trait body.
    AwaitOnSync,
    /// The source is byte-identical to an already-registered trait.
    DuplicateCode,
    /// The trait failed to load into the registry after passing validation.
    LoadFailed,
    /// A requested trait class does not exist in the registry.
    ClassNotFound,
    /// Import resolution (never applicable in-process, reported for parity).
    ImportTimeout,
    /// The architect/coder LLM call exceeded its timeout.
    LlmTimeout,
    /// The LLM response could not be parsed into the expected shape.
    LlmUnparseable,
    /// An evolution cycle was requested while the cooldown is still active.
    CooldownActive,
    /// The circuit breaker is open; no further cycles are being accepted.
    CircuitBreakerActive,
    /// A client exceeded the operator command rate limit.
    RateLimitExceeded,
}

impl ErrorCode {
    /// The wire string for this code, identical to its serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::SyntaxError => "SYNTAX_ERROR",
            ErrorCode::ImportForbidden => "IMPORT_FORBIDDEN",
            ErrorCode::BannedCall => "BANNED_CALL",
            ErrorCode::BannedAttr => "BANNED_ATTR",
            ErrorCode::ModuleLevelCode => "MODULE_LEVEL_CODE",
            ErrorCode::NoTraitClass => "NO_TRAIT_CLASS",
            ErrorCode::EntityAttrForbidden => "ENTITY_ATTR_FORBIDDEN",
            ErrorCode::InitRequiredArgs => "INIT_REQUIRED_ARGS",
            ErrorCode::AwaitOnSync => "AWAIT_ON_SYNC",
            ErrorCode::DuplicateCode => "DUPLICATE_CODE",
            ErrorCode::LoadFailed => "LOAD_FAILED",
            ErrorCode::ClassNotFound => "CLASS_NOT_FOUND",
            ErrorCode::ImportTimeout => "IMPORT_TIMEOUT",
            ErrorCode::LlmTimeout => "LLM_TIMEOUT",
            ErrorCode::LlmUnparseable => "LLM_UNPARSEABLE",
            ErrorCode::CooldownActive => "COOLDOWN_ACTIVE",
            ErrorCode::CircuitBreakerActive => "CIRCUIT_BREAKER_ACTIVE",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A code paired with a human-readable message, the shape returned on the
/// operator HTTP surface and embedded in validator rejection logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    /// The stable error code.
    pub code: ErrorCode,
    /// A human-readable message, safe to surface to an operator.
    pub message: String,
    /// Optional source line the error refers to, when applicable.
    pub line: Option<u32>,
}

impl ErrorEnvelope {
    /// Build an envelope with no line information.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ErrorEnvelope {
            code,
            message: message.into(),
            line: None,
        }
    }

    /// Build an envelope pointing at a specific source line.
    pub fn at_line(code: ErrorCode, message: impl Into<String>, line: u32) -> Self {
        ErrorEnvelope {
            code,
            message: message.into(),
            line: Some(line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_strings_are_screaming_snake_case() {
        assert_eq!(ErrorCode::SyntaxError.as_str(), "SYNTAX_ERROR");
        assert_eq!(ErrorCode::RateLimitExceeded.as_str(), "RATE_LIMIT_EXCEEDED");
    }

    #[test]
    fn serializes_to_the_same_string_as_display() {
        let json = serde_json::to_string(&ErrorCode::BannedCall).expect("serialize");
        assert_eq!(json, "\"BANNED_CALL\"");
        assert_eq!(ErrorCode::BannedCall.to_string(), "BANNED_CALL");
    }
}
