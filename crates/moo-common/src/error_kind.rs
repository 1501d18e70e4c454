//! Runtime error kinds.
//!
//! The set is closed: scripts name kinds with `E_*` literals, and the VM
//! raises exactly these. Shared here because both the lexer (literal
//! reclassification) and the interpreter need the table.

use std::fmt;

use num_enum::TryFromPrimitive;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, TryFromPrimitive)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum ErrorKind {
    Type = 0,
    VarNf,
    PropNf,
    TraitNf,
    VerbNf,
    InvObj,
    InvArg,
    Range,
    Div,
    Resource,
    MaxRec,
    System,
    User0,
    User1,
    User2,
    User3,
    User4,
    User5,
    User6,
    User7,
    User8,
    User9,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 22] = [
        ErrorKind::Type,
        ErrorKind::VarNf,
        ErrorKind::PropNf,
        ErrorKind::TraitNf,
        ErrorKind::VerbNf,
        ErrorKind::InvObj,
        ErrorKind::InvArg,
        ErrorKind::Range,
        ErrorKind::Div,
        ErrorKind::Resource,
        ErrorKind::MaxRec,
        ErrorKind::System,
        ErrorKind::User0,
        ErrorKind::User1,
        ErrorKind::User2,
        ErrorKind::User3,
        ErrorKind::User4,
        ErrorKind::User5,
        ErrorKind::User6,
        ErrorKind::User7,
        ErrorKind::User8,
        ErrorKind::User9,
    ];

    /// The literal spelling used in source code.
    pub fn name(self) -> &'static str {
        match self {
            ErrorKind::Type => "E_TYPE",
            ErrorKind::VarNf => "E_VARNF",
            ErrorKind::PropNf => "E_PROPNF",
            ErrorKind::TraitNf => "E_TRAITNF",
            ErrorKind::VerbNf => "E_VERBNF",
            ErrorKind::InvObj => "E_INVOBJ",
            ErrorKind::InvArg => "E_INVARG",
            ErrorKind::Range => "E_RANGE",
            ErrorKind::Div => "E_DIV",
            ErrorKind::Resource => "E_RESOURCE",
            ErrorKind::MaxRec => "E_MAXREC",
            ErrorKind::System => "E_SYSTEM",
            ErrorKind::User0 => "E_USER0",
            ErrorKind::User1 => "E_USER1",
            ErrorKind::User2 => "E_USER2",
            ErrorKind::User3 => "E_USER3",
            ErrorKind::User4 => "E_USER4",
            ErrorKind::User5 => "E_USER5",
            ErrorKind::User6 => "E_USER6",
            ErrorKind::User7 => "E_USER7",
            ErrorKind::User8 => "E_USER8",
            ErrorKind::User9 => "E_USER9",
        }
    }

    pub fn from_name(name: &str) -> Option<ErrorKind> {
        Self::ALL.iter().copied().find(|k| k.name() == name)
    }

    /// Default human-readable text when an error carries no message.
    pub fn description(self) -> &'static str {
        match self {
            ErrorKind::Type => "type mismatch",
            ErrorKind::VarNf => "variable not found",
            ErrorKind::PropNf => "property not found",
            ErrorKind::TraitNf => "trait not found",
            ErrorKind::VerbNf => "verb not found",
            ErrorKind::InvObj => "invalid object",
            ErrorKind::InvArg => "invalid argument",
            ErrorKind::Range => "out of range",
            ErrorKind::Div => "division by zero",
            ErrorKind::Resource => "resource limit exceeded",
            ErrorKind::MaxRec => "maximum call depth exceeded",
            ErrorKind::System => "internal error",
            _ => "user-defined error",
        }
    }

    #[inline]
    pub fn from_u8(v: u8) -> Option<ErrorKind> {
        Self::try_from(v).ok()
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for kind in ErrorKind::ALL {
            assert_eq!(ErrorKind::from_name(kind.name()), Some(kind));
            assert_eq!(ErrorKind::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(ErrorKind::from_name("E_NOPE"), None);
        assert_eq!(ErrorKind::from_u8(200), None);
    }

    #[test]
    fn test_user_kinds_are_numbered() {
        assert_eq!(ErrorKind::User0.name(), "E_USER0");
        assert_eq!(ErrorKind::User9 as u8 - ErrorKind::User0 as u8, 9);
    }
}
