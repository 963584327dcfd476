//! Hierarchical entity identifiers.
//!
//! A UID is a dot-separated list of tokens, one per tree level. Each token is
//! an acronym followed by a positive integer, so `BR2.MR3.SM1` names the first
//! `SM` under the third `MR` under the second `BR`.
//!
//! # Examples
//!
//! ```ignore
//! let uid: Uid = "A2.B1".parse().unwrap();
//! assert_eq!(uid.depth(), 2);
//! assert_eq!(uid.leaf().to_string(), "B1");
//! assert_eq!(uid.parent().unwrap().to_string(), "A2");
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::error::{EngineError, Result};

/// One level of a UID: an acronym plus a positive integer.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UidToken {
    acronym: String,
    index: u32,
}

impl UidToken {
    /// Build a token, validating the acronym syntax and that `index` is positive.
    pub fn new(acronym: &str, index: u32) -> Result<UidToken> {
        validate_acronym(acronym)?;
        if index == 0 {
            return Err(EngineError::InvalidUid {
                text: format!("{}{}", acronym, index),
                reason: "token integers start at 1".to_string(),
            });
        }
        Ok(UidToken {
            acronym: acronym.to_string(),
            index,
        })
    }

    pub fn acronym(&self) -> &str {
        &self.acronym
    }

    pub fn index(&self) -> u32 {
        self.index
    }
}

impl FromStr for UidToken {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = |reason: &str| EngineError::InvalidUid {
            text: s.to_string(),
            reason: reason.to_string(),
        };
        let caps = token_re()
            .captures(s)
            .ok_or_else(|| invalid("expected letters followed by digits"))?;
        let index = caps["index"]
            .parse::<u32>()
            .map_err(|_| invalid("token integer out of range"))?;
        UidToken::new(&caps["acronym"], index)
    }
}

impl TryFrom<String> for UidToken {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<UidToken> for String {
    fn from(token: UidToken) -> String {
        token.to_string()
    }
}

impl fmt::Display for UidToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.acronym, self.index)
    }
}

/// A full path of tokens from the tree root down to one entity instance.
///
/// Never empty: the root of a tree has no UID, its children start at depth 1.
#[derive(Clone, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Uid {
    tokens: Vec<UidToken>,
}

impl Uid {
    /// A depth-1 UID made of a single token.
    pub fn root(token: UidToken) -> Uid {
        Uid {
            tokens: vec![token],
        }
    }

    /// Extend `parent` (or the tree root when `None`) with `token`.
    pub fn under(parent: Option<&Uid>, token: UidToken) -> Uid {
        match parent {
            Some(parent) => parent.child(token),
            None => Uid::root(token),
        }
    }

    pub fn tokens(&self) -> &[UidToken] {
        &self.tokens
    }

    pub fn depth(&self) -> usize {
        self.tokens.len()
    }

    /// The last token, i.e. the leaf UID.
    pub fn leaf(&self) -> &UidToken {
        // Construction guarantees at least one token.
        &self.tokens[self.tokens.len() - 1]
    }

    /// The containing entity's UID, or `None` at depth 1.
    pub fn parent(&self) -> Option<Uid> {
        if self.tokens.len() <= 1 {
            None
        } else {
            Some(Uid {
                tokens: self.tokens[..self.tokens.len() - 1].to_vec(),
            })
        }
    }

    pub fn child(&self, token: UidToken) -> Uid {
        let mut tokens = self.tokens.clone();
        tokens.push(token);
        Uid { tokens }
    }

    /// True if `self` is a strict prefix of `other`.
    pub fn is_ancestor_of(&self, other: &Uid) -> bool {
        self.tokens.len() < other.tokens.len() && other.tokens[..self.tokens.len()] == self.tokens
    }
}

impl FromStr for Uid {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(EngineError::InvalidUid {
                text: s.to_string(),
                reason: "empty UID".to_string(),
            });
        }
        let tokens = trimmed
            .split('.')
            .map(|part| {
                part.parse::<UidToken>().map_err(|_| EngineError::InvalidUid {
                    text: s.to_string(),
                    reason: format!("bad token '{}'", part),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Uid { tokens })
    }
}

impl TryFrom<String> for Uid {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Uid> for String {
    fn from(uid: Uid) -> String {
        uid.to_string()
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", token)?;
        }
        Ok(())
    }
}

/// Acronyms are non-empty runs of ASCII letters.
pub(crate) fn validate_acronym(acronym: &str) -> Result<()> {
    if acronym.is_empty() || !acronym.bytes().all(|b| b.is_ascii_alphabetic()) {
        return Err(EngineError::UnknownAcronymSyntax {
            acronym: acronym.to_string(),
        });
    }
    Ok(())
}

fn token_re() -> &'static Regex {
    static TOKEN_RE: OnceLock<Regex> = OnceLock::new();
    TOKEN_RE.get_or_init(|| {
        Regex::new(r"^(?<acronym>[A-Za-z]+)(?<index>[0-9]+)$").expect("UID token regex must compile")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let uid: Uid = "BR2.MR3.SM1".parse().unwrap();
        assert_eq!(uid.depth(), 3);
        assert_eq!(uid.leaf().acronym(), "SM");
        assert_eq!(uid.leaf().index(), 1);
        assert_eq!(uid.to_string(), "BR2.MR3.SM1");
    }

    #[test]
    fn test_parent_and_child() {
        let uid: Uid = "A2.B1".parse().unwrap();
        assert_eq!(uid.parent().unwrap().to_string(), "A2");
        assert!(uid.parent().unwrap().parent().is_none());

        let child = uid.child(UidToken::new("CO", 1).unwrap());
        assert_eq!(child.to_string(), "A2.B1.CO1");
        assert!(uid.is_ancestor_of(&child));
        assert!(!child.is_ancestor_of(&uid));
        assert!(!uid.is_ancestor_of(&uid));
    }

    #[test]
    fn test_invalid_uids() {
        assert!("".parse::<Uid>().is_err());
        assert!("A".parse::<Uid>().is_err());
        assert!("12".parse::<Uid>().is_err());
        assert!("A0".parse::<Uid>().is_err());
        assert!("A1..B2".parse::<Uid>().is_err());
        assert!("A1.2B".parse::<Uid>().is_err());
        assert!("A-1".parse::<Uid>().is_err());
        assert!("A99999999999".parse::<Uid>().is_err());
    }

    #[test]
    fn test_token_rejects_bad_acronym() {
        assert!(matches!(
            UidToken::new("B2", 1),
            Err(EngineError::UnknownAcronymSyntax { .. })
        ));
        assert!(matches!(
            UidToken::new("", 1),
            Err(EngineError::UnknownAcronymSyntax { .. })
        ));
    }

    #[test]
    fn test_serde_uses_display_form() {
        let uid: Uid = "A1.B2".parse().unwrap();
        let as_string: String = uid.clone().into();
        assert_eq!(as_string, "A1.B2");
        assert_eq!(Uid::try_from(as_string).unwrap(), uid);
    }
}
