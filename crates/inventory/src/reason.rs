use core::str::FromStr;

use serde::{Deserialize, Serialize};

use stockroom_core::{DomainError, DomainResult};

use crate::movement::MoveType;

/// Why stock moved.
///
/// Serialized (and stored) by its label. Which reasons are acceptable depends
/// on the move type; see [`MoveType::allowed_reasons`].
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Reason {
    #[serde(rename = "Satın Alma")]
    Purchase,
    #[serde(rename = "Üretim")]
    Production,
    #[serde(rename = "İade")]
    Return,
    #[serde(rename = "Satış")]
    Sale,
    #[serde(rename = "Kullanım")]
    Usage,
    #[serde(rename = "Hasar")]
    Damage,
    #[serde(rename = "Kayıp")]
    Loss,
    #[serde(rename = "Transfer")]
    Transfer,
    #[serde(rename = "Fire")]
    Shrinkage,
    #[serde(rename = "Düzeltme")]
    Correction,
}

const IN_REASONS: [Reason; 4] = [
    Reason::Purchase,
    Reason::Production,
    Reason::Return,
    Reason::Correction,
];

const OUT_REASONS: [Reason; 7] = [
    Reason::Sale,
    Reason::Usage,
    Reason::Damage,
    Reason::Loss,
    Reason::Transfer,
    Reason::Shrinkage,
    Reason::Correction,
];

impl MoveType {
    /// Reasons accepted for this move type, in presentation order.
    pub fn allowed_reasons(self) -> &'static [Reason] {
        match self {
            MoveType::In => &IN_REASONS,
            MoveType::Out => &OUT_REASONS,
        }
    }
}

impl Reason {
    pub const ALL: [Reason; 10] = [
        Reason::Purchase,
        Reason::Production,
        Reason::Return,
        Reason::Sale,
        Reason::Usage,
        Reason::Damage,
        Reason::Loss,
        Reason::Transfer,
        Reason::Shrinkage,
        Reason::Correction,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Reason::Purchase => "Satın Alma",
            Reason::Production => "Üretim",
            Reason::Return => "İade",
            Reason::Sale => "Satış",
            Reason::Usage => "Kullanım",
            Reason::Damage => "Hasar",
            Reason::Loss => "Kayıp",
            Reason::Transfer => "Transfer",
            Reason::Shrinkage => "Fire",
            Reason::Correction => "Düzeltme",
        }
    }

    /// Stable ASCII key.
    pub fn key(self) -> &'static str {
        match self {
            Reason::Purchase => "purchase",
            Reason::Production => "production",
            Reason::Return => "return",
            Reason::Sale => "sale",
            Reason::Usage => "usage",
            Reason::Damage => "damage",
            Reason::Loss => "loss",
            Reason::Transfer => "transfer",
            Reason::Shrinkage => "shrinkage",
            Reason::Correction => "correction",
        }
    }

    pub fn is_allowed_for(self, move_type: MoveType) -> bool {
        move_type.allowed_reasons().contains(&self)
    }

    /// Parse a submitted reason and check it against the table for `move_type`.
    pub fn parse_for(move_type: MoveType, raw: &str) -> DomainResult<Self> {
        let reason = raw.parse::<Reason>().ok().filter(|r| r.is_allowed_for(move_type));
        reason.ok_or_else(|| {
            let valid = move_type
                .allowed_reasons()
                .iter()
                .map(|r| r.label())
                .collect::<Vec<_>>()
                .join(", ");
            DomainError::validation(
                "reason",
                format!("valid reasons for {move_type}: {valid}"),
            )
        })
    }
}

impl core::fmt::Display for Reason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Reason {
    type Err = DomainError;

    /// Accepts either the label or the ASCII key.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Reason::ALL
            .into_iter()
            .find(|r| r.label() == s || r.key().eq_ignore_ascii_case(s))
            .ok_or_else(|| DomainError::validation("reason", format!("unknown reason '{s}'")))
    }
}
