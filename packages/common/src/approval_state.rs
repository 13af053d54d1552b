#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Moderation state of a document.
///
/// Only `Approved` documents are publicly listable. Directors may move a
/// document between `Approved` and `Rejected` in either direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")
)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalState {
    /// Waiting for a director of the document's university.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "pending"))]
    Pending,
    /// Publicly visible.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "approved"))]
    Approved,
    /// Hidden from listings after review.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "rejected"))]
    Rejected,
}

impl ApprovalState {
    pub const ALL: &'static [ApprovalState] = &[Self::Pending, Self::Approved, Self::Rejected];

    pub fn is_public(&self) -> bool {
        matches!(self, Self::Approved)
    }

    /// Target state of a moderation decision.
    pub fn from_decision(approve: bool) -> Self {
        if approve { Self::Approved } else { Self::Rejected }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ApprovalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for ApprovalState {
    fn default() -> Self {
        Self::Pending
    }
}

/// Error when parsing an invalid approval state string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseApprovalStateError {
    invalid: String,
}

impl fmt::Display for ParseApprovalStateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid approval state '{}'. Valid values: {}",
            self.invalid,
            ApprovalState::ALL
                .iter()
                .map(|s| s.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseApprovalStateError {}

impl FromStr for ApprovalState {
    type Err = ParseApprovalStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            _ => Err(ParseApprovalStateError {
                invalid: s.to_string(),
            }),
        }
    }
}
