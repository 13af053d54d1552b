#[cfg(feature = "sea-orm")]
use sea_orm::prelude::StringLen;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a principal on the platform.
///
/// Roles are assigned administratively; the core only reads them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[cfg_attr(
    feature = "sea-orm",
    derive(sea_orm::DeriveActiveEnum, sea_orm::EnumIter),
    sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "student"))]
    Student,
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "professor"))]
    Professor,
    /// University director. Moderates documents of exactly one university.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "director"))]
    Director,
    /// Lazily provisioned account without an academic affiliation.
    #[cfg_attr(feature = "sea-orm", sea_orm(string_value = "generic"))]
    Generic,
}

impl Role {
    pub const ALL: &'static [Role] = &[
        Self::Student,
        Self::Professor,
        Self::Director,
        Self::Generic,
    ];

    /// Whether submissions by this role are published without review.
    pub fn auto_publishes(&self) -> bool {
        matches!(self, Self::Professor | Self::Director)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::Professor => "professor",
            Self::Director => "director",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::Generic
    }
}

/// Error when parsing an invalid role string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRoleError {
    invalid: String,
}

impl fmt::Display for ParseRoleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Invalid role '{}'. Valid values: {}",
            self.invalid,
            Role::ALL
                .iter()
                .map(|r| r.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )
    }
}

impl std::error::Error for ParseRoleError {}

impl FromStr for Role {
    type Err = ParseRoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "student" => Ok(Self::Student),
            "professor" => Ok(Self::Professor),
            "director" => Ok(Self::Director),
            "generic" => Ok(Self::Generic),
            _ => Err(ParseRoleError {
                invalid: s.to_string(),
            }),
        }
    }
}
