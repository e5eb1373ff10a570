//! Connection-related data models.
//!
//! This module maps store URLs to the backend that serves them and masks
//! credentials before a URL is logged or returned.

use crate::models::Dialect;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use url::Url;

/// Supported store backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Includes MariaDB
    MySql,
    Postgres,
    /// Accepted in the relational-primary slot for local use
    SQLite,
    MongoDb,
}

impl StoreKind {
    /// Parse the store kind from a connection string.
    pub fn from_connection_string(connection_string: &str) -> Option<Self> {
        let lower = connection_string.to_lowercase();
        if lower.starts_with("postgres://") || lower.starts_with("postgresql://") {
            Some(Self::Postgres)
        } else if lower.starts_with("mysql://") || lower.starts_with("mariadb://") {
            Some(Self::MySql)
        } else if lower.starts_with("sqlite://") || lower.starts_with("sqlite:") {
            Some(Self::SQLite)
        } else if lower.starts_with("mongodb://") || lower.starts_with("mongodb+srv://") {
            Some(Self::MongoDb)
        } else {
            None
        }
    }

    /// Get the display name for this store kind.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::MySql => "MySQL",
            Self::Postgres => "PostgreSQL",
            Self::SQLite => "SQLite",
            Self::MongoDb => "MongoDB",
        }
    }

    pub fn is_relational(&self) -> bool {
        !matches!(self, Self::MongoDb)
    }

    /// Whether a store of this kind may serve the given dialect.
    pub fn serves(&self, dialect: Dialect) -> bool {
        match dialect {
            Dialect::MySql => matches!(self, Self::MySql | Self::SQLite),
            Dialect::Postgres => matches!(self, Self::Postgres),
            Dialect::MongoDb => matches!(self, Self::MongoDb),
        }
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

/// Get a display-safe version of a connection string (password masked).
pub fn mask_credentials(connection_string: &str) -> String {
    match Url::parse(connection_string) {
        Ok(mut url) if url.password().is_some() => {
            if url.set_password(Some("****")).is_ok() {
                url.to_string()
            } else {
                "<unprintable url>".to_string()
            }
        }
        Ok(_) => connection_string.to_string(),
        // Unparseable input may still carry a secret before '@'.
        Err(_) => match connection_string.find('@') {
            Some(at_pos) => match connection_string[..at_pos].rfind(':') {
                Some(colon_pos) => format!(
                    "{}****{}",
                    &connection_string[..colon_pos + 1],
                    &connection_string[at_pos..]
                ),
                None => connection_string.to_string(),
            },
            None => connection_string.to_string(),
        },
    }
}
