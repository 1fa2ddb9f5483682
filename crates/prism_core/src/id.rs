//! Unique identifiers for Prism entities.
//!
//! All IDs are random v4 UUIDs. They serialize as the bare UUID and display
//! with a short kind prefix (`rpt_…`, `exec_…`). Parsing accepts either form.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Display prefix for this kind of ID
            pub const PREFIX: &'static str = $prefix;

            /// Create a new random ID
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from UUID bytes
            #[must_use]
            pub const fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Uuid::from_bytes(bytes))
            }

            /// Get as UUID
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Storage key (bare UUID, hyphenated)
            #[must_use]
            pub fn key(&self) -> String {
                self.0.to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s
                    .strip_prefix(concat!($prefix, "_"))
                    .unwrap_or(s);
                Uuid::parse_str(raw)
                    .map(Self)
                    .map_err(|e| CoreError::InvalidId {
                        reason: format!("{}: {}", s, e),
                    })
            }
        }
    };
}

entity_id!(
    /// Report identifier - identifies a report definition
    ReportId,
    "rpt"
);

entity_id!(
    /// Execution identifier - one run of a report, generated per trigger
    ExecutionId,
    "exec"
);

entity_id!(
    /// Dashboard identifier
    DashboardId,
    "dash"
);

entity_id!(
    /// Widget identifier - one independently cached dashboard tile
    WidgetId,
    "wgt"
);

entity_id!(
    /// Alert rule identifier
    AlertRuleId,
    "rule"
);

entity_id!(
    /// Alert instance identifier - one concrete breach occurrence
    AlertInstanceId,
    "alert"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_creation() {
        assert_ne!(ReportId::new(), ReportId::new());
        assert_ne!(ExecutionId::new(), ExecutionId::new());
        assert_ne!(AlertInstanceId::new(), AlertInstanceId::new());
    }

    #[test]
    fn test_id_display() {
        let id = ExecutionId::new();
        assert!(id.to_string().starts_with("exec_"));

        let id = AlertRuleId::new();
        assert!(id.to_string().starts_with("rule_"));
    }

    #[test]
    fn test_id_parse_prefixed_and_bare() {
        let id = ReportId::new();
        let prefixed: ReportId = id.to_string().parse().unwrap();
        let bare: ReportId = id.key().parse().unwrap();
        assert_eq!(prefixed, id);
        assert_eq!(bare, id);
    }

    #[test]
    fn test_id_parse_invalid() {
        let result = "rpt_not-a-uuid".parse::<ReportId>();
        assert!(matches!(result, Err(CoreError::InvalidId { .. })));
    }

    #[test]
    fn test_id_serializes_as_bare_uuid() {
        let id = WidgetId::from_bytes([7u8; 16]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.key()));

        let back: WidgetId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }
}
