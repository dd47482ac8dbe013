use serde::{Deserialize, Serialize};

/// Hard cap on coexisting categories.
pub const MAX_CATEGORIES: usize = 2;

/// User-defined label referenced (never owned) by sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Hex color, e.g. `#FF4500`.
    pub color: String,
}

impl Category {
    pub fn new(id: impl Into<String>, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            color: color.into(),
        }
    }
}
