use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite key for addressing a resource in state.
///
/// Two access list entries in the same configuration share a type but not
/// a name, so both parts are needed.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ResourceAddr {
    pub resource_type: String,
    pub resource_name: String,
}

impl ResourceAddr {
    pub fn new(resource_type: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            resource_name: resource_name.into(),
        }
    }
}

impl fmt::Display for ResourceAddr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.resource_name)
    }
}
