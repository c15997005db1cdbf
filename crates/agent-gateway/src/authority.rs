//! Authority partition between the agent and extension surfaces.
//!
//! Every tool and RPC method carries exactly one tag. The dual-
//! transport server admits only `agent`; the stdio endpoint admits
//! only `extension`. A method surfacing on the wrong transport is an
//! implementation bug, so crossings fail closed as `method_not_found`
//! rather than leaking the method's existence.

use serde::{Deserialize, Serialize};

/// Which surface a method belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Authority {
    /// Reachable over HTTP/SSE by the external AI.
    Agent,
    /// Reachable over stdio by the browser extension.
    Extension,
}

impl Authority {
    /// True when a caller on `self`'s surface may see/invoke a method
    /// tagged `tag`.
    pub fn admits(&self, tag: Authority) -> bool {
        *self == tag
    }
}
