use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

macro_rules! record_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            /// The first identifier handed out.
            pub const FIRST: $name = $name(1);

            /// Wrap a raw value, rejecting zero.
            pub fn new(raw: u64) -> Result<Self, TypeError> {
                if raw == 0 {
                    return Err(TypeError::ZeroId);
                }
                Ok(Self(raw))
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

record_id!(
    /// Identifier of a registered project.
    ProjectId,
    "project-"
);

record_id!(
    /// Identifier of a distribution proposal.
    ProposalId,
    "proposal-"
);
