//! Opaque identifiers for every entity in the auction aggregate (§3, §9 "no back-pointers").
//!
//! Each id wraps a [`uuid::Uuid`] so entities can be looked up through the
//! [`crate::store::StateStore`] without ever holding a reference to one another in memory.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! opaque_id {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(value: Uuid) -> Self {
                Self(value)
            }
        }
    };
}

opaque_id!(AuctionId);
opaque_id!(TeamId);
opaque_id!(PlayerId);
opaque_id!(TradeId);
opaque_id!(EventId);
