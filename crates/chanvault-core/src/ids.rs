//! Strongly-typed ids for the chat platform's entities.
//!
//! All platform ids are 64-bit unsigned integers (snowflake-style). The
//! newtypes exist so a channel id can never be passed where a message id is
//! expected, and so the persisted wire formats have a single place that
//! defines how an id renders and parses.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub u64);

        impl $name {
            /// Raw numeric value.
            pub fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<u64> for $name {
            fn from(v: u64) -> Self {
                Self(v)
            }
        }

        impl FromStr for $name {
            type Err = ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse::<u64>().map(Self)
            }
        }
    };
}

id_type!(
    /// Id of a server (guild) the bot is a member of.
    ServerId
);
id_type!(
    /// Id of a channel within a server.
    ChannelId
);
id_type!(
    /// Id of a channel category (parent grouping of channels).
    CategoryId
);
id_type!(
    /// Id of a message within a channel. Ids are monotonically increasing
    /// in creation order, which is what makes them usable as resumption
    /// cursors.
    MessageId
);
id_type!(
    /// Id of a single attachment on a message.
    AttachmentId
);

impl CategoryId {
    /// Sentinel for "channel has no parent category".
    pub const NONE: CategoryId = CategoryId(0);

    /// Whether this is the no-category sentinel.
    pub fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl MessageId {
    /// Sentinel for "nothing processed yet"; backfill from the beginning.
    pub const ZERO: MessageId = MessageId(0);
}
