//! Wire-name conversions for small domain enums
//!
//! Enums that appear in config files, log fields and env vars get a stable
//! lowercase name. Parsing accepts any case and treats `-` like `_`, so
//! `NETWORK-FIRST`, `network_first` and `Network_First` all parse.
//!
//! ```rust
//! use courier_domain::impl_wire_name;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Lane {
//!     Fast,
//!     SlowPath,
//! }
//!
//! impl_wire_name!(Lane {
//!     Fast => "fast",
//!     SlowPath => "slow_path",
//! });
//!
//! assert_eq!(Lane::SlowPath.as_str(), "slow_path");
//! assert_eq!("SLOW-PATH".parse::<Lane>(), Ok(Lane::SlowPath));
//! ```

/// Implements `as_str`, `Display` and `FromStr` from a variant/name table.
#[macro_export]
macro_rules! impl_wire_name {
    ($enum_name:ident { $($variant:ident => $name:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Stable lowercase name.
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
                $(
                    if normalized == $name {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("unknown {} '{}'", stringify!($enum_name), s))
            }
        }
    };
}
