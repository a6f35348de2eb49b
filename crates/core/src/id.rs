// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! ID newtype generation.

/// Trait for truncating identifiers to a short prefix.
pub trait ShortId {
    /// Returns a string slice truncated to at most `n` characters.
    fn short(&self, n: usize) -> &str;
}

impl ShortId for str {
    fn short(&self, n: usize) -> &str {
        if self.len() <= n {
            self
        } else {
            &self[..n]
        }
    }
}

/// Define a newtype ID wrapper around an integer type.
///
/// Generates `new()`, `get()`, `Display`, and `From<$repr>` implementations.
/// Used for ids that come from the OS (e.g. a pid), where a `String`-backed
/// id would be the wrong representation.
///
/// ```ignore
/// define_numeric_id! {
///     /// Doc comment for the ID type.
///     pub struct MyId(u32);
/// }
/// ```
#[macro_export]
macro_rules! define_numeric_id {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($repr:ty);
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
        pub struct $name($repr);

        impl $name {
            pub const fn new(id: $repr) -> Self {
                Self(id)
            }

            pub const fn get(&self) -> $repr {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<$repr> for $name {
            fn from(id: $repr) -> Self {
                Self(id)
            }
        }
    };
}

/// Generator for the monotonic kernel-assigned event ordinal.
///
/// Production code never generates seqnums itself — they arrive from the
/// kernel uevent source — but tests need a convenient monotonic source.
#[derive(Debug, Clone, Default)]
pub struct SeqnumGen {
    next: std::sync::Arc<std::sync::atomic::AtomicU64>,
}

impl SeqnumGen {
    pub fn new() -> Self {
        Self {
            next: std::sync::Arc::new(std::sync::atomic::AtomicU64::new(1)),
        }
    }

    pub fn next(&self) -> u64 {
        self.next.fetch_add(1, std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
