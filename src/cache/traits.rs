//! Key and value capabilities required by the cache.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

// == Cache Key ==
/// A type usable as a cache key.
///
/// `is_null` marks the "no key" value of the type. Every keyed store
/// operation rejects null keys with `CacheError::InvalidArgument`.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {
    /// Returns `true` if this key is the null key of its type.
    fn is_null(&self) -> bool {
        false
    }
}

impl CacheKey for String {
    fn is_null(&self) -> bool {
        self.is_empty()
    }
}

impl CacheKey for &'static str {
    fn is_null(&self) -> bool {
        self.is_empty()
    }
}

impl CacheKey for Arc<str> {
    fn is_null(&self) -> bool {
        self.is_empty()
    }
}

impl<T: CacheKey> CacheKey for Option<T> {
    fn is_null(&self) -> bool {
        self.as_ref().map_or(true, CacheKey::is_null)
    }
}

macro_rules! never_null_key {
    ($($t:ty),* $(,)?) => {
        $(impl CacheKey for $t {})*
    };
}

never_null_key!(u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, char, bool);

// == Cache Value ==
/// A type storable as a cache value.
///
/// `dispose` is the release hook the store invokes when a value leaves
/// the cache and disposal is enabled. The default is a no-op, so plain
/// data types only need an empty `impl`.
pub trait CacheValue: Send + Sync + 'static {
    /// Returns `true` if this value is the null value of its type.
    fn is_null(&self) -> bool {
        false
    }

    /// Releases resources held by the value.
    fn dispose(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<T: CacheValue> CacheValue for Option<T> {
    fn is_null(&self) -> bool {
        self.is_none()
    }

    fn dispose(&self) -> anyhow::Result<()> {
        match self {
            Some(inner) => inner.dispose(),
            None => Ok(()),
        }
    }
}

impl<T: CacheValue + ?Sized> CacheValue for Arc<T> {
    fn is_null(&self) -> bool {
        (**self).is_null()
    }

    fn dispose(&self) -> anyhow::Result<()> {
        (**self).dispose()
    }
}

impl<T: Send + Sync + 'static> CacheValue for Vec<T> {}

impl CacheValue for str {}

macro_rules! plain_value {
    ($($t:ty),* $(,)?) => {
        $(impl CacheValue for $t {})*
    };
}

plain_value!(
    String, &'static str, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32,
    f64, char, bool
);
