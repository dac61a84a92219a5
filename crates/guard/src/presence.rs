//! Per-type "has a value" probes
//!
//! Each type that can be guarded for nullness implements [`Presence`], which
//! declares the type's [`ValueShape`] and how to test an instance. The probe
//! for a type is built on first use and kept in a process-wide table keyed by
//! `TypeId`, so repeated checks never rebuild it.
//!
//! ```rust,ignore
//! use nebula_guard::presence::has_value;
//!
//! assert!(has_value(&Some(3)));
//! assert!(!has_value(&None::<u8>));
//! assert!(has_value(&42_u32));
//! ```

use std::any::{Any, TypeId};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::ptr::NonNull;
use std::rc::Rc;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use dashmap::DashMap;

/// How a type represents the absence of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueShape {
    /// Pointer-like: absent when the pointer is null.
    Reference,
    /// Wraps a present/absent flag, like `Option<T>`.
    Optional,
    /// Always holds a value.
    Plain,
}

/// Types whose instances can be asked whether they hold a value.
pub trait Presence: 'static {
    /// The shape of this type.
    const SHAPE: ValueShape;

    /// Returns `true` if `self` holds a value.
    fn is_present(&self) -> bool;
}

impl<T: 'static> Presence for Option<T> {
    const SHAPE: ValueShape = ValueShape::Optional;

    #[inline]
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

impl<T: ?Sized + 'static> Presence for *const T {
    const SHAPE: ValueShape = ValueShape::Reference;

    #[inline]
    fn is_present(&self) -> bool {
        !self.is_null()
    }
}

impl<T: ?Sized + 'static> Presence for *mut T {
    const SHAPE: ValueShape = ValueShape::Reference;

    #[inline]
    fn is_present(&self) -> bool {
        !self.is_null()
    }
}

/// Implements [`Presence`] for pointer types that can never be null.
macro_rules! non_null_reference {
    ($($ty:ty),* $(,)?) => {
        $(
            impl<T: ?Sized + 'static> Presence for $ty {
                const SHAPE: ValueShape = ValueShape::Reference;

                #[inline]
                fn is_present(&self) -> bool {
                    true
                }
            }
        )*
    };
}

non_null_reference!(Box<T>, Arc<T>, Rc<T>, NonNull<T>, &'static T);

/// Implements [`Presence`] as [`ValueShape::Plain`] for the listed types.
///
/// ```rust,ignore
/// struct Port(u16);
/// nebula_guard::plain_presence!(Port);
/// ```
#[macro_export]
macro_rules! plain_presence {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::presence::Presence for $ty {
                const SHAPE: $crate::presence::ValueShape = $crate::presence::ValueShape::Plain;

                #[inline]
                fn is_present(&self) -> bool {
                    true
                }
            }
        )*
    };
}

plain_presence!(
    (),
    bool,
    char,
    u8,
    u16,
    u32,
    u64,
    u128,
    usize,
    i8,
    i16,
    i32,
    i64,
    i128,
    isize,
    f32,
    f64,
    String,
    Duration,
    Cow<'static, str>,
);

impl<T: 'static> Presence for Vec<T> {
    const SHAPE: ValueShape = ValueShape::Plain;

    #[inline]
    fn is_present(&self) -> bool {
        true
    }
}

impl<T: 'static> Presence for VecDeque<T> {
    const SHAPE: ValueShape = ValueShape::Plain;

    #[inline]
    fn is_present(&self) -> bool {
        true
    }
}

impl<T: 'static, S: 'static> Presence for HashSet<T, S> {
    const SHAPE: ValueShape = ValueShape::Plain;

    #[inline]
    fn is_present(&self) -> bool {
        true
    }
}

impl<K: 'static, V: 'static, S: 'static> Presence for HashMap<K, V, S> {
    const SHAPE: ValueShape = ValueShape::Plain;

    #[inline]
    fn is_present(&self) -> bool {
        true
    }
}

impl<K: 'static, V: 'static> Presence for BTreeMap<K, V> {
    const SHAPE: ValueShape = ValueShape::Plain;

    #[inline]
    fn is_present(&self) -> bool {
        true
    }
}

// ============================================================================
// PROBE CACHE
// ============================================================================

/// The cached "has a value" predicate for `T`.
pub struct Probe<T: 'static> {
    shape: ValueShape,
    check: fn(&T) -> bool,
}

impl<T: 'static> Clone for Probe<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for Probe<T> {}

impl<T: 'static> std::fmt::Debug for Probe<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Probe")
            .field("type", &std::any::type_name::<T>())
            .field("shape", &self.shape)
            .finish()
    }
}

impl<T: 'static> Probe<T> {
    /// The shape the probe was built for.
    #[must_use]
    pub fn shape(&self) -> ValueShape {
        self.shape
    }

    /// Tests `value` for presence.
    #[inline]
    pub fn has_value(&self, value: &T) -> bool {
        (self.check)(value)
    }
}

fn build<T: Presence>() -> Probe<T> {
    let check: fn(&T) -> bool = match T::SHAPE {
        ValueShape::Plain => |_| true,
        ValueShape::Reference | ValueShape::Optional => T::is_present,
    };
    tracing::trace!(
        ty = std::any::type_name::<T>(),
        shape = ?T::SHAPE,
        "built presence probe"
    );
    Probe {
        shape: T::SHAPE,
        check,
    }
}

static PROBES: LazyLock<DashMap<TypeId, Arc<dyn Any + Send + Sync>>> = LazyLock::new(DashMap::new);

/// Returns the probe for `T`, building and caching it on first use.
///
/// Concurrent first uses may each build a probe; the first one inserted is
/// kept and the others are discarded.
pub fn probe<T: Presence>() -> Probe<T> {
    let id = TypeId::of::<T>();
    if let Some(entry) = PROBES.get(&id)
        && let Some(probe) = entry.value().downcast_ref::<Probe<T>>()
    {
        return *probe;
    }

    let built = build::<T>();
    let entry = PROBES
        .entry(id)
        .or_insert_with(|| Arc::new(built) as Arc<dyn Any + Send + Sync>);
    entry
        .value()
        .downcast_ref::<Probe<T>>()
        .copied()
        .unwrap_or(built)
}

/// Returns `true` if `value` holds a value, according to its type's probe.
#[inline]
pub fn has_value<T: Presence>(value: &T) -> bool {
    probe::<T>().has_value(value)
}

/// Number of types with a cached probe.
pub fn cached_types() -> usize {
    PROBES.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct Port(#[allow(dead_code)] u16);
    crate::plain_presence!(Port);

    #[test]
    fn test_optional_mirrors_flag() {
        assert!(has_value(&Some("x".to_string())));
        assert!(!has_value(&None::<String>));
        assert_eq!(probe::<Option<String>>().shape(), ValueShape::Optional);
    }

    #[test]
    fn test_raw_pointer_null_check() {
        let value = 5_u8;
        let ptr: *const u8 = &value;
        assert!(has_value(&ptr));
        assert!(!has_value(&std::ptr::null::<u8>()));
        assert!(!has_value(&std::ptr::null_mut::<u8>()));
    }

    #[test]
    fn test_smart_pointers_are_references() {
        assert!(has_value(&Arc::new(1)));
        assert_eq!(probe::<Box<str>>().shape(), ValueShape::Reference);
    }

    #[test]
    fn test_plain_values_always_present() {
        assert!(has_value(&0_i32));
        assert!(has_value(&String::new()));
        assert!(has_value(&Port(0)));
        assert_eq!(probe::<Port>().shape(), ValueShape::Plain);
    }

    #[test]
    fn test_probe_is_cached_once() {
        struct Marker;
        crate::plain_presence!(Marker);

        let _ = probe::<Marker>();
        let id = TypeId::of::<Marker>();
        let first = PROBES.get(&id).map(|e| Arc::as_ptr(e.value()).cast::<()>());
        let _ = probe::<Marker>();
        let second = PROBES.get(&id).map(|e| Arc::as_ptr(e.value()).cast::<()>());
        assert!(first.is_some());
        assert_eq!(first, second);
    }

    #[test]
    fn test_concurrent_first_use() {
        struct Raced;
        crate::plain_presence!(Raced);

        let handles: Vec<_> = (0..8)
            .map(|_| thread::spawn(|| probe::<Option<Raced>>().has_value(&None)))
            .collect();
        for handle in handles {
            assert!(!handle.join().unwrap());
        }
        assert_eq!(probe::<Option<Raced>>().shape(), ValueShape::Optional);
    }
}
