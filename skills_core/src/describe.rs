//! Introspection: turning Rust types into [`TypeDescriptor`]s.

use std::{
    any::type_name,
    collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque},
};

use serde_json::Value;

use crate::{
    descriptor::TypeDescriptor,
    error::{UnsupportedKind, UnsupportedTypeError},
};

/// Types that can describe their JSON shape.
///
/// Implemented for primitives, strings, options and the std collections;
/// `#[derive(Describe)]` covers records and enums.
pub trait Describe {
    fn describe(cx: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError>;
}

/// Describe `T` from a fresh introspection context.
pub fn describe<T: Describe + ?Sized>() -> Result<TypeDescriptor, UnsupportedTypeError> {
    T::describe(&mut Introspector::new())
}

/// Tracks the named types currently being described so that recursive types
/// are rejected instead of looping forever.
#[derive(Debug, Default)]
pub struct Introspector {
    stack: Vec<&'static str>,
}

impl Introspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Describe the named type `T` with `f`, failing if `T` is already being
    /// described further up the stack.
    pub fn nested<T: ?Sized>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<TypeDescriptor, UnsupportedTypeError>,
    ) -> Result<TypeDescriptor, UnsupportedTypeError> {
        let name = type_name::<T>();
        if self.stack.contains(&name) {
            return Err(UnsupportedTypeError::new(name, UnsupportedKind::RecursiveType));
        }
        self.stack.push(name);
        let described = f(self);
        self.stack.pop();
        described
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }
}

macro_rules! prim {
    ($ty:ty, $ctor:ident) => {
        impl Describe for $ty {
            fn describe(_: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
                Ok(TypeDescriptor::$ctor())
            }
        }
    };
}

prim!(bool, boolean);
prim!(i8, integer);
prim!(i16, integer);
prim!(i32, integer);
prim!(i64, integer);
prim!(i128, integer);
prim!(isize, integer);
prim!(u8, integer);
prim!(u16, integer);
prim!(u32, integer);
prim!(u64, integer);
prim!(u128, integer);
prim!(usize, integer);
prim!(f32, number);
prim!(f64, number);
prim!(char, string);
prim!(String, string);
prim!(str, string);

impl Describe for () {
    fn describe(_: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
        Ok(TypeDescriptor::Null)
    }
}

/// Untyped JSON has no declared structure.
impl Describe for Value {
    fn describe(_: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
        Err(UnsupportedTypeError::new(
            type_name::<Value>(),
            UnsupportedKind::Untyped,
        ))
    }
}

impl<T: Describe> Describe for Option<T> {
    fn describe(cx: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
        Ok(TypeDescriptor::optional(T::describe(cx)?))
    }
}

impl<T: Describe + ?Sized> Describe for Box<T> {
    fn describe(cx: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
        T::describe(cx)
    }
}

impl<T: Describe + ?Sized> Describe for &T {
    fn describe(cx: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
        T::describe(cx)
    }
}

macro_rules! sequence {
    ($($ty:ident),+) => {
        $(
            impl<T: Describe> Describe for $ty<T> {
                fn describe(cx: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
                    Ok(TypeDescriptor::array(T::describe(cx)?))
                }
            }
        )+
    };
}

sequence!(Vec, VecDeque, BTreeSet, HashSet);

impl<T: Describe> Describe for [T] {
    fn describe(cx: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
        Ok(TypeDescriptor::array(T::describe(cx)?))
    }
}

impl<T: Describe, S> Describe for HashMap<String, T, S> {
    fn describe(cx: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
        Ok(TypeDescriptor::map(T::describe(cx)?))
    }
}

impl<T: Describe> Describe for BTreeMap<String, T> {
    fn describe(cx: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
        Ok(TypeDescriptor::map(T::describe(cx)?))
    }
}

macro_rules! tuples {
    ($(($($T:ident),+))+) => {
        $(
            impl<$($T: Describe),+> Describe for ($($T,)+) {
                fn describe(cx: &mut Introspector) -> Result<TypeDescriptor, UnsupportedTypeError> {
                    Ok(TypeDescriptor::Tuple(vec![$($T::describe(cx)?),+]))
                }
            }
        )+
    };
}

tuples! {
    (A)
    (A, B)
    (A, B, C)
    (A, B, C, D)
    (A, B, C, D, E)
    (A, B, C, D, E, F)
    (A, B, C, D, E, F, G)
    (A, B, C, D, E, F, G, H)
}
