//! `Reflect` implementations for the standard library

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, AtomicUsize};
use std::sync::{Arc, Mutex, RwLock, TryLockError};
use std::time::{Duration, Instant, SystemTime};

use tracing::warn;

use super::{
    Entries, Kind, MapView, Member, Members, NoMembers, QueueView, Reflect, SequenceView, Shape,
    TypeInfo,
};

crate::reflect_scalar!(
    u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64, bool, char, (),
    Duration, Instant, SystemTime, AtomicBool, AtomicU32, AtomicU64, AtomicUsize, AtomicI64,
);

impl<T: 'static> Reflect for PhantomData<T> {
    fn shape() -> Shape {
        Shape::Scalar
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Scalar
    }
}

// Text owned exclusively by its value.

impl Reflect for String {
    fn shape() -> Shape {
        Shape::Text
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Text(self.capacity())
    }
}

impl Reflect for Box<str> {
    fn shape() -> Shape {
        Shape::Text
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Text(self.len())
    }
}

// Shared text is a byte sequence so every handle to the same buffer dedups.
macro_rules! reflect_shared_str {
    ($($owner:ty),*) => {
        $(
            impl Reflect for $owner {
                fn shape() -> Shape {
                    Shape::Sequence {
                        elem: TypeInfo::of::<u8>(),
                    }
                }

                fn kind(&self) -> Kind<'_> {
                    let text: &str = self;
                    Kind::Sequence(SequenceView::over_slice(text.as_bytes(), &NoMembers))
                }
            }
        )*
    };
}

reflect_shared_str!(&'static str, Rc<str>, Arc<str>);

impl<T: Reflect> Reflect for Vec<T> {
    fn shape() -> Shape {
        Shape::Sequence {
            elem: TypeInfo::of::<T>(),
        }
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Sequence(SequenceView {
            base: super::Address::from_ptr(self.as_ptr()),
            len: self.len(),
            capacity: self.capacity(),
            elem: TypeInfo::of::<T>(),
            elems: self,
        })
    }
}

impl<T: Reflect> Members for Vec<T> {
    fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
        for elem in self {
            visit(Member::element(elem));
        }
    }
}

macro_rules! reflect_slice_owner {
    ($($owner:ty),*) => {
        $(
            impl<T: Reflect> Reflect for $owner {
                fn shape() -> Shape {
                    Shape::Sequence {
                        elem: TypeInfo::of::<T>(),
                    }
                }

                fn kind(&self) -> Kind<'_> {
                    let slice: &[T] = self;
                    Kind::Sequence(SequenceView::over_slice(slice, self))
                }
            }

            impl<T: Reflect> Members for $owner {
                fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
                    let slice: &[T] = self;
                    for elem in slice {
                        visit(Member::element(elem));
                    }
                }
            }
        )*
    };
}

reflect_slice_owner!(Box<[T]>, Rc<[T]>, Arc<[T]>, &'static [T]);

impl<T: Reflect, const N: usize> Reflect for [T; N] {
    fn shape() -> Shape {
        Shape::Array {
            elem: TypeInfo::of::<T>(),
            len: N,
        }
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Array(self)
    }
}

impl<T: Reflect, const N: usize> Members for [T; N] {
    fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
        for elem in self {
            visit(Member::element(elem));
        }
    }
}

macro_rules! reflect_tuple {
    ($(($($name:ident $idx:tt),+)),* $(,)?) => {
        $(
            impl<$($name: Reflect),+> Reflect for ($($name,)+) {
                fn shape() -> Shape {
                    Shape::Aggregate(vec![$(TypeInfo::of::<$name>()),+])
                }

                fn kind(&self) -> Kind<'_> {
                    Kind::Aggregate(self)
                }
            }

            impl<$($name: Reflect),+> Members for ($($name,)+) {
                fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
                    $(visit(Member::element(&self.$idx));)+
                }
            }
        )*
    };
}

reflect_tuple!(
    (A 0),
    (A 0, B 1),
    (A 0, B 1, C 2),
    (A 0, B 1, C 2, D 3),
);

impl<T: Reflect> Reflect for Option<T> {
    fn shape() -> Shape {
        Shape::Aggregate(vec![TypeInfo::of::<T>()])
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Aggregate(self)
    }
}

impl<T: Reflect> Members for Option<T> {
    fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
        if let Some(value) = self {
            visit(Member::named("Some", value));
        }
    }
}

impl<T: Reflect, E: Reflect> Reflect for Result<T, E> {
    fn shape() -> Shape {
        Shape::Aggregate(vec![TypeInfo::of::<T>(), TypeInfo::of::<E>()])
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Aggregate(self)
    }
}

impl<T: Reflect, E: Reflect> Members for Result<T, E> {
    fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
        match self {
            Ok(value) => visit(Member::named("Ok", value)),
            Err(error) => visit(Member::named("Err", error)),
        }
    }
}

// Cells are read without blocking. A cell held elsewhere keeps its inline
// bytes but its contents are skipped.

impl<T: Reflect> Reflect for RefCell<T> {
    fn shape() -> Shape {
        Shape::Aggregate(vec![TypeInfo::of::<T>()])
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Aggregate(self)
    }
}

impl<T: Reflect> Members for RefCell<T> {
    fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
        match self.try_borrow() {
            Ok(inner) => visit(Member::named("value", &*inner)),
            Err(_) => warn!(
                ty = std::any::type_name::<Self>(),
                "cell mutably borrowed during scan, contents skipped"
            ),
        }
    }
}

impl<T: Reflect> Reflect for Mutex<T> {
    fn shape() -> Shape {
        Shape::Aggregate(vec![TypeInfo::of::<T>()])
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Aggregate(self)
    }
}

impl<T: Reflect> Members for Mutex<T> {
    fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
        match self.try_lock() {
            Ok(guard) => visit(Member::named("value", &*guard)),
            Err(TryLockError::Poisoned(poisoned)) => {
                let guard = poisoned.into_inner();
                visit(Member::named("value", &*guard));
            }
            Err(TryLockError::WouldBlock) => warn!(
                ty = std::any::type_name::<Self>(),
                "mutex held during scan, contents skipped"
            ),
        }
    }
}

impl<T: Reflect> Reflect for RwLock<T> {
    fn shape() -> Shape {
        Shape::Aggregate(vec![TypeInfo::of::<T>()])
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Aggregate(self)
    }
}

impl<T: Reflect> Members for RwLock<T> {
    fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
        match self.try_read() {
            Ok(guard) => visit(Member::named("value", &*guard)),
            Err(TryLockError::Poisoned(poisoned)) => {
                let guard = poisoned.into_inner();
                visit(Member::named("value", &*guard));
            }
            Err(TryLockError::WouldBlock) => warn!(
                ty = std::any::type_name::<Self>(),
                "rwlock write-locked during scan, contents skipped"
            ),
        }
    }
}

impl<K: Reflect, V: Reflect, S: 'static> Reflect for HashMap<K, V, S> {
    fn shape() -> Shape {
        Shape::Map {
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<V>(),
        }
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Map(MapView {
            len: self.len(),
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<V>(),
            entries: self,
        })
    }
}

impl<K: Reflect, V: Reflect, S: 'static> Entries for HashMap<K, V, S> {
    fn for_each_entry(&self, visit: &mut dyn FnMut(&dyn Reflect, &dyn Reflect)) {
        for (key, value) in self {
            visit(key, value);
        }
    }
}

impl<K: Reflect, S: 'static> Reflect for HashSet<K, S> {
    fn shape() -> Shape {
        Shape::Map {
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<()>(),
        }
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Map(MapView {
            len: self.len(),
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<()>(),
            entries: self,
        })
    }
}

impl<K: Reflect, S: 'static> Entries for HashSet<K, S> {
    fn for_each_entry(&self, visit: &mut dyn FnMut(&dyn Reflect, &dyn Reflect)) {
        for key in self {
            visit(key, &());
        }
    }
}

impl<K: Reflect, V: Reflect> Reflect for BTreeMap<K, V> {
    fn shape() -> Shape {
        Shape::Map {
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<V>(),
        }
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Map(MapView {
            len: self.len(),
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<V>(),
            entries: self,
        })
    }
}

impl<K: Reflect, V: Reflect> Entries for BTreeMap<K, V> {
    fn for_each_entry(&self, visit: &mut dyn FnMut(&dyn Reflect, &dyn Reflect)) {
        for (key, value) in self {
            visit(key, value);
        }
    }
}

impl<K: Reflect> Reflect for BTreeSet<K> {
    fn shape() -> Shape {
        Shape::Map {
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<()>(),
        }
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Map(MapView {
            len: self.len(),
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<()>(),
            entries: self,
        })
    }
}

impl<K: Reflect> Entries for BTreeSet<K> {
    fn for_each_entry(&self, visit: &mut dyn FnMut(&dyn Reflect, &dyn Reflect)) {
        for key in self {
            visit(key, &());
        }
    }
}

impl<T: Reflect> Reflect for VecDeque<T> {
    fn shape() -> Shape {
        Shape::Queue {
            elem: TypeInfo::of::<T>(),
        }
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Queue(QueueView::over_slices(
            self.capacity(),
            self.as_slices(),
            self,
        ))
    }
}

impl<T: Reflect> Members for VecDeque<T> {
    fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>)) {
        for elem in self {
            visit(Member::element(elem));
        }
    }
}

macro_rules! reflect_pointer {
    ($($ptr:ty),*) => {
        $(
            impl<T: Reflect> Reflect for $ptr {
                fn shape() -> Shape {
                    Shape::Pointer {
                        pointee: TypeInfo::of::<T>(),
                    }
                }

                fn kind(&self) -> Kind<'_> {
                    let pointee: &T = self;
                    Kind::Pointer(Some(pointee))
                }
            }
        )*
    };
}

reflect_pointer!(Box<T>, Rc<T>, Arc<T>, &'static T);

macro_rules! reflect_dynamic {
    ($($wrapper:ty),*) => {
        $(
            impl Reflect for $wrapper {
                fn shape() -> Shape {
                    Shape::Dynamic
                }

                fn kind(&self) -> Kind<'_> {
                    Kind::Dynamic(Some(&**self))
                }
            }
        )*
    };
}

reflect_dynamic!(
    Box<dyn Reflect>,
    Box<dyn Reflect + Send + Sync>,
    Rc<dyn Reflect>,
    Arc<dyn Reflect>,
    Arc<dyn Reflect + Send + Sync>
);

macro_rules! reflect_callable {
    ($($callable:ty => [$($param:ident),*]),* $(,)?) => {
        $(
            impl<$($param: 'static),*> Reflect for $callable {
                fn shape() -> Shape {
                    Shape::Callable
                }

                fn kind(&self) -> Kind<'_> {
                    Kind::Callable
                }
            }
        )*
    };
}

reflect_callable!(
    fn() -> R => [R],
    fn(A) -> R => [A, R],
    fn(A, B) -> R => [A, B, R],
    Box<dyn Fn() -> R + Send + Sync> => [R],
    Arc<dyn Fn() -> R + Send + Sync> => [R],
);
