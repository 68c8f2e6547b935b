//! Type introspection for scanned graphs
//!
//! Every type that can appear in a scanned graph implements [`Reflect`]:
//! a type-level [`Shape`] for the classifier and a value-level [`Kind`]
//! for the walker. Both are closed sets, one case per structural kind.
//!
//! Implementations for the standard library live in `impls`; user structs
//! can use [`reflect_struct!`](crate::reflect_struct).

mod impls;

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Byte location in the process address space.
///
/// Only used as a set-membership key and range bound, never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Address(usize);

impl Address {
    /// Value with no stable backing address (e.g. a map entry seen during iteration).
    pub const INVALID: Address = Address(0);

    /// Address of a live value.
    pub fn of<T: ?Sized>(value: &T) -> Self {
        Address((value as *const T).cast::<()>() as usize)
    }

    /// Address held by a raw pointer.
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Address(ptr as usize)
    }

    /// Raw address value.
    pub fn get(self) -> usize {
        self.0
    }

    /// Whether this is a real address.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// Address of `member`, a value stored inline in the value at `self`.
    ///
    /// Members of a value without a stable address have none either.
    pub fn member<T: ?Sized>(self, member: &T) -> Self {
        if self.is_valid() {
            Address::of(member)
        } else {
            Address::INVALID
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Type descriptor: identity, name, static size and a lazily built [`Shape`].
#[derive(Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    size: usize,
    shape: fn() -> Shape,
}

impl TypeInfo {
    /// Descriptor for `T`.
    pub fn of<T: Reflect>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            size: std::mem::size_of::<T>(),
            shape: T::shape,
        }
    }

    /// Unique type identity.
    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Static in-place size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Structural definition of the type.
    pub fn shape(&self) -> Shape {
        (self.shape)()
    }
}

impl fmt::Debug for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInfo")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish()
    }
}

impl PartialEq for TypeInfo {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeInfo {}

impl Hash for TypeInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Structural category of a type, used by the classifier.
#[derive(Debug, Clone)]
pub enum Shape {
    /// Self-contained value (numbers, bools, plain-old-data).
    Scalar,
    /// Owned text buffer.
    Text,
    /// Function or closure; opaque.
    Callable,
    /// Fixed-size aggregate (struct, tuple, enum payloads, cells).
    Aggregate(Vec<TypeInfo>),
    /// Fixed-length inline array.
    Array {
        /// Element type.
        elem: TypeInfo,
        /// Number of elements.
        len: usize,
    },
    /// Dynamically sized sequence over a heap buffer.
    Sequence {
        /// Element type.
        elem: TypeInfo,
    },
    /// Hash table or ordered map.
    Map {
        /// Key type.
        key: TypeInfo,
        /// Value type.
        value: TypeInfo,
    },
    /// Ring buffer with a fixed-capacity backing store.
    Queue {
        /// Element type.
        elem: TypeInfo,
    },
    /// Owning or shared pointer to a single value.
    Pointer {
        /// Pointee type.
        pointee: TypeInfo,
    },
    /// Trait object wrapper whose concrete type is only known per value.
    Dynamic,
}

/// A named or positional member of an inline value.
#[derive(Clone, Copy)]
pub struct Member<'a> {
    /// Field name, if the member has one.
    pub name: Option<&'static str>,
    /// Member value.
    pub value: &'a dyn Reflect,
}

impl<'a> Member<'a> {
    /// Named field.
    pub fn named(name: &'static str, value: &'a dyn Reflect) -> Self {
        Self {
            name: Some(name),
            value,
        }
    }

    /// Positional element.
    pub fn element(value: &'a dyn Reflect) -> Self {
        Self { name: None, value }
    }
}

impl fmt::Debug for Member<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("name", &self.name)
            .field("type", &self.value.type_info().name())
            .finish()
    }
}

/// Visits the members of an aggregate, array, sequence or queue.
pub trait Members {
    /// Calls `visit` once per live member, in storage order.
    fn for_each_member(&self, visit: &mut dyn FnMut(Member<'_>));
}

/// Visits the live entries of a map.
pub trait Entries {
    /// Calls `visit` once per key/value pair.
    fn for_each_entry(&self, visit: &mut dyn FnMut(&dyn Reflect, &dyn Reflect));
}

/// Member list with nothing in it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMembers;

impl Members for NoMembers {
    fn for_each_member(&self, _visit: &mut dyn FnMut(Member<'_>)) {}
}

/// View of a dynamically sized sequence.
#[derive(Clone, Copy)]
pub struct SequenceView<'a> {
    /// Start of the backing buffer.
    pub base: Address,
    /// Logical length in elements.
    pub len: usize,
    /// Buffer capacity in elements.
    pub capacity: usize,
    /// Element type.
    pub elem: TypeInfo,
    /// The `len` live elements.
    pub elems: &'a dyn Members,
}

impl<'a> SequenceView<'a> {
    /// View over a slice whose buffer is exactly as long as the slice.
    pub fn over_slice<T: Reflect>(slice: &[T], elems: &'a dyn Members) -> Self {
        Self {
            base: Address::from_ptr(slice.as_ptr()),
            len: slice.len(),
            capacity: slice.len(),
            elem: TypeInfo::of::<T>(),
            elems,
        }
    }
}

/// View of a map.
#[derive(Clone, Copy)]
pub struct MapView<'a> {
    /// Number of live entries.
    pub len: usize,
    /// Key type.
    pub key: TypeInfo,
    /// Value type.
    pub value: TypeInfo,
    /// Live entries.
    pub entries: &'a dyn Entries,
}

/// View of a ring buffer.
#[derive(Clone, Copy)]
pub struct QueueView<'a> {
    /// Backing buffer capacity in elements.
    pub capacity: usize,
    /// Element type.
    pub elem: TypeInfo,
    /// Occupied slots as at most two contiguous runs of `(start, elements)`.
    pub runs: [(Address, usize); 2],
    /// Occupied slots.
    pub slots: &'a dyn Members,
}

impl<'a> QueueView<'a> {
    /// View over a ring buffer whose occupied slots are `front` then `back`.
    pub fn over_slices<T: Reflect>(
        capacity: usize,
        (front, back): (&[T], &[T]),
        slots: &'a dyn Members,
    ) -> Self {
        Self {
            capacity,
            elem: TypeInfo::of::<T>(),
            runs: [
                (Address::from_ptr(front.as_ptr()), front.len()),
                (Address::from_ptr(back.as_ptr()), back.len()),
            ],
            slots,
        }
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.runs.iter().map(|&(_, count)| count).sum()
    }

    /// Whether no slot is occupied.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Value-level structural kind, one case per [`Shape`].
#[derive(Clone, Copy)]
pub enum Kind<'a> {
    /// No indirect storage.
    Scalar,
    /// Opaque callable.
    Callable,
    /// Text owning this many bytes of backing storage.
    Text(usize),
    /// Inline members of a struct-like value.
    Aggregate(&'a dyn Members),
    /// Inline elements of a fixed-length array.
    Array(&'a dyn Members),
    /// Dynamically sized sequence.
    Sequence(SequenceView<'a>),
    /// Map.
    Map(MapView<'a>),
    /// Ring buffer.
    Queue(QueueView<'a>),
    /// Pointer; `None` when null.
    Pointer(Option<&'a dyn Reflect>),
    /// Trait object wrapper; `None` when empty.
    Dynamic(Option<&'a dyn Reflect>),
}

impl Kind<'_> {
    /// Whether this value-level kind is the one `shape` promises.
    pub fn fits(&self, shape: &Shape) -> bool {
        matches!(
            (self, shape),
            (Kind::Scalar, Shape::Scalar)
                | (Kind::Callable, Shape::Callable)
                | (Kind::Text(_), Shape::Text)
                | (Kind::Aggregate(_), Shape::Aggregate(_))
                | (Kind::Array(_), Shape::Array { .. })
                | (Kind::Sequence(_), Shape::Sequence { .. })
                | (Kind::Map(_), Shape::Map { .. })
                | (Kind::Queue(_), Shape::Queue { .. })
                | (Kind::Pointer(_), Shape::Pointer { .. })
                | (Kind::Dynamic(_), Shape::Dynamic)
        )
    }
}

impl fmt::Debug for Kind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Kind::Scalar => "Scalar",
            Kind::Callable => "Callable",
            Kind::Text(_) => "Text",
            Kind::Aggregate(_) => "Aggregate",
            Kind::Array(_) => "Array",
            Kind::Sequence(_) => "Sequence",
            Kind::Map(_) => "Map",
            Kind::Queue(_) => "Queue",
            Kind::Pointer(_) => "Pointer",
            Kind::Dynamic(_) => "Dynamic",
        };
        f.write_str(name)
    }
}

/// Type descriptor of a value, available through `dyn Reflect`.
///
/// Implemented for every [`Reflect`] type; do not implement by hand.
pub trait Typed {
    /// Descriptor of the value's exact type.
    fn type_info(&self) -> TypeInfo;
}

impl<T: Reflect> Typed for T {
    fn type_info(&self) -> TypeInfo {
        TypeInfo::of::<T>()
    }
}

/// Introspection facility consumed by the scanner.
///
/// `shape` and `kind` must agree: a type whose shape is `Scalar` is never
/// asked for its kind, every other shape must answer with its matching kind.
pub trait Reflect: Typed + 'static {
    /// Structural definition of the type.
    fn shape() -> Shape
    where
        Self: Sized;

    /// Structural view of this value.
    fn kind(&self) -> Kind<'_>;
}

/// Descriptor of the type of the field selected by `_field`.
#[doc(hidden)]
pub fn field_info<S, T: Reflect>(_field: impl Fn(&S) -> &T) -> TypeInfo {
    TypeInfo::of::<T>()
}

/// Implements [`Reflect`] for a non-generic struct by listing its fields.
///
/// ```
/// use memsize::reflect_struct;
///
/// struct Session {
///     user: String,
///     hits: u64,
/// }
///
/// reflect_struct!(Session { user, hits });
///
/// let session = Session { user: "ada".to_string(), hits: 3 };
/// let sizes = memsize::scan(&session, &["session"]);
/// assert!(sizes.total >= std::mem::size_of::<Session>());
/// ```
#[macro_export]
macro_rules! reflect_struct {
    ($ty:ty { $($field:ident),* $(,)? }) => {
        impl $crate::Reflect for $ty {
            fn shape() -> $crate::Shape {
                $crate::Shape::Aggregate(vec![
                    $($crate::reflect::field_info(|value: &$ty| &value.$field)),*
                ])
            }

            fn kind(&self) -> $crate::Kind<'_> {
                $crate::Kind::Aggregate(self)
            }
        }

        impl $crate::Members for $ty {
            #[allow(unused_variables)]
            fn for_each_member(&self, visit: &mut dyn FnMut($crate::Member<'_>)) {
                $(visit($crate::Member::named(stringify!($field), &self.$field));)*
            }
        }
    };
}

/// Implements [`Reflect`] for types with no indirect storage.
#[macro_export]
macro_rules! reflect_scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl $crate::Reflect for $ty {
                fn shape() -> $crate::Shape {
                    $crate::Shape::Scalar
                }

                fn kind(&self) -> $crate::Kind<'_> {
                    $crate::Kind::Scalar
                }
            }
        )*
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Point {
        x: f64,
        y: f64,
        label: String,
    }

    reflect_struct!(Point { x, y, label });

    #[test]
    fn test_invalid_address_propagates_to_members() {
        let point = Point {
            x: 1.0,
            y: 2.0,
            label: String::new(),
        };
        assert!(!Address::INVALID.member(&point.x).is_valid());
        assert_eq!(Address::of(&point).member(&point.x), Address::of(&point.x));
    }

    #[test]
    fn test_struct_shape_lists_fields_in_order() {
        let Shape::Aggregate(fields) = Point::shape() else {
            panic!("struct should be an aggregate");
        };
        let names: Vec<_> = fields.iter().map(|info| info.name()).collect();
        assert_eq!(names, ["f64", "f64", "alloc::string::String"]);
    }

    #[test]
    fn test_members_carry_field_names() {
        let point = Point {
            x: 0.0,
            y: 0.0,
            label: "origin".to_string(),
        };
        let mut names = Vec::new();
        point.for_each_member(&mut |member| names.push(member.name));
        assert_eq!(names, [Some("x"), Some("y"), Some("label")]);
    }

    #[test]
    fn test_type_info_through_trait_object() {
        let boxed: Box<dyn Reflect> = Box::new(7u32);
        let info = (*boxed).type_info();
        assert_eq!(info, TypeInfo::of::<u32>());
        assert_eq!(info.size(), 4);
    }
}
