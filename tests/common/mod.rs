#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

use memsize::reflect::{Entries, MapView};
use memsize::{reflect_struct, Kind, Reflect, Shape, TypeInfo};

pub struct Blob {
    pub words: [u64; 8],
}

reflect_struct!(Blob { words });

pub fn blob(fill: u64) -> Blob {
    Blob { words: [fill; 8] }
}

/// Singly linked node that may point back at itself.
pub struct Node {
    pub id: u64,
    pub next: RefCell<Option<Rc<Node>>>,
}

reflect_struct!(Node { id, next });

/// Two views into one leaked buffer.
pub struct Views {
    pub head: &'static [u64],
    pub tail: &'static [u64],
}

reflect_struct!(Views { head, tail });

/// A queue and a pointer to one of its slots.
pub struct QueueAlias {
    pub first: &'static u64,
    pub queue: &'static VecDeque<u64>,
}

reflect_struct!(QueueAlias { first, queue });

pub struct Entry {
    pub id: u64,
    pub name: String,
}

reflect_struct!(Entry { id, name });

/// A pointer to a field of one entry, ahead of the entries themselves.
pub struct EntryAlias {
    pub name: &'static String,
    pub entries: &'static Vec<Entry>,
}

reflect_struct!(EntryAlias { name, entries });

pub struct Labels {
    pub primary: &'static str,
    pub secondary: &'static str,
}

reflect_struct!(Labels { primary, secondary });

/// Two trait-object wrappers that may share a payload.
pub struct Wrappers {
    pub left: Arc<dyn Reflect>,
    pub right: Arc<dyn Reflect>,
}

reflect_struct!(Wrappers { left, right });

pub struct Catalog {
    pub name: String,
    pub items: Vec<Arc<Blob>>,
    pub index: HashMap<u32, String>,
    pub featured: Option<Arc<Blob>>,
}

reflect_struct!(Catalog {
    name,
    items,
    index,
    featured
});

/// Catalog with every blob shared between `items` and `featured`.
pub fn catalog(items: usize) -> Catalog {
    let blobs: Vec<Arc<Blob>> = (0..items).map(|i| Arc::new(blob(i as u64))).collect();
    let index = (0..items as u32)
        .map(|i| (i, format!("item-{i:04}")))
        .collect();
    Catalog {
        name: "catalog".to_string(),
        featured: blobs.first().cloned(),
        items: blobs,
        index,
    }
}

/// Map that counts how often its entries are enumerated.
pub struct CountingMap<K, V> {
    pub inner: HashMap<K, V>,
    pub visits: Cell<usize>,
}

impl<K, V> CountingMap<K, V> {
    pub fn new(inner: HashMap<K, V>) -> Self {
        Self {
            inner,
            visits: Cell::new(0),
        }
    }
}

impl<K: Reflect, V: Reflect> Reflect for CountingMap<K, V> {
    fn shape() -> Shape {
        Shape::Map {
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<V>(),
        }
    }

    fn kind(&self) -> Kind<'_> {
        Kind::Map(MapView {
            len: self.inner.len(),
            key: TypeInfo::of::<K>(),
            value: TypeInfo::of::<V>(),
            entries: self,
        })
    }
}

impl<K: Reflect, V: Reflect> Entries for CountingMap<K, V> {
    fn for_each_entry(&self, visit: &mut dyn FnMut(&dyn Reflect, &dyn Reflect)) {
        for (key, value) in &self.inner {
            self.visits.set(self.visits.get() + 1);
            visit(key, value);
        }
    }
}
