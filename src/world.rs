use std::any::Any;
use std::collections::HashMap;

use parking_lot::RwLock;

use crate::object::ObjectId;
use crate::payload::{ErasedPayload, Payload};

/// What the rollback engine needs from the simulation's live object store.
///
/// Reads and in-place writes take `&self` and may run from many restore tasks
/// at once. Structural edits take `&mut self`, so they can only happen from
/// the sequential command drain.
pub trait LiveStore: Send + Sync + 'static {
    fn contains(&self, object: ObjectId) -> bool;

    fn read<T: Payload>(&self, object: ObjectId) -> Option<T>;

    /// Overwrites an existing field. Returns false if the object does not
    /// exist or does not carry `T`, leaving the store untouched.
    fn write<T: Payload>(&self, object: ObjectId, value: T) -> bool;

    /// Brings `object` back under its exact id. False if it already exists.
    fn create(&mut self, object: ObjectId) -> bool;

    /// False if `object` does not exist.
    fn destroy(&mut self, object: ObjectId) -> bool;

    /// Attaches or replaces a field. False if the object does not exist or
    /// the payload type is unknown to the store.
    fn add_field(&mut self, object: ObjectId, payload: ErasedPayload) -> bool;

    /// False if the object or the field does not exist.
    fn remove_field(&mut self, object: ObjectId, type_index: usize) -> bool;
}

/// Type-erased view of one column so the world can hold every payload type
/// in a single array indexed by type index.
trait ColumnLike: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;

    fn insert_erased(&self, object: ObjectId, payload: ErasedPayload) -> bool;

    fn remove(&self, object: ObjectId) -> bool;
}

struct Column<T: Payload> {
    values: RwLock<HashMap<ObjectId, T>>,
}

impl<T: Payload> Column<T> {
    fn new() -> Self {
        Column {
            values: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Payload> ColumnLike for Column<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn insert_erased(&self, object: ObjectId, payload: ErasedPayload) -> bool {
        match payload.downcast::<T>() {
            Ok(value) => {
                self.values.write().insert(object, value);
                true
            }
            Err(_) => false,
        }
    }

    fn remove(&self, object: ObjectId) -> bool {
        self.values.write().remove(&object).is_some()
    }
}

/// In-memory live store: the live id holding each index plus one locked
/// column per payload type. At most one generation of an index is live.
#[derive(Default)]
pub struct World {
    columns: Vec<Option<Box<dyn ColumnLike>>>,
    alive: HashMap<u32, ObjectId>,
    free: Vec<ObjectId>,
    next_index: u32,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `T` known to the store so commands can attach it.
    pub fn register<T: Payload>(&mut self) {
        let id = T::type_index();

        if id >= self.columns.len() {
            self.columns.resize_with(id + 1, || None);
        }

        if self.columns[id].is_none() {
            self.columns[id] = Some(Box::new(Column::<T>::new()));
        }
    }

    fn is_alive(&self, object: ObjectId) -> bool {
        self.alive.get(&object.index()) == Some(&object)
    }

    fn column<T: Payload>(&self) -> Option<&Column<T>> {
        self.columns
            .get(T::type_index())?
            .as_ref()?
            .as_any()
            .downcast_ref::<Column<T>>()
    }

    /// Allocates a fresh id, reusing freed indices with a bumped generation.
    pub fn spawn(&mut self) -> ObjectId {
        while let Some(old) = self.free.pop() {
            let id = old.next_generation();
            if !self.alive.contains_key(&id.index()) {
                self.alive.insert(id.index(), id);
                return id;
            }
        }

        let id = ObjectId::new(self.next_index, 1);
        self.next_index += 1;
        self.alive.insert(id.index(), id);
        id
    }

    /// Sets `T` on a live object, registering the column on first use.
    ///
    /// # Panics
    /// Panics if `object` does not exist.
    pub fn set<T: Payload>(&mut self, object: ObjectId, value: T) {
        assert!(
            self.is_alive(object),
            "attempted to set a field on {:?} which does not exist",
            object
        );

        self.register::<T>();
        if let Some(column) = self.column::<T>() {
            column.values.write().insert(object, value);
        }
    }

    pub fn get<T: Payload>(&self, object: ObjectId) -> Option<T> {
        self.column::<T>()?.values.read().get(&object).cloned()
    }

    pub fn has<T: Payload>(&self, object: ObjectId) -> bool {
        self.column::<T>()
            .is_some_and(|column| column.values.read().contains_key(&object))
    }

    pub fn remove<T: Payload>(&mut self, object: ObjectId) -> bool {
        self.column::<T>()
            .is_some_and(|column| column.values.write().remove(&object).is_some())
    }

    pub fn len(&self) -> usize {
        self.alive.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alive.is_empty()
    }

    /// Live ids in ascending order.
    pub fn objects(&self) -> Vec<ObjectId> {
        let mut ids: Vec<ObjectId> = self.alive.values().copied().collect();
        ids.sort();
        ids
    }
}

impl LiveStore for World {
    fn contains(&self, object: ObjectId) -> bool {
        self.is_alive(object)
    }

    fn read<T: Payload>(&self, object: ObjectId) -> Option<T> {
        self.get::<T>(object)
    }

    fn write<T: Payload>(&self, object: ObjectId, value: T) -> bool {
        if !self.is_alive(object) {
            return false;
        }

        let Some(column) = self.column::<T>() else {
            return false;
        };

        match column.values.write().get_mut(&object) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    fn create(&mut self, object: ObjectId) -> bool {
        // Also refuses a stale generation while a newer one holds the index
        if object.is_none() || self.alive.contains_key(&object.index()) {
            return false;
        }
        self.alive.insert(object.index(), object);

        self.free.retain(|id| id.index() != object.index());
        self.next_index = self.next_index.max(object.index() + 1);
        true
    }

    fn destroy(&mut self, object: ObjectId) -> bool {
        if !self.is_alive(object) {
            return false;
        }
        self.alive.remove(&object.index());

        for column in self.columns.iter().flatten() {
            column.remove(object);
        }

        self.free.push(object);
        true
    }

    fn add_field(&mut self, object: ObjectId, payload: ErasedPayload) -> bool {
        if !self.is_alive(object) {
            return false;
        }

        match self.columns.get(payload.type_index()).and_then(|c| c.as_ref()) {
            Some(column) => column.insert_erased(object, payload),
            None => false,
        }
    }

    fn remove_field(&mut self, object: ObjectId, type_index: usize) -> bool {
        if !self.is_alive(object) {
            return false;
        }

        self.columns
            .get(type_index)
            .and_then(|c| c.as_ref())
            .is_some_and(|column| column.remove(object))
    }
}

#[cfg(test)]
#[path = "world.tests.rs"]
mod tests;
