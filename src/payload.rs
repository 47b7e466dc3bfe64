use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::container::PayloadRecord;

pub fn next_id() -> usize {
    static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Storage layout of a payload's per-frame record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PayloadKind {
    /// One fixed-size value per slot.
    Field,
    /// A variable-length run of items per slot.
    List,
}

/// A piece of simulation state that can be captured and replayed per frame.
///
/// Implement it with `#[derive(Payload)]` for fixed fields or
/// `#[derive(ListPayload)]` for variable-length lists.
pub trait Payload: Any + Clone + Default + PartialEq + Send + Sync
where
    Self: Sized,
{
    type Record: PayloadRecord<Self>;
    const KIND: PayloadKind;

    fn type_index() -> usize;

    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Element access for payloads stored as flattened runs.
pub trait ListPayload: Clone + Default + PartialEq + Send + Sync + 'static {
    type Item: Clone + PartialEq + Send + Sync + 'static;

    fn items(&self) -> &[Self::Item];

    fn from_items(items: Vec<Self::Item>) -> Self;
}

/// A payload value with its type erased, as carried by structural commands.
pub struct ErasedPayload {
    type_index: usize,
    type_name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl ErasedPayload {
    pub fn new<T: Payload>(value: T) -> Self {
        ErasedPayload {
            type_index: T::type_index(),
            type_name: T::type_name(),
            value: Box::new(value),
        }
    }

    pub fn type_index(&self) -> usize {
        self.type_index
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn is<T: Payload>(&self) -> bool {
        self.value.is::<T>()
    }

    /// Recovers the typed value, or hands the payload back unchanged.
    pub fn downcast<T: Payload>(self) -> Result<T, Self> {
        let ErasedPayload {
            type_index,
            type_name,
            value,
        } = self;

        value.downcast::<T>().map(|value| *value).map_err(|value| ErasedPayload {
            type_index,
            type_name,
            value,
        })
    }
}

impl std::fmt::Debug for ErasedPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedPayload")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

pub use resim_macros::ListPayload;
pub use resim_macros::Payload;

#[cfg(test)]
#[path = "payload.tests.rs"]
mod tests;
