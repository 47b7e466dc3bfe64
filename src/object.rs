use crate::container::FieldRecord;
use crate::payload::{Payload, PayloadKind};

/// Stable identity of a tracked object: a 22-bit index plus a 10-bit
/// generation. Generation 0 is reserved for [`ObjectId::none`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct ObjectId(u32);

// Managers keep a per-frame record of which object sat in each slot.
impl Payload for ObjectId {
    type Record = FieldRecord<ObjectId>;
    const KIND: PayloadKind = PayloadKind::Field;

    fn type_index() -> usize {
        static TYPE_INDEX: std::sync::OnceLock<usize> = std::sync::OnceLock::new();
        *TYPE_INDEX.get_or_init(crate::payload::next_id)
    }
}

impl ObjectId {
    const GENERATION_BITS: u32 = 10;
    const INDEX_BITS: u32 = 22;
    const GENERATION_MASK: u32 = (1 << Self::GENERATION_BITS) - 1;
    const INDEX_MASK: u32 = (1 << Self::INDEX_BITS) - 1;

    #[inline(always)]
    pub fn new(index: u32, generation: u32) -> Self {
        let index = index & Self::INDEX_MASK;
        let generation = generation & Self::GENERATION_MASK;

        ObjectId((index << Self::GENERATION_BITS) | generation)
    }

    #[inline(always)]
    pub fn none() -> Self {
        ObjectId(0)
    }

    #[inline(always)]
    pub fn is_none(&self) -> bool {
        self.generation() == 0
    }

    #[inline(always)]
    pub fn index(&self) -> u32 {
        (self.0 >> Self::GENERATION_BITS) & Self::INDEX_MASK
    }

    #[inline(always)]
    pub fn generation(&self) -> u32 {
        self.0 & Self::GENERATION_MASK
    }

    /// Same index, next generation. Skips 0 so the result is never `none`.
    #[inline(always)]
    pub fn next_generation(&self) -> Self {
        let generation = self.generation().wrapping_add(1) & Self::GENERATION_MASK;
        ObjectId::new(self.index(), if generation == 0 { 1 } else { generation })
    }

    pub fn to_bits(self) -> u32 {
        self.0
    }

    pub fn from_bits(bits: u32) -> Self {
        ObjectId(bits)
    }
}

impl std::fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ObjectId(index = {}, generation = {})",
            self.index(),
            self.generation()
        )
    }
}

/// One row of the caller's tracked-object query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackedObject {
    pub id: ObjectId,
    /// False once the object has been destroyed in the live world. It keeps
    /// its slot, without new records, until its history leaves the window.
    pub alive: bool,
}

impl TrackedObject {
    pub fn alive(id: ObjectId) -> Self {
        TrackedObject { id, alive: true }
    }

    pub fn destroyed(id: ObjectId) -> Self {
        TrackedObject { id, alive: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_unpack() {
        let id = ObjectId::new(1234, 7);
        assert_eq!(id.index(), 1234);
        assert_eq!(id.generation(), 7);
        assert!(!id.is_none());
        assert_eq!(ObjectId::from_bits(id.to_bits()), id);
    }

    #[test]
    fn test_none() {
        assert!(ObjectId::none().is_none());
        assert!(ObjectId::new(5, 0).is_none());
    }

    #[test]
    fn test_next_generation_skips_zero() {
        let id = ObjectId::new(3, 1023);
        let next = id.next_generation();
        assert_eq!(next.index(), 3);
        assert_eq!(next.generation(), 1);
    }

    #[test]
    fn test_index_is_masked() {
        let id = ObjectId::new(u32::MAX, 1);
        assert_eq!(id.index(), (1 << 22) - 1);
    }

    #[test]
    fn test_debug() {
        assert_eq!(
            format!("{:?}", ObjectId::new(2, 1)),
            "ObjectId(index = 2, generation = 1)"
        );
    }
}
