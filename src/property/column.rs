// SPDX-License-Identifier: Apache-2.0
//! A single typed, per-level property column with a copy-on-write write
//! shadow for values set between checkpoints.

use super::{ColumnKind, Entity, PropertyType};
use crate::ident::LevelId;
use bytes::Bytes;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// A decoded property value, regardless of which typed array backs it.
#[derive(Clone, PartialEq, Debug)]
pub enum PropertyValue {
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    StringPtr(Bytes),
}

/// A single level's backing array for one column.
#[derive(Clone, Debug)]
pub enum TypedColumn {
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    StringPtr(Vec<Option<Bytes>>),
}

impl TypedColumn {
    fn with_capacity(ty: PropertyType, len: usize) -> Self {
        match ty {
            PropertyType::Int32 => Self::Int32(vec![0; len]),
            PropertyType::Int64 => Self::Int64(vec![0; len]),
            PropertyType::Float => Self::Float(vec![0.0; len]),
            PropertyType::Double => Self::Double(vec![0.0; len]),
            PropertyType::StringPtr => Self::StringPtr(vec![None; len]),
        }
    }

    fn len(&self) -> usize {
        match self {
            Self::Int32(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Float(v) => v.len(),
            Self::Double(v) => v.len(),
            Self::StringPtr(v) => v.len(),
        }
    }

    /// Returns `None` for an out-of-range index or a still-default slot
    /// (reads walk extents newest-to-oldest until a non-default value wins).
    fn get(&self, index: usize) -> Option<PropertyValue> {
        match self {
            Self::Int32(v) => v.get(index).filter(|x| **x != 0).map(|x| PropertyValue::Int32(*x)),
            Self::Int64(v) => v.get(index).filter(|x| **x != 0).map(|x| PropertyValue::Int64(*x)),
            Self::Float(v) => v
                .get(index)
                .filter(|x| **x != 0.0)
                .map(|x| PropertyValue::Float(*x)),
            Self::Double(v) => v
                .get(index)
                .filter(|x| **x != 0.0)
                .map(|x| PropertyValue::Double(*x)),
            Self::StringPtr(v) => v.get(index).and_then(Clone::clone).map(PropertyValue::StringPtr),
        }
    }

    fn set(&mut self, index: usize, value: &PropertyValue) {
        match (self, value) {
            (Self::Int32(v), PropertyValue::Int32(x)) => v[index] = *x,
            (Self::Int64(v), PropertyValue::Int64(x)) => v[index] = *x,
            (Self::Float(v), PropertyValue::Float(x)) => v[index] = *x,
            (Self::Double(v), PropertyValue::Double(x)) => v[index] = *x,
            (Self::StringPtr(v), PropertyValue::StringPtr(x)) => v[index] = Some(x.clone()),
            _ => crate::invariant!(false, "property-column-type-mismatch"),
        }
    }
}

struct LevelExtent {
    level: LevelId,
    data: TypedColumn,
}

/// A named, typed column addressed by [`Entity`], aligned with the level
/// structure (§4.6).
pub struct PropertyColumn {
    name: String,
    kind: ColumnKind,
    ty: PropertyType,
    extents: RwLock<Vec<LevelExtent>>,
    /// COW write shadow: values set against the writable overlay, not yet
    /// flushed into a frozen extent by `checkpoint()`.
    shadow: RwLock<FxHashMap<Entity, PropertyValue>>,
}

impl PropertyColumn {
    pub(crate) fn new(name: String, kind: ColumnKind, ty: PropertyType) -> Self {
        Self {
            name,
            kind,
            ty,
            extents: RwLock::new(Vec::new()),
            shadow: RwLock::new(FxHashMap::default()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    #[must_use]
    pub fn value_type(&self) -> PropertyType {
        self.ty
    }

    /// `writable_init`: a no-op marker kept for API parity with §4.6 — the
    /// shadow map always exists, so enabling it is implicit in `cow_write`.
    pub fn writable_init(&self) {}

    /// `init_level(max_entries)`: allocate a fresh, zero-initialized extent
    /// for `level` sized to the level's vertex or edge table length.
    pub fn init_level(&self, level: LevelId, max_entries: usize) {
        let mut extents = self.extents.write();
        crate::invariant!(
            extents.last().is_none_or(|e| e.level.0 < level.0),
            "property-level-extents-strictly-increasing"
        );
        extents.push(LevelExtent {
            level,
            data: TypedColumn::with_capacity(self.ty, max_entries),
        });
    }

    /// `finish_level`: marks the most recently initialized extent durable.
    /// There is nothing further to compute; this exists so callers that
    /// mirror the distilled spec's `init_level`/`finish_level` pair have a
    /// symmetric call to make.
    pub fn finish_level(&self) {}

    /// `cow_init_level`: alias of `init_level` used when the caller is about
    /// to flush shadow writes into the new extent (checkpoint step 5) rather
    /// than populate it directly.
    pub fn cow_init_level(&self, level: LevelId, max_entries: usize) {
        self.init_level(level, max_entries);
    }

    /// `cow_write(entity, value)`: stage a write in the copy-on-write
    /// shadow. Visible to `get` immediately; only becomes part of a level's
    /// permanent extent once `flush_shadow_into_level` runs at checkpoint.
    pub fn cow_write(&self, entity: Entity, value: PropertyValue) {
        self.shadow.write().insert(entity, value);
    }

    /// `get(entity)`: resolve a value by walking the shadow, then extents
    /// newest-to-oldest, returning the first present value.
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<PropertyValue> {
        if let Some(v) = self.shadow.read().get(&entity) {
            return Some(v.clone());
        }
        let index = Self::index_of(entity);
        let extents = self.extents.read();
        extents
            .iter()
            .rev()
            .find_map(|extent| extent.data.get(index))
    }

    fn index_of(entity: Entity) -> usize {
        match entity {
            Entity::Node(n) => n.as_usize(),
            Entity::Edge(e) => match e {
                crate::ident::EdgeRef::Frozen { index, .. } | crate::ident::EdgeRef::Overlay { index } => {
                    index as usize
                }
                crate::ident::EdgeRef::Nil => {
                    crate::invariant!(false, "property-get-on-nil-edge");
                    0
                }
            },
        }
    }

    /// Flushes every shadow entry whose entity index fits within `level`'s
    /// extent into that extent, then drops the flushed entries from the
    /// shadow (§4.3 step 5: "overlay property writes are flushed into the
    /// new level's slice").
    pub fn flush_shadow_into_level(&self, level: LevelId) {
        let mut extents = self.extents.write();
        let Some(extent) = extents.iter_mut().find(|e| e.level == level) else {
            return;
        };
        let cap = extent.data.len();
        let mut shadow = self.shadow.write();
        let flushed: Vec<Entity> = shadow
            .keys()
            .filter(|e| Self::index_of(**e) < cap)
            .copied()
            .collect();
        for entity in flushed {
            if let Some(value) = shadow.remove(&entity) {
                extent.data.set(Self::index_of(entity), &value);
            }
        }
    }

    /// Total number of frozen-level extents retained (for GC bookkeeping in
    /// `delete_level`).
    #[must_use]
    pub fn extent_count(&self) -> usize {
        self.extents.read().len()
    }

    /// Drops the extent belonging to `level`, if present (`delete_level`).
    pub fn drop_extent(&self, level: LevelId) {
        self.extents.write().retain(|e| e.level != level);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ident::NodeId;

    #[test]
    fn shadow_write_visible_before_checkpoint_and_after_flush() {
        let col = PropertyColumn::new("rank".into(), ColumnKind::Node, PropertyType::Double);
        let n = NodeId(3);
        col.cow_write(Entity::Node(n), PropertyValue::Double(2.5));
        assert_eq!(col.get(Entity::Node(n)), Some(PropertyValue::Double(2.5)));

        col.init_level(LevelId(0), 8);
        col.flush_shadow_into_level(LevelId(0));
        assert_eq!(col.get(Entity::Node(n)), Some(PropertyValue::Double(2.5)));
        assert!(col.shadow.read().is_empty());
    }

    #[test]
    fn newer_extent_shadows_older_one() {
        let col = PropertyColumn::new("weight".into(), ColumnKind::Edge, PropertyType::Int64);
        let e = crate::ident::EdgeRef::Frozen {
            level: LevelId(0),
            index: 0,
        };
        col.init_level(LevelId(0), 4);
        col.cow_write(Entity::Edge(e), PropertyValue::Int64(1));
        col.flush_shadow_into_level(LevelId(0));

        col.init_level(LevelId(1), 4);
        col.cow_write(Entity::Edge(e), PropertyValue::Int64(9));
        col.flush_shadow_into_level(LevelId(1));

        assert_eq!(col.get(Entity::Edge(e)), Some(PropertyValue::Int64(9)));
    }
}
