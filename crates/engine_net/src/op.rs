//! The op stream exchanged between server and clients.
//!
//! [`ClientOp`]s flow server → client and replicate the server's view of the
//! world. [`ServerOp`]s flow client → server and carry interest requests and
//! authoritative writes.
//!
//! Each op is a one-byte tag followed by its fields in declaration order.
//! Component types travel as their [`ComponentTypeIndexer`] index.

use engine_component::{ComponentKey, ComponentTypeId, EntityId, FieldId, FieldValue};
use engine_schema::ComponentTypeIndexer;

use crate::error::CodecError;
use crate::wire::{WireReader, WireWriter};

/// Server → client operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientOp {
    Noop,
    AddEntity(EntityId),
    RemoveEntity(EntityId),
    AddComponent(ComponentKey),
    UpdateComponent {
        key: ComponentKey,
        field: FieldId,
        value: Option<FieldValue>,
    },
    ActivateComponent(ComponentKey),
    DeactivateComponent(ComponentKey),
    /// The receiving client now holds authority over the component.
    DelegateComponent(ComponentKey),
    UndelegateComponent(ComponentKey),
    RemoveComponent(ComponentKey),
}

/// Client → server operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerOp {
    Noop,
    AddEntityInterest(EntityId),
    RemoveEntityInterest(EntityId),
    UpdateComponent {
        key: ComponentKey,
        field: FieldId,
        value: Option<FieldValue>,
    },
}

mod client_tag {
    pub const NOOP: u8 = 0;
    pub const ADD_ENTITY: u8 = 1;
    pub const REMOVE_ENTITY: u8 = 2;
    pub const ADD_COMPONENT: u8 = 3;
    pub const UPDATE_COMPONENT: u8 = 4;
    pub const ACTIVATE_COMPONENT: u8 = 5;
    pub const DEACTIVATE_COMPONENT: u8 = 6;
    pub const DELEGATE_COMPONENT: u8 = 7;
    pub const UNDELEGATE_COMPONENT: u8 = 8;
    pub const REMOVE_COMPONENT: u8 = 9;
}

mod server_tag {
    pub const NOOP: u8 = 0;
    pub const ADD_ENTITY_INTEREST: u8 = 1;
    pub const REMOVE_ENTITY_INTEREST: u8 = 2;
    pub const UPDATE_COMPONENT: u8 = 3;
}

fn write_key(
    w: &mut WireWriter<'_>,
    indexer: &ComponentTypeIndexer,
    key: ComponentKey,
) -> Result<(), CodecError> {
    let index = indexer
        .index_of(key.type_id)
        .ok_or(CodecError::UnregisteredType(key.type_id))?;
    w.entity(key.entity);
    w.u32(index);
    Ok(())
}

fn read_key(
    r: &mut WireReader<'_>,
    indexer: &ComponentTypeIndexer,
) -> Result<ComponentKey, CodecError> {
    let entity = r.entity()?;
    let index = r.u32()?;
    let type_id: ComponentTypeId = indexer
        .type_at(index)
        .ok_or(CodecError::UnknownTypeIndex(index))?;
    Ok(ComponentKey::new(entity, type_id))
}

/// Runs `write` against `out`, truncating `out` back to its prior length if it
/// fails.
fn append(
    out: &mut Vec<u8>,
    write: impl FnOnce(&mut WireWriter<'_>) -> Result<(), CodecError>,
) -> Result<(), CodecError> {
    let start = out.len();
    let result = write(&mut WireWriter::new(out));
    if result.is_err() {
        out.truncate(start);
    }
    result
}

/// Runs `read` from `*cursor`, advancing the cursor only on success.
fn consume<T>(
    bytes: &[u8],
    cursor: &mut usize,
    read: impl FnOnce(&mut WireReader<'_>) -> Result<T, CodecError>,
) -> Result<T, CodecError> {
    let mut r = WireReader::new(bytes, *cursor);
    let value = read(&mut r)?;
    *cursor = r.position();
    Ok(value)
}

fn expect_end(bytes: &[u8], cursor: usize) -> Result<(), CodecError> {
    match bytes.len().saturating_sub(cursor) {
        0 => Ok(()),
        n => Err(CodecError::TrailingBytes(n)),
    }
}

impl ClientOp {
    /// Append this op to `out`. On failure `out` is left unchanged.
    pub fn serialize(
        &self,
        indexer: &ComponentTypeIndexer,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        use client_tag::*;
        append(out, |w| {
            match self {
                Self::Noop => w.u8(NOOP),
                Self::AddEntity(id) => {
                    w.u8(ADD_ENTITY);
                    w.entity(*id);
                }
                Self::RemoveEntity(id) => {
                    w.u8(REMOVE_ENTITY);
                    w.entity(*id);
                }
                Self::UpdateComponent { key, field, value } => {
                    w.u8(UPDATE_COMPONENT);
                    write_key(w, indexer, *key)?;
                    w.u32(field.0);
                    w.value(value.as_ref());
                }
                Self::AddComponent(key)
                | Self::ActivateComponent(key)
                | Self::DeactivateComponent(key)
                | Self::DelegateComponent(key)
                | Self::UndelegateComponent(key)
                | Self::RemoveComponent(key) => {
                    w.u8(self.tag());
                    write_key(w, indexer, *key)?;
                }
            }
            Ok(())
        })
    }

    fn tag(&self) -> u8 {
        use client_tag::*;
        match self {
            Self::Noop => NOOP,
            Self::AddEntity(_) => ADD_ENTITY,
            Self::RemoveEntity(_) => REMOVE_ENTITY,
            Self::AddComponent(_) => ADD_COMPONENT,
            Self::UpdateComponent { .. } => UPDATE_COMPONENT,
            Self::ActivateComponent(_) => ACTIVATE_COMPONENT,
            Self::DeactivateComponent(_) => DEACTIVATE_COMPONENT,
            Self::DelegateComponent(_) => DELEGATE_COMPONENT,
            Self::UndelegateComponent(_) => UNDELEGATE_COMPONENT,
            Self::RemoveComponent(_) => REMOVE_COMPONENT,
        }
    }

    /// Read one op starting at `*cursor`. The cursor moves past the op only
    /// when decoding succeeds.
    pub fn deserialize(
        indexer: &ComponentTypeIndexer,
        bytes: &[u8],
        cursor: &mut usize,
    ) -> Result<Self, CodecError> {
        use client_tag::*;
        consume(bytes, cursor, |r| {
            Ok(match r.u8()? {
                NOOP => Self::Noop,
                ADD_ENTITY => Self::AddEntity(r.entity()?),
                REMOVE_ENTITY => Self::RemoveEntity(r.entity()?),
                ADD_COMPONENT => Self::AddComponent(read_key(r, indexer)?),
                UPDATE_COMPONENT => Self::UpdateComponent {
                    key: read_key(r, indexer)?,
                    field: FieldId(r.u32()?),
                    value: r.value()?,
                },
                ACTIVATE_COMPONENT => Self::ActivateComponent(read_key(r, indexer)?),
                DEACTIVATE_COMPONENT => Self::DeactivateComponent(read_key(r, indexer)?),
                DELEGATE_COMPONENT => Self::DelegateComponent(read_key(r, indexer)?),
                UNDELEGATE_COMPONENT => Self::UndelegateComponent(read_key(r, indexer)?),
                REMOVE_COMPONENT => Self::RemoveComponent(read_key(r, indexer)?),
                tag => return Err(CodecError::UnknownOpTag(tag)),
            })
        })
    }

    /// Encode as a standalone message.
    pub fn encode(&self, indexer: &ComponentTypeIndexer) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.serialize(indexer, &mut out)?;
        Ok(out)
    }

    /// Decode a standalone message holding exactly one op.
    pub fn decode(indexer: &ComponentTypeIndexer, bytes: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = 0;
        let op = Self::deserialize(indexer, bytes, &mut cursor)?;
        expect_end(bytes, cursor)?;
        Ok(op)
    }
}

impl ServerOp {
    /// Append this op to `out`. On failure `out` is left unchanged.
    pub fn serialize(
        &self,
        indexer: &ComponentTypeIndexer,
        out: &mut Vec<u8>,
    ) -> Result<(), CodecError> {
        use server_tag::*;
        append(out, |w| {
            match self {
                Self::Noop => w.u8(NOOP),
                Self::AddEntityInterest(id) => {
                    w.u8(ADD_ENTITY_INTEREST);
                    w.entity(*id);
                }
                Self::RemoveEntityInterest(id) => {
                    w.u8(REMOVE_ENTITY_INTEREST);
                    w.entity(*id);
                }
                Self::UpdateComponent { key, field, value } => {
                    w.u8(UPDATE_COMPONENT);
                    write_key(w, indexer, *key)?;
                    w.u32(field.0);
                    w.value(value.as_ref());
                }
            }
            Ok(())
        })
    }

    /// Read one op starting at `*cursor`. The cursor moves past the op only
    /// when decoding succeeds.
    pub fn deserialize(
        indexer: &ComponentTypeIndexer,
        bytes: &[u8],
        cursor: &mut usize,
    ) -> Result<Self, CodecError> {
        use server_tag::*;
        consume(bytes, cursor, |r| {
            Ok(match r.u8()? {
                NOOP => Self::Noop,
                ADD_ENTITY_INTEREST => Self::AddEntityInterest(r.entity()?),
                REMOVE_ENTITY_INTEREST => Self::RemoveEntityInterest(r.entity()?),
                UPDATE_COMPONENT => Self::UpdateComponent {
                    key: read_key(r, indexer)?,
                    field: FieldId(r.u32()?),
                    value: r.value()?,
                },
                tag => return Err(CodecError::UnknownOpTag(tag)),
            })
        })
    }

    /// Encode as a standalone message.
    pub fn encode(&self, indexer: &ComponentTypeIndexer) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        self.serialize(indexer, &mut out)?;
        Ok(out)
    }

    /// Decode a standalone message holding exactly one op.
    pub fn decode(indexer: &ComponentTypeIndexer, bytes: &[u8]) -> Result<Self, CodecError> {
        let mut cursor = 0;
        let op = Self::deserialize(indexer, bytes, &mut cursor)?;
        expect_end(bytes, cursor)?;
        Ok(op)
    }
}
