use fairq::Item;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Write-message kinds dispatched by a storage node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MsgKind {
    /// Row data destined for the node's tables.
    Submit,
    CreateTable,
    DropTable,
    AlterTable,
    /// Super-table drop; currently acknowledged without acting.
    DropStable,
}

impl MsgKind {
    /// Stable wire tag, used as the queue item type.
    #[inline]
    pub fn tag(self) -> i32 {
        match self {
            MsgKind::Submit => 1,
            MsgKind::CreateTable => 2,
            MsgKind::DropTable => 3,
            MsgKind::AlterTable => 4,
            MsgKind::DropStable => 5,
        }
    }

    /// Reverse of [`tag`](MsgKind::tag); unknown tags yield `None`.
    pub fn from_tag(tag: i32) -> Option<Self> {
        Some(match tag {
            1 => MsgKind::Submit,
            2 => MsgKind::CreateTable,
            3 => MsgKind::DropTable,
            4 => MsgKind::AlterTable,
            5 => MsgKind::DropStable,
            _ => return None,
        })
    }
}

/// The unit the RPC layer hands to the write path: a version (0 until the
/// owning node assigns one), the message kind, and the opaque body the
/// handler interprets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteRecord {
    pub version: u64,
    pub kind: MsgKind,
    pub body: Vec<u8>,
}

impl WriteRecord {
    /// A not-yet-versioned client record.
    pub fn client(kind: MsgKind, body: Vec<u8>) -> Self {
        Self {
            version: 0,
            kind,
            body,
        }
    }

    /// A replayed record carrying the version it was logged with.
    pub fn replayed(version: u64, kind: MsgKind, body: Vec<u8>) -> Self {
        Self {
            version,
            kind,
            body,
        }
    }

    /// Encodes the record into a freshly allocated queue item.
    pub fn encode_item(&self) -> Result<Box<Item>, CodecError> {
        let bytes = bincode::serialize(self)?;
        Ok(Item::from_bytes(&bytes))
    }

    /// Decodes a record out of a queue item's payload.
    pub fn decode_item(item: &Item) -> Result<Self, CodecError> {
        Ok(bincode::deserialize(&item[..])?)
    }
}

/// Record (de)serialization failure.
#[derive(Debug, Error)]
#[error("write record codec: {0}")]
pub struct CodecError(#[from] bincode::Error);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        for kind in [
            MsgKind::Submit,
            MsgKind::CreateTable,
            MsgKind::DropTable,
            MsgKind::AlterTable,
            MsgKind::DropStable,
        ] {
            assert_eq!(MsgKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(MsgKind::from_tag(0), None);
        assert_eq!(MsgKind::from_tag(99), None);
    }

    #[test]
    fn test_record_item_roundtrip() {
        let record = WriteRecord::replayed(42, MsgKind::CreateTable, b"schema".to_vec());
        let item = record.encode_item().unwrap();
        let decoded = WriteRecord::decode_item(&item).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_garbage_fails() {
        let item = Item::from_bytes(&[0xff; 3]);
        assert!(WriteRecord::decode_item(&item).is_err());
    }
}
