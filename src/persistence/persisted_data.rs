use crate::persistence::codec::{
    invalid_data, read_optional_bytes, read_optional_list, write_optional_bytes, write_optional_list, ReadFrom,
    WriteTo,
};
use crate::types::{Acl, MutableStat};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::{self, Read, Write};

/// Parent id of the root record.
pub const NO_PARENT: u64 = 0;

/// Durable form of one tree node.
///
/// Byte representation:
///
/// ```text
/// | Vrs | id | name | parent_id | ephemeral_owner | stat | data | acl | children_ids |
/// ```
///
/// * `Vrs` - format version of the serialized record
/// * `name` - u32 length followed by utf-8 bytes
/// * `stat` - czxid, mzxid, pzxid, ctime, mtime (i64), then version, cversion, aversion,
///   num_children, num_ephemeral_children, data_length (i32)
/// * `data` - i32 length (-1 when absent) followed by the bytes
/// * `acl` - i32 count (-1 when absent) followed by (scheme, identifier, perms) entries
/// * `children_ids` - u32 count followed by u64 ids, in child-name order
///
/// All integers are little-endian.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PersistedData {
    pub id: u64,
    pub name: String,
    pub parent_id: u64,
    /// Session owning the node, 0 for persistent nodes.
    pub ephemeral_owner: u64,
    pub data: Option<Bytes>,
    pub acl: Option<Vec<Acl>>,
    pub stat: MutableStat,
    pub children_ids: Vec<u64>,
}

const PERSISTED_DATA_FORMAT_VERSION: u8 = 1;

impl PersistedData {
    pub fn is_root(&self) -> bool {
        self.parent_id == NO_PARENT
    }

    pub fn is_ephemeral(&self) -> bool {
        self.ephemeral_owner != 0
    }

    pub fn data_size(&self) -> usize {
        self.data.as_ref().map(|d| d.len()).unwrap_or(0)
    }

    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(96 + self.name.len() + self.data_size() + self.children_ids.len() * 8);
        // Writing into a Vec cannot fail.
        let _ = self.write_to(&mut buf);
        Bytes::from(buf)
    }

    pub fn from_bytes(mut bytes: &[u8]) -> io::Result<Self> {
        Self::read_from(&mut bytes)
    }
}

impl WriteTo for PersistedData {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u8(PERSISTED_DATA_FORMAT_VERSION)?;
        writer.write_u64::<LittleEndian>(self.id)?;
        self.name.write_to(writer)?;
        writer.write_u64::<LittleEndian>(self.parent_id)?;
        writer.write_u64::<LittleEndian>(self.ephemeral_owner)?;
        self.stat.write_to(writer)?;
        write_optional_bytes(writer, self.data.as_ref())?;
        write_optional_list(writer, self.acl.as_deref())?;
        writer.write_u32::<LittleEndian>(self.children_ids.len() as u32)?;
        for child in &self.children_ids {
            writer.write_u64::<LittleEndian>(*child)?;
        }
        Ok(())
    }
}

impl ReadFrom for PersistedData {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let version = reader.read_u8()?;
        if version != PERSISTED_DATA_FORMAT_VERSION {
            return Err(invalid_data(format!("unsupported record format version {}", version)));
        }

        let id = reader.read_u64::<LittleEndian>()?;
        let name = String::read_from(reader)?;
        let parent_id = reader.read_u64::<LittleEndian>()?;
        let ephemeral_owner = reader.read_u64::<LittleEndian>()?;
        let stat = MutableStat::read_from(reader)?;
        let data = read_optional_bytes(reader)?;
        let acl = read_optional_list(reader)?;
        let child_count = reader.read_u32::<LittleEndian>()? as usize;
        let mut children_ids = Vec::with_capacity(child_count.min(64 * 1024));
        for _ in 0..child_count {
            children_ids.push(reader.read_u64::<LittleEndian>()?);
        }

        Ok(PersistedData {
            id,
            name,
            parent_id,
            ephemeral_owner,
            data,
            acl,
            stat,
            children_ids,
        })
    }
}
