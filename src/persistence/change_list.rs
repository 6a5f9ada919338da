use crate::persistence::codec::{invalid_data, read_list, write_list, ReadFrom, WriteTo};
use crate::persistence::PersistedData;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::{self, Read, Write};

#[repr(i32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeType {
    Add = 0,
    Update = 1,
    Remove = 2,
}

impl TryFrom<i32> for ChangeType {
    type Error = io::Error;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(ChangeType::Add),
            1 => Ok(ChangeType::Update),
            2 => Ok(ChangeType::Remove),
            _ => Err(invalid_data(format!("invalid change type {}", code))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Change {
    pub change_type: ChangeType,
    pub data: PersistedData,
}

impl Change {
    pub fn add(data: PersistedData) -> Self {
        Change {
            change_type: ChangeType::Add,
            data,
        }
    }

    pub fn update(data: PersistedData) -> Self {
        Change {
            change_type: ChangeType::Update,
            data,
        }
    }

    pub fn remove(data: PersistedData) -> Self {
        Change {
            change_type: ChangeType::Remove,
            data,
        }
    }
}

impl WriteTo for Change {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i32::<LittleEndian>(self.change_type as i32)?;
        self.data.write_to(writer)
    }
}

impl ReadFrom for Change {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self> {
        let change_type = ChangeType::try_from(reader.read_i32::<LittleEndian>()?)?;
        let data = PersistedData::read_from(reader)?;
        Ok(Change { change_type, data })
    }
}

/// Ordered batch of changes committed atomically under one transaction id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChangeList {
    pub id: u64,
    pub changes: Vec<Change>,
}

impl ChangeList {
    pub fn new(id: u64, changes: Vec<Change>) -> Self {
        ChangeList { id, changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// The payload handed to every apply queue: the changes only, the id travels beside it.
    pub(crate) fn serialize_changes(changes: &[Change]) -> Bytes {
        let mut buf = Vec::new();
        // Writing into a Vec cannot fail.
        let _ = write_list(&mut buf, changes);
        Bytes::from(buf)
    }

    pub(crate) fn deserialize(id: u64, mut payload: &[u8]) -> io::Result<Self> {
        let changes = read_list(&mut payload)?;
        if !payload.is_empty() {
            return Err(invalid_data(format!("{} trailing bytes after change-list", payload.len())));
        }
        Ok(ChangeList { id, changes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::persisted_data::tests::record;

    #[test]
    fn payload_keeps_change_order() {
        let changes = vec![
            Change::add(record(5, "e", 1)),
            Change::update(record(1, "", 0)),
            Change::remove(record(3, "c", 1)),
        ];

        let payload = ChangeList::serialize_changes(&changes);
        let list = ChangeList::deserialize(17, &payload).unwrap();

        assert_eq!(list.id, 17);
        assert_eq!(list.changes, changes);
    }

    #[test]
    fn unknown_change_type_is_rejected() {
        let mut payload = ChangeList::serialize_changes(&[Change::add(record(5, "e", 1))]).to_vec();
        // First change type sits right after the u32 count.
        payload[4] = 7;
        assert!(ChangeList::deserialize(1, &payload).is_err());
    }
}
