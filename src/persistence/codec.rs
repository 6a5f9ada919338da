use crate::types::{Acl, Id, MutableStat, Perms};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::{self, Read, Write};

pub trait WriteTo {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()>;
}

pub trait ReadFrom: Sized {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Self>;
}

impl WriteTo for str {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_u32::<LittleEndian>(self.len() as u32)?;
        writer.write_all(self.as_bytes())
    }
}

impl ReadFrom for String {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<String> {
        let len = reader.read_u32::<LittleEndian>()? as usize;
        let raw = read_exact_vec(reader, len)?;
        String::from_utf8(raw).map_err(|e| invalid_data(e.to_string()))
    }
}

impl WriteTo for MutableStat {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_i64::<LittleEndian>(self.czxid)?;
        writer.write_i64::<LittleEndian>(self.mzxid)?;
        writer.write_i64::<LittleEndian>(self.pzxid)?;
        writer.write_i64::<LittleEndian>(self.ctime)?;
        writer.write_i64::<LittleEndian>(self.mtime)?;
        writer.write_i32::<LittleEndian>(self.version)?;
        writer.write_i32::<LittleEndian>(self.cversion)?;
        writer.write_i32::<LittleEndian>(self.aversion)?;
        writer.write_i32::<LittleEndian>(self.num_children)?;
        writer.write_i32::<LittleEndian>(self.num_ephemeral_children)?;
        writer.write_i32::<LittleEndian>(self.data_length)
    }
}

impl ReadFrom for MutableStat {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<MutableStat> {
        Ok(MutableStat {
            czxid: reader.read_i64::<LittleEndian>()?,
            mzxid: reader.read_i64::<LittleEndian>()?,
            pzxid: reader.read_i64::<LittleEndian>()?,
            ctime: reader.read_i64::<LittleEndian>()?,
            mtime: reader.read_i64::<LittleEndian>()?,
            version: reader.read_i32::<LittleEndian>()?,
            cversion: reader.read_i32::<LittleEndian>()?,
            aversion: reader.read_i32::<LittleEndian>()?,
            num_children: reader.read_i32::<LittleEndian>()?,
            num_ephemeral_children: reader.read_i32::<LittleEndian>()?,
            data_length: reader.read_i32::<LittleEndian>()?,
        })
    }
}

impl WriteTo for Acl {
    fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.id.scheme.write_to(writer)?;
        self.id.identifier.write_to(writer)?;
        writer.write_u32::<LittleEndian>(self.perms.code())
    }
}

impl ReadFrom for Acl {
    fn read_from<R: Read>(reader: &mut R) -> io::Result<Acl> {
        let scheme = String::read_from(reader)?;
        let identifier = String::read_from(reader)?;
        let perms = Perms::from_code(reader.read_u32::<LittleEndian>()?);
        Ok(Acl::new(perms, Id::new(scheme, identifier)))
    }
}

/// `-1` encodes an absent blob.
pub fn write_optional_bytes<W: Write>(writer: &mut W, data: Option<&Bytes>) -> io::Result<()> {
    match data {
        None => writer.write_i32::<LittleEndian>(-1),
        Some(data) => {
            writer.write_i32::<LittleEndian>(data.len() as i32)?;
            writer.write_all(data)
        }
    }
}

pub fn read_optional_bytes<R: Read>(reader: &mut R) -> io::Result<Option<Bytes>> {
    let len = reader.read_i32::<LittleEndian>()?;
    if len < 0 {
        return Ok(None);
    }
    Ok(Some(Bytes::from(read_exact_vec(reader, len as usize)?)))
}

/// `-1` encodes an absent list.
pub fn write_optional_list<W, T>(writer: &mut W, list: Option<&[T]>) -> io::Result<()>
where
    W: Write,
    T: WriteTo,
{
    match list {
        None => writer.write_i32::<LittleEndian>(-1),
        Some(list) => {
            writer.write_i32::<LittleEndian>(list.len() as i32)?;
            for elem in list {
                elem.write_to(writer)?;
            }
            Ok(())
        }
    }
}

pub fn read_optional_list<R, T>(reader: &mut R) -> io::Result<Option<Vec<T>>>
where
    R: Read,
    T: ReadFrom,
{
    let len = reader.read_i32::<LittleEndian>()?;
    if len < 0 {
        return Ok(None);
    }
    let mut list = Vec::with_capacity(bounded_capacity(len as usize));
    for _ in 0..len {
        list.push(T::read_from(reader)?);
    }
    Ok(Some(list))
}

pub fn write_list<W, T>(writer: &mut W, list: &[T]) -> io::Result<()>
where
    W: Write,
    T: WriteTo,
{
    writer.write_u32::<LittleEndian>(list.len() as u32)?;
    for elem in list {
        elem.write_to(writer)?;
    }
    Ok(())
}

pub fn read_list<R, T>(reader: &mut R) -> io::Result<Vec<T>>
where
    R: Read,
    T: ReadFrom,
{
    let len = reader.read_u32::<LittleEndian>()? as usize;
    let mut list = Vec::with_capacity(bounded_capacity(len));
    for _ in 0..len {
        list.push(T::read_from(reader)?);
    }
    Ok(list)
}

pub fn invalid_data<E: Into<Box<dyn std::error::Error + Send + Sync>>>(error: E) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, error)
}

fn read_exact_vec<R: Read>(reader: &mut R, len: usize) -> io::Result<Vec<u8>> {
    let mut buf = Vec::with_capacity(bounded_capacity(len));
    reader.take(len as u64).read_to_end(&mut buf)?;
    if buf.len() != len {
        return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "truncated buffer"));
    }
    Ok(buf)
}

// Length prefixes come from untrusted input; never pre-allocate more than this.
fn bounded_capacity(len: usize) -> usize {
    len.min(64 * 1024)
}
