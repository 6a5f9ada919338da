use crate::backend::{Op, OpResult, Request, RequestCall, RequestResponse, RequestType, ResponseContent, WatcherArg};
use crate::persistence::{
    read_optional_bytes, read_optional_list, write_optional_bytes, write_optional_list, ReadFrom, WriteTo,
};
use crate::types::{
    Acl, Code, CreateMode, DeleteMode, Id, KeeperState, MoveMode, MutableStat, Stat, WatchedEvent, WatchedEventType,
    WatcherKind,
};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use bytes::Bytes;
use std::io::{self, Cursor, Read, Write};

pub const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("Malformed packet: {0}")]
    Malformed(#[from] io::Error),
    #[error("Unsupported protocol version {0}")]
    UnsupportedVersion(u32),
    #[error("Unknown request type {0}")]
    UnknownRequestType(u8),
    #[error("Request type {0:?} can't appear inside a multi or batch")]
    NotAnOp(RequestType),
    #[error("Unknown result code {0}")]
    UnknownCode(i32),
    #[error("Unknown tag {0}")]
    UnknownTag(u8),
    #[error("{0} trailing bytes after packet")]
    TrailingBytes(usize),
}

/// Converts between packets and the request/response model.
pub trait CommunicationProtocol: Send + Sync {
    fn serialize_request(&self, call: &RequestCall, version: u32) -> Result<Bytes, ProtocolError>;

    fn deserialize_request(&self, packet: &[u8], version: u32) -> Result<RequestCall, ProtocolError>;

    fn serialize_response(&self, response: &RequestResponse, version: u32) -> Result<Bytes, ProtocolError>;

    fn deserialize_response(&self, packet: &[u8], version: u32) -> Result<RequestResponse, ProtocolError>;
}

/// Little-endian binary encoding. Strings are length prefixed, absent blobs and lists are `-1`.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryProtocol;

fn check_version(version: u32) -> Result<(), ProtocolError> {
    if version == PROTOCOL_VERSION {
        Ok(())
    } else {
        Err(ProtocolError::UnsupportedVersion(version))
    }
}

fn finish(cursor: Cursor<&[u8]>) -> Result<(), ProtocolError> {
    let remaining = cursor.get_ref().len() - cursor.position() as usize;
    if remaining == 0 {
        Ok(())
    } else {
        Err(ProtocolError::TrailingBytes(remaining))
    }
}

impl CommunicationProtocol for BinaryProtocol {
    fn serialize_request(&self, call: &RequestCall, version: u32) -> Result<Bytes, ProtocolError> {
        check_version(version)?;
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(call.call_id)?;
        write_request(&mut buf, &call.request)?;
        Ok(Bytes::from(buf))
    }

    fn deserialize_request(&self, packet: &[u8], version: u32) -> Result<RequestCall, ProtocolError> {
        check_version(version)?;
        let mut cursor = Cursor::new(packet);
        let call_id = cursor.read_u64::<LittleEndian>()?;
        let request = read_request(&mut cursor)?;
        finish(cursor)?;
        Ok(RequestCall { call_id, request })
    }

    fn serialize_response(&self, response: &RequestResponse, version: u32) -> Result<Bytes, ProtocolError> {
        check_version(version)?;
        let mut buf = Vec::new();
        buf.write_u64::<LittleEndian>(response.call_id)?;
        buf.write_i32::<LittleEndian>(response.code.as_i32())?;
        write_optional_string(&mut buf, response.path.as_deref())?;
        write_optional_stat(&mut buf, response.stat.as_ref())?;
        write_content(&mut buf, &response.content)?;
        Ok(Bytes::from(buf))
    }

    fn deserialize_response(&self, packet: &[u8], version: u32) -> Result<RequestResponse, ProtocolError> {
        check_version(version)?;
        let mut cursor = Cursor::new(packet);
        let call_id = cursor.read_u64::<LittleEndian>()?;
        let code = read_code(&mut cursor)?;
        let path = read_optional_string(&mut cursor)?;
        let stat = read_optional_stat(&mut cursor)?;
        let content = read_content(&mut cursor)?;
        finish(cursor)?;
        Ok(RequestResponse {
            call_id,
            code,
            path,
            stat,
            content,
        })
    }
}

fn write_bool<W: Write>(writer: &mut W, value: bool) -> io::Result<()> {
    writer.write_u8(value as u8)
}

fn read_bool<R: Read>(reader: &mut R) -> io::Result<bool> {
    Ok(reader.read_u8()? != 0)
}

fn write_optional_string<W: Write>(writer: &mut W, value: Option<&str>) -> io::Result<()> {
    match value {
        None => writer.write_u8(0),
        Some(value) => {
            writer.write_u8(1)?;
            value.write_to(writer)
        }
    }
}

fn read_optional_string<R: Read>(reader: &mut R) -> io::Result<Option<String>> {
    if read_bool(reader)? {
        Ok(Some(String::read_from(reader)?))
    } else {
        Ok(None)
    }
}

fn write_optional_stat<W: Write>(writer: &mut W, stat: Option<&Stat>) -> io::Result<()> {
    match stat {
        None => writer.write_u8(0),
        Some(stat) => {
            writer.write_u8(1)?;
            stat.to_mutable().write_to(writer)
        }
    }
}

fn read_optional_stat<R: Read>(reader: &mut R) -> io::Result<Option<Stat>> {
    if read_bool(reader)? {
        Ok(Some(read_stat(reader)?))
    } else {
        Ok(None)
    }
}

fn read_stat<R: Read>(reader: &mut R) -> io::Result<Stat> {
    Ok(Stat::compact(MutableStat::read_from(reader)?))
}

fn read_code<R: Read>(reader: &mut R) -> Result<Code, ProtocolError> {
    let raw = reader.read_i32::<LittleEndian>()?;
    Code::from_i32(raw).ok_or(ProtocolError::UnknownCode(raw))
}

fn write_strings<W: Write>(writer: &mut W, values: &[String]) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(values.len() as u32)?;
    for value in values {
        value.write_to(writer)?;
    }
    Ok(())
}

fn read_strings<R: Read>(reader: &mut R) -> io::Result<Vec<String>> {
    let len = reader.read_u32::<LittleEndian>()?;
    let mut values = Vec::new();
    for _ in 0..len {
        values.push(String::read_from(reader)?);
    }
    Ok(values)
}

fn write_watcher<W: Write>(writer: &mut W, watcher: &Option<WatcherArg>) -> io::Result<()> {
    match watcher {
        None => writer.write_u8(0),
        Some(WatcherArg::Spec { id, kind }) => {
            writer.write_u8(1)?;
            writer.write_u64::<LittleEndian>(*id)?;
            writer.write_u8(kind.bits())
        }
        Some(WatcherArg::Bound(_)) => Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "bound watchers can't be serialized",
        )),
    }
}

fn read_watcher<R: Read>(reader: &mut R) -> io::Result<Option<WatcherArg>> {
    if !read_bool(reader)? {
        return Ok(None);
    }
    let id = reader.read_u64::<LittleEndian>()?;
    let kind = WatcherKind::from_bits(reader.read_u8()?);
    Ok(Some(WatcherArg::Spec { id, kind }))
}

fn write_acl<W: Write>(writer: &mut W, acl: &Option<Vec<Acl>>) -> io::Result<()> {
    write_optional_list(writer, acl.as_deref())
}

fn write_op<W: Write>(writer: &mut W, op: &Op) -> io::Result<()> {
    writer.write_u8(op.request_type() as u8)?;
    match op {
        Op::Create { path, data, acl, mode } => {
            path.write_to(writer)?;
            write_optional_bytes(writer, data.as_ref())?;
            write_acl(writer, acl)?;
            writer.write_i32::<LittleEndian>(mode.bits())
        }
        Op::Delete { path, version, mode } => {
            path.write_to(writer)?;
            writer.write_i32::<LittleEndian>(*version)?;
            writer.write_i32::<LittleEndian>(mode.bits())
        }
        Op::SetData { path, data, version } => {
            path.write_to(writer)?;
            write_optional_bytes(writer, data.as_ref())?;
            writer.write_i32::<LittleEndian>(*version)
        }
        Op::SetAcl { path, acl, version } => {
            path.write_to(writer)?;
            write_acl(writer, acl)?;
            writer.write_i32::<LittleEndian>(*version)
        }
        Op::Check { path, version } => {
            path.write_to(writer)?;
            writer.write_i32::<LittleEndian>(*version)
        }
        Op::GetData { path } => path.write_to(writer),
        Op::Move {
            path,
            version,
            destination,
            mode,
        } => {
            path.write_to(writer)?;
            writer.write_i32::<LittleEndian>(*version)?;
            destination.write_to(writer)?;
            writer.write_i32::<LittleEndian>(mode.bits())
        }
    }
}

fn read_op<R: Read>(reader: &mut R) -> Result<Op, ProtocolError> {
    let raw = reader.read_u8()?;
    let request_type = RequestType::from_u8(raw).ok_or(ProtocolError::UnknownRequestType(raw))?;
    let op = match request_type {
        RequestType::Create => Op::Create {
            path: String::read_from(reader)?,
            data: read_optional_bytes(reader)?,
            acl: read_optional_list(reader)?,
            mode: CreateMode::from_bits(reader.read_i32::<LittleEndian>()?),
        },
        RequestType::Delete => Op::Delete {
            path: String::read_from(reader)?,
            version: reader.read_i32::<LittleEndian>()?,
            mode: DeleteMode::from_bits(reader.read_i32::<LittleEndian>()?),
        },
        RequestType::SetData => Op::SetData {
            path: String::read_from(reader)?,
            data: read_optional_bytes(reader)?,
            version: reader.read_i32::<LittleEndian>()?,
        },
        RequestType::SetAcl => Op::SetAcl {
            path: String::read_from(reader)?,
            acl: read_optional_list(reader)?,
            version: reader.read_i32::<LittleEndian>()?,
        },
        RequestType::Check => Op::Check {
            path: String::read_from(reader)?,
            version: reader.read_i32::<LittleEndian>()?,
        },
        RequestType::GetData => Op::GetData {
            path: String::read_from(reader)?,
        },
        RequestType::Move => Op::Move {
            path: String::read_from(reader)?,
            version: reader.read_i32::<LittleEndian>()?,
            destination: String::read_from(reader)?,
            mode: MoveMode::from_bits(reader.read_i32::<LittleEndian>()?),
        },
        other => return Err(ProtocolError::NotAnOp(other)),
    };
    Ok(op)
}

fn write_ops<W: Write>(writer: &mut W, ops: &[Op]) -> io::Result<()> {
    writer.write_u32::<LittleEndian>(ops.len() as u32)?;
    for op in ops {
        write_op(writer, op)?;
    }
    Ok(())
}

fn read_ops<R: Read>(reader: &mut R) -> Result<Vec<Op>, ProtocolError> {
    let len = reader.read_u32::<LittleEndian>()?;
    let mut ops = Vec::new();
    for _ in 0..len {
        ops.push(read_op(reader)?);
    }
    Ok(ops)
}

fn write_request<W: Write>(writer: &mut W, request: &Request) -> io::Result<()> {
    match request {
        Request::Init {
            session_id,
            auth,
            is_super,
        } => {
            writer.write_u8(RequestType::Init as u8)?;
            writer.write_u64::<LittleEndian>(*session_id)?;
            match auth {
                None => writer.write_u8(0)?,
                Some(id) => {
                    writer.write_u8(1)?;
                    id.scheme.write_to(writer)?;
                    id.identifier.write_to(writer)?;
                }
            }
            write_bool(writer, *is_super)
        }
        Request::GetData { path, watcher } | Request::Exists { path, watcher } => {
            writer.write_u8(request.request_type() as u8)?;
            path.write_to(writer)?;
            write_watcher(writer, watcher)
        }
        Request::GetChildren {
            path,
            watcher,
            max_count,
            start_after,
        } => {
            writer.write_u8(RequestType::GetChildren as u8)?;
            path.write_to(writer)?;
            write_watcher(writer, watcher)?;
            writer.write_u32::<LittleEndian>(*max_count)?;
            write_optional_string(writer, start_after.as_deref())
        }
        Request::GetAcl { path } | Request::Sync { path } => {
            writer.write_u8(request.request_type() as u8)?;
            path.write_to(writer)
        }
        Request::Multi {
            ops,
            complete_synchronously,
            scheduled_name,
        } => {
            writer.write_u8(RequestType::Multi as u8)?;
            write_ops(writer, ops)?;
            write_bool(writer, *complete_synchronously)?;
            write_optional_string(writer, scheduled_name.as_deref())
        }
        Request::Batch {
            ops,
            complete_synchronously,
        } => {
            writer.write_u8(RequestType::Batch as u8)?;
            write_ops(writer, ops)?;
            write_bool(writer, *complete_synchronously)
        }
        Request::Nop => writer.write_u8(RequestType::Nop as u8),
        single => match single.clone().into_op() {
            Ok(op) => write_op(writer, &op),
            Err(_) => Err(io::Error::new(io::ErrorKind::InvalidInput, "unencodable request")),
        },
    }
}

fn single(op: Op) -> Request {
    match op {
        Op::Create { path, data, acl, mode } => Request::Create { path, data, acl, mode },
        Op::Delete { path, version, mode } => Request::Delete { path, version, mode },
        Op::SetData { path, data, version } => Request::SetData { path, data, version },
        Op::SetAcl { path, acl, version } => Request::SetAcl { path, acl, version },
        Op::Check { path, version } => Request::Check { path, version },
        Op::GetData { path } => Request::GetData { path, watcher: None },
        Op::Move {
            path,
            version,
            destination,
            mode,
        } => Request::Move {
            path,
            version,
            destination,
            mode,
        },
    }
}

fn read_request(reader: &mut Cursor<&[u8]>) -> Result<Request, ProtocolError> {
    let start = reader.position();
    let raw = reader.read_u8()?;
    let request_type = RequestType::from_u8(raw).ok_or(ProtocolError::UnknownRequestType(raw))?;
    let request = match request_type {
        RequestType::Init => {
            let session_id = reader.read_u64::<LittleEndian>()?;
            let auth = if read_bool(reader)? {
                let scheme = String::read_from(reader)?;
                let identifier = String::read_from(reader)?;
                Some(Id::new(scheme, identifier))
            } else {
                None
            };
            Request::Init {
                session_id,
                auth,
                is_super: read_bool(reader)?,
            }
        }
        RequestType::GetData => Request::GetData {
            path: String::read_from(reader)?,
            watcher: read_watcher(reader)?,
        },
        RequestType::Exists => Request::Exists {
            path: String::read_from(reader)?,
            watcher: read_watcher(reader)?,
        },
        RequestType::GetChildren => Request::GetChildren {
            path: String::read_from(reader)?,
            watcher: read_watcher(reader)?,
            max_count: reader.read_u32::<LittleEndian>()?,
            start_after: read_optional_string(reader)?,
        },
        RequestType::GetAcl => Request::GetAcl {
            path: String::read_from(reader)?,
        },
        RequestType::Sync => Request::Sync {
            path: String::read_from(reader)?,
        },
        RequestType::Multi => Request::Multi {
            ops: read_ops(reader)?,
            complete_synchronously: read_bool(reader)?,
            scheduled_name: read_optional_string(reader)?,
        },
        RequestType::Batch => Request::Batch {
            ops: read_ops(reader)?,
            complete_synchronously: read_bool(reader)?,
        },
        RequestType::Nop => Request::Nop,
        // Single mutations share the op layout.
        _ => {
            reader.set_position(start);
            single(read_op(reader)?)
        }
    };
    Ok(request)
}

fn write_op_result<W: Write>(writer: &mut W, result: &OpResult) -> io::Result<()> {
    match result {
        OpResult::Created { path, stat } => {
            writer.write_u8(0)?;
            path.write_to(writer)?;
            stat.to_mutable().write_to(writer)
        }
        OpResult::Deleted => writer.write_u8(1),
        OpResult::DataSet(stat) => {
            writer.write_u8(2)?;
            stat.to_mutable().write_to(writer)
        }
        OpResult::AclSet(stat) => {
            writer.write_u8(3)?;
            stat.to_mutable().write_to(writer)
        }
        OpResult::Checked(stat) => {
            writer.write_u8(4)?;
            stat.to_mutable().write_to(writer)
        }
        OpResult::Data { data, stat } => {
            writer.write_u8(5)?;
            write_optional_bytes(writer, data.as_ref())?;
            stat.to_mutable().write_to(writer)
        }
        OpResult::Moved(path) => {
            writer.write_u8(6)?;
            path.write_to(writer)
        }
        OpResult::Error(code) => {
            writer.write_u8(7)?;
            writer.write_i32::<LittleEndian>(code.as_i32())
        }
    }
}

fn read_op_result<R: Read>(reader: &mut R) -> Result<OpResult, ProtocolError> {
    let result = match reader.read_u8()? {
        0 => OpResult::Created {
            path: String::read_from(reader)?,
            stat: read_stat(reader)?,
        },
        1 => OpResult::Deleted,
        2 => OpResult::DataSet(read_stat(reader)?),
        3 => OpResult::AclSet(read_stat(reader)?),
        4 => OpResult::Checked(read_stat(reader)?),
        5 => OpResult::Data {
            data: read_optional_bytes(reader)?,
            stat: read_stat(reader)?,
        },
        6 => OpResult::Moved(String::read_from(reader)?),
        7 => OpResult::Error(read_code(reader)?),
        tag => return Err(ProtocolError::UnknownTag(tag)),
    };
    Ok(result)
}

fn write_content<W: Write>(writer: &mut W, content: &ResponseContent) -> io::Result<()> {
    match content {
        ResponseContent::None => writer.write_u8(0),
        ResponseContent::Data(data) => {
            writer.write_u8(1)?;
            write_optional_bytes(writer, data.as_ref())
        }
        ResponseContent::Children(children) => {
            writer.write_u8(2)?;
            write_strings(writer, children)
        }
        ResponseContent::Acl(acl) => {
            writer.write_u8(3)?;
            write_acl(writer, acl)
        }
        ResponseContent::Path(path) => {
            writer.write_u8(4)?;
            path.write_to(writer)
        }
        ResponseContent::Results(results) => {
            writer.write_u8(5)?;
            writer.write_u32::<LittleEndian>(results.len() as u32)?;
            for result in results {
                write_op_result(writer, result)?;
            }
            Ok(())
        }
        ResponseContent::Redirect(primary) => {
            writer.write_u8(6)?;
            primary.write_to(writer)
        }
        ResponseContent::Session(session_id) => {
            writer.write_u8(7)?;
            writer.write_u64::<LittleEndian>(*session_id)
        }
        ResponseContent::Notification { watcher_id, event } => {
            writer.write_u8(8)?;
            writer.write_u64::<LittleEndian>(*watcher_id)?;
            writer.write_i32::<LittleEndian>(event.event_type as i32)?;
            writer.write_i32::<LittleEndian>(event.keeper_state as i32)?;
            event.path.write_to(writer)?;
            write_optional_bytes(writer, event.data.as_ref())?;
            write_optional_stat(writer, event.stat.as_ref())
        }
    }
}

fn read_content<R: Read>(reader: &mut R) -> Result<ResponseContent, ProtocolError> {
    let content = match reader.read_u8()? {
        0 => ResponseContent::None,
        1 => ResponseContent::Data(read_optional_bytes(reader)?),
        2 => ResponseContent::Children(read_strings(reader)?),
        3 => ResponseContent::Acl(read_optional_list(reader)?),
        4 => ResponseContent::Path(String::read_from(reader)?),
        5 => {
            let len = reader.read_u32::<LittleEndian>()?;
            let mut results = Vec::new();
            for _ in 0..len {
                results.push(read_op_result(reader)?);
            }
            ResponseContent::Results(results)
        }
        6 => ResponseContent::Redirect(String::read_from(reader)?),
        7 => ResponseContent::Session(reader.read_u64::<LittleEndian>()?),
        8 => {
            let watcher_id = reader.read_u64::<LittleEndian>()?;
            let event_type = WatchedEventType::from(reader.read_i32::<LittleEndian>()?);
            let keeper_state = KeeperState::from(reader.read_i32::<LittleEndian>()?);
            let path = String::read_from(reader)?;
            let data = read_optional_bytes(reader)?;
            let stat = read_optional_stat(reader)?;
            ResponseContent::Notification {
                watcher_id,
                event: WatchedEvent {
                    event_type,
                    keeper_state,
                    path,
                    data,
                    stat,
                },
            }
        }
        tag => return Err(ProtocolError::UnknownTag(tag)),
    };
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Perms, ROOT_PATH};

    fn round_trip_request(request: Request) -> Request {
        let protocol = BinaryProtocol;
        let call = RequestCall { call_id: 42, request };
        let packet = protocol.serialize_request(&call, PROTOCOL_VERSION).unwrap();
        let decoded = protocol.deserialize_request(&packet, PROTOCOL_VERSION).unwrap();
        assert_eq!(decoded.call_id, 42);
        decoded.request
    }

    #[test]
    fn multi_with_every_op_kind_decodes() {
        let ops = vec![
            Op::Create {
                path: "/a".to_string(),
                data: Some(Bytes::from_static(b"x")),
                acl: Some(vec![Acl::new(Perms::ALL, Id::anyone())]),
                mode: CreateMode::EPHEMERAL | CreateMode::SEQUENTIAL,
            },
            Op::Delete {
                path: "/b".to_string(),
                version: 3,
                mode: DeleteMode::CASCADE,
            },
            Op::Check {
                path: ROOT_PATH.to_string(),
                version: -1,
            },
            Op::Move {
                path: "/c".to_string(),
                version: -1,
                destination: "/d".to_string(),
                mode: MoveMode::ALLOW_PATH_CREATION,
            },
        ];
        let request = round_trip_request(Request::Multi {
            ops: ops.clone(),
            complete_synchronously: false,
            scheduled_name: Some("cleanup".to_string()),
        });

        match request {
            Request::Multi {
                ops: decoded,
                complete_synchronously,
                scheduled_name,
            } => {
                assert_eq!(decoded, ops);
                assert!(!complete_synchronously);
                assert_eq!(scheduled_name.as_deref(), Some("cleanup"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn watcher_specs_survive_encoding() {
        let request = round_trip_request(Request::GetChildren {
            path: "/p".to_string(),
            watcher: Some(WatcherArg::Spec {
                id: 9,
                kind: WatcherKind::ONE_USE | WatcherKind::INCLUDE_DATA,
            }),
            max_count: 5,
            start_after: Some("m".to_string()),
        });

        match request {
            Request::GetChildren {
                watcher: Some(WatcherArg::Spec { id, kind }),
                max_count,
                start_after,
                ..
            } => {
                assert_eq!(id, 9);
                assert!(kind.is_one_use() && kind.includes_data());
                assert_eq!(max_count, 5);
                assert_eq!(start_after.as_deref(), Some("m"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn responses_keep_stat_shape_and_results() {
        let protocol = BinaryProtocol;
        let stat = Stat::compact(MutableStat::new_node(5, 6, 1));
        let response = RequestResponse {
            call_id: 7,
            code: Code::NoNode,
            path: Some("/x".to_string()),
            stat: Some(stat.clone()),
            content: ResponseContent::Results(vec![
                OpResult::Error(Code::RolledBack),
                OpResult::Error(Code::NoNode),
                OpResult::Data { data: None, stat },
            ]),
        };

        let packet = protocol.serialize_response(&response, PROTOCOL_VERSION).unwrap();
        assert_eq!(protocol.deserialize_response(&packet, PROTOCOL_VERSION).unwrap(), response);
    }

    #[test]
    fn garbage_is_rejected() {
        let protocol = BinaryProtocol;
        assert!(matches!(
            protocol.deserialize_request(&[1, 0, 0, 0, 0, 0, 0, 0, 200], PROTOCOL_VERSION),
            Err(ProtocolError::UnknownRequestType(200))
        ));
        assert!(matches!(
            protocol.deserialize_request(&[1, 2], PROTOCOL_VERSION),
            Err(ProtocolError::Malformed(_))
        ));
        assert!(matches!(
            protocol.deserialize_request(&[0; 9], 2),
            Err(ProtocolError::UnsupportedVersion(2))
        ));

        let mut packet = protocol
            .serialize_request(
                &RequestCall {
                    call_id: 1,
                    request: Request::Nop,
                },
                PROTOCOL_VERSION,
            )
            .unwrap()
            .to_vec();
        packet.push(0);
        assert!(matches!(
            protocol.deserialize_request(&packet, PROTOCOL_VERSION),
            Err(ProtocolError::TrailingBytes(1))
        ));
    }
}
