use byteorder::{ByteOrder, LittleEndian};
use std::fmt;

/// Full set of stat fields of a node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MutableStat {
    /// Transaction that created the node.
    pub czxid: i64,
    /// Last transaction that modified the node.
    pub mzxid: i64,
    /// Last transaction that changed the children list.
    pub pzxid: i64,
    /// Creation time in file-time ticks (100ns since 1601-01-01 UTC).
    pub ctime: i64,
    /// Modification time in file-time ticks.
    pub mtime: i64,
    pub version: i32,
    pub cversion: i32,
    pub aversion: i32,
    pub data_length: i32,
    pub num_children: i32,
    pub num_ephemeral_children: i32,
}

impl MutableStat {
    /// Stat of a node created by transaction `zxid` at `time`.
    pub fn new_node(zxid: i64, time: i64, data_length: i32) -> Self {
        MutableStat {
            czxid: zxid,
            mzxid: zxid,
            pzxid: zxid,
            ctime: time,
            mtime: time,
            version: 1,
            cversion: 1,
            aversion: 1,
            data_length,
            num_children: 0,
            num_ephemeral_children: 0,
        }
    }

    /// True when the stat describes a node that has never been modified since creation.
    pub fn is_first_shape(&self) -> bool {
        self.version == 1
            && self.cversion == 1
            && self.aversion == 1
            && self.num_children == 0
            && self.num_ephemeral_children == 0
            && self.ctime == self.mtime
            && self.czxid == self.mzxid
            && self.czxid == self.pzxid
    }

    pub fn incarnation_id(&self, extended: bool) -> IncarnationId {
        IncarnationId::from_stat(self, extended)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("field '{0}' is read-only on a first-version stat")]
pub struct ReadOnlyStat(pub &'static str);

/// Compact stat for a node in its very first version.
///
/// Only the creation zxid, creation time and data length are stored; everything else is implied.
/// Setters refuse any value that would make the stat stop being a first-version stat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirstStat {
    zxid: i64,
    time: i64,
    data_length: i32,
}

impl FirstStat {
    pub fn new(zxid: i64, time: i64, data_length: i32) -> Self {
        FirstStat {
            zxid,
            time,
            data_length,
        }
    }

    pub fn try_from_mutable(stat: &MutableStat) -> Option<Self> {
        if stat.is_first_shape() {
            Some(FirstStat::new(stat.czxid, stat.ctime, stat.data_length))
        } else {
            None
        }
    }

    pub fn czxid(&self) -> i64 {
        self.zxid
    }

    pub fn mzxid(&self) -> i64 {
        self.zxid
    }

    pub fn pzxid(&self) -> i64 {
        self.zxid
    }

    pub fn ctime(&self) -> i64 {
        self.time
    }

    pub fn mtime(&self) -> i64 {
        self.time
    }

    pub fn data_length(&self) -> i32 {
        self.data_length
    }

    pub fn to_mutable(&self) -> MutableStat {
        MutableStat::new_node(self.zxid, self.time, self.data_length)
    }

    pub fn set_data_length(&mut self, data_length: i32) {
        self.data_length = data_length;
    }

    pub fn set_version(&mut self, version: i32) -> Result<(), ReadOnlyStat> {
        Self::require(version == 1, "version")
    }

    pub fn set_cversion(&mut self, cversion: i32) -> Result<(), ReadOnlyStat> {
        Self::require(cversion == 1, "cversion")
    }

    pub fn set_aversion(&mut self, aversion: i32) -> Result<(), ReadOnlyStat> {
        Self::require(aversion == 1, "aversion")
    }

    pub fn set_num_children(&mut self, num_children: i32) -> Result<(), ReadOnlyStat> {
        Self::require(num_children == 0, "num_children")
    }

    pub fn set_mzxid(&mut self, mzxid: i64) -> Result<(), ReadOnlyStat> {
        Self::require(mzxid == self.zxid, "mzxid")
    }

    pub fn set_pzxid(&mut self, pzxid: i64) -> Result<(), ReadOnlyStat> {
        Self::require(pzxid == self.zxid, "pzxid")
    }

    pub fn set_mtime(&mut self, mtime: i64) -> Result<(), ReadOnlyStat> {
        Self::require(mtime == self.time, "mtime")
    }

    fn require(keeps_shape: bool, field: &'static str) -> Result<(), ReadOnlyStat> {
        if keeps_shape {
            Ok(())
        } else {
            Err(ReadOnlyStat(field))
        }
    }
}

impl PartialEq<MutableStat> for FirstStat {
    fn eq(&self, other: &MutableStat) -> bool {
        self.to_mutable() == *other
    }
}

impl PartialEq<FirstStat> for MutableStat {
    fn eq(&self, other: &FirstStat) -> bool {
        other == self
    }
}

/// Stat attached to a tree node, stored compactly while the node is in its first version.
#[derive(Clone, Copy, Debug)]
pub enum Stat {
    Full(MutableStat),
    First(FirstStat),
}

impl Stat {
    pub fn compact(stat: MutableStat) -> Stat {
        match FirstStat::try_from_mutable(&stat) {
            Some(first) => Stat::First(first),
            None => Stat::Full(stat),
        }
    }

    pub fn to_mutable(&self) -> MutableStat {
        match self {
            Stat::Full(stat) => *stat,
            Stat::First(first) => first.to_mutable(),
        }
    }

    /// Applies `mutate` to an expanded copy and re-compacts the result.
    pub fn update<F: FnOnce(&mut MutableStat)>(&mut self, mutate: F) {
        let mut stat = self.to_mutable();
        mutate(&mut stat);
        *self = Stat::compact(stat);
    }

    pub fn is_first(&self) -> bool {
        matches!(self, Stat::First(_))
    }

    pub fn czxid(&self) -> i64 {
        self.to_mutable().czxid
    }

    pub fn mzxid(&self) -> i64 {
        self.to_mutable().mzxid
    }

    pub fn pzxid(&self) -> i64 {
        self.to_mutable().pzxid
    }

    pub fn ctime(&self) -> i64 {
        self.to_mutable().ctime
    }

    pub fn mtime(&self) -> i64 {
        self.to_mutable().mtime
    }

    pub fn version(&self) -> i32 {
        self.to_mutable().version
    }

    pub fn cversion(&self) -> i32 {
        self.to_mutable().cversion
    }

    pub fn aversion(&self) -> i32 {
        self.to_mutable().aversion
    }

    pub fn data_length(&self) -> i32 {
        self.to_mutable().data_length
    }

    pub fn num_children(&self) -> i32 {
        self.to_mutable().num_children
    }

    pub fn num_ephemeral_children(&self) -> i32 {
        self.to_mutable().num_ephemeral_children
    }

    pub fn incarnation_id(&self, extended: bool) -> IncarnationId {
        IncarnationId::from_stat(&self.to_mutable(), extended)
    }
}

impl From<MutableStat> for Stat {
    fn from(stat: MutableStat) -> Self {
        Stat::compact(stat)
    }
}

impl PartialEq for Stat {
    fn eq(&self, other: &Stat) -> bool {
        self.to_mutable() == other.to_mutable()
    }
}

impl Eq for Stat {}

/// 128-bit identifier of a node's content generation, laid out like a little-endian GUID.
///
/// ```text
/// | 0 .. 4  | 4 .. 6 | 6 .. 8 | 8 .. 16 |
/// | version |   b    |   c    |  ctime  |
/// ```
///
/// `b` and `c` are zero unless the id is extended, in which case they fold in `cversion`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IncarnationId([u8; 16]);

impl IncarnationId {
    pub fn from_stat(stat: &MutableStat, extended: bool) -> Self {
        let mut bytes = [0u8; 16];
        LittleEndian::write_i32(&mut bytes[0..4], stat.version);
        if extended {
            let b = ((stat.cversion as u16) >> 2) as i16;
            let c = (stat.cversion % 0xffff) as i16;
            LittleEndian::write_i16(&mut bytes[4..6], b);
            LittleEndian::write_i16(&mut bytes[6..8], c);
        }
        LittleEndian::write_i64(&mut bytes[8..16], stat.ctime);

        IncarnationId(bytes)
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        IncarnationId(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Data version folded into the id.
    pub fn version(&self) -> i32 {
        LittleEndian::read_i32(&self.0[0..4])
    }
}

impl fmt::Debug for IncarnationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-",
            LittleEndian::read_u32(&b[0..4]),
            LittleEndian::read_u16(&b[4..6]),
            LittleEndian::read_u16(&b[6..8])
        )?;
        for byte in &b[8..10] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "-")?;
        for byte in &b[10..16] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_shape() -> MutableStat {
        MutableStat::new_node(42, 132_000_000_000_000_000, 5)
    }

    #[test]
    fn first_shape_compacts() {
        let stat = first_shape();
        let compact = Stat::compact(stat);

        assert!(compact.is_first());
        assert_eq!(compact.to_mutable(), stat);
        match compact {
            Stat::First(first) => assert_eq!(first, stat),
            Stat::Full(_) => panic!("expected first stat"),
        }
    }

    #[test]
    fn other_shapes_stay_full() {
        let mut stat = first_shape();
        stat.mzxid = 43;
        assert!(!Stat::compact(stat).is_first());

        let mut stat = first_shape();
        stat.num_children = 1;
        assert!(!Stat::compact(stat).is_first());

        let mut stat = first_shape();
        stat.mtime += 1;
        assert!(!Stat::compact(stat).is_first());
    }

    #[test]
    fn first_stat_rejects_shape_breaking_writes() {
        let mut first = FirstStat::try_from_mutable(&first_shape()).unwrap();

        assert_eq!(first.set_num_children(1), Err(ReadOnlyStat("num_children")));
        assert_eq!(first.set_version(2), Err(ReadOnlyStat("version")));
        assert_eq!(first.set_mzxid(43), Err(ReadOnlyStat("mzxid")));
        assert_eq!(first.set_mtime(first.ctime() + 1), Err(ReadOnlyStat("mtime")));

        // Writes that keep the shape are accepted.
        assert_eq!(first.set_num_children(0), Ok(()));
        assert_eq!(first.set_mzxid(42), Ok(()));
        first.set_data_length(9);
        assert_eq!(first.data_length(), 9);
    }

    #[test]
    fn update_recompacts() {
        let mut stat = Stat::compact(first_shape());
        stat.update(|s| {
            s.version += 1;
            s.mzxid = 50;
        });
        assert!(!stat.is_first());
        assert_eq!(stat.version(), 2);
        assert_eq!(stat.mzxid(), 50);
    }

    #[test]
    fn equality_ignores_representation() {
        let stat = first_shape();
        assert_eq!(Stat::Full(stat), Stat::compact(stat));
    }

    #[test]
    fn incarnation_id_layout() {
        let mut stat = first_shape();
        stat.version = 7;
        stat.cversion = 0x1234;

        let plain = stat.incarnation_id(false);
        assert_eq!(plain.version(), 7);
        assert_eq!(&plain.as_bytes()[4..8], &[0, 0, 0, 0]);
        assert_eq!(LittleEndian::read_i64(&plain.as_bytes()[8..16]), stat.ctime);

        let extended = stat.incarnation_id(true);
        assert_eq!(extended.version(), 7);
        assert_eq!(LittleEndian::read_i16(&extended.as_bytes()[4..6]), 0x1234 >> 2);
        assert_eq!(LittleEndian::read_i16(&extended.as_bytes()[6..8]), 0x1234);
        assert_ne!(plain, extended);
    }

    #[test]
    fn incarnation_id_tracks_generation() {
        let stat = first_shape();
        let mut modified = stat;
        modified.version += 1;

        assert_eq!(stat.incarnation_id(false), Stat::compact(stat).incarnation_id(false));
        assert_ne!(stat.incarnation_id(false), modified.incarnation_id(false));
    }
}
