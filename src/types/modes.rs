use std::ops::BitOr;

macro_rules! flags {
    ($name:ident) => {
        impl $name {
            pub fn from_bits(bits: i32) -> Self {
                $name(bits)
            }

            pub fn bits(&self) -> i32 {
                self.0
            }

            pub fn contains(&self, other: $name) -> bool {
                self.0 & other.0 == other.0
            }
        }

        impl BitOr for $name {
            type Output = $name;

            fn bitor(self, rhs: $name) -> $name {
                $name(self.0 | rhs.0)
            }
        }
    };
}

/// How a node is created.
//
// 0x2000 0x1000 .... 0x2 0x1
//    ^------------------------- succeed if the node already exists
//           ^------------------ create missing parents
//                         ^---- sequential
//                             ^ ephemeral
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CreateMode(i32);

impl CreateMode {
    pub const PERSISTENT: CreateMode = CreateMode(0);
    pub const EPHEMERAL: CreateMode = CreateMode(0x1);
    pub const SEQUENTIAL: CreateMode = CreateMode(0x2);
    pub const ALLOW_PATH_CREATION: CreateMode = CreateMode(0x1000);
    pub const SUCCESS_EVEN_IF_NODE_EXISTS: CreateMode = CreateMode(0x2000);

    pub fn is_ephemeral(&self) -> bool {
        self.contains(CreateMode::EPHEMERAL)
    }

    pub fn is_sequential(&self) -> bool {
        self.contains(CreateMode::SEQUENTIAL)
    }

    pub fn allows_path_creation(&self) -> bool {
        self.contains(CreateMode::ALLOW_PATH_CREATION)
    }

    pub fn succeeds_if_exists(&self) -> bool {
        self.contains(CreateMode::SUCCESS_EVEN_IF_NODE_EXISTS)
    }

    /// Ephemeral nodes cannot pull persistent parents into existence.
    pub fn is_valid(&self) -> bool {
        !(self.is_ephemeral() && self.allows_path_creation())
    }
}

flags!(CreateMode);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeleteMode(i32);

impl DeleteMode {
    pub const NONE: DeleteMode = DeleteMode(0);
    pub const CASCADE: DeleteMode = DeleteMode(0x1);
    pub const SUCCESS_EVEN_IF_NODE_DOESNT_EXIST: DeleteMode = DeleteMode(0x2);

    pub fn is_cascade(&self) -> bool {
        self.contains(DeleteMode::CASCADE)
    }

    pub fn succeeds_if_missing(&self) -> bool {
        self.contains(DeleteMode::SUCCESS_EVEN_IF_NODE_DOESNT_EXIST)
    }
}

flags!(DeleteMode);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MoveMode(i32);

impl MoveMode {
    pub const NONE: MoveMode = MoveMode(0);
    pub const ONLY_IF_SOURCE_PATH_IS_EMPTY: MoveMode = MoveMode(0x2);
    pub const ALLOW_PATH_CREATION: MoveMode = MoveMode(0x1000);

    pub fn requires_empty_source(&self) -> bool {
        self.contains(MoveMode::ONLY_IF_SOURCE_PATH_IS_EMPTY)
    }

    pub fn allows_path_creation(&self) -> bool {
        self.contains(MoveMode::ALLOW_PATH_CREATION)
    }
}

flags!(MoveMode);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ephemeral_with_path_creation_is_rejected() {
        assert!(CreateMode::EPHEMERAL.is_valid());
        assert!((CreateMode::SEQUENTIAL | CreateMode::ALLOW_PATH_CREATION).is_valid());
        assert!(!(CreateMode::EPHEMERAL | CreateMode::ALLOW_PATH_CREATION).is_valid());
    }

    #[test]
    fn flags_combine() {
        let mode = CreateMode::EPHEMERAL | CreateMode::SEQUENTIAL;
        assert_eq!(mode.bits(), 3);
        assert!(mode.is_ephemeral() && mode.is_sequential());
        assert!(!mode.succeeds_if_exists());
    }
}
