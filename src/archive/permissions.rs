//! Decomposes raw archive mode bits into individual permission flags.

/// Read, write, and execute flags for one permission class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Access {
    /// Read permission.
    pub read: bool,
    /// Write permission.
    pub write: bool,
    /// Execute permission.
    pub execute: bool,
}

impl Access {
    const fn from_bits(bits: u32) -> Self {
        Self {
            read: bits & 0o4 != 0,
            write: bits & 0o2 != 0,
            execute: bits & 0o1 != 0,
        }
    }

    const fn bits(self) -> u32 {
        (if self.read { 0o4 } else { 0 })
            | (if self.write { 0o2 } else { 0 })
            | (if self.execute { 0o1 } else { 0 })
    }
}

/// Owner, group, and other access decoded from a POSIX mode.
///
/// Only the low nine bits take part; file-type, set-id, and sticky bits are
/// discarded.
///
/// # Examples
/// ```
/// use reproto_launcher::archive::Permissions;
///
/// let perms = Permissions::from_mode(0o100_754);
/// assert!(perms.owner.execute);
/// assert!(perms.group.read && !perms.group.write);
/// assert!(perms.other.read && !perms.other.execute);
/// assert_eq!(perms.mode(), 0o754);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Permissions {
    /// Access for the owning user.
    pub owner: Access,
    /// Access for the owning group.
    pub group: Access,
    /// Access for everyone else.
    pub other: Access,
}

impl Permissions {
    /// Decodes the nine permission bits of `mode`.
    #[must_use]
    pub const fn from_mode(mode: u32) -> Self {
        Self {
            owner: Access::from_bits(mode >> 6),
            group: Access::from_bits(mode >> 3),
            other: Access::from_bits(mode),
        }
    }

    /// Re-encodes the flags as an octal mode.
    #[must_use]
    pub const fn mode(self) -> u32 {
        (self.owner.bits() << 6) | (self.group.bits() << 3) | self.other.bits()
    }

    /// Returns a copy with execute granted to owner, group, and other.
    #[must_use]
    pub const fn with_execute(mut self) -> Self {
        self.owner.execute = true;
        self.group.execute = true;
        self.other.execute = true;
        self
    }
}
