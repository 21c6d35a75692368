//! Mapped memory regions.

use std::fmt;

bitflags::bitflags! {
    /// Protection bits, matching the `/proc/<pid>/maps` `rwxp` field.
    pub struct Prot: u8 {
        const EXECUTE = 0b001;
        const WRITE   = 0b010;
        const READ    = 0b100;
    }
}

/// A contiguous mapped range with uniform protection, as delivered by a
/// `Target`'s region iterator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub start: u64,
    pub size: u64,
    pub prot: Prot,
    pub path: String,
}

impl Region {
    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn contains(&self, addr: u64) -> bool {
        self.start <= addr && addr < self.end()
    }

    /// `region.prot & config.prot == config.prot`: every bit requested in
    /// `mask` must be set on this region.
    pub fn matches(&self, mask: Prot) -> bool {
        self.prot & mask == mask
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (size, suffix) = human_size(self.size);
        write!(
            f,
            "{:#x}-{:#x} {:>3}{} {}{}{} {}",
            self.start,
            self.end(),
            size,
            suffix,
            if self.prot.contains(Prot::READ) { 'r' } else { '-' },
            if self.prot.contains(Prot::WRITE) { 'w' } else { '-' },
            if self.prot.contains(Prot::EXECUTE) { 'x' } else { '-' },
            self.path,
        )
    }
}

/// Round up into the smallest unit that fits the size in three digits,
/// matching the original `region_snprint`'s human-readable rounding.
fn human_size(bytes: u64) -> (u64, char) {
    let mut size = bytes;
    for suffix in ['B', 'K', 'M', 'G', 'T', 'P', 'E'] {
        if size < 1000 {
            return (size.max(if bytes == 0 { 0 } else { 1 }), suffix);
        }
        size /= 1024;
    }
    (size, 'Z')
}
