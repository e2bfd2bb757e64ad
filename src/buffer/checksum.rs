//! Checksum: rolling CRC-32 plus byte count over a region's own content.

/// Marks a nested region's name in the folded stream.
const NAME_TAG: u8 = 0x1D;

/// Order-sensitive fingerprint of the bytes folded into a buffer.
///
/// Two checksums are equal only if both the CRC and the byte count match.
/// This is a probabilistic equality: collisions are possible and accepted.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Checksum {
    crc: u32,
    bytes: u64,
}

impl Checksum {
    /// The checksum of an empty region.
    pub const ZERO: Self = Self { crc: 0, bytes: 0 };

    /// Fold `data` into the running checksum.
    #[inline]
    pub fn fold(&mut self, data: &[u8]) {
        let mut hasher = crc32fast::Hasher::new_with_initial(self.crc);
        hasher.update(data);
        self.crc = hasher.finalize();
        self.bytes += data.len() as u64;
    }

    /// Fold the name of a nested region, framed by a tag and its length so
    /// it cannot run together with the surrounding text.
    pub fn fold_name(&mut self, name: &str) {
        let mut frame = Vec::with_capacity(name.len() + 9);
        Self::name_frame(name, &mut frame);
        self.fold(&frame);
    }

    /// Append the bytes [`fold_name`](Self::fold_name) folds for `name`.
    pub fn name_frame(name: &str, out: &mut Vec<u8>) {
        let len = u64::try_from(name.len()).unwrap_or(u64::MAX);
        out.push(NAME_TAG);
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
    }

    /// Fold another checksum's value into this one.
    pub fn fold_checksum(&mut self, other: Self) {
        self.fold(&other.crc.to_le_bytes());
        self.fold(&other.bytes.to_le_bytes());
    }

    /// The CRC-32 of everything folded so far.
    #[inline]
    pub const fn crc(&self) -> u32 {
        self.crc
    }

    /// Number of bytes folded so far.
    #[inline]
    pub const fn byte_count(&self) -> u64 {
        self.bytes
    }
}

impl std::fmt::Debug for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:08x}/{}", self.crc, self.bytes)
    }
}
