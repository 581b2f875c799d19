//! Minimal single-column container used by the `cbs` tool.
//!
//! The column stream itself is container-free: the core needs the element
//! type, row count, and annotation length delivered out of band. This
//! 24-byte preamble carries exactly those, so a column file round-trips
//! through the tool on its own:
//!
//! ```text
//! [ magic "CBS1" : 4 B ][ elem type : 1 B ][ pad : 3 B ]
//! [ total rows : u64 LE ][ annotation len : u32 LE ][ pad : 4 B ]
//! ```
//!
//! The column stream starts at offset 24; the annotation (if any) occupies
//! the final `annotation_len` bytes of the file.

use clap::ValueEnum;

pub const FILE_MAGIC: &[u8; 4] = b"CBS1";

/// Fixed size of the file preamble in bytes.
pub const FILE_HEADER_SIZE: u64 = 24;

/// Element type of the stored column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ElemType {
    I32,
    I64,
    F64,
    Logical,
}

impl ElemType {
    pub fn id(self) -> u8 {
        match self {
            ElemType::I32 => 0,
            ElemType::I64 => 1,
            ElemType::F64 => 2,
            ElemType::Logical => 3,
        }
    }

    pub fn from_id(id: u8) -> anyhow::Result<Self> {
        match id {
            0 => Ok(ElemType::I32),
            1 => Ok(ElemType::I64),
            2 => Ok(ElemType::F64),
            3 => Ok(ElemType::Logical),
            other => anyhow::bail!("unknown element type id {}", other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElemType::I32 => "i32",
            ElemType::I64 => "i64",
            ElemType::F64 => "f64",
            ElemType::Logical => "logical",
        }
    }

    pub fn element_size(self) -> usize {
        match self {
            ElemType::I32 => 4,
            ElemType::I64 | ElemType::F64 => 8,
            ElemType::Logical => 1,
        }
    }
}

/// Decoded representation of the 24-byte file preamble.
#[derive(Debug, Clone, Copy)]
pub struct FileHeader {
    pub elem_type: ElemType,
    pub total_rows: u64,
    pub annotation_len: u32,
}

impl FileHeader {
    /// Serialize to exactly `FILE_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; FILE_HEADER_SIZE as usize] {
        let mut buf = [0u8; FILE_HEADER_SIZE as usize];
        buf[..4].copy_from_slice(FILE_MAGIC);
        buf[4] = self.elem_type.id();
        buf[8..16].copy_from_slice(&self.total_rows.to_le_bytes());
        buf[16..20].copy_from_slice(&self.annotation_len.to_le_bytes());
        buf
    }

    /// Deserialize from `FILE_HEADER_SIZE` bytes, checking the magic.
    pub fn from_bytes(buf: &[u8; FILE_HEADER_SIZE as usize]) -> anyhow::Result<Self> {
        if &buf[..4] != FILE_MAGIC {
            anyhow::bail!("invalid magic bytes — not a CBS column file");
        }
        Ok(Self {
            elem_type: ElemType::from_id(buf[4])?,
            total_rows: u64::from_le_bytes(buf[8..16].try_into()?),
            annotation_len: u32::from_le_bytes(buf[16..20].try_into()?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preamble_roundtrip() {
        let header = FileHeader {
            elem_type: ElemType::F64,
            total_rows: 1_000_000,
            annotation_len: 12,
        };
        let parsed = FileHeader::from_bytes(&header.to_bytes()).unwrap();
        assert_eq!(parsed.elem_type, ElemType::F64);
        assert_eq!(parsed.total_rows, 1_000_000);
        assert_eq!(parsed.annotation_len, 12);
    }

    #[test]
    fn bad_magic_rejected() {
        let mut buf = FileHeader {
            elem_type: ElemType::I32,
            total_rows: 1,
            annotation_len: 0,
        }
        .to_bytes();
        buf[0] = b'X';
        assert!(FileHeader::from_bytes(&buf).is_err());
    }
}
