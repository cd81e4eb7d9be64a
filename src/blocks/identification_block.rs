// identification_block.rs
use super::ID_BLOCK_SIZE;
use crate::{
    Error, Result,
    blocks::common::{read_u16, validate_buffer_size},
};

/// Identifier of a finalized file.
pub const FINALIZED_ID: &str = "MDF     ";
/// Identifier of a file whose writer did not finish.
pub const UNFINALIZED_ID: &str = "UnFinMF ";

/// Identification Block - file format identifier at the start of every MDF file.
///
/// The identification block is always located at file offset 0 and identifies
/// the file as an MDF file, along with version information.
#[derive(Debug, Clone)]
pub struct IdentificationBlock {
    /// File identifier string ("MDF     " or "UnFinMF ").
    pub file_id: String,
    /// Format version string (e.g., "4.10    ").
    pub format_version: String,
    /// Program identifier string (tool that created the file).
    pub program_id: String,
    /// Numeric version (e.g., 410 for version 4.10).
    pub version_number: u16,
    /// Standard unfinalized flags (indicates incomplete sections).
    pub unfinalized_flags: u16,
    /// Custom unfinalized flags (vendor-specific).
    pub custom_flags: u16,
}

impl IdentificationBlock {
    /// Parses the 64-byte identification block.
    ///
    /// # Layout
    /// - File identifier: 8 bytes
    /// - Version identifier: 8 bytes
    /// - Program identifier: 8 bytes
    /// - Reserved: 4 bytes
    /// - Version number: 2 bytes at offset 28
    /// - Reserved: 30 bytes
    /// - Standard flags: 2 bytes at offset 60
    /// - Custom flags: 2 bytes at offset 62
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        validate_buffer_size(bytes, ID_BLOCK_SIZE)?;
        let text = |range: core::ops::Range<usize>| {
            String::from_utf8_lossy(&bytes[range])
                .trim_end_matches('\0')
                .to_string()
        };
        Ok(Self {
            file_id: text(0..8),
            format_version: text(8..16),
            program_id: text(16..24),
            version_number: read_u16(bytes, 28),
            unfinalized_flags: read_u16(bytes, 60),
            custom_flags: read_u16(bytes, 62),
        })
    }

    /// Rejects files that are not MDF or older than version 4.00.
    pub fn validate(&self) -> Result<()> {
        if self.file_id != FINALIZED_ID && self.file_id != UNFINALIZED_ID {
            return Err(Error::FileIdentifierError(self.file_id.clone()));
        }
        if self.version_number < 400 {
            return Err(Error::FileVersioningError(self.format_version.clone()));
        }
        Ok(())
    }

    pub fn is_finalized(&self) -> bool {
        self.file_id == FINALIZED_ID
    }
}
