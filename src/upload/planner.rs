//! Part planner
//!
//! Splits a source of known length into contiguous, 1-based parts.

use super::UploadError;

/// Smallest part the server accepts without complaint (except the last one)
pub const MIN_PART_SIZE: u64 = 5 * 1024 * 1024;

/// Maximum parts allowed in one multipart upload
pub const MAX_PARTS: usize = 10_000;

/// Byte range of one part
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartRange {
    pub number: u32,
    pub offset: u64,
    pub length: u64,
}

/// Part layout for one source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartPlan {
    total_length: u64,
    parts: Vec<PartRange>,
}

impl PartPlan {
    /// Parts of `part_size` bytes; the last one holds whatever remains.
    pub fn with_part_size(total_length: u64, part_size: u64) -> Result<Self, UploadError> {
        if part_size == 0 {
            return Err(UploadError::Validation("part size must be at least 1 byte".into()));
        }

        let count = total_length.div_ceil(part_size);
        Self::build(total_length, part_size, count)
    }

    /// `part_count` equal parts; the last one also absorbs the remainder.
    ///
    /// The count is reduced when the source has fewer bytes than requested
    /// parts, so no part is ever empty.
    pub fn with_part_count(total_length: u64, part_count: u32) -> Result<Self, UploadError> {
        if part_count == 0 {
            return Err(UploadError::Validation("part count must be at least 1".into()));
        }
        if total_length == 0 {
            return Self::build(0, 1, 0);
        }

        let count = u64::from(part_count).min(total_length);
        Self::build(total_length, total_length / count, count)
    }

    fn build(total_length: u64, chunk: u64, count: u64) -> Result<Self, UploadError> {
        if count > MAX_PARTS as u64 {
            return Err(UploadError::TooManyParts {
                planned: count,
                max: MAX_PARTS,
            });
        }
        if count > 1 && chunk < MIN_PART_SIZE {
            tracing::warn!(
                part_size = chunk,
                parts = count,
                "Part size is below 5MB; the server may reject the upload"
            );
        }

        let parts = (0..count)
            .map(|index| {
                let offset = index * chunk;
                let length = if index + 1 == count {
                    total_length - offset
                } else {
                    chunk
                };
                PartRange {
                    number: index as u32 + 1,
                    offset,
                    length,
                }
            })
            .collect();

        Ok(Self {
            total_length,
            parts,
        })
    }

    pub fn parts(&self) -> &[PartRange] {
        &self.parts
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub fn total_length(&self) -> u64 {
        self.total_length
    }

    pub fn contains(&self, part_number: u32) -> bool {
        part_number >= 1 && part_number as usize <= self.parts.len()
    }

    pub fn get(&self, part_number: u32) -> Option<&PartRange> {
        if self.contains(part_number) {
            self.parts.get(part_number as usize - 1)
        } else {
            None
        }
    }
}
