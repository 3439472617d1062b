//! Region decoding and the canonical placeholder contract.
//!
//! A canonical series record stores a zero where a concrete one stores the
//! location of the run. Canonical forms share the instance layout of every
//! instantiation they stand for, so the runtime recovers the location of the
//! i-th canonical series from the i-th run of the instantiation's own
//! reference bitmap, relative to that instantiation's live static base.
//! [`resolve_canonical_offsets`] computes those offsets.

use super::{series, REGION_HEADER_SIZE, SERIES_RECORD_SIZE};
use crate::core::RegionReadError;
use crate::layout::ReferenceBitmap;

/// A decoded series record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeriesRecord {
    /// Offset of the record within the region.
    pub position: usize,
    pub slot_count: u32,
    /// Raw contents of the location field before relocation.
    pub location: u32,
}

impl SeriesRecord {
    /// Offset of the location field within the region.
    pub fn location_position(&self) -> usize {
        self.position + 4
    }
}

/// Reader over the bytes of one emitted region.
#[derive(Debug, Clone, Copy)]
pub struct RegionReader<'d> {
    data: &'d [u8],
    series_count: u32,
}

impl<'d> RegionReader<'d> {
    pub fn new(data: &'d [u8]) -> Result<Self, RegionReadError> {
        if data.len() < REGION_HEADER_SIZE {
            return Err(RegionReadError::MissingHeader { len: data.len() });
        }
        let series_count = read_u32(data, 0);
        let expected = REGION_HEADER_SIZE + series_count as usize * SERIES_RECORD_SIZE;
        if data.len() != expected {
            return Err(RegionReadError::SizeMismatch {
                series: series_count,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { data, series_count })
    }

    pub fn series_count(&self) -> u32 {
        self.series_count
    }

    pub fn records(&self) -> impl Iterator<Item = SeriesRecord> + 'd {
        let data = self.data;
        (0..self.series_count as usize).map(move |i| {
            let position = REGION_HEADER_SIZE + i * SERIES_RECORD_SIZE;
            SeriesRecord {
                position,
                slot_count: read_u32(data, position),
                location: read_u32(data, position + 4),
            }
        })
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Byte offsets, relative to an instantiation's static base, of the series a
/// canonical descriptor stands for, in record order.
pub fn resolve_canonical_offsets(bitmap: &ReferenceBitmap, pointer_size: usize) -> Vec<usize> {
    series(bitmap)
        .map(|run| run.start_offset(pointer_size))
        .collect()
}
