//! Tables stream (`#~` or `#-`), ECMA-335 II.24.2.6.

use std::sync::Arc;

use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::read_le,
    metadata::tables::{RowRead, TableId, TableInfo, TableInfoRef},
    Error::OutOfBounds,
    Result,
};

/// Heap-size flag: an extra 4-byte value follows the row counts.
const HEAP_FLAG_EXTRA_DATA: u8 = 0x40;

/// Parsed header of the tables stream, with the offset of every present table.
pub struct TablesHeader<'a> {
    /// Major version of the table schema
    pub major_version: u8,
    /// Minor version of the table schema
    pub minor_version: u8,
    /// Bit vector of present tables
    pub valid: u64,
    /// Bit vector of sorted tables
    pub sorted: u64,
    /// Row counts and index widths
    pub info: TableInfoRef,
    data: &'a [u8],
    table_offsets: Vec<usize>,
}

impl<'a> TablesHeader<'a> {
    /// Parse the tables stream.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the header or any table extends past the stream.
    pub fn from(data: &'a [u8]) -> Result<TablesHeader<'a>> {
        if data.len() < 24 {
            return Err(OutOfBounds);
        }

        let valid = read_le::<u64>(&data[8..])?;
        let sorted = read_le::<u64>(&data[16..])?;
        let heap_sizes = read_le::<u8>(&data[6..])?;
        let info = TableInfo::new(data, valid)?;

        let mut offset = 24 + valid.count_ones() as usize * 4;
        if heap_sizes & HEAP_FLAG_EXTRA_DATA != 0 {
            offset += 4;
        }

        let mut table_offsets = vec![0; TableId::COUNT];
        for table in TableId::iter() {
            table_offsets[table as usize] = offset;

            let rows = info.get(table).rows as usize;
            let Some(size) = rows.checked_mul(info.row_size(table)) else {
                return Err(malformed_error!("Table {:?} size overflows", table));
            };

            offset = offset.checked_add(size).ok_or(OutOfBounds)?;
            if offset > data.len() {
                return Err(OutOfBounds);
            }
        }

        Ok(TablesHeader {
            major_version: read_le::<u8>(&data[4..])?,
            minor_version: read_le::<u8>(&data[5..])?,
            valid,
            sorted,
            info: Arc::new(info),
            data,
            table_offsets,
        })
    }

    /// Returns the number of rows in `table`.
    #[must_use]
    pub fn table_row_count(&self, table: TableId) -> u32 {
        self.info.get(table).rows
    }

    /// Read the row `rid` (1-based) of the table of `T`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `rid` is 0 or past the end of the table.
    pub fn row<T: RowRead>(&self, rid: u32) -> Result<T> {
        if rid == 0 || rid > self.table_row_count(T::TABLE) {
            return Err(OutOfBounds);
        }

        let row_size = self.info.row_size(T::TABLE);
        let mut offset = self.table_offsets[T::TABLE as usize] + (rid as usize - 1) * row_size;
        let columns = self.info.read_columns(T::TABLE, self.data, &mut offset)?;

        T::from_columns(rid, &columns, &self.info)
    }

    /// Iterate over all rows of the table of `T`.
    pub fn rows<T: RowRead>(&self) -> impl Iterator<Item = Result<T>> + '_ {
        (1..=self.table_row_count(T::TABLE)).map(move |rid| self.row::<T>(rid))
    }
}
