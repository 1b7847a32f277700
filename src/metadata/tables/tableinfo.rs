use std::sync::Arc;
use strum::{EnumCount, IntoEnumIterator};

use crate::{
    file::io::{read_le, read_le_at},
    metadata::tables::{CodedIndex, CodedIndexType, Column, TableId},
    Error::OutOfBounds,
    Result,
};

/// Row count of a table and the width of indexes into it.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub struct TableRowInfo {
    /// The count of rows in this table
    pub rows: u32,
    /// Number of bits required to represent any valid row index
    pub bits: u8,
}

impl TableRowInfo {
    /// Creates a new `TableRowInfo` for a table with `rows` rows.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(rows: u32) -> Self {
        let bits = if rows == 0 {
            1
        } else {
            (32 - rows.leading_zeros()) as u8
        };

        Self { rows, bits }
    }
}

/// Row counts and index widths of all tables in one image.
#[derive(Clone, Default, Debug)]
pub struct TableInfo {
    rows: Vec<TableRowInfo>,
    coded_indexes: Vec<u8>,
    is_large_index_str: bool,
    is_large_index_guid: bool,
    is_large_index_blob: bool,
}

/// Shared reference to a [`TableInfo`]
pub type TableInfoRef = Arc<TableInfo>;

impl TableInfo {
    /// Parse row counts from a tables stream.
    ///
    /// `data` starts at the tables stream header; row counts follow the 24-byte header, one
    /// `u32` per bit set in `valid_bitvec`. Counts of tables this crate has no schema for are
    /// consumed but not recorded; such tables always follow the ones that are read.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row counts extend past `data`.
    pub fn new(data: &[u8], valid_bitvec: u64) -> Result<Self> {
        let mut rows = vec![TableRowInfo::default(); TableId::COUNT];
        let mut next_row_offset = 24;

        for table_index in 0..64_usize {
            if (valid_bitvec & (1 << table_index)) == 0 {
                continue;
            }

            let row_count = read_le_at::<u32>(data, &mut next_row_offset)?;
            if let Some(info) = rows.get_mut(table_index) {
                *info = TableRowInfo::new(row_count);
            }
        }

        let heap_size_flags = read_le::<u8>(data.get(6..).ok_or(OutOfBounds)?)?;
        let mut table_info = TableInfo {
            rows,
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: heap_size_flags & 1 == 1,
            is_large_index_guid: heap_size_flags & 2 == 2,
            is_large_index_blob: heap_size_flags & 4 == 4,
        };

        table_info.calculate_coded_index_bits();

        Ok(table_info)
    }

    #[cfg(test)]
    /// Special constructor for unit-tests
    ///
    /// ## Arguments
    /// * 'valid_tables'    - (table_id, row_count) of the present tables
    /// * 'large_str'       - Specify if the #Strings heap indexes are 4 or 2 bytes
    /// * 'large_blob'      - Specify if the #Blob heap indexes are 4 or 2 bytes
    /// * 'large_guid'      - Specify if the #GUID heap indexes are 4 or 2 bytes
    pub fn new_test(
        valid_tables: &[(TableId, u32)],
        large_str: bool,
        large_blob: bool,
        large_guid: bool,
    ) -> Self {
        let mut table_info = TableInfo {
            rows: vec![TableRowInfo::default(); TableId::COUNT],
            coded_indexes: vec![0; CodedIndexType::COUNT],
            is_large_index_str: large_str,
            is_large_index_guid: large_guid,
            is_large_index_blob: large_blob,
        };

        for valid_table in valid_tables {
            table_info.rows[valid_table.0 as usize] = TableRowInfo::new(valid_table.1);
        }

        table_info.calculate_coded_index_bits();
        table_info
    }

    /// Decodes a coded index value into its table and row.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the tag is not valid for `coded_index_type`.
    pub fn decode_coded_index(
        &self,
        value: u32,
        coded_index_type: CodedIndexType,
    ) -> Result<CodedIndex> {
        let tables = coded_index_type.tables();
        let tag_bits = coded_index_type.tag_bits();
        let tag_mask = (1 << tag_bits) - 1;

        let tag = value & tag_mask;
        let row = value >> tag_bits;

        let Some(table) = tables.get(tag as usize) else {
            return Err(OutOfBounds);
        };

        Ok(CodedIndex::new(*table, row))
    }

    /// Returns the row information of `table`.
    #[must_use]
    pub fn get(&self, table: TableId) -> &TableRowInfo {
        &self.rows[table as usize]
    }

    /// Indicates the size of indexes referring into the `#Strings` heap.
    #[must_use]
    pub fn is_large_str(&self) -> bool {
        self.is_large_index_str
    }

    /// Indicates the size of indexes referring into the `#GUID` heap.
    #[must_use]
    pub fn is_large_guid(&self) -> bool {
        self.is_large_index_guid
    }

    /// Indicates the size of indexes referring into the `#Blob` heap.
    #[must_use]
    pub fn is_large_blob(&self) -> bool {
        self.is_large_index_blob
    }

    /// Returns the number of bytes of an index into `table_id`.
    #[must_use]
    pub fn table_index_bytes(&self, table_id: TableId) -> u8 {
        if self.rows[table_id as usize].bits > 16 {
            4
        } else {
            2
        }
    }

    /// Returns the cached bit size of a coded index.
    #[must_use]
    pub fn coded_index_bits(&self, coded_index_type: CodedIndexType) -> u8 {
        self.coded_indexes[coded_index_type as usize]
    }

    /// Returns the byte size of a coded index.
    #[must_use]
    pub fn coded_index_bytes(&self, coded_index_type: CodedIndexType) -> u8 {
        if self.coded_indexes[coded_index_type as usize] > 16 {
            4
        } else {
            2
        }
    }

    /// Returns the byte size of one column.
    #[must_use]
    pub fn column_bytes(&self, column: Column) -> u8 {
        let wide = |is_large: bool| if is_large { 4 } else { 2 };

        match column {
            Column::U16 => 2,
            Column::U32 => 4,
            Column::Str => wide(self.is_large_index_str),
            Column::Guid => wide(self.is_large_index_guid),
            Column::Blob => wide(self.is_large_index_blob),
            Column::Table(table) => self.table_index_bytes(table),
            Column::Coded(coded) => self.coded_index_bytes(coded),
        }
    }

    /// Returns the byte size of one row of `table`.
    #[must_use]
    pub fn row_size(&self, table: TableId) -> usize {
        table
            .columns()
            .iter()
            .map(|column| usize::from(self.column_bytes(*column)))
            .sum()
    }

    /// Read all columns of one row, widening each to `u32`.
    ///
    /// Coded indices are returned in their encoded form.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the row extends past `data`.
    pub fn read_columns(&self, table: TableId, data: &[u8], offset: &mut usize) -> Result<Vec<u32>> {
        table
            .columns()
            .iter()
            .map(|column| match self.column_bytes(*column) {
                2 => read_le_at::<u16>(data, offset).map(u32::from),
                _ => read_le_at::<u32>(data, offset),
            })
            .collect()
    }

    fn calculate_coded_index_size(&self, coded_index_type: CodedIndexType) -> u8 {
        let max_bits = coded_index_type
            .tables()
            .iter()
            .map(|table| self.rows[*table as usize].bits)
            .max()
            .unwrap_or(1);

        max_bits + coded_index_type.tag_bits()
    }

    fn calculate_coded_index_bits(&mut self) {
        for coded_index in CodedIndexType::iter() {
            let size = self.calculate_coded_index_size(coded_index);
            self.coded_indexes[coded_index as usize] = size;
        }
    }
}
