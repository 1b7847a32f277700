//! Raw rows of the tables consulted while reading assembly identities.
//!
//! Each row type holds heap indices and decoded coded indices exactly as stored; resolving them
//! against the `#Strings` and `#Blob` heaps is left to the reader.

use crate::{
    metadata::tables::{CodedIndex, CodedIndexType, TableId, TableInfo},
    Error::OutOfBounds,
    Result,
};

/// A row type that can be built from the widened column values of its table.
pub trait RowRead: Sized {
    /// The table this row type belongs to
    const TABLE: TableId;

    /// Build a row from its column values.
    ///
    /// # Errors
    /// Returns an error if a column is missing or a coded index is invalid.
    fn from_columns(rid: u32, columns: &[u32], info: &TableInfo) -> Result<Self>;
}

fn column(columns: &[u32], index: usize) -> Result<u32> {
    columns.get(index).copied().ok_or(OutOfBounds)
}

#[allow(clippy::cast_possible_truncation)]
fn column_u16(columns: &[u32], index: usize) -> Result<u16> {
    column(columns, index).map(|value| value as u16)
}

/// `AssemblyRef` flag: the `PublicKeyOrToken` blob holds a full public key.
pub const ASSEMBLY_FLAG_PUBLIC_KEY: u32 = 0x0001;

/// Row of the `Assembly` table (0x20).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRaw {
    /// Row id
    pub rid: u32,
    /// `AssemblyHashAlgorithm` used for file hashes
    pub hash_alg_id: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags`
    pub flags: u32,
    /// `#Blob` index of the public key, 0 when unsigned
    pub public_key: u32,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
}

impl RowRead for AssemblyRaw {
    const TABLE: TableId = TableId::Assembly;

    fn from_columns(rid: u32, columns: &[u32], _info: &TableInfo) -> Result<Self> {
        Ok(AssemblyRaw {
            rid,
            hash_alg_id: column(columns, 0)?,
            major_version: column_u16(columns, 1)?,
            minor_version: column_u16(columns, 2)?,
            build_number: column_u16(columns, 3)?,
            revision_number: column_u16(columns, 4)?,
            flags: column(columns, 5)?,
            public_key: column(columns, 6)?,
            name: column(columns, 7)?,
            culture: column(columns, 8)?,
        })
    }
}

/// Row of the `AssemblyRef` table (0x23).
#[derive(Clone, Debug, PartialEq)]
pub struct AssemblyRefRaw {
    /// Row id
    pub rid: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Build number
    pub build_number: u16,
    /// Revision number
    pub revision_number: u16,
    /// `AssemblyFlags`; see [`ASSEMBLY_FLAG_PUBLIC_KEY`]
    pub flags: u32,
    /// `#Blob` index of the public key or token, 0 when the reference is unsigned
    pub public_key_or_token: u32,
    /// `#Strings` index of the name
    pub name: u32,
    /// `#Strings` index of the culture
    pub culture: u32,
    /// `#Blob` index of the hash value
    pub hash_value: u32,
}

impl RowRead for AssemblyRefRaw {
    const TABLE: TableId = TableId::AssemblyRef;

    fn from_columns(rid: u32, columns: &[u32], _info: &TableInfo) -> Result<Self> {
        Ok(AssemblyRefRaw {
            rid,
            major_version: column_u16(columns, 0)?,
            minor_version: column_u16(columns, 1)?,
            build_number: column_u16(columns, 2)?,
            revision_number: column_u16(columns, 3)?,
            flags: column(columns, 4)?,
            public_key_or_token: column(columns, 5)?,
            name: column(columns, 6)?,
            culture: column(columns, 7)?,
            hash_value: column(columns, 8)?,
        })
    }
}

/// Row of the `CustomAttribute` table (0x0C).
#[derive(Clone, Debug, PartialEq)]
pub struct CustomAttributeRaw {
    /// Row id
    pub rid: u32,
    /// Entity the attribute is attached to
    pub parent: CodedIndex,
    /// Attribute constructor (`MethodDef` or `MemberRef`)
    pub constructor: CodedIndex,
    /// `#Blob` index of the encoded arguments
    pub value: u32,
}

impl RowRead for CustomAttributeRaw {
    const TABLE: TableId = TableId::CustomAttribute;

    fn from_columns(rid: u32, columns: &[u32], info: &TableInfo) -> Result<Self> {
        Ok(CustomAttributeRaw {
            rid,
            parent: info
                .decode_coded_index(column(columns, 0)?, CodedIndexType::HasCustomAttribute)?,
            constructor: info
                .decode_coded_index(column(columns, 1)?, CodedIndexType::CustomAttributeType)?,
            value: column(columns, 2)?,
        })
    }
}

/// Row of the `MemberRef` table (0x0A).
#[derive(Clone, Debug, PartialEq)]
pub struct MemberRefRaw {
    /// Row id
    pub rid: u32,
    /// Declaring type or module
    pub class: CodedIndex,
    /// `#Strings` index of the member name
    pub name: u32,
    /// `#Blob` index of the signature
    pub signature: u32,
}

impl RowRead for MemberRefRaw {
    const TABLE: TableId = TableId::MemberRef;

    fn from_columns(rid: u32, columns: &[u32], info: &TableInfo) -> Result<Self> {
        Ok(MemberRefRaw {
            rid,
            class: info.decode_coded_index(column(columns, 0)?, CodedIndexType::MemberRefParent)?,
            name: column(columns, 1)?,
            signature: column(columns, 2)?,
        })
    }
}

/// Row of the `TypeRef` table (0x01).
#[derive(Clone, Debug, PartialEq)]
pub struct TypeRefRaw {
    /// Row id
    pub rid: u32,
    /// Scope the type is resolved in
    pub resolution_scope: CodedIndex,
    /// `#Strings` index of the type name
    pub type_name: u32,
    /// `#Strings` index of the namespace
    pub type_namespace: u32,
}

impl RowRead for TypeRefRaw {
    const TABLE: TableId = TableId::TypeRef;

    fn from_columns(rid: u32, columns: &[u32], info: &TableInfo) -> Result<Self> {
        Ok(TypeRefRaw {
            rid,
            resolution_scope: info
                .decode_coded_index(column(columns, 0)?, CodedIndexType::ResolutionScope)?,
            type_name: column(columns, 1)?,
            type_namespace: column(columns, 2)?,
        })
    }
}
