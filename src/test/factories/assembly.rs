//! Factory for .NET assembly images with a real metadata root.
//!
//! [`AssemblyImageBuilder`] emits the `#~`, `#Strings`, `#GUID` and `#Blob` streams with the
//! `Module`, `TypeRef`, `MemberRef`, `CustomAttribute`, `Assembly` and `AssemblyRef` tables, and
//! wraps them with [`PeImageBuilder`]. All heaps stay small, so every index is 2 bytes wide.

use std::collections::HashMap;

use crate::{
    metadata::{
        customattributes::{INTERNALS_VISIBLE_TO_NAME, INTERNALS_VISIBLE_TO_NAMESPACE},
        tables::{TableId, ASSEMBLY_FLAG_PUBLIC_KEY},
    },
    test::factories::pe::PeImageBuilder,
};

type Version = (u16, u16, u16, u16);

struct ReferenceSpec {
    name: String,
    version: Version,
    flags: u32,
    key_or_token: Option<Vec<u8>>,
}

struct AttributeSpec {
    namespace: String,
    name: String,
    value: String,
}

/// Builds a PE image for one assembly.
pub struct AssemblyImageBuilder {
    name: String,
    version: Version,
    culture: Option<String>,
    public_key: Option<Vec<u8>>,
    references: Vec<ReferenceSpec>,
    attributes: Vec<AttributeSpec>,
    assembly_row: bool,
}

impl AssemblyImageBuilder {
    pub fn new(name: &str, version: Version) -> Self {
        AssemblyImageBuilder {
            name: name.to_string(),
            version,
            culture: None,
            public_key: None,
            references: Vec::new(),
            attributes: Vec::new(),
            assembly_row: true,
        }
    }

    /// Add an `AssemblyRef`, optionally carrying an 8-byte token.
    pub fn reference(mut self, name: &str, version: Version, token: Option<&[u8]>) -> Self {
        self.references.push(ReferenceSpec {
            name: name.to_string(),
            version,
            flags: 0,
            key_or_token: token.map(<[u8]>::to_vec),
        });
        self
    }

    /// Add an `AssemblyRef` carrying the full public key.
    pub fn reference_with_public_key(mut self, name: &str, version: Version, key: &[u8]) -> Self {
        self.references.push(ReferenceSpec {
            name: name.to_string(),
            version,
            flags: ASSEMBLY_FLAG_PUBLIC_KEY,
            key_or_token: Some(key.to_vec()),
        });
        self
    }

    pub fn internals_visible_to(self, value: &str) -> Self {
        self.assembly_attribute(
            INTERNALS_VISIBLE_TO_NAMESPACE,
            INTERNALS_VISIBLE_TO_NAME,
            value,
        )
    }

    /// Add an assembly-level custom attribute with a single string argument.
    pub fn assembly_attribute(mut self, namespace: &str, name: &str, value: &str) -> Self {
        self.attributes.push(AttributeSpec {
            namespace: namespace.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        });
        self
    }

    pub fn public_key(mut self, key: &[u8]) -> Self {
        self.public_key = Some(key.to_vec());
        self
    }

    pub fn culture(mut self, culture: &str) -> Self {
        self.culture = Some(culture.to_string());
        self
    }

    /// Emit a module without an `Assembly` row, like a `.netmodule`.
    pub fn without_assembly_row(mut self) -> Self {
        self.assembly_row = false;
        self
    }

    /// Build the metadata root only.
    pub fn build_metadata(&self) -> Vec<u8> {
        let mut strings = StringHeap::new();
        let mut blobs = BlobHeap::new();
        let mut tables = TableWriter::new();

        // Module
        let module_name = strings.add(&format!("{}.dll", self.name));
        tables.row(TableId::Module, |row| {
            row.u16(0).u16(module_name).u16(1).u16(0).u16(0);
        });

        // One TypeRef + MemberRef (.ctor(string)) per distinct attribute type
        let mut constructors: HashMap<(&str, &str), u16> = HashMap::new();
        for attribute in &self.attributes {
            let key = (attribute.namespace.as_str(), attribute.name.as_str());
            if constructors.contains_key(&key) {
                continue;
            }

            let type_name = strings.add(&attribute.name);
            let type_namespace = strings.add(&attribute.namespace);
            let type_ref = tables.row(TableId::TypeRef, |row| {
                // ResolutionScope: Module row 1
                row.u16(1 << 2).u16(type_name).u16(type_namespace);
            });

            let ctor_name = strings.add(".ctor");
            let signature = blobs.add(&[0x20, 0x01, 0x01, 0x0E]);
            let member_ref = tables.row(TableId::MemberRef, |row| {
                // MemberRefParent: TypeRef
                row.u16((type_ref << 3) | 1).u16(ctor_name).u16(signature);
            });

            constructors.insert(key, member_ref);
        }

        for attribute in &self.attributes {
            let member_ref = constructors[&(attribute.namespace.as_str(), attribute.name.as_str())];
            let value = blobs.add(&attribute_blob(&attribute.value));
            tables.row(TableId::CustomAttribute, |row| {
                // HasCustomAttribute: Assembly row 1; CustomAttributeType: MemberRef
                row.u16((1 << 5) | 14).u16((member_ref << 3) | 3).u16(value);
            });
        }

        if self.assembly_row {
            let public_key = self.public_key.as_deref().map_or(0, |key| blobs.add(key));
            let flags = if self.public_key.is_some() {
                ASSEMBLY_FLAG_PUBLIC_KEY
            } else {
                0
            };
            let name = strings.add(&self.name);
            let culture = self.culture.as_deref().map_or(0, |culture| strings.add(culture));
            let (major, minor, build, revision) = self.version;

            tables.row(TableId::Assembly, |row| {
                row.u32(0x8004)
                    .u16(major)
                    .u16(minor)
                    .u16(build)
                    .u16(revision)
                    .u32(flags)
                    .u16(public_key)
                    .u16(name)
                    .u16(culture);
            });
        }

        for reference in &self.references {
            let key_or_token = reference
                .key_or_token
                .as_deref()
                .map_or(0, |data| blobs.add(data));
            let name = strings.add(&reference.name);
            let (major, minor, build, revision) = reference.version;

            tables.row(TableId::AssemblyRef, |row| {
                row.u16(major)
                    .u16(minor)
                    .u16(build)
                    .u16(revision)
                    .u32(reference.flags)
                    .u16(key_or_token)
                    .u16(name)
                    .u16(0)
                    .u16(0);
            });
        }

        let streams = [
            ("#~", tables.finish()),
            ("#Strings", strings.finish()),
            ("#GUID", vec![0x5A; 16]),
            ("#Blob", blobs.finish()),
        ];

        metadata_root(&streams)
    }

    /// Build the full PE image.
    pub fn build(self) -> Vec<u8> {
        let metadata = self.build_metadata();
        let builder = PeImageBuilder::new(metadata);
        if self.public_key.is_some() {
            builder.with_signature(128).build()
        } else {
            builder.build()
        }
    }
}

fn attribute_blob(value: &str) -> Vec<u8> {
    let mut blob = vec![0x01, 0x00];
    blob.extend_from_slice(&compressed_uint(value.len()));
    blob.extend_from_slice(value.as_bytes());
    blob.extend_from_slice(&[0x00, 0x00]); // no named arguments
    blob
}

fn compressed_uint(value: usize) -> Vec<u8> {
    match value {
        0..=0x7F => vec![value as u8],
        0x80..=0x3FFF => vec![0x80 | (value >> 8) as u8, value as u8],
        _ => vec![
            0xC0 | (value >> 24) as u8,
            (value >> 16) as u8,
            (value >> 8) as u8,
            value as u8,
        ],
    }
}

fn pad4(data: &mut Vec<u8>) {
    while data.len() % 4 != 0 {
        data.push(0);
    }
}

fn metadata_root(streams: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut version = b"v4.0.30319".to_vec();
    version.push(0);
    pad4(&mut version);

    let headers_len: usize = streams
        .iter()
        .map(|(name, _)| 8 + ((name.len() + 4) & !3))
        .sum();

    let mut root = Vec::new();
    root.extend_from_slice(b"BSJB");
    root.extend_from_slice(&1_u16.to_le_bytes());
    root.extend_from_slice(&1_u16.to_le_bytes());
    root.extend_from_slice(&0_u32.to_le_bytes());
    root.extend_from_slice(&(version.len() as u32).to_le_bytes());
    root.extend_from_slice(&version);
    root.extend_from_slice(&0_u16.to_le_bytes());
    root.extend_from_slice(&(streams.len() as u16).to_le_bytes());

    let mut offset = root.len() + headers_len;
    for (name, data) in streams {
        root.extend_from_slice(&(offset as u32).to_le_bytes());
        root.extend_from_slice(&(data.len() as u32).to_le_bytes());
        root.extend_from_slice(name.as_bytes());
        root.push(0);
        pad4(&mut root);
        offset += data.len();
    }

    for (_, data) in streams {
        root.extend_from_slice(data);
    }

    root
}

struct StringHeap {
    data: Vec<u8>,
    offsets: HashMap<String, u16>,
}

impl StringHeap {
    fn new() -> Self {
        StringHeap {
            data: vec![0],
            offsets: HashMap::new(),
        }
    }

    fn add(&mut self, value: &str) -> u16 {
        if let Some(offset) = self.offsets.get(value) {
            return *offset;
        }

        let offset = self.data.len() as u16;
        self.data.extend_from_slice(value.as_bytes());
        self.data.push(0);
        self.offsets.insert(value.to_string(), offset);
        offset
    }

    fn finish(mut self) -> Vec<u8> {
        pad4(&mut self.data);
        self.data
    }
}

struct BlobHeap {
    data: Vec<u8>,
}

impl BlobHeap {
    fn new() -> Self {
        BlobHeap { data: vec![0] }
    }

    fn add(&mut self, value: &[u8]) -> u16 {
        let offset = self.data.len() as u16;
        self.data.extend_from_slice(&compressed_uint(value.len()));
        self.data.extend_from_slice(value);
        offset
    }

    fn finish(mut self) -> Vec<u8> {
        pad4(&mut self.data);
        self.data
    }
}

#[derive(Default)]
struct RowWriter {
    data: Vec<u8>,
}

impl RowWriter {
    fn u16(&mut self, value: u16) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }

    fn u32(&mut self, value: u32) -> &mut Self {
        self.data.extend_from_slice(&value.to_le_bytes());
        self
    }
}

struct TableWriter {
    tables: Vec<(TableId, u32, Vec<u8>)>,
}

impl TableWriter {
    fn new() -> Self {
        TableWriter { tables: Vec::new() }
    }

    /// Append a row and return its 1-based rid.
    fn row(&mut self, table: TableId, fill: impl FnOnce(&mut RowWriter)) -> u16 {
        let mut row = RowWriter::default();
        fill(&mut row);

        let index = match self.tables.iter().position(|(id, _, _)| *id == table) {
            Some(index) => index,
            None => {
                self.tables.push((table, 0, Vec::new()));
                self.tables.len() - 1
            }
        };

        let entry = &mut self.tables[index];
        entry.1 += 1;
        entry.2.extend_from_slice(&row.data);
        entry.1 as u16
    }

    fn finish(mut self) -> Vec<u8> {
        self.tables.sort_by_key(|(id, _, _)| *id);

        let valid = self
            .tables
            .iter()
            .fold(0_u64, |valid, (id, _, _)| valid | (1 << *id as u64));

        let mut data = vec![0x00, 0x00, 0x00, 0x00, 0x02, 0x00, 0x00, 0x01];
        data.extend_from_slice(&valid.to_le_bytes());
        data.extend_from_slice(&0x0000_1600_3301_FA00_u64.to_le_bytes());
        for (_, rows, _) in &self.tables {
            data.extend_from_slice(&rows.to_le_bytes());
        }
        for (_, _, rows) in &self.tables {
            data.extend_from_slice(rows);
        }

        pad4(&mut data);
        data
    }
}
