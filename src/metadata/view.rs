//! Structured view of the signing-relevant metadata of one assembly.
//!
//! [`AssemblyView`] is what the signing engine knows about a component: who it is, whether it
//! already carries a public key, which assemblies it references (and whether those references
//! already embed a token), and which friend assemblies it declares through
//! `InternalsVisibleToAttribute`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use dotsign::metadata::view::AssemblyView;
//! use std::path::Path;
//!
//! let view = AssemblyView::from_file(Path::new("bin/Lib.App.dll"))?;
//! println!("{} signed={}", view.identity_string(), view.is_signed());
//! for reference in view.unsigned_references() {
//!     println!("  needs {}", reference);
//! }
//! # Ok::<(), dotsign::Error>(())
//! ```

use std::path::{Path, PathBuf};

use crate::{
    file::File,
    metadata::{
        cor20header::Cor20Header,
        customattributes::{
            read_string_argument, INTERNALS_VISIBLE_TO_NAME, INTERNALS_VISIBLE_TO_NAMESPACE,
        },
        identity::{AssemblyIdentity, AssemblyVersion, PublicKeyToken},
        root::Root,
        streams::{Blob, Strings, StreamHeader, TablesHeader},
        tables::{
            AssemblyRaw, AssemblyRefRaw, CodedIndex, CustomAttributeRaw, MemberRefRaw, TableId,
            TypeRefRaw, ASSEMBLY_FLAG_PUBLIC_KEY,
        },
    },
    Error::{NotSupported, OutOfBounds},
    Result,
};

/// A reference from one assembly to another, as recorded in the `AssemblyRef` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssemblyReference {
    /// Identity of the referenced assembly; the token is `None` for an unsigned reference
    pub identity: AssemblyIdentity,
}

impl AssemblyReference {
    /// Returns `true` if the reference already embeds a public-key token.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.identity.is_strong_named()
    }

    /// The display name used as identity key.
    #[must_use]
    pub fn identity_string(&self) -> String {
        self.identity.display_name()
    }
}

/// The signing-relevant metadata of one assembly.
#[derive(Clone, Debug)]
pub struct AssemblyView {
    /// Where the assembly was read from
    pub path: PathBuf,
    /// Identity from the `Assembly` table, token derived from the public key if present
    pub identity: AssemblyIdentity,
    /// The public key blob of the `Assembly` row, `None` when unsigned
    pub public_key: Option<Vec<u8>>,
    /// All `AssemblyRef` rows in table order
    pub references: Vec<AssemblyReference>,
    /// Values of assembly-level `InternalsVisibleToAttribute`s in table order
    pub internals_visible_to: Vec<String>,
    /// Runtime version string from the metadata root
    pub runtime_version: String,
    /// Whether the CLI header reserves a strong-name signature directory
    pub has_signature_directory: bool,
}

impl AssemblyView {
    /// Read the view of the assembly at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] or [`crate::Error::Empty`] for files that are not
    /// .NET assemblies, and other errors for damaged ones.
    pub fn from_file(path: &Path) -> Result<AssemblyView> {
        let file = File::from_file(path)?;
        Self::from_pe(path.to_path_buf(), &file)
    }

    /// Read the view of an assembly image held in memory.
    ///
    /// # Errors
    /// See [`AssemblyView::from_file`].
    pub fn from_mem(path: PathBuf, data: Vec<u8>) -> Result<AssemblyView> {
        let file = File::from_mem(data)?;
        Self::from_pe(path, &file)
    }

    fn from_pe(path: PathBuf, file: &File) -> Result<AssemblyView> {
        let (clr_rva, _) = file.clr();
        let clr_offset = file.rva_to_offset(clr_rva)?;
        let cor20 = Cor20Header::read(file.data_slice(clr_offset, 72)?)?;

        let meta_offset = file.rva_to_offset(cor20.meta_data_rva as usize)?;
        let meta = file.data_slice(meta_offset, cor20.meta_data_size as usize)?;
        let root = Root::read(meta)?;

        let tables_header = root
            .tables_stream()
            .ok_or_else(|| malformed_error!("Metadata has no tables stream"))?;
        let tables = TablesHeader::from(stream_data(meta, tables_header)?)?;

        let strings_header = root
            .stream("#Strings")
            .ok_or_else(|| malformed_error!("Metadata has no #Strings heap"))?;
        let strings = Strings::from(stream_data(meta, strings_header)?)?;

        let blobs = match root.stream("#Blob") {
            Some(header) => Some(Blob::from(stream_data(meta, header)?)?),
            None => None,
        };
        let heaps = Heaps { strings, blobs };

        // A module without an Assembly row is not an assembly and cannot be signed.
        if tables.table_row_count(TableId::Assembly) == 0 {
            return Err(NotSupported);
        }

        let assembly = tables.row::<AssemblyRaw>(1)?;
        let public_key = heaps
            .blob(assembly.public_key)?
            .filter(|key| !key.is_empty())
            .map(<[u8]>::to_vec);

        let identity = AssemblyIdentity::new(
            heaps.string(assembly.name)?,
            AssemblyVersion::new(
                assembly.major_version,
                assembly.minor_version,
                assembly.build_number,
                assembly.revision_number,
            ),
            heaps.culture(assembly.culture)?,
            public_key.as_deref().map(PublicKeyToken::from_public_key),
        );

        let references = tables
            .rows::<AssemblyRefRaw>()
            .map(|row| read_reference(&row?, &heaps))
            .collect::<Result<Vec<_>>>()?;

        let internals_visible_to = read_internals_visible_to(&tables, &heaps)?;

        Ok(AssemblyView {
            path,
            identity,
            public_key,
            references,
            internals_visible_to,
            runtime_version: root.version,
            has_signature_directory: cor20.strong_name_signature_rva != 0,
        })
    }

    /// The display name used as identity key.
    #[must_use]
    pub fn identity_string(&self) -> String {
        self.identity.display_name()
    }

    /// Returns `true` if the assembly already carries a public key.
    #[must_use]
    pub fn is_signed(&self) -> bool {
        self.public_key.is_some()
    }

    /// The token of the assembly's own public key, if it has one.
    #[must_use]
    pub fn public_key_token(&self) -> Option<PublicKeyToken> {
        self.identity.public_key_token
    }

    /// Identities of all references that do not embed a public-key token.
    ///
    /// Signed assemblies report none: whatever they reference was resolved when they were signed.
    #[must_use]
    pub fn unsigned_references(&self) -> Vec<String> {
        if self.is_signed() {
            return Vec::new();
        }

        self.references
            .iter()
            .filter(|reference| !reference.is_signed())
            .map(AssemblyReference::identity_string)
            .collect()
    }
}

struct Heaps<'a> {
    strings: Strings<'a>,
    blobs: Option<Blob<'a>>,
}

impl Heaps<'_> {
    fn string(&self, index: u32) -> Result<String> {
        Ok(self.strings.get(index as usize)?.to_string())
    }

    fn culture(&self, index: u32) -> Result<Option<String>> {
        let culture = self.strings.get(index as usize)?;
        Ok((!culture.is_empty()).then(|| culture.to_string()))
    }

    fn blob(&self, index: u32) -> Result<Option<&[u8]>> {
        if index == 0 {
            return Ok(None);
        }

        match &self.blobs {
            Some(blobs) => Ok(Some(blobs.get(index as usize)?)),
            None => Err(malformed_error!(
                "Blob index {} without a #Blob heap",
                index
            )),
        }
    }
}

fn stream_data<'a>(meta: &'a [u8], header: &StreamHeader) -> Result<&'a [u8]> {
    let start = header.offset as usize;
    let end = start + header.size as usize;
    meta.get(start..end).ok_or(OutOfBounds)
}

fn read_reference(row: &AssemblyRefRaw, heaps: &Heaps<'_>) -> Result<AssemblyReference> {
    let token = match heaps.blob(row.public_key_or_token)? {
        Some(data) if !data.is_empty() => {
            if row.flags & ASSEMBLY_FLAG_PUBLIC_KEY != 0 {
                Some(PublicKeyToken::from_public_key(data))
            } else {
                Some(PublicKeyToken::from_slice(data)?)
            }
        }
        _ => None,
    };

    Ok(AssemblyReference {
        identity: AssemblyIdentity::new(
            heaps.string(row.name)?,
            AssemblyVersion::new(
                row.major_version,
                row.minor_version,
                row.build_number,
                row.revision_number,
            ),
            heaps.culture(row.culture)?,
            token,
        ),
    })
}

fn read_internals_visible_to(tables: &TablesHeader<'_>, heaps: &Heaps<'_>) -> Result<Vec<String>> {
    let assembly = CodedIndex::new(TableId::Assembly, 1);
    let mut values = Vec::new();

    for row in tables.rows::<CustomAttributeRaw>() {
        let attribute = row?;
        if attribute.parent != assembly || !is_internals_visible_to(tables, heaps, &attribute)? {
            continue;
        }

        let Some(blob) = heaps.blob(attribute.value)? else {
            continue;
        };

        if let Some(value) = read_string_argument(blob)? {
            values.push(value);
        }
    }

    Ok(values)
}

fn is_internals_visible_to(
    tables: &TablesHeader<'_>,
    heaps: &Heaps<'_>,
    attribute: &CustomAttributeRaw,
) -> Result<bool> {
    if attribute.constructor.tag != TableId::MemberRef {
        return Ok(false);
    }

    let member = tables.row::<MemberRefRaw>(attribute.constructor.row)?;
    if member.class.tag != TableId::TypeRef {
        return Ok(false);
    }

    let type_ref = tables.row::<TypeRefRaw>(member.class.row)?;
    Ok(heaps.strings.get(type_ref.type_name as usize)? == INTERNALS_VISIBLE_TO_NAME
        && heaps.strings.get(type_ref.type_namespace as usize)? == INTERNALS_VISIBLE_TO_NAMESPACE)
}
