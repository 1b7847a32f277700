//! Factory for minimal PE32 images carrying a CLI header.
//!
//! Layout: DOS header (`e_lfanew` = 0x80), PE signature, COFF header, a 224-byte PE32 optional
//! header and a single `.text` section at file offset 0x200 / RVA 0x2000. The section starts
//! with the 72-byte CLI header, followed by the metadata and an optional strong-name signature
//! area. The image is not padded to the file alignment, so the metadata ends the file.

const PE_OFFSET: usize = 0x80;
const SECTION_RVA: u32 = 0x2000;
const SECTION_FILE_OFFSET: u32 = 0x200;
const CLI_HEADER_SIZE: u32 = 72;

/// Builds a PE32 image around a metadata blob.
pub struct PeImageBuilder {
    metadata: Vec<u8>,
    cli_header: bool,
    signature_size: u32,
}

impl PeImageBuilder {
    /// Wrap `metadata`, which is placed right after the CLI header.
    pub fn new(metadata: Vec<u8>) -> Self {
        PeImageBuilder {
            metadata,
            cli_header: true,
            signature_size: 0,
        }
    }

    /// Leave the CLI header data directory empty, producing a native image.
    pub fn without_cli_header(mut self) -> Self {
        self.cli_header = false;
        self
    }

    /// Reserve a strong-name signature area of `size` bytes and flag the image as signed.
    pub fn with_signature(mut self, size: u32) -> Self {
        self.signature_size = size;
        self
    }

    /// Produce the image bytes.
    pub fn build(self) -> Vec<u8> {
        let metadata_len = self.metadata.len() as u32;
        let metadata_rva = SECTION_RVA + CLI_HEADER_SIZE;
        let signature_rva = metadata_rva + ((metadata_len + 3) & !3);
        let section_size = if self.signature_size > 0 {
            signature_rva - SECTION_RVA + self.signature_size
        } else {
            CLI_HEADER_SIZE + metadata_len
        };
        let size_of_image = SECTION_RVA + ((section_size + 0x1FFF) & !0x1FFF);

        let mut image = vec![0_u8; SECTION_FILE_OFFSET as usize];

        // DOS header
        image[0..2].copy_from_slice(b"MZ");
        image[0x3C..0x40].copy_from_slice(&(PE_OFFSET as u32).to_le_bytes());

        // PE signature + COFF header
        let mut pe = Vec::with_capacity(248 + 40);
        pe.extend_from_slice(b"PE\0\0");
        pe.extend_from_slice(&0x014C_u16.to_le_bytes()); // machine: i386
        pe.extend_from_slice(&1_u16.to_le_bytes()); // number of sections
        pe.extend_from_slice(&0_u32.to_le_bytes()); // timestamp
        pe.extend_from_slice(&0_u32.to_le_bytes()); // symbol table
        pe.extend_from_slice(&0_u32.to_le_bytes()); // symbol count
        pe.extend_from_slice(&224_u16.to_le_bytes()); // optional header size
        pe.extend_from_slice(&0x2102_u16.to_le_bytes()); // EXECUTABLE | 32BIT | DLL

        // Optional header, standard fields
        pe.extend_from_slice(&0x010B_u16.to_le_bytes()); // PE32
        pe.extend_from_slice(&[11, 0]); // linker version
        pe.extend_from_slice(&section_size.to_le_bytes()); // size of code
        pe.extend_from_slice(&0_u32.to_le_bytes()); // initialized data
        pe.extend_from_slice(&0_u32.to_le_bytes()); // uninitialized data
        pe.extend_from_slice(&0_u32.to_le_bytes()); // entry point
        pe.extend_from_slice(&SECTION_RVA.to_le_bytes()); // base of code
        pe.extend_from_slice(&0_u32.to_le_bytes()); // base of data

        // Optional header, windows fields
        pe.extend_from_slice(&0x1000_0000_u32.to_le_bytes()); // image base
        pe.extend_from_slice(&0x2000_u32.to_le_bytes()); // section alignment
        pe.extend_from_slice(&0x200_u32.to_le_bytes()); // file alignment
        pe.extend_from_slice(&4_u16.to_le_bytes()); // os major
        pe.extend_from_slice(&0_u16.to_le_bytes()); // os minor
        pe.extend_from_slice(&0_u16.to_le_bytes()); // image major
        pe.extend_from_slice(&0_u16.to_le_bytes()); // image minor
        pe.extend_from_slice(&4_u16.to_le_bytes()); // subsystem major
        pe.extend_from_slice(&0_u16.to_le_bytes()); // subsystem minor
        pe.extend_from_slice(&0_u32.to_le_bytes()); // win32 version
        pe.extend_from_slice(&size_of_image.to_le_bytes());
        pe.extend_from_slice(&SECTION_FILE_OFFSET.to_le_bytes()); // size of headers
        pe.extend_from_slice(&0_u32.to_le_bytes()); // checksum
        pe.extend_from_slice(&3_u16.to_le_bytes()); // subsystem: console
        pe.extend_from_slice(&0x8540_u16.to_le_bytes()); // dll characteristics
        pe.extend_from_slice(&0x0010_0000_u32.to_le_bytes()); // stack reserve
        pe.extend_from_slice(&0x1000_u32.to_le_bytes()); // stack commit
        pe.extend_from_slice(&0x0010_0000_u32.to_le_bytes()); // heap reserve
        pe.extend_from_slice(&0x1000_u32.to_le_bytes()); // heap commit
        pe.extend_from_slice(&0_u32.to_le_bytes()); // loader flags
        pe.extend_from_slice(&16_u32.to_le_bytes()); // data directory count

        for index in 0..16 {
            if index == 14 && self.cli_header {
                pe.extend_from_slice(&SECTION_RVA.to_le_bytes());
                pe.extend_from_slice(&CLI_HEADER_SIZE.to_le_bytes());
            } else {
                pe.extend_from_slice(&[0; 8]);
            }
        }

        // Section table
        pe.extend_from_slice(b".text\0\0\0");
        pe.extend_from_slice(&section_size.to_le_bytes()); // virtual size
        pe.extend_from_slice(&SECTION_RVA.to_le_bytes());
        pe.extend_from_slice(&section_size.to_le_bytes()); // raw size
        pe.extend_from_slice(&SECTION_FILE_OFFSET.to_le_bytes());
        pe.extend_from_slice(&[0; 12]); // relocations, line numbers, counts
        pe.extend_from_slice(&0x6000_0020_u32.to_le_bytes()); // CODE | EXECUTE | READ

        image[PE_OFFSET..PE_OFFSET + pe.len()].copy_from_slice(&pe);

        // CLI header
        let flags: u32 = if self.signature_size > 0 { 0x9 } else { 0x1 };
        let (sn_rva, sn_size) = if self.signature_size > 0 {
            (signature_rva, self.signature_size)
        } else {
            (0, 0)
        };

        image.extend_from_slice(&CLI_HEADER_SIZE.to_le_bytes());
        image.extend_from_slice(&2_u16.to_le_bytes());
        image.extend_from_slice(&5_u16.to_le_bytes());
        image.extend_from_slice(&metadata_rva.to_le_bytes());
        image.extend_from_slice(&metadata_len.to_le_bytes());
        image.extend_from_slice(&flags.to_le_bytes());
        image.extend_from_slice(&0_u32.to_le_bytes()); // entry point token
        image.extend_from_slice(&[0; 8]); // resources
        image.extend_from_slice(&sn_rva.to_le_bytes());
        image.extend_from_slice(&sn_size.to_le_bytes());
        image.extend_from_slice(&[0; 32]); // code manager, vtable fixups, eat jumps, native header

        image.extend_from_slice(&self.metadata);

        if self.signature_size > 0 {
            let padded = SECTION_FILE_OFFSET as usize + (signature_rva - SECTION_RVA) as usize;
            image.resize(padded, 0);
            image.resize(padded + self.signature_size as usize, 0);
        }

        image
    }
}
