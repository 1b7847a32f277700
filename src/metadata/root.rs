//! Metadata root (`BSJB` header), ECMA-335 II.24.2.1.

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// Magic signature of the metadata root, `BSJB`.
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// The metadata root and the headers of all streams it lists.
#[derive(Clone, Debug)]
pub struct Root {
    /// Magic signature, always [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version
    pub major_version: u16,
    /// Minor version
    pub minor_version: u16,
    /// Runtime version string, e.g. `v4.0.30319`
    pub version: String,
    /// Reserved flags
    pub flags: u16,
    /// Stream headers in declaration order
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Parse the metadata root from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if any header or stream extends past `data`, or
    /// [`crate::Error::Malformed`] for a bad signature or stream table.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let version_string_length = read_le_at::<u32>(data, &mut 12)? as usize;
        let Some(version_end) = version_string_length.checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                version_string_length
            ));
        };
        if version_end + 4 > data.len() {
            return Err(OutOfBounds);
        }

        let version_bytes = &data[16..version_end];
        let version_len = version_bytes
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(version_bytes.len());
        let version = String::from_utf8_lossy(&version_bytes[..version_len]).into_owned();

        let flags = read_le_at::<u16>(data, &mut { version_end })?;
        let stream_count = read_le_at::<u16>(data, &mut { version_end + 2 })?;
        if stream_count == 0 || usize::from(stream_count) > 8 {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        let mut stream_offset = version_end + 4;
        for _ in 0..stream_count {
            let Some(header_data) = data.get(stream_offset..) else {
                return Err(OutOfBounds);
            };

            let new_stream = StreamHeader::from(header_data)?;
            let Some(stream_end) = new_stream.offset.checked_add(new_stream.size) else {
                return Err(malformed_error!(
                    "Stream offset and size cause integer overflow - {} + {}",
                    new_stream.offset,
                    new_stream.size
                ));
            };
            if stream_end as usize > data.len() {
                return Err(OutOfBounds);
            }

            if stream_headers
                .iter()
                .any(|existing: &StreamHeader| existing.name == new_stream.name)
            {
                return Err(malformed_error!("Duplicate stream - {}", new_stream.name));
            }

            stream_offset += new_stream.encoded_len();
            stream_headers.push(new_stream);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            version,
            flags,
            stream_headers,
        })
    }

    /// Returns the header of the stream called `name`.
    #[must_use]
    pub fn stream(&self, name: &str) -> Option<&StreamHeader> {
        self.stream_headers.iter().find(|stream| stream.name == name)
    }

    /// Returns the tables stream, compressed (`#~`) or uncompressed (`#-`).
    #[must_use]
    pub fn tables_stream(&self) -> Option<&StreamHeader> {
        self.stream("#~").or_else(|| self.stream("#-"))
    }
}
