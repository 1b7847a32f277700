//! Collaborators for the integration tests.
//!
//! Components are described by small text manifests instead of PE images:
//!
//! ```text
//! assembly: Lib.App, Version=1.0.0.0
//! signed-with: 3
//! ref: Lib.Core, Version=1.0.0.0
//! ivt: Lib.App.Tests
//! ```
//!
//! Files that do not start with `assembly:` are not components; a `corrupt` line makes the
//! reader fail.

#![allow(dead_code)]

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
    sync::Mutex,
};

use dotsign::prelude::*;

pub const NULL_TOKEN: &str = "Culture=neutral, PublicKeyToken=null";

/// Identity string of an unsigned `name` at version 1.0.0.0.
pub fn identity(name: &str) -> String {
    format!("{name}, Version=1.0.0.0, {NULL_TOKEN}")
}

/// A structurally valid 1024-bit `.snk` blob.
pub fn key_pair(seed: u8) -> Vec<u8> {
    let mut blob = vec![0x07, 0x02, 0x00, 0x00, 0x00, 0x24, 0x00, 0x00];
    blob.extend_from_slice(b"RSA2");
    blob.extend_from_slice(&1024_u32.to_le_bytes());
    blob.extend_from_slice(&65537_u32.to_le_bytes());
    blob.extend((0..128_u32).map(|i| (i as u8).wrapping_mul(13).wrapping_add(seed) | 1));
    blob.extend((0..448_u32).map(|i| (i as u8) ^ seed));
    blob
}

/// The strong-name public key of `key_pair(seed)`.
pub fn public_key(seed: u8) -> Vec<u8> {
    StrongNameKey::from_bytes(&key_pair(seed))
        .unwrap()
        .public_key()
        .to_vec()
}

pub struct ManifestReader;

impl MetadataReader for ManifestReader {
    fn read(&self, path: &Path, _context: &ResolutionContext) -> dotsign::Result<Option<AssemblyView>> {
        let text = fs::read_to_string(path)?;
        let mut lines = text.lines();

        let Some(header) = lines.next().and_then(|line| line.strip_prefix("assembly: ")) else {
            return Ok(None);
        };

        let mut identity = AssemblyIdentity::parse(header)?;
        let mut own_key = None;
        let mut references = Vec::new();
        let mut internals_visible_to = Vec::new();

        for line in lines {
            if line == "corrupt" {
                return Err(Error::Error(format!("{} is corrupt", path.display())));
            } else if let Some(seed) = line.strip_prefix("signed-with: ") {
                let seed: u8 = seed.parse().map_err(|_| Error::Error("bad seed".into()))?;
                let key = public_key(seed);
                identity.public_key_token = Some(PublicKeyToken::from_public_key(&key));
                own_key = Some(key);
            } else if let Some(reference) = line.strip_prefix("ref: ") {
                references.push(AssemblyReference {
                    identity: AssemblyIdentity::parse(reference)?,
                });
            } else if let Some(value) = line.strip_prefix("ivt: ") {
                internals_visible_to.push(value.to_string());
            }
        }

        Ok(Some(AssemblyView {
            path: path.to_path_buf(),
            identity,
            public_key: own_key,
            references,
            internals_visible_to,
            runtime_version: "v4.0.30319".to_string(),
            has_signature_directory: false,
        }))
    }
}

/// Renders the plan as text; records the simple names it was called for.
#[derive(Default)]
pub struct TextWriter {
    calls: Mutex<Vec<String>>,
}

impl TextWriter {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl MetadataWriter for TextWriter {
    fn rewrite(
        &self,
        view: &AssemblyView,
        plan: &RewritePlan,
        key: &StrongNameKey,
    ) -> dotsign::Result<Vec<u8>> {
        self.calls.lock().unwrap().push(view.identity.name.clone());

        let mut text = String::new();
        let signed = view.identity.with_token(key.public_key_token());
        let _ = writeln!(text, "assembly: {}", signed.display_name());
        for reference in &view.references {
            let token = plan
                .token_for(&reference.identity_string())
                .or(reference.identity.public_key_token);
            let rewritten = match token {
                Some(token) => reference.identity.with_token(token),
                None => reference.identity.clone(),
            };
            let _ = writeln!(text, "ref: {}", rewritten.display_name());
        }
        for value in &view.internals_visible_to {
            let fixed = plan
                .visibility
                .iter()
                .find(|fix| &fix.original == value)
                .map_or(value.as_str(), |fix| fix.rewritten.as_str());
            let _ = writeln!(text, "ivt: {fixed}");
        }
        Ok(text.into_bytes())
    }
}

/// Input and output directories of one test.
pub struct Workspace {
    pub input: tempfile::TempDir,
    pub output: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace {
            input: tempfile::tempdir().unwrap(),
            output: tempfile::tempdir().unwrap(),
        }
    }

    /// Write an unsigned component `name` referencing `references`.
    pub fn component(&self, name: &str, references: &[&str]) -> PathBuf {
        let mut text = format!("assembly: {name}, Version=1.0.0.0\n");
        for reference in references {
            let _ = writeln!(text, "ref: {reference}, Version=1.0.0.0");
        }
        self.file(&format!("{name}.dll"), &text)
    }

    /// Write a component `name` already signed with `public_key(seed)`.
    pub fn signed_component(&self, name: &str, seed: u8) -> PathBuf {
        self.file(
            &format!("{name}.dll"),
            &format!("assembly: {name}, Version=1.0.0.0\nsigned-with: {seed}\n"),
        )
    }

    pub fn file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.input.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    pub fn config(&self) -> SignerConfig {
        SignerConfig::new(self.output.path(), KeySource::Bytes(key_pair(1)))
    }

    pub fn namer(&self) -> StrongNamer<ManifestReader, TextWriter> {
        StrongNamer::new(self.config(), ManifestReader, TextWriter::default())
    }

    pub fn output(&self, file_name: &str) -> String {
        fs::read_to_string(self.output.path().join(file_name)).unwrap()
    }

    pub fn output_files(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.output.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// The signing key of [`Workspace::config`].
pub fn signing_key() -> StrongNameKey {
    StrongNameKey::from_bytes(&key_pair(1)).unwrap()
}
