//! What a component's rewrite must change, and the writer that applies it.

use crate::{
    metadata::{identity::PublicKeyToken, view::AssemblyView},
    signing::key::StrongNameKey,
    Result,
};

/// Embed `token` into the unsigned reference `reference`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferenceRewrite {
    /// Identity of the referenced component, as recorded by the referencing one
    pub reference: String,
    /// Token of the now-signed referenced component
    pub token: PublicKeyToken,
}

/// Replace the `InternalsVisibleTo` value `original` by `rewritten`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VisibilityFix {
    /// The declaration as found in the component
    pub original: String,
    /// The declaration qualified with the signing key's token
    pub rewritten: String,
}

/// Everything the writer applies to one component.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RewritePlan {
    /// Identity of the component before signing
    pub identity: String,
    /// One entry per unsigned reference, in reference order
    pub references: Vec<ReferenceRewrite>,
    /// Unqualified friend declarations to fix
    pub visibility: Vec<VisibilityFix>,
    /// Token of the key the component is signed with
    pub public_key_token: PublicKeyToken,
}

impl RewritePlan {
    /// The token to embed for `reference`, if the plan rewrites it.
    #[must_use]
    pub fn token_for(&self, reference: &str) -> Option<PublicKeyToken> {
        self.references
            .iter()
            .find(|rewrite| rewrite.reference == reference)
            .map(|rewrite| rewrite.token)
    }
}

/// Produces the finalized bytes of a component.
///
/// The implementation owns the binary rewrite: grow the heaps for the public key and the
/// tokens, patch `AssemblyRef` and `InternalsVisibleToAttribute` blobs, set the signed flag in
/// the CLI header and compute the RSA signature with `key`.
pub trait MetadataWriter: Send + Sync {
    /// Rewrite `view` according to `plan`.
    ///
    /// # Errors
    /// Any error aborts the run.
    fn rewrite(&self, view: &AssemblyView, plan: &RewritePlan, key: &StrongNameKey)
        -> Result<Vec<u8>>;
}

/// Returns `true` if a friend declaration already names a key.
#[must_use]
pub fn is_qualified(declaration: &str) -> bool {
    declaration.split(',').skip(1).any(|part| {
        let part = part.trim().to_ascii_lowercase();
        part.starts_with("publickey=") || part.starts_with("publickeytoken=")
    })
}

/// Qualify a friend declaration with the public-key token of `key`.
///
/// Returns `None` if the declaration already carries a `PublicKey=` or `PublicKeyToken=` clause.
#[must_use]
pub fn qualify_visibility(declaration: &str, key: &StrongNameKey) -> Option<String> {
    if is_qualified(declaration) {
        return None;
    }

    Some(format!(
        "{}, PublicKeyToken={}",
        declaration.trim_end(),
        key.public_key_token()
    ))
}

/// The fixes for all unqualified declarations in `declarations`.
#[must_use]
pub fn visibility_fixes(declarations: &[String], key: &StrongNameKey) -> Vec<VisibilityFix> {
    declarations
        .iter()
        .filter_map(|original| {
            qualify_visibility(original, key).map(|rewritten| VisibilityFix {
                original: original.clone(),
                rewritten,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::factories::keys;

    #[test]
    fn qualification() {
        assert!(!is_qualified("Lib.Tests"));
        assert!(is_qualified("Lib.Tests, PublicKey=0024000004800000"));
        assert!(is_qualified("Lib.Tests,publickeytoken=b77a5c561934e089"));
        assert!(!is_qualified("PublicKey=Lib"));
    }

    #[test]
    fn fixes_only_unqualified() {
        let key = StrongNameKey::from_bytes(&keys::key_pair(1)).unwrap();
        let declarations = vec![
            "Lib.Tests".to_string(),
            "Lib.Bench, PublicKey=00240000".to_string(),
            "DynamicProxyGenAssembly2 ".to_string(),
        ];

        let fixes = visibility_fixes(&declarations, &key);

        assert_eq!(fixes.len(), 2);
        assert_eq!(fixes[0].original, "Lib.Tests");
        assert_eq!(
            fixes[0].rewritten,
            format!("Lib.Tests, PublicKeyToken={}", key.public_key_token())
        );
        assert_eq!(
            fixes[1].rewritten,
            format!(
                "DynamicProxyGenAssembly2, PublicKeyToken={}",
                key.public_key_token()
            )
        );
    }

    #[test]
    fn token_lookup() {
        let token = PublicKeyToken::new([9; 8]);
        let plan = RewritePlan {
            identity: "Lib.App".to_string(),
            references: vec![ReferenceRewrite {
                reference: "Lib.Core".to_string(),
                token,
            }],
            visibility: Vec::new(),
            public_key_token: token,
        };

        assert_eq!(plan.token_for("Lib.Core"), Some(token));
        assert_eq!(plan.token_for("Lib.Other"), None);
    }
}
