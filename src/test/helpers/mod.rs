//! Helpers standing in for collaborators the crate does not implement.

use std::{fmt::Write, sync::Mutex};

use crate::{
    metadata::view::AssemblyView,
    signing::{MetadataWriter, RewritePlan, StrongNameKey},
    Error, Result,
};

/// A [`MetadataWriter`] that renders the plan as text and records the call order.
///
/// The output is a pure function of view and plan, so repeated runs produce identical bytes.
#[derive(Default)]
pub struct PlanWriter {
    calls: Mutex<Vec<String>>,
    fail_on: Option<String>,
}

impl PlanWriter {
    pub fn new() -> Self {
        PlanWriter::default()
    }

    /// Fail when asked to rewrite the component with simple name `name`.
    pub fn failing_on(name: &str) -> Self {
        PlanWriter {
            calls: Mutex::new(Vec::new()),
            fail_on: Some(name.to_string()),
        }
    }

    /// Simple names of the rewritten components in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn render(view: &AssemblyView, plan: &RewritePlan) -> String {
        let mut text = String::new();
        let signed = view.identity.with_token(plan.public_key_token);

        let _ = writeln!(text, "SIGNED {}", signed.display_name());
        for reference in &plan.references {
            let _ = writeln!(text, "REF {} => {}", reference.reference, reference.token);
        }
        for fix in &plan.visibility {
            let _ = writeln!(text, "IVT {} => {}", fix.original, fix.rewritten);
        }
        text
    }
}

impl MetadataWriter for PlanWriter {
    fn rewrite(
        &self,
        view: &AssemblyView,
        plan: &RewritePlan,
        _key: &StrongNameKey,
    ) -> Result<Vec<u8>> {
        if self.fail_on.as_deref() == Some(view.identity.name.as_str()) {
            return Err(Error::Error(format!("cannot rewrite {}", view.identity.name)));
        }

        self.calls.lock().unwrap().push(view.identity.name.clone());
        Ok(Self::render(view, plan).into_bytes())
    }
}
