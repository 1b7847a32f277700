//! Signing of a whole batch: read, build the graph, drain the worklist, commit, partition.

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    metadata::{
        identity::AssemblyIdentity,
        reader::{MetadataReader, PeMetadataReader, ResolutionContext},
        view::AssemblyView,
    },
    signing::{
        config::SignerConfig,
        graph::SigningGraph,
        key::StrongNameKey,
        output::{OutputStage, SignStatus},
        partition::{partition, InputEntry, InputGroup, OutputGroup, OutputItem},
        record::{ComponentId, ComponentRecord, FinalizedHandle, GroupMembership},
        rewrite::{visibility_fixes, MetadataWriter, ReferenceRewrite, RewritePlan},
        worklist::{Finalizer, Signer},
    },
    Error, Result,
};

/// The input of a run: named groupings of files.
///
/// The same file may appear in several groupings; it is read and signed once and reported in
/// each of them.
#[derive(Clone, Debug, Default)]
pub struct SigningBatch {
    groups: Vec<InputGroup>,
}

impl SigningBatch {
    /// Create an empty batch.
    #[must_use]
    pub fn new() -> Self {
        SigningBatch::default()
    }

    /// Append a grouping and return its membership flag.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] if `name` is already used or the batch already holds
    /// [`GroupMembership::MAX_GROUPS`] groupings.
    pub fn add_group<I, P>(&mut self, name: impl Into<String>, paths: I) -> Result<GroupMembership>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let name = name.into();
        if self.groups.iter().any(|group| group.name == name) {
            return Err(Error::Error(format!("Duplicate grouping - {name}")));
        }
        if self.groups.len() >= GroupMembership::MAX_GROUPS {
            return Err(Error::Error(format!(
                "A batch holds at most {} groupings",
                GroupMembership::MAX_GROUPS
            )));
        }

        let membership = GroupMembership::group(self.groups.len());
        self.groups.push(InputGroup {
            name,
            paths: paths.into_iter().map(Into::into).collect(),
        });
        Ok(membership)
    }

    /// The groupings in insertion order.
    #[must_use]
    pub fn groups(&self) -> &[InputGroup] {
        &self.groups
    }

    /// Returns `true` if the batch has no grouping.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Results of a run.
#[derive(Clone, Debug)]
pub struct SigningReport {
    groups: Vec<OutputGroup>,
    written: Vec<PathBuf>,
    signing_order: Vec<String>,
}

impl SigningReport {
    /// The results of the grouping `name`, in input order.
    ///
    /// # Errors
    /// Returns [`crate::Error::UnknownGroup`] if the batch had no such grouping.
    pub fn group(&self, name: &str) -> Result<&[OutputItem]> {
        self.groups
            .iter()
            .find(|group| group.name == name)
            .map(|group| group.items.as_slice())
            .ok_or_else(|| Error::UnknownGroup(name.to_string()))
    }

    /// All groupings in batch order.
    #[must_use]
    pub fn groups(&self) -> &[OutputGroup] {
        &self.groups
    }

    /// Files created or replaced by the run, for cleanup bookkeeping.
    #[must_use]
    pub fn written_files(&self) -> &[PathBuf] {
        &self.written
    }

    /// Identities in the order they reached the signed state, already-signed ones first.
    #[must_use]
    pub fn signing_order(&self) -> &[String] {
        &self.signing_order
    }

    /// Number of distinct components with `status`.
    #[must_use]
    pub fn count(&self, status: SignStatus) -> usize {
        self.items()
            .filter(|item| item.status() == Some(status))
            .filter_map(OutputItem::identity)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Number of distinct files passed through.
    #[must_use]
    pub fn pass_through_count(&self) -> usize {
        self.items()
            .filter(|item| item.status().is_none())
            .map(OutputItem::path)
            .collect::<HashSet<_>>()
            .len()
    }

    fn items(&self) -> impl Iterator<Item = &OutputItem> {
        self.groups.iter().flat_map(|group| group.items.iter())
    }
}

/// Signs batches of components with one configuration.
///
/// # Examples
///
/// ```rust,no_run
/// use dotsign::prelude::*;
///
/// # struct Writer;
/// # impl MetadataWriter for Writer {
/// #     fn rewrite(&self, _: &AssemblyView, _: &RewritePlan, _: &StrongNameKey) -> dotsign::Result<Vec<u8>> {
/// #         Ok(Vec::new())
/// #     }
/// # }
/// let config = SignerConfig::new("obj/signed", KeySource::File("release.snk".into()));
/// let namer = StrongNamer::with_writer(config, Writer);
///
/// let mut batch = SigningBatch::new();
/// batch.add_group("direct", ["bin/Lib.App.dll"])?;
/// batch.add_group("copy-local", ["bin/Lib.Core.dll", "bin/appsettings.json"])?;
///
/// let report = namer.run(&batch)?;
/// for item in report.group("copy-local")? {
///     println!("{}", item.path().display());
/// }
/// # Ok::<(), dotsign::Error>(())
/// ```
pub struct StrongNamer<R, W> {
    config: SignerConfig,
    reader: R,
    writer: W,
}

impl<W: MetadataWriter> StrongNamer<PeMetadataReader, W> {
    /// Create a namer reading PE images from disk.
    pub fn with_writer(config: SignerConfig, writer: W) -> Self {
        StrongNamer::new(config, PeMetadataReader::new(), writer)
    }
}

impl<R: MetadataReader, W: MetadataWriter> StrongNamer<R, W> {
    /// Create a namer from its collaborators.
    pub fn new(config: SignerConfig, reader: R, writer: W) -> Self {
        StrongNamer {
            config,
            reader,
            writer,
        }
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &SignerConfig {
        &self.config
    }

    /// The metadata writer.
    #[must_use]
    pub fn writer(&self) -> &W {
        &self.writer
    }

    /// Sign every unsigned component of `batch` in dependency order.
    ///
    /// Files that are not components, or cannot be read, are passed through. Nothing is
    /// written to the output directory unless every component was finalized.
    ///
    /// # Errors
    /// - [`crate::Error::InvalidKey`] or [`crate::Error::FileError`] if the key cannot be loaded
    /// - [`crate::Error::DanglingReference`] if an unsigned reference targets no component
    /// - [`crate::Error::CyclicReferences`] if unsigned components reference each other
    /// - [`crate::Error::OutputCollision`] or [`crate::Error::Rewrite`] if an output fails
    pub fn run(&self, batch: &SigningBatch) -> Result<SigningReport> {
        let key = StrongNameKey::from_source(&self.config.key)?;
        if !key.has_private_key() {
            debug!(token = %key.public_key_token(), "signing with a public key only");
        }

        let context = self.config.resolution_context();
        let inputs = distinct_inputs(batch);

        let views: Vec<Result<Option<AssemblyView>>> = inputs
            .par_iter()
            .map(|(path, _)| self.reader.read(path, &context))
            .collect();

        let mut builder = SigningGraph::builder();
        let mut components: Vec<AssemblyView> = Vec::new();
        let mut entries = HashMap::with_capacity(inputs.len());

        for ((path, membership), view) in inputs.into_iter().zip(views) {
            let view = match view {
                Ok(Some(view)) => view,
                Ok(None) => {
                    debug!(path = %path.display(), "not a component, passing through");
                    entries.insert(path, InputEntry::PassThrough);
                    continue;
                }
                Err(error) => {
                    warn!(path = %path.display(), %error, "unreadable component, passing through");
                    entries.insert(path, InputEntry::PassThrough);
                    continue;
                }
            };

            let identity = view.identity_string();
            let id = match view.public_key_token() {
                Some(token) => {
                    let id = builder.add_signed(identity, view.path.clone(), token, membership);
                    builder.alias(unsigned_identity(&view.identity), id);
                    id
                }
                None => builder.add_unsigned(identity, view.unsigned_references(), membership),
            };

            if id.index() == components.len() {
                components.push(view);
            }
            entries.insert(path, InputEntry::Component(id));
        }

        let mut graph = builder
            .build()
            .inspect_err(|error| explain_dangling(error, &context))?;

        let mut finalizer = BatchFinalizer {
            components: &components,
            key: &key,
            writer: &self.writer,
            stage: OutputStage::new(&self.config.output_dir, self.config.copy_debug_symbols),
        };

        let trace = Signer::new(self.config.order).run(&mut graph, &mut finalizer)?;
        let commit = finalizer.stage.commit()?;
        let groups = partition(batch.groups(), &entries, &graph, &commit)?;

        let signing_order: Vec<String> = trace
            .visited
            .iter()
            .map(|id| graph.record(*id).identity().to_string())
            .collect();

        info!(
            components = graph.len(),
            finalized = trace.finalized,
            written = commit.written().len(),
            "signing run complete"
        );

        Ok(SigningReport {
            groups,
            written: commit.written().to_vec(),
            signing_order,
        })
    }
}

struct BatchFinalizer<'a, W> {
    components: &'a [AssemblyView],
    key: &'a StrongNameKey,
    writer: &'a W,
    stage: OutputStage,
}

impl<W: MetadataWriter> Finalizer for BatchFinalizer<'_, W> {
    fn finalize(&mut self, graph: &SigningGraph, id: ComponentId) -> Result<FinalizedHandle> {
        let record = graph.record(id);
        let view = self
            .components
            .get(id.index())
            .ok_or_else(|| Error::Error(format!("No view for {}", record.identity())))?;

        let references = record
            .unsigned_references()
            .iter()
            .map(|reference| {
                let token = graph
                    .get(reference)
                    .and_then(ComponentRecord::handle)
                    .map(FinalizedHandle::token)
                    .ok_or_else(|| Error::Error(format!("{reference} is not signed")))?;

                Ok(ReferenceRewrite {
                    reference: reference.clone(),
                    token,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let plan = RewritePlan {
            identity: record.identity().to_string(),
            references,
            visibility: visibility_fixes(&view.internals_visible_to, self.key),
            public_key_token: self.key.public_key_token(),
        };

        let bytes = self
            .writer
            .rewrite(view, &plan, self.key)
            .map_err(|error| Error::Rewrite {
                component: plan.identity.clone(),
                source: Box::new(error),
            })?;

        let destination = self.stage.stage(&plan.identity, &view.path, &bytes)?;

        info!(
            identity = %plan.identity,
            destination = %destination.display(),
            references = plan.references.len(),
            visibility = plan.visibility.len(),
            "finalized component"
        );

        Ok(FinalizedHandle::Staged {
            destination,
            token: plan.public_key_token,
        })
    }
}

/// Every distinct input path once, in first-appearance order, with all its groupings.
fn distinct_inputs(batch: &SigningBatch) -> Vec<(PathBuf, GroupMembership)> {
    let mut inputs: Vec<(PathBuf, GroupMembership)> = Vec::new();
    let mut positions: HashMap<&Path, usize> = HashMap::new();

    for (index, group) in batch.groups().iter().enumerate() {
        for path in &group.paths {
            match positions.get(path.as_path()) {
                Some(&position) => inputs[position].1 |= GroupMembership::group(index),
                None => {
                    positions.insert(path, inputs.len());
                    inputs.push((path.clone(), GroupMembership::group(index)));
                }
            }
        }
    }

    inputs
}

/// The identity under which assemblies built against an unsigned predecessor refer to `identity`.
fn unsigned_identity(identity: &AssemblyIdentity) -> String {
    AssemblyIdentity {
        public_key_token: None,
        ..identity.clone()
    }
    .display_name()
}

fn explain_dangling(error: &Error, context: &ResolutionContext) {
    let Error::DanglingReference {
        component,
        reference,
    } = error
    else {
        return;
    };

    let location = AssemblyIdentity::parse(reference)
        .ok()
        .and_then(|identity| context.resolve(identity.simple_name()));

    match location {
        Some(location) => warn!(
            component = %component,
            reference = %reference,
            location = %location.display(),
            "reference resolves outside the batch; add it to the inputs"
        ),
        None => warn!(
            component = %component,
            reference = %reference,
            "reference cannot be resolved"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        signing::{key::KeySource, worklist::WorklistOrder},
        test::{
            factories::{assembly::AssemblyImageBuilder, keys, pe::PeImageBuilder},
            helpers::PlanWriter,
        },
    };
    use std::fs;

    const NULL_TOKEN: &str = "Version=1.0.0.0, Culture=neutral, PublicKeyToken=null";

    fn identity(name: &str) -> String {
        format!("{name}, {NULL_TOKEN}")
    }

    struct Workspace {
        input: tempfile::TempDir,
        output: tempfile::TempDir,
    }

    impl Workspace {
        fn new() -> Self {
            Workspace {
                input: tempfile::tempdir().unwrap(),
                output: tempfile::tempdir().unwrap(),
            }
        }

        fn write(&self, file_name: &str, data: &[u8]) -> PathBuf {
            let path = self.input.path().join(file_name);
            fs::write(&path, data).unwrap();
            path
        }

        fn config(&self) -> SignerConfig {
            SignerConfig::new(self.output.path(), KeySource::Bytes(keys::key_pair(1)))
        }

        fn output(&self, file_name: &str) -> String {
            fs::read_to_string(self.output.path().join(file_name)).unwrap()
        }

        fn output_entries(&self) -> usize {
            fs::read_dir(self.output.path()).unwrap().count()
        }
    }

    /// A -> B -> C where C is signed with another key.
    fn chain(workspace: &Workspace) -> Vec<PathBuf> {
        let c_key = keys::strong_name_public_key(2);
        vec![
            workspace.write(
                "A.dll",
                &AssemblyImageBuilder::new("A", (1, 0, 0, 0))
                    .reference("B", (1, 0, 0, 0), None)
                    .internals_visible_to("A.Tests")
                    .build(),
            ),
            workspace.write(
                "B.dll",
                &AssemblyImageBuilder::new("B", (1, 0, 0, 0))
                    .reference("C", (1, 0, 0, 0), None)
                    .build(),
            ),
            workspace.write(
                "C.dll",
                &AssemblyImageBuilder::new("C", (1, 0, 0, 0))
                    .public_key(&c_key)
                    .build(),
            ),
        ]
    }

    #[test]
    fn chain_with_presigned_leaf() {
        let workspace = Workspace::new();
        let paths = chain(&workspace);

        let mut batch = SigningBatch::new();
        batch.add_group("direct", paths).unwrap();

        let writer = PlanWriter::new();
        let namer = StrongNamer::with_writer(workspace.config(), writer);
        let report = namer.run(&batch).unwrap();

        let key = StrongNameKey::from_bytes(&keys::key_pair(1)).unwrap();
        let c_token = StrongNameKey::from_bytes(&keys::strong_name_public_key(2))
            .unwrap()
            .public_key_token();

        assert_eq!(
            report.signing_order(),
            [
                format!("C, Version=1.0.0.0, Culture=neutral, PublicKeyToken={c_token}"),
                identity("B"),
                identity("A"),
            ]
        );
        assert_eq!(namer.writer.calls(), vec!["B", "A"]);

        let a = workspace.output("A.dll");
        assert!(a.contains(&format!("REF {} => {}", identity("B"), key.public_key_token())));
        assert!(a.contains(&format!(
            "IVT A.Tests => A.Tests, PublicKeyToken={}",
            key.public_key_token()
        )));

        let b = workspace.output("B.dll");
        assert!(b.contains(&format!("REF {} => {c_token}", identity("C"))));

        assert_eq!(report.count(SignStatus::Written), 2);
        assert_eq!(report.count(SignStatus::AlreadySigned), 1);
        assert_eq!(report.written_files().len(), 2);
        assert!(!workspace.output.path().join("C.dll").exists());
    }

    #[test]
    fn second_run_is_unchanged() {
        let workspace = Workspace::new();
        let mut batch = SigningBatch::new();
        batch.add_group("direct", chain(&workspace)).unwrap();

        let namer = StrongNamer::with_writer(workspace.config(), PlanWriter::new());
        let first = namer.run(&batch).unwrap();
        let a = workspace.output("A.dll");

        let second = namer.run(&batch).unwrap();
        assert_eq!(first.count(SignStatus::Written), 2);
        assert_eq!(second.count(SignStatus::Written), 0);
        assert_eq!(second.count(SignStatus::Unchanged), 2);
        assert!(second.written_files().is_empty());
        assert_eq!(workspace.output("A.dll"), a);
    }

    #[test]
    fn cycle_writes_nothing() {
        let workspace = Workspace::new();
        let d = workspace.write(
            "D.dll",
            &AssemblyImageBuilder::new("D", (1, 0, 0, 0))
                .reference("E", (1, 0, 0, 0), None)
                .build(),
        );
        let e = workspace.write(
            "E.dll",
            &AssemblyImageBuilder::new("E", (1, 0, 0, 0))
                .reference("D", (1, 0, 0, 0), None)
                .build(),
        );
        let free = workspace.write(
            "Free.dll",
            &AssemblyImageBuilder::new("Free", (1, 0, 0, 0)).build(),
        );

        let mut batch = SigningBatch::new();
        batch.add_group("direct", [d, e, free]).unwrap();

        let namer = StrongNamer::with_writer(workspace.config(), PlanWriter::new());
        match namer.run(&batch) {
            Err(Error::CyclicReferences(blocked)) => {
                assert_eq!(blocked, vec![identity("D"), identity("E")]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }

        assert_eq!(workspace.output_entries(), 0);
    }

    #[test]
    fn groupings_and_pass_through() {
        let workspace = Workspace::new();
        let app = workspace.write(
            "App.dll",
            &AssemblyImageBuilder::new("App", (1, 0, 0, 0))
                .reference("Core", (1, 0, 0, 0), None)
                .build(),
        );
        let core = workspace.write(
            "Core.dll",
            &AssemblyImageBuilder::new("Core", (1, 0, 0, 0)).build(),
        );
        let native = workspace.write(
            "native.dll",
            &PeImageBuilder::new(vec![0; 32]).without_cli_header().build(),
        );
        let settings = workspace.write("appsettings.json", b"{}");

        let mut damaged = AssemblyImageBuilder::new("Broken", (1, 0, 0, 0)).build();
        damaged.truncate(damaged.len() - 64);
        let broken = workspace.write("Broken.dll", &damaged);

        let mut batch = SigningBatch::new();
        let direct = batch.add_group("direct", [&app, &core]).unwrap();
        let copy_local = batch
            .add_group("copy-local", [&native, &core, &settings, &broken])
            .unwrap();
        assert_eq!(direct, GroupMembership::DIRECT);
        assert_eq!(copy_local, GroupMembership::COPY_LOCAL);

        let namer = StrongNamer::with_writer(workspace.config(), PlanWriter::new());
        let report = namer.run(&batch).unwrap();

        let direct = report.group("direct").unwrap();
        assert_eq!(direct.len(), 2);
        assert_eq!(direct[0].identity(), Some(identity("App").as_str()));
        assert_eq!(direct[1].path(), workspace.output.path().join("Core.dll"));

        let copy_local = report.group("copy-local").unwrap();
        assert_eq!(copy_local.len(), 4);
        assert_eq!(copy_local[0].path(), native);
        assert_eq!(copy_local[1], direct[1]);
        assert_eq!(copy_local[2].path(), settings);
        assert_eq!(copy_local[3].path(), broken);
        assert_eq!(copy_local[3].status(), None);

        assert_eq!(report.pass_through_count(), 3);
        assert_eq!(report.count(SignStatus::Written), 2);
        assert!(matches!(
            report.group("analyzers"),
            Err(Error::UnknownGroup(_))
        ));
    }

    #[test]
    fn dangling_reference_aborts() {
        let workspace = Workspace::new();
        let app = workspace.write(
            "App.dll",
            &AssemblyImageBuilder::new("App", (1, 0, 0, 0))
                .reference("Missing", (1, 0, 0, 0), None)
                .build(),
        );

        let mut batch = SigningBatch::new();
        batch.add_group("direct", [app]).unwrap();

        let config = workspace.config().with_probe_dir(workspace.input.path());
        let namer = StrongNamer::with_writer(config, PlanWriter::new());

        match namer.run(&batch) {
            Err(Error::DanglingReference {
                component,
                reference,
            }) => {
                assert_eq!(component, identity("App"));
                assert_eq!(reference, identity("Missing"));
            }
            other => panic!("expected dangling reference, got {other:?}"),
        }
        assert_eq!(workspace.output_entries(), 0);
    }

    #[test]
    fn writer_failure_names_component() {
        let workspace = Workspace::new();
        let mut batch = SigningBatch::new();
        batch.add_group("direct", chain(&workspace)).unwrap();

        let namer = StrongNamer::with_writer(workspace.config(), PlanWriter::failing_on("A"));
        match namer.run(&batch) {
            Err(Error::Rewrite { component, .. }) => assert_eq!(component, identity("A")),
            other => panic!("expected rewrite error, got {other:?}"),
        }

        assert_eq!(workspace.output_entries(), 0);
    }

    #[test]
    fn lifo_produces_same_outputs() {
        let fifo = Workspace::new();
        let mut batch = SigningBatch::new();
        batch.add_group("direct", chain(&fifo)).unwrap();
        StrongNamer::with_writer(fifo.config(), PlanWriter::new())
            .run(&batch)
            .unwrap();

        let lifo = Workspace::new();
        let mut batch = SigningBatch::new();
        batch.add_group("direct", chain(&lifo)).unwrap();
        StrongNamer::with_writer(
            lifo.config().with_order(WorklistOrder::Lifo),
            PlanWriter::new(),
        )
        .run(&batch)
        .unwrap();

        for name in ["A.dll", "B.dll"] {
            assert_eq!(fifo.output(name), lifo.output(name));
        }
    }

    #[test]
    fn batch_groupings() {
        let mut batch = SigningBatch::new();
        assert!(batch.is_empty());

        batch.add_group("direct", ["a.dll"]).unwrap();
        assert!(batch.add_group("direct", ["b.dll"]).is_err());

        for index in 1..GroupMembership::MAX_GROUPS {
            batch
                .add_group(format!("group{index}"), Vec::<PathBuf>::new())
                .unwrap();
        }
        assert!(batch.add_group("overflow", ["c.dll"]).is_err());
        assert_eq!(batch.groups().len(), GroupMembership::MAX_GROUPS);
    }

    #[test]
    fn invalid_key_fails_early() {
        let workspace = Workspace::new();
        let mut batch = SigningBatch::new();
        batch.add_group("direct", chain(&workspace)).unwrap();

        let config = SignerConfig::new(workspace.output.path(), KeySource::Bytes(vec![0; 8]));
        let namer = StrongNamer::with_writer(config, PlanWriter::new());

        assert!(matches!(namer.run(&batch), Err(Error::InvalidKey(_))));
    }
}
