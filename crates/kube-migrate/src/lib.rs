//! Migration of `extensions/v1beta1` Deployments to `apps/v1`.
//!
//! `apps/v1` requires `spec.selector`, so the upgrade derives it from the pod
//! template labels and links the very same labels node into
//! `spec.selector.matchLabels`.

use std::fmt;

use kube_migrate_yaml::{Emitter, NodeId, Stream, Tree, load_from_str};

pub use kube_migrate_yaml::{EmitError, LoadError};

pub const LEGACY_API_VERSION: &str = "extensions/v1beta1";
pub const CURRENT_API_VERSION: &str = "apps/v1";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to parse manifest")]
    Load(#[from] LoadError),

    #[error("failed to serialize manifest")]
    Emit(#[from] EmitError),
}

/// Why a document was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Skip {
    MissingApiVersion,
    OtherApiVersion,
    MissingSpec,
    MissingTemplate,
    MissingTemplateMetadata,
    MissingTemplateLabels,
}

impl fmt::Display for Skip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Skip::MissingApiVersion => "no apiVersion",
            Skip::OtherApiVersion => "apiVersion is not the legacy version",
            Skip::MissingSpec => "no spec",
            Skip::MissingTemplate => "no spec.template",
            Skip::MissingTemplateMetadata => "no spec.template.metadata",
            Skip::MissingTemplateLabels => "no spec.template.metadata.labels",
        };
        f.write_str(reason)
    }
}

/// Nodes an applicable document is rewritten through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub api_version: NodeId,
    pub spec: NodeId,
    /// Position of the `template` key inside `spec`.
    pub template_key: usize,
    pub labels: NodeId,
}

/// The one supported rewrite: a legacy Deployment becomes an `apps/v1` one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeploymentUpgrade {
    pub from: &'static str,
    pub to: &'static str,
}

impl Default for DeploymentUpgrade {
    fn default() -> Self {
        Self {
            from: LEGACY_API_VERSION,
            to: CURRENT_API_VERSION,
        }
    }
}

impl DeploymentUpgrade {
    /// Resolve every node the rewrite needs without touching the tree.
    ///
    /// `apiVersion` and `spec` are looked up from the document root, the
    /// remaining fields only among the direct entries of their parent.
    ///
    /// # Errors
    ///
    /// Returns the first [`Skip`] reason that makes the document inapplicable.
    pub fn plan(&self, tree: &Tree, document: NodeId) -> Result<Plan, Skip> {
        let (api_version, _) = tree
            .find_field(document, "apiVersion")
            .ok_or(Skip::MissingApiVersion)?;
        if tree.scalar_value(api_version) != Some(self.from) {
            return Err(Skip::OtherApiVersion);
        }
        let (spec, _) = tree
            .find_field(document, "spec")
            .ok_or(Skip::MissingSpec)?;
        let (template, template_value) = tree
            .find_field(spec, "template")
            .ok_or(Skip::MissingTemplate)?;
        let (metadata, _) = tree
            .find_field(template, "metadata")
            .ok_or(Skip::MissingTemplateMetadata)?;
        let (labels, _) = tree
            .find_field(metadata, "labels")
            .ok_or(Skip::MissingTemplateLabels)?;
        Ok(Plan {
            api_version,
            spec,
            template_key: template_value - 1,
            labels,
        })
    }

    /// Upgrade `document` in place, returning whether anything changed.
    ///
    /// Either every edit is made or the tree is left as it was.
    pub fn apply(&self, tree: &mut Tree, document: NodeId) -> bool {
        let plan = match self.plan(tree, document) {
            Ok(plan) => plan,
            Err(reason) => {
                tracing::debug!(%document, %reason, "skipping document");
                return false;
            }
        };

        let selector = tree.string("selector");
        let match_labels = tree.string("matchLabels");
        let selector_value = tree.mapping(vec![match_labels, plan.labels]);
        let Some(spec) = tree.content_mut(plan.spec) else {
            return false;
        };
        spec.splice(
            plan.template_key..plan.template_key,
            [selector, selector_value],
        );
        tree.set_scalar_value(plan.api_version, self.to);

        tracing::info!(%document, from = self.from, to = self.to, "upgraded deployment");
        true
    }

    /// Apply the upgrade to each document, returning how many changed.
    pub fn upgrade_stream(&self, stream: &mut Stream) -> usize {
        let Stream { tree, documents } = stream;
        documents
            .iter()
            .filter(|document| self.apply(tree, **document))
            .count()
    }
}

/// Upgrade a single document with the built-in version pair.
pub fn upgrade_deployment(tree: &mut Tree, document: NodeId) -> bool {
    DeploymentUpgrade::default().apply(tree, document)
}

/// Upgrade every document of `source`.
///
/// Returns the rewritten text, or `None` when no document needed changes.
///
/// # Errors
///
/// Returns an [`Error`] if `source` is not valid YAML or the upgraded tree
/// cannot be serialized.
pub fn upgrade_manifest(source: &str) -> Result<Option<Upgraded>, Error> {
    let mut stream = load_from_str(source)?;
    if tracing::enabled!(tracing::Level::TRACE) {
        for document in &stream.documents {
            tracing::trace!(outline = %stream.tree.outline(*document), "parsed document");
        }
    }
    let documents = DeploymentUpgrade::default().upgrade_stream(&mut stream);
    if documents == 0 {
        return Ok(None);
    }
    let text = Emitter::new().with_indent(2).emit_stream(&stream)?;
    Ok(Some(Upgraded { text, documents }))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upgraded {
    pub text: String,
    pub documents: usize,
}
