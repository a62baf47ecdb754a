//! Build plan construction.
//!
//! Every participating module contributes the same chain of nodes:
//!
//! ```text
//! fetch-artifact ──┐
//!                  ├─> build-image ─> export-image ─> load-to-cluster (opt-in)
//! package-archive ─┘
//! ```

mod dag;
mod types;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::artifact::Artifact;
use crate::consts::{
  BUILD_DIR, DEFAULT_ARCHIVE_BUILD_ARG, DEFAULT_ARCHIVE_EXTENSION, DEFAULT_ARTIFACT_BUILD_ARG, DEFAULT_ARTIFACT_CACHE_DIR,
  DEFAULT_ARTIFACT_NAME, DEFAULT_ARTIFACT_URL, DEFAULT_CLUSTER_NAME, DEFAULT_DOCKERFILE, DEFAULT_IMAGE_ARCHIVE,
  DEFAULT_IMAGE_TAG, DEFAULT_LIBS_DIR,
};
use crate::tools::ImageSpec;
use crate::variant::ModuleRef;

pub use dag::BuildPlan;
pub use types::{Guard, PlanError, PlanOptions, Stage, TaskAction, TaskId, TaskNode};

/// Names and locations a plan is parameterised by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanLayout {
  pub artifact_name: String,
  pub artifact_url: String,
  pub artifact_sha256: Option<String>,
  /// Shared artifact cache directory.
  pub cache_dir: PathBuf,
  /// Dockerfile, relative to the module root.
  pub dockerfile: String,
  pub image_tag: String,
  /// Exported image file name, placed in the module root.
  pub image_archive: String,
  /// Packaged archives directory, relative to the module build directory.
  pub libs_dir: String,
  pub archive_build_arg: String,
  pub artifact_build_arg: String,
  pub cluster_name: String,
}

impl PlanLayout {
  /// Default layout for a project rooted at `project_root`.
  pub fn new(project_root: &Path) -> Self {
    Self {
      artifact_name: DEFAULT_ARTIFACT_NAME.to_string(),
      artifact_url: DEFAULT_ARTIFACT_URL.to_string(),
      artifact_sha256: None,
      cache_dir: project_root.join(DEFAULT_ARTIFACT_CACHE_DIR),
      dockerfile: DEFAULT_DOCKERFILE.to_string(),
      image_tag: DEFAULT_IMAGE_TAG.to_string(),
      image_archive: DEFAULT_IMAGE_ARCHIVE.to_string(),
      libs_dir: DEFAULT_LIBS_DIR.to_string(),
      archive_build_arg: DEFAULT_ARCHIVE_BUILD_ARG.to_string(),
      artifact_build_arg: DEFAULT_ARTIFACT_BUILD_ARG.to_string(),
      cluster_name: DEFAULT_CLUSTER_NAME.to_string(),
    }
  }

  /// The artifact as `module` needs it.
  pub fn artifact_for(&self, module: &ModuleRef) -> Artifact {
    Artifact {
      name: self.artifact_name.clone(),
      url: self.artifact_url.clone(),
      cache_path: self.cache_dir.join(&self.artifact_name),
      work_path: module.root.join(BUILD_DIR).join(&self.artifact_name),
      sha256: self.artifact_sha256.clone(),
    }
  }

  /// Archive path relative to the module root, as the Dockerfile sees it.
  fn archive_rel(&self, module: &ModuleRef) -> String {
    format!(
      "{}/{}/{}.{}",
      BUILD_DIR,
      self.libs_dir,
      module.name(),
      DEFAULT_ARCHIVE_EXTENSION
    )
  }

  pub fn archive_path(&self, module: &ModuleRef) -> PathBuf {
    module.root.join(self.archive_rel(module))
  }

  pub fn image_name(&self, module: &ModuleRef) -> String {
    format!("{}:{}", module.name(), self.image_tag)
  }

  pub fn image_archive_path(&self, module: &ModuleRef) -> PathBuf {
    module.root.join(&self.image_archive)
  }

  pub fn image_spec(&self, module: &ModuleRef, platform: Option<&str>) -> ImageSpec {
    let build_args = BTreeMap::from([
      (self.archive_build_arg.clone(), self.archive_rel(module)),
      (
        self.artifact_build_arg.clone(),
        format!("{}/{}", BUILD_DIR, self.artifact_name),
      ),
    ]);

    ImageSpec {
      image: self.image_name(module),
      platform: platform.map(str::to_string),
      context: module.root.clone(),
      dockerfile: module.root.join(&self.dockerfile),
      build_args,
    }
  }
}

/// Turns resolved modules into a [`BuildPlan`].
#[derive(Debug, Clone)]
pub struct PlanBuilder {
  layout: PlanLayout,
}

impl PlanBuilder {
  pub fn new(layout: PlanLayout) -> Self {
    Self { layout }
  }

  pub fn layout(&self) -> &PlanLayout {
    &self.layout
  }

  /// Build the plan for `modules`.
  ///
  /// Modules must already be known to exist. The same inputs always produce
  /// the same nodes, edges and order.
  pub fn build<'a>(
    &self,
    modules: impl IntoIterator<Item = &'a ModuleRef>,
    options: &PlanOptions,
  ) -> Result<BuildPlan, PlanError> {
    let mut nodes = Vec::new();
    for module in modules {
      nodes.extend(self.module_nodes(module, options));
    }

    let plan = BuildPlan::new(nodes)?;
    debug!(nodes = plan.len(), "plan built");
    Ok(plan)
  }

  fn module_nodes(&self, module: &ModuleRef, options: &PlanOptions) -> Vec<TaskNode> {
    let layout = &self.layout;
    let name = module.name();
    let node = |stage: Stage, deps: Vec<TaskId>, action: TaskAction, guard: Guard| TaskNode {
      id: TaskId::new(stage, name),
      module: module.path.clone(),
      deps,
      action,
      guard,
    };

    let artifact = layout.artifact_for(module);
    let fetch_guard = Guard::MissingFile {
      path: artifact.work_path.clone(),
      sha256: artifact.sha256.clone(),
    };
    let image_archive = layout.image_archive_path(module);
    let image = layout.image_name(module);

    let fetch = TaskId::new(Stage::FetchArtifact, name);
    let package = TaskId::new(Stage::PackageArchive, name);
    let build = TaskId::new(Stage::BuildImage, name);
    let export = TaskId::new(Stage::ExportImage, name);

    let mut nodes = vec![
      node(
        Stage::FetchArtifact,
        vec![],
        TaskAction::FetchArtifact(artifact),
        fetch_guard,
      ),
      node(
        Stage::PackageArchive,
        vec![],
        TaskAction::PackageArchive {
          module: module.path.clone(),
          archive: layout.archive_path(module),
        },
        Guard::Always,
      ),
      node(
        Stage::BuildImage,
        vec![fetch, package],
        TaskAction::BuildImage(layout.image_spec(module, options.platform.as_deref())),
        Guard::Always,
      ),
      node(
        Stage::ExportImage,
        vec![build],
        TaskAction::ExportImage {
          image: image.clone(),
          archive: image_archive.clone(),
        },
        Guard::Always,
      ),
    ];

    if options.load_to_cluster {
      let cluster = options.cluster_name.clone().unwrap_or_else(|| layout.cluster_name.clone());
      nodes.push(node(
        Stage::LoadToCluster,
        vec![export],
        TaskAction::LoadToCluster {
          archive: image_archive,
          cluster,
          image,
        },
        Guard::Always,
      ));
    }

    nodes
  }
}
