//! The production [`ActionRunner`].

use crate::artifact::{ArtifactCache, Fetcher};
use crate::plan::TaskAction;
use crate::tools::{ArchivePackager, ClusterLoader, ImageId, ImagePackager};

use super::{ActionError, ActionOutput, ActionRunner};

/// Dispatches plan actions to the artifact cache and the external tools.
#[derive(Debug, Clone)]
pub struct Toolchain<F> {
  cache: ArtifactCache<F>,
  images: ImagePackager,
  cluster: ClusterLoader,
  packager: ArchivePackager,
}

impl<F: Fetcher> Toolchain<F> {
  pub fn new(cache: ArtifactCache<F>, images: ImagePackager, cluster: ClusterLoader, packager: ArchivePackager) -> Self {
    Self {
      cache,
      images,
      cluster,
      packager,
    }
  }

  pub fn cache(&self) -> &ArtifactCache<F> {
    &self.cache
  }
}

impl<F: Fetcher> ActionRunner for Toolchain<F> {
  async fn run(&self, action: &TaskAction) -> Result<ActionOutput, ActionError> {
    match action {
      TaskAction::FetchArtifact(artifact) => {
        let materialized = self.cache.ensure_materialized(artifact).await?;
        Ok(ActionOutput::Materialized(materialized))
      }
      TaskAction::PackageArchive { module, archive } => {
        self.packager.package(module, archive).await?;
        Ok(ActionOutput::Packaged {
          archive: archive.clone(),
        })
      }
      TaskAction::BuildImage(spec) => {
        let image = self.images.build_image(spec).await?;
        Ok(ActionOutput::Built { image })
      }
      TaskAction::ExportImage { image, archive } => {
        self.images.export_image(&ImageId(image.clone()), archive).await?;
        Ok(ActionOutput::Exported {
          archive: archive.clone(),
        })
      }
      TaskAction::LoadToCluster { archive, cluster, image } => {
        self.cluster.load_to_cluster(archive, cluster, image).await?;
        Ok(ActionOutput::Loaded {
          cluster: cluster.clone(),
        })
      }
    }
  }
}
