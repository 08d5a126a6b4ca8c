//! Output and prerequisite path resolution.
//!
//! Every artifact lives under `<root>/build/<ARCH>/<DEVICE>/`, so building for
//! several architectures or devices never mixes outputs.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::Config;
use crate::consts::{ARCH_MERGED_XML, BUILD_DIR};
use crate::rules::{Location, WorkDir};

/// The merged device-definition file passed to place-and-route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceDefinition {
  /// `realpath(DEVICE_DIR/DEVICE_TYPE)/arch.merged.xml`.
  pub path: PathBuf,
  /// Canonical device-type directory, `None` when it does not exist.
  ///
  /// Without it there is nowhere to generate a missing definition.
  pub type_dir: Option<PathBuf>,
}

/// Derives concrete paths from a [`Config`].
#[derive(Debug, Clone)]
pub struct PathResolver<'a> {
  config: &'a Config,
  output_dir: PathBuf,
  device: DeviceDefinition,
}

impl<'a> PathResolver<'a> {
  pub fn new(config: &'a Config) -> Self {
    let output_dir = config
      .root
      .join(BUILD_DIR)
      .join(&config.arch)
      .join(&config.device);
    let device = resolve_device_definition(config);
    debug!(output_dir = %output_dir.display(), device_xml = %device.path.display(), "resolved paths");

    Self {
      config,
      output_dir,
      device,
    }
  }

  pub fn root(&self) -> &Path {
    &self.config.root
  }

  /// `<root>/build`, the tree removed by `clean`.
  pub fn build_root(&self) -> PathBuf {
    self.config.root.join(BUILD_DIR)
  }

  /// `<root>/build/<ARCH>/<DEVICE>`.
  pub fn output_dir(&self) -> &Path {
    &self.output_dir
  }

  pub fn device_definition(&self) -> &DeviceDefinition {
    &self.device
  }

  /// Output path produced from `base` by a rule mapping `source_suffix` to `target_suffix`.
  ///
  /// `base` may be a bare stem or a file name carrying the source suffix; any
  /// directory part is dropped since outputs always land in the output directory.
  pub fn resolve(&self, base: &str, source_suffix: &str, target_suffix: &str) -> PathBuf {
    let file_name = Path::new(base)
      .file_name()
      .and_then(|name| name.to_str())
      .unwrap_or(base);
    let stem = file_name.strip_suffix(source_suffix).unwrap_or(file_name);
    self.output_dir.join(format!("{stem}{target_suffix}"))
  }

  /// Path of a rule's prerequisite for `stem`.
  pub fn source_path(&self, stem: &str, suffix: &str, location: Location) -> PathBuf {
    let name = format!("{stem}{suffix}");
    match location {
      Location::Source => self.config.root.join(name),
      Location::Output => self.output_dir.join(name),
    }
  }

  /// Map a requested file target name to a path.
  ///
  /// Bare file names refer to artifacts in the output directory; anything with
  /// a directory component is taken relative to the project root.
  pub fn target_path(&self, name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.components().count() > 1 || path.is_absolute() {
      self.config.root.join(path)
    } else {
      self.output_dir.join(path)
    }
  }

  /// File name of `path` if it sits directly inside the output directory.
  pub fn output_file_name<'p>(&self, path: &'p Path) -> Option<&'p str> {
    if path.parent() != Some(self.output_dir.as_path()) {
      return None;
    }
    path.file_name().and_then(|name| name.to_str())
  }

  /// Whether `path` is the merged device definition.
  pub fn is_device_definition(&self, path: &Path) -> bool {
    path == self.device.path
  }

  /// Working directory for a rule's command.
  pub fn workdir(&self, policy: WorkDir) -> PathBuf {
    match policy {
      WorkDir::Root => self.config.root.clone(),
      WorkDir::Output => self.output_dir.clone(),
      WorkDir::DeviceType => self
        .device
        .type_dir
        .clone()
        .unwrap_or_else(|| self.config.device_dir.join(&self.config.device_type)),
    }
  }
}

fn resolve_device_definition(config: &Config) -> DeviceDefinition {
  let type_dir = config.device_dir.join(&config.device_type);
  match dunce::canonicalize(&type_dir) {
    Ok(real) => DeviceDefinition {
      path: real.join(ARCH_MERGED_XML),
      type_dir: Some(real),
    },
    Err(_) => DeviceDefinition {
      path: type_dir.join(ARCH_MERGED_XML),
      type_dir: None,
    },
  }
}

/// Render `path` relative to `dir` when it lies inside it, otherwise as is.
pub fn relative_to(path: &Path, dir: &Path) -> String {
  match path.strip_prefix(dir) {
    Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
    Ok(rel) => rel.display().to_string(),
    Err(_) => path.display().to_string(),
  }
}
