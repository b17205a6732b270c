use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ROOT_DEPLOYMENT: &str = "coab-depls";
pub const DEFAULT_INSTANCE_PREFIX: &str = "cassandra_";
pub const DEFAULT_MANIFEST_EXTENSION: &str = ".yml";

/// Where the deployment pipeline writes the manifest of a provisioned instance.
///
/// The path `<root>/<prefix><id>/<prefix><id><extension>` is shared with the
/// pipeline and must not change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentLayout {
    pub root_deployment: String,
    pub instance_prefix: String,
    pub manifest_extension: String,
}

impl Default for DeploymentLayout {
    fn default() -> Self {
        Self {
            root_deployment: DEFAULT_ROOT_DEPLOYMENT.to_string(),
            instance_prefix: DEFAULT_INSTANCE_PREFIX.to_string(),
            manifest_extension: DEFAULT_MANIFEST_EXTENSION.to_string(),
        }
    }
}

impl DeploymentLayout {
    pub fn deployment_name(&self, instance_id: &str) -> String {
        format!("{}{}", self.instance_prefix, instance_id)
    }

    pub fn deployment_dir(&self, workspace: &Path, instance_id: &str) -> PathBuf {
        workspace
            .join(&self.root_deployment)
            .join(self.deployment_name(instance_id))
    }

    pub fn target_manifest_path(&self, workspace: &Path, instance_id: &str) -> PathBuf {
        let name = self.deployment_name(instance_id);
        self.deployment_dir(workspace, instance_id)
            .join(format!("{}{}", name, self.manifest_extension))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_manifest_path() {
        let layout = DeploymentLayout::default();
        let path = layout.target_manifest_path(Path::new("/work"), "777");
        assert_eq!(
            path,
            PathBuf::from("/work/coab-depls/cassandra_777/cassandra_777.yml")
        );
    }

    #[test]
    fn test_custom_layout() {
        let layout = DeploymentLayout {
            root_deployment: "depls".to_string(),
            instance_prefix: "mongo-".to_string(),
            manifest_extension: "-tpl.yml".to_string(),
        };
        assert_eq!(
            layout.target_manifest_path(Path::new("ws"), "a1"),
            PathBuf::from("ws/depls/mongo-a1/mongo-a1-tpl.yml")
        );
        assert_eq!(
            layout.deployment_dir(Path::new("ws"), "a1"),
            PathBuf::from("ws/depls/mongo-a1")
        );
    }
}
