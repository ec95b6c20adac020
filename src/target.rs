//! Target/Class Generator.
//!
//! For each alias, symlinks the owning component's class and defaults files under
//! alias-specific names, then writes a target file whose parameters identify the
//! alias's instance, worktree, and Kapitan target name. Library aliases are symlinked
//! separately, once per component, independent of how many aliases that component has.

use std::{
    collections::{HashMap, HashSet},
    os::unix,
    path::{Path, PathBuf},
};

use crate::error::{Error, Result};

/// Create `link` as a relative symlink to `target`, so the containing tree stays
/// relocatable. Both paths must already share a common ancestor (the working
/// directory).
pub fn relsymlink(target: &Path, link: &Path) -> Result<()> {
    let link_dir = link.parent().unwrap_or_else(|| Path::new("."));
    let relative = pathdiff(target, link_dir);
    if link.exists() || link.symlink_metadata().is_ok() {
        std::fs::remove_file(link)?;
    }
    if let Some(parent) = link.parent() {
        std::fs::create_dir_all(parent)?;
    }
    unix::fs::symlink(relative, link)?;
    Ok(())
}

fn pathdiff(target: &Path, from: &Path) -> PathBuf {
    let target_components: Vec<_> = target.components().collect();
    let from_components: Vec<_> = from.components().collect();
    let common = target_components
        .iter()
        .zip(from_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut result = PathBuf::new();
    for _ in common..from_components.len() {
        result.push("..");
    }
    for component in &target_components[common..] {
        result.push(component.as_os_str());
    }
    result
}

/// Per-component metadata relevant to target generation.
#[derive(Debug, Clone, Default)]
pub struct ComponentMetadata {
    pub multi_instance: bool,
    pub library_aliases: HashMap<String, String>,
}

/// Writes the class/defaults/target files and library symlinks for one alias of one
/// component.
pub struct TargetGenerator<'a> {
    pub classes_dir: &'a Path,
    pub targets_dir: &'a Path,
    pub lib_dir: &'a Path,
}

impl TargetGenerator<'_> {
    /// Symlink `<classes>/components/<alias>.yml` and `<classes>/defaults/<alias>.yml`
    /// to the base component's own class/defaults files. Rejects a non-identity alias
    /// for a component that doesn't declare `multi_instance`.
    pub fn link_class_and_defaults(&self, component: &str, alias: &str, metadata: &ComponentMetadata) -> Result<()> {
        if alias != component && !metadata.multi_instance {
            return Err(Error::InstantiationNotSupported {
                component: component.to_string(),
                alias: alias.to_string(),
            });
        }

        let class_target = self.classes_dir.join("components").join(format!("{component}.yml"));
        let class_link = self.classes_dir.join("components").join(format!("{alias}.yml"));
        relsymlink(&class_target, &class_link)?;

        let defaults_target = self.classes_dir.join("defaults").join(format!("{component}.yml"));
        let defaults_link = self.classes_dir.join("defaults").join(format!("{alias}.yml"));
        relsymlink(&defaults_target, &defaults_link)?;

        Ok(())
    }

    /// Write `<targets>/<alias>.yml`.
    pub fn write_target(&self, alias: &str, worktree: &Path, bootstrap: bool) -> Result<()> {
        let mut classes = vec!["params.cluster".to_string()];
        classes.push(format!("defaults.{alias}"));
        classes.push("global.commodore".to_string());
        if !bootstrap {
            classes.push(format!("components.{alias}"));
        }

        let yaml = format!(
            "classes:\n{}\nparameters:\n  _instance: {alias}\n  _base_directory: {}\n  kapitan:\n    vars:\n      target: {alias}\n",
            classes.iter().map(|c| format!("  - {c}")).collect::<Vec<_>>().join("\n"),
            worktree.display(),
        );

        std::fs::create_dir_all(self.targets_dir)?;
        std::fs::write(self.targets_dir.join(format!("{alias}.yml")), yaml)?;
        Ok(())
    }

    /// Symlink a component's declared library aliases under `<lib>/<alias-filename>`.
    /// `other_components` is every other declared component's name, used to reject an
    /// alias that collides with a *different* component's prefix (an alias is expected
    /// to start with its own component's name). `seen` tracks alias filenames already
    /// claimed by another component in this compile, across calls for different
    /// components.
    pub fn link_library_aliases(
        &self,
        component: &str,
        metadata: &ComponentMetadata,
        other_components: &HashSet<String>,
        seen: &mut HashMap<String, String>,
    ) -> Result<()> {
        for (alias_file, real_file) in &metadata.library_aliases {
            for other in other_components {
                if other != component && alias_file.starts_with(other.as_str()) {
                    return Err(Error::LibraryAliasPrefixCollision {
                        alias: alias_file.clone(),
                        component: other.clone(),
                    });
                }
            }
            if let Some(owner) = seen.get(alias_file) {
                if owner != component {
                    return Err(Error::DuplicateLibraryAlias(alias_file.clone()));
                }
            }
            seen.insert(alias_file.clone(), component.to_string());

            let target = self.lib_dir.join(real_file);
            let link = self.lib_dir.join(alias_file);
            relsymlink(&target, &link)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;

    #[sealed_test]
    fn write_target_produces_expected_class_list() {
        let work = std::env::current_dir().unwrap();
        let generator = TargetGenerator {
            classes_dir: &work.join("inventory/classes"),
            targets_dir: &work.join("inventory/targets"),
            lib_dir: &work.join("dependencies/lib"),
        };
        generator.write_target("argocd", &work.join("dependencies/argocd"), false).unwrap();

        let written = std::fs::read_to_string(work.join("inventory/targets/argocd.yml")).unwrap();
        assert!(written.contains("- params.cluster"));
        assert!(written.contains("- defaults.argocd"));
        assert!(written.contains("- components.argocd"));
        assert!(written.contains("_instance: argocd"));
    }

    #[sealed_test]
    fn bootstrap_target_omits_components_class() {
        let work = std::env::current_dir().unwrap();
        let generator = TargetGenerator {
            classes_dir: &work.join("inventory/classes"),
            targets_dir: &work.join("inventory/targets"),
            lib_dir: &work.join("dependencies/lib"),
        };
        generator.write_target("cluster", &work, true).unwrap();
        let written = std::fs::read_to_string(work.join("inventory/targets/cluster.yml")).unwrap();
        assert!(!written.contains("components.cluster"));
    }

    #[sealed_test]
    fn non_identity_alias_without_multi_instance_is_rejected() {
        let work = std::env::current_dir().unwrap();
        std::fs::create_dir_all(work.join("inventory/classes/components")).unwrap();
        std::fs::create_dir_all(work.join("inventory/classes/defaults")).unwrap();
        std::fs::write(work.join("inventory/classes/components/argocd.yml"), "").unwrap();
        std::fs::write(work.join("inventory/classes/defaults/argocd.yml"), "").unwrap();

        let generator = TargetGenerator {
            classes_dir: &work.join("inventory/classes"),
            targets_dir: &work.join("inventory/targets"),
            lib_dir: &work.join("dependencies/lib"),
        };
        let err = generator
            .link_class_and_defaults("argocd", "argocd2", &ComponentMetadata::default())
            .unwrap_err();
        assert!(matches!(err, Error::InstantiationNotSupported { .. }));
    }

    #[sealed_test]
    fn library_alias_prefixed_with_own_component_name_is_allowed() {
        let work = std::env::current_dir().unwrap();
        std::fs::write(work.join("common.libsonnet"), "").unwrap();
        let generator = TargetGenerator {
            classes_dir: &work.join("inventory/classes"),
            targets_dir: &work.join("inventory/targets"),
            lib_dir: &work,
        };
        let mut metadata = ComponentMetadata::default();
        metadata.library_aliases.insert("argocd-common.libsonnet".into(), "common.libsonnet".into());
        let other_components = HashSet::new();
        let mut seen = HashMap::new();
        generator.link_library_aliases("argocd", &metadata, &other_components, &mut seen).unwrap();
        assert!(work.join("argocd-common.libsonnet").symlink_metadata().is_ok());
    }

    #[sealed_test]
    fn library_alias_colliding_with_other_component_prefix_is_rejected() {
        let work = std::env::current_dir().unwrap();
        let generator = TargetGenerator {
            classes_dir: &work.join("inventory/classes"),
            targets_dir: &work.join("inventory/targets"),
            lib_dir: &work.join("dependencies/lib"),
        };
        let mut metadata = ComponentMetadata::default();
        metadata.library_aliases.insert("vault-common.libsonnet".into(), "common.libsonnet".into());
        let other_components: HashSet<String> = ["vault".to_string()].into_iter().collect();
        let mut seen = HashMap::new();
        let err = generator
            .link_library_aliases("argocd", &metadata, &other_components, &mut seen)
            .unwrap_err();
        assert!(matches!(err, Error::LibraryAliasPrefixCollision { .. }));
    }
}
