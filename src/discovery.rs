//! Dependency Discovery & Version Binder.
//!
//! Parses the bootstrap target's `applications` list into component and package names,
//! validates alias uniqueness, and binds each name to a `url`/`version`/`sub_path`
//! triple read from the same target's parameters.

use indexmap::IndexMap;

use crate::{
    error::{Error, Result},
    value::Value,
};

const RESERVED_PACKAGE_NAMES: [&str; 4] = ["components", "defaults", "global", "params"];
const PACKAGE_PREFIX: &str = "pkg.";
const TENANT_PREFIX: &str = "t-";

/// One `applications` entry, parsed from `"<name>"` or `"<name> as <alias>"`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Entry {
    base: String,
    alias: String,
    is_package: bool,
}

fn parse_entry(raw: &str) -> Result<Entry> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(Error::MalformedApplication(raw.to_string()));
    }

    let (base, alias) = match raw.split_once(" as ") {
        Some((base, alias)) if !base.trim().is_empty() && !alias.trim().is_empty() => {
            (base.trim().to_string(), alias.trim().to_string())
        }
        Some(_) => return Err(Error::MalformedApplication(raw.to_string())),
        None => (raw.to_string(), raw.to_string()),
    };

    let is_package = base.starts_with(PACKAGE_PREFIX);
    let base = if is_package { base[PACKAGE_PREFIX.len()..].to_string() } else { base };
    let alias = if is_package && alias.starts_with(PACKAGE_PREFIX) {
        alias[PACKAGE_PREFIX.len()..].to_string()
    } else {
        alias
    };

    if is_package {
        if RESERVED_PACKAGE_NAMES.contains(&base.as_str()) {
            return Err(Error::ReservedPackageName(base));
        }
        if base.starts_with(TENANT_PREFIX) {
            return Err(Error::TenantPrefixedPackageName(base));
        }
    }

    Ok(Entry { base, alias, is_package })
}

/// Result of parsing `applications`: component base names, the alias→base map
/// (including identity aliases), and package names.
#[derive(Debug, Default)]
pub struct Discovery {
    pub component_bases: Vec<String>,
    pub aliases: IndexMap<String, String>,
    pub packages: Vec<String>,
}

/// Parse the `applications` list, in declaration order, enforcing alias uniqueness.
pub fn discover(applications: &[String]) -> Result<Discovery> {
    let mut discovery = Discovery::default();
    let mut alias_owners: IndexMap<String, Vec<String>> = IndexMap::new();

    for raw in applications {
        let entry = parse_entry(raw)?;
        if entry.is_package {
            discovery.packages.push(entry.base);
            continue;
        }

        if !discovery.component_bases.contains(&entry.base) {
            discovery.component_bases.push(entry.base.clone());
        }
        alias_owners.entry(entry.alias.clone()).or_default().push(entry.base.clone());
        discovery.aliases.insert(entry.alias, entry.base);
    }

    for (alias, bases) in &alias_owners {
        let mut distinct = bases.clone();
        distinct.dedup();
        if distinct.len() > 1 {
            return Err(Error::DuplicateAlias {
                alias: alias.clone(),
                bases: distinct,
            });
        }
    }

    for (alias, base) in &discovery.aliases {
        if alias != base && discovery.component_bases.contains(alias) {
            return Err(Error::AliasShadowsComponent {
                alias: alias.clone(),
                base: base.clone(),
            });
        }
    }

    Ok(discovery)
}

/// URL/version/sub-path binding for one component, package, or alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub url: String,
    pub version: Option<String>,
    pub sub_path: Option<String>,
}

fn read_spec(entries: &IndexMap<String, Value>, name: &str, require_version: bool) -> Result<DependencySpec> {
    let entry = entries
        .get(name)
        .and_then(Value::as_map)
        .ok_or_else(|| Error::MissingUrl(name.to_string()))?;

    let url = entry
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::MissingUrl(name.to_string()))?
        .to_string();
    let version = entry.get("version").and_then(Value::as_str).map(str::to_string);
    if require_version && version.is_none() {
        return Err(Error::MissingVersion(name.to_string()));
    }
    let sub_path = entry.get("path").and_then(Value::as_str).map(str::to_string);

    Ok(DependencySpec { url, version, sub_path })
}

/// Bind every discovered component, alias, and package to a [`DependencySpec`], reading
/// `parameters.components.<name>` / `parameters.packages.<name>` from the bootstrap
/// target.
pub fn bind_versions(discovery: &Discovery, parameters: &Value) -> Result<(IndexMap<String, DependencySpec>, IndexMap<String, DependencySpec>)> {
    let components_table = parameters.get_map_at("components").cloned().unwrap_or_default();
    let packages_table = parameters.get_map_at("packages").cloned().unwrap_or_default();

    let mut components = IndexMap::new();
    let mut sorted_bases = discovery.component_bases.clone();
    sorted_bases.sort();
    for base in &sorted_bases {
        components.insert(base.clone(), read_spec(&components_table, base, true)?);
    }

    let mut sorted_aliases: Vec<&String> = discovery.aliases.keys().collect();
    sorted_aliases.sort();
    for alias in sorted_aliases {
        let base = &discovery.aliases[alias];
        if alias == base {
            continue;
        }
        let override_entry = components_table.get(alias).and_then(Value::as_map);
        let base_spec = components.get(base).cloned().ok_or_else(|| Error::UnknownBaseComponent {
            alias: alias.clone(),
            base: base.clone(),
        })?;
        let spec = match override_entry {
            Some(entry) if entry.contains_key("url") => read_spec(&components_table, alias, false)?,
            // A renamed instance may override just `version`/`path`, inheriting the base
            // component's url.
            Some(entry) => DependencySpec {
                url: base_spec.url,
                version: entry.get("version").and_then(Value::as_str).map(str::to_string).or(base_spec.version),
                sub_path: entry.get("path").and_then(Value::as_str).map(str::to_string).or(base_spec.sub_path),
            },
            None => base_spec,
        };
        components.insert(alias.clone(), spec);
    }

    let mut packages = IndexMap::new();
    let mut sorted_packages = discovery.packages.clone();
    sorted_packages.sort();
    for name in &sorted_packages {
        packages.insert(name.clone(), read_spec(&packages_table, name, true)?);
    }

    Ok((components, packages))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apps(entries: &[&str]) -> Vec<String> {
        entries.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_identity_and_renamed_entries() {
        let d = discover(&apps(&["argocd", "vault as secrets", "pkg.shared"])).unwrap();
        assert_eq!(d.component_bases, vec!["argocd".to_string(), "vault".to_string()]);
        assert_eq!(d.aliases.get("secrets"), Some(&"vault".to_string()));
        assert_eq!(d.packages, vec!["shared".to_string()]);
    }

    #[test]
    fn duplicate_alias_across_distinct_bases_is_rejected() {
        let err = discover(&apps(&["argocd as x", "vault as x"])).unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias { .. }));
    }

    #[test]
    fn alias_shadowing_another_base_component_is_rejected() {
        let err = discover(&apps(&["argocd", "vault as argocd"])).unwrap_err();
        assert!(matches!(err, Error::AliasShadowsComponent { .. }));
    }

    #[test]
    fn reserved_package_name_is_rejected() {
        let err = discover(&apps(&["pkg.global"])).unwrap_err();
        assert!(matches!(err, Error::ReservedPackageName(_)));
    }

    #[test]
    fn tenant_prefixed_package_name_is_rejected() {
        let err = discover(&apps(&["pkg.t-acme"])).unwrap_err();
        assert!(matches!(err, Error::TenantPrefixedPackageName(_)));
    }

    fn params_fixture() -> Value {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            r#"
            components:
              argocd:
                url: https://example.com/argocd.git
                version: v1.0.0
              vault:
                url: https://example.com/vault.git
                version: v2.0.0
              secrets:
                version: v3.0.0
            packages:
              shared:
                url: https://example.com/shared.git
                version: v1.0.0
            "#,
        )
        .unwrap();
        Value::from(yaml)
    }

    #[test]
    fn binds_component_and_alias_and_package_versions() {
        let discovery = discover(&apps(&["argocd", "vault as secrets", "pkg.shared"])).unwrap();
        let (components, packages) = bind_versions(&discovery, &params_fixture()).unwrap();
        assert_eq!(components["argocd"].version.as_deref(), Some("v1.0.0"));
        assert_eq!(components["secrets"].version.as_deref(), Some("v3.0.0"));
        assert_eq!(components["secrets"].url, "https://example.com/vault.git");
        assert_eq!(packages["shared"].version.as_deref(), Some("v1.0.0"));
    }

    #[test]
    fn alias_override_without_url_inherits_base_url() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            r#"
            components:
              argocd:
                url: https://example.com/argocd.git
                version: v1.0.0
              secrets:
                version: v9.0.0
            packages: {}
            "#,
        )
        .unwrap();
        let discovery = discover(&apps(&["argocd as secrets"])).unwrap();
        let (components, _) = bind_versions(&discovery, &Value::from(yaml)).unwrap();
        assert_eq!(components["secrets"].url, "https://example.com/argocd.git");
        assert_eq!(components["secrets"].version.as_deref(), Some("v9.0.0"));
    }

    #[test]
    fn alias_override_for_unknown_base_component_is_rejected() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            r#"
            components:
              secrets:
                version: v9.0.0
            packages: {}
            "#,
        )
        .unwrap();
        let mut discovery = Discovery::default();
        discovery.aliases.insert("secrets".to_string(), "vault".to_string());
        let err = bind_versions(&discovery, &Value::from(yaml)).unwrap_err();
        assert!(matches!(err, Error::UnknownBaseComponent { .. }));
    }

    #[test]
    fn missing_version_is_rejected() {
        let yaml: serde_yaml::Value = serde_yaml::from_str(
            r#"
            components:
              argocd:
                url: https://example.com/argocd.git
            packages: {}
            "#,
        )
        .unwrap();
        let discovery = discover(&apps(&["argocd"])).unwrap();
        let err = bind_versions(&discovery, &Value::from(yaml)).unwrap_err();
        assert!(matches!(err, Error::MissingVersion(_)));
    }
}
