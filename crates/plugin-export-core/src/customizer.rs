//! Rewrites a packaged descriptor into the form a dynamic plugin actually
//! ships with: drops references to files that only exist pre-export, moves
//! shared (host-provided) dependencies into `peerDependencies`, turns
//! workspace-protocol dependencies into concrete ranges (or drops them when
//! they're embedded instead), renames to the `-dynamic` package, and applies
//! the few compatibility pins the export format is known to need.

use node_semver::{Range, Version};

use plugin_errors::ExportError;

use crate::{
    descriptor::{embedded_slug, DependencyMap, PackageDescriptor, WorkspaceSpecifier},
    embedding::ResolvedEmbedded,
    shared_rules::SharedPackagesRules,
    workspace::WorkspaceIndex,
};

const AWS_UTF8_BROWSER: &str = "@aws-sdk/util-utf8-browser";
const AWS_UTF8_PIN: &str = "npm:@smithy/util-utf8@^2";

pub struct CustomizeContext<'a> {
    pub workspace: &'a WorkspaceIndex,
    pub shared: &'a SharedPackagesRules,
    pub embedded: &'a [ResolvedEmbedded],
    /// renames the package to `<original>-dynamic`, marks `bundleDependencies`,
    /// and empties `scripts` — the overriding step every export applies
    pub rename_to_dynamic: bool,
    pub additional_overrides: DependencyMap,
    pub additional_resolutions: DependencyMap,
}

pub type AfterHook<'a> = dyn Fn(&mut PackageDescriptor) -> Result<(), ExportError> + 'a;

pub fn customize(
    descriptor: &mut PackageDescriptor,
    ctx: &CustomizeContext,
    after: Option<&AfterHook>,
) -> Result<(), ExportError> {
    strip_dist_dynamic_files(descriptor);
    rewrite_dependencies(descriptor, ctx)?;
    descriptor.set_dev_dependencies(DependencyMap::new());

    if ctx.rename_to_dynamic {
        let dynamic_name = format!("{}-dynamic", descriptor.name());
        descriptor.set_name(dynamic_name);
        descriptor.set_bool("bundleDependencies", true);
        descriptor.set_scripts(DependencyMap::new());
    }

    merge_overrides_and_resolutions(descriptor, ctx);

    if let Some(hook) = after {
        hook(descriptor)?;
    }
    Ok(())
}

fn strip_dist_dynamic_files(descriptor: &mut PackageDescriptor) {
    let files: Vec<String> = descriptor
        .files()
        .into_iter()
        .filter(|f| !f.starts_with("dist-dynamic/"))
        .collect();
    descriptor.set_files(files);
}

/// Every dependency the shared-package policy matches moves into
/// `peerDependencies` instead of `dependencies` — regardless of whether its
/// specifier is workspace-protocol — since a shared package is resolved
/// against the host's copy at runtime, never installed alongside the plugin.
fn rewrite_dependencies(descriptor: &mut PackageDescriptor, ctx: &CustomizeContext) -> Result<(), ExportError> {
    let embedded_names: std::collections::HashSet<&str> =
        ctx.embedded.iter().map(|e| e.package_name.as_str()).collect();

    let mut dependencies = DependencyMap::new();
    let mut peer_dependencies = descriptor.peer_dependencies();

    for (name, spec) in descriptor.dependencies() {
        if embedded_names.contains(name.as_str()) {
            // embedded packages ship inlined under embedded/<slug>, not as a dependency
            continue;
        }

        let resolved_spec = match WorkspaceSpecifier::parse(&spec) {
            Some(parsed) => {
                let entry = ctx.workspace.get(&name).ok_or_else(|| ExportError::UnresolvedWorkspaceDep {
                    name: name.clone(),
                    specifier: spec.clone(),
                })?;
                parsed.render(&entry.version)
            }
            None => spec,
        };

        if ctx.shared.is_shared(&name) {
            peer_dependencies.insert(name, resolved_spec);
        } else {
            dependencies.insert(name, resolved_spec);
        }
    }

    descriptor.set_dependencies(dependencies);
    descriptor.set_peer_dependencies(peer_dependencies);
    Ok(())
}

fn merge_overrides_and_resolutions(descriptor: &mut PackageDescriptor, ctx: &CustomizeContext) {
    let mut overrides = descriptor.overrides();
    overrides.extend(ctx.additional_overrides.clone());
    overrides
        .entry(AWS_UTF8_BROWSER.to_string())
        .or_insert_with(|| AWS_UTF8_PIN.to_string());
    descriptor.set_overrides(overrides);

    let mut resolutions = descriptor.resolutions();
    for embedded in ctx.embedded {
        resolutions.insert(
            embedded.package_name.clone(),
            format!("file:./embedded/{}", embedded_slug(&embedded.package_name)),
        );
    }
    resolutions.extend(ctx.additional_resolutions.clone());
    resolutions
        .entry(AWS_UTF8_BROWSER.to_string())
        .or_insert_with(|| AWS_UTF8_PIN.to_string());
    descriptor.set_resolutions(resolutions);
}

/// Merges an embedded package's peer dependencies into the root descriptor.
/// A conflicting range is resolved by checking whether the two ranges'
/// version anchors mutually satisfy each other (an explicit intersection
/// check) rather than silently picking last-writer-wins.
pub fn hoist_peer_dependencies(
    root: &mut PackageDescriptor,
    embedded_descriptors: &[PackageDescriptor],
) -> Result<(), ExportError> {
    let mut hoisted = root.peer_dependencies();

    for embedded in embedded_descriptors {
        for (name, spec) in embedded.peer_dependencies() {
            match hoisted.get(&name).cloned() {
                None => {
                    hoisted.insert(name, spec);
                }
                Some(existing) if existing == spec => {}
                Some(existing) => match intersect_peer_range(&existing, &spec) {
                    Some(merged) => {
                        hoisted.insert(name, merged);
                    }
                    None => {
                        return Err(ExportError::PeerDependencyConflict {
                            name,
                            left: existing,
                            right: spec,
                        });
                    }
                },
            }
        }
    }

    root.set_peer_dependencies(hoisted);
    Ok(())
}

fn intersect_peer_range(a: &str, b: &str) -> Option<String> {
    let (range_a, anchor_a) = (a.parse::<Range>().ok()?, extract_anchor(a)?);
    let (range_b, anchor_b) = (b.parse::<Range>().ok()?, extract_anchor(b)?);

    let a_allows_b = range_a.satisfies(&anchor_b);
    let b_allows_a = range_b.satisfies(&anchor_a);

    if a_allows_b && b_allows_a {
        Some(if anchor_a >= anchor_b { a.to_string() } else { b.to_string() })
    } else if a_allows_b {
        Some(b.to_string())
    } else if b_allows_a {
        Some(a.to_string())
    } else {
        None
    }
}

fn extract_anchor(spec: &str) -> Option<Version> {
    let trimmed = spec.trim_start_matches(['^', '~', '>', '=', '<', ' ']);
    trimmed.split_whitespace().next()?.parse::<Version>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(json: &str) -> PackageDescriptor {
        PackageDescriptor::from_str(json).unwrap()
    }

    fn empty_ctx<'a>(workspace: &'a WorkspaceIndex, shared: &'a SharedPackagesRules) -> CustomizeContext<'a> {
        CustomizeContext {
            workspace,
            shared,
            embedded: &[],
            rename_to_dynamic: false,
            additional_overrides: DependencyMap::new(),
            additional_resolutions: DependencyMap::new(),
        }
    }

    #[test]
    fn strips_dist_dynamic_prefixed_files_entries() {
        let mut d = descriptor(r#"{"name": "x", "files": ["dist", "dist-dynamic/index.js"]}"#);
        strip_dist_dynamic_files(&mut d);
        assert_eq!(d.files(), vec!["dist".to_string()]);
    }

    #[test]
    fn dev_dependencies_are_emptied() {
        let workspace = WorkspaceIndex::default();
        let shared = SharedPackagesRules::default();
        let ctx = empty_ctx(&workspace, &shared);
        let mut d = descriptor(r#"{"name": "x", "devDependencies": {"jest": "^29.0.0"}}"#);
        customize(&mut d, &ctx, None).unwrap();
        assert!(d.dev_dependencies().is_empty());
    }

    #[test]
    fn shared_dependency_moves_from_dependencies_to_peer_dependencies() {
        // matches the end-to-end scenario of exporting a backend plugin that
        // depends on a @backstage/ scoped package alongside an ordinary one
        let workspace = WorkspaceIndex::default();
        let shared = SharedPackagesRules::from_cli(&[]).unwrap();
        let ctx = empty_ctx(&workspace, &shared);
        let mut d = descriptor(
            r#"{"name": "x", "dependencies": {"@backstage/core": "^1.0.0", "lodash": "^4.0.0"}}"#,
        );

        customize(&mut d, &ctx, None).unwrap();

        let deps = d.dependencies();
        let peers = d.peer_dependencies();
        assert_eq!(deps.get("lodash").unwrap(), "^4.0.0");
        assert!(!deps.contains_key("@backstage/core"));
        assert_eq!(peers.get("@backstage/core").unwrap(), "^1.0.0");
    }

    #[test]
    fn rename_to_dynamic_sets_name_bundle_flag_and_clears_scripts() {
        let workspace = WorkspaceIndex::default();
        let shared = SharedPackagesRules::default();
        let mut ctx = empty_ctx(&workspace, &shared);
        ctx.rename_to_dynamic = true;
        let mut d = descriptor(r#"{"name": "@x/foo", "scripts": {"build": "tsc"}}"#);

        customize(&mut d, &ctx, None).unwrap();

        assert_eq!(d.name(), "@x/foo-dynamic");
        assert!(d.scripts().is_empty());
    }

    #[test]
    fn embedded_packages_get_file_resolutions() {
        let workspace = WorkspaceIndex::default();
        let shared = SharedPackagesRules::default();
        let embedded = vec![ResolvedEmbedded {
            package_name: "@x/foo-common".to_string(),
            version: "1.0.0".to_string(),
            dir: std::path::PathBuf::from("/workspace/packages/foo-common"),
            parent_package_name: "@x/foo-backend".to_string(),
            already_packed: false,
        }];
        let ctx = CustomizeContext {
            workspace: &workspace,
            shared: &shared,
            embedded: &embedded,
            rename_to_dynamic: false,
            additional_overrides: DependencyMap::new(),
            additional_resolutions: DependencyMap::new(),
        };
        let mut d = descriptor(r#"{"name": "x"}"#);

        customize(&mut d, &ctx, None).unwrap();

        assert_eq!(
            d.resolutions().get("@x/foo-common").unwrap(),
            "file:./embedded/x-foo-common"
        );
    }

    #[test]
    fn applies_aws_sdk_compatibility_pin() {
        let workspace = WorkspaceIndex::default();
        let shared = SharedPackagesRules::default();
        let ctx = empty_ctx(&workspace, &shared);
        let mut d = descriptor(r#"{"name": "x"}"#);
        customize(&mut d, &ctx, None).unwrap();
        assert_eq!(d.overrides().get(AWS_UTF8_BROWSER).unwrap(), AWS_UTF8_PIN);
    }

    #[test]
    fn compatible_peer_ranges_intersect_to_the_narrower() {
        let merged = intersect_peer_range("^1.0.0", "^1.5.0").unwrap();
        assert_eq!(merged, "^1.5.0");
    }

    #[test]
    fn incompatible_peer_ranges_fail() {
        assert!(intersect_peer_range("^1.0.0", "^2.0.0").is_none());
    }

    #[test]
    fn hoisting_detects_conflicting_peer_dependency() {
        let mut root = descriptor(r#"{"name": "x", "peerDependencies": {"react": "^17.0.0"}}"#);
        let embedded = vec![descriptor(
            r#"{"name": "y", "peerDependencies": {"react": "^18.0.0"}}"#,
        )];
        let err = hoist_peer_dependencies(&mut root, &embedded).unwrap_err();
        assert!(matches!(err, ExportError::PeerDependencyConflict { .. }));
    }
}
