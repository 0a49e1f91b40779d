//! Resolves the transitive closure of packages to embed into a dynamic
//! plugin. Implemented with an explicit work-queue (not self-recursion with
//! an accumulator) so deeply nested monorepos don't grow the call stack.

use std::{
    collections::{HashSet, VecDeque},
    path::{Path, PathBuf},
};

use node_semver::{Range, Version};
use regex::Regex;

use plugin_errors::ExportError;

use crate::{
    descriptor::{is_unbuilt_source, PackageDescriptor},
    workspace::{WorkspaceEntry, WorkspaceIndex},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedEmbedded {
    pub package_name: String,
    pub version: String,
    pub dir: PathBuf,
    pub parent_package_name: String,
    pub already_packed: bool,
}

/// Resolves a dependency name to its on-disk location and descriptor when it
/// isn't a monorepo workspace member, i.e. the registry-installed fallback.
/// The production implementation walks `node_modules` the way Node's own
/// module resolution would; tests substitute a map-backed fake.
pub trait ModuleResolver {
    fn resolve(&self, from_dir: &Path, name: &str) -> Option<(PathBuf, PackageDescriptor)>;
}

pub struct NodeModulesResolver;

impl ModuleResolver for NodeModulesResolver {
    fn resolve(&self, from_dir: &Path, name: &str) -> Option<(PathBuf, PackageDescriptor)> {
        let mut dir = from_dir.to_path_buf();
        loop {
            let candidate = dir.join("node_modules").join(name).join("package.json");
            if candidate.is_file() {
                let descriptor = PackageDescriptor::read(&candidate).ok()?;
                return Some((candidate.parent()?.to_path_buf(), descriptor));
            }
            if !dir.pop() {
                return None;
            }
        }
    }
}

struct RoleSuffix {
    pattern: Regex,
}

fn role_suffix_pattern(role: &str) -> Option<RoleSuffix> {
    let pattern = match role {
        "backend-plugin" => r"-backend$",
        "backend-plugin-module" => r"-backend-module-.+$",
        "node-library" => r"-node$",
        _ => return None,
    };
    Regex::new(pattern).ok().map(|pattern| RoleSuffix { pattern })
}

#[derive(Debug)]
pub struct EmbeddingResolution {
    pub resolved: Vec<ResolvedEmbedded>,
    /// seed entries that never showed up anywhere in the transitive
    /// dependency walk; reported as a warning, not a failure
    pub unused_seeds: Vec<String>,
}

pub fn resolve_embedded(
    root_dir: &Path,
    root_descriptor: &PackageDescriptor,
    seed: Vec<String>,
    workspace: &WorkspaceIndex,
    resolver: &dyn ModuleResolver,
    ignore_version_check: bool,
) -> Result<EmbeddingResolution, ExportError> {
    let mut seeds = seed;
    let mut seen_seed_names: HashSet<String> = seeds.iter().cloned().collect();
    let mut used_seeds: HashSet<String> = HashSet::new();

    let mut resolved: Vec<ResolvedEmbedded> = Vec::new();
    let mut resolved_dirs: HashSet<PathBuf> = HashSet::new();

    let mut queue: VecDeque<(PathBuf, PackageDescriptor)> = VecDeque::new();
    queue.push_back((root_dir.to_path_buf(), root_descriptor.clone()));

    while let Some((dir, descriptor)) = queue.pop_front() {
        if let Some(role) = descriptor.role() {
            if let Some(suffix) = role_suffix_pattern(role) {
                if suffix.pattern.is_match(descriptor.name()) {
                    for replacement in ["-common", "-node"] {
                        let candidate = suffix
                            .pattern
                            .replace(descriptor.name(), replacement)
                            .to_string();
                        if candidate != descriptor.name() && !seen_seed_names.contains(&candidate) {
                            seen_seed_names.insert(candidate.clone());
                            seeds.push(candidate);
                        }
                    }
                }
            }
        }

        for (dep, spec) in descriptor.dependencies() {
            if !seeds.contains(&dep) {
                continue;
            }
            used_seeds.insert(dep.clone());

            let (resolved_entry, resolved_dir, resolved_descriptor) =
                if let Some(entry) = workspace.get(&dep) {
                    if !ignore_version_check {
                        resolve_via_workspace(&dep, &spec, entry, &dir)?;
                    }
                    let resolved_descriptor = PackageDescriptor::read(entry.dir.join("package.json"))?;
                    (
                        ResolvedEmbedded {
                            package_name: dep.clone(),
                            version: entry.version.clone(),
                            dir: entry.dir.clone(),
                            parent_package_name: descriptor.name().to_string(),
                            already_packed: false,
                        },
                        entry.dir.clone(),
                        resolved_descriptor,
                    )
                } else if spec.starts_with("workspace:") {
                    return Err(ExportError::MissingWorkspacePackage {
                        name: dep,
                        specifier: spec,
                    });
                } else {
                    let Some((found_dir, found_descriptor)) = resolver.resolve(&dir, &dep) else {
                        continue;
                    };
                    if !ignore_version_check && !semver_satisfies(&spec, found_descriptor.version()) {
                        return Err(ExportError::WorkspaceVersionMismatch {
                            name: dep.clone(),
                            specifier: spec.clone(),
                            actual: found_descriptor.version().to_string(),
                        });
                    }
                    let already_packed = !is_unbuilt_source(found_descriptor.main());
                    (
                        ResolvedEmbedded {
                            package_name: dep.clone(),
                            version: found_descriptor.version().to_string(),
                            dir: found_dir.clone(),
                            parent_package_name: descriptor.name().to_string(),
                            already_packed,
                        },
                        found_dir,
                        found_descriptor,
                    )
                };

            if resolved_descriptor.is_bundled() {
                return Err(ExportError::EmbeddedPackageBundled {
                    name: resolved_entry.package_name.clone(),
                });
            }

            if resolved_dirs.insert(resolved_dir.clone()) {
                resolved.push(resolved_entry);
                queue.push_back((resolved_dir, resolved_descriptor));
            }
        }
    }

    let unused_seeds = seen_seed_names
        .into_iter()
        .filter(|s| !used_seeds.contains(s))
        .collect();

    Ok(EmbeddingResolution {
        resolved,
        unused_seeds,
    })
}

fn resolve_via_workspace(
    name: &str,
    spec: &str,
    entry: &WorkspaceEntry,
    from_dir: &Path,
) -> Result<(), ExportError> {
    let ok = if let Some(suffix) = spec.strip_prefix("workspace:") {
        match suffix {
            "*" | "~" | "^" => true,
            dir_like if dir_like.starts_with('.') => {
                normalize_dir_spec(dir_like) == relative_to(from_dir, &entry.dir)
            }
            range => semver_satisfies_range(range, &entry.version),
        }
    } else {
        semver_satisfies(spec, &entry.version)
    };

    if ok {
        Ok(())
    } else {
        Err(ExportError::WorkspaceVersionMismatch {
            name: name.to_string(),
            specifier: spec.to_string(),
            actual: entry.version.clone(),
        })
    }
}

/// `../sibling/./pkg` -> `../sibling/pkg`, with no trailing slash, so a
/// directory specifier compares equal to `relative_to`'s own normalized form.
fn normalize_dir_spec(spec: &str) -> String {
    let components: Vec<&str> = spec
        .split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect();
    components.join("/")
}

/// The relative path (`/`-separated, independent of the host path separator)
/// from `from` to `to`, used to check a `workspace:<dir>` specifier actually
/// points at the dependency it's attached to rather than some other sibling.
fn relative_to(from: &Path, to: &Path) -> String {
    let from_components: Vec<_> = from.components().collect();
    let to_components: Vec<_> = to.components().collect();

    let common = from_components
        .iter()
        .zip(to_components.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let ups = from_components.len().saturating_sub(common);
    let mut parts: Vec<String> = std::iter::repeat("..".to_string()).take(ups).collect();
    parts.extend(
        to_components[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().to_string()),
    );

    parts.join("/")
}

fn semver_satisfies(range: &str, version: &str) -> bool {
    semver_satisfies_range(range, version)
}

fn semver_satisfies_range(range: &str, version: &str) -> bool {
    let (Ok(range), Ok(version)) = (range.parse::<Range>(), version.parse::<Version>()) else {
        return false;
    };
    range.satisfies(&version)
}
