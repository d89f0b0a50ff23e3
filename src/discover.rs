//! Symlink-aware file discovery under a declared root.
//!
//! The walk never follows symlinks and never leaves the root boundary. Skips
//! are recovered locally as structured warnings, never raised; ambiguous stat
//! results fail closed. Output order is a contract: candidates sort by
//! canonical relative path so downstream warning and diagnostic ordering is
//! reproducible.
use crate::paths::{relative_to_root, ResolvedScope, RootedPath};
use crate::warnings::WarningEvent;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_MAX_DEPTH: usize = 64;

pub fn discover(
    root: &Path,
    scope: &ResolvedScope,
    max_depth: usize,
) -> Result<(Vec<RootedPath>, Vec<WarningEvent>)> {
    let canonical_root = root
        .canonicalize()
        .with_context(|| format!("resolve scan root {}", root.display()))?;
    let root_label = canonical_root.display().to_string();

    let mut candidates: BTreeMap<String, RootedPath> = BTreeMap::new();
    let mut warnings = Vec::new();
    // Overlapping scope entries may hit the same skip twice; warn once.
    let mut warned: BTreeSet<(&'static str, String)> = BTreeSet::new();

    for entry in &scope.entries {
        let (base, base_root) = if let Some(stripped) = entry.strip_prefix('/') {
            // Absolute entries are only present when explicitly allowed; they
            // anchor to the filesystem root instead of the declared root.
            (PathBuf::from(format!("/{stripped}")), PathBuf::from("/"))
        } else if entry == "." {
            (canonical_root.clone(), canonical_root.clone())
        } else {
            (canonical_root.join(entry), canonical_root.clone())
        };

        let resolved = match base.canonicalize() {
            Ok(resolved) => resolved,
            Err(_) => {
                // Missing entries and racing stat failures fail closed.
                push_warning(
                    &mut warnings,
                    &mut warned,
                    WarningEvent::symlink_skipped(&root_label, entry),
                );
                continue;
            }
        };
        if !resolved.starts_with(&base_root) {
            push_warning(
                &mut warnings,
                &mut warned,
                WarningEvent::path_outside_root(
                    &root_label,
                    entry,
                    &resolved.display().to_string(),
                ),
            );
            continue;
        }
        match symlink_in_chain(&base_root, &base) {
            Ok(false) => {}
            Ok(true) | Err(_) => {
                // Stat failures are indistinguishable from a racing symlink
                // swap, so they take the same path.
                push_warning(
                    &mut warnings,
                    &mut warned,
                    WarningEvent::symlink_skipped(&root_label, entry),
                );
                continue;
            }
        }

        let base_depth = relative_to_root(&base_root, &base)
            .map(|rel| rel.split('/').count())
            .unwrap_or(0);
        let walk_depth = max_depth.saturating_sub(base_depth).max(1);

        for walked in WalkDir::new(&base)
            .follow_links(false)
            .max_depth(walk_depth)
            .sort_by_file_name()
        {
            let walked = match walked {
                Ok(walked) => walked,
                Err(err) => {
                    let shown = err
                        .path()
                        .map(|path| path.display().to_string())
                        .unwrap_or_else(|| entry.clone());
                    push_warning(
                        &mut warnings,
                        &mut warned,
                        WarningEvent::symlink_skipped(&root_label, &shown),
                    );
                    continue;
                }
            };
            if walked.path_is_symlink() {
                push_warning(
                    &mut warnings,
                    &mut warned,
                    WarningEvent::symlink_skipped(&root_label, &walked.path().display().to_string()),
                );
                continue;
            }
            if !walked.file_type().is_file() {
                continue;
            }
            let abs = walked.path().to_path_buf();
            match relative_to_root(&base_root, &abs) {
                Some(rel) => {
                    // Entries anchored at the filesystem root keep their
                    // absolute form so the tool addresses the real file no
                    // matter its working directory.
                    let rel = if base_root == Path::new("/") {
                        format!("/{rel}")
                    } else {
                        rel
                    };
                    candidates
                        .entry(rel.clone())
                        .or_insert_with(|| RootedPath::new(abs, rel));
                }
                None if !abs.starts_with(&base_root) => {
                    push_warning(
                        &mut warnings,
                        &mut warned,
                        WarningEvent::path_outside_root(
                            &root_label,
                            entry,
                            &abs.display().to_string(),
                        ),
                    );
                }
                None => {
                    // Names that cannot be carried in the manifest (not valid
                    // UTF-8) fail closed like any other ambiguous candidate.
                    push_warning(
                        &mut warnings,
                        &mut warned,
                        WarningEvent::symlink_skipped(
                            &root_label,
                            &abs.display().to_string(),
                        ),
                    );
                }
            }
        }
    }

    Ok((candidates.into_values().collect(), warnings))
}

fn push_warning(
    warnings: &mut Vec<WarningEvent>,
    warned: &mut BTreeSet<(&'static str, String)>,
    event: WarningEvent,
) {
    let key = (
        event.code.as_str(),
        event
            .path_input
            .clone()
            .or_else(|| event.path_resolved.clone())
            .unwrap_or_default(),
    );
    if warned.insert(key) {
        warnings.push(event);
    }
}

/// True when any component of `abs` below `root` is a symlink. I/O errors
/// propagate so the caller can fail closed.
fn symlink_in_chain(root: &Path, abs: &Path) -> std::io::Result<bool> {
    let mut current = root.to_path_buf();
    let stripped = match abs.strip_prefix(root) {
        Ok(stripped) => stripped,
        // Outside the root entirely; the boundary check reports it.
        Err(_) => return Ok(false),
    };
    for component in stripped.components() {
        current.push(component);
        let metadata = fs::symlink_metadata(&current)?;
        if metadata.file_type().is_symlink() {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::ScopeSource;
    use crate::warnings::WarningCode;
    use std::fs;

    fn scope(entries: &[&str]) -> ResolvedScope {
        ResolvedScope {
            entries: entries.iter().map(|entry| entry.to_string()).collect(),
            source: ScopeSource::Cli,
        }
    }

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"x = 1\n").unwrap();
    }

    #[test]
    fn returns_sorted_files_only() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("src/b.py"));
        touch(&dir.path().join("src/a.py"));
        touch(&dir.path().join("top.py"));
        let (candidates, warnings) = discover(dir.path(), &scope(&["."]), 16).unwrap();
        let rels: Vec<&str> = candidates.iter().map(|c| c.rel()).collect();
        assert_eq!(rels, vec!["src/a.py", "src/b.py", "top.py"]);
        assert!(warnings.is_empty());
    }

    #[test]
    fn overlapping_scope_entries_dedupe() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("src/a.py"));
        let (candidates, _) = discover(dir.path(), &scope(&[".", "src", "src/a.py"]), 16).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].rel(), "src/a.py");
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_entries_are_skipped_with_one_warning() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("real/a.py"));
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("linked")).unwrap();
        std::os::unix::fs::symlink(
            dir.path().join("real/a.py"),
            dir.path().join("alias.py"),
        )
        .unwrap();
        let (candidates, warnings) = discover(dir.path(), &scope(&["."]), 16).unwrap();
        let rels: Vec<&str> = candidates.iter().map(|c| c.rel()).collect();
        assert_eq!(rels, vec!["real/a.py"]);
        let symlink_warnings: Vec<_> = warnings
            .iter()
            .filter(|w| w.code == WarningCode::SymlinkSkipped)
            .collect();
        assert_eq!(symlink_warnings.len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn scope_entry_through_symlink_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("real/a.py"));
        std::os::unix::fs::symlink(dir.path().join("real"), dir.path().join("linked")).unwrap();
        let (candidates, warnings) = discover(dir.path(), &scope(&["linked"]), 16).unwrap();
        assert!(candidates.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::SymlinkSkipped);
    }

    #[cfg(unix)]
    #[test]
    fn scope_entry_resolving_outside_root_is_reported() {
        let outside = tempfile::tempdir().unwrap();
        touch(&outside.path().join("x.py"));
        let root = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("vendored")).unwrap();
        let (candidates, warnings) = discover(root.path(), &scope(&["vendored"]), 16).unwrap();
        assert!(candidates.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::PathOutsideRoot);
        assert_eq!(warnings[0].path_input.as_deref(), Some("vendored"));
    }

    #[cfg(unix)]
    #[test]
    fn absolute_entries_keep_their_anchor() {
        let outside = tempfile::tempdir().unwrap();
        let file = outside.path().canonicalize().unwrap().join("x.py");
        touch(&file);
        let root = tempfile::tempdir().unwrap();
        let entry = file.display().to_string();
        let (candidates, warnings) = discover(root.path(), &scope(&[entry.as_str()]), 16).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(candidates.len(), 1);
        // The canonical form stays absolute; a tool invoked with any working
        // directory still resolves the real file.
        assert_eq!(candidates[0].rel(), entry);
        assert_eq!(candidates[0].abs(), Path::new(&entry));
    }

    #[cfg(unix)]
    #[test]
    fn undecodable_names_are_skipped() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("ok.py"));
        fs::write(dir.path().join(OsStr::from_bytes(b"bad\xff.py")), b"x = 1\n").unwrap();
        let (candidates, warnings) = discover(dir.path(), &scope(&["."]), 16).unwrap();
        let rels: Vec<&str> = candidates.iter().map(|c| c.rel()).collect();
        assert_eq!(rels, vec!["ok.py"]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::SymlinkSkipped);
    }

    #[test]
    fn missing_scope_entry_fails_closed() {
        let dir = tempfile::tempdir().unwrap();
        let (candidates, warnings) = discover(dir.path(), &scope(&["absent"]), 16).unwrap();
        assert!(candidates.is_empty());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].code, WarningCode::SymlinkSkipped);
    }

    #[test]
    fn max_depth_limits_the_walk() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("a.py"));
        touch(&dir.path().join("deep/nested/b.py"));
        let (candidates, _) = discover(dir.path(), &scope(&["."]), 1).unwrap();
        let rels: Vec<&str> = candidates.iter().map(|c| c.rel()).collect();
        assert_eq!(rels, vec!["a.py"]);
    }
}
