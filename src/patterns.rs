//! Include/exclude pattern compilation and candidate filtering.
//!
//! Patterns are parsed once per run and immutable afterward. Evaluation is
//! exclude-wins: a matching exclude drops a candidate unless an at least as
//! specific negated exclude re-includes it, which permits exceptions
//! underneath an excluded ancestor directory.
use crate::paths::RootedPath;
use crate::warnings::WarningEvent;
use anyhow::{bail, Result};

/// Pattern shape, decided at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Single segment, no wildcards. Matches the candidate basename.
    Literal,
    /// Single segment with wildcards. Matches the candidate basename.
    Wildcard,
    /// Multiple segments. Anchored patterns match from the root; floating
    /// patterns match starting at any segment boundary.
    MultiSegment,
}

/// A parsed include or exclude token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSpec {
    pub raw: String,
    pub anchored: bool,
    pub directory_only: bool,
    pub negated: bool,
    pub segments: Vec<String>,
    pub kind: PatternKind,
}

impl PatternSpec {
    /// Parse one raw token. Negation is legal only when `allow_negation` is
    /// set (excludes); anywhere else it is a configuration error.
    pub fn parse(raw: &str, allow_negation: bool) -> Result<Self> {
        let mut rest = raw;
        let negated = rest.starts_with('!');
        if negated {
            if !allow_negation {
                bail!("negated pattern {raw} is only legal in excludes");
            }
            rest = &rest[1..];
        }
        let anchored = rest.starts_with('/');
        if anchored {
            rest = &rest[1..];
        }
        let directory_only = rest.ends_with('/');
        if directory_only {
            rest = &rest[..rest.len() - 1];
        }
        if rest.is_empty() {
            bail!("pattern {raw} is empty after stripping markers");
        }
        let segments: Vec<String> = rest.split('/').map(str::to_string).collect();
        if segments.iter().any(String::is_empty) {
            bail!("pattern {raw} contains an empty segment");
        }
        let kind = if segments.len() > 1 {
            PatternKind::MultiSegment
        } else if segments[0].contains(['*', '?']) {
            PatternKind::Wildcard
        } else {
            PatternKind::Literal
        };
        Ok(PatternSpec {
            raw: raw.to_string(),
            anchored,
            directory_only,
            negated,
            segments,
            kind,
        })
    }

    /// Test one candidate, given as its canonical relative segments.
    pub fn matches(&self, candidate: &[&str]) -> bool {
        if candidate.is_empty() {
            return false;
        }
        match self.kind {
            PatternKind::Literal | PatternKind::Wildcard => {
                if self.directory_only {
                    // Subtree match on any directory segment (first segment
                    // only when anchored). The final segment is the file
                    // itself and cannot name a directory.
                    let dirs = &candidate[..candidate.len() - 1];
                    if self.anchored {
                        dirs.first()
                            .is_some_and(|segment| glob_segment(&self.segments[0], segment))
                    } else {
                        dirs.iter()
                            .any(|segment| glob_segment(&self.segments[0], segment))
                    }
                } else if self.anchored {
                    candidate.len() == 1 && glob_segment(&self.segments[0], candidate[0])
                } else {
                    glob_segment(&self.segments[0], candidate[candidate.len() - 1])
                }
            }
            PatternKind::MultiSegment => {
                let starts: Vec<usize> = if self.anchored {
                    vec![0]
                } else {
                    (0..candidate.len()).collect()
                };
                starts.into_iter().any(|start| {
                    let run = &candidate[start..];
                    if run.len() < self.segments.len() {
                        return false;
                    }
                    let aligned = self
                        .segments
                        .iter()
                        .zip(run)
                        .all(|(pattern, segment)| glob_segment(pattern, segment));
                    if !aligned {
                        return false;
                    }
                    // Directory patterns cover the whole subtree; file
                    // patterns must consume through the final segment.
                    self.directory_only || run.len() == self.segments.len()
                })
            }
        }
    }

    /// Rank used to decide whether a negated exclude is specific enough to
    /// override a matching exclude. More segments beat fewer; a file pattern
    /// beats a directory pattern of the same depth.
    fn specificity(&self) -> usize {
        self.segments.len() * 2 + usize::from(!self.directory_only)
    }
}

/// Segment-level glob: `*` matches any run, `?` matches one character.
fn glob_segment(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();
    glob_chars(&pattern, &text)
}

fn glob_chars(pattern: &[char], text: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('*') => {
            (0..=text.len()).any(|skip| glob_chars(&pattern[1..], &text[skip..]))
        }
        Some('?') => !text.is_empty() && glob_chars(&pattern[1..], &text[1..]),
        Some(ch) => text.first() == Some(ch) && glob_chars(&pattern[1..], &text[1..]),
    }
}

/// Compiled include/exclude sets for one run.
#[derive(Debug, Clone)]
pub struct EffectiveScope {
    pub includes: Vec<PatternSpec>,
    pub excludes: Vec<PatternSpec>,
}

/// Per-pattern match counts, in pattern order. Used for unmatched-pattern
/// diagnostics.
#[derive(Debug, Clone, Default)]
pub struct EvalStats {
    pub include_matches: Vec<usize>,
    pub exclude_matches: Vec<usize>,
}

pub fn compile_scope(includes: &[String], excludes: &[String]) -> Result<EffectiveScope> {
    let includes = includes
        .iter()
        .map(|raw| PatternSpec::parse(raw, false))
        .collect::<Result<Vec<_>>>()?;
    let excludes = excludes
        .iter()
        .map(|raw| PatternSpec::parse(raw, true))
        .collect::<Result<Vec<_>>>()?;
    Ok(EffectiveScope { includes, excludes })
}

/// Filter discovered candidates into the eligible set. Candidates arrive and
/// leave in canonical sorted order.
pub fn evaluate(scope: &EffectiveScope, candidates: &[RootedPath]) -> (Vec<RootedPath>, EvalStats) {
    let mut stats = EvalStats {
        include_matches: vec![0; scope.includes.len()],
        exclude_matches: vec![0; scope.excludes.len()],
    };
    let mut eligible = Vec::new();
    for candidate in candidates {
        // Filesystem-root-anchored candidates carry a leading slash; the
        // empty leading segment is not a matchable component.
        let segments: Vec<&str> = candidate
            .rel()
            .split('/')
            .filter(|segment| !segment.is_empty())
            .collect();
        let mut excluded_specificity: Option<usize> = None;
        let mut reinclude_specificity: Option<usize> = None;
        for (idx, exclude) in scope.excludes.iter().enumerate() {
            if !exclude.matches(&segments) {
                continue;
            }
            stats.exclude_matches[idx] += 1;
            let rank = exclude.specificity();
            let slot = if exclude.negated {
                &mut reinclude_specificity
            } else {
                &mut excluded_specificity
            };
            *slot = Some(slot.map_or(rank, |prev| prev.max(rank)));
        }
        let dropped = match (excluded_specificity, reinclude_specificity) {
            (Some(excl), Some(reinc)) => reinc < excl,
            (Some(_), None) => true,
            (None, _) => false,
        };
        if dropped {
            continue;
        }
        let mut included = scope.includes.is_empty();
        for (idx, include) in scope.includes.iter().enumerate() {
            if include.matches(&segments) {
                stats.include_matches[idx] += 1;
                included = true;
            }
        }
        if included {
            eligible.push(candidate.clone());
        }
    }
    (eligible, stats)
}

/// Warnings for patterns that matched nothing, in deterministic pattern order
/// (includes before excludes). Patterns sourced from defaults never warn.
pub fn unmatched_pattern_warnings(
    root: &str,
    scope: &EffectiveScope,
    stats: &EvalStats,
    from_default_includes: bool,
    from_default_excludes: bool,
) -> Vec<WarningEvent> {
    let mut warnings = Vec::new();
    if !from_default_includes {
        for (pattern, count) in scope.includes.iter().zip(&stats.include_matches) {
            if *count == 0 {
                warnings.push(WarningEvent::pattern_unmatched(root, &pattern.raw));
            }
        }
    }
    if !from_default_excludes {
        for (pattern, count) in scope.excludes.iter().zip(&stats.exclude_matches) {
            if *count == 0 {
                warnings.push(WarningEvent::pattern_unmatched(root, &pattern.raw));
            }
        }
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paths::RootedPath;
    use std::path::PathBuf;

    fn candidate(rel: &str) -> RootedPath {
        RootedPath::new(PathBuf::from(format!("/repo/{rel}")), rel.to_string())
    }

    fn scope(includes: &[&str], excludes: &[&str]) -> EffectiveScope {
        let includes: Vec<String> = includes.iter().map(|s| s.to_string()).collect();
        let excludes: Vec<String> = excludes.iter().map(|s| s.to_string()).collect();
        compile_scope(&includes, &excludes).unwrap()
    }

    #[test]
    fn parse_classifies_kinds_and_markers() {
        let literal = PatternSpec::parse("b.py", true).unwrap();
        assert_eq!(literal.kind, PatternKind::Literal);
        assert!(!literal.anchored && !literal.directory_only && !literal.negated);

        let wildcard = PatternSpec::parse("*.pyi", true).unwrap();
        assert_eq!(wildcard.kind, PatternKind::Wildcard);

        let multi = PatternSpec::parse("/src/gen/", true).unwrap();
        assert_eq!(multi.kind, PatternKind::MultiSegment);
        assert!(multi.anchored && multi.directory_only);

        let negated = PatternSpec::parse("!vendor/keep.py", true).unwrap();
        assert!(negated.negated);
    }

    #[test]
    fn negation_is_illegal_in_includes() {
        assert!(PatternSpec::parse("!a.py", false).is_err());
        assert!(compile_scope(&["!a.py".to_string()], &[]).is_err());
    }

    #[test]
    fn basename_patterns_match_at_any_depth() {
        let spec = PatternSpec::parse("b.py", true).unwrap();
        assert!(spec.matches(&["b.py"]));
        assert!(spec.matches(&["src", "b.py"]));
        assert!(!spec.matches(&["src", "b.pyx"]));

        let wild = PatternSpec::parse("*.py", true).unwrap();
        assert!(wild.matches(&["src", "deep", "a.py"]));
        assert!(!wild.matches(&["src", "a.rs"]));
    }

    #[test]
    fn anchored_single_segment_matches_root_files_only() {
        let spec = PatternSpec::parse("/setup.py", true).unwrap();
        assert!(spec.matches(&["setup.py"]));
        assert!(!spec.matches(&["pkg", "setup.py"]));
    }

    #[test]
    fn directory_patterns_cover_the_subtree() {
        let floating = PatternSpec::parse("gen/", true).unwrap();
        assert!(floating.matches(&["src", "gen", "a.py"]));
        assert!(floating.matches(&["gen", "a.py"]));
        assert!(!floating.matches(&["src", "gen"]));

        let anchored = PatternSpec::parse("/gen/", true).unwrap();
        assert!(anchored.matches(&["gen", "a.py"]));
        assert!(!anchored.matches(&["src", "gen", "a.py"]));
    }

    #[test]
    fn multi_segment_floating_matches_any_boundary() {
        let spec = PatternSpec::parse("tests/data.py", true).unwrap();
        assert!(spec.matches(&["tests", "data.py"]));
        assert!(spec.matches(&["pkg", "tests", "data.py"]));
        assert!(!spec.matches(&["tests", "deep", "data.py"]));
    }

    #[test]
    fn exclude_drops_unless_negated_exception_matches() {
        let scope = scope(&[], &["vendor/", "!vendor/keep.py"]);
        let candidates = vec![
            candidate("src/a.py"),
            candidate("vendor/dropped.py"),
            candidate("vendor/keep.py"),
        ];
        let (eligible, _) = evaluate(&scope, &candidates);
        let rels: Vec<&str> = eligible.iter().map(|c| c.rel()).collect();
        assert_eq!(rels, vec!["src/a.py", "vendor/keep.py"]);
    }

    #[test]
    fn less_specific_negation_does_not_override() {
        // A basename-level negation is broader than an exact path exclude.
        let scope = scope(&[], &["vendor/dropped.py", "!dropped.py"]);
        let candidates = vec![candidate("vendor/dropped.py")];
        let (eligible, _) = evaluate(&scope, &candidates);
        assert!(eligible.is_empty());
    }

    #[test]
    fn includes_gate_when_present() {
        let scope = scope(&["*.py"], &[]);
        let candidates = vec![candidate("src/a.py"), candidate("README.md")];
        let (eligible, stats) = evaluate(&scope, &candidates);
        assert_eq!(eligible.len(), 1);
        assert_eq!(stats.include_matches, vec![1]);
    }

    #[test]
    fn unmatched_patterns_warn_in_pattern_order() {
        let scope = scope(&["*.rs", "*.py"], &["missing/"]);
        let candidates = vec![candidate("src/a.py")];
        let (_, stats) = evaluate(&scope, &candidates);
        let warnings = unmatched_pattern_warnings("repo", &scope, &stats, false, false);
        let patterns: Vec<&str> = warnings
            .iter()
            .filter_map(|w| w.pattern.as_deref())
            .collect();
        assert_eq!(patterns, vec!["*.rs", "missing/"]);
    }

    #[test]
    fn default_sourced_patterns_never_warn() {
        let scope = scope(&["*.rs"], &[]);
        let (_, stats) = evaluate(&scope, &[]);
        assert!(unmatched_pattern_warnings("repo", &scope, &stats, true, true).is_empty());
    }

    #[test]
    fn end_to_end_exclude_scenario() {
        let scope = scope(&[], &["b.py"]);
        let candidates = vec![candidate("src/a.py"), candidate("src/b.py")];
        let (eligible, stats) = evaluate(&scope, &candidates);
        let rels: Vec<&str> = eligible.iter().map(|c| c.rel()).collect();
        assert_eq!(rels, vec!["src/a.py"]);
        assert_eq!(stats.exclude_matches, vec![1]);
    }
}
