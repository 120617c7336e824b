//! Import alias resolution (e.g., "@/components/Foo.vue" → "/project/src/components/Foo.vue").
//!
//! Rules are tried in the order they were configured and the first match
//! wins, so a specific prefix such as `@components` must come before a
//! general one such as `@`.

use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::{Error, Result};

/// A single prefix → directory mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasRule {
    prefix: String,
    target: PathBuf,
}

impl AliasRule {
    /// Create a rule. The target must be absolute; it is stored normalized.
    pub fn new(prefix: impl Into<String>, target: impl AsRef<Path>) -> Result<Self> {
        let prefix = prefix.into();
        let target = target.as_ref();

        if prefix.is_empty() {
            return Err(Error::configuration("alias prefix cannot be empty"));
        }
        if !target.is_absolute() {
            return Err(Error::configuration(format!(
                "alias '{}' must point to an absolute path, got '{}'",
                prefix,
                target.display()
            )));
        }

        Ok(Self {
            prefix,
            target: target.clean(),
        })
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Returns the part of `specifier` after the prefix when this rule applies.
    ///
    /// A prefix only matches whole path segments: `@` matches `@` and `@/x`
    /// but not the scoped package `@vue/runtime-core`. A prefix that already
    /// ends in `/` matches anything starting with it.
    fn match_remainder<'s>(&self, specifier: &'s str) -> Option<&'s str> {
        let rest = specifier.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() || self.prefix.ends_with('/') || rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

/// Outcome of [`AliasResolver::resolve`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The specifier matched a rule and maps to this absolute path.
    Resolved(PathBuf),
    /// No rule matched; fall through to default module resolution.
    Unresolved,
}

impl Resolution {
    pub fn path(&self) -> Option<&Path> {
        match self {
            Resolution::Resolved(path) => Some(path),
            Resolution::Unresolved => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolution::Resolved(_))
    }
}

/// Ordered set of alias rules.
///
/// Immutable once configured, so a configured resolver can be shared across
/// threads behind an `Arc` and queried without locking.
#[derive(Debug, Clone, Default)]
pub struct AliasResolver {
    rules: Vec<AliasRule>,
}

impl AliasResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a resolver from `(prefix, target)` pairs in match order.
    ///
    /// # Example
    ///
    /// ```
    /// use kiln_core::{AliasResolver, Resolution};
    /// use std::path::PathBuf;
    ///
    /// let resolver = AliasResolver::from_pairs([("@", "/project/src")]).unwrap();
    /// assert_eq!(
    ///     resolver.resolve("@/components/Foo.vue").unwrap(),
    ///     Resolution::Resolved(PathBuf::from("/project/src/components/Foo.vue"))
    /// );
    /// assert_eq!(resolver.resolve("vue").unwrap(), Resolution::Unresolved);
    /// ```
    pub fn from_pairs<I, P, T>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (P, T)>,
        P: Into<String>,
        T: AsRef<Path>,
    {
        let rules = pairs
            .into_iter()
            .map(|(prefix, target)| AliasRule::new(prefix, target))
            .collect::<Result<Vec<_>>>()?;
        let mut resolver = Self::new();
        resolver.configure(rules)?;
        Ok(resolver)
    }

    /// Replace the active rule set.
    ///
    /// Fails on duplicate prefixes. Rules shadowed by an earlier, more
    /// general rule are accepted but logged.
    pub fn configure(&mut self, rules: impl IntoIterator<Item = AliasRule>) -> Result<()> {
        let rules: Vec<AliasRule> = rules.into_iter().collect();

        for (i, rule) in rules.iter().enumerate() {
            if rules[..i].iter().any(|earlier| earlier.prefix == rule.prefix) {
                return Err(Error::configuration(format!(
                    "alias prefix '{}' is configured more than once",
                    rule.prefix
                )));
            }
        }

        self.rules = rules;

        for (earlier, later) in self.shadowed() {
            tracing::warn!(
                earlier,
                later,
                "alias '{later}' can never match because '{earlier}' is listed before it"
            );
        }

        tracing::debug!(rules = self.rules.len(), "configured alias rules");
        Ok(())
    }

    pub fn rules(&self) -> &[AliasRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Pairs of `(earlier, later)` prefixes where the earlier rule captures
    /// every specifier the later one would match.
    pub fn shadowed(&self) -> Vec<(&str, &str)> {
        let mut pairs = Vec::new();
        for (i, later) in self.rules.iter().enumerate() {
            if let Some(earlier) = self.rules[..i]
                .iter()
                .find(|earlier| earlier.match_remainder(&later.prefix).is_some())
            {
                pairs.push((earlier.prefix.as_str(), later.prefix.as_str()));
            }
        }
        pairs
    }

    /// Resolve an import specifier against the configured rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PathEscape`] when the part after the prefix climbs
    /// out of the rule's target with `..`.
    pub fn resolve(&self, specifier: &str) -> Result<Resolution> {
        for rule in &self.rules {
            let Some(rest) = rule.match_remainder(specifier) else {
                continue;
            };

            let rest = rest.trim_start_matches('/');
            if rest.is_empty() {
                return Ok(Resolution::Resolved(rule.target.clone()));
            }

            let resolved = rule.target.join(rest).clean();
            if !resolved.starts_with(&rule.target) {
                return Err(Error::PathEscape {
                    specifier: specifier.to_string(),
                    root: rule.target.clone(),
                });
            }

            tracing::trace!(specifier, resolved = %resolved.display(), "alias matched");
            return Ok(Resolution::Resolved(resolved));
        }

        Ok(Resolution::Unresolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(pairs: &[(&str, &str)]) -> AliasResolver {
        AliasResolver::from_pairs(pairs.iter().copied()).unwrap()
    }

    #[test]
    fn resolves_prefixed_specifier() {
        let r = resolver(&[("@", "/project/src")]);
        assert_eq!(
            r.resolve("@/components/Foo.vue").unwrap(),
            Resolution::Resolved(PathBuf::from("/project/src/components/Foo.vue"))
        );
    }

    #[test]
    fn exact_match_resolves_to_target() {
        let r = resolver(&[("@", "/project/src")]);
        assert_eq!(
            r.resolve("@").unwrap(),
            Resolution::Resolved(PathBuf::from("/project/src"))
        );
    }

    #[test]
    fn unmatched_specifier_is_unresolved() {
        let r = resolver(&[("@", "/project/src")]);
        assert_eq!(r.resolve("vue").unwrap(), Resolution::Unresolved);
        assert_eq!(r.resolve("./local.js").unwrap(), Resolution::Unresolved);
    }

    #[test]
    fn scoped_package_is_not_captured() {
        let r = resolver(&[("@", "/project/src")]);
        assert_eq!(r.resolve("@vue/runtime-core").unwrap(), Resolution::Unresolved);
    }

    #[test]
    fn prefix_with_trailing_separator_matches_directly() {
        let r = resolver(&[("~/", "/project/lib")]);
        assert_eq!(
            r.resolve("~/util.js").unwrap(),
            Resolution::Resolved(PathBuf::from("/project/lib/util.js"))
        );
    }

    #[test]
    fn dot_segments_are_normalized() {
        let r = resolver(&[("@", "/project/src")]);
        assert_eq!(
            r.resolve("@/a/./b/../c.ts").unwrap(),
            Resolution::Resolved(PathBuf::from("/project/src/a/c.ts"))
        );
    }

    #[test]
    fn traversal_out_of_target_is_rejected() {
        let r = resolver(&[("@", "/project/src")]);
        let err = r.resolve("@/../secrets.env").unwrap_err();
        match err {
            Error::PathEscape { specifier, root } => {
                assert_eq!(specifier, "@/../secrets.env");
                assert_eq!(root, PathBuf::from("/project/src"));
            }
            other => panic!("expected PathEscape, got {other:?}"),
        }
    }

    #[test]
    fn doubled_separator_does_not_become_absolute() {
        let r = resolver(&[("@", "/project/src")]);
        assert_eq!(
            r.resolve("@//etc/passwd").unwrap(),
            Resolution::Resolved(PathBuf::from("/project/src/etc/passwd"))
        );
    }

    #[test]
    fn first_match_wins_in_configured_order() {
        let specific_first = resolver(&[("@/components", "/ui"), ("@", "/project/src")]);
        assert_eq!(
            specific_first.resolve("@/components/Button.vue").unwrap(),
            Resolution::Resolved(PathBuf::from("/ui/Button.vue"))
        );

        let general_first = resolver(&[("@", "/project/src"), ("@/components", "/ui")]);
        assert_eq!(
            general_first.resolve("@/components/Button.vue").unwrap(),
            Resolution::Resolved(PathBuf::from("/project/src/components/Button.vue"))
        );
    }

    #[test]
    fn shadowed_rules_are_reported() {
        let r = resolver(&[("@", "/project/src"), ("@/components", "/ui")]);
        assert_eq!(r.shadowed(), vec![("@", "@/components")]);

        let r = resolver(&[("@/components", "/ui"), ("@", "/project/src")]);
        assert!(r.shadowed().is_empty());
    }

    #[test]
    fn configure_rejects_duplicates() {
        let rules = vec![
            AliasRule::new("@", "/a").unwrap(),
            AliasRule::new("@", "/b").unwrap(),
        ];
        let err = AliasResolver::new().configure(rules).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn rule_rejects_empty_prefix_and_relative_target() {
        assert!(matches!(
            AliasRule::new("", "/a").unwrap_err(),
            Error::Configuration { .. }
        ));
        assert!(matches!(
            AliasRule::new("@", "src").unwrap_err(),
            Error::Configuration { .. }
        ));
    }

    #[test]
    fn configure_replaces_previous_rules() {
        let mut r = resolver(&[("@", "/project/src")]);
        r.configure(vec![AliasRule::new("~", "/lib").unwrap()]).unwrap();
        assert_eq!(r.resolve("@/x").unwrap(), Resolution::Unresolved);
        assert!(r.resolve("~/x").unwrap().is_resolved());
    }
}
