use std::collections::BTreeSet;

use serde::Deserialize;

/// Default cap on the number of variants one expansion may produce
pub const DEFAULT_MAX_VARIANTS: usize = 64;

/// How configuration atoms without a value are treated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    /// Unknown atoms stay symbolic and every alternative is kept
    #[default]
    Symbolic,
    /// One configuration: unlisted names are undefined and ambiguity is an error
    Concrete,
}

/// Read-only description of the configuration space a unit is analyzed under
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigEnvironment {
    /// Symbolic or concrete evaluation
    pub mode: AnalysisMode,
    /// Atoms known to be defined (as if by `-DNAME`)
    pub defined_atoms: BTreeSet<String>,
    /// Atoms known to be undefined
    pub undefined_atoms: BTreeSet<String>,
    /// When set, only names starting with this prefix are variability atoms
    pub atom_prefix_filter: Option<String>,
    /// Maximum number of variants a single expansion may produce
    pub max_variants: usize,
}

impl Default for ConfigEnvironment {
    fn default() -> Self {
        Self::symbolic()
    }
}

impl ConfigEnvironment {
    /// Symbolic analysis with no fixed atoms
    #[must_use]
    pub const fn symbolic() -> Self {
        Self {
            mode: AnalysisMode::Symbolic,
            defined_atoms: BTreeSet::new(),
            undefined_atoms: BTreeSet::new(),
            atom_prefix_filter: None,
            max_variants: DEFAULT_MAX_VARIANTS,
        }
    }

    /// Concrete analysis of a single configuration; every name not listed
    /// as defined is undefined
    #[must_use]
    pub const fn concrete() -> Self {
        Self {
            mode: AnalysisMode::Concrete,
            defined_atoms: BTreeSet::new(),
            undefined_atoms: BTreeSet::new(),
            atom_prefix_filter: None,
            max_variants: DEFAULT_MAX_VARIANTS,
        }
    }

    /// Mark atoms as defined
    #[must_use]
    pub fn with_defined<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.undefined_atoms.remove(&name);
            self.defined_atoms.insert(name);
        }
        self
    }

    /// Mark atoms as undefined
    #[must_use]
    pub fn with_undefined<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.defined_atoms.remove(&name);
            self.undefined_atoms.insert(name);
        }
        self
    }

    /// Restrict variability atoms to names with the given prefix (e.g. `CONFIG_`)
    #[must_use]
    pub fn with_atom_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.atom_prefix_filter = Some(prefix.into());
        self
    }

    /// Cap the number of variants one expansion may produce
    #[must_use]
    pub fn with_max_variants(mut self, max_variants: usize) -> Self {
        self.max_variants = max_variants;
        self
    }

    /// Whether a single configuration is analyzed
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        self.mode == AnalysisMode::Concrete
    }

    /// Whether `name` ranges over configurations: the analysis is symbolic,
    /// the name matches the prefix filter and neither atom set fixes it
    #[must_use]
    pub fn is_open_atom(&self, name: &str) -> bool {
        !self.is_concrete()
            && self.matches_prefix(name)
            && !self.defined_atoms.contains(name)
            && !self.undefined_atoms.contains(name)
    }

    /// Whether `name` matches the variability prefix filter
    #[must_use]
    pub fn matches_prefix(&self, name: &str) -> bool {
        self.atom_prefix_filter
            .as_deref()
            .is_none_or(|prefix| name.starts_with(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders_keep_sets_disjoint() {
        let env = ConfigEnvironment::concrete()
            .with_defined(["CONFIG_MMU"])
            .with_undefined(["CONFIG_SMP"])
            .with_defined(["CONFIG_SMP"]);
        assert!(env.defined_atoms.contains("CONFIG_SMP"));
        assert!(!env.undefined_atoms.contains("CONFIG_SMP"));
        assert!(env.is_concrete());
    }

    #[test]
    fn prefix_filter_limits_open_atoms() {
        let env = ConfigEnvironment::symbolic()
            .with_atom_prefix("CONFIG_")
            .with_defined(["CONFIG_MMU"]);
        assert!(env.is_open_atom("CONFIG_SMP"));
        assert!(!env.is_open_atom("CONFIG_MMU"));
        assert!(!env.is_open_atom("__KERNEL__"));
        assert!(ConfigEnvironment::symbolic().is_open_atom("__KERNEL__"));
        assert!(!ConfigEnvironment::concrete().is_open_atom("CONFIG_SMP"));
    }

    #[test]
    fn deserializes_with_defaults() {
        let env: ConfigEnvironment = serde_json::from_str(
            r#"{ "mode": "concrete", "defined_atoms": ["CONFIG_MMU"], "atom_prefix_filter": "CONFIG_" }"#,
        )
        .unwrap();
        assert!(env.is_concrete());
        assert_eq!(env.max_variants, DEFAULT_MAX_VARIANTS);
        assert!(env.defined_atoms.contains("CONFIG_MMU"));
        assert!(serde_json::from_str::<ConfigEnvironment>(r#"{ "bogus": 1 }"#).is_err());
    }
}
