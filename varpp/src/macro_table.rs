//! Condition-tagged macro definitions.
//!
//! Each name maps to every definition it ever had, each tagged with the
//! presence condition under which it is currently the live definition.
//! A later `#define` or `#undef` narrows earlier entries instead of
//! replacing them, so alternatives guarded by disjoint conditions coexist.

use std::collections::HashMap;
use std::rc::Rc;

use tracing::warn;

use crate::condition::PresenceCondition;
use crate::config::ConfigEnvironment;
use crate::error::{AnalysisError, RedefinitionOverlapWarning};
use crate::macro_def::MacroDefinition;
use crate::token::Span;

/// One definition of a name with the condition under which it applies
#[derive(Clone, Debug)]
pub struct MacroEntry {
    /// Condition under which this definition is the live one
    pub condition: PresenceCondition,
    /// The definition itself
    pub definition: Rc<MacroDefinition>,
    /// Defined under a condition other than `True`
    pub guarded: bool,
}

impl MacroEntry {
    /// Whether some configuration still sees this definition
    #[must_use]
    pub fn is_live(&self) -> bool {
        !self.condition.is_false()
    }
}

#[derive(Clone, Debug)]
struct MacroSlot {
    entries: Vec<MacroEntry>,
    /// Condition under which the environment defines the name
    external: PresenceCondition,
    last_event_undef: bool,
}

/// Result of looking up a name under a condition: the definition to use,
/// or `None` where the name is not a macro
#[derive(Clone, Debug)]
pub struct Resolution {
    /// Part of the lookup condition this resolution covers
    pub condition: PresenceCondition,
    /// Definition to expand, `None` to leave the name as is
    pub definition: Option<Rc<MacroDefinition>>,
}

/// Macro definitions of one translation unit
#[derive(Clone, Debug)]
pub struct MacroTable {
    slots: HashMap<String, MacroSlot>,
    env: ConfigEnvironment,
}

impl MacroTable {
    /// Empty table for units analyzed under `env`
    #[must_use]
    pub fn new(env: &ConfigEnvironment) -> Self {
        Self {
            slots: HashMap::new(),
            env: env.clone(),
        }
    }

    /// Analysis environment the table was created for
    #[must_use]
    pub fn env(&self) -> &ConfigEnvironment {
        &self.env
    }

    fn external_default(&self, name: &str) -> PresenceCondition {
        if self.env.is_open_atom(name) {
            PresenceCondition::atom(name)
        } else {
            PresenceCondition::never()
        }
    }

    fn slot_mut(&mut self, name: &str) -> &mut MacroSlot {
        let external = self.external_default(name);
        self.slots
            .entry(name.to_string())
            .or_insert_with(|| MacroSlot {
                entries: Vec::new(),
                external,
                last_event_undef: false,
            })
    }

    /// Record `definition` as live under `ambient`, narrowing earlier
    /// definitions that may overlap it
    pub fn define(
        &mut self,
        definition: MacroDefinition,
        ambient: &PresenceCondition,
    ) -> Vec<RedefinitionOverlapWarning> {
        let mut warnings = Vec::new();
        let name = definition.name.clone();
        let slot = self.slot_mut(&name);

        if ambient.is_false() {
            slot.entries.push(MacroEntry {
                condition: PresenceCondition::never(),
                definition: Rc::new(definition),
                guarded: true,
            });
            return warnings;
        }

        let shadow = ambient.not();
        for entry in slot.entries.iter_mut().filter(|e| e.is_live()) {
            if entry.condition.provably_disjoint(ambient) {
                continue;
            }
            if !entry.definition.same_definition(&definition) {
                let overlap = entry.condition.and(ambient);
                warn!(
                    name = %name,
                    previous = %entry.definition.span,
                    overlap = %overlap,
                    "macro redefined under an overlapping condition"
                );
                warnings.push(RedefinitionOverlapWarning {
                    name: name.clone(),
                    span: definition.span,
                    previous: entry.definition.span,
                    overlap,
                });
            }
            entry.condition = entry.condition.and(&shadow);
        }
        slot.external = slot.external.and(&shadow);
        slot.last_event_undef = false;
        slot.entries.push(MacroEntry {
            condition: ambient.clone(),
            definition: Rc::new(definition),
            guarded: !ambient.is_true(),
        });
        warnings
    }

    /// Remove `name` under `ambient`
    pub fn undef(&mut self, name: &str, ambient: &PresenceCondition) {
        if ambient.is_false() {
            return;
        }
        let shadow = ambient.not();
        let slot = self.slot_mut(name);
        for entry in &mut slot.entries {
            entry.condition = entry.condition.and(&shadow);
        }
        slot.external = slot.external.and(&shadow);
        slot.last_event_undef = true;
    }

    /// All entries recorded for `name`, including dead ones
    #[must_use]
    pub fn entries(&self, name: &str) -> &[MacroEntry] {
        self.slots.get(name).map_or(&[], |s| s.entries.as_slice())
    }

    /// Entries of `name` whose condition is not `False`
    pub fn live_entries(&self, name: &str) -> impl Iterator<Item = &MacroEntry> {
        self.entries(name).iter().filter(|e| e.is_live())
    }

    /// Whether some live entry of `name` is function-like
    #[must_use]
    pub fn has_function_like(&self, name: &str) -> bool {
        self.live_entries(name)
            .any(|e| e.definition.is_function_like())
    }

    /// Whether `name` has any live definition in the file
    #[must_use]
    pub fn has_live_definition(&self, name: &str) -> bool {
        self.live_entries(name).next().is_some()
    }

    /// Condition under which the environment defines `name`
    #[must_use]
    pub fn external_condition(&self, name: &str) -> PresenceCondition {
        self.slots
            .get(name)
            .map_or_else(|| self.external_default(name), |s| s.external.clone())
    }

    /// Condition under which `name` is defined at the current point
    #[must_use]
    pub fn defined_condition(&self, name: &str) -> PresenceCondition {
        self.live_entries(name)
            .fold(self.external_condition(name), |acc, e| acc.or(&e.condition))
    }

    /// Split `condition` by the live definitions of `name`. The last
    /// resolution, without a definition, covers the part of `condition`
    /// under which no entry applies; it is omitted when provably empty.
    ///
    /// # Errors
    /// In concrete mode returns `AnalysisError::Eval` when more than one
    /// resolution remains, or when a name with several guarded
    /// definitions has none selected and was never `#undef`'d.
    pub fn resolve(
        &self,
        name: &str,
        condition: &PresenceCondition,
        span: Span,
    ) -> Result<Vec<Resolution>, AnalysisError> {
        let mut out = Vec::new();
        let mut covered = PresenceCondition::never();
        for entry in self.live_entries(name) {
            let cond = condition.and(&entry.condition);
            covered = covered.or(&entry.condition);
            if !cond.is_false() {
                out.push(Resolution {
                    condition: cond,
                    definition: Some(Rc::clone(&entry.definition)),
                });
            }
        }
        let remainder = condition.and(&covered.not());
        if !remainder.is_false() {
            out.push(Resolution {
                condition: remainder,
                definition: None,
            });
        }

        if self.env.is_concrete() {
            if out.len() > 1 {
                return Err(AnalysisError::eval(
                    span,
                    format!("{name} has {} possible definitions in a concrete configuration", out.len()),
                ));
            }
            if let Some(slot) = self.slots.get(name) {
                let guarded = slot.entries.iter().filter(|e| e.guarded).count();
                if guarded >= 2 && !self.has_live_definition(name) && !slot.last_event_undef {
                    return Err(AnalysisError::eval(
                        span,
                        format!("none of the {guarded} guarded definitions of {name} is selected"),
                    ));
                }
            }
        }
        Ok(out)
    }

    /// Names with at least one recorded entry, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .slots
            .iter()
            .filter(|(_, s)| !s.entries.is_empty())
            .map(|(n, _)| n.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::condition::atom;
    use crate::lexer::lex_fragment;
    use crate::macro_def::parse_define;

    fn def(text: &str) -> MacroDefinition {
        let tokens = lex_fragment(text).unwrap();
        parse_define(&tokens, Span::default(), PresenceCondition::always()).unwrap()
    }

    #[test]
    fn disjoint_definitions_coexist_without_warning() {
        let mut table = MacroTable::new(&ConfigEnvironment::symbolic().with_atom_prefix("CONFIG_"));
        let mmu = atom("CONFIG_MMU");
        assert!(table.define(def("SPLIT 999999"), &mmu.not()).is_empty());
        assert!(table.define(def("SPLIT 4"), &mmu).is_empty());
        let resolved = table.resolve("SPLIT", &PresenceCondition::always(), Span::default()).unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(resolved.iter().all(|r| r.definition.is_some()));
        assert!(table.defined_condition("SPLIT").is_true());
    }

    #[test]
    fn overlapping_redefinition_shadows_and_warns() {
        let mut table = MacroTable::new(&ConfigEnvironment::symbolic());
        table.define(def("X 1"), &PresenceCondition::always());
        let warnings = table.define(def("X 2"), &atom("A"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].overlap, atom("A"));
        assert_eq!(table.entries("X")[0].condition, atom("A").not());

        let again = table.define(def("X 2"), &atom("A"));
        assert!(again.is_empty());
    }

    #[test]
    fn undef_narrows_every_entry() {
        let mut table = MacroTable::new(&ConfigEnvironment::symbolic());
        table.define(def("X 1"), &atom("A"));
        table.undef("X", &PresenceCondition::always());
        assert!(!table.has_live_definition("X"));
        assert_eq!(table.entries("X").len(), 1);
        assert!(table.defined_condition("X").is_false());
    }

    #[test]
    fn open_atoms_are_defined_externally() {
        let table = MacroTable::new(&ConfigEnvironment::symbolic().with_atom_prefix("CONFIG_"));
        assert_eq!(table.defined_condition("CONFIG_SMP"), atom("CONFIG_SMP"));
        assert!(table.defined_condition("__KERNEL__").is_false());
        let resolved = table.resolve("CONFIG_SMP", &PresenceCondition::always(), Span::default()).unwrap();
        assert_eq!(resolved.len(), 1);
        assert!(resolved[0].definition.is_none());
    }

    #[test]
    fn concrete_mode_rejects_unselected_guarded_names() {
        let env = ConfigEnvironment::concrete();
        let mut table = MacroTable::new(&env);
        table.define(def("N 8"), &PresenceCondition::never());
        table.define(def("N 64"), &PresenceCondition::never());
        assert!(matches!(
            table.resolve("N", &PresenceCondition::always(), Span::default()),
            Err(AnalysisError::Eval { .. })
        ));
        table.undef("N", &PresenceCondition::always());
        assert!(table.resolve("N", &PresenceCondition::always(), Span::default()).is_ok());
    }
}
