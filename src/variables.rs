//! Variable-string bindings for backreferences
//!
//! A pattern variable that recurs within one match must resolve to the same
//! string every time. `VariableStrings` is the per-match-attempt container
//! for those bindings; the backtracking driver binds on entering a branch
//! and unbinds on leaving it, so bindings are reference-counted rather than
//! simply overwritten.

use rustc_hash::FxHashMap;
use thiserror::Error;

/// A variable was already bound to a different string.
///
/// This is a violated backreference: the current match branch must be
/// abandoned. It is never recoverable within the branch that raised it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("variable \"{var}\" is bound to \"{old}\" and cannot be rebound to \"{new}\"")]
pub struct BackreferenceConflict {
    pub var: String,
    pub old: String,
    pub new: String,
}

/// Mapping from variable name to bound string, with per-variable reference
/// counts. One instance lives for exactly one top-level match attempt.
#[derive(Debug, Default)]
pub struct VariableStrings {
    bindings: FxHashMap<String, Binding>,
}

#[derive(Debug)]
struct Binding {
    value: String,
    count: usize,
}

impl VariableStrings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self, var: &str) -> bool {
        self.bindings.contains_key(var)
    }

    pub fn get(&self, var: &str) -> Option<&str> {
        self.bindings.get(var).map(|b| b.value.as_str())
    }

    /// Bind `var` to `value`, or bump its reference count if already bound
    /// to the same value. Binding to a different value fails.
    pub fn set_var(&mut self, var: &str, value: &str) -> Result<(), BackreferenceConflict> {
        match self.bindings.get_mut(var) {
            Some(binding) => {
                if binding.value != value {
                    return Err(BackreferenceConflict {
                        var: var.to_string(),
                        old: binding.value.clone(),
                        new: value.to_string(),
                    });
                }
                binding.count += 1;
            }
            None => {
                self.bindings.insert(
                    var.to_string(),
                    Binding {
                        value: value.to_string(),
                        count: 1,
                    },
                );
            }
        }
        Ok(())
    }

    /// Drop one reference to `var`; the binding is cleared entirely when the
    /// count reaches zero, so a later independent branch can rebind it.
    pub fn unset_var(&mut self, var: &str) {
        if let Some(binding) = self.bindings.get_mut(var) {
            binding.count -= 1;
            if binding.count == 0 {
                self.bindings.remove(var);
            }
        }
    }
}
