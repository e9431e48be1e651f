// lazymod-core/src/variant.rs
//! Override-derived declarations. A variant shares its base's factory and
//! name but resolves some dependencies against other modules.

use std::cell::RefCell;
use std::rc::Rc;

use lazymod_common::Overrides;
use tracing::debug;

use crate::declaration::DeclRef;
use crate::registry::Module;

impl<T> Module<T> {
    /// Returns the declaration whose dependency targets equal the head's with
    /// `overrides` applied, deriving and caching a new variant if none does.
    pub(crate) fn variant_for(&mut self, overrides: &Overrides) -> DeclRef<T> {
        let (wanted, derived_specs) = {
            let base = self.head().borrow();
            let wanted: Vec<String> = base
                .specs
                .iter()
                .map(|spec| spec.target_under(overrides).to_string())
                .collect();
            let specs = base
                .specs
                .iter()
                .map(|spec| spec.substituted(overrides))
                .collect::<Vec<_>>();
            (wanted, specs)
        };

        // Linear scan; variant lists stay short.
        if let Some(found) = self
            .declarations
            .iter()
            .find(|decl| decl.borrow().targets().eq(wanted.iter().map(String::as_str)))
        {
            return Rc::clone(found);
        }

        let variant = self.head().borrow().derive(derived_specs);
        debug!(
            "Deriving variant #{} of '{}' with dependencies {:?}",
            self.declarations.len(),
            self.name,
            wanted
        );
        let variant = Rc::new(RefCell::new(variant));
        self.declarations.push(Rc::clone(&variant));
        variant
    }
}
