//! Localification: pick a C declaration for every Wasm local.

use crate::entity::{EntityRef, EntityVec};
use crate::ir::{Local, Type};

/// The C type used to hold a Wasm value of the given type, if it has
/// one.
pub fn c_type(ty: Type) -> Option<&'static str> {
    match ty {
        Type::I32 => Some("int32_t"),
        Type::I64 => Some("int64_t"),
        Type::F32 => Some("float"),
        Type::F64 => Some("double"),
        Type::None | Type::V128 | Type::Ref => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LocalSlot {
    pub ty: Type,
    pub c_type: &'static str,
    pub name: String,
}

/// C declarations for a function's parameters and locals, indexed by
/// Wasm local index. Parameters are `arg<i>`; other locals are
/// `local<i>` with `i` the Wasm local index, so names never collide.
#[derive(Clone, Debug, Default)]
pub struct LocalSlots {
    pub slots: EntityVec<Local, LocalSlot>,
    pub n_params: usize,
}

impl LocalSlots {
    /// Map `locals` (parameters first) to slots. Fails with the first
    /// type that has no C representation.
    pub fn compute(n_params: usize, locals: &[Type]) -> Result<LocalSlots, Type> {
        let mut slots = EntityVec::default();
        for (index, &ty) in locals.iter().enumerate() {
            let c_type = c_type(ty).ok_or(ty)?;
            let name = if index < n_params {
                format!("arg{}", index)
            } else {
                format!("local{}", index)
            };
            slots.push(LocalSlot { ty, c_type, name });
        }
        Ok(LocalSlots { slots, n_params })
    }

    pub fn get(&self, local: Local) -> Option<&LocalSlot> {
        self.slots.get(local)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn params(&self) -> &[LocalSlot] {
        &self.slots.as_slice()[..self.n_params]
    }

    /// Non-parameter locals with their Wasm indices.
    pub fn vars(&self) -> impl Iterator<Item = (Local, &LocalSlot)> {
        self.slots
            .entries()
            .filter(move |(local, _)| local.index() >= self.n_params)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use fxhash::FxHashSet;

    #[test]
    fn one_distinct_slot_per_local() {
        let locals = [Type::I32, Type::F64, Type::I64, Type::I32, Type::F32];
        let slots = LocalSlots::compute(2, &locals).unwrap();
        assert_eq!(slots.len(), locals.len());
        let names = slots
            .slots
            .values()
            .map(|slot| slot.name.clone())
            .collect::<FxHashSet<_>>();
        assert_eq!(names.len(), locals.len());

        assert_eq!(slots.params()[1].c_type, "double");
        let vars = slots
            .vars()
            .map(|(local, slot)| (local.index(), slot.name.as_str(), slot.c_type))
            .collect::<Vec<_>>();
        assert_eq!(
            vars,
            vec![
                (2, "local2", "int64_t"),
                (3, "local3", "int32_t"),
                (4, "local4", "float")
            ]
        );
    }

    #[test]
    fn vector_locals_have_no_slot() {
        assert_eq!(
            LocalSlots::compute(0, &[Type::I32, Type::V128]).unwrap_err(),
            Type::V128
        );
    }
}
