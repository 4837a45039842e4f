//! SSA value identifiers and the per-function value table.
//!
//! Every operand in the IR is a [`ValueId`], a dense index into the owning
//! [`Function`](crate::ir::Function)'s value table. The table entry records
//! what defines the value (argument, constant, global, or instruction) and
//! its type. Keeping definitions in a side table instead of on pointers
//! gives the optimization passes cheap identity comparison and lets the
//! factor graph reference values without ownership cycles.
//!
//! # Thread Safety
//!
//! All types in this module are `Send` and `Sync`.

use std::fmt;

use crate::ir::{ConstValue, Type};

/// Unique identifier for an SSA value within one function.
///
/// This is a lightweight handle into the function's value table, providing
/// O(1) access to the definition record. Identifiers are unique within a
/// single function but not across functions.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ValueId(usize);

impl ValueId {
    /// Creates a new value identifier from a raw table index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Returns the underlying table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Debug for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for ValueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// What defines a value.
///
/// The kind determines the value's rank during operand canonicalization
/// and whether an expression that simplifies to it is dropped from the
/// optimization ([`ValueKind::is_inert`]).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueKind {
    /// A function argument, identified by its position.
    Argument(u32),

    /// An interned constant.
    Constant(ConstValue),

    /// A named global. Globals are opaque to the pass; they only serve as
    /// operands.
    Global(String),

    /// Defined by an instruction (including φ nodes). The definition site
    /// is the instruction's position at construction time; code motion
    /// keeps it accurate only up to the block, which is all dominance
    /// queries need.
    Inst {
        /// Block containing the defining instruction.
        block: usize,
        /// Index of the defining instruction within the block.
        index: usize,
    },
}

impl ValueKind {
    /// Returns `true` for values an expression may collapse into without
    /// being worth optimizing: constants, arguments, and globals.
    #[must_use]
    pub const fn is_inert(&self) -> bool {
        matches!(
            self,
            Self::Argument(_) | Self::Constant(_) | Self::Global(_)
        )
    }

    /// Returns the constant payload if this is a constant.
    #[must_use]
    pub const fn as_constant(&self) -> Option<&ConstValue> {
        match self {
            Self::Constant(c) => Some(c),
            _ => None,
        }
    }
}

/// A value table entry: definition kind plus type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueData {
    /// What defines this value.
    pub kind: ValueKind,
    /// The value's type.
    pub ty: Type,
}

impl ValueData {
    /// Creates a new value table entry.
    #[must_use]
    pub const fn new(kind: ValueKind, ty: Type) -> Self {
        Self { kind, ty }
    }

    /// Returns `true` if the value is defined by an instruction.
    #[must_use]
    pub const fn is_inst(&self) -> bool {
        matches!(self.kind, ValueKind::Inst { .. })
    }

    /// Returns the defining block for instruction-defined values.
    #[must_use]
    pub const fn def_block(&self) -> Option<usize> {
        match self.kind {
            ValueKind::Inst { block, .. } => Some(block),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_id_display() {
        let id = ValueId::new(7);
        assert_eq!(format!("{id}"), "v7");
        assert_eq!(format!("{id:?}"), "v7");
        assert_eq!(id.index(), 7);
    }

    #[test]
    fn test_value_kind_inert() {
        assert!(ValueKind::Argument(0).is_inert());
        assert!(ValueKind::Constant(ConstValue::Int(1)).is_inert());
        assert!(ValueKind::Global("g".into()).is_inert());
        assert!(!ValueKind::Inst { block: 0, index: 0 }.is_inert());
    }

    #[test]
    fn test_value_data_def_block() {
        let data = ValueData::new(ValueKind::Inst { block: 2, index: 5 }, Type::I32);
        assert!(data.is_inst());
        assert_eq!(data.def_block(), Some(2));

        let arg = ValueData::new(ValueKind::Argument(0), Type::I32);
        assert_eq!(arg.def_block(), None);
    }
}
