//! Expression occurrences and factors.
//!
//! The pass tracks every interesting point in the program as an
//! [`Occurrence`] in a flat arena indexed by [`OccId`]. Real occurrences
//! wrap an instruction; factors are the synthetic φ-for-expression nodes
//! placed at joins; inserted occurrences are the computations code motion
//! materializes on predecessor edges.
//!
//! The factor graph is cyclic (factors reference factors through operand
//! slots), which is why everything lives behind arena indices instead of
//! owned pointers. The ⊥ "no definition on this edge" sentinel is an
//! explicit [`FactorOperand`] variant, never a magic index.

use std::fmt;

use crate::ir::ValueId;

/// Index of a prototype expression in the pass's prototype table.
pub(crate) type ProtoId = usize;

/// Index of an occurrence in the pass's occurrence arena.
pub(crate) type OccId = usize;

/// One operand slot of a factor, aligned with the block's predecessor
/// list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FactorOperand {
    /// ⊥ - no version of the expression is live on this edge.
    Bottom,
    /// The occurrence whose version reaches the factor along this edge.
    Def(OccId),
}

impl FactorOperand {
    pub(crate) fn is_bottom(self) -> bool {
        matches!(self, Self::Bottom)
    }

    pub(crate) fn as_def(self) -> Option<OccId> {
        match self {
            Self::Bottom => None,
            Self::Def(occ) => Some(occ),
        }
    }
}

/// Payload of a factor occurrence.
#[derive(Debug, Clone)]
pub(crate) struct FactorData {
    /// The join block the factor sits at.
    pub block: usize,
    /// CFG predecessors of the block, captured at construction. Operand
    /// slots are indexed in lock-step with this list.
    pub preds: Vec<usize>,
    /// Per-edge operand, ⊥ until renaming fills it.
    pub operands: Vec<FactorOperand>,
    /// Whether the operand on each edge came from a real occurrence
    /// rather than another factor.
    pub has_real_use: Vec<bool>,
    /// The expression is anticipated on every path from here to exit.
    pub down_safe: bool,
    /// The expression can be made available here by inserting at most on
    /// edges where it is absent.
    pub can_be_avail: bool,
    /// Realization is better deferred to a later point.
    pub later: bool,
    /// A reload resolves to this factor's φ; code motion must materialize
    /// it.
    pub needed: bool,
}

impl FactorData {
    pub(crate) fn new(block: usize, preds: Vec<usize>) -> Self {
        let n = preds.len();
        Self {
            block,
            preds,
            operands: vec![FactorOperand::Bottom; n],
            has_real_use: vec![false; n],
            down_safe: true,
            can_be_avail: true,
            later: true,
            needed: false,
        }
    }

    /// Slot index of a predecessor block, if present.
    pub(crate) fn pred_index(&self, block: usize) -> Option<usize> {
        self.preds.iter().position(|&p| p == block)
    }

    /// `WillBeAvail = CanBeAvail ∧ ¬Later`.
    pub(crate) fn will_be_avail(&self) -> bool {
        self.can_be_avail && !self.later
    }
}

/// What an occurrence stands for.
#[derive(Debug, Clone)]
pub(crate) enum OccKind {
    /// A real instruction (Basic or PHI expression).
    Real {
        /// Block containing the instruction.
        block: usize,
        /// Instruction index within the block at collection time.
        index: usize,
        /// The value the instruction defines.
        value: ValueId,
        /// `true` when the instruction is an IR φ node.
        is_phi: bool,
    },
    /// A factor: synthetic φ-for-expression at a join.
    Factor(FactorData),
    /// A computation materialized on a predecessor edge by code motion.
    Inserted {
        /// Block the computation was placed in.
        block: usize,
        /// The value it defines.
        value: ValueId,
    },
}

/// An expression occurrence: shared header plus kind payload.
#[derive(Debug, Clone)]
pub(crate) struct Occurrence {
    /// The prototype this occurrence belongs to.
    pub proto: ProtoId,
    /// Version assigned by renaming; -1 until then.
    pub version: i32,
    /// Finalize: this occurrence is the sink of a definition others reload.
    pub save: bool,
    /// Finalize: this occurrence reuses an existing dominating definition.
    pub reload: bool,
    /// Kind payload.
    pub kind: OccKind,
}

impl Occurrence {
    pub(crate) fn real(proto: ProtoId, block: usize, index: usize, value: ValueId, is_phi: bool) -> Self {
        Self {
            proto,
            version: -1,
            save: false,
            reload: false,
            kind: OccKind::Real {
                block,
                index,
                value,
                is_phi,
            },
        }
    }

    pub(crate) fn factor(proto: ProtoId, block: usize, preds: Vec<usize>) -> Self {
        Self {
            proto,
            version: -1,
            save: false,
            reload: false,
            kind: OccKind::Factor(FactorData::new(block, preds)),
        }
    }

    pub(crate) fn inserted(proto: ProtoId, version: i32, block: usize, value: ValueId) -> Self {
        Self {
            proto,
            version,
            save: true,
            reload: false,
            kind: OccKind::Inserted { block, value },
        }
    }

    /// `true` for real (Basic/PHI) occurrences; factors and inserts are
    /// not "real uses" in the down-safety sense.
    pub(crate) fn is_real(&self) -> bool {
        matches!(self.kind, OccKind::Real { .. })
    }

    pub(crate) fn is_factor(&self) -> bool {
        matches!(self.kind, OccKind::Factor(_))
    }

    pub(crate) fn as_factor(&self) -> Option<&FactorData> {
        match &self.kind {
            OccKind::Factor(data) => Some(data),
            _ => None,
        }
    }

    pub(crate) fn as_factor_mut(&mut self) -> Option<&mut FactorData> {
        match &mut self.kind {
            OccKind::Factor(data) => Some(data),
            _ => None,
        }
    }

    /// The block this occurrence lives in.
    pub(crate) fn block(&self) -> usize {
        match &self.kind {
            OccKind::Real { block, .. }
            | OccKind::Inserted { block, .. } => *block,
            OccKind::Factor(data) => data.block,
        }
    }

    /// The SSA value the occurrence defines, for real and inserted kinds.
    pub(crate) fn value(&self) -> Option<ValueId> {
        match &self.kind {
            OccKind::Real { value, .. } | OccKind::Inserted { value, .. } => Some(*value),
            OccKind::Factor(_) => None,
        }
    }

    pub(crate) fn will_be_avail(&self) -> bool {
        self.as_factor().is_some_and(FactorData::will_be_avail)
    }
}

impl fmt::Display for Occurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            OccKind::Real {
                block,
                index,
                value,
                is_phi,
            } => {
                let tag = if *is_phi { "phi" } else { "real" };
                write!(
                    f,
                    "{tag} {value} @b{block}:{index} v{} S:{} R:{}",
                    self.version, self.save as u8, self.reload as u8
                )
            }
            OccKind::Inserted { block, value } => {
                write!(f, "insert {value} @b{block} v{}", self.version)
            }
            OccKind::Factor(data) => {
                write!(f, "factor @b{} v{} <", data.block, self.version)?;
                for (i, op) in data.operands.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    match op {
                        FactorOperand::Bottom => write!(f, "⊥")?,
                        FactorOperand::Def(occ) => write!(f, "#{occ}")?,
                    }
                }
                write!(
                    f,
                    "> DS:{} CBA:{} L:{} WBA:{}",
                    data.down_safe as u8,
                    data.can_be_avail as u8,
                    data.later as u8,
                    data.will_be_avail() as u8
                )
            }
        }
    }
}
