//! Descriptors: everything the optimizer records about one aggregate.
//!
//! The IR is never referenced by raw pointer from here. Access sites are
//! held as opaque `(FuncId, InstrId)` handles and resolved back through the
//! facade when the applier rewrites them, so a descriptor can outlive any
//! amount of in-place IR mutation.

use repack_ir::{Align, FuncId, GlobalId, InstrId, StructId, Ty};

/// How a classified access site touches its field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
    /// The address leaves the function's load/store traffic: it feeds a
    /// call, a bulk intrinsic, or a store that captures it as a value.
    /// Carries no weight, but the expression still bakes in a field
    /// index, so the applier must re-point it like any other use.
    Escape,
}

/// A classified access expression, resolved once at scan time.
///
/// `Field` is an explicit field-address computation; the same expression
/// can appear in several uses when its address value feeds several
/// loads and stores. `Direct` is a load or store whose address operand is
/// a bare aggregate-typed location, an implicit access to field 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessExpr {
    Field { func: FuncId, instr: InstrId },
    Direct { func: FuncId, instr: InstrId },
}

impl AccessExpr {
    pub fn func(self) -> FuncId {
        match self {
            AccessExpr::Field { func, .. } | AccessExpr::Direct { func, .. } => func,
        }
    }

    pub fn instr(self) -> InstrId {
        match self {
            AccessExpr::Field { instr, .. } | AccessExpr::Direct { instr, .. } => instr,
        }
    }
}

/// One attributed access site for one field.
#[derive(Clone, Copy, Debug)]
pub struct FieldUse {
    pub expr: AccessExpr,
    pub kind: AccessKind,
    /// Nesting depth of the enclosing loop, 0 outside any loop.
    pub loop_depth: u32,
}

/// Normalized per-field scores, each in `[0, 1]` once weighed.
#[derive(Clone, Copy, Debug, Default)]
pub struct FieldWeights {
    pub size: f64,
    pub load: f64,
    pub store: f64,
    pub loops: f64,
    pub total: f64,
}

/// One field slot, indexed by its original position.
#[derive(Clone, Debug)]
pub struct FieldRecord {
    pub ty: Ty,
    /// ABI allocation size at catalog time.
    pub size: u64,
    /// Alignment provable at the field's current offset.
    pub align: Align,
    pub initial_index: usize,
    /// Last applied position. Moves only when a planned remap is applied.
    pub current_index: usize,
    /// Planned position for the next apply.
    pub target_index: usize,
    pub reads: u64,
    pub writes: u64,
    pub weights: FieldWeights,
    pub uses: Vec<FieldUse>,
}

impl FieldRecord {
    pub fn is_used(&self) -> bool {
        self.reads > 0 || self.writes > 0
    }
}

/// A global of the aggregate type whose initializer is not all-zero.
#[derive(Clone, Copy, Debug)]
pub struct GlobalRef {
    pub global: GlobalId,
    /// Initializer element count, checked against the field count before
    /// any mutation.
    pub elem_count: usize,
}

/// A bulk copy or fill whose destination is an instance of the aggregate.
#[derive(Clone, Copy, Debug)]
pub struct BulkRef {
    pub func: FuncId,
    pub instr: InstrId,
}

/// Field permutation, indexed by post-reorder position.
///
/// `old_of(new)` answers "which original slot moved here". Both the
/// initializer rebuild and the body install consume the table in that
/// direction: element `i` of the new aggregate comes from element
/// `old_of(i)` of the old one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemapTable(Vec<usize>);

impl RemapTable {
    pub fn identity(len: usize) -> RemapTable {
        RemapTable((0..len).collect())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_identity(&self) -> bool {
        self.0.iter().enumerate().all(|(new, &old)| new == old)
    }

    /// The original position of the field now at `new`.
    #[inline]
    pub fn old_of(&self, new: usize) -> usize {
        self.0[new]
    }

    pub fn set(&mut self, new: usize, old: usize) {
        self.0[new] = old;
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Whether the table is a bijection over `[0, len)`.
    pub fn is_permutation(&self) -> bool {
        let mut seen = vec![false; self.0.len()];
        for &old in &self.0 {
            if old >= seen.len() || seen[old] {
                return false;
            }
            seen[old] = true;
        }
        true
    }
}

/// Everything known about one aggregate under consideration.
///
/// Created once by the catalog, filled in by the scanner and weigher,
/// consumed by the applier, and dropped at the end of the run.
#[derive(Clone, Debug)]
pub struct StructDescriptor {
    pub id: StructId,
    pub name: String,
    pub packed: bool,
    pub initial_size: u64,
    /// Re-derived from the live layout after every body rewrite, never
    /// patched incrementally.
    pub current_size: u64,
    pub fields: Vec<FieldRecord>,
    pub remap: RemapTable,
    pub globals: Vec<GlobalRef>,
    pub bulk_ops: Vec<BulkRef>,
}

impl StructDescriptor {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Total attributed access sites across all fields.
    pub fn use_count(&self) -> usize {
        self.fields.iter().map(|f| f.uses.len()).sum()
    }

    pub fn has_usage(&self) -> bool {
        self.fields.iter().any(FieldRecord::is_used)
    }
}
