//! Target data layout: sizes, alignments, and struct field offsets.
//!
//! Offsets follow the usual C rules. Each field is placed at the next
//! offset that satisfies its alignment, the struct is padded at the tail to
//! a multiple of its own alignment, and packed structs drop all padding.

use crate::module::Module;
use crate::ty::{StructId, Ty};

/// A power-of-two byte alignment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct Align(u32);

impl Align {
    pub const ONE: Align = Align(1);

    /// Creates an alignment. Panics if `bytes` is zero or not a power of two.
    pub fn new(bytes: u32) -> Align {
        assert!(bytes.is_power_of_two(), "alignment must be a power of two, got {bytes}");
        Align(bytes)
    }

    #[inline]
    pub fn bytes(self) -> u64 {
        u64::from(self.0)
    }

    #[inline]
    pub fn max(self, other: Align) -> Align {
        if other.0 > self.0 { other } else { self }
    }

    /// The largest alignment guaranteed at `self + offset`.
    ///
    /// A pointer aligned to `self` with `offset` bytes added keeps only the
    /// alignment of the offset's lowest set bit, capped by `self`. A zero
    /// offset keeps the full alignment.
    pub fn common(self, offset: u64) -> Align {
        if offset == 0 {
            return self;
        }
        let low_bit = offset & offset.wrapping_neg();
        let bytes = self.bytes().min(low_bit);
        Align(bytes as u32)
    }
}

/// Computed layout for one struct body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructLayout {
    /// Byte offset of each field, in field order.
    pub offsets: Vec<u64>,
    /// Total size including tail padding.
    pub size: u64,
    pub align: Align,
}

impl StructLayout {
    #[inline]
    pub fn offset(&self, field: usize) -> u64 {
        self.offsets[field]
    }
}

/// Target layout parameters. Only the pointer shape varies; scalar types
/// are naturally aligned on every target we care about.
#[derive(Clone, Copy, Debug)]
pub struct DataLayout {
    pub ptr_size: u64,
    pub ptr_align: Align,
}

impl Default for DataLayout {
    fn default() -> Self {
        DataLayout {
            ptr_size: 8,
            ptr_align: Align::new(8),
        }
    }
}

impl DataLayout {
    /// ABI size of a type in bytes.
    pub fn size_of(&self, module: &Module, ty: &Ty) -> u64 {
        match ty {
            Ty::I8 => 1,
            Ty::I16 => 2,
            Ty::I32 | Ty::F32 => 4,
            Ty::I64 | Ty::F64 => 8,
            Ty::Ptr => self.ptr_size,
            Ty::Array { elem, len } => self.size_of(module, elem) * len,
            Ty::Struct(id) => self.struct_layout(module, *id).size,
        }
    }

    /// ABI alignment of a type.
    pub fn align_of(&self, module: &Module, ty: &Ty) -> Align {
        match ty {
            Ty::I8 => Align::new(1),
            Ty::I16 => Align::new(2),
            Ty::I32 | Ty::F32 => Align::new(4),
            Ty::I64 | Ty::F64 => Align::new(8),
            Ty::Ptr => self.ptr_align,
            Ty::Array { elem, .. } => self.align_of(module, elem),
            Ty::Struct(id) => self.struct_layout(module, *id).align,
        }
    }

    /// Field offsets and total size for a struct body as currently defined.
    pub fn struct_layout(&self, module: &Module, id: StructId) -> StructLayout {
        let def = module.struct_def(id);
        let mut offsets = Vec::with_capacity(def.fields.len());
        let mut offset = 0u64;
        let mut align = Align::ONE;
        for field in &def.fields {
            let field_align = if def.packed {
                Align::ONE
            } else {
                self.align_of(module, field)
            };
            offset = round_up(offset, field_align);
            offsets.push(offset);
            offset += self.size_of(module, field);
            align = align.max(field_align);
        }
        StructLayout {
            offsets,
            size: round_up(offset, align),
            align,
        }
    }
}

#[inline]
fn round_up(value: u64, align: Align) -> u64 {
    let a = align.bytes();
    value.div_ceil(a) * a
}
