//! Type representations for the repack IR.

use std::fmt;

/// Identifies a named struct type within a [`Module`](crate::Module).
///
/// The id is stable for the lifetime of the module: replacing a struct's
/// body changes its field list but never its id, so anything classified by
/// struct identity stays valid across a layout rewrite.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct StructId(pub u32);

impl StructId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A first-class type in the IR.
///
/// Pointers are opaque (no pointee type), matching modern LLVM; the type an
/// address points at is recovered from the instruction that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Ty {
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
    Ptr,
    Array { elem: Box<Ty>, len: u64 },
    Struct(StructId),
}

impl Ty {
    pub fn array(elem: Ty, len: u64) -> Ty {
        Ty::Array {
            elem: Box::new(elem),
            len,
        }
    }

    #[inline]
    pub fn is_integer(&self) -> bool {
        matches!(self, Ty::I8 | Ty::I16 | Ty::I32 | Ty::I64)
    }

    /// The struct id if this type is a struct.
    #[inline]
    pub fn struct_id(&self) -> Option<StructId> {
        match self {
            Ty::Struct(id) => Some(*id),
            _ => None,
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ty::I8 => write!(f, "i8"),
            Ty::I16 => write!(f, "i16"),
            Ty::I32 => write!(f, "i32"),
            Ty::I64 => write!(f, "i64"),
            Ty::F32 => write!(f, "f32"),
            Ty::F64 => write!(f, "f64"),
            Ty::Ptr => write!(f, "ptr"),
            Ty::Array { elem, len } => write!(f, "[{len} x {elem}]"),
            Ty::Struct(id) => write!(f, "%struct.{}", id.0),
        }
    }
}
