//! Top-level module container: struct definitions, globals, and functions.

use crate::func::Function;
use crate::layout::{Align, DataLayout, StructLayout};
use crate::ty::{StructId, Ty};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct GlobalId(pub u32);

impl GlobalId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct FuncId(pub u32);

impl FuncId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A named (or anonymous literal) struct body.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructDef {
    pub name: Option<String>,
    pub fields: Vec<Ty>,
    pub packed: bool,
}

impl StructDef {
    pub fn new(name: Option<String>, fields: Vec<Ty>) -> StructDef {
        StructDef {
            name,
            fields,
            packed: false,
        }
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anon>")
    }
}

/// A compile-time constant, used for global initializers and immediate
/// operands.
#[derive(Clone, Debug, PartialEq)]
pub enum Const {
    Int { value: i64, ty: Ty },
    Float { value: f64, ty: Ty },
    /// Zero of any type, the aggregate `zeroinitializer` included.
    Zero(Ty),
    Struct { struct_id: StructId, elems: Vec<Const> },
    Array { elem_ty: Ty, elems: Vec<Const> },
}

impl Const {
    pub fn int(value: i64, ty: Ty) -> Const {
        Const::Int { value, ty }
    }

    pub fn i32(value: i64) -> Const {
        Const::Int { value, ty: Ty::I32 }
    }

    pub fn i64(value: i64) -> Const {
        Const::Int { value, ty: Ty::I64 }
    }

    /// The integer value if this constant is an integer (zero included).
    pub fn int_value(&self) -> Option<i64> {
        match self {
            Const::Int { value, .. } => Some(*value),
            Const::Zero(ty) if ty.is_integer() => Some(0),
            _ => None,
        }
    }

    pub fn ty(&self) -> Ty {
        match self {
            Const::Int { ty, .. } | Const::Float { ty, .. } | Const::Zero(ty) => ty.clone(),
            Const::Struct { struct_id, .. } => Ty::Struct(*struct_id),
            Const::Array { elem_ty, elems } => Ty::array(elem_ty.clone(), elems.len() as u64),
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Const::Int { value, .. } => *value == 0,
            Const::Float { value, .. } => *value == 0.0,
            Const::Zero(_) => true,
            Const::Struct { elems, .. } | Const::Array { elems, .. } => {
                elems.iter().all(Const::is_zero)
            }
        }
    }
}

/// A module-level variable with static storage.
#[derive(Clone, Debug)]
pub struct Global {
    pub name: String,
    pub ty: Ty,
    pub init: Option<Const>,
    pub align: Option<Align>,
}

/// A whole translation unit: the only owner of structs, globals, and
/// functions. All ids index into this container.
#[derive(Debug)]
pub struct Module {
    pub name: String,
    pub layout: DataLayout,
    structs: Vec<StructDef>,
    globals: Vec<Global>,
    funcs: Vec<Function>,
}

impl Module {
    pub fn new(name: impl Into<String>) -> Module {
        Module {
            name: name.into(),
            layout: DataLayout::default(),
            structs: Vec::new(),
            globals: Vec::new(),
            funcs: Vec::new(),
        }
    }

    pub fn add_struct(&mut self, def: StructDef) -> StructId {
        let id = StructId(self.structs.len() as u32);
        self.structs.push(def);
        id
    }

    pub fn struct_def(&self, id: StructId) -> &StructDef {
        &self.structs[id.index()]
    }

    /// Replaces a struct's field list in place. The id, name, and packed
    /// flag are preserved; all existing `Ty::Struct` references see the new
    /// body immediately.
    pub fn set_struct_fields(&mut self, id: StructId, fields: Vec<Ty>) {
        self.structs[id.index()].fields = fields;
    }

    pub fn struct_ids(&self) -> impl Iterator<Item = StructId> + '_ {
        (0..self.structs.len() as u32).map(StructId)
    }

    pub fn add_global(&mut self, global: Global) -> GlobalId {
        let id = GlobalId(self.globals.len() as u32);
        self.globals.push(global);
        id
    }

    pub fn global(&self, id: GlobalId) -> &Global {
        &self.globals[id.index()]
    }

    pub fn global_mut(&mut self, id: GlobalId) -> &mut Global {
        &mut self.globals[id.index()]
    }

    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &Global)> {
        self.globals
            .iter()
            .enumerate()
            .map(|(i, g)| (GlobalId(i as u32), g))
    }

    pub fn add_function(&mut self, func: Function) -> FuncId {
        let id = FuncId(self.funcs.len() as u32);
        self.funcs.push(func);
        id
    }

    pub fn func(&self, id: FuncId) -> &Function {
        &self.funcs[id.index()]
    }

    pub fn func_mut(&mut self, id: FuncId) -> &mut Function {
        &mut self.funcs[id.index()]
    }

    pub fn funcs(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.funcs
            .iter()
            .enumerate()
            .map(|(i, f)| (FuncId(i as u32), f))
    }

    pub fn struct_layout(&self, id: StructId) -> StructLayout {
        self.layout.struct_layout(self, id)
    }

    pub fn size_of(&self, ty: &Ty) -> u64 {
        self.layout.size_of(self, ty)
    }

    pub fn align_of(&self, ty: &Ty) -> Align {
        self.layout.align_of(self, ty)
    }
}
