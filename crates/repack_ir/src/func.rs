//! Functions, basic blocks, and the instruction arena.
//!
//! Instructions live in a per-function arena and blocks hold sequences of
//! arena ids. Inserting an instruction never moves the others, so an
//! [`InstrId`] held by an analysis stays valid while the function is being
//! rewritten.

use crate::layout::Align;
use crate::module::{Const, GlobalId};
use crate::ty::{StructId, Ty};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct BlockId(pub u32);

impl BlockId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct InstrId(pub u32);

impl InstrId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A value consumed by an instruction.
#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    /// Result of another instruction.
    Instr(InstrId),
    /// Function parameter by position.
    Param(u32),
    /// Address of a global.
    Global(GlobalId),
    Const(Const),
}

impl Operand {
    #[inline]
    pub fn as_instr(&self) -> Option<InstrId> {
        match self {
            Operand::Instr(id) => Some(*id),
            _ => None,
        }
    }

    /// The constant integer value, if this operand is one.
    pub fn const_int(&self) -> Option<i64> {
        match self {
            Operand::Const(c) => c.int_value(),
            _ => None,
        }
    }
}

impl From<InstrId> for Operand {
    fn from(id: InstrId) -> Operand {
        Operand::Instr(id)
    }
}

impl From<GlobalId> for Operand {
    fn from(id: GlobalId) -> Operand {
        Operand::Global(id)
    }
}

impl From<Const> for Operand {
    fn from(c: Const) -> Operand {
        Operand::Const(c)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Lt,
}

/// One instruction. Address-producing kinds (`Alloca`, `FieldAddr`,
/// `ElemAddr`) yield `ptr` values; the rest are self-describing.
#[derive(Clone, Debug, PartialEq)]
pub enum InstrKind {
    /// Stack slot holding one `ty`.
    Alloca { ty: Ty },
    /// Address of field `index` of the struct at `base`.
    FieldAddr {
        base: Operand,
        struct_id: StructId,
        index: Operand,
    },
    /// Address of element `index` of an array of `elem_ty` at `base`.
    ElemAddr {
        base: Operand,
        elem_ty: Ty,
        index: Operand,
    },
    Load {
        addr: Operand,
        ty: Ty,
        align: Option<Align>,
    },
    Store {
        addr: Operand,
        value: Operand,
        align: Option<Align>,
    },
    /// `memcpy(dst, src, len)` over raw bytes.
    MemCopy {
        dst: Operand,
        src: Operand,
        len: Operand,
    },
    /// `memset(dst, byte, len)` over raw bytes.
    MemFill {
        dst: Operand,
        byte: Operand,
        len: Operand,
    },
    Call {
        callee: String,
        args: Vec<Operand>,
        ty: Option<Ty>,
    },
    Bin {
        op: BinOp,
        lhs: Operand,
        rhs: Operand,
        ty: Ty,
    },
}

impl InstrKind {
    /// All operands, for generic def-use walks.
    pub fn operands(&self) -> Vec<&Operand> {
        match self {
            InstrKind::Alloca { .. } => vec![],
            InstrKind::FieldAddr { base, index, .. }
            | InstrKind::ElemAddr { base, index, .. } => vec![base, index],
            InstrKind::Load { addr, .. } => vec![addr],
            InstrKind::Store { addr, value, .. } => vec![addr, value],
            InstrKind::MemCopy { dst, src, len } => vec![dst, src, len],
            InstrKind::MemFill { dst, byte, len } => vec![dst, byte, len],
            InstrKind::Call { args, .. } => args.iter().collect(),
            InstrKind::Bin { lhs, rhs, .. } => vec![lhs, rhs],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Instr {
    pub kind: InstrKind,
    /// Block whose sequence carries this instruction.
    pub parent: BlockId,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Terminator {
    Ret(Option<Operand>),
    Br(BlockId),
    CondBr {
        cond: Operand,
        then_dest: BlockId,
        else_dest: BlockId,
    },
}

impl Terminator {
    pub fn successors(&self) -> impl Iterator<Item = BlockId> + '_ {
        let (a, b) = match self {
            Terminator::Ret(_) => (None, None),
            Terminator::Br(dest) => (Some(*dest), None),
            Terminator::CondBr {
                then_dest,
                else_dest,
                ..
            } => (Some(*then_dest), Some(*else_dest)),
        };
        a.into_iter().chain(b)
    }
}

#[derive(Clone, Debug)]
pub struct Block {
    pub label: String,
    /// Instruction ids in execution order.
    pub seq: Vec<InstrId>,
    pub term: Terminator,
}

impl Block {
    pub fn new(label: impl Into<String>) -> Block {
        Block {
            label: label.into(),
            seq: Vec::new(),
            term: Terminator::Ret(None),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Param {
    pub name: String,
    pub ty: Ty,
}

/// A function body. Block 0 is the entry; a function with no blocks is a
/// declaration.
#[derive(Clone, Debug)]
pub struct Function {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<Ty>,
    instrs: Vec<Instr>,
    blocks: Vec<Block>,
}

impl Function {
    pub fn new(name: impl Into<String>) -> Function {
        Function {
            name: name.into(),
            params: Vec::new(),
            ret: None,
            instrs: Vec::new(),
            blocks: Vec::new(),
        }
    }

    #[inline]
    pub fn is_defined(&self) -> bool {
        !self.blocks.is_empty()
    }

    pub fn instr(&self, id: InstrId) -> &Instr {
        &self.instrs[id.index()]
    }

    pub fn instr_mut(&mut self, id: InstrId) -> &mut Instr {
        &mut self.instrs[id.index()]
    }

    pub fn block(&self, id: BlockId) -> &Block {
        &self.blocks[id.index()]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut Block {
        &mut self.blocks[id.index()]
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn blocks(&self) -> impl Iterator<Item = (BlockId, &Block)> {
        self.blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (BlockId(i as u32), b))
    }

    /// Every instruction in program order (block order, then sequence
    /// order).
    pub fn each_instr(&self) -> impl Iterator<Item = (InstrId, &Instr)> {
        let instrs = &self.instrs;
        self.blocks
            .iter()
            .flat_map(move |b| b.seq.iter().map(move |&id| (id, &instrs[id.index()])))
    }

    pub fn add_block(&mut self, label: impl Into<String>) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Block::new(label));
        id
    }

    /// Appends an instruction to the end of `block`.
    pub fn push_instr(&mut self, block: BlockId, kind: InstrKind) -> InstrId {
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(Instr { kind, parent: block });
        self.blocks[block.index()].seq.push(id);
        id
    }

    /// Inserts a new instruction immediately before `before` in its block.
    ///
    /// Panics if `before` is not present in its parent block's sequence,
    /// which would mean the arena and the block lists disagree.
    pub fn insert_before(&mut self, before: InstrId, kind: InstrKind) -> InstrId {
        let parent = self.instrs[before.index()].parent;
        let id = InstrId(self.instrs.len() as u32);
        self.instrs.push(Instr { kind, parent });
        let seq = &mut self.blocks[parent.index()].seq;
        let pos = seq
            .iter()
            .position(|&i| i == before)
            .expect("instruction missing from its parent block");
        seq.insert(pos, id);
        id
    }
}
