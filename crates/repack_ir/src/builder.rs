//! Convenience builder for assembling functions instruction by instruction.
//!
//! Used heavily by tests and by anything that synthesizes IR. The builder
//! keeps a cursor block; instruction methods append there and return the
//! new [`InstrId`], which converts into an [`Operand`] wherever one is
//! needed.

use crate::func::{BinOp, BlockId, Function, InstrId, InstrKind, Operand, Param, Terminator};
use crate::layout::Align;
use crate::module::{Const, FuncId, Module};
use crate::ty::{StructId, Ty};

pub struct FunctionBuilder<'m> {
    module: &'m mut Module,
    func: Function,
    cursor: BlockId,
}

impl<'m> FunctionBuilder<'m> {
    /// Starts a function with an `entry` block and the cursor on it.
    pub fn new(module: &'m mut Module, name: impl Into<String>) -> Self {
        let mut func = Function::new(name);
        let cursor = func.add_block("entry");
        FunctionBuilder {
            module,
            func,
            cursor,
        }
    }

    pub fn param(&mut self, name: impl Into<String>, ty: Ty) -> Operand {
        let idx = self.func.params.len() as u32;
        self.func.params.push(Param {
            name: name.into(),
            ty,
        });
        Operand::Param(idx)
    }

    pub fn returns(&mut self, ty: Ty) -> &mut Self {
        self.func.ret = Some(ty);
        self
    }

    /// Creates a block without moving the cursor.
    pub fn block(&mut self, label: impl Into<String>) -> BlockId {
        self.func.add_block(label)
    }

    pub fn switch_to(&mut self, block: BlockId) {
        self.cursor = block;
    }

    pub fn cursor(&self) -> BlockId {
        self.cursor
    }

    fn push(&mut self, kind: InstrKind) -> InstrId {
        self.func.push_instr(self.cursor, kind)
    }

    pub fn alloca(&mut self, ty: Ty) -> InstrId {
        self.push(InstrKind::Alloca { ty })
    }

    /// Field address with a constant index, the common case.
    pub fn field_addr(
        &mut self,
        base: impl Into<Operand>,
        struct_id: StructId,
        index: u64,
    ) -> InstrId {
        self.push(InstrKind::FieldAddr {
            base: base.into(),
            struct_id,
            index: Operand::Const(Const::i32(index as i64)),
        })
    }

    /// Field address with an arbitrary index operand.
    pub fn field_addr_dyn(
        &mut self,
        base: impl Into<Operand>,
        struct_id: StructId,
        index: impl Into<Operand>,
    ) -> InstrId {
        self.push(InstrKind::FieldAddr {
            base: base.into(),
            struct_id,
            index: index.into(),
        })
    }

    pub fn elem_addr(
        &mut self,
        base: impl Into<Operand>,
        elem_ty: Ty,
        index: impl Into<Operand>,
    ) -> InstrId {
        self.push(InstrKind::ElemAddr {
            base: base.into(),
            elem_ty,
            index: index.into(),
        })
    }

    pub fn load(&mut self, addr: impl Into<Operand>, ty: Ty) -> InstrId {
        self.push(InstrKind::Load {
            addr: addr.into(),
            ty,
            align: None,
        })
    }

    pub fn load_aligned(&mut self, addr: impl Into<Operand>, ty: Ty, align: Align) -> InstrId {
        self.push(InstrKind::Load {
            addr: addr.into(),
            ty,
            align: Some(align),
        })
    }

    pub fn store(&mut self, addr: impl Into<Operand>, value: impl Into<Operand>) -> InstrId {
        self.push(InstrKind::Store {
            addr: addr.into(),
            value: value.into(),
            align: None,
        })
    }

    pub fn store_aligned(
        &mut self,
        addr: impl Into<Operand>,
        value: impl Into<Operand>,
        align: Align,
    ) -> InstrId {
        self.push(InstrKind::Store {
            addr: addr.into(),
            value: value.into(),
            align: Some(align),
        })
    }

    pub fn mem_copy(
        &mut self,
        dst: impl Into<Operand>,
        src: impl Into<Operand>,
        len: impl Into<Operand>,
    ) -> InstrId {
        self.push(InstrKind::MemCopy {
            dst: dst.into(),
            src: src.into(),
            len: len.into(),
        })
    }

    pub fn mem_fill(
        &mut self,
        dst: impl Into<Operand>,
        byte: impl Into<Operand>,
        len: impl Into<Operand>,
    ) -> InstrId {
        self.push(InstrKind::MemFill {
            dst: dst.into(),
            byte: byte.into(),
            len: len.into(),
        })
    }

    pub fn call(
        &mut self,
        callee: impl Into<String>,
        args: Vec<Operand>,
        ty: Option<Ty>,
    ) -> InstrId {
        self.push(InstrKind::Call {
            callee: callee.into(),
            args,
            ty,
        })
    }

    pub fn bin(
        &mut self,
        op: BinOp,
        lhs: impl Into<Operand>,
        rhs: impl Into<Operand>,
        ty: Ty,
    ) -> InstrId {
        self.push(InstrKind::Bin {
            op,
            lhs: lhs.into(),
            rhs: rhs.into(),
            ty,
        })
    }

    pub fn ret(&mut self, value: Option<Operand>) {
        self.func.block_mut(self.cursor).term = Terminator::Ret(value);
    }

    pub fn br(&mut self, dest: BlockId) {
        self.func.block_mut(self.cursor).term = Terminator::Br(dest);
    }

    pub fn cond_br(&mut self, cond: impl Into<Operand>, then_dest: BlockId, else_dest: BlockId) {
        self.func.block_mut(self.cursor).term = Terminator::CondBr {
            cond: cond.into(),
            then_dest,
            else_dest,
        };
    }

    /// Hands the finished function to the module.
    pub fn finish(self) -> FuncId {
        self.module.add_function(self.func)
    }
}
