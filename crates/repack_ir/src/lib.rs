//! In-memory IR for the repack optimizer.
//!
//! A small LLVM-shaped module representation: named struct types, globals
//! with constant initializers, and functions made of basic blocks over an
//! instruction arena. Instruction handles (`InstrId`) stay valid across
//! insertions, which is what lets the optimizer hold non-owning
//! back-references to access expressions while it rewrites them.

pub mod builder;
pub mod func;
pub mod layout;
pub mod loops;
pub mod module;
pub mod ty;

pub use builder::FunctionBuilder;
pub use func::{
    BinOp, Block, BlockId, Function, Instr, InstrId, InstrKind, Operand, Param, Terminator,
};
pub use layout::{Align, DataLayout, StructLayout};
pub use loops::LoopInfo;
pub use module::{Const, FuncId, Global, GlobalId, Module, StructDef};
pub use ty::{StructId, Ty};
