//! The IR facade: every classification of an IR shape and every IR
//! mutation funnels through here.
//!
//! The read side enumerates aggregates, globals, and defined functions,
//! classifies address operands, chases user chains to decide how an
//! address is consumed, and answers loop depth through a lazy per-function
//! cache. The write side rewrites field indexes, materializes field
//! addresses in front of direct accesses, propagates alignment hints,
//! installs struct bodies, rebuilds global initializers, and resizes bulk
//! operations.
//!
//! Handles passed in here must have the shape the scanner classified them
//! with. A handle that no longer does (a "direct access" that is not a
//! load or store, a bulk ref that is not a memory intrinsic) is a broken
//! classification contract and panics, aborting the whole run.

use ahash::AHashMap;
use tracing::trace;

use repack_ir::{
    Align, Const, FuncId, Function, GlobalId, InstrId, InstrKind, LoopInfo, Module, Operand,
    StructDef, StructId, Ty,
};

use crate::descriptor::{AccessExpr, AccessKind, BulkRef, GlobalRef, RemapTable};
use crate::error::PassError;

/// Lazily computed loop structure, one entry per function that actually
/// had an attributable access.
#[derive(Default)]
pub struct LoopCache {
    cache: AHashMap<FuncId, LoopInfo>,
}

impl LoopCache {
    pub fn new() -> LoopCache {
        LoopCache::default()
    }

    /// Loop nesting depth of the block holding `at`, computing the
    /// function's loop structure on first demand.
    pub fn depth_of(&mut self, module: &Module, func: FuncId, at: InstrId) -> u32 {
        let block = module.func(func).instr(at).parent;
        let info = self
            .cache
            .entry(func)
            .or_insert_with(|| LoopInfo::compute(module.func(func)));
        info.depth(block)
    }
}

/// Def-to-users index for one function, in program order per definition.
pub struct UserMap {
    users: AHashMap<InstrId, Vec<InstrId>>,
}

impl UserMap {
    pub fn build(func: &Function) -> UserMap {
        let mut users: AHashMap<InstrId, Vec<InstrId>> = AHashMap::new();
        for (id, instr) in func.each_instr() {
            for op in instr.kind.operands() {
                if let Some(def) = op.as_instr() {
                    users.entry(def).or_default().push(id);
                }
            }
        }
        UserMap { users }
    }

    pub fn of(&self, id: InstrId) -> &[InstrId] {
        self.users.get(&id).map_or(&[], Vec::as_slice)
    }
}

/// All struct definitions in the module, in declaration order.
pub fn aggregates(module: &Module) -> impl Iterator<Item = (StructId, &StructDef)> {
    module.struct_ids().map(|id| (id, module.struct_def(id)))
}

/// Functions with a body. Declarations have no accesses to scan.
pub fn defined_funcs(module: &Module) -> impl Iterator<Item = (FuncId, &Function)> {
    module.funcs().filter(|(_, f)| f.is_defined())
}

/// ABI allocation size of a type under the module's data layout.
pub fn type_size(module: &Module, ty: &Ty) -> u64 {
    module.size_of(ty)
}

/// What an address operand turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolvedAddr {
    /// An explicit field address with a compile-time-constant index.
    Field {
        expr: InstrId,
        struct_id: StructId,
        index: usize,
    },
    /// A bare aggregate-typed location; an implicit access to field 0.
    Direct { struct_id: StructId },
    /// Anything else, a computed field selection included. Contributes no
    /// usage data.
    Opaque,
}

/// Classifies the address operand of a load or store.
pub fn resolve_addr(module: &Module, func: &Function, addr: &Operand) -> ResolvedAddr {
    match addr {
        Operand::Instr(id) => match &func.instr(*id).kind {
            InstrKind::FieldAddr {
                struct_id, index, ..
            } => match index.const_int() {
                Some(i) if i >= 0 => ResolvedAddr::Field {
                    expr: *id,
                    struct_id: *struct_id,
                    index: i as usize,
                },
                _ => ResolvedAddr::Opaque,
            },
            InstrKind::Alloca { ty: Ty::Struct(sid) } => ResolvedAddr::Direct { struct_id: *sid },
            _ => ResolvedAddr::Opaque,
        },
        Operand::Global(gid) => match module.global(*gid).ty.struct_id() {
            Some(sid) => ResolvedAddr::Direct { struct_id: sid },
            None => ResolvedAddr::Opaque,
        },
        _ => ResolvedAddr::Opaque,
    }
}

/// Decides how a field address with no direct load/store consumer is used,
/// by chasing its users. Chained field addresses recurse; the first
/// classified consumer wins. Stores that capture the address as a value,
/// calls, and bulk intrinsics consume the pointer without a classifiable
/// field access, so an address used only that way escapes: it earns no
/// read/write weight but keeps a constant index the applier must still
/// re-point.
pub fn chase_access_kind(func: &Function, users: &UserMap, addr: InstrId) -> AccessKind {
    for &user in users.of(addr) {
        match &func.instr(user).kind {
            InstrKind::Load { addr: a, .. } if a.as_instr() == Some(addr) => {
                return AccessKind::Read;
            }
            InstrKind::Store { addr: a, .. } if a.as_instr() == Some(addr) => {
                return AccessKind::Write;
            }
            InstrKind::FieldAddr { base, .. } if base.as_instr() == Some(addr) => {
                let kind = chase_access_kind(func, users, user);
                if kind != AccessKind::Escape {
                    return kind;
                }
            }
            _ => {}
        }
    }
    AccessKind::Escape
}

/// Resolves the destination of a bulk copy/fill to an aggregate: an
/// alloca's allocated type, a field address's source aggregate, or a
/// global's declared type. Anything else is unresolvable and skipped.
pub fn resolve_bulk_dst(module: &Module, func: &Function, dst: &Operand) -> Option<StructId> {
    match dst {
        Operand::Instr(id) => match &func.instr(*id).kind {
            InstrKind::Alloca { ty } => ty.struct_id(),
            InstrKind::FieldAddr { struct_id, .. } => Some(*struct_id),
            _ => None,
        },
        Operand::Global(gid) => module.global(*gid).ty.struct_id(),
        _ => None,
    }
}

/// Globals declared with the aggregate's type and a non-zero initializer.
pub fn struct_globals(module: &Module, struct_id: StructId) -> Vec<GlobalRef> {
    let mut refs = Vec::new();
    for (gid, global) in module.globals() {
        if global.ty.struct_id() != Some(struct_id) {
            continue;
        }
        let Some(init) = &global.init else { continue };
        if init.is_zero() {
            trace!(global = %global.name, "zero init, skipped");
            continue;
        }
        let elem_count = match init {
            Const::Struct { elems, .. } => elems.len(),
            _ => 0,
        };
        refs.push(GlobalRef {
            global: gid,
            elem_count,
        });
    }
    refs
}

/// Current size of the aggregate, re-derived from the live layout.
pub fn struct_size(module: &Module, struct_id: StructId) -> u64 {
    module.struct_layout(struct_id).size
}

/// Alignment provable for the field at `index` of the current layout:
/// the aggregate's own alignment narrowed by the field's byte offset.
pub fn field_alignment(module: &Module, struct_id: StructId, index: usize) -> Align {
    let layout = module.struct_layout(struct_id);
    layout.align.common(layout.offset(index))
}

/// Points an access expression at `new_index`.
///
/// An explicit field address gets its constant index operand replaced,
/// keeping the operand's integer type. A direct access has no expression
/// to rewrite; if its field moved away from slot 0, a real field address
/// is materialized in front of the load/store and the access is repointed
/// at it. Both shapes skip work already done, so the same expression can
/// back any number of uses.
pub fn rewrite_field_index(
    module: &mut Module,
    expr: AccessExpr,
    struct_id: StructId,
    new_index: usize,
) {
    match expr {
        AccessExpr::Field { func, instr } => {
            let func = module.func_mut(func);
            match &mut func.instr_mut(instr).kind {
                InstrKind::FieldAddr { index, .. } => {
                    let Some(ty) = const_int_ty(index) else {
                        panic!("field address {instr:?} has a non-constant index");
                    };
                    if index.const_int() == Some(new_index as i64) {
                        return;
                    }
                    *index = Operand::Const(Const::Int {
                        value: new_index as i64,
                        ty,
                    });
                }
                other => panic!("field access {instr:?} is not a field address: {other:?}"),
            }
        }
        AccessExpr::Direct { func, instr } => {
            let func = module.func_mut(func);
            let addr = match &func.instr(instr).kind {
                InstrKind::Load { addr, .. } | InstrKind::Store { addr, .. } => addr.clone(),
                other => panic!("direct access {instr:?} is neither load nor store: {other:?}"),
            };
            if let Some(fa) = addr.as_instr() {
                if let InstrKind::FieldAddr {
                    struct_id: sid,
                    index,
                    ..
                } = &func.instr(fa).kind
                {
                    if *sid == struct_id && index.const_int() == Some(new_index as i64) {
                        return;
                    }
                }
            }
            if new_index == 0 {
                return;
            }
            let fa = func.insert_before(
                instr,
                InstrKind::FieldAddr {
                    base: addr,
                    struct_id,
                    index: Operand::Const(Const::i32(new_index as i64)),
                },
            );
            trace!(instr = ?instr, index = new_index, "materialized field address");
            match &mut func.instr_mut(instr).kind {
                InstrKind::Load { addr, .. } | InstrKind::Store { addr, .. } => {
                    *addr = Operand::Instr(fa);
                }
                _ => unreachable!(),
            }
        }
    }
}

/// Pushes an alignment hint to every load and store reachable from the
/// access, following chained field addresses off the same base.
pub fn propagate_alignment(module: &mut Module, expr: AccessExpr, align: Align) {
    let func = module.func_mut(expr.func());
    match expr {
        AccessExpr::Field { instr, .. } => {
            let users = UserMap::build(func);
            let mut targets = Vec::new();
            collect_align_targets(func, &users, instr, &mut targets);
            for target in targets {
                set_mem_align(func, target, align);
            }
        }
        AccessExpr::Direct { instr, .. } => set_mem_align(func, instr, align),
    }
}

fn collect_align_targets(func: &Function, users: &UserMap, addr: InstrId, out: &mut Vec<InstrId>) {
    for &user in users.of(addr) {
        match &func.instr(user).kind {
            InstrKind::Load { addr: a, .. } | InstrKind::Store { addr: a, .. }
                if a.as_instr() == Some(addr) =>
            {
                out.push(user);
            }
            InstrKind::FieldAddr { base, .. } if base.as_instr() == Some(addr) => {
                collect_align_targets(func, users, user, out);
            }
            _ => {}
        }
    }
}

fn set_mem_align(func: &mut Function, instr: InstrId, align: Align) {
    match &mut func.instr_mut(instr).kind {
        InstrKind::Load { align: a, .. } | InstrKind::Store { align: a, .. } => *a = Some(align),
        other => panic!("alignment target {instr:?} is neither load nor store: {other:?}"),
    }
}

/// Installs a reordered field list as the struct's new body. Identity and
/// the packed flag survive; the next layout query sees the new order.
pub fn install_struct_body(module: &mut Module, struct_id: StructId, fields: Vec<Ty>) {
    module.set_struct_fields(struct_id, fields);
}

/// Validates that a global's initializer can be remapped field-wise:
/// present, an aggregate constant of this struct, one element per field.
pub fn check_global_init(
    module: &Module,
    struct_id: StructId,
    gid: GlobalId,
) -> Result<usize, PassError> {
    let global = module.global(gid);
    let field_count = module.struct_def(struct_id).fields.len();
    let init = global
        .init
        .as_ref()
        .ok_or_else(|| PassError::MissingInitializer {
            global: global.name.clone(),
        })?;
    let elems = match init {
        Const::Struct { struct_id: sid, elems } if *sid == struct_id => elems,
        _ => {
            return Err(PassError::InitializerShape {
                global: global.name.clone(),
            });
        }
    };
    if elems.len() != field_count {
        return Err(PassError::InitializerArity {
            global: global.name.clone(),
            strukt: module.struct_def(struct_id).display_name().to_string(),
            expected: field_count,
            found: elems.len(),
        });
    }
    Ok(elems.len())
}

/// Rebuilds a global initializer so element `i` of the new value is the
/// old value's element `remap.old_of(i)`. Must run only after
/// [`check_global_init`] has accepted the global.
pub fn remap_global_init(
    module: &mut Module,
    gid: GlobalId,
    struct_id: StructId,
    remap: &RemapTable,
) {
    let global = module.global_mut(gid);
    let old = match global.init.take() {
        Some(Const::Struct { elems, .. }) => elems,
        other => panic!(
            "global `{}` initializer changed shape before remap: {other:?}",
            global.name
        ),
    };
    let mut elems = Vec::with_capacity(old.len());
    for new in 0..remap.len() {
        elems.push(old[remap.old_of(new)].clone());
    }
    global.init = Some(Const::Struct { struct_id, elems });
}

/// Overwrites a bulk op's length with the aggregate's new size, keeping
/// the length operand's integer type.
pub fn rewrite_bulk_len(module: &mut Module, bulk: BulkRef, new_len: u64) {
    let func = module.func_mut(bulk.func);
    match &mut func.instr_mut(bulk.instr).kind {
        InstrKind::MemCopy { len, .. } | InstrKind::MemFill { len, .. } => {
            let Some(ty) = const_int_ty(len) else {
                panic!("bulk op {:?} has a non-constant length", bulk.instr);
            };
            *len = Operand::Const(Const::Int {
                value: new_len as i64,
                ty,
            });
        }
        other => panic!("bulk ref {:?} is not a memory intrinsic: {other:?}", bulk.instr),
    }
}

fn const_int_ty(op: &Operand) -> Option<Ty> {
    match op {
        Operand::Const(Const::Int { ty, .. }) => Some(ty.clone()),
        Operand::Const(Const::Zero(ty)) if ty.is_integer() => Some(ty.clone()),
        _ => None,
    }
}
