//! Usage scanning: one walk over every defined function.
//!
//! Pass one visits the memory traffic. Every load and store is resolved
//! through the facade to a `(struct, field)` pair, so an address value
//! reused by several loads and stores yields one attributed site per
//! consumer, not per address. Bulk copies and fills resolve their
//! destination aggregate in the same pass. Pass two picks up field
//! addresses nobody loads from or stores to directly and classifies them
//! by chasing how the address value is consumed; addresses that escape
//! into calls, bulk intrinsics, or memory are kept as weight-neutral
//! sites so the applier still re-indexes them.

use ahash::AHashSet;
use tracing::{debug, trace};

use repack_ir::{FuncId, Function, InstrId, InstrKind, Module, Operand, StructId};

use crate::descriptor::{AccessExpr, AccessKind, BulkRef, FieldUse, StructDescriptor};
use crate::facade::{self, LoopCache, ResolvedAddr, UserMap};

/// One attributable access site.
#[derive(Clone, Copy, Debug)]
pub struct AccessSite {
    pub struct_id: StructId,
    pub field_index: usize,
    pub expr: AccessExpr,
    pub kind: AccessKind,
    /// The instruction whose position decides loop depth: the consuming
    /// load/store where there is one, the address expression otherwise.
    pub at: InstrId,
}

/// A bulk op with a resolved aggregate destination and a constant length.
#[derive(Clone, Copy, Debug)]
pub struct BulkSite {
    pub struct_id: StructId,
    pub instr: InstrId,
}

/// Everything one function contributed.
pub struct FunctionUsages {
    pub func: FuncId,
    pub sites: Vec<AccessSite>,
    pub bulk: Vec<BulkSite>,
}

impl FunctionUsages {
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty() && self.bulk.is_empty()
    }
}

/// Scans every defined function, keeping only those that referenced a
/// struct at all.
pub fn scan_all(module: &Module) -> Vec<FunctionUsages> {
    debug!("scanning functions");
    let mut all = Vec::new();
    for (func, f) in facade::defined_funcs(module) {
        let usages = scan_function(module, func);
        if usages.is_empty() {
            trace!(func = %f.name, "no struct references, skipped");
            continue;
        }
        trace!(
            func = %f.name,
            sites = usages.sites.len(),
            bulk = usages.bulk.len(),
            "found references"
        );
        all.push(usages);
    }
    debug!(functions = all.len(), "scanned functions");
    all
}

pub fn scan_function(module: &Module, func: FuncId) -> FunctionUsages {
    let f = module.func(func);
    let mut sites = Vec::new();
    let mut bulk = Vec::new();
    // Field addresses consumed as a load/store address. Their kind is
    // settled by the consumer; pass two must not reclassify them.
    let mut fed: AHashSet<InstrId> = AHashSet::new();

    for (id, instr) in f.each_instr() {
        match &instr.kind {
            InstrKind::Load { addr, .. } => {
                record_access(
                    module,
                    f,
                    func,
                    addr,
                    AccessKind::Read,
                    id,
                    &mut sites,
                    &mut fed,
                );
            }
            InstrKind::Store { addr, .. } => {
                record_access(
                    module,
                    f,
                    func,
                    addr,
                    AccessKind::Write,
                    id,
                    &mut sites,
                    &mut fed,
                );
            }
            InstrKind::MemCopy { dst, len, .. } | InstrKind::MemFill { dst, len, .. } => {
                let Some(struct_id) = facade::resolve_bulk_dst(module, f, dst) else {
                    trace!(instr = ?id, "bulk destination unresolved, skipped");
                    continue;
                };
                if len.const_int().is_none() {
                    trace!(instr = ?id, "bulk length not constant, skipped");
                    continue;
                }
                bulk.push(BulkSite {
                    struct_id,
                    instr: id,
                });
            }
            _ => {}
        }
    }

    let users = UserMap::build(f);
    for (id, instr) in f.each_instr() {
        let InstrKind::FieldAddr {
            struct_id, index, ..
        } = &instr.kind
        else {
            continue;
        };
        if fed.contains(&id) {
            continue;
        }
        let Some(field_index) = const_field_index(index) else {
            continue;
        };
        // Kept whatever the consumer turns out to be. An address that
        // escapes still names a field slot and goes stale the moment the
        // field moves.
        let kind = facade::chase_access_kind(f, &users, id);
        sites.push(AccessSite {
            struct_id: *struct_id,
            field_index,
            expr: AccessExpr::Field { func, instr: id },
            kind,
            at: id,
        });
    }

    FunctionUsages { func, sites, bulk }
}

#[allow(clippy::too_many_arguments)]
fn record_access(
    module: &Module,
    f: &Function,
    func: FuncId,
    addr: &Operand,
    kind: AccessKind,
    at: InstrId,
    sites: &mut Vec<AccessSite>,
    fed: &mut AHashSet<InstrId>,
) {
    match facade::resolve_addr(module, f, addr) {
        ResolvedAddr::Field {
            expr,
            struct_id,
            index,
        } => {
            fed.insert(expr);
            sites.push(AccessSite {
                struct_id,
                field_index: index,
                expr: AccessExpr::Field { func, instr: expr },
                kind,
                at,
            });
        }
        ResolvedAddr::Direct { struct_id } => {
            sites.push(AccessSite {
                struct_id,
                field_index: 0,
                expr: AccessExpr::Direct { func, instr: at },
                kind,
                at,
            });
        }
        ResolvedAddr::Opaque => {}
    }
}

fn const_field_index(index: &Operand) -> Option<usize> {
    match index.const_int() {
        Some(i) if i >= 0 => Some(i as usize),
        _ => None,
    }
}

/// Folds one function's findings into one aggregate's descriptor: bumps
/// read/write counters, records each use with its loop depth, and adopts
/// matching bulk ops. Returns the number of uses attributed.
///
/// Panics if a site names a field slot the aggregate does not have; the
/// catalog and the scanner would be disagreeing about the same type.
pub fn collect_field_uses(
    module: &Module,
    desc: &mut StructDescriptor,
    usages: &FunctionUsages,
    cache: &mut LoopCache,
) -> usize {
    let mut found = 0;
    for site in &usages.sites {
        if site.struct_id != desc.id {
            continue;
        }
        assert!(
            site.field_index < desc.fields.len(),
            "access to field {} of `{}` which has {} fields",
            site.field_index,
            desc.name,
            desc.fields.len()
        );
        let depth = cache.depth_of(module, usages.func, site.at);
        let field = &mut desc.fields[site.field_index];
        match site.kind {
            AccessKind::Read => field.reads += 1,
            AccessKind::Write => field.writes += 1,
            AccessKind::Escape => {}
        }
        field.uses.push(FieldUse {
            expr: site.expr,
            kind: site.kind,
            loop_depth: depth,
        });
        found += 1;
    }
    for site in &usages.bulk {
        if site.struct_id == desc.id {
            desc.bulk_ops.push(BulkRef {
                func: usages.func,
                instr: site.instr,
            });
        }
    }
    found
}
