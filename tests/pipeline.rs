//! End-to-end runs of the layout pass over hand-built modules.
//!
//! Each test constructs a module with the builder, runs the full
//! pipeline, and checks the observable contract: field order, rewritten
//! access indexes, permuted initializers, resized bulk ops, and the
//! fixed point on a second run.

use repack::{optimize_module, Options};
use repack_ir::{
    Align, Const, FuncId, FunctionBuilder, Global, GlobalId, InstrId, InstrKind, Module, StructDef,
    StructId, Ty,
};
use repack_utils::init_test_logging;

fn field_index_of(module: &Module, func: FuncId, fa: InstrId) -> Option<i64> {
    match &module.func(func).instr(fa).kind {
        InstrKind::FieldAddr { index, .. } => index.const_int(),
        other => panic!("expected a field address, found {other:?}"),
    }
}

fn init_values(module: &Module, gid: GlobalId) -> Vec<i64> {
    let Some(Const::Struct { elems, .. }) = &module.global(gid).init else {
        panic!("global lost its aggregate initializer");
    };
    elems
        .iter()
        .map(|e| e.int_value().unwrap_or_else(|| panic!("non-int element {e:?}")))
        .collect()
}

/// {i32 cold, i64 hot_b, i32 hot_c} with the hot pair touched inside a
/// loop, plus a global initializer and a whole-struct copy.
fn hot_cold_module() -> (Module, StructId, GlobalId, FuncId, [InstrId; 3], InstrId) {
    let mut module = Module::new("hot_cold");
    let sid = module.add_struct(StructDef::new(
        Some("packet".into()),
        vec![Ty::I32, Ty::I64, Ty::I32],
    ));
    let gid = module.add_global(Global {
        name: "template".into(),
        ty: Ty::Struct(sid),
        init: Some(Const::Struct {
            struct_id: sid,
            elems: vec![Const::i32(1), Const::i64(2), Const::i32(3)],
        }),
        align: None,
    });

    let mut b = FunctionBuilder::new(&mut module, "process");
    let cond = b.param("more", Ty::I8);
    let slot = b.alloca(Ty::Struct(sid));
    let copy = b.mem_copy(slot, gid, Const::i64(24));
    let pa = b.field_addr(slot, sid, 0);
    b.load(pa, Ty::I32);
    let head = b.block("head");
    let body = b.block("body");
    let exit = b.block("exit");
    b.br(head);
    b.switch_to(head);
    b.cond_br(cond, body, exit);
    b.switch_to(body);
    let pb = b.field_addr(slot, sid, 1);
    let vb = b.load(pb, Ty::I64);
    b.store(pb, vb);
    let pc = b.field_addr(slot, sid, 2);
    b.load(pc, Ty::I32);
    b.br(head);
    b.switch_to(exit);
    b.ret(None);
    let fid = b.finish();

    (module, sid, gid, fid, [pa, pb, pc], copy)
}

#[test]
fn test_hot_fields_move_to_the_front() {
    init_test_logging();
    let (mut module, sid, gid, fid, [pa, pb, pc], copy) = hot_cold_module();

    let outcome = optimize_module(&mut module, &Options::default());

    assert!(outcome.modified);
    assert_eq!(outcome.stats.structs_considered, 1);
    assert_eq!(outcome.stats.structs_reordered, 1);
    assert_eq!(outcome.stats.uses_attributed, 4);
    assert_eq!(outcome.stats.globals_remapped, 1);
    assert_eq!(outcome.stats.bulk_ops_resized, 1);

    // Loop-resident i64 leads, loop-resident i32 follows, cold i32 last.
    assert_eq!(
        module.struct_def(sid).fields,
        vec![Ty::I64, Ty::I32, Ty::I32]
    );
    assert_eq!(field_index_of(&module, fid, pb), Some(0));
    assert_eq!(field_index_of(&module, fid, pc), Some(1));
    assert_eq!(field_index_of(&module, fid, pa), Some(2));

    // Values follow their fields through the initializer.
    assert_eq!(init_values(&module, gid), vec![2, 3, 1]);

    // {i64, i32, i32} needs no tail padding: 24 bytes down to 16.
    match &module.func(fid).instr(copy).kind {
        InstrKind::MemCopy { len, .. } => assert_eq!(len.const_int(), Some(16)),
        other => panic!("copy vanished: {other:?}"),
    }
}

#[test]
fn test_second_run_reaches_a_fixed_point() {
    init_test_logging();
    let (mut module, sid, gid, ..) = hot_cold_module();

    let first = optimize_module(&mut module, &Options::default());
    assert!(first.modified);
    let fields_after_first = module.struct_def(sid).fields.clone();
    let init_after_first = init_values(&module, gid);

    let second = optimize_module(&mut module, &Options::default());
    assert!(!second.modified);
    assert_eq!(second.stats.structs_reordered, 0);
    assert_eq!(module.struct_def(sid).fields, fields_after_first);
    assert_eq!(init_values(&module, gid), init_after_first);
}

#[test]
fn test_direct_global_access_gets_a_field_address() {
    init_test_logging();
    let mut module = Module::new("direct");
    let sid = module.add_struct(StructDef::new(
        Some("counter".into()),
        vec![Ty::I32, Ty::I64],
    ));
    let gid = module.add_global(Global {
        name: "counters".into(),
        ty: Ty::Struct(sid),
        init: Some(Const::Struct {
            struct_id: sid,
            elems: vec![Const::i32(5), Const::i64(6)],
        }),
        align: None,
    });

    let mut b = FunctionBuilder::new(&mut module, "tick");
    let cond = b.param("more", Ty::I8);
    // Bare global address: an implicit access to field 0.
    b.load(gid, Ty::I32);
    let head = b.block("head");
    let body = b.block("body");
    let exit = b.block("exit");
    b.br(head);
    b.switch_to(head);
    b.cond_br(cond, body, exit);
    b.switch_to(body);
    let ph = b.field_addr(gid, sid, 1);
    let vh = b.load(ph, Ty::I64);
    b.store(ph, vh);
    b.br(head);
    b.switch_to(exit);
    b.ret(None);
    let fid = b.finish();

    let outcome = optimize_module(&mut module, &Options::default());
    assert!(outcome.modified);
    assert_eq!(module.struct_def(sid).fields, vec![Ty::I64, Ty::I32]);
    assert_eq!(init_values(&module, gid), vec![6, 5]);

    // The bare load now goes through a synthesized address for slot 1.
    let func = module.func(fid);
    let load_id = func
        .each_instr()
        .find(|(_, i)| matches!(&i.kind, InstrKind::Load { ty, .. } if *ty == Ty::I32))
        .map(|(id, _)| id)
        .unwrap();
    let InstrKind::Load { addr, .. } = &func.instr(load_id).kind else {
        unreachable!();
    };
    let fa = addr.as_instr().unwrap();
    assert_eq!(field_index_of(&module, fid, fa), Some(1));

    // And the synthesized address keeps the second run at a fixed point.
    let second = optimize_module(&mut module, &Options::default());
    assert!(!second.modified);
}

#[test]
fn test_escaped_addresses_follow_their_field() {
    init_test_logging();
    let mut module = Module::new("escape");
    let sid = module.add_struct(StructDef::new(
        Some("message".into()),
        vec![Ty::I32, Ty::I64],
    ));

    let mut b = FunctionBuilder::new(&mut module, "send");
    let cond = b.param("more", Ty::I8);
    let slot = b.alloca(Ty::Struct(sid));
    // Field 0's address leaks three ways: into a call, into a bulk fill,
    // and into memory as a value. None of them is a load or a store.
    let p_call = b.field_addr(slot, sid, 0);
    b.call("sink", vec![p_call.into()], None);
    let p_fill = b.field_addr(slot, sid, 0);
    let fill = b.mem_fill(p_fill, Const::int(0, Ty::I8), Const::i64(16));
    let cell = b.alloca(Ty::Ptr);
    let p_held = b.field_addr(slot, sid, 0);
    b.store(cell, p_held);
    let head = b.block("head");
    let body = b.block("body");
    let exit = b.block("exit");
    b.br(head);
    b.switch_to(head);
    b.cond_br(cond, body, exit);
    b.switch_to(body);
    let p_hot = b.field_addr(slot, sid, 1);
    let vh = b.load(p_hot, Ty::I64);
    b.store(p_hot, vh);
    b.br(head);
    b.switch_to(exit);
    b.ret(None);
    let fid = b.finish();

    let outcome = optimize_module(&mut module, &Options::default());
    assert!(outcome.modified);
    assert_eq!(outcome.stats.uses_attributed, 5);
    assert_eq!(module.struct_def(sid).fields, vec![Ty::I64, Ty::I32]);

    // The loop-hot field leads; every leaked address still names the
    // i32 it was built for.
    assert_eq!(field_index_of(&module, fid, p_hot), Some(0));
    assert_eq!(field_index_of(&module, fid, p_call), Some(1));
    assert_eq!(field_index_of(&module, fid, p_fill), Some(1));
    assert_eq!(field_index_of(&module, fid, p_held), Some(1));

    // {i64, i32} pads back out to 16 bytes, so the fill keeps its length.
    match &module.func(fid).instr(fill).kind {
        InstrKind::MemFill { len, .. } => assert_eq!(len.const_int(), Some(16)),
        other => panic!("fill vanished: {other:?}"),
    }

    // Rewritten escapes re-scan to the same slots: still a fixed point.
    let second = optimize_module(&mut module, &Options::default());
    assert!(!second.modified);
}

#[test]
fn test_used_fields_rank_above_every_unused_field() {
    init_test_logging();
    let mut module = Module::new("unused");
    // The unused i64 out-sizes the used i32; it still sinks behind it.
    let sid = module.add_struct(StructDef::new(
        Some("mixed".into()),
        vec![Ty::I64, Ty::I32],
    ));

    let mut b = FunctionBuilder::new(&mut module, "peek");
    let slot = b.alloca(Ty::Struct(sid));
    let p = b.field_addr(slot, sid, 1);
    b.load(p, Ty::I32);
    b.ret(None);
    b.finish();

    let outcome = optimize_module(&mut module, &Options::default());
    assert!(outcome.modified);
    assert_eq!(module.struct_def(sid).fields, vec![Ty::I32, Ty::I64]);
}

#[test]
fn test_reads_outrank_writes_at_equal_frequency() {
    init_test_logging();
    let mut module = Module::new("rw");
    let sid = module.add_struct(StructDef::new(
        Some("pair".into()),
        vec![Ty::I32, Ty::I32],
    ));
    let gid = module.add_global(Global {
        name: "g".into(),
        ty: Ty::Struct(sid),
        init: Some(Const::Struct {
            struct_id: sid,
            elems: vec![Const::i32(10), Const::i32(20)],
        }),
        align: None,
    });

    let mut b = FunctionBuilder::new(&mut module, "churn");
    let written = b.field_addr(gid, sid, 0);
    let read = b.field_addr(gid, sid, 1);
    let v = b.load(read, Ty::I32);
    b.load(read, Ty::I32);
    b.store(written, v);
    b.store(written, v);
    b.ret(None);
    let fid = b.finish();

    let outcome = optimize_module(&mut module, &Options::default());
    assert!(outcome.modified);
    assert_eq!(field_index_of(&module, fid, read), Some(0));
    assert_eq!(field_index_of(&module, fid, written), Some(1));
    assert_eq!(init_values(&module, gid), vec![20, 10]);
}

#[test]
fn test_one_deep_loop_access_outranks_flat_repetition() {
    init_test_logging();
    let mut module = Module::new("depth");
    let sid = module.add_struct(StructDef::new(
        Some("sample".into()),
        vec![Ty::I32, Ty::I32],
    ));

    let mut b = FunctionBuilder::new(&mut module, "nest");
    let outer_more = b.param("outer_more", Ty::I8);
    let inner_more = b.param("inner_more", Ty::I8);
    let slot = b.alloca(Ty::Struct(sid));
    // Field 0: read three times, never in a loop.
    let flat = b.field_addr(slot, sid, 0);
    b.load(flat, Ty::I32);
    b.load(flat, Ty::I32);
    b.load(flat, Ty::I32);

    let outer_head = b.block("outer_head");
    let outer_body = b.block("outer_body");
    let inner_head = b.block("inner_head");
    let inner_body = b.block("inner_body");
    let outer_latch = b.block("outer_latch");
    let exit = b.block("exit");
    b.br(outer_head);
    b.switch_to(outer_head);
    b.cond_br(outer_more, outer_body, exit);
    b.switch_to(outer_body);
    b.br(inner_head);
    b.switch_to(inner_head);
    b.cond_br(inner_more, inner_body, outer_latch);
    b.switch_to(inner_body);
    // Field 1: read once, two loops deep.
    let looped = b.field_addr(slot, sid, 1);
    b.load(looped, Ty::I32);
    b.br(inner_head);
    b.switch_to(outer_latch);
    b.br(outer_head);
    b.switch_to(exit);
    b.ret(None);
    let fid = b.finish();

    let outcome = optimize_module(&mut module, &Options::default());
    assert!(outcome.modified);
    assert_eq!(field_index_of(&module, fid, looped), Some(0));
    assert_eq!(field_index_of(&module, fid, flat), Some(1));
}

#[test]
fn test_alignment_hints_written_after_the_move() {
    init_test_logging();
    let mut module = Module::new("align");
    // {i32, i32, i64}: the middle field moves from offset 4 to offset 8
    // once the i64 leads, so its provable alignment widens to 8.
    let sid = module.add_struct(StructDef::new(
        Some("shifted".into()),
        vec![Ty::I32, Ty::I32, Ty::I64],
    ));

    let mut b = FunctionBuilder::new(&mut module, "walk");
    let cond = b.param("more", Ty::I8);
    let slot = b.alloca(Ty::Struct(sid));
    let pm = b.field_addr(slot, sid, 1);
    b.load(pm, Ty::I32);
    let head = b.block("head");
    let body = b.block("body");
    let exit = b.block("exit");
    b.br(head);
    b.switch_to(head);
    b.cond_br(cond, body, exit);
    b.switch_to(body);
    let ph = b.field_addr(slot, sid, 2);
    let vh = b.load(ph, Ty::I64);
    b.store(ph, vh);
    b.br(head);
    b.switch_to(exit);
    b.ret(None);
    let fid = b.finish();

    let outcome = optimize_module(&mut module, &Options::default());
    assert!(outcome.modified);
    assert_eq!(
        module.struct_def(sid).fields,
        vec![Ty::I64, Ty::I32, Ty::I32]
    );

    let func = module.func(fid);
    let mid_load = func
        .each_instr()
        .find(|(_, i)| matches!(&i.kind, InstrKind::Load { ty, .. } if *ty == Ty::I32))
        .map(|(id, _)| id)
        .unwrap();
    match &func.instr(mid_load).kind {
        InstrKind::Load { align, .. } => assert_eq!(*align, Some(Align::new(8))),
        other => panic!("unexpected kind {other:?}"),
    }
}

#[test]
fn test_bad_initializer_aborts_that_aggregate_only() {
    init_test_logging();
    let mut module = Module::new("abort");
    let broken = module.add_struct(StructDef::new(
        Some("broken".into()),
        vec![Ty::I32, Ty::I64],
    ));
    let fine = module.add_struct(StructDef::new(
        Some("fine".into()),
        vec![Ty::I32, Ty::I64],
    ));
    // One element short of the field count.
    let bad_gid = module.add_global(Global {
        name: "bad".into(),
        ty: Ty::Struct(broken),
        init: Some(Const::Struct {
            struct_id: broken,
            elems: vec![Const::i32(1)],
        }),
        align: None,
    });

    let mut b = FunctionBuilder::new(&mut module, "touch");
    let cond = b.param("more", Ty::I8);
    let slot_broken = b.alloca(Ty::Struct(broken));
    let slot_fine = b.alloca(Ty::Struct(fine));
    let p_broken = b.field_addr(slot_broken, broken, 1);
    let p_fine = b.field_addr(slot_fine, fine, 1);
    let head = b.block("head");
    let body = b.block("body");
    let exit = b.block("exit");
    b.br(head);
    b.switch_to(head);
    b.cond_br(cond, body, exit);
    b.switch_to(body);
    let vb = b.load(p_broken, Ty::I64);
    b.store(p_broken, vb);
    let vf = b.load(p_fine, Ty::I64);
    b.store(p_fine, vf);
    b.br(head);
    b.switch_to(exit);
    b.ret(None);
    let fid = b.finish();

    let outcome = optimize_module(&mut module, &Options::default());

    // The broken aggregate is reported and left exactly as it was.
    assert_eq!(outcome.stats.structs_failed, 1);
    assert_eq!(module.struct_def(broken).fields, vec![Ty::I32, Ty::I64]);
    assert_eq!(field_index_of(&module, fid, p_broken), Some(1));
    assert_eq!(init_values(&module, bad_gid), vec![1]);

    // Its sibling still transforms.
    assert!(outcome.modified);
    assert_eq!(outcome.stats.structs_reordered, 1);
    assert_eq!(module.struct_def(fine).fields, vec![Ty::I64, Ty::I32]);
    assert_eq!(field_index_of(&module, fid, p_fine), Some(0));
}

#[test]
fn test_untouched_and_filtered_modules_report_no_work() {
    init_test_logging();
    let mut module = Module::new("quiet");
    // Declared but never accessed.
    module.add_struct(StructDef::new(
        Some("dormant".into()),
        vec![Ty::I32, Ty::I64],
    ));
    // Deny-listed platform shape.
    module.add_struct(StructDef::new(
        Some("stat".into()),
        vec![Ty::I64, Ty::I64],
    ));
    // Too small to benefit.
    module.add_struct(StructDef::new(Some("single".into()), vec![Ty::I64]));

    let outcome = optimize_module(&mut module, &Options::default());
    assert!(!outcome.modified);
    assert_eq!(outcome.stats.structs_considered, 1);
    assert_eq!(outcome.stats.structs_with_usage, 0);
    assert_eq!(outcome.stats.structs_reordered, 0);
}

#[test]
fn test_custom_deny_list_is_honored() {
    init_test_logging();
    let (mut module, sid, ..) = hot_cold_module();

    let opts = Options {
        deny: vec!["packet".into()],
        ..Options::default()
    };
    let outcome = optimize_module(&mut module, &opts);
    assert!(!outcome.modified);
    assert_eq!(outcome.stats.structs_considered, 0);
    assert_eq!(
        module.struct_def(sid).fields,
        vec![Ty::I32, Ty::I64, Ty::I32]
    );
}
