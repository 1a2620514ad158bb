//! Decompiler integration tests.
//!
//! These tests verify the bytecode pipeline using the public API:
//! 1. Encode an operation list into OSI bytecode
//! 2. Decode it and split it into basic blocks
//! 3. Check the shape of the block graph
//! 4. Reconstruct and fold the blocks into LSS statements

use std::collections::BTreeSet;

use sagekit::{
    lss::{render, BinaryOp, Variable},
    osi::{encode_stream, Decompiler, Module, Operation, Subroutine, OSI_MAGIC},
    utils::graph::{FlowGraph, JumpType},
    DecompilerConfig, Error, Result,
};

fn local(slot: u16) -> Variable {
    Variable::Local(slot)
}

fn global(slot: u16) -> Variable {
    Variable::Global(slot)
}

fn subroutine(name: &str, operations: &[Operation]) -> Result<Subroutine> {
    let code = encode_stream(operations)?;
    Subroutine::decode(name, &code, 0)
}

/// Decompiles `operations` and renders the folded body.
fn decompile(operations: &[Operation]) -> Result<String> {
    let reduced = Decompiler::default().decompile(&subroutine("test", operations)?)?;
    let body = reduced.body().expect("graph was not fully reduced");
    Ok(render(body))
}

/// Assembles an OSI module from named code blobs.
fn module_bytes(subroutines: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let table_end = 8 + 12 * subroutines.len();
    let mut names = Vec::new();
    let mut name_offsets = Vec::new();
    for (name, _) in subroutines {
        name_offsets.push(table_end + names.len());
        names.extend_from_slice(name.as_bytes());
        names.push(0);
    }

    let mut data = Vec::new();
    data.extend_from_slice(&OSI_MAGIC);
    data.extend_from_slice(&(subroutines.len() as u32).to_le_bytes());

    let mut code_offset = table_end + names.len();
    for ((_, code), name_offset) in subroutines.iter().zip(&name_offsets) {
        data.extend_from_slice(&(*name_offset as u32).to_le_bytes());
        data.extend_from_slice(&(code_offset as u32).to_le_bytes());
        data.extend_from_slice(&(code.len() as u32).to_le_bytes());
        code_offset += code.len();
    }
    data.extend_from_slice(&names);
    for (_, code) in subroutines {
        data.extend_from_slice(code);
    }
    data
}

/// Start is the only root, End has no exits, every exit set is {}, {Always} or a full
/// conditional pair.
fn assert_well_formed<T>(graph: &FlowGraph<T>) {
    let roots: Vec<_> = graph
        .node_ids()
        .filter(|id| graph.in_degree(*id) == 0)
        .collect();
    assert_eq!(roots, vec![graph.start()]);
    assert_eq!(graph.out_degree(graph.end()), 0);

    for id in graph.node_ids() {
        let kinds: BTreeSet<JumpType> = graph.out_jumps(id).map(|(_, kind)| kind).collect();
        assert_eq!(kinds.len(), graph.out_degree(id), "duplicate jump kind on {id}");
        assert!(
            kinds.is_empty()
                || kinds == BTreeSet::from([JumpType::Always])
                || kinds == BTreeSet::from([JumpType::ConditionalTrue, JumpType::ConditionalFalse]),
            "{id} exits with {kinds:?}"
        );
    }
}

fn counter_if() -> Vec<Operation> {
    vec![
        Operation::PushInt(5),                 // 0x00
        Operation::Store(local(0)),            // 0x05
        Operation::Load(local(0)),             // 0x08
        Operation::PushInt(3),                 // 0x0B
        Operation::Binary(BinaryOp::Gt),       // 0x10
        Operation::JumpIfFalse(12),            // 0x11 -> 0x20
        Operation::Load(global(0)),            // 0x14
        Operation::PushInt(1),                 // 0x17
        Operation::Binary(BinaryOp::Add),      // 0x1C
        Operation::Store(global(0)),           // 0x1D
        Operation::Return,                     // 0x20
    ]
}

fn counting_loop() -> Vec<Operation> {
    vec![
        Operation::PushInt(0),                 // 0x00
        Operation::Store(local(0)),            // 0x05
        Operation::Load(local(0)),             // 0x08 loop header
        Operation::PushInt(3),                 // 0x0B
        Operation::Binary(BinaryOp::Lt),       // 0x10
        Operation::JumpIfFalse(15),            // 0x11 -> 0x23
        Operation::Load(local(0)),             // 0x14
        Operation::PushInt(1),                 // 0x17
        Operation::Binary(BinaryOp::Add),      // 0x1C
        Operation::Store(local(0)),            // 0x1D
        Operation::Jump(-27),                  // 0x20 -> 0x08
        Operation::PushInt(7),                 // 0x23 loop exit
        Operation::Store(global(0)),           // 0x28
        Operation::Return,                     // 0x2B
    ]
}

fn else_if_chain() -> Vec<Operation> {
    vec![
        Operation::Load(local(0)),             // 0x00
        Operation::PushInt(1),                 // 0x03
        Operation::Binary(BinaryOp::Eq),       // 0x08
        Operation::JumpIfFalse(11),            // 0x09 -> 0x17
        Operation::PushInt(10),                // 0x0C
        Operation::Store(local(1)),            // 0x11
        Operation::Jump(20),                   // 0x14 -> 0x2B
        Operation::Load(local(0)),             // 0x17
        Operation::PushInt(2),                 // 0x1A
        Operation::Binary(BinaryOp::Eq),       // 0x1F
        Operation::JumpIfFalse(8),             // 0x20 -> 0x2B
        Operation::PushInt(20),                // 0x23
        Operation::Store(local(1)),            // 0x28
        Operation::Load(local(1)),             // 0x2B join
        Operation::ReturnValue,                // 0x2E
    ]
}

#[test]
fn test_branches_converging_fold_to_if() -> Result<()> {
    assert_eq!(
        decompile(&counter_if())?,
        "local_0 = 5;\n\
         if (local_0 > 3) {\n    global_0 = (global_0 + 1);\n}\n"
    );
    Ok(())
}

#[test]
fn test_self_loop_folds_to_while() -> Result<()> {
    assert_eq!(
        decompile(&counting_loop())?,
        "local_0 = 0;\n\
         while (local_0 < 3) {\n    local_0 = (local_0 + 1);\n}\n\
         global_0 = 7;\n"
    );
    Ok(())
}

#[test]
fn test_else_if_chain() -> Result<()> {
    assert_eq!(
        decompile(&else_if_chain())?,
        "if (local_0 == 1) {\n    local_1 = 10;\n} else if (local_0 == 2) {\n    local_1 = 20;\n}\n\
         return local_1;\n"
    );
    Ok(())
}

#[test]
fn test_block_graphs_are_well_formed() -> Result<()> {
    let programs = [
        counter_if(),
        counting_loop(),
        else_if_chain(),
        vec![Operation::Return],
        vec![Operation::JumpIfFalse(0), Operation::Return],
    ];

    let decompiler = Decompiler::default();
    for operations in &programs {
        let raw = decompiler.build_graph(&subroutine("shape", operations)?)?;
        assert_well_formed(&raw.graph);
        raw.graph.validate()?;
    }
    Ok(())
}

#[test]
fn test_loop_graph_shape() -> Result<()> {
    let raw = Decompiler::default().build_graph(&subroutine("loop", &counting_loop())?)?;

    // entry, header, body, exit
    assert_eq!(raw.graph.node_count(), 6);
    let entry = raw.entry().expect("entry block");
    let header = raw
        .graph
        .successor(entry, JumpType::Always)
        .expect("fall-through into the loop header");
    let body = raw
        .graph
        .successor(header, JumpType::ConditionalTrue)
        .expect("loop body");
    assert_eq!(raw.graph.successor(body, JumpType::Always), Some(header));
    Ok(())
}

#[test]
fn test_folding_reaches_a_fixed_point() -> Result<()> {
    let decompiler = Decompiler::default();
    for operations in [counter_if(), counting_loop(), else_if_chain()] {
        let reduced = decompiler.decompile(&subroutine("fixed", &operations)?)?;
        assert!(reduced.is_fully_reduced());

        let raw = Decompiler::new(DecompilerConfig::raw()).decompile(&subroutine("fixed", &operations)?)?;
        assert_eq!(raw.folds, 0);
        assert!(reduced.graph.node_count() < raw.graph.node_count());
        assert!(reduced.folds <= raw.graph.node_count() - 3);
    }
    Ok(())
}

#[test]
fn test_module_decompiles_each_subroutine() -> Result<()> {
    let data = module_bytes(&[
        ("main", encode_stream(&counting_loop())?),
        ("broken", encode_stream(&[Operation::Binary(BinaryOp::Add), Operation::Return])?),
        ("pick", encode_stream(&else_if_chain())?),
    ]);

    let module = Module::parse(&data)?;
    assert_eq!(module.subroutines.len(), 3);
    assert_eq!(module.subroutines[1].name, "broken");

    let results = Decompiler::default().decompile_all(&module);
    let names: Vec<&str> = results.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["main", "broken", "pick"]);

    assert!(results[0].result.as_ref().is_ok_and(|r| r.is_fully_reduced()));
    let broken_base = module.subroutines[1].base_offset;
    assert!(matches!(
        results[1].result,
        Err(Error::StackUnderflow { offset }) if offset == broken_base
    ));
    assert!(results[2].result.is_ok());
    Ok(())
}

#[test]
fn test_module_rejects_foreign_magic() {
    let mut data = module_bytes(&[]);
    data[..4].copy_from_slice(b"SLB\0");
    assert!(matches!(Module::parse(&data), Err(Error::BadMagic { .. })));
}
