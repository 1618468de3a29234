//! End-to-end write-path tests: RPC-style producers submitting records to
//! several nodes, one pump thread draining them round-robin through the
//! WAL and the handlers.

use fairq_write::{
    MemWal, MsgKind, NodeStatus, StorageNode, WriteAck, WriteError, WriteHandlers, WritePump,
    WriteRecord,
};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

#[derive(Default)]
struct Recording {
    submits: AtomicU32,
    creates: AtomicU32,
    drops: AtomicU32,
    alters: AtomicU32,
}

impl WriteHandlers for Recording {
    fn on_submit(&self, _: &StorageNode, body: &[u8]) -> Result<WriteAck, WriteError> {
        self.submits.fetch_add(1, Ordering::Relaxed);
        Ok(WriteAck {
            affected_rows: body.len() as u32,
        })
    }
    fn on_create_table(&self, _: &StorageNode, _: &[u8]) -> Result<WriteAck, WriteError> {
        self.creates.fetch_add(1, Ordering::Relaxed);
        Ok(WriteAck::default())
    }
    fn on_drop_table(&self, _: &StorageNode, _: &[u8]) -> Result<WriteAck, WriteError> {
        self.drops.fetch_add(1, Ordering::Relaxed);
        Ok(WriteAck::default())
    }
    fn on_alter_table(&self, _: &StorageNode, _: &[u8]) -> Result<WriteAck, WriteError> {
        self.alters.fetch_add(1, Ordering::Relaxed);
        Ok(WriteAck::default())
    }
}

fn ready_node(id: u32) -> Arc<StorageNode> {
    let node = StorageNode::new(id);
    node.set_status(NodeStatus::Ready);
    node
}

#[test]
fn test_submit_pump_applies_in_order() {
    let wal = Arc::new(MemWal::new());
    let handlers = Arc::new(Recording::default());
    let pump = WritePump::new(Arc::clone(&handlers), Arc::clone(&wal));
    let node = ready_node(1);
    pump.register(&node).unwrap();

    for i in 0..10u8 {
        pump.submit(&node, &WriteRecord::client(MsgKind::Submit, vec![i]))
            .unwrap();
    }
    assert_eq!(pump.depth(), 10);

    while pump.pump_one().unwrap() {}
    assert_eq!(pump.depth(), 0);
    assert_eq!(handlers.submits.load(Ordering::Relaxed), 10);
    assert_eq!(node.version(), 10);

    // WAL order matches submit order, with versions assigned 1..=10.
    let logged = wal.entries_for(1);
    assert_eq!(logged.len(), 10);
    for (i, record) in logged.iter().enumerate() {
        assert_eq!(record.version, i as u64 + 1);
        assert_eq!(record.body, vec![i as u8]);
    }
}

#[test]
fn test_mixed_kinds_reach_their_handlers() {
    let handlers = Arc::new(Recording::default());
    let pump = WritePump::new(Arc::clone(&handlers), MemWal::new());
    let node = ready_node(1);
    pump.register(&node).unwrap();

    let kinds = [
        MsgKind::CreateTable,
        MsgKind::Submit,
        MsgKind::AlterTable,
        MsgKind::Submit,
        MsgKind::DropTable,
        MsgKind::DropStable,
    ];
    for kind in kinds {
        pump.submit(&node, &WriteRecord::client(kind, vec![])).unwrap();
    }

    let mut batch = fairq::Batch::new();
    assert_eq!(pump.pump_batch(&mut batch).unwrap(), kinds.len());

    assert_eq!(handlers.submits.load(Ordering::Relaxed), 2);
    assert_eq!(handlers.creates.load(Ordering::Relaxed), 1);
    assert_eq!(handlers.drops.load(Ordering::Relaxed), 1);
    assert_eq!(handlers.alters.load(Ordering::Relaxed), 1);
}

#[test]
fn test_replay_is_deduplicated() {
    let wal = Arc::new(MemWal::new());
    let handlers = Arc::new(Recording::default());
    let pump = WritePump::new(Arc::clone(&handlers), Arc::clone(&wal));
    let node = ready_node(2);
    pump.register(&node).unwrap();

    // Three client writes bring the node to version 3.
    for _ in 0..3 {
        pump.submit(&node, &WriteRecord::client(MsgKind::Submit, vec![0]))
            .unwrap();
    }
    while pump.pump_one().unwrap() {}
    assert_eq!(node.version(), 3);

    // Replay versions 2..=4: only version 4 survives the gate.
    for version in 2..=4 {
        pump.submit(&node, &WriteRecord::replayed(version, MsgKind::Submit, vec![1]))
            .unwrap();
    }
    while pump.pump_one().unwrap() {}

    assert_eq!(node.version(), 4);
    assert_eq!(handlers.submits.load(Ordering::Relaxed), 4);
    assert_eq!(wal.entries_for(2).len(), 4);
}

#[test]
fn test_two_nodes_one_pump_thread() {
    const PER_NODE: u32 = 500;

    let wal = Arc::new(MemWal::new());
    let pump = Arc::new(WritePump::new(
        Arc::new(Recording::default()),
        Arc::clone(&wal),
    ));
    let nodes = [ready_node(1), ready_node(2)];
    for node in &nodes {
        pump.register(node).unwrap();
    }
    assert_eq!(pump.node_count(), 2);

    let stop = Arc::new(AtomicBool::new(false));
    let consumer = {
        let pump = Arc::clone(&pump);
        let stop = Arc::clone(&stop);
        thread::spawn(move || pump.run(&stop).unwrap())
    };

    let mut producers = Vec::new();
    for node in &nodes {
        let pump = Arc::clone(&pump);
        let node = Arc::clone(node);
        producers.push(thread::spawn(move || {
            for seq in 0..PER_NODE {
                let body = seq.to_le_bytes().to_vec();
                pump.submit(&node, &WriteRecord::client(MsgKind::Submit, body))
                    .unwrap();
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    // Wait for the pump to drain everything, then stop it.
    while pump.depth() > 0 {
        thread::yield_now();
    }
    stop.store(true, Ordering::Release);
    let pumped = consumer.join().unwrap();
    assert_eq!(pumped, u64::from(PER_NODE) * 2);

    // Per-node WAL order matches per-node submit order and carries the
    // node's own version sequence.
    for node in &nodes {
        assert_eq!(node.version(), u64::from(PER_NODE));
        let logged = wal.entries_for(node.id());
        assert_eq!(logged.len(), PER_NODE as usize);
        for (i, record) in logged.iter().enumerate() {
            assert_eq!(record.version, i as u64 + 1);
            assert_eq!(record.body, (i as u32).to_le_bytes().to_vec());
        }
    }
}

#[test]
fn test_deregister_keeps_items_on_queue() {
    let pump = WritePump::new(Arc::new(Recording::default()), MemWal::new());
    let node = ready_node(5);
    pump.register(&node).unwrap();

    pump.submit(&node, &WriteRecord::client(MsgKind::Submit, vec![]))
        .unwrap();
    assert_eq!(pump.depth(), 1);

    pump.deregister(&node);
    assert_eq!(pump.depth(), 0);
    assert_eq!(pump.node_count(), 0);
    assert_eq!(node.write_queue().depth(), 1);
    assert!(!pump.pump_one().unwrap());
}

#[test]
fn test_closed_node_rejects_submit() {
    let pump = WritePump::new(Arc::new(Recording::default()), MemWal::new());
    let node = ready_node(6);
    pump.register(&node).unwrap();

    node.close();
    assert_eq!(pump.node_count(), 0);
    assert!(matches!(
        pump.submit(&node, &WriteRecord::client(MsgKind::Submit, vec![])),
        Err(WriteError::Queue(fairq::QueueError::Closed))
    ));
}
