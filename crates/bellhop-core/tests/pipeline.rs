//! Packets crossing a bounded interface between concurrently running nodes

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bellhop_core::{
    Direction, Interface, NetworkPacket, Node, NodeId, PacketKind, PutMode, QueueCapacity, spawn,
};

/// Drains the inbound side of an interface and decodes what it finds
struct Sink {
    interface: Arc<Interface>,
    received: Vec<NetworkPacket>,
}

#[async_trait]
impl Node for Sink {
    fn name(&self) -> String {
        "sink".to_string()
    }

    async fn step(&mut self) -> usize {
        match self.interface.get(Direction::In) {
            Some(bytes) => {
                self.received.push(NetworkPacket::from_bytes(&bytes).unwrap());
                1
            }
            None => 0,
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_blocking_puts_wait_for_a_running_consumer() {
    let interface = Arc::new(Interface::new(QueueCapacity::bounded(2).unwrap()));
    let sink = spawn(Sink {
        interface: Arc::clone(&interface),
        received: Vec::new(),
    });

    let dest = NodeId::new("H2").unwrap();
    let mode = PutMode::Blocking {
        timeout: Some(Duration::from_secs(5)),
    };
    for i in 0..50u32 {
        let packet = NetworkPacket::data(dest.clone(), i.to_string());
        interface.put(packet.to_bytes(), Direction::In, mode).await.unwrap();
    }

    while !interface.is_empty(Direction::In) {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    let sink = sink.stop().await.unwrap();

    assert_eq!(sink.received.len(), 50);
    for (i, packet) in sink.received.iter().enumerate() {
        assert_eq!(packet.kind, PacketKind::Data);
        assert_eq!(packet.payload, i.to_string().into_bytes());
    }
}

#[tokio::test]
async fn test_non_blocking_put_fails_without_a_consumer() {
    let interface = Interface::new(QueueCapacity::bounded(1).unwrap());
    interface
        .put(b"1".to_vec(), Direction::Out, PutMode::NonBlocking)
        .await
        .unwrap();
    let err = interface
        .put(b"2".to_vec(), Direction::Out, PutMode::NonBlocking)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("full"), "{}", err);
    assert_eq!(interface.len(Direction::Out), 1);
}
