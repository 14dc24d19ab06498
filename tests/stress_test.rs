//! Stress tests for the queue and the reduction engine

use veda_cl::device::{DeviceDescriptor, PlatformDescriptor};
use veda_cl::prelude::*;
use veda_cl::samples;

fn runtime(units: usize) -> Runtime {
    Runtime::with_platforms(vec![PlatformDescriptor::new("stress", "veda")
        .device(DeviceDescriptor::new("stress-cpu", DeviceKind::Cpu, units))])
    .unwrap()
}

#[test]
#[ignore] // Run with --ignored flag
fn stress_test_many_small_kernels() {
    let queue = ComputeQueue::new(&runtime(4), &Config::default()).unwrap();
    let counter = Buffer::<u64>::new(1);

    // each kernel reads and rewrites the same element, so all 1000 serialize
    for _ in 0..1000 {
        queue
            .submit(|h| {
                let c = h.access(&counter, AccessMode::ReadWrite)?;
                h.parallel_for(Range::new(1), move |_| c.write(0, c.read(0) + 1));
                Ok(())
            })
            .unwrap();
    }

    queue.drain().unwrap();
    assert_eq!(counter.to_vec().unwrap(), vec![1000]);
}

#[test]
#[ignore]
fn stress_test_large_reduction() {
    let queue = ComputeQueue::new(&Runtime::discover(), &Config::default()).unwrap();
    let vec = Buffer::<i64>::new(50_000_000);
    samples::init_constant(&queue, &vec, 3).unwrap();

    let r = ReductionEngine::new(&queue).reduce(&vec, 512, 16).unwrap();
    assert_eq!(r.value().unwrap(), 150_000_000);
}

#[test]
#[ignore]
fn stress_test_repeated_reductions() {
    let queue = ComputeQueue::new(&runtime(16), &Config::default()).unwrap();
    let engine = ReductionEngine::new(&queue);
    let vec = Buffer::from_slice(&vec![17i32; 123_457]);

    let reductions: Vec<_> = (0..200)
        .map(|i| engine.reduce(&vec, 1 << (i % 9), 1 + i % 5).unwrap())
        .collect();

    for r in &reductions {
        assert_eq!(r.value().unwrap(), 17 * 123_457);
    }
}

#[test]
#[ignore]
fn stress_test_queue_churn() {
    let rt = runtime(2);
    for _ in 0..100 {
        let queue = ComputeQueue::new(&rt, &Config::default()).unwrap();
        let vec = Buffer::<i32>::new(1000);
        samples::init_descending(&queue, &vec).unwrap();
        samples::verify_descending(&vec).unwrap();
    }
}
