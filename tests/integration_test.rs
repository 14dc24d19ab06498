use veda_cl::device::{DeviceDescriptor, EnvGeneration, PlatformDescriptor};
use veda_cl::prelude::*;
use veda_cl::{profiling, samples};
use std::thread;
use std::time::Duration;

fn eight_cu_runtime() -> Runtime {
    Runtime::with_platforms(vec![PlatformDescriptor::new("Test platform", "veda")
        .device(DeviceDescriptor::new("eight", DeviceKind::Cpu, 8))])
    .unwrap()
}

fn single_cu_runtime() -> Runtime {
    Runtime::with_platforms(vec![PlatformDescriptor::new("Test platform", "veda")
        .device(DeviceDescriptor::new("single", DeviceKind::Cpu, 1))])
    .unwrap()
}

fn mixed_runtime() -> Runtime {
    Runtime::with_platforms(vec![
        PlatformDescriptor::new("P0", "veda").device(DeviceDescriptor::new("p0-cpu", DeviceKind::Cpu, 2)),
        PlatformDescriptor::new("P1", "veda")
            .device(DeviceDescriptor::new("p1-acc", DeviceKind::Accelerator, 2))
            .device(DeviceDescriptor::new("p1-gpu", DeviceKind::Gpu, 4)),
    ])
    .unwrap()
}

#[test]
fn test_reference_reduction() {
    let runtime = eight_cu_runtime();
    let queue = ComputeQueue::new(&runtime, &Config::default()).unwrap();
    assert_eq!(queue.num_compute_units(), 8);

    let vec = Buffer::<i32>::new(1_000_000);
    let init = samples::init_constant(&queue, &vec, 17).unwrap();

    let reduction = ReductionEngine::new(&queue).reduce(&vec, 256, 4).unwrap();
    assert_eq!(reduction.nwg, 32);

    queue.drain().unwrap();
    assert_eq!(reduction.value().unwrap(), 17_000_000);

    for event in [&init, &reduction.pass1, &reduction.pass2] {
        assert_eq!(status_name(event), "complete");
        assert!(profiling::elapsed_millis(event).unwrap() >= 0.0);
    }
}

#[test]
fn test_sum_correctness_over_sizes() {
    let queue = ComputeQueue::new(&eight_cu_runtime(), &Config::default()).unwrap();
    let engine = ReductionEngine::new(&queue);

    for n in [1usize, 3, 255, 256, 257, 8191, 100_003] {
        let vec = Buffer::<i64>::new(n);
        samples::init_constant(&queue, &vec, -4).unwrap();
        let r = engine.reduce(&vec, 64, 2).unwrap();
        assert_eq!(r.value().unwrap(), -4 * n as i64, "n = {}", n);
    }
}

#[test]
fn test_reduction_invariance() {
    let queue = ComputeQueue::new(&eight_cu_runtime(), &Config::default()).unwrap();
    let engine = ReductionEngine::new(&queue);

    let data: Vec<u32> = (0..20_000).map(|i| i % 97).collect();
    let expected: u32 = data.iter().sum();
    let vec = Buffer::from_slice(&data);

    for lws in [1, 2, 16, 128, 1024] {
        for k in [1, 3, 8] {
            let r = engine.reduce(&vec, lws, k).unwrap();
            assert_eq!(r.value().unwrap(), expected, "lws = {}, k = {}", lws, k);
        }
    }
}

#[test]
fn test_selection_is_deterministic() {
    let runtime = mixed_runtime();

    let first = runtime.select_device(&SelectorOverride::none()).unwrap();
    for _ in 0..10 {
        assert_eq!(runtime.select_device(&SelectorOverride::none()).unwrap(), first);
    }
    assert_eq!(first.name(), "p1-gpu");

    let picked = runtime.select_device(&SelectorOverride::explicit(1, 0)).unwrap();
    assert_eq!(picked.name(), "p1-acc");
}

#[test]
fn test_selection_out_of_range() {
    let runtime = mixed_runtime();

    let err = runtime
        .select_device(&SelectorOverride::explicit(2, 0))
        .unwrap_err();
    assert!(matches!(err, Error::Selection(_)));
    assert!(err.to_string().contains("#2"));

    assert!(matches!(
        runtime.select_device(&SelectorOverride::explicit(0, 1)),
        Err(Error::Selection(_))
    ));
}

#[test]
fn test_environment_override() {
    let runtime = mixed_runtime();

    let legacy_host = SelectorOverride::from_lookup(|key| match key {
        "OCL_PLATFORM" => Some("-1".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(legacy_host.generation, EnvGeneration::Legacy);
    assert!(runtime.select_device(&legacy_host).unwrap().is_host());

    let sycl_wins = SelectorOverride::from_lookup(|key| match key {
        "SYCL_PLATFORM" => Some("0".to_string()),
        "OCL_PLATFORM" => Some("1".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(runtime.select_device(&sycl_wins).unwrap().name(), "p0-cpu");

    let garbage = SelectorOverride::from_lookup(|key| match key {
        "SYCL_DEVICE" => Some("gpu".to_string()),
        _ => None,
    });
    assert!(matches!(garbage, Err(Error::Config(_))));
}

#[test]
fn test_event_monotonicity() {
    let queue = ComputeQueue::new(&mixed_runtime(), &Config::default()).unwrap();
    let vec = Buffer::<i32>::new(50_000);

    let event = samples::init_descending(&queue, &vec).unwrap();
    let mut last = event.status();
    while !event.is_complete() {
        let now = event.status();
        assert!(now >= last);
        last = now;
        std::thread::yield_now();
    }
    event.wait().unwrap();

    let ts = event.timestamps().unwrap();
    assert!(ts.submit <= ts.start);
    assert!(ts.start <= ts.end);
    assert_eq!(profiling::elapsed_nanos(&event).unwrap(), ts.end - ts.start);
}

#[test]
fn test_event_passes_through_every_status() {
    let queue = ComputeQueue::new(&single_cu_runtime(), &Config::default()).unwrap();
    let vec = Buffer::<i32>::new(1);

    // the open view keeps the kernel submitted until it is dropped
    let view = vec.host_access(HostAccess::ReadWrite).unwrap();
    let event = queue
        .submit(|h| {
            let out = h.access(&vec, AccessMode::DiscardWrite)?;
            h.set_name("sleepy");
            h.parallel_for(Range::new(1), move |item| {
                thread::sleep(Duration::from_millis(200));
                out.write(item.id(), 1);
            });
            Ok(())
        })
        .unwrap();

    let mut statuses = vec![event.status()];
    assert!(matches!(
        profiling::elapsed_nanos(&event),
        Err(Error::Profiling(_))
    ));
    drop(view);

    while !event.is_complete() {
        let now = event.status();
        if now == EventStatus::Running {
            let elapsed = profiling::elapsed_nanos(&event);
            assert!(elapsed.is_err() || event.is_complete());
        }
        if statuses.last() != Some(&now) {
            statuses.push(now);
        }
        thread::sleep(Duration::from_millis(5));
    }
    if statuses.last() != Some(&EventStatus::Complete) {
        statuses.push(EventStatus::Complete);
    }

    assert_eq!(
        statuses,
        vec![
            EventStatus::Submitted,
            EventStatus::Running,
            EventStatus::Complete
        ]
    );
    assert!(profiling::elapsed_nanos(&event).unwrap() >= 200_000_000);
}

#[test]
fn test_host_view_holds_off_kernels() {
    let queue = ComputeQueue::new(&eight_cu_runtime(), &Config::default()).unwrap();
    let vec = Buffer::from_slice(&[1i32; 4]);

    let view = vec.host_access(HostAccess::ReadWrite).unwrap();
    let init = samples::init_constant(&queue, &vec, 99).unwrap();
    thread::sleep(Duration::from_millis(50));

    assert_eq!(init.status(), EventStatus::Submitted);
    assert_eq!(view.get(0), Some(1));
    view.set(0, 5).unwrap();
    assert_eq!(view.to_vec(), vec![5, 1, 1, 1]);
    drop(view);

    init.wait().unwrap();
    assert_eq!(vec.to_vec().unwrap(), vec![99; 4]);
}

#[test]
fn test_read_only_view_lets_readers_through() {
    let queue = ComputeQueue::new(&eight_cu_runtime(), &Config::default()).unwrap();
    let src = Buffer::from_slice(&[7i64; 64]);
    let copy = Buffer::<i64>::new(64);

    let view = src.host_access(HostAccess::ReadOnly).unwrap();
    let reader = queue
        .submit(|h| {
            let input = h.access(&src, AccessMode::Read)?;
            let out = h.access(&copy, AccessMode::DiscardWrite)?;
            h.parallel_for(Range::new(64), move |item| out.write(item.id(), input.read(item.id())));
            Ok(())
        })
        .unwrap();
    reader.wait().unwrap();

    let writer = samples::init_constant(&queue, &src, 0).unwrap();
    thread::sleep(Duration::from_millis(50));
    assert_eq!(writer.status(), EventStatus::Submitted);
    assert!(view.iter().all(|v| v == 7));
    drop(view);

    queue.drain().unwrap();
    assert_eq!(copy.to_vec().unwrap(), vec![7; 64]);
    assert_eq!(src.to_vec().unwrap(), vec![0; 64]);
}

#[test]
fn test_zero_element_init() {
    let queue = ComputeQueue::new(&mixed_runtime(), &Config::default()).unwrap();
    let vec = Buffer::<i32>::new(0);

    let event = samples::init_descending(&queue, &vec).unwrap();
    queue.drain().unwrap();
    assert_eq!(status_name(&event), "complete");
    samples::verify_descending(&vec).unwrap();
}

#[test]
fn test_profiling_disabled() {
    let config = Config::builder().enable_profiling(false).build().unwrap();
    let queue = ComputeQueue::new(&mixed_runtime(), &config).unwrap();
    let vec = Buffer::<f32>::new(16);

    let event = samples::init_constant(&queue, &vec, 2.0).unwrap();
    event.wait().unwrap();
    assert!(matches!(
        profiling::elapsed_nanos(&event),
        Err(Error::Profiling(_))
    ));
}

#[test]
fn test_write_after_read_ordering() {
    let queue = ComputeQueue::new(&eight_cu_runtime(), &Config::default()).unwrap();
    let src = Buffer::from_slice(&vec![1i32; 4096]);
    let snapshot = Buffer::<i32>::new(4096);

    // a slow reader followed by a writer of the same buffer
    queue
        .submit(|h| {
            let input = h.access(&src, AccessMode::Read)?;
            let out = h.access(&snapshot, AccessMode::DiscardWrite)?;
            h.parallel_for(Range::new(4096), move |item| {
                if item.id() % 1024 == 0 {
                    std::thread::sleep(std::time::Duration::from_millis(5));
                }
                out.write(item.id(), input.read(item.id()));
            });
            Ok(())
        })
        .unwrap();
    samples::init_constant(&queue, &src, 9).unwrap();

    queue.drain().unwrap();
    assert!(snapshot.to_vec().unwrap().iter().all(|&v| v == 1));
    assert!(src.to_vec().unwrap().iter().all(|&v| v == 9));
}

#[test]
fn test_kernel_panic_surfaces_as_execution_error() {
    let queue = ComputeQueue::new(&mixed_runtime(), &Config::default()).unwrap();
    let vec = Buffer::<i32>::new(8);

    let event = queue
        .submit(|h| {
            let input = h.access(&vec, AccessMode::Read)?;
            h.set_name("bad_write");
            h.parallel_for(Range::new(8), move |item| input.write(item.id(), 0));
            Ok(())
        })
        .unwrap();

    let err = event.wait().unwrap_err();
    assert!(matches!(err, Error::Execution(_)));
    assert!(err.to_string().contains("bad_write"));
    assert!(queue.drain().is_err());
    assert!(queue.metrics().kernel_panics >= 1);
}

#[cfg(feature = "telemetry")]
#[test]
fn test_metrics_after_reduction() {
    let queue = ComputeQueue::new(&eight_cu_runtime(), &Config::default()).unwrap();
    let vec = Buffer::<i32>::new(10_000);
    samples::init_constant(&queue, &vec, 1).unwrap();
    let r = ReductionEngine::new(&queue).reduce(&vec, 32, 1).unwrap();
    assert_eq!(r.value().unwrap(), 10_000);
    queue.drain().unwrap();

    let snapshot = queue.metrics();
    assert_eq!(snapshot.kernels_submitted, 3);
    assert_eq!(snapshot.kernels_completed, 3);
    // pass 1 runs 8 groups, pass 2 one
    assert_eq!(snapshot.work_groups_executed, 9);

    let json = veda_cl::telemetry::JsonExporter::render(&snapshot).unwrap();
    assert!(json.contains("\"kernels_completed\": 3"));
}
