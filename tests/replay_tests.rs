use stall_watch::{Ingress, SensorStream, ShutdownHandle, StreamQueues, decode, replay_csv};
use std::io::Cursor;
use std::time::{Duration, Instant};

const SAMPLE: &str = "\
Time (mm/dd/yy hh:mm:ss),Channel1 (Smoker),Channel2 (Food A),Channel3 (Food B)
03/07/24 14:30:00,212.5,150.1,149.8
03/07/24 14:30:30,211,,
03/07/24 14:31:00,,150.3,abc
";

fn drain(queues: &StreamQueues, stream: SensorStream) -> Vec<(String, f64)> {
    let consumer = queues.consumer(stream).unwrap();
    let mut out = Vec::new();
    while let Some(d) = consumer.next_delivery() {
        match decode(d.payload()) {
            Ingress::Accepted(r) => out.push((r.timestamp.as_str().to_string(), r.temperature)),
            Ingress::Rejected(reason) => panic!("producer wrote an invalid message: {}", reason),
        }
        consumer.ack(&d);
    }
    out
}

#[test]
fn test_replay_publishes_each_cell_to_its_queue() {
    let mut queues = StreamQueues::in_memory(64).unwrap();
    let stats = replay_csv(Cursor::new(SAMPLE), &mut queues, Duration::ZERO, &ShutdownHandle::new()).unwrap();

    assert_eq!(stats.rows, 3);
    assert_eq!(stats.published, 5);
    assert_eq!(stats.skipped, 1);

    assert_eq!(
        drain(&queues, SensorStream::Smoker),
        vec![
            ("03/07/24 14:30:00".to_string(), 212.5),
            ("03/07/24 14:30:30".to_string(), 211.0)
        ]
    );
    assert_eq!(
        drain(&queues, SensorStream::FoodA),
        vec![
            ("03/07/24 14:30:00".to_string(), 150.1),
            ("03/07/24 14:31:00".to_string(), 150.3)
        ]
    );
    assert_eq!(drain(&queues, SensorStream::FoodB), vec![("03/07/24 14:30:00".to_string(), 149.8)]);
}

#[test]
fn test_header_only_input_publishes_nothing() {
    let mut queues = StreamQueues::in_memory(8).unwrap();
    let input = "Time,Smoker,Food A,Food B\n";
    let stats = replay_csv(Cursor::new(input), &mut queues, Duration::ZERO, &ShutdownHandle::new()).unwrap();
    assert_eq!(stats.rows, 0);
    assert_eq!(stats.published, 0);

    let stats = replay_csv(Cursor::new(""), &mut queues, Duration::ZERO, &ShutdownHandle::new()).unwrap();
    assert_eq!(stats.rows, 0);
}

#[test]
fn test_replay_stops_when_shutdown_requested() {
    let mut queues = StreamQueues::in_memory(64).unwrap();
    let shutdown = ShutdownHandle::new();
    let trigger = shutdown.clone();
    std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        trigger.request();
    });

    let started = Instant::now();
    let stats = replay_csv(Cursor::new(SAMPLE), &mut queues, Duration::from_secs(30), &shutdown).unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(stats.rows, 1);
    assert_eq!(queues.get(SensorStream::Smoker).published(), 1);
}

#[test]
fn test_replay_surfaces_full_queue() {
    let mut queues = StreamQueues::in_memory(1).unwrap();
    let err = replay_csv(Cursor::new(SAMPLE), &mut queues, Duration::ZERO, &ShutdownHandle::new()).unwrap_err();
    assert!(err.to_string().contains("is full"), "{}", err);
}

#[test]
fn test_row_is_not_split_when_one_queue_is_full() {
    let mut queues = StreamQueues::in_memory(1).unwrap();
    queues.publish(SensorStream::FoodA, b"earlier").unwrap();

    let err = replay_csv(Cursor::new(SAMPLE), &mut queues, Duration::ZERO, &ShutdownHandle::new()).unwrap_err();
    assert!(err.to_string().contains("02-food-A"), "{}", err);
    assert_eq!(queues.get(SensorStream::Smoker).published(), 0);
    assert_eq!(queues.get(SensorStream::FoodB).published(), 0);
}

#[test]
fn test_rows_before_failure_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let mut queues = StreamQueues::open(dir.path(), 1).unwrap();
        assert!(replay_csv(Cursor::new(SAMPLE), &mut queues, Duration::ZERO, &ShutdownHandle::new()).is_err());
    }

    let queues = StreamQueues::open(dir.path(), 1).unwrap();
    for stream in SensorStream::ALL {
        assert_eq!(queues.get(stream).published(), 1, "{}", stream);
    }
    assert_eq!(drain(&queues, SensorStream::Smoker), vec![("03/07/24 14:30:00".to_string(), 212.5)]);
}
