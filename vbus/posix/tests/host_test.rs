//! Full firmware core on host threads: one thread plays the bus interrupt,
//! another the producer interrupt, the test thread runs the foreground loop.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::thread;
use std::time::Duration;

use vbus_bus::sim::Master;
use vbus_bus::{Bus, BusHardware, Completion, Device, DeviceEntry, PayloadSource, Registry, Scheduler};
use vbus_core::{Clock, CommandByte, DeviceId, Status};
use vbus_posix::{HostClock, HostLock, Ticker};
use vbus_ring::{LinearBuffer, RingBuffer, RingConfig};
use vbus_sync::TickCounter;

#[derive(Default)]
struct Pins {
    rearms: AtomicU32,
}

impl BusHardware for Pins {
    fn rearm(&self) {
        self.rearms.fetch_add(1, Ordering::Relaxed);
    }
}

struct Echo<'a> {
    out: &'a LinearBuffer<32>,
}

impl Device for Echo<'_> {
    fn on_command(&mut self, _command: CommandByte, payload: &[u8], done: &dyn Completion) {
        match self.out.store(payload) {
            Ok(()) => done.complete(0),
            Err(_) => done.complete(Status::FAIL.bits()),
        }
    }
}

struct Stream;

impl Device for Stream {
    fn on_command(&mut self, _command: CommandByte, _payload: &[u8], done: &dyn Completion) {
        done.complete(0);
    }
}

fn wait_idle<const RX: usize>(master: &Master<'_, '_, &Pins, HostLock, RX>) {
    while master.status().flags().contains(Status::BUSY) {
        thread::yield_now();
    }
}

#[test]
fn test_echo_across_threads() {
    let pins = Pins::default();
    let out = LinearBuffer::<32>::new();
    let mut echo = Echo { out: &out };
    let done = AtomicBool::new(false);

    let bus: Bus<&Pins, HostLock, 32> = Bus::new(&pins, HostLock);
    let mut registry = Registry::<16>::new();
    let id = DeviceId::new(1).unwrap();
    registry
        .register(&bus, DeviceEntry::new(id, PayloadSource::Linear(&out), &mut echo))
        .unwrap();
    let mut sched = Scheduler::new(&bus, registry, HostClock::millis());

    thread::scope(|s| {
        let bus = &bus;
        let done = &done;
        let master = s.spawn(move || {
            let master = Master::new(bus);
            for round in 0..50u8 {
                let payload = [round, round.wrapping_mul(3), 0xA5];
                wait_idle(&master);
                master.command(CommandByte(0x01), &payload);
                wait_idle(&master);
                let response = master.fetch::<36>();
                assert!(response.header.flags().is_empty());
                assert_eq!(&response.payload[..], &payload[..]);
            }
            wait_idle(&master);
            done.store(true, Ordering::Release);
        });

        while !done.load(Ordering::Acquire) {
            sched.step();
        }
        master.join().unwrap();
    });

    let stats = bus.stats();
    assert_eq!(stats.commands, 50);
    assert_eq!(stats.reads, 50);
    assert_eq!(stats.crc_errors, 0);
}

#[test]
fn test_stream_from_producer_thread() {
    const TOTAL: usize = 600;

    static SAMPLES: RingBuffer<64, 0, HostLock> =
        RingBuffer::new(HostLock, RingConfig::interrupt_backed());

    let pins = Pins::default();
    let mut stream = Stream;
    let done = AtomicBool::new(false);

    let bus: Bus<&Pins, HostLock, 32> = Bus::new(&pins, HostLock);
    let mut registry = Registry::<16>::new();
    let id = DeviceId::new(2).unwrap();
    registry
        .register(&bus, DeviceEntry::new(id, PayloadSource::Ring(&SAMPLES), &mut stream))
        .unwrap();
    let mut sched = Scheduler::new(&bus, registry, HostClock::millis());

    thread::scope(|s| {
        s.spawn(|| {
            for i in 0..TOTAL {
                while SAMPLES.put_byte(i as u8).is_err() {
                    thread::yield_now();
                }
            }
        });

        let bus = &bus;
        let done = &done;
        let reader = s.spawn(move || {
            let master = Master::new(bus);
            master.select(CommandByte(0x02));
            let mut received = Vec::with_capacity(TOTAL);
            while received.len() < TOTAL {
                wait_idle(&master);
                let response = master.fetch::<68>();
                received.extend_from_slice(&response.payload);
            }
            wait_idle(&master);
            done.store(true, Ordering::Release);
            received
        });

        while !done.load(Ordering::Acquire) {
            sched.step();
        }

        let received = reader.join().unwrap();
        assert_eq!(received.len(), TOTAL);
        for (i, byte) in received.iter().enumerate() {
            assert_eq!(*byte, i as u8, "byte {} out of order", i);
        }
    });

    assert!(SAMPLES.is_empty());
}

#[test]
fn test_ticker_drives_polling() {
    static TICKS: TickCounter<HostLock> = TickCounter::new(HostLock);

    struct Beat<'a> {
        polls: &'a AtomicU32,
    }

    impl Device for Beat<'_> {
        fn on_command(&mut self, _command: CommandByte, _payload: &[u8], done: &dyn Completion) {
            done.complete(0);
        }

        fn on_polling(&mut self, _device: DeviceId, _done: &dyn Completion) {
            self.polls.fetch_add(1, Ordering::Relaxed);
        }
    }

    let pins = Pins::default();
    let out = LinearBuffer::<32>::new();
    let polls = AtomicU32::new(0);
    let mut beat = Beat { polls: &polls };

    let bus: Bus<&Pins, HostLock, 32> = Bus::new(&pins, HostLock);
    let mut registry = Registry::<16>::new();
    let id = DeviceId::new(3).unwrap();
    registry
        .register(
            &bus,
            DeviceEntry::new(id, PayloadSource::Linear(&out), &mut beat).with_polling(5),
        )
        .unwrap();
    let mut sched = Scheduler::new(&bus, registry, &TICKS);

    // 1 tick per millisecond, poll every 5
    let ticker = Ticker::start(Duration::from_millis(1), || TICKS.tick());
    let start = TICKS.now();
    while TICKS.now().elapsed_since(start) < 60 {
        sched.step();
        thread::yield_now();
    }
    ticker.stop();

    let count = polls.load(Ordering::Relaxed);
    assert!((8..=12).contains(&count), "expected ~11 polls, got {}", count);
}
