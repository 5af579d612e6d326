use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use colored::Colorize;
use vbus_bus::sim::Master;
use vbus_bus::{Bus, DeviceEntry, PayloadSource, Registry, Scheduler};
use vbus_posix::{HostLock, Ticker};
use vbus_ring::{LinearBuffer, RingConfig};
use vbus_sync::TickCounter;

mod devices;
mod session;

use devices::{Loopback, SampleRing, Sensor, SimPins};
use session::{Script, LOOPBACK, SENSOR};

/// Sensor status refresh period, in ticks
const SENSOR_POLL_TICKS: u64 = 10;

static TICKS: TickCounter<HostLock> = TickCounter::new(HostLock);
static SAMPLES: SampleRing = SampleRing::new(HostLock, RingConfig::interrupt_backed().with_watermarks(32, 96));
static STOP: AtomicBool = AtomicBool::new(false);

#[derive(Parser, Debug)]
#[command(author, version, about = "Drive the vbus firmware core with a simulated bus master")]
struct Opts {
    /// Master rounds to run (0 runs until Ctrl-C)
    #[arg(long, default_value_t = 20)]
    steps: u32,

    /// Timer tick period; one sensor sample is produced per tick
    #[arg(long = "period-us", default_value_t = 500, value_name = "US")]
    period_us: u64,

    /// Dump raw response bytes
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let opts = Opts::parse();
    if opts.period_us == 0 {
        bail!("--period-us must be non-zero");
    }
    ctrlc::set_handler(|| STOP.store(true, Ordering::SeqCst)).context("installing Ctrl-C handler")?;

    let pins = SimPins::default();
    let loopback_out = LinearBuffer::<32>::new();
    let mut loopback = Loopback::new(&loopback_out);
    let mut sensor = Sensor::new(&SAMPLES);

    let bus: Bus<&SimPins, HostLock, 32> = Bus::new(&pins, HostLock);
    let mut registry = Registry::<16>::new();
    registry
        .register(&bus, DeviceEntry::new(LOOPBACK, PayloadSource::Linear(&loopback_out), &mut loopback))
        .context("registering loopback device")?;
    registry
        .register(
            &bus,
            DeviceEntry::new(SENSOR, PayloadSource::Ring(&SAMPLES), &mut sensor).with_polling(SENSOR_POLL_TICKS),
        )
        .context("registering sensor device")?;
    let mut scheduler = Scheduler::new(&bus, registry, &TICKS);

    let period = Duration::from_micros(opts.period_us);
    let mut sample = 0u8;
    let ticker = Ticker::start(period, move || {
        TICKS.tick();
        // a full ring latches its overflow flag for the host
        let _ = SAMPLES.put_byte(sample);
        sample = sample.wrapping_add(1);
    });

    println!(
        "vbus-sim: {} rounds, tick {}us, {} devices",
        if opts.steps == 0 { "unbounded".to_string() } else { opts.steps.to_string() },
        opts.period_us,
        scheduler.registry().len()
    );

    let script = Script {
        rounds: opts.steps,
        pause: period.saturating_mul(40),
        verbose: opts.verbose,
    };
    let finished = AtomicBool::new(false);

    let summary = thread::scope(|s| {
        let bus = &bus;
        let script = &script;
        let finished = &finished;
        let master = s.spawn(move || {
            let summary = session::run(&Master::new(bus), script, &STOP);
            finished.store(true, Ordering::Release);
            summary
        });

        while !finished.load(Ordering::Acquire) && !master.is_finished() {
            scheduler.step();
        }
        master.join().map_err(|_| anyhow!("bus master thread panicked"))
    })?;
    ticker.stop();

    let stats = bus.stats();
    println!("{}", "summary".bold());
    println!("  rounds        {}", summary.rounds);
    println!("  samples       {}", summary.samples);
    println!("  overflows     {}", summary.overflows);
    println!("  high water    {}", summary.warnings);
    println!("  transactions  {}", stats.transactions);
    println!("  commands      {}", stats.commands);
    println!("  reads         {}", stats.reads);
    println!("  busy rejects  {}", stats.busy_rejects);
    println!("  crc errors    {}", stats.crc_errors);
    println!("  rearms        {}", pins.rearms());

    if summary.mismatches > 0 {
        bail!("{} loopback mismatches", summary.mismatches);
    }
    Ok(())
}
