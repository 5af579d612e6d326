//! Scripted bus master session
//!
//! Runs on its own thread, standing in for the bus interrupt. Each round
//! does one loopback round trip and drains the sensor stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use colored::Colorize;
use vbus_bus::sim::{Master, Response};
use vbus_core::{CommandByte, DeviceId, Status, RESPONSE_HEADER_LEN};
use vbus_posix::HostLock;

use crate::devices::{SimPins, CLEAR_OVERFLOW, REVERSE};

pub const LOOPBACK: DeviceId = DeviceId::from_command(0x01);
pub const SENSOR: DeviceId = DeviceId::from_command(0x02);

const LOOPBACK_READ: usize = RESPONSE_HEADER_LEN + 32;
const SENSOR_STATUS_LEN: usize = 2;
const SENSOR_READ: usize = RESPONSE_HEADER_LEN + SENSOR_STATUS_LEN + 128;

pub type SimMaster<'b, 'a, 'p> = Master<'b, 'a, &'p SimPins, HostLock, 32>;

/// What the master saw
#[derive(Debug, Default)]
pub struct Summary {
    pub rounds: u32,
    pub mismatches: u32,
    pub samples: usize,
    pub overflows: u32,
    pub warnings: u32,
}

/// Session settings
pub struct Script {
    /// Rounds to run; 0 runs until `stop` is raised
    pub rounds: u32,
    /// Pause between rounds
    pub pause: Duration,
    pub verbose: bool,
}

fn wait_idle(master: &SimMaster<'_, '_, '_>) {
    while master.status().flags().contains(Status::BUSY) {
        thread::yield_now();
    }
}

fn dump<const N: usize>(label: &str, response: &Response<N>) {
    let header = response.header.to_bytes();
    println!(
        "  {} {:02x?} {}",
        label.dimmed(),
        header,
        response
            .payload
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect::<Vec<_>>()
            .join(" ")
    );
}

fn loopback_round(master: &SimMaster<'_, '_, '_>, round: u32, script: &Script, summary: &mut Summary) {
    let reverse = round % 2 == 1;
    let payload = format!("ping {round}").into_bytes();
    let flags = if reverse { REVERSE } else { 0 };

    wait_idle(master);
    master.command(CommandByte::new(LOOPBACK, flags), &payload);
    wait_idle(master);
    let response = master.fetch::<LOOPBACK_READ>();
    if script.verbose {
        dump("loopback", &response);
    }

    let mut expected = payload;
    if reverse {
        expected.reverse();
    }
    let ok = response.header.flags().is_empty() && response.payload[..] == expected[..];
    if ok {
        println!("{} round {:>4} {}", "loopback".green(), round, "ok".green());
    } else {
        summary.mismatches += 1;
        println!(
            "{} round {:>4} {} status {:?}",
            "loopback".red(),
            round,
            "mismatch".red().bold(),
            response.header.flags()
        );
    }
}

fn sensor_round(master: &SimMaster<'_, '_, '_>, script: &Script, summary: &mut Summary) {
    wait_idle(master);
    master.select(CommandByte::new(SENSOR, 0));
    let response = master.fetch::<SENSOR_READ>();
    if script.verbose {
        dump("sensor", &response);
    }

    let samples = response.payload.len().saturating_sub(SENSOR_STATUS_LEN);
    summary.samples += samples;
    let warning = response.payload.first().copied().unwrap_or(0) != 0;
    if warning {
        summary.warnings += 1;
    }
    println!(
        "{}   {:>4} samples{}",
        "sensor".cyan(),
        samples,
        if warning { " (high water)".yellow().to_string() } else { String::new() }
    );

    if response.header.flags().contains(Status::OVERFLOW) {
        summary.overflows += 1;
        println!("{}   {}", "sensor".cyan(), "overflow, clearing".yellow().bold());
        wait_idle(master);
        master.command(CommandByte::new(SENSOR, CLEAR_OVERFLOW), &[]);
    }
}

/// Run `script` until it ends or `stop` is raised
pub fn run(master: &SimMaster<'_, '_, '_>, script: &Script, stop: &AtomicBool) -> Summary {
    let mut summary = Summary::default();

    while !stop.load(Ordering::Relaxed) && (script.rounds == 0 || summary.rounds < script.rounds) {
        loopback_round(master, summary.rounds, script, &mut summary);
        sensor_round(master, script, &mut summary);
        summary.rounds += 1;
        thread::sleep(script.pause);
    }

    wait_idle(master);
    summary
}
