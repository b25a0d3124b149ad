//! Interpolation quality under network jitter.
//!
//! Feeds a [`SyncBuffer`] with samples of a body moving at constant speed,
//! delivered with random latency, and reports how far the presented pose
//! strays from the true pose at the buffer's playback time.
//!
//! Usage:
//!   cargo run -p arena_tests --bin jitter_bench -- [jitter_ms] [seed]

use std::collections::VecDeque;

use arena_client::sync::{SyncBuffer, Warp};
use arena_shared::math::{Vec2, Vec3};
use rand::{rngs::StdRng, Rng, SeedableRng};

const SEND_RATE_HZ: f64 = 20.0;
const FRAME_HZ: f64 = 60.0;
const BASE_LATENCY: f64 = 0.05;
const SPEED: f32 = 5.0;
const DURATION: f64 = 30.0;

#[derive(Debug, Default)]
struct Stats {
    frames: u32,
    error_sum: f64,
    error_max: f64,
    lag_sum: f64,
    starved: u32,
}

fn truth(t: f64) -> Vec3 {
    Vec3::new(t as f32 * SPEED, 0.0, 0.0)
}

fn run(capacity: usize, jitter: f64, seed: u64) -> anyhow::Result<Stats> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut buffer = SyncBuffer::new(capacity, Warp::default())?;

    // (arrival, send timestamp); TCP keeps arrivals ordered.
    let mut in_flight: VecDeque<(f64, f64)> = VecDeque::new();
    let mut last_arrival = 0.0_f64;
    let mut next_send = 0.0_f64;

    let frame = 1.0 / FRAME_HZ;
    let mut now = 0.0_f64;
    let mut stats = Stats::default();
    let mut last_vt = None;

    while now < DURATION {
        while next_send <= now {
            let arrival = (next_send + BASE_LATENCY + rng.gen_range(0.0..=jitter)).max(last_arrival);
            last_arrival = arrival;
            in_flight.push_back((arrival, next_send));
            next_send += 1.0 / SEND_RATE_HZ;
        }
        while let Some(&(arrival, sent)) = in_flight.front() {
            if arrival > now {
                break;
            }
            in_flight.pop_front();
            buffer.add_new_state(truth(sent), Vec2::ZERO, 0, sent);
        }

        buffer.update(frame);
        if let Some(vt) = buffer.virtual_time() {
            let error = buffer.position().distance(truth(vt)) as f64;
            stats.frames += 1;
            stats.error_sum += error;
            stats.error_max = stats.error_max.max(error);
            stats.lag_sum += now - vt;
            if last_vt == Some(vt) {
                stats.starved += 1;
            }
            last_vt = Some(vt);
        }
        now += frame;
    }
    Ok(stats)
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let jitter_ms: f64 = match args.get(1) {
        Some(v) => v.parse()?,
        None => 40.0,
    };
    let seed: u64 = match args.get(2) {
        Some(v) => v.parse()?,
        None => 1,
    };
    let jitter = jitter_ms / 1000.0;

    println!(
        "send {SEND_RATE_HZ} Hz, frames {FRAME_HZ} Hz, latency {:.0} ms + up to {jitter_ms:.0} ms jitter",
        BASE_LATENCY * 1000.0
    );
    println!("{:>8} {:>12} {:>12} {:>10} {:>8}", "capacity", "mean err", "max err", "lag ms", "held");
    for capacity in 2..=8 {
        let stats = run(capacity, jitter, seed)?;
        let frames = stats.frames.max(1) as f64;
        println!(
            "{:>8} {:>12.4} {:>12.4} {:>10.1} {:>8}",
            capacity,
            stats.error_sum / frames,
            stats.error_max,
            stats.lag_sum / frames * 1000.0,
            stats.starved
        );
    }
    Ok(())
}
