//! Homing Pursuit — one missile chasing one target over real TCP.
//!
//! Demonstrates:
//!   1. Running a toy guidance server on loopback (pure pursuit with a
//!      proximity fuse)
//!   2. Building a LinkConfig and a GuidanceLink over TcpTransport
//!   3. Negotiating hardware at launch and stepping a FlightDriver
//!   4. Reading link counters and shutting the link down
//!
//! Run with:
//!   RUST_LOG=info cargo run --example pursuit

use std::error::Error;
use std::io::BufReader;
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use homing::link::codec::{read_frame, write_frame, Frame};
use homing::prelude::*;
use homing::types::{Seeker, Warhead};
use homing_test_utils::fixtures::{creature, launch_request, RICH_BUDGET};
use homing_test_utils::MockWorld;

// ─── Scenario ───────────────────────────────────────────────────

const ALTITUDE: f64 = 64.0;
const MAX_TICKS: usize = 200;
const TICK: Duration = Duration::from_millis(20);

/// The server detonates the missile inside this distance.
const FUSE_RANGE: f64 = 3.0;

// ─── Guidance server ────────────────────────────────────────────

fn serve(listener: TcpListener) {
    for conn in listener.incoming() {
        match conn {
            Ok(sock) => {
                thread::spawn(move || {
                    if let Err(e) = handle(sock) {
                        log::warn!("guidance server connection ended: {e}");
                    }
                });
            }
            Err(e) => log::warn!("accept failed: {e}"),
        }
    }
}

fn handle(sock: TcpStream) -> Result<(), TransportError> {
    let mut writer = sock.try_clone().map_err(|e| TransportError::Io {
        reason: e.to_string(),
    })?;
    let mut reader = BufReader::new(sock);
    let mut seq = 0u64;
    while let Some(frame) = read_frame(&mut reader)? {
        let reply = match frame {
            Frame::HealthCheck => Some(Frame::HealthOk),
            Frame::Register { missile } => {
                log::info!("server: registering missile {}", missile.id);
                let hardware = HardwareConfig {
                    warhead: Warhead::TntM,
                    seeker: Seeker::IrSeekerM,
                    ..HardwareConfig::default()
                };
                Some(Frame::Registered { hardware })
            }
            Frame::OpenStream { missile } => {
                log::info!("server: guiding missile {}", missile.id);
                None
            }
            Frame::State { state } if !state.destroyed => {
                seq += 1;
                Some(Frame::Control {
                    input: pursue(seq, &state),
                })
            }
            Frame::CloseStream => break,
            _ => None,
        };
        if let Some(reply) = reply {
            write_frame(&mut writer, &reply)?;
        }
    }
    Ok(())
}

/// Turn straight at the target, or explode once close enough.
fn pursue(seq: u64, state: &MissileState) -> ControlInput {
    let Some(target) = state.target_position else {
        return ControlInput::turn(seq, 0.0, 0.0);
    };
    let offset = target - state.position;
    if offset.length() < FUSE_RANGE {
        let mut input = ControlInput::turn(seq, 0.0, 0.0);
        input.explode = true;
        return input;
    }
    let Some((pitch, yaw)) = offset.pitch_yaw() else {
        return ControlInput::turn(seq, 0.0, 0.0);
    };
    let mut yaw_turn = (yaw - state.yaw) % 360.0;
    if yaw_turn > 180.0 {
        yaw_turn -= 360.0;
    } else if yaw_turn < -180.0 {
        yaw_turn += 360.0;
    }
    ControlInput::turn(seq, pitch - state.pitch, yaw_turn)
}

// ─── Host ───────────────────────────────────────────────────────

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    thread::spawn(move || serve(listener));

    let config = LinkConfig {
        port,
        loopback: true,
        connection_ids: vec![ConnectionId(0)],
        ..LinkConfig::default()
    };
    let transport = Arc::new(TcpTransport::new(config.outbound_capacity));
    let link = Arc::new(GuidanceLink::new(config, transport)?);

    let mut world = MockWorld::new().with_ground(0.0);
    world.add_entity(creature(1, Vec3::new(20.0, ALTITUDE, 60.0)));

    let mut driver = FlightDriver::new(
        Arc::clone(&link),
        DriverConfig {
            seed: 42,
            negotiate_hardware: true,
        },
    );
    let id = driver.launch(
        launch_request(0, RICH_BUDGET, Vec3::new(0.0, ALTITUDE, 0.0)),
        &mut world,
    );
    println!("launched missile {id}");

    for tick in 1..=MAX_TICKS {
        thread::sleep(TICK);
        match driver.step(id, &mut world) {
            Some(TickOutcome::Terminated(reason)) => {
                println!("tick {tick}: missile {id} left the world ({reason:?})");
                break;
            }
            Some(_) => {
                if let Some(missile) = driver.missile(id) {
                    let p = missile.position();
                    log::info!("tick {tick}: at ({:.1}, {:.1}, {:.1})", p.x, p.y, p.z);
                }
            }
            None => break,
        }
    }
    driver.destroy_all();

    for (missile, power) in world.detonations() {
        println!("missile {missile} detonated with power {power}");
    }
    let stats = link.stats();
    println!(
        "sessions opened: {}, commands received: {}, stale reads: {}",
        stats.sessions_opened, stats.commands_received, stats.stale_reads
    );

    drop(driver);
    match Arc::try_unwrap(link) {
        Ok(mut link) => {
            let report = link.shutdown();
            println!("link shut down in {}ms", report.total_ms);
        }
        Err(_) => println!("link still shared; it shuts down on drop"),
    }
    Ok(())
}
