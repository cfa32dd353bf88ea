use std::time::Duration;

use padframe::{Config, Input};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(path).expect("load config"),
        None => Config::default(),
    };
    let mut input = Input::new(&config).expect("valid config");
    input.init().expect("init backend");

    println!("{} gamepad(s) at startup", input.gamepad_count());
    for device in input.gamepads().devices() {
        println!(
            "  #{} {} axes={} buttons={}",
            device.id,
            device,
            device.axis_count(),
            device.button_count()
        );
    }

    loop {
        input.flush();
        let frame = input.frame();

        for slot in 0..frame.slot_capacity() {
            let Some(pad) = frame.slot(slot).filter(|s| s.attached()) else {
                continue;
            };
            let mut changes = Vec::new();
            for b in 0..pad.button_count() {
                if frame.gamepad_was_pressed(slot, b) {
                    changes.push(format!("+{b}"));
                }
                if frame.gamepad_was_released(slot, b) {
                    changes.push(format!("-{b}"));
                }
            }
            for a in 0..2 {
                let delta = frame.gamepad_axis_delta(slot, a);
                if delta.abs() > 0.01 {
                    changes.push(format!("A{a}={:.3}", frame.gamepad_axis(slot, a)));
                }
            }
            if !changes.is_empty() {
                println!("slot {slot}: {}", changes.join(" "));
            }
        }

        std::thread::sleep(Duration::from_millis(16));
    }
}
