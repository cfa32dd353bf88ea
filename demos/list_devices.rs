use padframe::{Config, Gamepads};

fn main() {
    let mut gamepads = Gamepads::new(&Config::default());
    gamepads.init().expect("init backend");

    println!("Discovered {} device(s)", gamepads.device_count());
    for device in gamepads.devices() {
        println!(
            "== #{} {} axes={} buttons={} ==",
            device.id,
            device,
            device.axis_count(),
            device.button_count()
        );
        let meta = serde_json::to_string_pretty(&device.meta).expect("serialize metadata");
        println!("{meta}");
    }

    gamepads.shutdown();
}
