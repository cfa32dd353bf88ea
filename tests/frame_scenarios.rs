use std::cell::RefCell;
use std::rc::Rc;

use padframe::{
    parse_combo, Backend, ComboError, Config, DeviceId, HostEvent, Input, Key, Modifiers,
    VirtualBackend, VirtualPad,
};

fn input() -> Input<VirtualBackend> {
    let mut input = Input::with_backend(VirtualBackend::new(), &Config::default());
    input.init().unwrap();
    input
}

fn pad() -> VirtualPad {
    VirtualPad::new("Pad").axis(0, 255).axis(0, 255).buttons(2)
}

fn attach(input: &mut Input<VirtualBackend>) -> DeviceId {
    let id = input.gamepads_mut().backend_mut().attach(pad());
    input.flush();
    id
}

fn key(key: Key, down: bool) -> HostEvent {
    if down {
        HostEvent::KeyDown {
            key,
            modifiers: Modifiers::empty(),
        }
    } else {
        HostEvent::KeyUp {
            key,
            modifiers: Modifiers::empty(),
        }
    }
}

#[test]
fn attached_pad_gets_a_slot() {
    let mut input = input();
    let id = attach(&mut input);

    assert_eq!(input.gamepad_count(), 1);
    let slot = input.frame().slot_for(id);
    assert!(input.frame().gamepad_connected(slot));
    assert_eq!(input.frame().slot(slot).unwrap().button_count(), 2);
    assert_eq!(input.frame().slot(slot).unwrap().axis_count(), 2);

    let device = input.gamepads().device_at(0).unwrap();
    assert_eq!(device.name, "Pad");
    assert_eq!(device.meta.bus.as_deref(), Some("virtual"));
}

#[test]
fn button_press_is_an_edge_for_one_frame() {
    let mut input = input();
    let id = attach(&mut input);
    let slot = input.frame().slot_for(id);

    assert!(input.gamepads_mut().backend_mut().press_button(id, 0));
    input.flush();
    assert!(input.frame().gamepad_was_pressed(slot, 0));
    assert!(input.frame().gamepad_button_down(slot, 0));
    assert!(!input.frame().gamepad_was_pressed(slot, 1));

    input.flush();
    assert!(!input.frame().gamepad_was_pressed(slot, 0));
}

#[test]
fn full_axis_sweep_has_delta_two() {
    let mut input = input();
    let id = attach(&mut input);
    let slot = input.frame().slot_for(id);

    input.gamepads_mut().backend_mut().move_axis(id, 0, 0);
    input.flush();
    assert_eq!(input.frame().gamepad_axis(slot, 0), -1.0);

    input.gamepads_mut().backend_mut().move_axis(id, 0, 255);
    input.flush();
    assert_eq!(input.frame().gamepad_axis(slot, 0), 1.0);
    assert!((input.frame().gamepad_axis_delta(slot, 0) - 2.0).abs() < 1e-6);
}

#[test]
fn queued_input_is_delivered_before_removal() {
    let mut input = input();
    let id = attach(&mut input);

    let log = Rc::new(RefCell::new(Vec::<String>::new()));
    {
        let gp = input.gamepads_mut();
        let l = log.clone();
        gp.on_button_down(Some(Box::new(move |d, b, _| {
            l.borrow_mut().push(format!("down {} {b}", d.id))
        })));
        let l = log.clone();
        gp.on_button_up(Some(Box::new(move |d, b, _| {
            l.borrow_mut().push(format!("up {} {b}", d.id))
        })));
        let l = log.clone();
        gp.on_remove(Some(Box::new(move |d| {
            l.borrow_mut().push(format!("remove {}", d.id))
        })));
    }

    let backend = input.gamepads_mut().backend_mut();
    assert!(backend.press_button(id, 0));
    assert!(backend.press_button(id, 1));
    assert!(backend.release_button(id, 0));
    assert!(backend.detach(id));
    assert!(!backend.press_button(id, 0));

    input.flush();
    input.flush();

    assert_eq!(
        *log.borrow(),
        vec![
            format!("down {id} 0"),
            format!("down {id} 1"),
            format!("up {id} 0"),
            format!("remove {id}"),
        ]
    );
    assert_eq!(input.gamepad_count(), 0);
    assert_eq!(input.frame().connected_gamepads(), 0);
}

#[test]
fn unplug_drops_queued_input() {
    let mut input = input();
    let id = attach(&mut input);

    let presses = Rc::new(RefCell::new(0));
    let removals = Rc::new(RefCell::new(0));
    {
        let gp = input.gamepads_mut();
        let p = presses.clone();
        gp.on_button_down(Some(Box::new(move |_, _, _| *p.borrow_mut() += 1)));
        let r = removals.clone();
        gp.on_remove(Some(Box::new(move |_| *r.borrow_mut() += 1)));
    }

    let backend = input.gamepads_mut().backend_mut();
    backend.press_button(id, 0);
    assert!(backend.unplug(id));
    assert_eq!(backend.device_count(), 0);

    input.flush();
    assert_eq!(*presses.borrow(), 0);
    assert_eq!(*removals.borrow(), 1);
}

#[test]
fn ids_keep_increasing_across_reattach() {
    let mut input = input();
    let first = attach(&mut input);
    input.gamepads_mut().backend_mut().detach(first);
    input.flush();
    let second = attach(&mut input);
    input.gamepads_mut().backend_mut().unplug(second);
    input.flush();
    let third = attach(&mut input);

    assert!(first < second && second < third);
    assert_eq!(input.gamepad_count(), 1);
    assert_eq!(input.gamepads().device_at(0).unwrap().id, third);
}

#[test]
fn key_press_lasts_one_frame() {
    let mut input = input();
    input.handle_event(&key(Key::SPACE, true));
    assert!(input.frame().was_key_pressed(Key::SPACE));

    input.flush();
    assert!(input.frame().is_key_down(Key::SPACE));
    assert!(!input.frame().was_key_pressed(Key::SPACE));

    input.handle_event(&key(Key::SPACE, false));
    assert!(input.frame().was_key_released(Key::SPACE));
    input.flush();
    assert!(!input.frame().was_key_released(Key::SPACE));
}

#[test]
fn repeated_flush_settles() {
    let mut input = input();
    input.handle_event(&key(Key::ENTER, true));
    input.handle_event(&HostEvent::MouseScroll {
        dx: 0.0,
        dy: 1.5,
        modifiers: Modifiers::empty(),
    });
    input.flush();
    input.flush();

    let frame = input.frame();
    assert_eq!(frame.current(), frame.previous());
    assert!(frame.is_key_down(Key::ENTER));
    assert!(!frame.scrolled());
}

#[test]
fn combos_track_held_keys() {
    let mut input = input();
    let a = Key::from_char('A').unwrap();
    input.handle_event(&HostEvent::KeyDown {
        key: a,
        modifiers: Modifiers::CTRL,
    });

    assert!(input.frame().is_str_down("CTRL+A"));
    assert!(input.frame().is_str_down("ctrl,a"));
    assert!(!input.frame().is_str_down("CTRL+SHIFT+A"));
    assert!(!input.frame().is_str_down("A,B"));
    assert!(!input.frame().is_str_down("FOO"));
}

#[test]
fn combo_parsing() {
    let c = parse_combo("CTRL+A").unwrap();
    assert_eq!(c.modifiers, Modifiers::CTRL);
    assert_eq!(c.keys, vec![Key::from_char('A').unwrap()]);

    let c = parse_combo("CTRL+A,B").unwrap();
    assert_eq!(
        c.keys,
        vec![Key::from_char('A').unwrap(), Key::from_char('B').unwrap()]
    );

    let err: Result<_, ComboError> = parse_combo("FOO");
    assert!(err.is_err());
}

#[test]
fn shutdown_empties_slots() {
    let mut input = input();
    attach(&mut input);
    input.shutdown();

    assert_eq!(input.gamepad_count(), 0);
    assert_eq!(input.frame().connected_gamepads(), 0);
}
