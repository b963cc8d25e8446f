use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use watchable::{Field, Listener, ManualTimer, Throttle, Value};

fn ms(millis: u64) -> Duration {
	Duration::from_millis(millis)
}

#[test]
fn reads_between_periods_hold_the_forwarded_value() {
	let timer = Rc::new(ManualTimer::new());
	let field = Field::new(0);
	let throttled = Throttle::new(Value::from(field.clone()), ms(50), timer.clone());

	assert_eq!(throttled.get_once(), 0);
	field.set(1).commit();
	assert_eq!(throttled.get_once(), 1);
	field.set(2).commit();
	assert_eq!(throttled.get_once(), 1);
	timer.advance(ms(50));
	assert_eq!(throttled.get_once(), 2);
}

#[test]
fn stream_of_updates_yields_four_dirty_broadcasts() {
	let timer = Rc::new(ManualTimer::new());
	let field = Field::new(0);
	let throttled = Throttle::new(Value::from(field.clone()), ms(85), timer.clone());
	assert_eq!(throttled.get_once(), 0);

	let dirty_count = Rc::new(Cell::new(0));
	let dirty: Listener = Rc::new({
		let count = dirty_count.clone();
		move || count.set(count.get() + 1)
	});
	let _d = throttled.subscribe_dirty(&dirty);
	let reader: Listener = Rc::new({
		let throttled = throttled.clone();
		move || {
			throttled.get_once();
		}
	});
	let _c = throttled.subscribe_change(&reader);

	// Seven updates at 30 ms intervals against an 85 ms period.
	for update in 1..=7 {
		field.set(update).commit();
		timer.advance(ms(30));
	}
	timer.advance(ms(300));

	assert_eq!(dirty_count.get(), 4);
	assert_eq!(throttled.get_once(), 7);
}

#[test]
fn throttling_indicator_tracks_suppression() {
	let timer = Rc::new(ManualTimer::new());
	let field = Field::new(0);
	let throttled = Throttle::new(Value::from(field.clone()), ms(50), timer.clone());
	let throttling = throttled.throttling();
	assert!(!throttling.get_once());

	// Keep the throttled value flowing the way a real consumer would.
	let reader: Listener = Rc::new({
		let throttled = throttled.clone();
		move || {
			throttled.get_once();
		}
	});
	let _c = throttled.subscribe_change(&reader);
	assert_eq!(throttled.get_once(), 0);

	// The first wave of a period passes straight through.
	field.set(1).commit();
	assert!(!throttling.get_once());

	// The second is suppressed behind the open epoch.
	field.set(2).commit();
	assert!(throttling.get_once());

	// The timer forwards the suppressed wave and the indicator clears.
	timer.advance(ms(50));
	assert!(!throttling.get_once());
	assert_eq!(throttled.get_once(), 2);
}

#[test]
fn quiet_periods_close_without_events() {
	let timer = Rc::new(ManualTimer::new());
	let field = Field::new(0);
	let throttled = Throttle::new(Value::from(field.clone()), ms(40), timer.clone());
	assert_eq!(throttled.get_once(), 0);

	let dirty_count = Rc::new(Cell::new(0));
	let dirty: Listener = Rc::new({
		let count = dirty_count.clone();
		move || count.set(count.get() + 1)
	});
	let _d = throttled.subscribe_dirty(&dirty);
	let reader: Listener = Rc::new({
		let throttled = throttled.clone();
		move || {
			throttled.get_once();
		}
	});
	let _c = throttled.subscribe_change(&reader);

	field.set(1).commit();
	assert_eq!(dirty_count.get(), 1);

	// Nothing further arrives: the epoch expires silently and the next
	// update opens a fresh one.
	timer.advance(ms(200));
	assert_eq!(dirty_count.get(), 1);

	field.set(2).commit();
	assert_eq!(dirty_count.get(), 2);
	assert_eq!(throttled.get_once(), 2);
}
