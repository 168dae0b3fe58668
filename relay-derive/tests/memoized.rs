use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use relay::{memoized, observable, relayed, with_observation_tracking};

#[relayed]
pub struct Square {
    side: f64,
    #[relay(immutable, default = AtomicUsize::new(0))]
    calls: AtomicUsize,
}

#[relayed]
impl Square {
    #[memoized]
    fn calculate_area(&self) -> f64 {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.side() * self.side()
    }

    #[memoized(pub, "outline")]
    #[publisher_ignored]
    fn perimeter(&self) -> f64 {
        self.side() * 4.0
    }
}

#[observable]
pub struct Rectangle {
    width: u32,
    height: u32,
}

impl Rectangle {
    #[memoized]
    fn compute_area(&self) -> u32 {
        self.width() * self.height()
    }
}

#[test]
fn results_are_cached_until_an_input_changes() {
    let square = Square::new(2.0);

    assert_eq!(square.area(), 4.0);
    assert_eq!(square.calls.load(Ordering::SeqCst), 1);

    assert_eq!(square.area(), 4.0);
    assert_eq!(square.calls.load(Ordering::SeqCst), 1);

    square.set_side(3.0);
    assert_eq!(square.area(), 9.0);
    assert_eq!(square.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn explicit_names_and_visibility() {
    let square = Square::new(1.5);
    assert_eq!(square.outline(), 6.0);
    square.set_side(2.0);
    assert_eq!(square.outline(), 8.0);
}

#[test]
fn memoized_publishers_emit_recomputed_values() {
    let square = Square::new(2.0);
    let areas = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&areas);
    let _areas = square.publisher().area().sink(move |area| sink.lock().push(area));
    square.set_side(3.0);

    assert_eq!(*areas.lock(), vec![4.0, 9.0]);
    assert_eq!(square.area(), 9.0);
    assert_eq!(square.calls.load(Ordering::SeqCst), 2);
}

#[test]
fn invalidation_is_observable() {
    let rectangle = Rectangle::new(2, 3);
    assert_eq!(rectangle.area(), 6);

    let fired = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&fired);
    let area = with_observation_tracking(|| rectangle.area(), move || *counter.lock() += 1);
    assert_eq!(area, 6);

    rectangle.set_height(4);

    assert_eq!(*fired.lock(), 1);
    assert_eq!(rectangle.area(), 8);
}

#[test]
fn invalidation_does_not_keep_the_object_alive() {
    let rectangle = Rectangle::new(2, 3);
    assert_eq!(rectangle.area(), 6);

    let weak = Arc::downgrade(&rectangle);
    drop(rectangle);

    assert!(weak.upgrade().is_none());
}
