use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use relay::{observable, publishable, relayed, GlobalActor, MainActor};

#[relayed(isolation = MainActor)]
pub struct Counter {
    value: u64,
}

#[relayed]
impl Counter {
    #[memoized]
    fn compute_double(&self) -> u64 {
        self.value() * 2
    }
}

#[publishable(isolation = MainActor)]
#[observable]
pub struct Session {
    token: String,
}

#[test]
fn main_actor_is_entered_by_run() {
    assert!(!MainActor::is_isolated());
    MainActor::run(|| {
        assert!(MainActor::is_isolated());
        MainActor::run(|| assert!(MainActor::is_isolated()));
        assert!(MainActor::is_isolated());
    });
    assert!(!MainActor::is_isolated());
}

#[test]
fn isolated_memoization_invalidates_inside_the_actor() {
    MainActor::run(|| {
        let counter = Counter::new(2);
        assert_eq!(counter.double(), 4);
        counter.set_value(5);
        assert_eq!(counter.double(), 10);
    });
}

#[test]
#[should_panic(expected = "expected to be isolated to MainActor")]
fn isolated_memoization_outside_the_actor_panics() {
    let counter = MainActor::run(|| {
        let counter = Counter::new(2);
        assert_eq!(counter.double(), 4);
        counter
    });
    counter.set_value(5);
}

#[test]
fn isolated_registrar_publishes_inside_the_actor() {
    MainActor::run(|| {
        let session = Session::new("a".to_string());
        let tokens = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&tokens);
        let _tokens = session.publisher().token().sink(move |token| sink.lock().push(token));

        session.set_token("b".to_string());

        assert_eq!(*tokens.lock(), vec!["a".to_string(), "b".to_string()]);
    });
}

#[test]
#[should_panic(expected = "expected to be isolated to MainActor")]
fn isolated_registrar_outside_the_actor_panics() {
    let session = Session::new("a".to_string());
    session.set_token("b".to_string());
}

#[test]
fn isolation_errors_name_the_actor() {
    assert_eq!(
        MainActor::check_isolated().unwrap_err().to_string(),
        "expected to be isolated to MainActor, but the current thread is outside of it"
    );
    assert!(MainActor::run(MainActor::check_isolated).is_ok());
}
