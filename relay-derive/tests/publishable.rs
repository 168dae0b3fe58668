use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use relay::{observable, publishable, AnyPublisher, Cancellable, Observable};

#[publishable]
#[observable]
pub struct Account {
    owner: String,
    nickname: String,
    balance: i64,
    #[publisher_ignored]
    note: String,
}

#[publishable]
impl Account {
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.owner(), self.nickname())
    }
}

#[publishable]
#[observable]
pub struct Thermostat {
    target: f64,
    enabled: bool,
}

fn record<T: Clone + Send + 'static>(publisher: AnyPublisher<T>) -> (Arc<Mutex<Vec<T>>>, Cancellable) {
    let values = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&values);
    let cancellable = publisher.sink(move |value| sink.lock().push(value));
    (values, cancellable)
}

fn account() -> Arc<Account> {
    Account::new("Ada".to_string(), "ada".to_string(), 100, String::new())
}

#[test]
fn properties_sharing_a_type_publish_on_their_own_stream() {
    let account = account();
    let (owners, _owners) = record(account.publisher().owner());
    let (nicknames, _nicknames) = record(account.publisher().nickname());

    account.set_nickname("countess".to_string());
    account.set_owner("Augusta".to_string());

    assert_eq!(*owners.lock(), vec!["Ada".to_string(), "Augusta".to_string()]);
    assert_eq!(*nicknames.lock(), vec!["ada".to_string(), "countess".to_string()]);
}

#[test]
fn distinct_types_publish_on_their_own_stream() {
    let thermostat = Thermostat::new(20.5, false);
    let (targets, _targets) = record(thermostat.publisher().target());
    let (enabled, _enabled) = record(thermostat.publisher().enabled());

    thermostat.set_enabled(true);
    thermostat.set_target(21.0);

    assert_eq!(*targets.lock(), vec![20.5, 21.0]);
    assert_eq!(*enabled.lock(), vec![false, true]);
}

#[test]
fn mutations_are_coalesced() {
    let account = account();
    let (will, _will) = record(account.publisher().account_will_change());
    let (did, _did) = record(account.publisher().account_did_change());
    let (balances, _balances) = record(account.publisher().balance());

    account.publisher().with_modifications(|| {
        account.set_balance(50);
        account.modify_balance(|balance| *balance -= 20);
        account.set_owner("Augusta".to_string());
    });

    assert_eq!(will.lock().len(), 1);
    assert_eq!(did.lock().len(), 1);
    assert_eq!(*balances.lock(), vec![100, 50, 30]);
}

#[test]
fn unpublished_properties_still_announce_changes() {
    let account = account();
    let (did, _did) = record(account.publisher().account_did_change());
    let (owners, _owners) = record(account.publisher().owner());

    account.set_note("overdrawn twice".to_string());

    assert_eq!(did.lock().len(), 1);
    assert_eq!(owners.lock().len(), 1);
    assert_eq!(account.note(), "overdrawn twice");
}

#[test]
fn computed_properties_follow_their_inputs() {
    let account = account();
    let (names, _names) = record(account.publisher().display_name());

    account.publisher().with_modifications(|| {
        account.set_owner("Augusta".to_string());
        account.set_nickname("countess".to_string());
    });
    account.set_balance(0);

    assert_eq!(
        *names.lock(),
        vec!["Ada (ada)".to_string(), "Augusta (countess)".to_string()]
    );
}

#[test]
fn computed_publishers_register_one_observer() {
    let account = account();
    assert_eq!(account.observation_registrar().observer_count(), 0);
    let _names = account.publisher().display_name().sink(|_| {});
    assert_eq!(account.observation_registrar().observer_count(), 1);
}
