use std::sync::Arc;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use relay::{relayed, AnyPublisher, Cancellable};

#[relayed]
pub struct Animal {
    name: String,
}

#[relayed]
pub struct Dog {
    #[superclass]
    base: Arc<Animal>,
    breed: String,
}

#[relayed(has_superclass = true)]
pub struct Cat {
    base: Arc<Animal>,
    indoor: bool,
}

fn record<T: Clone + Send + 'static>(publisher: AnyPublisher<T>) -> (Arc<Mutex<Vec<T>>>, Cancellable) {
    let values = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&values);
    let cancellable = publisher.sink(move |value| sink.lock().push(value));
    (values, cancellable)
}

fn rex() -> Arc<Dog> {
    Dog::new(Animal::new("Rex".to_string()), "Beagle".to_string())
}

#[test]
fn subclasses_reach_base_properties() {
    let dog = rex();
    let (names, _names) = record(dog.publisher().name());
    let (breeds, _breeds) = record(dog.publisher().breed());

    dog.set_name("Max".to_string());
    dog.set_breed("Basset".to_string());

    assert_eq!(dog.name(), "Max");
    assert_eq!(*names.lock(), vec!["Rex".to_string(), "Max".to_string()]);
    assert_eq!(*breeds.lock(), vec!["Beagle".to_string(), "Basset".to_string()]);
}

#[test]
fn subclass_and_base_share_change_announcements() {
    let dog = rex();
    let (animal, _animal) = record(dog.publisher().animal_did_change());
    let (dogs, _dogs) = record(dog.publisher().dog_did_change());

    dog.publisher().with_modifications(|| {
        dog.set_name("Max".to_string());
        dog.set_breed("Basset".to_string());
    });

    assert_eq!(animal.lock().len(), 1);
    assert_eq!(dogs.lock().len(), 1);
    assert!(Arc::ptr_eq(&dogs.lock()[0], &dog));
}

#[test]
fn forced_superclass_uses_the_conventional_field() {
    let cat = Cat::new(Animal::new("Tom".to_string()), true);
    let (indoor, _indoor) = record(cat.publisher().indoor());
    let (names, _names) = record(cat.publisher().name());

    cat.set_indoor(false);

    assert_eq!(*indoor.lock(), vec![true, false]);
    assert_eq!(*names.lock(), vec!["Tom".to_string()]);
}
