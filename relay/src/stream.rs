//! Push-based broadcast streams.
//!
//! A [`PassthroughSubject`] multicasts every value it is sent to its current subscribers and
//! finishes with a single [`Completion`]. [`AnyPublisher`] is a type-erased, lazily subscribed
//! stream built either from a subject or from one of the operators ([`AnyPublisher::map`],
//! [`AnyPublisher::filter_map`], [`AnyPublisher::remove_duplicates`]).
//!
//! # Invariants
//!
//! 1. Subscribers are called in subscription order and never while the subject's lock is held,
//!    so a subscriber may send to or subscribe to the subject it is observing.
//! 2. A subject completes at most once. After completion `send` is a no-op and new subscribers
//!    receive the completion immediately.
//! 3. Dropping a [`Cancellable`] removes its subscriber before the next `send`.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// The terminal event of a stream
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Completion {
    Finished,
}

type ValueHandler<T> = Arc<dyn Fn(T) + Send + Sync>;
type CompletionHandler = Arc<dyn Fn(Completion) + Send + Sync>;

/// A pair of callbacks receiving the values and the completion of a stream
pub struct Subscriber<T> {
    receive_value: ValueHandler<T>,
    receive_completion: CompletionHandler,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            receive_value: Arc::clone(&self.receive_value),
            receive_completion: Arc::clone(&self.receive_completion),
        }
    }
}

impl<T> Subscriber<T> {
    pub fn new(
        receive_value: impl Fn(T) + Send + Sync + 'static,
        receive_completion: impl Fn(Completion) + Send + Sync + 'static,
    ) -> Self {
        Self {
            receive_value: Arc::new(receive_value),
            receive_completion: Arc::new(receive_completion),
        }
    }

    pub fn receive(&self, value: T) {
        (self.receive_value)(value)
    }

    pub fn receive_completion(&self, completion: Completion) {
        (self.receive_completion)(completion)
    }
}

/// A handle to an active subscription. Dropping it cancels the subscription.
#[must_use = "dropping a Cancellable cancels the subscription"]
pub struct Cancellable {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Cancellable {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A cancellable for a subscription which has already ended
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Combine several cancellables into one which cancels all of them
    pub fn join(cancellables: impl IntoIterator<Item = Cancellable>) -> Self {
        let cancellables = cancellables.into_iter().collect::<Vec<_>>();
        Self::new(move || drop(cancellables))
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    pub fn store(self, cancellables: &mut Vec<Cancellable>) {
        cancellables.push(self);
    }
}

impl Drop for Cancellable {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl std::fmt::Debug for Cancellable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cancellable")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

struct SubjectState<T> {
    next_id: u64,
    subscribers: Vec<(u64, Subscriber<T>)>,
    completion: Option<Completion>,
}

/// A broadcast stream which forwards every value it is sent to its subscribers.
///
/// Cloning a subject yields another handle to the same stream.
pub struct PassthroughSubject<T> {
    state: Arc<Mutex<SubjectState<T>>>,
}

impl<T> Clone for PassthroughSubject<T> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

impl<T> Default for PassthroughSubject<T> {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(SubjectState {
                next_id: 0,
                subscribers: Vec::new(),
                completion: None,
            })),
        }
    }
}

impl<T> std::fmt::Debug for PassthroughSubject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PassthroughSubject")
            .field("subscribers", &state.subscribers.len())
            .field("completion", &state.completion)
            .finish()
    }
}

impl<T: Clone + Send + 'static> PassthroughSubject<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn send(&self, value: T) {
        let subscribers = {
            let state = self.state.lock();
            if state.completion.is_some() {
                return;
            }
            state
                .subscribers
                .iter()
                .map(|(_, subscriber)| subscriber.clone())
                .collect::<Vec<_>>()
        };
        for subscriber in subscribers {
            subscriber.receive(value.clone());
        }
    }

    pub fn send_completion(&self, completion: Completion) {
        let subscribers = {
            let mut state = self.state.lock();
            if state.completion.is_some() {
                return;
            }
            state.completion = Some(completion);
            std::mem::take(&mut state.subscribers)
        };
        tracing::trace!(subscribers = subscribers.len(), "subject completed");
        for (_, subscriber) in subscribers {
            subscriber.receive_completion(completion);
        }
    }

    pub fn subscribe(&self, subscriber: Subscriber<T>) -> Cancellable {
        let registered = {
            let mut state = self.state.lock();
            match state.completion {
                Some(completion) => Err(completion),
                None => {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.subscribers.push((id, subscriber.clone()));
                    Ok(id)
                }
            }
        };
        match registered {
            Ok(id) => {
                let state: Weak<Mutex<SubjectState<T>>> = Arc::downgrade(&self.state);
                Cancellable::new(move || {
                    if let Some(state) = state.upgrade() {
                        state.lock().subscribers.retain(|(other, _)| *other != id);
                    }
                })
            }
            Err(completion) => {
                subscriber.receive_completion(completion);
                Cancellable::empty()
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        self.state.lock().completion.is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.state.lock().subscribers.len()
    }

    pub fn erase(&self) -> AnyPublisher<T> {
        let subject = self.clone();
        AnyPublisher::new(move |subscriber| subject.subscribe(subscriber))
    }
}

type SubscribeFn<T> = Arc<dyn Fn(Subscriber<T>) -> Cancellable + Send + Sync>;

/// A type-erased stream. Nothing happens until a subscriber is attached.
pub struct AnyPublisher<T> {
    subscribe: SubscribeFn<T>,
}

impl<T> Clone for AnyPublisher<T> {
    fn clone(&self) -> Self {
        Self {
            subscribe: Arc::clone(&self.subscribe),
        }
    }
}

impl<T: Clone + Send + 'static> AnyPublisher<T> {
    pub fn new(subscribe: impl Fn(Subscriber<T>) -> Cancellable + Send + Sync + 'static) -> Self {
        Self {
            subscribe: Arc::new(subscribe),
        }
    }

    pub fn subscribe(&self, subscriber: Subscriber<T>) -> Cancellable {
        (self.subscribe)(subscriber)
    }

    /// Subscribe to the values of this stream, ignoring its completion
    pub fn sink(&self, receive_value: impl Fn(T) + Send + Sync + 'static) -> Cancellable {
        self.subscribe(Subscriber::new(receive_value, |_| {}))
    }

    pub fn sink_with_completion(
        &self,
        receive_completion: impl Fn(Completion) + Send + Sync + 'static,
        receive_value: impl Fn(T) + Send + Sync + 'static,
    ) -> Cancellable {
        self.subscribe(Subscriber::new(receive_value, receive_completion))
    }

    pub fn map<U: Clone + Send + 'static>(
        self,
        transform: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> AnyPublisher<U> {
        self.filter_map(move |value| Some(transform(value)))
    }

    pub fn filter_map<U: Clone + Send + 'static>(
        self,
        transform: impl Fn(T) -> Option<U> + Send + Sync + 'static,
    ) -> AnyPublisher<U> {
        let transform = Arc::new(transform);
        AnyPublisher::new(move |subscriber: Subscriber<U>| {
            let transform = Arc::clone(&transform);
            let downstream = subscriber.clone();
            self.subscribe(Subscriber::new(
                move |value| {
                    if let Some(value) = transform(value) {
                        downstream.receive(value);
                    }
                },
                move |completion| subscriber.receive_completion(completion),
            ))
        })
    }

    /// Drop values equal to the value delivered immediately before them
    pub fn remove_duplicates(self) -> Self
    where
        T: PartialEq,
    {
        AnyPublisher::new(move |subscriber: Subscriber<T>| {
            let last = Arc::new(Mutex::new(None::<T>));
            let downstream = subscriber.clone();
            self.subscribe(Subscriber::new(
                move |value: T| {
                    {
                        let mut last = last.lock();
                        if last.as_ref() == Some(&value) {
                            return;
                        }
                        *last = Some(value.clone());
                    }
                    downstream.receive(value);
                },
                move |completion| subscriber.receive_completion(completion),
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn recorder<T: Send + 'static>() -> (Arc<Mutex<Vec<T>>>, impl Fn(T) + Send + Sync + 'static) {
        let values = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let values = Arc::clone(&values);
            move |value| values.lock().push(value)
        };
        (values, sink)
    }

    #[test]
    fn dropping_cancellable_unsubscribes() {
        let subject = PassthroughSubject::new();
        let (values, sink) = recorder();
        let cancellable = subject.erase().sink(sink);
        subject.send(1);
        drop(cancellable);
        subject.send(2);
        assert_eq!(*values.lock(), vec![1]);
        assert_eq!(subject.subscriber_count(), 0);
    }

    #[test]
    fn completion_is_delivered_once_and_late_subscribers_finish_immediately() {
        let subject = PassthroughSubject::<i32>::new();
        let (completions, on_completion) = recorder();
        let _first = subject
            .erase()
            .sink_with_completion(on_completion, |_| {});
        subject.send_completion(Completion::Finished);
        subject.send_completion(Completion::Finished);
        subject.send(3);
        assert_eq!(*completions.lock(), vec![Completion::Finished]);

        let (late, on_late) = recorder();
        let _second = subject.erase().sink_with_completion(on_late, |_| {});
        assert_eq!(*late.lock(), vec![Completion::Finished]);
    }

    #[test]
    fn operators_compose() {
        let subject = PassthroughSubject::new();
        let (values, sink) = recorder();
        let _cancellable = subject
            .erase()
            .map(|value: i32| value / 2)
            .remove_duplicates()
            .filter_map(|value| (value != 0).then_some(value))
            .sink(sink);
        for value in [0, 1, 2, 3, 6, 7, 2] {
            subject.send(value);
        }
        assert_eq!(*values.lock(), vec![1, 3, 1]);
    }

    #[test]
    fn subscriber_may_send_reentrantly() {
        let subject = PassthroughSubject::new();
        let (values, sink) = recorder();
        let _log = subject.erase().sink(sink);
        let _echo = subject.erase().sink({
            let subject = subject.clone();
            move |value: i32| {
                if value < 2 {
                    subject.send(value + 1);
                }
            }
        });
        subject.send(0);
        assert_eq!(*values.lock(), vec![0, 1, 2]);
    }
}
