use std::sync::Arc;
use std::time::Duration;

use futures_util::stream;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::task;
use tokio::time::timeout;

use super::event::Event;
use super::sink::{ChannelSink, EventSink, StdOutSink};

/// Receives events from producers and broadcasts them to multiple sinks.
///
/// Producers hold a cloned [`flume::Sender`] (see
/// [`get_sender`](Self::get_sender)); a background listener task drains the
/// channel and fans each event out to every registered sink. The listener
/// must be started explicitly with [`listen_for_events`](Self::listen_for_events).
pub struct EventBus {
    sinks: Arc<Mutex<Vec<Box<dyn EventSink>>>>,
    event_channel: (flume::Sender<Event>, flume::Receiver<Event>),
    listener: Arc<Mutex<Option<ListenerState>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_sink(StdOutSink::default())
    }
}

impl EventBus {
    /// Create an EventBus with a single sink.
    pub fn with_sink<T>(sink: T) -> Self
    where
        T: EventSink + 'static,
    {
        Self {
            sinks: Arc::new(Mutex::new(vec![Box::new(sink)])),
            event_channel: flume::unbounded(),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Create an EventBus with multiple sinks.
    pub fn with_sinks(sinks: Vec<Box<dyn EventSink>>) -> Self {
        Self {
            sinks: Arc::new(Mutex::new(sinks)),
            event_channel: flume::unbounded(),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    /// Dynamically add a sink.
    pub fn add_sink<T: EventSink + 'static>(&self, sink: T) {
        self.sinks.lock().push(Box::new(sink));
    }

    /// Get a clone of the sender side so producers can emit events.
    pub fn get_sender(&self) -> flume::Sender<Event> {
        self.event_channel.0.clone()
    }

    /// Attach a fresh channel sink and return its consuming half.
    ///
    /// Every event that reaches the bus after this call is also forwarded to
    /// the returned [`EventStream`], which is how live run monitors observe
    /// an execution as it progresses.
    ///
    /// # Example
    /// ```no_run
    /// use flowloom::event_bus::EventBus;
    ///
    /// # async fn demo() {
    /// let bus = EventBus::default();
    /// bus.listen_for_events();
    ///
    /// let mut stream = bus.subscribe();
    /// while let Some(event) = stream.recv().await {
    ///     println!("{event}");
    /// }
    /// # }
    /// ```
    pub fn subscribe(&self) -> EventStream {
        let (tx, rx) = mpsc::unbounded_channel();
        self.add_sink(ChannelSink::new(tx));
        EventStream { rx }
    }

    /// Spawn a background task that listens for events and broadcasts to all
    /// sinks. Idempotent: calling multiple times has no effect.
    pub fn listen_for_events(&self) {
        let mut guard = self.listener.lock();
        if guard.is_some() {
            return;
        }

        let receiver = self.event_channel.1.clone();
        let sinks = self.sinks.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();

        let handle = task::spawn(async move {
            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    recv = receiver.recv_async() => match recv {
                        Err(_) => break,
                        Ok(event) => {
                            let mut sinks_guard = sinks.lock();
                            for sink in sinks_guard.iter_mut() {
                                if let Err(err) = sink.handle(&event) {
                                    tracing::warn!(error = %err, "event sink failed");
                                }
                            }
                        }
                    }
                }
            }
        });

        *guard = Some(ListenerState {
            shutdown_tx,
            handle,
        });
    }

    /// Stop the background listener task, draining nothing further.
    pub async fn stop_listener(&self) {
        let state = { self.listener.lock().take() };
        if let Some(state) = state {
            let _ = state.shutdown_tx.send(());
            let _ = state.handle.await;
        }
    }
}

impl Drop for EventBus {
    fn drop(&mut self) {
        if let Some(state) = self.listener.lock().take() {
            let _ = state.shutdown_tx.send(());
            state.handle.abort();
        }
    }
}

struct ListenerState {
    shutdown_tx: oneshot::Sender<()>,
    handle: task::JoinHandle<()>,
}

/// Consuming half of a [`EventBus::subscribe`] subscription.
pub struct EventStream {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl EventStream {
    /// Wait for the next event. Returns `None` once the bus is gone.
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Non-blocking poll for a buffered event.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event, giving up after `duration`.
    pub async fn next_timeout(&mut self, duration: Duration) -> Option<Event> {
        timeout(duration, self.recv()).await.ok().flatten()
    }

    /// Adapt the stream to a `futures_util::Stream` for combinator use.
    pub fn into_async_stream(self) -> impl futures_util::stream::Stream<Item = Event> {
        stream::unfold(self, |mut events| async move {
            events.recv().await.map(|event| (event, events))
        })
    }
}
