//! Event notifier
//!
//! Drains the desk's event slots and hands each event to a sink. Delivery is
//! best effort: a failing sink is logged and the next event is processed as
//! usual, nothing flows back into motion control.

use crate::system::event::{DeskEvent, EventChannel};

/// Destination for desk events
#[allow(async_fn_in_trait)]
pub trait EventSink {
    type Error;

    async fn deliver(&mut self, event: DeskEvent) -> Result<(), Self::Error>;
}

/// Sink that only writes events to the log
#[derive(Debug, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    type Error = core::convert::Infallible;

    async fn deliver(&mut self, event: DeskEvent) -> Result<(), Self::Error> {
        info!("event {:?} -> {}", event, event.path());
        Ok(())
    }
}

/// Waits for one event and delivers it, returns whether delivery succeeded
pub async fn notify_once<S: EventSink>(events: &EventChannel, sink: &mut S) -> bool {
    let event = events.wait().await;
    match sink.deliver(event).await {
        Ok(()) => true,
        Err(_) => {
            warn!("could not deliver {}", event.path());
            false
        }
    }
}

/// Forwards events forever
pub async fn run<S: EventSink>(events: &EventChannel, sink: &mut S) -> ! {
    info!("notifier started");
    loop {
        notify_once(events, sink).await;
    }
}
