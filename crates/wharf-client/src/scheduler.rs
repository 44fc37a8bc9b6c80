//! Single-consumer event loop shared by both routers
//!
//! A router owns one [`Scheduler`] and is its only consumer. Commands come
//! from router handles through an unbounded channel. Suspended cluster calls
//! and timers are futures owned by the scheduler that resolve to a command,
//! so their results re-enter the router on the same task as every other
//! state change.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::{mpsc, watch};

use crate::routing::RoutingTable;

pub(crate) enum Wake<C> {
    Command(C),
    /// The cluster published a new routing table
    RoutingTable(Arc<RoutingTable>),
}

pub(crate) struct Scheduler<C> {
    commands: mpsc::UnboundedReceiver<C>,
    closed: bool,
    suspended: FuturesUnordered<BoxFuture<'static, C>>,
    timers: FuturesUnordered<BoxFuture<'static, C>>,
    routing: Option<watch::Receiver<Arc<RoutingTable>>>,
}

impl<C: Send + 'static> Scheduler<C> {
    pub(crate) fn new(
        commands: mpsc::UnboundedReceiver<C>,
        routing: Option<watch::Receiver<Arc<RoutingTable>>>,
    ) -> Self {
        Self {
            commands,
            closed: false,
            suspended: FuturesUnordered::new(),
            timers: FuturesUnordered::new(),
            routing,
        }
    }

    /// Run `future` off the router; its output comes back as a command
    pub(crate) fn suspend<F>(&mut self, future: F)
    where
        F: Future<Output = C> + Send + 'static,
    {
        self.suspended.push(future.boxed());
    }

    /// Deliver `command` after `delay`
    pub(crate) fn schedule(&mut self, delay: Duration, command: C) {
        self.timers.push(
            async move {
                tokio::time::sleep(delay).await;
                command
            }
            .boxed(),
        );
    }

    pub(crate) fn suspended_len(&self) -> usize {
        self.suspended.len()
    }

    pub(crate) fn timers_len(&self) -> usize {
        self.timers.len()
    }

    /// Next unit of work
    ///
    /// Returns `None` once every handle is dropped and no suspended call is
    /// outstanding. Pending timers do not keep a closed router alive.
    pub(crate) async fn next(&mut self) -> Option<Wake<C>> {
        loop {
            if self.closed && self.suspended.is_empty() {
                return None;
            }
            let open = !self.closed;
            tokio::select! {
                biased;
                Some(command) = self.suspended.next(), if !self.suspended.is_empty() => {
                    return Some(Wake::Command(command));
                }
                command = self.commands.recv(), if open => match command {
                    Some(command) => return Some(Wake::Command(command)),
                    None => self.closed = true,
                },
                changed = routing_changed(&mut self.routing) => match changed {
                    Some(table) => return Some(Wake::RoutingTable(table)),
                    None => self.routing = None,
                },
                Some(command) = self.timers.next(), if !self.timers.is_empty() => {
                    return Some(Wake::Command(command));
                }
            }
        }
    }

    /// Next unit of work that is ready without waiting on a timer
    ///
    /// Queued commands and published tables are taken first, then suspended
    /// cluster calls are awaited. Timers are only taken when already due.
    /// Returns `None` when nothing else can make progress.
    pub(crate) async fn next_ready(&mut self) -> Option<Wake<C>> {
        if let Some(rx) = self.routing.as_mut() {
            if rx.has_changed().unwrap_or(false) {
                let table = rx.borrow_and_update().clone();
                return Some(Wake::RoutingTable(table));
            }
        }
        if let Ok(command) = self.commands.try_recv() {
            return Some(Wake::Command(command));
        }
        if let Some(command) = self.suspended.next().await {
            return Some(Wake::Command(command));
        }
        match self.timers.next().now_or_never() {
            Some(Some(command)) => Some(Wake::Command(command)),
            _ => None,
        }
    }
}

async fn routing_changed(
    routing: &mut Option<watch::Receiver<Arc<RoutingTable>>>,
) -> Option<Arc<RoutingTable>> {
    match routing {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => std::future::pending().await,
    }
}
