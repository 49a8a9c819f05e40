//! Routes configuration updates onto the thread that owns the view.
//!
//! A [`Dispatcher`] remembers the thread it was attached on. Submitting from
//! that thread reconciles right away; submitting from any other thread posts
//! a [`ViewMessage::CrossThreadUpdate`] to the owning thread's queue and
//! returns without waiting. The owning thread's loop passes every message
//! through [`intercept`], which applies updates and hands the rest back.
//!
//! Posting is fire-and-forget. If the owning loop has stopped, the update is
//! dropped.

use std::{
    cell::RefCell,
    collections::HashMap,
    rc::{Rc, Weak},
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, Sender},
    },
    thread::{self, ThreadId},
};

use tracing::{debug, trace};

use crate::conf::Config;

/// Something that can be brought in line with a configuration snapshot.
pub trait Reconcile {
    fn reconcile(&mut self, config: &Config);
}

#[derive(Debug)]
pub enum ViewMessage<E> {
    CrossThreadUpdate(Arc<Config>),
    Other(E),
}

type LocalView = Weak<RefCell<dyn Reconcile>>;

thread_local! {
    static LOCAL_VIEWS: RefCell<HashMap<u64, LocalView>> = RefCell::new(HashMap::new());
}

static NEXT_VIEW: AtomicU64 = AtomicU64::new(1);

pub fn channel<E>() -> (Sender<ViewMessage<E>>, Receiver<ViewMessage<E>>) {
    mpsc::channel()
}

pub struct Dispatcher<E> {
    view: u64,
    owner: ThreadId,
    tx: Sender<ViewMessage<E>>,
}

impl<E> Clone for Dispatcher<E> {
    fn clone(&self) -> Self {
        Self {
            view: self.view,
            owner: self.owner,
            tx: self.tx.clone(),
        }
    }
}

impl<E> Dispatcher<E> {
    /// Registers `view` with the current thread, which becomes its owner.
    /// `tx` must feed the message loop running on this thread.
    pub fn attach<V: Reconcile + 'static>(
        view: &Rc<RefCell<V>>,
        tx: Sender<ViewMessage<E>>,
    ) -> Self {
        let id = NEXT_VIEW.fetch_add(1, Ordering::Relaxed);
        let local: Rc<RefCell<dyn Reconcile>> = view.clone();
        LOCAL_VIEWS.with_borrow_mut(|views| {
            views.retain(|_, v| v.strong_count() > 0);
            views.insert(id, Rc::downgrade(&local));
        });
        Self {
            view: id,
            owner: thread::current().id(),
            tx,
        }
    }

    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    pub fn on_owner_thread(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Applies `config` now when called on the owning thread, otherwise
    /// queues it for the owning thread and returns immediately.
    pub fn submit(&self, config: Arc<Config>) {
        if self.on_owner_thread() {
            let view =
                LOCAL_VIEWS.with_borrow(|views| views.get(&self.view).and_then(Weak::upgrade));
            let Some(view) = view else {
                debug!("view dropped, discarding configuration");
                return;
            };
            match view.try_borrow_mut() {
                Ok(mut view) => {
                    view.reconcile(&config);
                    return;
                }
                // Called from inside a handler that holds the view.
                Err(_) => trace!("view busy, queueing configuration"),
            }
        }
        self.send(ViewMessage::CrossThreadUpdate(config));
    }

    /// Posts an ordinary event to the owning thread's loop.
    pub fn post(&self, event: E) {
        self.send(ViewMessage::Other(event));
    }

    fn send(&self, msg: ViewMessage<E>) {
        if self.tx.send(msg).is_err() {
            debug!("message loop stopped, dropping message");
        }
    }
}

/// Applies cross-thread updates to `view`; anything else is returned for the
/// next handler in the chain.
pub fn intercept<V: Reconcile + ?Sized, E>(view: &mut V, msg: ViewMessage<E>) -> Option<E> {
    match msg {
        ViewMessage::CrossThreadUpdate(config) => {
            view.reconcile(&config);
            None
        }
        ViewMessage::Other(event) => Some(event),
    }
}
