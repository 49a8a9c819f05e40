#![allow(clippy::unwrap_used)]

//! End-to-end checks of the configuration view: key-based matching,
//! batched layout suspension, and thread-affinity dispatch.

use std::{
    cell::RefCell,
    rc::Rc,
    sync::{Arc, Mutex},
    thread::{self, ThreadId},
};

use pretty_assertions::assert_eq;
use wg_confview::{
    Bytes, ConfView, Config, Dispatcher, Error, FieldRow, Interface, Key, Peer, Reconcile,
    TermToolkit, Toolkit, WidgetId, channel, intercept,
};

/// Delegates to [`TermToolkit`] and records suspend/resume and title calls.
/// With `line_edits` set, creating a line edit fails once the budget runs out.
#[derive(Default)]
struct Recording {
    inner: TermToolkit,
    suspend_calls: Vec<bool>,
    titles_set: usize,
    line_edits: Option<usize>,
}

impl Recording {
    fn with_line_edits(budget: usize) -> Self {
        Self {
            line_edits: Some(budget),
            ..Default::default()
        }
    }
}

impl Toolkit for Recording {
    fn root(&self) -> WidgetId {
        self.inner.root()
    }
    fn new_group(&mut self, parent: WidgetId) -> Result<WidgetId, Error> {
        self.inner.new_group(parent)
    }
    fn new_label(&mut self, parent: WidgetId) -> Result<WidgetId, Error> {
        self.inner.new_label(parent)
    }
    fn new_line_edit(&mut self, parent: WidgetId) -> Result<WidgetId, Error> {
        if let Some(left) = self.line_edits.as_mut() {
            if *left == 0 {
                return Err(Error::Io(std::io::Error::other("widget limit reached")));
            }
            *left -= 1;
        }
        self.inner.new_line_edit(parent)
    }
    fn text(&self, id: WidgetId) -> &str {
        self.inner.text(id)
    }
    fn set_text(&mut self, id: WidgetId, text: &str) {
        self.inner.set_text(id, text)
    }
    fn title(&self, id: WidgetId) -> &str {
        self.inner.title(id)
    }
    fn set_title(&mut self, id: WidgetId, title: &str) {
        self.titles_set += 1;
        self.inner.set_title(id, title)
    }
    fn is_visible(&self, id: WidgetId) -> bool {
        self.inner.is_visible(id)
    }
    fn set_visible(&mut self, id: WidgetId, visible: bool) {
        self.inner.set_visible(id, visible)
    }
    fn text_selection(&self, id: WidgetId) -> (usize, usize) {
        self.inner.text_selection(id)
    }
    fn set_text_selection(&mut self, id: WidgetId, start: usize, end: usize) {
        self.inner.set_text_selection(id, start, end)
    }
    fn set_grid_cell(&mut self, id: WidgetId, row: usize, column: usize) {
        self.inner.set_grid_cell(id, row, column)
    }
    fn remove(&mut self, id: WidgetId) {
        self.inner.remove(id)
    }
    fn set_suspended(&mut self, suspended: bool) {
        self.suspend_calls.push(suspended);
        self.inner.set_suspended(suspended)
    }
}

fn key(name: char) -> Key {
    Key::from_bytes([name as u8; 32])
}

fn peer(name: char) -> Peer {
    Peer {
        public_key: key(name),
        allowed_ips: vec![format!("10.0.0.{}/32", name as u8).parse().unwrap()],
        endpoint: Some(format!("{}.example.com:51820", name.to_ascii_lowercase()).parse().unwrap()),
        ..Default::default()
    }
}

fn config(peers: &str) -> Config {
    Config {
        name: "wg0".into(),
        interface: Interface {
            private_key: key('k'),
            listen_port: 51820,
            ..Default::default()
        },
        peers: peers.chars().map(peer).collect(),
    }
}

fn texts<T: Toolkit>(tk: &T, rows: &[FieldRow]) -> Vec<(bool, String)> {
    rows.iter()
        .map(|r| (r.is_visible(tk), r.text(tk).to_string()))
        .collect()
}

fn snapshot(view: &ConfView<Recording>, keys: &str) -> Vec<Vec<(bool, String)>> {
    let mut out = vec![texts(view.toolkit(), &view.interface().rows())];
    for k in keys.chars() {
        out.push(texts(view.toolkit(), &view.peer(&key(k)).unwrap().rows()));
    }
    out
}

#[test]
fn replacing_a_peer_updates_creates_and_removes_in_one_batch() {
    let mut view = ConfView::new(Recording::default()).unwrap();
    view.set_configuration(&config("ABC"));

    let b_group = view.peer(&key('B')).unwrap().group();
    let c_rows = view.peer(&key('C')).unwrap().rows();
    let a_group = view.peer(&key('A')).unwrap().group();
    view.toolkit_mut().suspend_calls.clear();

    let stats = view.set_configuration(&config("BCD"));

    assert_eq!((stats.created, stats.updated, stats.removed), (1, 2, 1));
    assert_eq!(view.toolkit().suspend_calls, [true, false]);
    assert!(view.peer(&key('A')).is_none());
    assert!(!view.toolkit().inner.contains(a_group));
    assert_eq!(view.peer(&key('B')).unwrap().group(), b_group);
    assert_eq!(view.peer(&key('C')).unwrap().rows(), c_rows);
    assert!(view.peer(&key('D')).is_some());
    assert_eq!(view.peer_count(), 3);
}

#[test]
fn many_changes_still_suspend_once() {
    let mut view = ConfView::new(Recording::default()).unwrap();
    view.set_configuration(&config("ABCDEF"));
    view.toolkit_mut().suspend_calls.clear();
    let passes = view.toolkit().inner.layout_passes();

    view.set_configuration(&config("GHIJ"));

    assert_eq!(view.toolkit().suspend_calls, [true, false]);
    assert_eq!(view.toolkit().inner.layout_passes(), passes + 1);
}

#[test]
fn reapplying_the_same_snapshot_is_idempotent() {
    let mut view = ConfView::new(Recording::default()).unwrap();
    let cfg = config("AB");
    view.set_configuration(&cfg);
    let before = snapshot(&view, "AB");
    let widgets = view.toolkit().inner.widget_count();
    view.toolkit_mut().suspend_calls.clear();

    let stats = view.set_configuration(&cfg);

    assert_eq!((stats.created, stats.removed), (0, 0));
    assert!(view.toolkit().suspend_calls.is_empty());
    assert_eq!(view.toolkit().inner.widget_count(), widgets);
    assert_eq!(snapshot(&view, "AB"), before);
}

#[test]
fn peer_order_does_not_matter() {
    let mut view = ConfView::new(Recording::default()).unwrap();
    view.set_configuration(&config("AB"));
    let a_group = view.peer(&key('A')).unwrap().group();
    view.toolkit_mut().suspend_calls.clear();

    let stats = view.set_configuration(&config("BA"));

    assert_eq!(stats.updated, 2);
    assert!(view.toolkit().suspend_calls.is_empty());
    assert_eq!(view.peer(&key('A')).unwrap().group(), a_group);
}

#[test]
fn emptied_snapshot_removes_every_peer() {
    let mut view = ConfView::new(Recording::default()).unwrap();
    view.set_configuration(&config("ABC"));
    view.set_configuration(&config(""));

    assert_eq!(view.peer_count(), 0);
    // only the interface group remains under the root
    let root = view.toolkit().root();
    assert_eq!(view.toolkit().inner.children(root).len(), 1);
}

#[test]
fn focused_selection_survives_live_updates() {
    let mut view = ConfView::new(Recording::default()).unwrap();
    let mut cfg = config("A");
    cfg.peers[0].rx_bytes = Bytes(10);
    view.set_configuration(&cfg);

    let transfer = view.peer(&key('A')).unwrap().rows()[6];
    view.toolkit_mut().set_text_selection(transfer.value, 0, 4);

    cfg.peers[0].rx_bytes = Bytes(20);
    view.set_configuration(&cfg);

    assert_eq!(transfer.text(view.toolkit()), "20 B received, 0 B sent");
    assert_eq!(view.toolkit().text_selection(transfer.value), (0, 4));
}

#[test]
fn title_is_only_set_when_the_name_changes() {
    let mut view = ConfView::new(Recording::default()).unwrap();
    let mut cfg = config("A");
    view.set_configuration(&cfg);
    view.set_configuration(&cfg);
    // one for the new peer group, one for the interface title
    assert_eq!(view.toolkit().titles_set, 2);
    assert_eq!(view.title(), "Interface: wg0");

    cfg.name = "wg1".into();
    view.set_configuration(&cfg);
    assert_eq!(view.toolkit().titles_set, 3);
    assert_eq!(view.title(), "Interface: wg1");
}

#[test]
fn view_construction_fails_when_interface_rows_cannot_be_built() {
    let err = ConfView::new(Recording::with_line_edits(2));
    assert!(matches!(err, Err(Error::Io(_))));
}

#[test]
fn peer_that_cannot_be_built_is_skipped_and_retried() {
    // five interface rows, seven for peer A, then three into peer B
    let mut view = ConfView::new(Recording::with_line_edits(15)).unwrap();
    let root = view.toolkit().root();
    let passes = view.toolkit().inner.layout_passes();
    view.toolkit_mut().suspend_calls.clear();

    let stats = view.set_configuration(&config("AB"));

    assert_eq!((stats.created, stats.removed), (1, 0));
    assert_eq!(view.toolkit().suspend_calls, [true, false]);
    assert_eq!(view.toolkit().inner.layout_passes(), passes + 1);
    assert!(!view.toolkit().inner.is_suspended());
    assert!(view.peer(&key('A')).is_some());
    assert!(view.peer(&key('B')).is_none());
    // the half-built group for B is gone
    assert_eq!(view.toolkit().inner.children(root).len(), 2);
    // root, two groups, and a label plus value per row
    assert_eq!(view.toolkit().inner.widget_count(), 1 + 2 + 2 * 5 + 2 * 7);

    view.toolkit_mut().line_edits = None;
    let stats = view.set_configuration(&config("AB"));

    assert_eq!((stats.created, stats.updated), (1, 1));
    assert!(view.peer(&key('B')).is_some());
    assert_eq!(view.peer_count(), 2);
}

/// Records the thread each reconcile ran on, in front of a real view.
struct Traced {
    view: ConfView<TermToolkit>,
    threads: Arc<Mutex<Vec<ThreadId>>>,
}

impl Reconcile for Traced {
    fn reconcile(&mut self, config: &Config) {
        self.threads.lock().unwrap().push(thread::current().id());
        self.view.set_configuration(config);
    }
}

#[test]
fn cross_thread_submit_applies_on_owner_only() {
    let threads = Arc::new(Mutex::new(Vec::new()));
    let traced = Rc::new(RefCell::new(Traced {
        view: ConfView::new(TermToolkit::new()).unwrap(),
        threads: threads.clone(),
    }));
    let (tx, rx) = channel::<()>();
    let dispatcher = Dispatcher::attach(&traced, tx);
    let owner = thread::current().id();
    assert_eq!(dispatcher.owner(), owner);

    let remote = dispatcher.clone();
    thread::spawn(move || {
        remote.submit(Arc::new(config("AB")));
        remote.submit(Arc::new(config("B")));
    })
    .join()
    .unwrap();
    assert!(threads.lock().unwrap().is_empty());

    for msg in rx.try_iter() {
        assert_eq!(intercept(&mut *traced.borrow_mut(), msg), None);
    }

    assert_eq!(*threads.lock().unwrap(), [owner, owner]);
    let traced = traced.borrow();
    assert_eq!(traced.view.peer_count(), 1);
    assert!(traced.view.peer(&key('B')).is_some());
}

#[test]
fn same_thread_submit_applies_before_returning() {
    let threads = Arc::new(Mutex::new(Vec::new()));
    let traced = Rc::new(RefCell::new(Traced {
        view: ConfView::new(TermToolkit::new()).unwrap(),
        threads: threads.clone(),
    }));
    let (tx, rx) = channel::<()>();
    let dispatcher = Dispatcher::attach(&traced, tx);

    dispatcher.submit(Arc::new(config("A")));

    assert_eq!(threads.lock().unwrap().len(), 1);
    assert_eq!(traced.borrow().view.peer_count(), 1);
    assert!(rx.try_recv().is_err());
}
