mod app;
mod conf;
mod confview;
mod dispatch;
mod error;
mod section;
mod toolkit;
mod types;
mod ui;
mod wireguard;

pub use app::App;
pub use conf::{Bytes, Config, Endpoint, HandshakeTime, Interface, KEY_LEN, Key, Peer};
pub use confview::{ConfView, ReconcileStats};
pub use dispatch::{Dispatcher, Reconcile, ViewMessage, channel, intercept};
pub use error::Error;
pub use section::{FieldRow, INTERFACE_FIELDS, InterfaceSection, PEER_FIELDS, PeerSection};
pub use toolkit::{GridRow, GroupLayout, TermToolkit, Toolkit, WidgetId, WidgetKind};
pub use types::{AppEvent, Message};
pub use ui::config_lines;
pub use wireguard::{
    CONFIG_DIR, Runtime, config_path, discover_tunnels, load_config, merge_runtime, parse_conf,
    parse_dump,
};
