use std::{
    cell::RefCell,
    path::PathBuf,
    rc::Rc,
    sync::{Arc, mpsc::Receiver},
    thread::{self, JoinHandle},
    time::Duration,
};

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::{
    Frame,
    layout::{Constraint, Layout, Rect},
    style::{Color, Stylize},
    text::{Line, Text},
    widgets::Paragraph,
};
use tracing::debug;

use crate::{
    confview::ConfView,
    dispatch::{self, Dispatcher, ViewMessage},
    error::Error,
    toolkit::TermToolkit,
    types::{AppEvent, Message},
    ui::{bordered_block, config_lines, render_help},
    wireguard::load_config,
};

/// Owns the view and runs its message loop. Must stay on the thread that
/// created it.
pub struct App {
    view: Rc<RefCell<ConfView<TermToolkit>>>,
    dispatcher: Dispatcher<AppEvent>,
    mailbox: Receiver<ViewMessage<AppEvent>>,
    config_dir: PathBuf,
    tunnel: String,
    scroll: u16,
    max_scroll: u16,
    show_help: bool,
    message: Option<Message>,
    pub should_quit: bool,
}

impl App {
    pub fn new(config_dir: PathBuf, tunnel: String) -> Result<Self, Error> {
        let view = Rc::new(RefCell::new(ConfView::new(TermToolkit::new())?));
        let (tx, mailbox) = dispatch::channel();
        let dispatcher = Dispatcher::attach(&view, tx);
        Ok(Self {
            view,
            dispatcher,
            mailbox,
            config_dir,
            tunnel,
            scroll: 0,
            max_scroll: 0,
            show_help: false,
            message: None,
            should_quit: false,
        })
    }

    pub fn dispatcher(&self) -> Dispatcher<AppEvent> {
        self.dispatcher.clone()
    }

    pub fn view(&self) -> &Rc<RefCell<ConfView<TermToolkit>>> {
        &self.view
    }

    pub fn message(&self) -> Option<&Message> {
        self.message.as_ref()
    }

    pub fn set_message(&mut self, message: Message) {
        self.message = Some(message);
    }

    /// Reloads on this thread, so the view updates before this returns.
    pub fn refresh(&mut self) {
        match load_config(&self.config_dir, &self.tunnel) {
            Ok(config) => {
                self.dispatcher.submit(Arc::new(config));
                self.message = Some(Message::Success(format!("Reloaded '{}'", self.tunnel)));
            }
            Err(e) => self.message = Some(Message::Error(e.to_string())),
        }
    }

    /// Reloads the tunnel every `interval` on a background thread.
    pub fn spawn_poller(&self, interval: Duration) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        let (dir, name) = (self.config_dir.clone(), self.tunnel.clone());
        thread::spawn(move || {
            let mut failing = false;
            loop {
                thread::sleep(interval);
                match load_config(&dir, &name) {
                    Ok(config) => {
                        if failing {
                            dispatcher.post(AppEvent::Status(Message::Info(format!(
                                "'{name}' readable again"
                            ))));
                        }
                        failing = false;
                        dispatcher.submit(Arc::new(config));
                    }
                    Err(e) if !failing => {
                        failing = true;
                        dispatcher.post(AppEvent::Status(Message::Error(e.to_string())));
                    }
                    Err(e) => debug!(error = %e, "reload still failing"),
                }
            }
        })
    }

    /// Forwards terminal input into the message loop.
    pub fn spawn_input_reader(&self) -> JoinHandle<()> {
        let dispatcher = self.dispatcher.clone();
        thread::spawn(move || {
            loop {
                match event::read() {
                    Ok(ev) => dispatcher.post(AppEvent::Input(ev)),
                    Err(e) => {
                        dispatcher.post(AppEvent::Status(Message::Error(format!("input: {e}"))));
                        break;
                    }
                }
            }
        })
    }

    /// Waits up to `timeout` for a message, then handles everything queued.
    pub fn pump(&mut self, timeout: Duration) {
        let Ok(first) = self.mailbox.recv_timeout(timeout) else {
            return;
        };
        let pending: Vec<_> = std::iter::once(first).chain(self.mailbox.try_iter()).collect();
        for msg in pending {
            self.handle_message(msg);
        }
    }

    pub fn handle_message(&mut self, msg: ViewMessage<AppEvent>) {
        let unhandled = dispatch::intercept(&mut *self.view.borrow_mut(), msg);
        if let Some(event) = unhandled {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::Status(message) => self.message = Some(message),
            AppEvent::Input(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                self.handle_key(key)
            }
            AppEvent::Input(_) => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        self.message = None;

        if self.show_help {
            self.show_help = false;
            return;
        }

        let mut view = self.view.borrow_mut();
        let tk = view.toolkit_mut();
        match (key.code, key.modifiers) {
            (KeyCode::Char('q') | KeyCode::Esc, _) => self.should_quit = true,
            (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => self.should_quit = true,
            (KeyCode::Char('a'), m) if m.contains(KeyModifiers::CONTROL) => tk.select_all(),
            (KeyCode::Left, m) if m.contains(KeyModifiers::SHIFT) => tk.extend_selection(-1),
            (KeyCode::Right, m) if m.contains(KeyModifiers::SHIFT) => tk.extend_selection(1),
            (KeyCode::Tab, _) => tk.focus_next(true),
            (KeyCode::BackTab, _) => tk.focus_next(false),
            (KeyCode::Char('j') | KeyCode::Down, _) => {
                self.scroll = self.scroll.saturating_add(1).min(self.max_scroll)
            }
            (KeyCode::Char('k') | KeyCode::Up, _) => self.scroll = self.scroll.saturating_sub(1),
            (KeyCode::Char('g'), _) => self.scroll = 0,
            (KeyCode::Char('G'), _) => self.scroll = self.max_scroll,
            (KeyCode::Char('r'), _) => {
                // The reload reconciles through the dispatcher, which needs the view.
                drop(view);
                self.refresh();
            }
            (KeyCode::Char('?'), _) => self.show_help = true,
            _ => {}
        }
    }

    pub fn draw(&mut self, frame: &mut Frame) {
        let main = Layout::vertical([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(frame.area());

        self.render_header(frame, main[0]);
        self.render_config(frame, main[1]);
        self.render_status(frame, main[2]);

        if self.show_help {
            render_help(frame);
        }
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let title = Line::from(vec![
            " WireGuard ".fg(Color::Cyan).bold(),
            self.tunnel.clone().fg(Color::White),
        ]);
        f.render_widget(Paragraph::new(title).block(bordered_block(None)), area);
    }

    fn render_config(&mut self, f: &mut Frame, area: Rect) {
        let lines = config_lines(self.view.borrow().toolkit());
        let height = area.height.saturating_sub(2) as usize;
        self.max_scroll = u16::try_from(lines.len().saturating_sub(height)).unwrap_or(u16::MAX);
        self.scroll = self.scroll.min(self.max_scroll);

        f.render_widget(
            Paragraph::new(Text::from(lines))
                .block(bordered_block(Some(" Configuration ")))
                .scroll((self.scroll, 0)),
            area,
        );
    }

    fn render_status(&self, f: &mut Frame, area: Rect) {
        let content = match &self.message {
            Some(msg) => Line::styled(format!(" {}", msg.text()), msg.style()),
            None => Line::from(vec![
                " j/k".fg(Color::Yellow),
                " scroll  ".into(),
                "Tab".fg(Color::Yellow),
                " focus  ".into(),
                "r".fg(Color::Yellow),
                " reload  ".into(),
                "?".fg(Color::Yellow),
                " help  ".into(),
                "q".fg(Color::Yellow),
                " quit".into(),
            ]),
        };
        f.render_widget(Paragraph::new(content).block(bordered_block(None)), area);
    }
}
