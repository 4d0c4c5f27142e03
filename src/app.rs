use crate::cli::{Cli, Commands, CopyArgs, ListArgs, RunArgs};
use crate::clipboard::SystemClipboard;
use crate::config::{Config, ConfigStore};
use crate::entry::EntryId;
use crate::indicator::CopiedIndicator;
use crate::logging;
use crate::monitor::{self, MonitorEvent, MonitorHandle};
use crate::storage::{HistoryFile, HistoryLock};
use crate::store::ClipboardStore;
use crate::tray::{MenuLayout, TrayAction, TrayController, entry_label};
use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossbeam_channel::{Receiver, unbounded};
use std::time::{Duration, Instant};
use tao::event::{Event, StartCause};
use tao::event_loop::{ControlFlow, EventLoop};
use tray_icon::menu::MenuEvent;

const TICK: Duration = Duration::from_millis(50);

pub fn run() -> Result<()> {
    logging::init();
    let cli = Cli::parse();
    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run_daemon(args),
        Commands::List(args) => run_list(args),
        Commands::Copy(args) => run_copy(args),
        Commands::Clear => run_clear(),
    }
}

fn load_store(file: HistoryFile, config: &Config) -> ClipboardStore {
    let mut store = ClipboardStore::new(file, Box::new(SystemClipboard::new()), config.history_limit);
    store.load_history();
    store
}

/// A store that only this process may change. Fails while the tray is
/// running, since its in-memory history would overwrite ours.
fn exclusive_store(config: &Config) -> Result<(HistoryLock, ClipboardStore)> {
    let file = HistoryFile::new(config.history_path()?);
    let lock = file
        .lock()
        .context("quit the running clipshelf or use its menu instead")?;
    Ok((lock, load_store(file, config)))
}

/// Writes the entry back and shows "Copied!" only once the write went through.
fn copy_and_mark(
    store: &mut ClipboardStore,
    indicator: &mut CopiedIndicator,
    id: EntryId,
    now: Instant,
) -> Result<()> {
    store.copy_entry(id)?;
    indicator.mark(id, now);
    Ok(())
}

/// Reads the file without a lock or a store, so it never changes anything.
fn run_list(args: ListArgs) -> Result<()> {
    let config = ConfigStore::new()?.load()?;
    let entries = HistoryFile::new(config.history_path()?).load()?;
    if entries.is_empty() {
        println!("history is empty");
        return Ok(());
    }
    let shown = args.limit.unwrap_or(entries.len());
    for (index, entry) in entries.iter().take(shown).enumerate() {
        println!(
            "{index:>3}  {:<5} {}",
            entry.data_type(),
            entry_label(entry, false, config.preview_chars)
        );
    }
    Ok(())
}

fn run_copy(args: CopyArgs) -> Result<()> {
    let config = ConfigStore::new()?.load()?;
    let (_lock, mut store) = exclusive_store(&config)?;
    let entry = store
        .get_index(args.index)
        .cloned()
        .with_context(|| format!("no history entry at index {} ({} entries)", args.index, store.len()))?;
    store.copy_to_clipboard(&entry)?;
    println!("Copied!");
    Ok(())
}

fn run_clear() -> Result<()> {
    let config = ConfigStore::new()?.load()?;
    let (_lock, mut store) = exclusive_store(&config)?;
    store.clear_history()?;
    println!("history cleared");
    Ok(())
}

fn run_daemon(args: RunArgs) -> Result<()> {
    tracing::info!("starting clipboard history");
    let config_store = ConfigStore::new()?;
    let mut config = config_store.load()?;
    if args.history_limit.is_some() || args.poll_interval_ms.is_some() {
        config.history_limit = args.history_limit.unwrap_or(config.history_limit);
        config.poll_interval_ms = args.poll_interval_ms.unwrap_or(config.poll_interval_ms);
        config_store.save(&config)?;
    }
    tracing::info!(
        config = %config_store.path().display(),
        history_limit = config.history_limit,
        poll_interval_ms = config.poll_interval_ms,
        "configuration loaded"
    );

    let (lock, store) = exclusive_store(&config)?;
    let (monitor_tx, monitor_rx) = unbounded();
    let monitor = monitor::spawn(SystemClipboard::new(), config.poll_interval(), monitor_tx);

    let app = App {
        indicator: CopiedIndicator::new(config.copied_indicator()),
        layout: MenuLayout {
            max_entries: config.menu_entries,
            preview_chars: config.preview_chars,
        },
        store,
        tray: None,
        monitor_rx,
        monitor: Some(monitor),
        _lock: lock,
    };

    app.event_loop()
}

struct App {
    store: ClipboardStore,
    indicator: CopiedIndicator,
    layout: MenuLayout,
    tray: Option<TrayController>,
    monitor_rx: Receiver<MonitorEvent>,
    monitor: Option<MonitorHandle>,
    _lock: HistoryLock,
}

impl App {
    fn event_loop(mut self) -> Result<()> {
        let event_loop = EventLoop::<()>::new();
        let menu_rx = MenuEvent::receiver();

        event_loop.run(move |event, _, control_flow| {
            let now = Instant::now();
            let wake = self
                .indicator
                .next_due()
                .map_or(now + TICK, |due| due.min(now + TICK));
            *control_flow = ControlFlow::WaitUntil(wake);
            match event {
                Event::NewEvents(StartCause::Init) => {
                    // The tray must be created once the event loop is live.
                    match TrayController::new(self.store.entries(), None, self.layout) {
                        Ok(tray) => self.tray = Some(tray),
                        Err(err) => {
                            tracing::error!(error = %err, "tray creation failed");
                            self.shutdown();
                            *control_flow = ControlFlow::ExitWithCode(1);
                            return;
                        }
                    }
                    tracing::info!("event loop started");
                }
                Event::MainEventsCleared => {
                    while let Ok(menu_event) = menu_rx.try_recv() {
                        let action = self
                            .tray
                            .as_ref()
                            .and_then(|tray| tray.action_for_menu(menu_event.id));
                        if let Some(action) = action {
                            if action == TrayAction::Quit {
                                tracing::info!("quitting");
                                self.shutdown();
                                *control_flow = ControlFlow::Exit;
                                return;
                            }
                            if let Err(err) = self.handle_menu(action) {
                                tracing::error!(error = %err, "menu handler failed");
                            }
                        }
                    }
                    while let Ok(monitor_event) = self.monitor_rx.try_recv() {
                        if let Err(err) = self.handle_monitor(monitor_event) {
                            tracing::error!(error = %err, "clipboard change handler failed");
                        }
                    }
                    if self.indicator.fire_due(Instant::now()) {
                        if let Err(err) = self.refresh_tray() {
                            tracing::error!(error = %err, "tray refresh failed");
                        }
                    }
                }
                _ => {}
            }
        });
    }

    fn handle_menu(&mut self, action: TrayAction) -> Result<()> {
        match action {
            TrayAction::Copy(id) => {
                let copied = copy_and_mark(&mut self.store, &mut self.indicator, id, Instant::now());
                if let Err(err) = copied {
                    let reason = format!("{err:#}");
                    tracing::warn!(error = %reason, "copy failed");
                }
            }
            TrayAction::ClearHistory => {
                self.indicator.clear();
                let cleared = self.store.clear_history();
                self.refresh_tray()?;
                return cleared;
            }
            TrayAction::Quit => {}
        }
        self.refresh_tray()
    }

    fn handle_monitor(&mut self, event: MonitorEvent) -> Result<()> {
        match event {
            MonitorEvent::Changed(snapshot) => {
                match self.store.record_new_clipboard_content(&snapshot, Utc::now()) {
                    Ok(None) => {}
                    Ok(Some(_)) => self.refresh_tray()?,
                    Err(err) => {
                        // The entry may be in memory even though saving failed.
                        self.refresh_tray()?;
                        return Err(err);
                    }
                }
            }
            MonitorEvent::ReadFailed(err) => {
                tracing::warn!(error = %err, "clipboard read failed");
            }
        }
        Ok(())
    }

    fn refresh_tray(&mut self) -> Result<()> {
        if let Some(tray) = self.tray.as_mut() {
            tray.refresh(self.store.entries(), self.indicator.current())?;
        }
        Ok(())
    }

    fn shutdown(&mut self) {
        if let Some(monitor) = self.monitor.take() {
            monitor.stop();
        }
    }
}
