use crate::audio::{AudioOutput, NullElement, RodioElement};
use crate::battle;
use crate::config;
use crate::model::{Clip, Settings};
use crate::registry::MediaElement;
use crate::session::BattleSession;
use crate::vote::{HttpVoteClient, Submission, VoteClient, submit_detached};
use anyhow::{Context, Result};
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
    KeyModifiers, MouseEvent, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::stdout;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub type Element = Box<dyn MediaElement>;

#[derive(Debug, Clone, Default)]
pub struct StartupOptions {
    pub root: Option<PathBuf>,
    pub battle: Option<String>,
    pub server_url: Option<String>,
    pub shuffle_seed: Option<String>,
}

pub struct App {
    root: PathBuf,
    output: Option<Rc<AudioOutput>>,
    votes: Option<Arc<dyn VoteClient>>,
    pub session: BattleSession<Element>,
}

impl App {
    pub fn new(root: &Path, battle_name: &str, settings: Settings) -> Result<Self> {
        let output = match AudioOutput::open(settings.output_device.as_deref()) {
            Ok(output) => {
                info!(output = %output.name(), "audio output ready");
                Some(Rc::new(output))
            }
            Err(err) => {
                warn!("no audio output, falling back to silent playback: {err:#}");
                None
            }
        };
        Self::with_output(root, battle_name, settings, output)
    }

    pub fn with_output(
        root: &Path,
        battle_name: &str,
        mut settings: Settings,
        output: Option<Rc<AudioOutput>>,
    ) -> Result<Self> {
        settings.last_battle = Some(battle_name.to_string());
        let session = open_session(root, battle_name, settings, output.as_ref())?;
        let mut app = Self {
            root: root.to_path_buf(),
            output,
            votes: None,
            session,
        };
        app.connect_vote_server();
        Ok(app)
    }

    pub fn switch_battle(&mut self, name: &str) {
        let mut settings = self.session.settings.clone();
        settings.last_battle = Some(name.to_string());
        match open_session(&self.root, name, settings, self.output.as_ref()) {
            Ok(session) => {
                self.session.stop_all();
                self.session = session;
            }
            Err(err) => {
                self.session.status = format!("battle error: {err:#}");
                self.session.dirty = true;
            }
        }
    }

    fn connect_vote_server(&mut self) {
        match HttpVoteClient::new(&self.session.settings.server_url) {
            Ok(client) => self.votes = Some(Arc::new(client)),
            Err(err) => {
                warn!("vote client unavailable: {err:#}");
                self.votes = None;
            }
        }
    }

    fn submit(&mut self, submission: Option<Submission>) {
        let Some(submission) = submission else {
            return;
        };
        match &self.votes {
            Some(client) => submit_detached(Arc::clone(client), submission),
            None => {
                self.session.status = String::from("Vote kept locally, no server connection");
                self.session.dirty = true;
            }
        }
    }

    /// Returns `true` when the key asks to quit.
    fn handle_key(&mut self, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
            KeyCode::Down => self.session.select_next(),
            KeyCode::Up => self.session.select_prev(),
            KeyCode::Enter => self.session.play_selected(),
            KeyCode::Char(' ') => self.session.toggle_pause_selected(),
            KeyCode::Char('a') => self.session.toggle_autoplay(),
            KeyCode::Char('[') => self.session.adjust_delay(-1),
            KeyCode::Char(']') => self.session.adjust_delay(1),
            KeyCode::Char(digit @ '1'..='3') => {
                let score = digit as u8 - b'0';
                let submission = self.session.vote_selected(score);
                self.submit(submission);
            }
            KeyCode::Char('u') => {
                let submission = self.session.retract_votes();
                self.submit(Some(submission));
            }
            KeyCode::Char('N') => self.session.toggle_notes(),
            KeyCode::Char('s') => self.save(),
            _ => {}
        }
        false
    }

    fn save(&mut self) {
        match config::save_settings(&self.session.settings) {
            Ok(()) => self.session.status = String::from("Settings saved"),
            Err(err) => self.session.status = format!("save error: {err:#}"),
        }
        self.session.dirty = true;
    }

    pub fn run_command(&mut self, raw: &str) {
        let input = raw.trim();
        if input.is_empty() {
            self.session.status = String::from("No command");
            self.session.dirty = true;
            return;
        }

        let mut command_split = input.splitn(2, char::is_whitespace);
        let command = command_split.next().unwrap_or_default();
        let rest = command_split.next().unwrap_or("").trim();

        match command {
            "help" => {
                self.session.status = String::from(
                    "Commands: battle <name> | battles | play <file> | delay <0-10> | autoplay <on|off> | server <url> | devices | device <name> | save",
                );
                self.session.dirty = true;
            }
            "battle" => {
                if rest.is_empty() {
                    self.session.status = String::from("Usage: battle <name>");
                    self.session.dirty = true;
                } else {
                    self.switch_battle(rest);
                }
            }
            "battles" => {
                self.session.status = match battle::battle_names(&self.root) {
                    Ok(names) if names.is_empty() => String::from("No battles found"),
                    Ok(names) => format!("Battles: {}", names.join(", ")),
                    Err(err) => format!("battle error: {err:#}"),
                };
                self.session.dirty = true;
            }
            "play" => {
                if rest.is_empty() {
                    self.session.status = String::from("Usage: play <file>");
                    self.session.dirty = true;
                } else {
                    self.session.play_clip(rest);
                }
            }
            "delay" => match rest.parse::<u32>() {
                Ok(value) => self.session.set_delay(value),
                Err(_) => {
                    self.session.status = String::from("Usage: delay <0-10>");
                    self.session.dirty = true;
                }
            },
            "autoplay" => match rest {
                "on" => self.session.set_autoplay(true),
                "off" => self.session.set_autoplay(false),
                _ => {
                    self.session.status = String::from("Usage: autoplay <on|off>");
                    self.session.dirty = true;
                }
            },
            "server" => {
                if rest.is_empty() {
                    self.session.status = String::from("Usage: server <url>");
                } else {
                    self.session.settings.server_url = rest.to_string();
                    self.connect_vote_server();
                    self.session.status = format!("Vote server: {rest}");
                }
                self.session.dirty = true;
            }
            "devices" => {
                let devices = AudioOutput::available_devices();
                self.session.status = if devices.is_empty() {
                    String::from("No output devices found")
                } else {
                    format!("Devices: {}", devices.join(", "))
                };
                self.session.dirty = true;
            }
            "device" => {
                self.session.settings.output_device = (!rest.is_empty()).then(|| rest.to_string());
                self.session.status = match &self.session.settings.output_device {
                    Some(name) => format!("Output device {name} used after restart"),
                    None => String::from("Default output device used after restart"),
                };
                self.session.dirty = true;
            }
            "save" => self.save(),
            _ => {
                self.session.status = String::from("Unknown command. Use :help");
                self.session.dirty = true;
            }
        }
    }
}

pub fn run(options: StartupOptions) -> Result<()> {
    let log_path = config::init_logging()?;
    let mut settings = config::load_settings()?;
    if let Some(url) = options.server_url.clone() {
        settings.server_url = url;
    }
    if let Some(seed) = options.shuffle_seed.clone() {
        settings.shuffle_seed = Some(seed);
    }

    let root = config::normalize_path(options.root.as_deref().unwrap_or(Path::new(".")));
    let battle_name = choose_battle(&root, options.battle.as_deref(), &settings)?;
    info!(root = %root.display(), battle = %battle_name, log = %log_path.display(), "starting");
    let mut app = App::new(&root, &battle_name, settings)?;

    enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(out);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut command_mode = false;
    let mut command_buffer = String::new();
    let mut last_draw = Instant::now();
    let mut entries_rect = ratatui::prelude::Rect::default();

    let result: Result<()> = loop {
        app.session.tick(Instant::now());

        if app.session.dirty || last_draw.elapsed() > Duration::from_millis(250) {
            terminal.draw(|frame| {
                entries_rect = crate::ui::entries_rect(frame.area());
                crate::ui::draw(frame, &app.session, &command_buffer, command_mode)
            })?;
            app.session.dirty = false;
            last_draw = Instant::now();
        }

        if !event::poll(Duration::from_millis(33))? {
            continue;
        }

        let event = event::read()?;
        if let Event::Mouse(mouse) = event {
            handle_mouse(&mut app.session, mouse, entries_rect);
            continue;
        }

        let Event::Key(key) = event else {
            continue;
        };

        if key.kind != KeyEventKind::Press {
            continue;
        }

        if command_mode {
            match key.code {
                KeyCode::Esc => {
                    command_mode = false;
                    command_buffer.clear();
                    app.session.dirty = true;
                }
                KeyCode::Enter => {
                    app.run_command(&command_buffer);
                    command_mode = false;
                    command_buffer.clear();
                }
                KeyCode::Backspace => {
                    command_buffer.pop();
                    app.session.dirty = true;
                }
                KeyCode::Char(ch) => {
                    command_buffer.push(ch);
                    app.session.dirty = true;
                }
                _ => {}
            }
            continue;
        }

        if key.code == KeyCode::Char(':') {
            command_mode = true;
            app.session.dirty = true;
            continue;
        }

        if app.handle_key(key) {
            break Ok(());
        }
    };

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    app.session.stop_all();
    let save_result = config::save_settings(&app.session.settings);
    result?;
    save_result?;
    Ok(())
}

fn choose_battle(root: &Path, requested: Option<&str>, settings: &Settings) -> Result<String> {
    if let Some(name) = requested {
        return Ok(name.to_string());
    }

    let names = battle::battle_names(root)?;
    settings
        .last_battle
        .clone()
        .filter(|last| names.contains(last))
        .or_else(|| names.first().cloned())
        .with_context(|| format!("no battles found in {}", root.display()))
}

fn open_session(
    root: &Path,
    name: &str,
    settings: Settings,
    output: Option<&Rc<AudioOutput>>,
) -> Result<BattleSession<Element>> {
    let battle = battle::scan_battle(root, name)?;
    Ok(BattleSession::from_battle(battle, settings, |clip| {
        make_element(output, clip)
    }))
}

fn make_element(output: Option<&Rc<AudioOutput>>, clip: &Clip) -> Element {
    match output {
        Some(output) => Box::new(RodioElement::new(Rc::clone(output), &clip.path)),
        None => Box::new(NullElement::new(&clip.path)),
    }
}

fn handle_mouse(
    session: &mut BattleSession<Element>,
    mouse: MouseEvent,
    entries_rect: ratatui::prelude::Rect,
) {
    let inside_entries = point_in_rect(mouse.column, mouse.row, entries_rect);
    match mouse.kind {
        MouseEventKind::ScrollDown if inside_entries => session.select_next(),
        MouseEventKind::ScrollUp if inside_entries => session.select_prev(),
        _ => {}
    }
}

fn point_in_rect(x: u16, y: u16, rect: ratatui::prelude::Rect) -> bool {
    if rect.width == 0 || rect.height == 0 {
        return false;
    }
    x >= rect.x
        && x < rect.x.saturating_add(rect.width)
        && y >= rect.y
        && y < rect.y.saturating_add(rect.height)
}
