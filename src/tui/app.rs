use anyhow::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    io,
    time::{Duration, Instant},
};

use crate::config::{Config, ConfigPaths};
use crate::session::{Session, SessionStore};
use crate::tui::{llm::LlmHandler, message::UiMessage, ui::render_ui};
use crate::SYSTEM_PROMPT;

const HELP_TEXT: &str = "Commands: /help  /clear  /exit\n\
Keys: Enter send, Up/Down input history, F2 toggle tools, Esc then q quit";

/// Input mode for the TUI
enum InputMode {
    Normal,
    Editing,
}

/// TUI application state
pub struct ParleyApp {
    llm_handler: LlmHandler,

    // Message history
    messages: Vec<UiMessage>,

    // Input state
    input: String,
    input_history: Vec<String>,
    input_history_index: usize,

    // Loading state
    is_loading: bool,

    // Session persistence
    session: Session,
    store: SessionStore,
    auto_save: bool,
}

impl ParleyApp {
    fn new(config: &Config, paths: ConfigPaths) -> Result<Self> {
        let llm_handler = LlmHandler::new(config)?;

        let mut messages = Vec::new();
        messages.push(UiMessage::system(
            "Type a message and press Enter. /help lists commands.".to_string(),
        ));

        Ok(Self {
            llm_handler,
            messages,
            input: String::new(),
            input_history: Vec::new(),
            input_history_index: 0,
            is_loading: false,
            session: Session::new(),
            store: SessionStore::new(paths),
            auto_save: config.settings.auto_save,
        })
    }

    pub fn messages(&self) -> &[UiMessage] {
        &self.messages
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn endpoint_name(&self) -> &str {
        self.llm_handler.endpoint_name()
    }

    pub fn model_name(&self) -> &str {
        self.llm_handler.model_name()
    }

    pub fn tools_enabled(&self) -> bool {
        self.llm_handler.tools_enabled()
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.llm_handler.tool_names()
    }

    fn toggle_tools(&mut self) {
        self.llm_handler.toggle_tools();
    }

    fn handle_input(&mut self, c: char) {
        self.input.push(c);
    }

    fn backspace(&mut self) {
        self.input.pop();
    }

    fn previous_input(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        if self.input_history_index > 0 {
            self.input_history_index -= 1;
            self.input = self.input_history[self.input_history_index].clone();
        }
    }

    fn next_input(&mut self) {
        if self.input_history.is_empty() {
            return;
        }
        if self.input_history_index < self.input_history.len() - 1 {
            self.input_history_index += 1;
            self.input = self.input_history[self.input_history_index].clone();
        } else {
            self.input_history_index = self.input_history.len();
            self.input.clear();
        }
    }

    /// Submit the current input. Returns `true` when the app should exit.
    fn submit_message(&mut self) -> Result<bool> {
        if self.input.trim().is_empty() || self.is_loading {
            return Ok(false);
        }

        let text = self.input.trim().to_string();
        self.input_history.push(self.input.clone());
        self.input_history_index = self.input_history.len();
        self.input.clear();

        if let Some(command) = text.strip_prefix('/') {
            return self.run_command(command);
        }

        self.messages.push(UiMessage::user(text));
        self.is_loading = true;
        Ok(false)
    }

    fn run_command(&mut self, command: &str) -> Result<bool> {
        match command.trim() {
            "exit" | "quit" => Ok(true),
            "clear" => {
                self.messages.clear();
                self.session = Session::new();
                Ok(false)
            }
            "help" => {
                self.messages.push(UiMessage::system(HELP_TEXT.to_string()));
                Ok(false)
            }
            other => {
                self.messages.push(UiMessage::system(format!(
                    "Unknown command '/{}'. /help lists commands.",
                    other
                )));
                Ok(false)
            }
        }
    }

    /// Process the LLM response for the pending user message.
    async fn process_response(&mut self) -> Result<()> {
        if !self.is_loading {
            return Ok(());
        }

        let message_index = self.messages.len() - 1;
        let user_message = self.messages[message_index].clone();
        let history = &self.messages[..message_index];

        let response = self
            .llm_handler
            .process_message(history, &user_message, SYSTEM_PROMPT)
            .await?;

        self.session.push("user", &user_message.content);
        self.session.push("assistant", &response.content);
        if self.auto_save && !self.session.is_empty() {
            // A failing save must not take the conversation down with it.
            let _ = self.store.save(&self.session);
        }

        self.messages.push(response);
        self.is_loading = false;
        Ok(())
    }
}

/// TUI-specific state
struct TuiState {
    input_mode: InputMode,
    last_tick: Instant,
}

impl Default for TuiState {
    fn default() -> Self {
        Self {
            input_mode: InputMode::Editing, // Start in editing mode
            last_tick: Instant::now(),
        }
    }
}

/// Run the TUI application
pub async fn run() -> Result<()> {
    let paths = ConfigPaths::resolve()?;
    let config = Config::load_or_create(&paths)?;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = ParleyApp::new(&config, paths)?;
    let mut state = TuiState::default();

    let tick_rate = Duration::from_millis(100);
    let result = run_app(&mut terminal, &mut app, &mut state, tick_rate).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

/// Main application loop
async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut ParleyApp,
    state: &mut TuiState,
    tick_rate: Duration,
) -> Result<()> {
    loop {
        terminal.draw(|f| render_ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(state.last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if crossterm::event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match state.input_mode {
                        InputMode::Normal => match key.code {
                            KeyCode::Char('e') => {
                                state.input_mode = InputMode::Editing;
                            }
                            KeyCode::Char('q') => {
                                return Ok(());
                            }
                            _ => {}
                        },
                        InputMode::Editing => match key.code {
                            KeyCode::Enter => {
                                if app.submit_message()? {
                                    return Ok(());
                                }
                            }
                            KeyCode::Esc => {
                                state.input_mode = InputMode::Normal;
                            }
                            KeyCode::F(2) => {
                                app.toggle_tools();
                            }
                            KeyCode::Char(c) => {
                                app.handle_input(c);
                            }
                            KeyCode::Backspace => {
                                app.backspace();
                            }
                            KeyCode::Up => {
                                app.previous_input();
                            }
                            KeyCode::Down => {
                                app.next_input();
                            }
                            _ => {}
                        },
                    }
                }
            }
        }

        // Process LLM response if loading
        if app.is_loading() {
            app.process_response().await?;
        }

        if state.last_tick.elapsed() >= tick_rate {
            state.last_tick = Instant::now();
        }
    }
}
