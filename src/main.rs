use color_eyre::Result;
use locus_tui::{
    app::App,
    config::{Config, CONFIG_PATH},
    credentials::{ChannelPrompt, CredentialStore, FileCredentialStore},
    device::{DeviceLocationProvider, PositionSource},
    events::{Event, EventHandler},
    gpsd::GpsdSource,
    ip::IpLocationProvider,
    logging,
    provider::ProviderRegistry,
    remote::RemoteApiProvider,
    session::LocationSession,
    ui,
    wifi::SystemWifiScanner,
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{io, sync::Arc};
use tokio::sync::mpsc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Instrumentation and safety
    let _log_guard = logging::initialize_logging();
    color_eyre::install()?;
    install_panic_hook();

    let config = Config::load();
    let client = reqwest::Client::builder()
        .user_agent(concat!("locus-tui/", env!("CARGO_PKG_VERSION")))
        .build()?;

    // Providers
    let source: Option<Arc<dyn PositionSource>> = if config.device.gpsd_addr.is_empty() {
        None
    } else {
        Some(Arc::new(GpsdSource::new(config.device.gpsd_addr.clone())))
    };
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(FileCredentialStore::new(&config.remote.credentials_path));
    let (prompt_tx, prompt_rx) = mpsc::unbounded_channel();
    let registry = ProviderRegistry::new(
        DeviceLocationProvider::new(source),
        RemoteApiProvider::new(
            client.clone(),
            config.remote.endpoint.clone(),
            credentials.clone(),
            Arc::new(ChannelPrompt::new(prompt_tx)),
            Arc::new(SystemWifiScanner),
        ),
        IpLocationProvider::new(client, config.ip.endpoint.clone()),
    );

    let (provider_tx, provider_rx) = mpsc::unbounded_channel();
    let session = LocationSession::new(
        registry,
        provider_tx,
        config.ui.default_provider,
        config.device_settings(),
        config.remote_options(),
    );

    // Ready terminal and state
    let mut terminal = setup_terminal()?;
    let mut events = EventHandler::new(config.ui.tick_rate_ms);
    events.forward_provider_events(provider_rx);
    events.forward_prompts(prompt_rx);

    let mut app = App::new(session, config, CONFIG_PATH, credentials);
    app.session.refresh();

    // Main loop
    while !app.should_quit {
        terminal.draw(|f| ui::render(f, &app))?;

        match events.next().await {
            Some(Event::Tick) => app.on_tick(),
            Some(Event::Input(key)) => app.handle_key(key),
            Some(Event::Provider(event)) => app.on_provider_event(event),
            Some(Event::Prompt(request)) => app.on_prompt(request),
            None => break,
        }
    }

    app.session.shutdown();
    info!("Shutting down");
    restore_terminal(terminal)?;
    Ok(())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, crossterm::terminal::EnterAlternateScreen, crossterm::cursor::Hide)?;
    Ok(Terminal::new(CrosstermBackend::new(stdout))?)
}

fn restore_terminal(mut terminal: Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(terminal.backend_mut(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show)?;
    Ok(())
}

fn install_panic_hook() {
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        // Force terminal cleanup!
        crossterm::terminal::disable_raw_mode().ok();
        crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen, crossterm::cursor::Show).ok();
        original_hook(panic_info);
    }));
}
