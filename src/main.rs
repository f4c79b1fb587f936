use callboard::chart_export::{bar_color, write_chart, BarChart};
use callboard::error::user_message_from_report;
use callboard::export::{export_csv, frame_to_json, ExportOptions};
use callboard::logging::{init_logging, LogTarget};
use callboard::report::{caption, options_listing, sheet_listing};
use callboard::table_text::format_table;
use callboard::{
    AppConfig, AppEvent, CacheManager, ConfigManager, Dashboard, Session, SessionOptions, Theme,
    APP_NAME,
};
use callboard_cli::Args;
use clap::Parser;
use color_eyre::Result;
use ratatui::DefaultTerminal;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::time::Duration;

fn render(terminal: &mut DefaultTerminal, dashboard: &mut Dashboard) -> Result<()> {
    terminal.draw(|frame| frame.render_widget(dashboard, frame.area()))?;
    Ok(())
}

fn run(
    mut terminal: DefaultTerminal,
    mut dashboard: Dashboard,
    tx: Sender<AppEvent>,
    rx: Receiver<AppEvent>,
    poll_interval: Duration,
) -> Result<()> {
    render(&mut terminal, &mut dashboard)?;

    loop {
        if crossterm::event::poll(poll_interval)? {
            match crossterm::event::read()? {
                crossterm::event::Event::Key(key) => tx.send(AppEvent::Key(key))?,
                crossterm::event::Event::Resize(cols, rows) => {
                    tx.send(AppEvent::Resize(cols, rows))?
                }
                _ => {}
            }
        }

        let updated = match rx.recv_timeout(Duration::from_millis(0)) {
            Ok(event) => {
                match event {
                    AppEvent::Exit => break,
                    AppEvent::Crash(msg) => {
                        return Err(color_eyre::eyre::eyre!(msg));
                    }
                    event => {
                        if let Some(event) = dashboard.event(&event) {
                            tx.send(event)?;
                        }
                    }
                }
                true
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => false,
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
        };

        if updated {
            render(&mut terminal, &mut dashboard)?;
        }
    }
    Ok(())
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.clear_cache {
        match CacheManager::new(APP_NAME) {
            Ok(cache) => {
                if let Err(e) = cache.clear_all() {
                    eprintln!("Error clearing cache: {}", e);
                    std::process::exit(1);
                }
                println!("Cache cleared successfully");
                return Ok(Some(()));
            }
            Err(_e) => {
                println!("No cache to clear");
                return Ok(Some(()));
            }
        }
    }

    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(config) => match config.write_default_config(args.force) {
                Ok(path) => {
                    println!("Wrote default configuration to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing config: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }

    Ok(None)
}

/// Print (and optionally export) the requested outputs without opening the dashboard.
fn batch(args: &Args, config: &AppConfig, options: &SessionOptions, session: &Session) -> Result<()> {
    if args.list_sheets {
        for dataset in session.datasets() {
            print!("{}", sheet_listing(dataset));
        }
    }

    let dataset = session.dataset(options.active)?;
    let selection = options.initial_selection(dataset)?;

    if args.options {
        let cascade = dataset.options(&selection)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&cascade)?);
        } else {
            print!("{}", options_listing(&cascade, dataset.date_bounds()?));
        }
    }
    if args.list_sheets || args.options {
        return Ok(());
    }

    let analysis = dataset.analyze(&selection, &options.pivot)?;
    let frame = if args.data {
        &analysis.filtered
    } else {
        &analysis.pivot.frame
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&frame_to_json(frame)?)?);
    } else {
        println!("{}", caption(dataset, &selection, &analysis, args.data));
        println!();
        print!("{}", format_table(frame)?);
    }

    if let Some(path) = &args.export {
        export_csv(frame, path, &ExportOptions::from(&config.export))?;
        eprintln!("Wrote {}", path.display());
    }
    if let Some(path) = &args.chart {
        let chart = BarChart::from_pivot(&analysis.pivot)?;
        write_chart(path, &chart, bar_color(&config.theme.colors.chart_bar))?;
        eprintln!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_app(args: &Args, config: AppConfig) -> Result<()> {
    let options = SessionOptions::from_args_and_config(args, &config)?;
    let session = Session::open(&options, config.roles.clone())?;

    if !args.interactive {
        return batch(args, &config, &options, &session);
    }

    let theme = Theme::from_config(&config.theme)?;
    let poll_interval = Duration::from_millis(config.performance.event_poll_interval_ms);
    let (tx, rx) = channel::<AppEvent>();
    let dashboard = Dashboard::new(session, options, config, theme, tx.clone())?;
    let terminal = ratatui::init();
    let result = run(terminal, dashboard, tx, rx, poll_interval);
    ratatui::restore();
    result
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;

    let config = AppConfig::load(APP_NAME).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config: {}. Using defaults.", e);
        AppConfig::default()
    });

    let cache = CacheManager::new(APP_NAME)
        .unwrap_or_else(|_| CacheManager::with_dir(std::env::temp_dir().join(APP_NAME)));
    let target = if args.interactive {
        LogTarget::CacheFile
    } else {
        LogTarget::Stderr
    };
    if let Err(e) = init_logging(target, args.debug || config.debug.enabled, &cache) {
        eprintln!("Warning: {}", e);
    }

    if let Err(e) = run_app(&args, config) {
        eprintln!("Error: {}", user_message_from_report(&e, None));
        std::process::exit(1);
    }
    Ok(())
}
