//! `qrscan` command line host.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, warn};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use crate::camera::{CameraStatus, EnvironmentSignal, StartOutcome};
use crate::content::templates::{self, WifiSecurity};
use crate::content::classify;
use crate::events::AppEvent;
use crate::models::{HistoryFilter, HistoryRecord, HistoryStats, RecordKind, ResultSet};
use crate::service::history::DEFAULT_HISTORY_LIMIT;
use crate::service::{ErrorCorrection, GenerateOptions};
use crate::settings::SettingsStore;
use crate::utils::text::truncate_text;
use crate::AppState;

const CONTENT_PREVIEW_CHARS: usize = 60;

#[derive(Parser, Debug)]
#[command(name = "qrscan")]
#[command(about = "Scan and generate QR codes through a recognition service")]
#[command(version)]
pub struct Cli {
    /// Settings file
    #[arg(long, global = true, env = "QRSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Recognition service base URL
    #[arg(long, global = true, env = "QRSCAN_API_URL")]
    api_url: Option<String>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan an image file
    Scan { file: PathBuf },

    /// Scan from the camera until a code is found
    Camera {
        /// Keep scanning after each detection
        #[arg(long)]
        continuous: bool,

        /// Also capture a frame every time Enter is pressed
        #[arg(long)]
        manual: bool,
    },

    /// Generate a QR code for some text
    Generate {
        text: String,

        /// Image size as WIDTH,HEIGHT
        #[arg(long, value_parser = parse_size, default_value = "300,300")]
        size: [u32; 2],

        #[arg(long, default_value_t = 4)]
        border: u32,

        /// Error correction level (L, M, Q, H)
        #[arg(long, default_value = "M")]
        ec: ErrorCorrection,

        /// Write the PNG here instead of printing the data URL
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Classify text locally and on the service
    Info { text: String },

    /// Build a structured payload to feed into `generate`
    Template {
        #[command(subcommand)]
        template: TemplateCommand,
    },

    /// Inspect or prune the service history
    History {
        #[command(subcommand)]
        action: HistoryCommand,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateCommand {
    Wifi {
        #[arg(long)]
        ssid: String,
        #[arg(long, default_value = "")]
        password: String,
        #[arg(long, value_enum, default_value_t = SecurityArg::Wpa)]
        security: SecurityArg,
    },
    Vcard {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        phone: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        organization: String,
    },
    Event {
        #[arg(long)]
        title: String,
        /// Start time, RFC 3339
        #[arg(long)]
        start: DateTime<Utc>,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// List the example payloads
    Presets,
}

#[derive(Subcommand, Debug)]
enum HistoryCommand {
    List {
        #[arg(long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: u32,
        #[arg(long, value_enum)]
        kind: Option<KindArg>,
    },
    Delete {
        id: i64,
    },
    Clear,
    Stats,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SecurityArg {
    Wpa,
    Wep,
    Open,
}

impl From<SecurityArg> for WifiSecurity {
    fn from(arg: SecurityArg) -> Self {
        match arg {
            SecurityArg::Wpa => WifiSecurity::Wpa,
            SecurityArg::Wep => WifiSecurity::Wep,
            SecurityArg::Open => WifiSecurity::Open,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Scan,
    Generate,
}

impl From<KindArg> for RecordKind {
    fn from(arg: KindArg) -> Self {
        match arg {
            KindArg::Scan => RecordKind::Scan,
            KindArg::Generate => RecordKind::Generate,
        }
    }
}

fn parse_size(value: &str) -> Result<[u32; 2], String> {
    let (width, height) = value
        .split_once(',')
        .ok_or_else(|| format!("expected WIDTH,HEIGHT, got {value:?}"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u32>()
            .map_err(|err| format!("invalid dimension {part:?}: {err}"))
    };
    Ok([parse(width)?, parse(height)?])
}

pub async fn dispatch(cli: Cli) -> Result<()> {
    let settings_path = cli.config.clone().unwrap_or_else(SettingsStore::default_path);
    let store = SettingsStore::new(settings_path)?;
    if let Some(url) = cli.api_url.as_deref() {
        store.override_base_url(url);
    }
    debug!("settings: {:?}", store.snapshot());

    // Templates never touch the service.
    if let Command::Template { template } = &cli.command {
        return print_template(template);
    }

    let app = AppState::new(store)?;
    match cli.command {
        Command::Scan { file } => {
            app.files
                .accept_path(&file)
                .await
                .with_context(|| format!("Cannot scan {}", file.display()))?;
            let results = app.files.submit().await?;
            print_results(&results, cli.json)?;
        }
        Command::Camera { continuous, manual } => {
            run_camera(&app, continuous, manual, cli.json).await?;
        }
        Command::Generate {
            text,
            size,
            border,
            ec,
            out,
        } => {
            let options = GenerateOptions {
                size,
                border,
                error_correction: ec,
            };
            let code = app.client.generate(&text, &options).await?;
            let info = classify(&text);
            match out {
                Some(path) => {
                    let png = code.png_bytes()?;
                    tokio::fs::write(&path, png)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!(
                        "Wrote {}x{} {} code to {}",
                        code.size[0],
                        code.size[1],
                        info.description,
                        path.display()
                    );
                }
                None => println!("{}", code.image),
            }
        }
        Command::Info { text } => {
            let local = classify(&text);
            let remote = app.client.describe(&text).await?;
            if cli.json {
                let body = serde_json::json!({ "local": local, "service": remote });
                println!("{}", serde_json::to_string_pretty(&body)?);
            } else {
                println!("local:   {} ({})", local.description, local.content_type);
                println!("service: {} ({})", remote.description, remote.content_type);
            }
        }
        Command::History { action } => run_history(&app, action, cli.json).await?,
        Command::Template { .. } => {}
    }
    Ok(())
}

async fn run_camera(app: &AppState, continuous: bool, manual: bool, json: bool) -> Result<()> {
    let mut events = app.events.subscribe();
    match app.camera.start().await? {
        StartOutcome::Started => {}
        other => bail!("camera did not start: {other:?}"),
    }
    if manual {
        println!("Scanning... press Enter to capture, Ctrl-C to stop");
    } else {
        println!("Scanning... press Ctrl-C to stop");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = manual;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let outcome = loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                app.environment.signal(EnvironmentSignal::Teardown);
                break Ok(());
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(_)) => {
                    // Failures are reported through scan-failed below.
                    let _ = app.camera.capture_and_scan().await;
                }
                Ok(None) => stdin_open = false,
                Err(err) => {
                    warn!("stdin closed: {err}");
                    stdin_open = false;
                }
            },
            event = events.recv() => match event {
                Ok(AppEvent::ResultsUpdated { results }) => print_results(&results, json)?,
                Ok(AppEvent::CodeDetected { .. }) => {
                    // A background detection leaves the camera active, a
                    // manual capture leaves it scanning.
                    if app.camera.status().await == CameraStatus::Active {
                        if !continuous {
                            break Ok(());
                        }
                        app.camera.scan().await?;
                    }
                }
                Ok(AppEvent::NoCodesFound) => println!("No QR codes found"),
                Ok(AppEvent::ScanFailed { message }) => eprintln!("Scan failed: {message}"),
                Ok(AppEvent::DeviceLost) => break Err(anyhow::anyhow!("camera disconnected")),
                Ok(AppEvent::CameraStateChanged { status }) => debug!("camera is {status:?}"),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => warn!("dropped {skipped} events"),
                Err(RecvError::Closed) => break Ok(()),
            },
        }
    };

    app.shutdown().await;
    outcome
}

async fn run_history(app: &AppState, action: HistoryCommand, json: bool) -> Result<()> {
    match action {
        HistoryCommand::List { limit, kind } => {
            let records = app.history.list(limit).await?;
            let filter = kind
                .map(|kind| HistoryFilter::Only(kind.into()))
                .unwrap_or_default();
            let shown = filter.apply(&records);
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else if shown.is_empty() {
                println!("No history records");
            } else {
                for record in shown {
                    println!("{}", describe_record(record));
                }
            }
        }
        HistoryCommand::Delete { id } => {
            app.history.delete(id).await?;
            println!("Deleted record {id}");
        }
        HistoryCommand::Clear => {
            let message = app.history.clear().await?;
            println!("{message}");
        }
        HistoryCommand::Stats => {
            let stats = app.history.stats().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                print_stats(&stats);
            }
        }
    }
    Ok(())
}

fn describe_record(record: &HistoryRecord) -> String {
    let when = record
        .timestamp()
        .map(|ts| ts.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| record.timestamp.clone());
    let description = record
        .content_info()
        .map(|info| info.description.as_str())
        .unwrap_or("Unknown");
    let kind = match record.kind {
        RecordKind::Scan => format!("scan via {}", record.method().label()),
        RecordKind::Generate => "generate".to_string(),
    };
    format!(
        "#{:<5} {}  {:<22} {:<14} {}",
        record.id,
        when,
        kind,
        description,
        truncate_text(&record.content, CONTENT_PREVIEW_CHARS)
    )
}

fn print_stats(stats: &HistoryStats) {
    println!("Total records: {}", stats.total_records);
    println!("Scans:         {}", stats.scans);
    println!("Generations:   {}", stats.generations);
    let mut methods: Vec<_> = stats.methods.iter().collect();
    methods.sort();
    for (method, count) in methods {
        println!("  method {method}: {count}");
    }
    let mut types: Vec<_> = stats.content_types.iter().collect();
    types.sort();
    for (content_type, count) in types {
        println!("  type {content_type}: {count}");
    }
}

fn print_results(results: &ResultSet, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
        return Ok(());
    }
    if results.is_empty() {
        println!("No QR codes found");
        return Ok(());
    }
    println!("Found {} QR code(s) via {}:", results.len(), results.method.label());
    for (index, item) in results.items.iter().enumerate() {
        let action = if item.content_type.opens_externally() {
            "open"
        } else {
            "copy"
        };
        println!(
            "  {}. [{}] {} ({})",
            index + 1,
            item.description,
            item.data,
            action
        );
    }
    Ok(())
}

fn print_template(template: &TemplateCommand) -> Result<()> {
    match template {
        TemplateCommand::Wifi {
            ssid,
            password,
            security,
        } => println!("{}", templates::wifi(ssid, password, (*security).into())),
        TemplateCommand::Vcard {
            name,
            phone,
            email,
            organization,
        } => println!("{}", templates::vcard(name, phone, email, organization)),
        TemplateCommand::Event {
            title,
            start,
            location,
            description,
        } => println!("{}", templates::event(title, *start, location, description)),
        TemplateCommand::Presets => {
            for (content_type, payload) in templates::presets() {
                println!("{:<6} {}", content_type.as_str(), payload);
            }
        }
    }
    Ok(())
}
