//! Heviton report - solar generation scraper
//!
//! Logs in to the Heviton monitoring portal, reads the plant's generation figures,
//! posts a summary to a Jandi webhook and records it in Google Sheets.

mod browser;
mod config;
mod error;
mod http;
mod import;
mod jandi;
mod models;
mod parser;
mod portal;
mod report;
mod scrape;
mod sheets;
mod utils;

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::browser::{BrowserOptions, RenderWait, WebDriverBrowser};
use crate::config::{Config, SheetsCredentials};
use crate::error::ConfigError;
use crate::http::HttpClient;
use crate::jandi::JandiWebhook;
use crate::models::{Credentials, DailyPoint, DashboardMetrics, DeviceStatus, Normalcy, Report};
use crate::portal::{Endpoints, LoginTiming, Session};
use crate::scrape::{Collector, PageWaits};
use crate::sheets::{GoogleSheets, Recorder, Selection, SheetNames};

#[derive(Parser, Debug)]
#[command(name = "heviton")]
#[command(about = "Heviton solar generation report", long_about = None)]
struct Args {
    /// Record the daily row only (combinable with --weekly/--monthly)
    #[arg(long)]
    daily: bool,

    /// Record the weekly row only
    #[arg(long)]
    weekly: bool,

    /// Record the monthly row only
    #[arg(long)]
    monthly: bool,

    /// Send a sample report to the webhook and exit
    #[arg(long)]
    test: bool,

    /// Import the full statistics history into the spreadsheet
    #[arg(long)]
    import_history: bool,

    /// Debug logging
    #[arg(long)]
    debug: bool,

    /// Show the browser window
    #[arg(long)]
    headed: bool,

    /// Config file path (default: config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let cfg = match Config::load(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(e) => {
            init_logging(&Config::default(), args.debug);
            tracing::error!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    init_logging(&cfg, args.debug);

    tracing::info!("Heviton report v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("==========================================");

    let result = if args.test {
        run_webhook_test(&cfg).await
    } else if args.import_history {
        run_import(&cfg, &args).await
    } else {
        let selection = Selection::from_flags(args.daily, args.weekly, args.monthly);
        run_cycle(&cfg, &args, selection).await
    };

    match result {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

/// Console logging, plus an appending per-day file when `logging.log_dir` is set
fn init_logging(cfg: &Config, debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level))
    };

    let file_layer = open_log_file(&cfg.logging.log_dir)
        .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();
}

fn open_log_file(log_dir: &str) -> Option<std::fs::File> {
    if log_dir.is_empty() {
        return None;
    }
    let dir = PathBuf::from(log_dir);
    let path = dir.join(format!("scraper_{}.log", Local::now().format("%Y%m%d")));
    let opened = std::fs::create_dir_all(&dir).and_then(|_| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
    });
    match opened {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!("Cannot open log file {}: {}", path.display(), e);
            None
        }
    }
}

fn http_client(cfg: &Config) -> Result<HttpClient> {
    HttpClient::new(cfg.request_timeout(), cfg.connect_timeout()).context("failed to build HTTP client")
}

fn browser_options(cfg: &Config, args: &Args) -> BrowserOptions {
    BrowserOptions {
        webdriver_url: cfg.portal.webdriver_url.clone(),
        headless: cfg.portal.headless && !args.headed,
        element_timeout: Duration::from_secs(cfg.scrape.element_timeout_secs),
    }
}

fn login_timing(cfg: &Config) -> LoginTiming {
    LoginTiming {
        page_settle: RenderWait::from_millis(cfg.scrape.settle_ms),
        poll_interval: RenderWait::from_millis(cfg.scrape.login_poll_ms),
        poll_attempts: cfg.scrape.login_poll_attempts,
        popup_settle: RenderWait::from_millis(cfg.scrape.popup_settle_ms),
    }
}

fn page_waits(cfg: &Config) -> PageWaits {
    PageWaits {
        settle: RenderWait::from_millis(cfg.scrape.settle_ms),
        extra: RenderWait::from_millis(cfg.scrape.extra_settle_ms),
    }
}

fn sheet_names(cfg: &Config) -> SheetNames {
    SheetNames {
        daily: cfg.sheets.daily_sheet.clone(),
        weekly: cfg.sheets.weekly_sheet.clone(),
        monthly: cfg.sheets.monthly_sheet.clone(),
    }
}

async fn open_session(cfg: &Config, args: &Args) -> Result<Session> {
    let browser = WebDriverBrowser::connect(&browser_options(cfg, args))
        .await
        .context("failed to start browser")?;
    Ok(Session::new(
        Arc::new(browser),
        Endpoints::new(&cfg.portal.base_url),
    ))
}

/// Everything a report cycle needs from configuration, resolved before any network activity
struct CycleSetup<'a> {
    creds: Credentials,
    webhook_url: &'a str,
    sheets: Option<SheetsCredentials>,
}

fn cycle_setup(cfg: &Config) -> Result<CycleSetup<'_>, ConfigError> {
    Ok(CycleSetup {
        creds: cfg.credentials()?,
        webhook_url: cfg.webhook_url()?,
        sheets: cfg.sheets_credentials()?,
    })
}

/// Full collect -> notify -> record run
async fn run_cycle(cfg: &Config, args: &Args, selection: Selection) -> Result<bool> {
    let setup = cycle_setup(cfg)?;
    let http = http_client(cfg)?;
    let webhook = JandiWebhook::new(setup.webhook_url, http.clone());

    tracing::info!("[Cycle] Step 1: Starting browser...");
    let mut session = match open_session(cfg, args).await {
        Ok(session) => session,
        Err(e) => {
            webhook.send_error_alert(&format!("{:#}", e)).await;
            return Err(e);
        }
    };

    let outcome = collect_and_deliver(&mut session, cfg, &setup, &webhook, &http, selection).await;
    session.logout().await;

    match outcome {
        Ok(ok) => Ok(ok),
        Err(e) => {
            webhook.send_error_alert(&format!("{:#}", e)).await;
            Err(e)
        }
    }
}

/// Visit the dashboard, device and history pages in order and aggregate them
async fn collect_report(collector: &Collector<'_>, recent_days: usize, now: DateTime<Local>) -> Report {
    let dashboard = collector.dashboard().await;
    let device_status = collector.device_status().await;
    let recent = collector.recent_days(recent_days, now.date_naive()).await;
    report::assemble(now, dashboard, device_status, recent)
}

async fn collect_and_deliver(
    session: &mut Session,
    cfg: &Config,
    setup: &CycleSetup<'_>,
    webhook: &JandiWebhook,
    http: &HttpClient,
    selection: Selection,
) -> Result<bool> {
    tracing::info!("[Cycle] Step 2: Logging in...");
    if let Err(e) = session.login(&setup.creds, &login_timing(cfg)).await {
        webhook.send_error_alert(&format!("로그인 실패: {}", e)).await;
        return Ok(false);
    }

    tracing::info!("[Cycle] Step 3: Collecting data...");
    let collector = Collector::new(session, page_waits(cfg))?;
    let report = collect_report(&collector, cfg.scrape.recent_days, Local::now()).await;

    tracing::info!("[Cycle] Step 4: Sending report...");
    if !webhook.send_report(&report).await {
        tracing::warn!("Report was not delivered to Jandi");
    }

    tracing::info!("[Cycle] Step 5: Recording to spreadsheet...");
    match &setup.sheets {
        Some(sheets) => {
            match GoogleSheets::connect(&sheets.service_account_json, &sheets.spreadsheet_id, http.clone()).await {
                Ok(backend) => {
                    let recorder = Recorder::new(backend, sheet_names(cfg));
                    if !recorder.record(&report, selection).await {
                        tracing::warn!("Some spreadsheet rows were not recorded");
                    }
                }
                Err(e) => tracing::error!("Google Sheets unavailable: {}", e),
            }
        }
        None => tracing::info!("Spreadsheet not configured, skipping"),
    }

    tracing::info!("Cycle complete");
    Ok(true)
}

/// Send a canned report through the real formatter
async fn run_webhook_test(cfg: &Config) -> Result<bool> {
    let webhook = JandiWebhook::new(cfg.webhook_url()?, http_client(cfg)?);
    let now = Local::now();

    let dashboard = DashboardMetrics {
        current_power: Some("50000".into()),
        today_generation: Some("123.45".into()),
        month_generation: Some("3456.78".into()),
        total_generation: Some("28.90".into()),
    };
    let status = DeviceStatus {
        normalcy: Normalcy::Normal,
        ..Default::default()
    };
    let recent = vec![DailyPoint::new(now.date_naive(), "123.45")];
    let report = report::assemble(now, dashboard, status, recent);

    tracing::info!("Sending test report...");
    let sent = webhook.send_report(&report).await;
    if sent {
        tracing::info!("Webhook test succeeded");
    } else {
        tracing::error!("Webhook test failed");
    }
    Ok(sent)
}

async fn run_import(cfg: &Config, args: &Args) -> Result<bool> {
    let creds = cfg.credentials()?;
    let sheets = cfg
        .sheets_credentials()?
        .ok_or(ConfigError::MissingSheetsCredentials)?;
    let http = http_client(cfg)?;
    let webhook = cfg
        .webhook_url()
        .ok()
        .map(|url| JandiWebhook::new(url, http.clone()));

    let summary = match import_all(cfg, args, &creds, &sheets, &http).await {
        Ok(summary) => summary,
        Err(e) => {
            if let Some(webhook) = &webhook {
                webhook.send_error_alert(&format!("과거 데이터 가져오기 실패: {:#}", e)).await;
            }
            return Err(e);
        }
    };
    tracing::info!(
        "Import complete: {} days, {} weeks, {} months",
        summary.days,
        summary.weeks,
        summary.months
    );

    if let Some(webhook) = &webhook {
        let body = format!(
            "일별 {}건, 주별 {}건, 월별 {}건을 기록했습니다.",
            summary.days, summary.weeks, summary.months
        );
        let message = jandi::plain_message(&body, Some("📥 과거 데이터 가져오기 완료"), jandi::DEFAULT_COLOR);
        webhook.send(&message).await;
    }
    Ok(true)
}

async fn import_all(
    cfg: &Config,
    args: &Args,
    creds: &Credentials,
    sheets: &SheetsCredentials,
    http: &HttpClient,
) -> Result<import::ImportSummary> {
    let backend = GoogleSheets::connect(&sheets.service_account_json, &sheets.spreadsheet_id, http.clone())
        .await
        .context("failed to authorize Google Sheets")?;
    let recorder = Recorder::new(backend, sheet_names(cfg));

    let mut session = open_session(cfg, args).await?;
    let outcome = import_with_session(&mut session, cfg, creds, &recorder).await;
    session.logout().await;
    outcome
}

async fn import_with_session(
    session: &mut Session,
    cfg: &Config,
    creds: &Credentials,
    recorder: &Recorder<GoogleSheets>,
) -> Result<import::ImportSummary> {
    session
        .login(creds, &login_timing(cfg))
        .await
        .context("login failed")?;
    let collector = Collector::new(session, page_waits(cfg))?;
    import::import_history(&collector, recorder, Local::now()).await
}
