use anyhow::{anyhow, Context};
use clap::Parser;
use price_toggle::app::format_last_updated;
use price_toggle::domain::messages::{ContentRequest, Notification};
use price_toggle::domain::ports::ContentChannel;
use price_toggle::utils::error::{ErrorSeverity, PriceToggleError};
use price_toggle::utils::{logger, validation::Validate};
use price_toggle::{
    parse_document, AppConfig, ChannelNotifier, CliArgs, Command, ContentSession, ConversionEngine,
    Controller, HttpRateSource, JsonFileStore, LocalTab, RateService,
};
use std::path::Path;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();

    // 初始化日誌
    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("Starting price-toggle CLI");
    if args.verbose {
        tracing::debug!("CLI args: {:?}", args);
    }

    // 驗證參數
    if let Err(e) = args.validate() {
        tracing::error!("❌ Argument validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(args).await {
        let exit_code = match e.downcast_ref::<PriceToggleError>() {
            Some(err) => {
                // 記錄詳細錯誤信息
                tracing::error!(
                    "❌ price-toggle failed: {:#} (Category: {:?}, Severity: {:?})",
                    e,
                    err.category(),
                    err.severity()
                );
                tracing::error!("💡 Recovery suggestion: {}", err.recovery_suggestion());
                eprintln!("❌ {}", err.user_friendly_message());
                eprintln!("💡 {}", err.recovery_suggestion());

                // 根據錯誤嚴重程度決定退出碼
                match err.severity() {
                    ErrorSeverity::Low => 0,
                    ErrorSeverity::Medium => 2,
                    ErrorSeverity::High => 1,
                    ErrorSeverity::Critical => 3,
                }
            }
            None => {
                tracing::error!("❌ price-toggle failed: {:#}", e);
                eprintln!("❌ {:#}", e);
                1
            }
        };

        if exit_code > 0 {
            std::process::exit(exit_code);
        }
    }
}

async fn run(args: CliArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };
    config.validate()?;

    match args.command {
        Command::Convert {
            input,
            rate,
            fetch,
            output,
        } => convert(&config, &input, rate, fetch, output.as_deref()).await,
        Command::Scan { input } => scan(&config, &input).await,
        Command::Rate { refresh } => show_rate(&config, refresh).await,
    }
}

fn rate_service(config: &AppConfig) -> anyhow::Result<RateService<JsonFileStore, HttpRateSource>> {
    let store = JsonFileStore::new(&config.rates.state_file);
    let source = HttpRateSource::from_config(config)?;
    Ok(RateService::new(store, source, config)?)
}

async fn read_page(path: &Path) -> anyhow::Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(PriceToggleError::from)
        .with_context(|| format!("reading {}", path.display()))
}

async fn convert(
    config: &AppConfig,
    input: &Path,
    rate: Option<f64>,
    fetch: bool,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let html = read_page(input).await?;
    let (notifier, mut notifications) = ChannelNotifier::new();
    let session = ContentSession::new(parse_document(&html), config, false, Arc::new(notifier))?;
    let tab = LocalTab::new(session);

    match rate {
        Some(rate) => {
            let response = tab
                .send(ContentRequest::ConvertCurrency { exchange_rate: rate })
                .await?;
            if !response.is_success() {
                return Err(PriceToggleError::RateUnavailable {
                    reason: format!("rate {} was rejected", rate),
                }
                .into());
            }
        }
        None => {
            let service = rate_service(config)?;
            if fetch {
                service.force_refresh().await;
            }
            let controller = Controller::new(tab.clone(), service, config);
            controller.initialize().await?;
            controller.convert().await?;
            tracing::info!("Converted at {}", controller.rate_text());
        }
    }

    while let Ok(notification) = notifications.try_recv() {
        if let Notification::ConversionComplete { count } = notification {
            println!("✅ Converted {} prices to {}", count, config.currency.target_code);
        }
    }

    let session = tab
        .close()
        .await
        .ok_or_else(|| anyhow!("content session disappeared"))?;
    let converted = session.document().to_html();

    match output {
        Some(path) => {
            tokio::fs::write(path, converted)
                .await
                .map_err(PriceToggleError::from)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("📁 Output saved to: {}", path.display());
        }
        None => println!("{}", converted),
    }
    Ok(())
}

async fn scan(config: &AppConfig, input: &Path) -> anyhow::Result<()> {
    let html = read_page(input).await?;
    let doc = parse_document(&html);
    let engine = ConversionEngine::new(config)?;

    let matches = doc.select(doc.body(), engine.selectors());
    println!("Found {} price elements", matches.len());
    for node in matches {
        let text = doc.inner_text(node);
        match engine.extractor().extract(&doc, node) {
            Some(amount) => println!(
                "{:>6}  <{}>  {:<30}  {:.2} {}",
                node.to_string(),
                doc.tag(node).unwrap_or("?"),
                text,
                amount,
                config.currency.source_code
            ),
            None => println!(
                "{:>6}  <{}>  {:<30}  (no price)",
                node.to_string(),
                doc.tag(node).unwrap_or("?"),
                text
            ),
        }
    }
    Ok(())
}

async fn show_rate(config: &AppConfig, refresh: bool) -> anyhow::Result<()> {
    let service = rate_service(config)?;
    let response = if refresh {
        service.force_refresh().await
    } else {
        service.get_rate().await
    };
    println!(
        "1 {} = {}{:.4} {}",
        config.currency.source_code,
        config.currency.target_symbol,
        response.exchange_rate,
        config.currency.target_code
    );
    println!(
        "Last updated: {}",
        format_last_updated(response.last_updated, chrono::Utc::now())
    );
    Ok(())
}
