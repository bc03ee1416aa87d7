use clap::Parser;
use news_collector::{
    Args, Collector, ErrorReport, FeedRsParser, Fetcher, HtmlArticleExtractor, RuleTextAnalyzer,
    Services, WebhookReporter,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = args.collector_config();
    let fetch_config = args.fetch_config();

    info!(
        data_dir = %config.data_dir.display(),
        lock_dir = %config.lock_dir.display(),
        "Starting news collector"
    );

    let reporter: Option<Arc<dyn ErrorReport>> = match &args.report_url {
        Some(url) => {
            info!("Reporting errors to {}", url);
            Some(Arc::new(WebhookReporter::new(url.clone())))
        }
        None => None,
    };

    let services = Services {
        fetcher: Arc::new(Fetcher::new(fetch_config.clone())?),
        parser: Arc::new(FeedRsParser::new()),
        extractor: Arc::new(HtmlArticleExtractor::new(&fetch_config)?),
        analyzer: Arc::new(RuleTextAnalyzer::new()),
        reporter,
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for interrupt: {}", e);
            return;
        }
        info!("Received interrupt, stopping");
        on_interrupt.cancel();
    });

    let collector = Collector::new(config, services, cancel);
    if args.once {
        if let Some(report) = collector.run_once(&args.feeds).await? {
            info!("Collected {} new articles", report.accepted());
        }
    } else {
        collector.run(&args.feeds).await?;
    }

    Ok(())
}
