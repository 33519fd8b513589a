use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use frontend::{api, presenter::LogPresenter, quoter::Quoter};
use model::order::OrderCodec;
use shared::{
    explorer_api::{DefaultExplorerApi, ExplorerApi, RequestPacer},
    monitor::{
        self,
        cursor::CursorStore,
        ring::EventRing,
        stats::{self, StatsRegistry},
        MonitorHandle, Presenter, Reseller,
    },
    oneclick_api::{DefaultOneClickApi, OneClickApi},
    rate_limiter::RequestLimiter,
    token_list::TokenCache,
};
use std::{net::SocketAddr, path::PathBuf, sync::Arc, time::Duration};
use url::Url;

#[derive(Debug, Parser)]
struct Arguments {
    #[clap(long, env, default_value = "warn,frontend=debug,shared=debug,model=debug")]
    log_filter: String,

    #[clap(long, env, default_value = "0.0.0.0:3000")]
    bind_address: SocketAddr,

    /// 64 character hex encoding of the 32 byte order token key. When unset
    /// an ephemeral key is generated and issued tokens do not survive a
    /// restart.
    #[clap(long, env)]
    order_secret: Option<String>,

    #[clap(long, env, default_value = shared::oneclick_api::DEFAULT_URL)]
    oneclick_url: Url,

    /// Bearer token for the upstream intent API; enables the zero protocol
    /// fee tier.
    #[clap(long, env)]
    oneclick_bearer: Option<String>,

    #[clap(long, env, default_value = shared::explorer_api::DEFAULT_URL)]
    explorer_url: Url,

    #[clap(long, env)]
    explorer_bearer: Option<String>,

    /// Minimum delay in seconds between explorer requests, shared by every
    /// caller in the process.
    #[clap(long, env, default_value = "6", value_parser = shared::arguments::duration_from_seconds)]
    explorer_request_period: Duration,

    /// Timeout in seconds for all outbound http requests.
    #[clap(long, env, default_value = "30", value_parser = shared::arguments::duration_from_seconds)]
    http_timeout: Duration,

    /// How long in seconds a token list snapshot stays fresh.
    #[clap(long, env, default_value = "300", value_parser = shared::arguments::duration_from_seconds)]
    token_cache_max_age: Duration,

    /// Presentation group for the competitor monitor. Setting it enables
    /// the monitor subsystem.
    #[clap(long, env)]
    monitor_group_id: Option<i64>,

    /// Tracked resellers as comma separated NAME:affiliate:thread_id
    /// triples. A thread id of 0 disables per transaction cards.
    #[clap(
        long,
        env,
        default_value = "SWAP.MY:swapmybuddy.near:0,EAGLESWAP:Gcj5A3a5mF2BEPm4LujddTit7tTR8pNmUKXkcuzM4dC1:0,LIZARDSWAP:trustswap.near:0"
    )]
    monitor_resellers: String,

    #[clap(long, env, default_value = "data/monitor_state.json")]
    monitor_state_file: PathBuf,

    /// Lifetime totals JSON used to seed the monitor statistics, keyed by
    /// affiliate.
    #[clap(long, env)]
    monitor_baseline: Option<PathBuf>,
}

#[tokio::main]
async fn main() {
    let args = Arguments::parse();
    shared::tracing::initialize(&args.log_filter);
    tracing::info!(
        bind = %args.bind_address,
        upstream = %args.oneclick_url,
        authenticated = args.oneclick_bearer.is_some(),
        "running swap frontend"
    );

    let client = shared::http_client(args.http_timeout);
    let codec =
        OrderCodec::from_hex_secret(args.order_secret.as_deref()).expect("invalid order secret");
    let oneclick: Arc<dyn OneClickApi> = Arc::new(DefaultOneClickApi::new(
        client.clone(),
        args.oneclick_url.clone(),
        args.oneclick_bearer.clone(),
    ));

    let tokens = Arc::new(TokenCache::new(oneclick.clone(), args.token_cache_max_age));
    if let Err(err) = tokens.refresh().await {
        tracing::warn!(?err, "initial token cache load failed, will retry");
    }
    tokens.spawn_maintenance_task(args.token_cache_max_age);

    let limiter = Arc::new(RequestLimiter::default());
    limiter.spawn_gc(Duration::from_secs(5 * 60));

    let monitor = args
        .monitor_group_id
        .map(|group_id| start_monitor(&args, group_id, client).expect("invalid monitor configuration"));

    let quoter = Arc::new(Quoter::new(tokens.clone(), oneclick, codec, limiter));
    let routes = api::handle_all_routes(quoter, tokens, monitor);
    tracing::info!(address = %args.bind_address, "serving api");
    warp::serve(routes).run(args.bind_address).await;
}

fn start_monitor(
    args: &Arguments,
    group_id: i64,
    client: reqwest::Client,
) -> Result<Arc<MonitorHandle>> {
    let resellers = parse_resellers(&args.monitor_resellers)?;
    if resellers.is_empty() {
        bail!("monitor enabled but no resellers configured");
    }

    let mut registry = StatsRegistry::new(
        resellers
            .iter()
            .map(|reseller| reseller.affiliate.clone()),
    );
    if let Some(path) = &args.monitor_baseline {
        match stats::load_baseline(path) {
            Ok(baseline) => registry = registry.with_baseline(&baseline),
            Err(err) => tracing::warn!(?err, "failed to load monitor baseline"),
        }
    }
    let registry = Arc::new(registry);
    let ring = Arc::new(EventRing::default());
    let cursors = Arc::new(CursorStore::new(args.monitor_state_file.clone()));
    let explorer: Arc<dyn ExplorerApi> = Arc::new(DefaultExplorerApi::new(
        client,
        args.explorer_url.clone(),
        args.explorer_bearer.clone(),
        RequestPacer::new(args.explorer_request_period),
    ));
    let presenter: Arc<dyn Presenter> = Arc::new(LogPresenter { group_id });

    monitor::spawn_pollers(
        &resellers,
        explorer,
        registry.clone(),
        ring.clone(),
        cursors,
        Some(presenter),
        args.explorer_request_period,
    );
    tracing::info!(resellers = resellers.len(), "competitor monitor enabled");
    Ok(Arc::new(MonitorHandle {
        resellers,
        stats: registry,
        ring,
    }))
}

/// Parses a comma separated list of colon separated NAME:affiliate:thread_id
/// triples. The thread id may be omitted; 0 means "no thread".
fn parse_resellers(s: &str) -> Result<Vec<Reseller>> {
    let mut resellers = Vec::new();
    if s.trim().is_empty() {
        return Ok(resellers);
    }
    for entry in s.split(',') {
        let mut parts = entry.trim().split(':');
        let name = parts
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| anyhow!("missing reseller name in {entry:?}"))?;
        let affiliate = parts
            .next()
            .filter(|affiliate| !affiliate.is_empty())
            .ok_or_else(|| anyhow!("missing affiliate in {entry:?}"))?;
        let thread_id = match parts.next() {
            None | Some("") | Some("0") => None,
            Some(value) => Some(
                value
                    .parse()
                    .with_context(|| format!("invalid thread id in {entry:?}"))?,
            ),
        };
        if parts.next().is_some() {
            bail!("too many fields in {entry:?}");
        }
        resellers.push(Reseller {
            name: name.to_string(),
            affiliate: affiliate.to_string(),
            thread_id,
        });
    }
    Ok(resellers)
}
