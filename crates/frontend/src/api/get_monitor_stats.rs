use serde::Serialize;
use shared::{
    api::{error, ApiReply},
    monitor::MonitorHandle,
};
use std::{convert::Infallible, sync::Arc};
use warp::{
    hyper::StatusCode,
    reply::{json, with_status},
    Filter, Rejection,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResellerStats {
    name: String,
    affiliate: String,
    fee_usd: f64,
    volume_usd: f64,
    swaps: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonitorStats {
    resellers: Vec<ResellerStats>,
    total_fee_usd: f64,
}

pub fn get_monitor_stats(
    monitor: Option<Arc<MonitorHandle>>,
) -> impl Filter<Extract = (ApiReply,), Error = Rejection> + Clone {
    warp::path!("monitor" / "stats")
        .and(warp::get())
        .and_then(move || {
            let monitor = monitor.clone();
            async move {
                let reply = match monitor {
                    None => with_status(
                        error("NotFound", "the monitor is not enabled"),
                        StatusCode::NOT_FOUND,
                    ),
                    Some(monitor) => {
                        let resellers = monitor
                            .resellers
                            .iter()
                            .map(|reseller| {
                                let totals = monitor
                                    .stats
                                    .snapshot(&reseller.affiliate)
                                    .unwrap_or_default();
                                ResellerStats {
                                    name: reseller.name.clone(),
                                    affiliate: reseller.affiliate.clone(),
                                    fee_usd: totals.fee_usd,
                                    volume_usd: totals.volume_usd,
                                    swaps: totals.swaps,
                                }
                            })
                            .collect();
                        with_status(
                            json(&MonitorStats {
                                resellers,
                                total_fee_usd: monitor.stats.total_fee_usd(),
                            }),
                            StatusCode::OK,
                        )
                    }
                };
                Result::<_, Infallible>::Ok(reply)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::monitor::{ring::EventRing, stats::StatsRegistry, Reseller};

    #[tokio::test]
    async fn disabled_monitor_is_not_found() {
        let filter = get_monitor_stats(None);
        let response = warp::test::request()
            .path("/monitor/stats")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reports_running_totals() {
        let stats = Arc::new(StatsRegistry::new(["partner.near".to_string()]));
        stats.add("partner.near", 15.0, 1000.0);
        let monitor = Arc::new(MonitorHandle {
            resellers: vec![Reseller {
                name: "SWAPCO".to_string(),
                affiliate: "partner.near".to_string(),
                thread_id: None,
            }],
            stats,
            ring: Arc::new(EventRing::default()),
        });

        let filter = get_monitor_stats(Some(monitor));
        let response = warp::test::request()
            .path("/monitor/stats")
            .reply(&filter)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body: serde_json::Value = serde_json::from_slice(response.body()).unwrap();
        assert_eq!(body["totalFeeUsd"], 15.0);
        assert_eq!(body["resellers"][0]["name"], "SWAPCO");
        assert_eq!(body["resellers"][0]["swaps"], 1);
    }
}
