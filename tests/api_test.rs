/// HTTP surface tests: drive the axum router directly with `oneshot`.

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

#[cfg(test)]
mod support {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use brent_impact::app::create_app;
    use brent_impact::config::AppConfig;
    use brent_impact::models::{Event, PricePoint};
    use brent_impact::state::AppState;
    use brent_impact::store::SeriesStore;
    use chrono::{Duration, NaiveDate};
    use serde_json::Value;
    use tower::ServiceExt;

    pub fn d(date: &str) -> NaiveDate {
        NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap()
    }

    fn event(date: &str, name: &str, category: &str, level: &str) -> Event {
        Event {
            date: d(date),
            name: name.to_string(),
            description: format!("{} (test fixture)", name),
            category: category.to_string(),
            impact_level: level.to_string(),
        }
    }

    /// 120 daily prices from 2020-01-01: flat around 60, then a 1% daily
    /// climb from day 60.
    pub fn app() -> Router {
        let start = d("2020-01-01");
        let mut price = 60.0;
        let points = (0..120)
            .map(|i| {
                let wobble = if i % 2 == 0 { 1.002 } else { 0.998 };
                price *= if i >= 60 { 1.01 * wobble } else { wobble };
                PricePoint::new(start + Duration::days(i), price)
            })
            .collect();
        let store = SeriesStore::new(
            points,
            vec![
                event("2020-01-01", "Start of year", "Economic", "Low"),
                event("2020-03-01", "Supply cut", "OPEC", "High"),
                event("2020-03-15", "Sanctions", "Geopolitical", "Medium"),
            ],
        )
        .unwrap();
        create_app(AppState::new(store, &AppConfig::default()))
    }

    pub async fn get(uri: &str) -> (StatusCode, Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}

// ---------------------------------------------------------------------------
// Metadata and listing endpoints
// ---------------------------------------------------------------------------

#[cfg(test)]
mod listing {
    use super::support::get;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_unknown_routes_are_json_404() {
        let (status, body) = get("/api/no-such-endpoint").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
        assert!(body["message"].as_str().unwrap().contains("/api/no-such-endpoint"));

        let (status, body) = get("/favicon.ico").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "not_found");
    }

    #[tokio::test]
    async fn test_prices_are_parallel_arrays() {
        let (status, body) = get("/api/prices?start_date=2020-01-10&end_date=2020-01-19").await;
        assert_eq!(status, StatusCode::OK);
        let dates = body["dates"].as_array().unwrap();
        let prices = body["prices"].as_array().unwrap();
        assert_eq!(dates.len(), 10);
        assert_eq!(dates.len(), prices.len());
        assert_eq!(dates[0], "2020-01-10");
        assert_eq!(dates[9], "2020-01-19");
    }

    #[tokio::test]
    async fn test_prices_reject_malformed_dates() {
        let (status, body) = get("/api/prices?start_date=10-Jan-20").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    #[tokio::test]
    async fn test_events_filtering() {
        let (status, body) = get("/api/events?category=OPEC").await;
        assert_eq!(status, StatusCode::OK);
        let events = body["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event"], "Supply cut");
        assert_eq!(events[0]["date"], "2020-03-01");

        let (_, body) = get("/api/events?start_date=2020-02-01").await;
        assert_eq!(body["events"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_categories_and_date_range() {
        let (status, body) = get("/api/categories").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["categories"], serde_json::json!(["Economic", "OPEC", "Geopolitical"]));
        assert_eq!(body["impact_levels"], serde_json::json!(["Low", "High", "Medium"]));

        let (status, body) = get("/api/date-range").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["start_date"], "2020-01-01");
        assert_eq!(body["end_date"], "2020-04-29");
    }
}

// ---------------------------------------------------------------------------
// Statistics and impact endpoints
// ---------------------------------------------------------------------------

#[cfg(test)]
mod analysis {
    use super::support::get;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_statistics_summary() {
        let (status, body) = get("/api/statistics?start_date=2020-01-01&end_date=2020-01-31").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 31);
        let (min, median, max) = (
            body["min"].as_f64().unwrap(),
            body["median"].as_f64().unwrap(),
            body["max"].as_f64().unwrap(),
        );
        assert!(min <= median && median <= max);
        assert!(body["volatility"].as_f64().unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_statistics_empty_range_is_client_error() {
        let (status, body) = get("/api/statistics?start_date=2021-01-01&end_date=2021-02-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "empty_range");
    }

    #[tokio::test]
    async fn test_statistics_single_point_is_unprocessable() {
        let (status, body) = get("/api/statistics?start_date=2020-01-05&end_date=2020-01-05").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "insufficient_data");
    }

    #[tokio::test]
    async fn test_impact_at_series_start_is_null() {
        let (status, body) = get("/api/event-impact?event_date=2020-01-01&window_days=30").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["impact"].is_null());
        assert_eq!(body["status"], "insufficient_data");
        assert_eq!(body["event_date"], "2020-01-01");
        assert_eq!(body["dates"].as_array().unwrap().len(), 31);
    }

    #[tokio::test]
    async fn test_impact_with_full_windows() {
        let (status, body) = get("/api/event-impact?event_date=2020-03-01").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        let impact = &body["impact"];
        assert_eq!(impact["window_days"], 30);
        assert_eq!(impact["before_points"], 30);
        assert!(impact["price_after"].as_f64().unwrap() > impact["price_before"].as_f64().unwrap());
        assert_eq!(
            body["dates"].as_array().unwrap().len(),
            body["prices"].as_array().unwrap().len()
        );
    }

    #[tokio::test]
    async fn test_impact_rejects_bad_requests() {
        let (status, body) = get("/api/event-impact?event_date=2019-06-01").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "date_out_of_range");

        let (status, body) = get("/api/event-impact?event_date=2020-03-01&window_days=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");

        let (status, _) = get("/api/event-impact").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_batch_impacts() {
        let (status, body) = get("/api/event-impacts?window_days=10").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["window_days"], 10);
        let results = body["results"].as_array().unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0]["status"], "insufficient_data");
        assert_eq!(results[1]["status"], "ok");
        assert_eq!(results[1]["event"]["event"], "Supply cut");
    }
}

// ---------------------------------------------------------------------------
// Change-point endpoints
// ---------------------------------------------------------------------------

#[cfg(test)]
mod change_points {
    use super::support::get;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_change_point_over_full_series() {
        let (status, body) = get("/api/change-point").await;
        assert_eq!(status, StatusCode::OK);
        let estimate = &body["estimate"];
        let change_index = estimate["change_index"].as_u64().unwrap();
        assert!((55..=66).contains(&change_index), "{}", change_index);
        assert_eq!(
            estimate["before_segment"]["end_index"].as_u64().unwrap() + 1,
            estimate["after_segment"]["start_index"].as_u64().unwrap()
        );
        assert!(body["posterior"].as_array().map(|p| !p.is_empty()).unwrap_or(false));
        assert_eq!(body["diagnostics"]["chains"], 4);
    }

    #[tokio::test]
    async fn test_change_point_short_range_is_unprocessable() {
        let (status, body) = get("/api/change-point?start_date=2020-01-01&end_date=2020-01-05").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "insufficient_data");
    }

    #[tokio::test]
    async fn test_change_points_validates_limit() {
        let (status, body) = get("/api/change-points?max_change_points=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "validation");
    }

    #[tokio::test]
    async fn test_change_points_policy() {
        let (status, body) = get("/api/change-points?max_change_points=2").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["policy"], "binary_segmentation_bic");
        assert_eq!(body["max_change_points"], 2);
        assert!(body["change_points"].as_array().unwrap().len() <= 2);
    }
}
