use std::convert::Infallible;
use std::sync::Arc;

use serde_json::json;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

use crate::aggregate::QueryError;
use crate::dashboard::DashboardView;
use crate::model::{self, AirQualityIngest, BirdIngest, WeatherIngest};
use crate::store::StoreError;
use crate::WeatherHub;

/// Binds the API on all interfaces and serves until the process exits.
pub async fn run(hub: Arc<WeatherHub>, port: u16) {
    warp::serve(routes(hub)).run(([0, 0, 0, 0], port)).await;
}

/// The full route tree, rejections already recovered into the documented
/// JSON bodies. Split from `run` so tests can drive it with `warp::test`.
pub fn routes(
    hub: Arc<WeatherHub>,
) -> impl Filter<Extract = impl Reply, Error = Infallible> + Clone {
    api_routes(hub).recover(handle_rejection)
}

fn api_routes(
    hub: Arc<WeatherHub>,
) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    // Paths are matched before methods so an unknown path rejects as
    // not-found rather than method-not-allowed.

    // 1. POST /weather/latest
    let ingest_weather = warp::path!("weather" / "latest")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_hub(hub.clone()))
        .and_then(|body: WeatherIngest, hub: Arc<WeatherHub>| async move {
            if !model::id_is_valid(&body.id) {
                return Ok::<_, Rejection>(invalid_request());
            }
            Ok(ack("weather", hub.ingest_weather(body)))
        });

    // 2. POST /air/latest
    let ingest_air = warp::path!("air" / "latest")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_hub(hub.clone()))
        .and_then(|body: AirQualityIngest, hub: Arc<WeatherHub>| async move {
            if !model::id_is_valid(&body.id) {
                return Ok::<_, Rejection>(invalid_request());
            }
            Ok(ack("air", hub.ingest_air_quality(body)))
        });

    // 3. POST /birds/latest
    let ingest_birds = warp::path!("birds" / "latest")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_hub(hub.clone()))
        .and_then(|body: BirdIngest, hub: Arc<WeatherHub>| async move {
            if !model::id_is_valid(&body.id) {
                return Ok::<_, Rejection>(invalid_request());
            }
            Ok(ack("birds", hub.ingest_bird(body)))
        });

    // --- QUERY ROUTES ---

    // 4. GET /weather/latest
    let latest_weather = warp::path!("weather" / "latest")
        .and(warp::get())
        .and(with_hub(hub.clone()))
        .and_then(|hub: Arc<WeatherHub>| async move {
            Ok::<_, Rejection>(match hub.latest_weather() {
                Ok(r) => json_reply(
                    StatusCode::OK,
                    &json!({
                        "temperature": r.temperature,
                        "humidity": r.humidity,
                        "pressure": r.pressure,
                        "reading_time": r.ts,
                    }),
                ),
                Err(e) => query_failure("weather", e),
            })
        });

    // 5. GET /weather/recent
    let recent_weather = warp::path!("weather" / "recent")
        .and(warp::get())
        .and(with_hub(hub.clone()))
        .and_then(|hub: Arc<WeatherHub>| async move {
            Ok::<_, Rejection>(match hub.recent_weather() {
                Ok(s) => json_reply(StatusCode::OK, &s),
                Err(e) => query_failure("weather", e),
            })
        });

    // 6. GET /air/latest
    let latest_air = warp::path!("air" / "latest")
        .and(warp::get())
        .and(with_hub(hub.clone()))
        .and_then(|hub: Arc<WeatherHub>| async move {
            Ok::<_, Rejection>(match hub.latest_air_quality() {
                Ok(r) => json_reply(
                    StatusCode::OK,
                    &json!({
                        "pm1": r.pm1,
                        "pm2_5": r.pm2_5,
                        "pm10": r.pm10,
                        "reading_time": r.ts,
                    }),
                ),
                Err(e) => query_failure("air", e),
            })
        });

    // 7. GET /air/recent
    let recent_air = warp::path!("air" / "recent")
        .and(warp::get())
        .and(with_hub(hub.clone()))
        .and_then(|hub: Arc<WeatherHub>| async move {
            Ok::<_, Rejection>(match hub.recent_air_quality() {
                Ok(s) => json_reply(StatusCode::OK, &s),
                Err(e) => query_failure("air", e),
            })
        });

    // 8. GET /birds/latest
    let latest_birds = warp::path!("birds" / "latest")
        .and(warp::get())
        .and(with_hub(hub.clone()))
        .and_then(|hub: Arc<WeatherHub>| async move {
            Ok::<_, Rejection>(match hub.latest_bird() {
                Ok(r) => json_reply(
                    StatusCode::OK,
                    &json!({
                        "scientific_name": r.scientific_name,
                        "common_name": r.common_name,
                        "confidence": r.confidence,
                        "reading_time": r.ts,
                    }),
                ),
                Err(e) => query_failure("birds", e),
            })
        });

    // 9. GET /birds/recent
    let recent_birds = warp::path!("birds" / "recent")
        .and(warp::get())
        .and(with_hub(hub.clone()))
        .and_then(|hub: Arc<WeatherHub>| async move {
            Ok::<_, Rejection>(match hub.observed_birds() {
                Ok(s) => json_reply(StatusCode::OK, &s),
                Err(e) => query_failure("birds", e),
            })
        });

    // 10. GET / (dashboard)
    let dashboard = warp::path::end()
        .and(warp::get())
        .and(with_hub(hub))
        .and_then(|hub: Arc<WeatherHub>| async move {
            let view = DashboardView::gather(&hub);
            Ok::<_, Rejection>(warp::reply::html(view.render()))
        });

    ingest_weather
        .or(ingest_air)
        .or(ingest_birds)
        .or(latest_weather)
        .or(recent_weather)
        .or(latest_air)
        .or(recent_air)
        .or(latest_birds)
        .or(recent_birds)
        .or(dashboard)
}

fn with_hub(
    hub: Arc<WeatherHub>,
) -> impl Filter<Extract = (Arc<WeatherHub>,), Error = Infallible> + Clone {
    warp::any().map(move || hub.clone())
}

fn json_reply<T: serde::Serialize>(
    status: StatusCode,
    body: &T,
) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(body), status)
}

fn invalid_request() -> warp::reply::WithStatus<warp::reply::Json> {
    json_reply(
        StatusCode::BAD_REQUEST,
        &json!({ "error": "Request data issue" }),
    )
}

/// 200 whether the row was stored or the id had already been seen; only a
/// store fault turns into an error.
fn ack(category: &str, outcome: Result<bool, StoreError>) -> warp::reply::WithStatus<warp::reply::Json> {
    match outcome {
        Ok(inserted) => {
            if !inserted {
                tracing::debug!("{}: duplicate reading acknowledged", category);
            }
            json_reply(StatusCode::OK, &json!({ "success": true }))
        }
        Err(e) => {
            tracing::error!("{}: append failed: {}", category, e);
            json_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": "Storage unavailable" }),
            )
        }
    }
}

fn query_failure(category: &str, err: QueryError) -> warp::reply::WithStatus<warp::reply::Json> {
    match err {
        QueryError::NoRecentReadings => json_reply(
            StatusCode::INTERNAL_SERVER_ERROR,
            &json!({ "error": "No recent readings" }),
        ),
        QueryError::Store(e) => {
            tracing::error!("{}: query failed: {}", category, e);
            json_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({ "error": "Storage unavailable" }),
            )
        }
    }
}

async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    if err.find::<warp::filters::body::BodyDeserializeError>().is_some() {
        return Ok(invalid_request());
    }
    if err.is_not_found() {
        return Ok(json_reply(
            StatusCode::NOT_FOUND,
            &json!({ "error": "Not found" }),
        ));
    }
    if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        return Ok(json_reply(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({ "error": "Method not allowed" }),
        ));
    }
    tracing::error!("unhandled rejection: {:?}", err);
    Ok(json_reply(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "error": "Internal error" }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HubConfig, WindowConfig};
    use crate::model::epoch_now;
    use serde_json::Value;
    use tempfile::tempdir;

    fn test_hub(dir: &tempfile::TempDir) -> Arc<WeatherHub> {
        let config = HubConfig {
            db_path: dir.path().join("hub.db"),
            windows: WindowConfig::default(),
        };
        Arc::new(WeatherHub::open(&config).unwrap())
    }

    fn parse(body: &[u8]) -> Value {
        serde_json::from_slice(body).unwrap()
    }

    #[tokio::test]
    async fn ingested_reading_is_immediately_visible() {
        let dir = tempdir().unwrap();
        let routes = routes(test_hub(&dir));
        let ts = epoch_now();

        let resp = warp::test::request()
            .method("POST")
            .path("/weather/latest")
            .json(&json!({
                "id": "run-1", "ts": ts,
                "temperature": 21.5, "humidity": 40.0, "pressure": 1012.0,
            }))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(parse(resp.body())["success"], true);

        let resp = warp::test::request()
            .method("GET")
            .path("/weather/latest")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        let body = parse(resp.body());
        assert_eq!(body["temperature"], 21.5);
        assert_eq!(body["reading_time"].as_f64(), Some(ts));

        let resp = warp::test::request()
            .method("GET")
            .path("/weather/recent")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        let body = parse(resp.body());
        assert_eq!(body["num_readings"], 1);
        assert_eq!(body["temperature"], 21.5);
    }

    #[tokio::test]
    async fn malformed_payload_is_rejected_without_a_write() {
        let dir = tempdir().unwrap();
        let routes = routes(test_hub(&dir));

        // Missing pressure.
        let resp = warp::test::request()
            .method("POST")
            .path("/weather/latest")
            .json(&json!({
                "id": "run-1", "ts": epoch_now(),
                "temperature": 21.5, "humidity": 40.0,
            }))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 400);
        assert_eq!(parse(resp.body())["error"], "Request data issue");

        // Mistyped temperature.
        let resp = warp::test::request()
            .method("POST")
            .path("/weather/latest")
            .json(&json!({
                "id": "run-2", "ts": epoch_now(),
                "temperature": "warm", "humidity": 40.0, "pressure": 1000.0,
            }))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 400);

        // Nothing made it to the store.
        let resp = warp::test::request()
            .method("GET")
            .path("/weather/recent")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 500);
        assert_eq!(parse(resp.body())["error"], "No recent readings");
    }

    #[tokio::test]
    async fn blank_id_is_rejected_without_a_write() {
        let dir = tempdir().unwrap();
        let routes = routes(test_hub(&dir));

        let resp = warp::test::request()
            .method("POST")
            .path("/air/latest")
            .json(&json!({
                "id": "   ", "ts": epoch_now(),
                "pm1": 3.0, "pm2_5": 6.0, "pm10": 9.0,
            }))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 400);
        assert_eq!(parse(resp.body())["error"], "Request data issue");

        let resp = warp::test::request()
            .method("GET")
            .path("/air/recent")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 500);
    }

    #[tokio::test]
    async fn duplicate_delivery_acks_without_a_second_row() {
        let dir = tempdir().unwrap();
        let routes = routes(test_hub(&dir));
        let payload = json!({
            "id": "run-9", "ts": epoch_now(),
            "temperature": 20.0, "humidity": 50.0, "pressure": 1000.0,
        });

        for _ in 0..2 {
            let resp = warp::test::request()
                .method("POST")
                .path("/weather/latest")
                .json(&payload)
                .reply(&routes)
                .await;
            assert_eq!(resp.status(), 200);
            assert_eq!(parse(resp.body())["success"], true);
        }

        let resp = warp::test::request()
            .method("GET")
            .path("/weather/recent")
            .reply(&routes)
            .await;
        assert_eq!(parse(resp.body())["num_readings"], 1);
    }

    #[tokio::test]
    async fn empty_window_reports_no_recent_readings() {
        let dir = tempdir().unwrap();
        let routes = routes(test_hub(&dir));

        for path in ["/weather/latest", "/air/recent", "/birds/recent"] {
            let resp = warp::test::request()
                .method("GET")
                .path(path)
                .reply(&routes)
                .await;
            assert_eq!(resp.status(), 500, "{}", path);
            assert_eq!(parse(resp.body())["error"], "No recent readings");
        }
    }

    #[tokio::test]
    async fn store_failure_is_distinguishable_from_an_empty_window() {
        let dir = tempdir().unwrap();
        let routes = routes(test_hub(&dir));

        // Pull the weather table out from under the hub through a second
        // connection to the same file.
        let raw = rusqlite::Connection::open(dir.path().join("hub.db")).unwrap();
        raw.execute_batch("DROP TABLE thp_readings").unwrap();

        let resp = warp::test::request()
            .method("GET")
            .path("/weather/recent")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 500);
        assert_eq!(parse(resp.body())["error"], "Storage unavailable");

        let resp = warp::test::request()
            .method("POST")
            .path("/weather/latest")
            .json(&json!({
                "id": "run-1", "ts": epoch_now(),
                "temperature": 21.5, "humidity": 40.0, "pressure": 1012.0,
            }))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 500);
        assert_eq!(parse(resp.body())["error"], "Storage unavailable");

        // An intact category with no rows keeps its own body.
        let resp = warp::test::request()
            .method("GET")
            .path("/air/recent")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 500);
        assert_eq!(parse(resp.body())["error"], "No recent readings");
    }

    #[tokio::test]
    async fn bird_ranking_is_served_over_the_short_window() {
        let dir = tempdir().unwrap();
        let routes = routes(test_hub(&dir));
        let now = epoch_now();

        let calls = [
            ("b-1", "Great Tit", 0.2),
            ("b-2", "Great Tit", 0.3),
            ("b-3", "Blue Tit", 0.05),
        ];
        for (id, name, confidence) in calls {
            let resp = warp::test::request()
                .method("POST")
                .path("/birds/latest")
                .json(&json!({
                    "id": id, "ts": now,
                    "scientific_name": "Parus sp.",
                    "common_name": name,
                    "confidence": confidence,
                }))
                .reply(&routes)
                .await;
            assert_eq!(resp.status(), 200);
        }

        let resp = warp::test::request()
            .method("GET")
            .path("/birds/recent")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        let body = parse(resp.body());
        assert_eq!(body["num_readings"], 2);
        let sightings = body["sightings"].as_array().unwrap();
        assert_eq!(sightings.len(), 1);
        assert_eq!(sightings[0]["common_name"], "Great Tit");
        assert!((sightings[0]["confidence"].as_f64().unwrap() - 0.5).abs() < 1e-9);

        let resp = warp::test::request()
            .method("GET")
            .path("/birds/latest")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);
        assert_eq!(parse(resp.body())["common_name"], "Blue Tit");
    }

    #[tokio::test]
    async fn dashboard_isolates_empty_categories() {
        let dir = tempdir().unwrap();
        let routes = routes(test_hub(&dir));

        let resp = warp::test::request()
            .method("POST")
            .path("/weather/latest")
            .json(&json!({
                "id": "run-1", "ts": epoch_now(),
                "temperature": 21.5, "humidity": 40.0, "pressure": 1012.0,
            }))
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 200);

        let resp = warp::test::request().method("GET").path("/").reply(&routes).await;
        assert_eq!(resp.status(), 200);
        let html = String::from_utf8(resp.body().to_vec()).unwrap();
        assert!(html.contains("21.5"));
        // Air and birds have nothing yet; the page still serves.
        assert_eq!(html.matches("unavailable").count(), 2);
    }

    #[tokio::test]
    async fn unknown_routes_are_not_found() {
        let dir = tempdir().unwrap();
        let routes = routes(test_hub(&dir));

        let resp = warp::test::request()
            .method("GET")
            .path("/weather/nope")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 404);
        assert_eq!(parse(resp.body())["error"], "Not found");

        // A known path with the wrong method is a different failure.
        let resp = warp::test::request()
            .method("DELETE")
            .path("/weather/latest")
            .reply(&routes)
            .await;
        assert_eq!(resp.status(), 405);
        assert_eq!(parse(resp.body())["error"], "Method not allowed");
    }
}
