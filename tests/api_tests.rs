use axum::http::StatusCode;
use axum_test::TestServer;
use serde_json::json;

use title_classifier::api::{create_router, AppState};
use title_classifier::services::{
    training::{clean_records, prepare, read_records},
    Artifacts, ForestParams, Predictor, RandomForest,
};

const CATALOG: &str = "\
type,title,country,release_year,rating,duration,listed_in
Movie,M1,United States,2015,PG-13,90 min,\"Dramas, Comedies\"
Movie,M2,United States,2016,PG-13,105 min,Comedies
Movie,M3,\"United States, Canada\",2012,R,120 min,Dramas
Movie,M4,India,2018,TV-14,140 min,\"Dramas, International Movies\"
Movie,M5,United Kingdom,2010,R,95 min,\"Comedies, Dramas\"
Movie,M6,United States,2019,PG-13,88 min,Comedies
TV Show,S1,United States,2019,TV-MA,2 Seasons,\"TV Dramas, TV Comedies\"
TV Show,S2,India,2020,TV-14,1 Season,International TV Shows
TV Show,S3,Japan,2021,TV-MA,3 Seasons,\"Anime Series, International TV Shows\"
TV Show,S4,United Kingdom,2017,TV-MA,1 Season,\"British TV Shows, TV Dramas\"
TV Show,S5,United States,2018,TV-14,4 Seasons,TV Comedies
TV Show,S6,Japan,2016,TV-MA,2 Seasons,Anime Series
";

fn predictor() -> Predictor {
    let records = clean_records(read_records(CATALOG.as_bytes()).unwrap()).unwrap();
    let data = prepare(records).unwrap();
    let x: Vec<Vec<f64>> = data.features.iter().map(|f| f.values().to_vec()).collect();
    let params = ForestParams {
        n_trees: 25,
        ..Default::default()
    };
    let model = RandomForest::fit(&x, &data.targets, 2, &params).unwrap();

    Predictor::from_artifacts(Artifacts {
        model,
        feature_columns: data.encoder.columns().to_vec(),
        rating_encoder: data.encoder.rating_encoder().clone(),
        target_encoder: data.target_encoder.clone(),
        top_genres: data.encoder.genres().clone(),
        top_countries: data.encoder.countries().clone(),
    })
}

fn create_test_server() -> TestServer {
    let app = create_router(AppState::new(predictor()).unwrap());
    TestServer::new(app).unwrap()
}

fn form(rating: &str, release_year: &str) -> Vec<(&'static str, String)> {
    vec![
        ("title", "Sample".to_string()),
        ("country", "United States".to_string()),
        ("release_year", release_year.to_string()),
        ("duration", "90 min".to_string()),
        ("rating", rating.to_string()),
        ("listed_in", "Dramas, Comedies".to_string()),
    ]
}

#[tokio::test]
async fn test_health_check() {
    let server = create_test_server();
    let response = server.get("/health").await;
    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let server = create_test_server();

    let response = server.get("/health").await;
    assert!(response.headers().get("x-request-id").is_some());

    let response = server
        .get("/health")
        .add_header(
            axum::http::HeaderName::from_static("x-request-id"),
            axum::http::HeaderValue::from_static("abc-123"),
        )
        .await;
    assert_eq!(
        response.headers().get("x-request-id").unwrap().to_str().unwrap(),
        "abc-123"
    );
}

#[tokio::test]
async fn test_form_page() {
    let server = create_test_server();
    let response = server.get("/").await;
    response.assert_status_ok();
    let html = response.text();
    assert!(html.contains("<form method=\"post\""));
    assert!(html.contains("name=\"listed_in\""));
    assert!(html.contains("<option value=\"PG-13\"></option>"));
}

#[tokio::test]
async fn test_metadata() {
    let server = create_test_server();
    let response = server.get("/metadata").await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let ratings: Vec<&str> = body["ratings"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_str().unwrap())
        .collect();
    assert_eq!(ratings, vec!["PG-13", "R", "TV-14", "TV-MA"]);
    assert!(body["genres"].as_array().unwrap().len() <= 10);
    assert_eq!(body["countries"][0], "United States");
}

#[tokio::test]
async fn test_form_submission_renders_prediction() {
    let server = create_test_server();
    let response = server.post("/").form(&form("PG-13", "2015")).await;
    response.assert_status_ok();

    let html = response.text();
    assert!(html.contains("class=\"result\""));
    assert!(html.contains("<strong>Movie</strong>") || html.contains("<strong>TV Show</strong>"));
    assert!(html.contains("value=\"Dramas, Comedies\""));
}

#[tokio::test]
async fn test_form_with_unknown_rating_is_rejected() {
    let server = create_test_server();
    let response = server.post("/").form(&form("NC-17", "2015")).await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);

    let html = response.text();
    assert!(html.contains("class=\"error\""));
    assert!(html.contains("NC-17"));
}

#[tokio::test]
async fn test_form_with_bad_year_is_rejected() {
    let server = create_test_server();
    let response = server.post("/").form(&form("PG-13", "next year")).await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(response.text().contains("release_year"));
}

#[tokio::test]
async fn test_api_predict() {
    let server = create_test_server();
    let response = server
        .post("/api/v1/predict")
        .json(&json!({
            "title": "Sample",
            "country": "United States",
            "release_year": "2015",
            "duration": "90 min",
            "rating": "PG-13",
            "listed_in": "Dramas, Comedies"
        }))
        .await;
    response.assert_status_ok();

    let body: serde_json::Value = response.json();
    let label = body["label"].as_str().unwrap();
    assert!(label == "Movie" || label == "TV Show");
    let confidence = body["confidence"].as_f64().unwrap();
    assert!((0.0..=1.0).contains(&confidence));
    assert_eq!(body["input"]["title"], "Sample");
}

#[tokio::test]
async fn test_api_predict_separates_clear_cases() {
    let server = create_test_server();

    let movie: serde_json::Value = server
        .post("/api/v1/predict")
        .json(&json!({
            "country": "United States",
            "release_year": "2016",
            "duration": "100 min",
            "rating": "PG-13",
            "listed_in": "Comedies"
        }))
        .await
        .json();
    assert_eq!(movie["label"], "Movie");

    let show: serde_json::Value = server
        .post("/api/v1/predict")
        .json(&json!({
            "country": "Japan",
            "release_year": "2021",
            "duration": "2 Seasons",
            "rating": "TV-MA",
            "listed_in": "Anime Series"
        }))
        .await
        .json();
    assert_eq!(show["label"], "TV Show");
}

#[tokio::test]
async fn test_api_predict_unknown_rating() {
    let server = create_test_server();
    let response = server
        .post("/api/v1/predict")
        .json(&json!({
            "release_year": "2015",
            "rating": "XYZ"
        }))
        .await;
    response.assert_status(StatusCode::UNPROCESSABLE_ENTITY);
    let body: serde_json::Value = response.json();
    assert!(body["error"].as_str().unwrap().contains("XYZ"));
}
