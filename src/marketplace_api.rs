use crate::database::load_auth_token;
use ::serde::{Deserialize, Serialize};
use chrono::NaiveDate;
use reqwest::header::{HeaderMap, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use std::fmt;

use crate::schedule::Availability;

const DEFAULT_UPSTREAM_URL: &str = "http://localhost:3000/api";
const UPSTREAM_URL_ENV: &str = "UPSTREAM_API_URL";

const TUTORS_PATH: &str = "tutors";
const SCHOOLS_PATH: &str = "schools";
const COURSES_PATH: &str = "courses";
const BOOKINGS_PATH: &str = "bookings";

/// Every non-2xx response and every transport failure is normalized to
/// this one shape before it leaves the client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
    pub code: Option<String>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "upstream error ({}): {}", status, self.message),
            None => write!(f, "upstream error: {}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError {
            message: err.to_string(),
            status: err.status().map(|s| s.as_u16()),
            code: None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Tutor {
    pub id: i64,
    pub name: String,
    pub hourly_rate: Option<f64>,
    pub subjects: Vec<String>,
    // Absent availability means "no declared schedule", never an error
    pub availability: Option<Availability>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct School {
    pub id: i64,
    pub name: String,
    pub city: String,
    pub price: Option<f64>,
    pub max_capacity: Option<i64>,
    pub current_occupancy: Option<i64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub level: String,
    pub price: Option<f64>,
    pub max_capacity: Option<i64>,
    pub current_occupancy: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub booking_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tutor_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_id: Option<i64>,
    pub start_date: NaiveDate,
    pub time_slot: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub notes: String,
}

fn upstream_url(path: &str) -> String {
    let base =
        std::env::var(UPSTREAM_URL_ENV).unwrap_or_else(|_| DEFAULT_UPSTREAM_URL.to_string());

    format!("{}/{}", base.trim_end_matches('/'), path)
}

// The bearer token is re-read from the store on every request; absence
// simply means unauthenticated.
fn build_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();

    if let Ok(value) = "application/json".parse() {
        headers.insert(CONTENT_TYPE, value);
    }

    if let Ok(Some(token)) = load_auth_token() {
        if let Ok(value) = format!("Bearer {}", token).parse() {
            headers.insert(AUTHORIZATION, value);
        }
    }

    headers
}

async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    // The backend reports failures as { "message": ..., "code": ... };
    // fall back to the raw body when it doesn't.
    let body = response.text().await.unwrap_or_default();

    let (message, code) = match serde_json::from_str::<Value>(&body) {
        Ok(parsed) => (
            parsed["message"]
                .as_str()
                .unwrap_or(status.as_str())
                .to_string(),
            parsed["code"].as_str().map(|c| c.to_string()),
        ),
        Err(_) => (
            if body.is_empty() {
                status.to_string()
            } else {
                body
            },
            None,
        ),
    };

    Err(ApiError {
        message,
        status: Some(status.as_u16()),
        code,
    })
}

pub async fn get_tutor(id: i64) -> Result<Tutor, ApiError> {
    let client = reqwest::Client::new();

    let response = client
        .get(upstream_url(&format!("{}/{}", TUTORS_PATH, id)))
        .headers(build_headers())
        .send()
        .await?;

    let tutor = check_response(response).await?.json::<Tutor>().await?;

    Ok(tutor)
}

pub async fn get_schools() -> Result<Vec<School>, ApiError> {
    let client = reqwest::Client::new();

    let response = client
        .get(upstream_url(SCHOOLS_PATH))
        .headers(build_headers())
        .send()
        .await?;

    let schools = check_response(response)
        .await?
        .json::<Vec<School>>()
        .await?;

    Ok(schools)
}

pub async fn get_courses(limit: Option<u32>) -> Result<Vec<Course>, ApiError> {
    let client = reqwest::Client::new();

    let mut request = client
        .get(upstream_url(COURSES_PATH))
        .headers(build_headers());

    if let Some(limit) = limit {
        request = request.query(&[("limit", limit)]);
    }

    let response = request.send().await?;

    let courses = check_response(response)
        .await?
        .json::<Vec<Course>>()
        .await?;

    Ok(courses)
}

pub async fn post_booking(booking: &BookingRequest) -> Result<Value, ApiError> {
    let client = reqwest::Client::new();

    let response = client
        .post(upstream_url(BOOKINGS_PATH))
        .headers(build_headers())
        .json(booking)
        .send()
        .await?;

    let confirmation = check_response(response).await?.json::<Value>().await?;

    Ok(confirmation)
}
