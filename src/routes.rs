use crate::*;
use ::serde::{Deserialize, Serialize};
use actix_web::*;
use chrono::NaiveDate;
use serde_json::Value;

#[derive(Debug, Serialize, Deserialize)]
struct ReturnAvailability {
    tutor_id: i64,
    date: NaiveDate,
    day: String,
    slots: Vec<ResolvedSlot>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReturnComparison {
    items: Vec<ComparisonItem>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ComparisonRow {
    item: ComparisonItem,
    // Live school/course record from the listing caches, when one matches
    live: Option<Value>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ReturnComparisonTable {
    kind: String,
    rows: Vec<ComparisonRow>,
    cheapest_index: Option<usize>,
    most_available_index: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CapacityNotice {
    message: String,
    kind: String,
    max: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct Status {
    alive: bool,
    last_change: u64,
    cached_schools: usize,
    cached_courses: usize,
}

#[derive(Debug, Serialize, Deserialize)]
struct AuthToken {
    token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StaleNotice {
    tutor_id: i64,
    message: String,
}

#[get("/status")]
pub async fn get_status(state: web::Data<SharedState>) -> HttpResponse {
    let lock = state.lock().await;

    HttpResponse::Ok().json(Status {
        alive: true,
        last_change: lock.last_change,
        cached_schools: lock.schools_cache.len(),
        cached_courses: lock.courses_cache.len(),
    })
}

/// Resolve a tutor's bookable slots for one calendar date. Upstream
/// failures and absent schedules both come back as an empty slot list so
/// the booking form can always render a "choose another day" state.
#[get("/getAvailability/{tutor_id}/{date}")]
pub async fn get_availability(
    path: web::Path<(i64, String)>,
    state: web::Data<SharedState>,
) -> HttpResponse {
    let (tutor_id, raw_date) = path.into_inner();

    let date = match raw_date.parse::<NaiveDate>() {
        Ok(date) => date,
        Err(_) => {
            return HttpResponse::BadRequest().json("Invalid date, expected YYYY-MM-DD");
        }
    };

    let day = Day::from_date(date);

    // Record which tutor this fetch is for, so a slow response for a
    // previously selected tutor can be discarded below.
    let mut lock = state.lock().await;
    lock.begin_availability_fetch(tutor_id);
    drop(lock);

    let tutor = match get_tutor(tutor_id).await {
        Ok(tutor) => Some(tutor),
        Err(e) => {
            error!("Could not fetch tutor {}: {}", tutor_id, e);
            None
        }
    };

    let lock = state.lock().await;

    if !lock.availability_response_is_current(tutor_id) {
        info!("Discarding stale availability response for tutor {}", tutor_id);
        return HttpResponse::Conflict().json(StaleNotice {
            tutor_id,
            message: "A different tutor was requested while this fetch was in flight".to_string(),
        });
    }

    let reserved = reserved_times(&lock.bookings, tutor_id, date);

    drop(lock);

    let slots = match &tutor {
        Some(tutor) => resolve_day_schedule(tutor.availability.as_ref(), date),
        None => Vec::new(),
    };

    HttpResponse::Ok().json(ReturnAvailability {
        tutor_id,
        date,
        day: day.name().to_string(),
        slots: mark_reserved(slots, &reserved),
    })
}

/// Forward a booking to the upstream API and remember it locally so its
/// slot shows up as reserved on later availability lookups.
#[post("/submitBooking")]
pub async fn submit_booking(
    post: web::Json<BookingRequest>,
    state: web::Data<SharedState>,
) -> HttpResponse {
    let mut booking = post.into_inner();

    let time_slot = match normalize_time(&booking.time_slot) {
        Some(time_slot) => time_slot,
        None => return HttpResponse::BadRequest().json("Invalid time slot"),
    };

    booking.time_slot = time_slot;

    let target_missing = match booking.booking_type.as_str() {
        "tutor" => booking.tutor_id.is_none(),
        "course" => booking.course_id.is_none(),
        _ => true,
    };

    if target_missing {
        return HttpResponse::BadRequest().json("Booking needs a tutor_id or course_id");
    }

    let confirmation = match post_booking(&booking).await {
        Ok(confirmation) => confirmation,
        Err(e) => {
            error!("Booking submission failed: {}", e);
            let status = e.status.unwrap_or(502);
            return HttpResponse::build(
                http::StatusCode::from_u16(status).unwrap_or(http::StatusCode::BAD_GATEWAY),
            )
            .json(e);
        }
    };

    let mut lock = state.lock().await;

    lock.bookings.push(booking);
    lock.last_change = get_unix_timestamp();

    let _ = save_bookings(&lock.bookings);

    drop(lock);

    HttpResponse::Ok().json(confirmation)
}

/// Store (or clear, with a null token) the bearer token the upstream
/// client sends on every request.
#[post("/setAuthToken")]
pub async fn set_auth_token(post: web::Json<AuthToken>) -> HttpResponse {
    let token = post.into_inner().token;

    match save_auth_token(token.as_deref()) {
        Ok(()) => HttpResponse::Ok().json("Token updated"),
        Err(e) => {
            error!("Could not persist auth token: {}", e);
            HttpResponse::InternalServerError().json("Could not persist token")
        }
    }
}

#[get("/getBookings")]
pub async fn get_bookings(state: web::Data<SharedState>) -> HttpResponse {
    let lock = state.lock().await;

    let bookings = lock.bookings.clone();

    drop(lock);

    HttpResponse::Ok().json(bookings)
}

#[post("/addComparison")]
pub async fn add_comparison(
    post: web::Json<ComparisonItem>,
    state: web::Data<SharedState>,
) -> HttpResponse {
    let item = post.into_inner();

    let mut lock = state.lock().await;

    match lock.comparison.add_item(item) {
        Ok(_) => {
            let _ = save_comparison_set(&lock.comparison);
            let items = lock.comparison.items().clone();

            drop(lock);

            HttpResponse::Ok().json(ReturnComparison { items })
        }
        Err(e) => {
            drop(lock);

            HttpResponse::Conflict().json(CapacityNotice {
                message: e.to_string(),
                kind: e.kind.as_str().to_string(),
                max: e.max,
            })
        }
    }
}

#[post("/removeComparison/{kind}/{id}")]
pub async fn remove_comparison(
    path: web::Path<(String, i64)>,
    state: web::Data<SharedState>,
) -> HttpResponse {
    let (raw_kind, id) = path.into_inner();

    let kind = match ComparisonKind::new_from_string(&raw_kind) {
        Some(kind) => kind,
        None => return HttpResponse::BadRequest().json("Unknown comparison type"),
    };

    let mut lock = state.lock().await;

    lock.comparison.remove_item(id, kind);
    let _ = save_comparison_set(&lock.comparison);
    let items = lock.comparison.items().clone();

    drop(lock);

    HttpResponse::Ok().json(ReturnComparison { items })
}

#[get("/getComparison")]
pub async fn get_comparison(state: web::Data<SharedState>) -> HttpResponse {
    let lock = state.lock().await;

    let items = lock.comparison.items().clone();

    drop(lock);

    HttpResponse::Ok().json(ReturnComparison { items })
}

#[get("/canAddMore/{kind}")]
pub async fn can_add_more(
    path: web::Path<String>,
    state: web::Data<SharedState>,
) -> HttpResponse {
    let raw_kind = path.into_inner();

    let kind = match ComparisonKind::new_from_string(&raw_kind) {
        Some(kind) => kind,
        None => return HttpResponse::BadRequest().json("Unknown comparison type"),
    };

    let lock = state.lock().await;

    let can_add = lock.comparison.can_add_more(kind);

    drop(lock);

    HttpResponse::Ok().json(can_add)
}

#[post("/clearComparison")]
pub async fn clear_comparison(state: web::Data<SharedState>) -> HttpResponse {
    let mut lock = state.lock().await;

    lock.comparison.clear();
    let _ = save_comparison_set(&lock.comparison);

    drop(lock);

    HttpResponse::Ok().json(ReturnComparison { items: Vec::new() })
}

/// One comparison column set: the snapshots of one type, cross-referenced
/// with the cached live listings, plus the winner indices for the table
/// header badges.
#[get("/getComparisonTable/{kind}")]
pub async fn get_comparison_table(
    path: web::Path<String>,
    state: web::Data<SharedState>,
) -> HttpResponse {
    let raw_kind = path.into_inner();

    let kind = match ComparisonKind::new_from_string(&raw_kind) {
        Some(kind) => kind,
        None => return HttpResponse::BadRequest().json("Unknown comparison type"),
    };

    let lock = state.lock().await;

    let items = lock.comparison.items_by_kind(kind);

    let cheapest = cheapest_index(&items);
    let most_available = most_available_index(&items);

    let rows: Vec<ComparisonRow> = items
        .iter()
        .map(|item| {
            let live = match kind {
                ComparisonKind::School => lock
                    .schools_cache
                    .iter()
                    .find(|s| s.id == item.id)
                    .and_then(|s| serde_json::to_value(s).ok()),
                ComparisonKind::Course => lock
                    .courses_cache
                    .iter()
                    .find(|c| c.id == item.id)
                    .and_then(|c| serde_json::to_value(c).ok()),
                ComparisonKind::Tutor => None,
            };

            ComparisonRow {
                item: (*item).clone(),
                live,
            }
        })
        .collect();

    drop(lock);

    HttpResponse::Ok().json(ReturnComparisonTable {
        kind: kind.as_str().to_string(),
        rows,
        cheapest_index: cheapest,
        most_available_index: most_available,
    })
}
