use actix_cors::*;
use actix_web::*;

use log::*;
use rand::{thread_rng, Rng};
use std::process::exit;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;

mod comparison;
mod database;
mod marketplace_api;
mod routes;
mod schedule;

use comparison::*;
use database::*;
use marketplace_api::*;
use routes::*;
use schedule::*;

/// Per-session state: the user's comparison set and local booking list,
/// plus cached upstream listings for comparison-table enrichment.
/// Constructed in main and injected into the app, never a global.
pub struct SessionState {
    pub comparison: ComparisonSet,
    pub bookings: Vec<BookingRequest>,
    pub schools_cache: Vec<School>,
    pub courses_cache: Vec<Course>,
    pub last_change: u64,
    // Tutor id of the most recent availability request; late responses
    // for any other tutor are discarded
    pub availability_target: Option<i64>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            comparison: ComparisonSet::new(),
            bookings: Vec::new(),
            schools_cache: Vec::new(),
            courses_cache: Vec::new(),
            last_change: get_unix_timestamp(),
            availability_target: None,
        }
    }

    /// Record the tutor an availability fetch is about to be issued for.
    pub fn begin_availability_fetch(&mut self, tutor_id: i64) {
        self.availability_target = Some(tutor_id);
    }

    /// True iff a response for this tutor is still the one the UI is
    /// waiting on. A fetch begun for a different tutor in the meantime
    /// wins, and the older response must be discarded.
    pub fn availability_response_is_current(&self, tutor_id: i64) -> bool {
        self.availability_target == Some(tutor_id)
    }
}


pub type SharedState = Arc<Mutex<SessionState>>;

pub fn new_shared_state(state: SessionState) -> SharedState {
    Arc::new(Mutex::new(state))
}

// Debug vs release address
#[cfg(debug_assertions)]
const ADDRESS: &str = "127.0.0.1:8080";
#[cfg(not(debug_assertions))]
const ADDRESS: &str = "0.0.0.0:8080";

// Seconds per listing-cache refresh
const CACHE_REFRESH_INTERVAL: u64 = 600;
const COURSE_PAGE_LIMIT: u32 = 100;

pub fn get_unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Keeps the schools/courses listing caches warm. A failed refresh keeps
/// the previous cache; availability fetches are never retried here, the
/// user re-triggers those by re-selecting a date or tutor.
async fn refresh_loop(state: SharedState) {
    let mut number_of_repeated_errors: u64 = 0;

    loop {
        info!("Starting listing cache refresh...");

        let schools_update = get_schools().await;
        let courses_update = get_courses(Some(COURSE_PAGE_LIMIT)).await;

        let mut lock = state.lock().await;

        match schools_update {
            Ok(schools) => {
                number_of_repeated_errors = 0;
                info!("Cached {} schools", schools.len());
                lock.schools_cache = schools;
                lock.last_change = get_unix_timestamp();
            }
            Err(e) => {
                number_of_repeated_errors += 1;
                error!("Error refreshing schools: {}", e);
            }
        }

        match courses_update {
            Ok(courses) => {
                info!("Cached {} courses", courses.len());
                lock.courses_cache = courses;
                lock.last_change = get_unix_timestamp();
            }
            Err(e) => {
                number_of_repeated_errors += 1;
                error!("Error refreshing courses: {}", e);
            }
        }

        drop(lock);

        if number_of_repeated_errors > 5 {
            warn!(
                "Upstream API unreachable, currently at {} repeated errors...",
                number_of_repeated_errors
            );
        }

        // Jitter to avoid hammering the upstream on a fixed period
        let jitter = thread_rng().gen_range(0..30);
        tokio::time::sleep(Duration::from_secs(CACHE_REFRESH_INTERVAL + jitter)).await;
    }
}

/// Runs the actix-web server with the refresh loop in a background task.
async fn async_main() -> std::io::Result<()> {
    info!("Loading persisted session state...");

    let mut session = SessionState::new();
    session.comparison = load_comparison_set().unwrap_or_default();
    session.bookings = load_bookings().unwrap_or_default();

    info!(
        "Restored {} comparison items and {} bookings",
        session.comparison.items().len(),
        session.bookings.len()
    );

    let state = new_shared_state(session);
    let loop_state = state.clone();

    tokio::spawn(async move {
        refresh_loop(loop_state).await;
    });

    let data = web::Data::new(state);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_header()
            .allow_any_method()
            .send_wildcard()
            .max_age(3600);

        App::new()
            .app_data(data.clone())
            .wrap(cors)
            .wrap(actix_web::middleware::Compress::default())
            .wrap(actix_web::middleware::Logger::default())
            .service(get_status)
            .service(get_availability)
            .service(submit_booking)
            .service(set_auth_token)
            .service(get_bookings)
            .service(add_comparison)
            .service(remove_comparison)
            .service(get_comparison)
            .service(can_add_more)
            .service(clear_comparison)
            .service(get_comparison_table)
    })
    .bind(ADDRESS)?
    .run()
    .await
}

fn main() {
    std::env::set_var("RUST_LOG", "info");
    env_logger::init();

    ctrlc::set_handler(move || {
        info!("Exiting...");
        exit(0);
    })
    .expect("Error setting Ctrl-C handler");

    info!("kursfinder server starting up...");

    let _ = actix_web::rt::System::with_tokio_rt(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .worker_threads(2)
            .thread_name("main-tokio")
            .build()
            .expect("Failed to build tokio runtime")
    })
    .block_on(async_main());
}
