use crate::comparison::ComparisonSet;
use crate::marketplace_api::BookingRequest;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Error, Read, Write};

const COMPARISON_SET_NAME: &str = "./comparison_set.json";
const AUTH_TOKEN_NAME: &str = "./auth_token.json";
const BOOKINGS_NAME: &str = "./bookings.json";

pub fn load_comparison_set() -> Result<ComparisonSet, Error> {
    load_json(COMPARISON_SET_NAME)
}

pub fn save_comparison_set(set: &ComparisonSet) -> Result<(), Error> {
    save_json(COMPARISON_SET_NAME, set)
}

pub fn load_auth_token() -> Result<Option<String>, Error> {
    load_json(AUTH_TOKEN_NAME)
}

pub fn save_auth_token(token: Option<&str>) -> Result<(), Error> {
    save_json(AUTH_TOKEN_NAME, &token)
}

pub fn load_bookings() -> Result<Vec<BookingRequest>, Error> {
    load_json(BOOKINGS_NAME)
}

pub fn save_bookings(bookings: &[BookingRequest]) -> Result<(), Error> {
    save_json(BOOKINGS_NAME, &bookings)
}

/// Start times (normalized "HH:MM") the viewer already holds with this
/// tutor on this date.
pub fn reserved_times(
    bookings: &[BookingRequest],
    tutor_id: i64,
    date: NaiveDate,
) -> HashSet<String> {
    bookings
        .iter()
        .filter(|b| b.tutor_id == Some(tutor_id) && b.start_date == date)
        .map(|b| b.time_slot.clone())
        .collect()
}

// A missing or unreadable file is an empty store, not an error.
fn load_json<T: Default + ::serde::de::DeserializeOwned>(path: &str) -> Result<T, Error> {
    let file = OpenOptions::new().read(true).open(path);

    if file.is_err() {
        return Ok(T::default());
    } else {
        let mut file = file.unwrap();

        let mut data = String::new();
        file.read_to_string(&mut data)?;

        Ok(from_slice_lenient(data.as_bytes()).unwrap_or_default())
    }
}

fn save_json<T: ::serde::Serialize>(path: &str, value: &T) -> Result<(), Error> {
    let mut writer = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)?;

    let serialized_output = serde_json::to_string(value).unwrap_or_default();

    writer.write_all(serialized_output.as_bytes())?;

    Ok(())
}

fn from_slice_lenient<'a, T: ::serde::Deserialize<'a>>(
    v: &'a [u8],
) -> Result<T, serde_json::Error> {
    let mut cur = std::io::Cursor::new(v);
    let mut de = serde_json::Deserializer::new(serde_json::de::IoRead::new(&mut cur));
    ::serde::Deserialize::deserialize(&mut de)
    // note the lack of: de.end()
}
