use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::domain::TdeError;
use crate::rows::{Row, Value, synthesize_id};

// Wire shape of one seed user. Everything is optional, remote records
// are not trusted to be complete.
#[derive(Debug, Deserialize)]
pub struct SeedRecord {
    pub id: Option<serde_json::Value>,
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub website: Option<String>,
    pub company: Option<SeedCompany>,
    pub address: Option<SeedAddress>,
}

#[derive(Debug, Deserialize)]
pub struct SeedCompany {
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SeedAddress {
    pub city: Option<String>,
}

// Maps one wire record to a row. Ids are stringified whatever their
// wire type, missing ones are synthesized. Age is not part of the feed
// and gets drawn from a plausible range instead.
pub fn map_seed_record(record: &SeedRecord, index: usize) -> Row {
    let id = match &record.id {
        Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => synthesize_id(index),
    };
    let name = record
        .name
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| record.username.clone().filter(|s| !s.is_empty()))
        .unwrap_or_else(|| format!("User {}", index + 1));
    let email = record
        .email
        .clone()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("user{}@example.com", index + 1));

    let mut row = Row::new(id, name, email);
    row.set("age", Value::Int(rand::thread_rng().gen_range(18..=60)));
    row.set("role", Value::from("Viewer"));
    if let Some(phone) = record.phone.clone() {
        row.set("phone", Value::Str(phone));
    }
    if let Some(website) = record.website.clone() {
        row.set("website", Value::Str(website));
    }
    if let Some(company) = record.company.as_ref().and_then(|c| c.name.clone()) {
        row.set("company", Value::Str(company));
    }
    if let Some(city) = record.address.as_ref().and_then(|a| a.city.clone()) {
        row.set("city", Value::Str(city));
    }
    row
}

// Blocking fetch of the seed collection. Non-2xx answers are errors.
pub fn fetch_seed_rows(url: &str) -> Result<Vec<Row>, TdeError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()?;
    let records: Vec<SeedRecord> = client.get(url).send()?.error_for_status()?.json()?;
    debug!("Fetched {} seed records from {}", records.len(), url);
    Ok(records
        .iter()
        .enumerate()
        .map(|(i, r)| map_seed_record(r, i))
        .collect())
}

// Runs the fetch on its own thread. The model polls the receiver every
// tick, a dropped sender (fetch failed) just ends the polling.
pub fn spawn_seed_fetch(url: String) -> mpsc::Receiver<Vec<Row>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || match fetch_seed_rows(&url) {
        Ok(rows) => {
            info!("Seed fetch delivered {} rows", rows.len());
            let _ = tx.send(rows);
        }
        Err(e) => {
            error!("Seed fetch failed: {:?}", e);
        }
    });
    rx
}
