//! Daily NI/IE COVID-19 figures, scraped and stored once per day.

pub mod scraper;
pub mod warehouse;

use crate::error::Result;
use chrono::NaiveDate;
use tracing::info;

pub use scraper::{CovidUpdate, Scraper};
pub use warehouse::{CovidRecord, SqliteWarehouse, Warehouse};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SchemaReport {
    pub created_dataset: bool,
    pub created_table: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyPresent,
}

/// Create the dataset and table when they are absent
pub fn ensure_schema<W: Warehouse>(warehouse: &W) -> Result<SchemaReport> {
    let mut report = SchemaReport::default();

    if !warehouse.dataset_exists()? {
        warehouse.create_dataset()?;
        report.created_dataset = true;
    }

    if !warehouse.table_exists()? {
        warehouse.create_table()?;
        report.created_table = true;
    }

    Ok(report)
}

/// Store the record unless a row for its date already exists
pub fn store_record<W: Warehouse>(warehouse: &W, record: &CovidRecord) -> Result<InsertOutcome> {
    if warehouse.record_exists(record.date)? {
        info!(action = "skip", component = "covid", date = %record.date, "Record already present");
        return Ok(InsertOutcome::AlreadyPresent);
    }

    // Another run may have written the row since the check
    if warehouse.insert_record(record)? {
        info!(
            action = "insert",
            component = "covid",
            date = %record.date,
            ni_confirmed = record.ni_confirmed,
            ie_confirmed = record.ie_confirmed,
            "Record inserted"
        );
        Ok(InsertOutcome::Inserted)
    } else {
        Ok(InsertOutcome::AlreadyPresent)
    }
}

pub fn record_for(date: NaiveDate, update: &CovidUpdate) -> CovidRecord {
    CovidRecord {
        date,
        ni_confirmed: update.ni_confirmed,
        ni_dead: None,
        ie_confirmed: update.ie_confirmed,
        ie_dead: update.ie_dead,
    }
}

/// Scrape today's figures and store them: ensure schema, then insert if absent
pub async fn update<W: Warehouse>(
    scraper: &Scraper,
    warehouse: &W,
    date: NaiveDate,
) -> Result<(CovidRecord, SchemaReport, InsertOutcome)> {
    let schema = ensure_schema(warehouse)?;
    let figures = scraper.fetch_updates().await?;
    let record = record_for(date, &figures);
    let outcome = store_record(warehouse, &record)?;
    Ok((record, schema, outcome))
}
