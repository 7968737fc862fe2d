use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};

/// A persisted pre-check-in record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRecord {
    pub id: i64,
    pub last_name: String,
    pub booking_number: String,
    #[serde(serialize_with = "serialize_iso_millis")]
    pub created_at: DateTime<Utc>,
}

impl BookingRecord {
    pub fn created_at_iso(&self) -> String {
        format_timestamp(&self.created_at)
    }
}

/// Output of the intake parser, not yet persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingDraft {
    pub last_name: String,
    pub booking_number: String,
}

/// `2025-03-01T12:00:00.000Z`, the stored and exported timestamp form.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_iso_millis<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(ts))
}

#[derive(Debug, Clone, Serialize)]
pub struct Listing {
    pub rows: Vec<BookingRecord>,
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub page_count: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    #[serde(default)]
    pub page: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ListingResponse {
    pub page: u32,
    pub size: u32,
    pub total: u64,
    pub pages: u64,
    pub data: Vec<BookingRecord>,
}

impl From<Listing> for ListingResponse {
    fn from(listing: Listing) -> Self {
        Self {
            page: listing.page,
            size: listing.size,
            total: listing.total,
            pages: listing.page_count,
            data: listing.rows,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DeleteOutcome {
    pub deleted: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResponse {
    pub ok: bool,
    pub deleted: u64,
}
