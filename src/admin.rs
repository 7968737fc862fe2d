use csv::{QuoteStyle, Terminator, WriterBuilder};

use crate::{
    error::{DeskError, StoreError},
    models::{BookingRecord, DeleteOutcome, Listing, PageParams},
    store::{PageWindow, RecordStore, DEFAULT_PAGE},
};

pub const CSV_HEADER: [&str; 4] = ["id", "last_name", "booking_number", "created_at"];

/// Read-side composition of the record store for the admin surface.
#[derive(Clone)]
pub struct AdminService {
    store: RecordStore,
    listing_page_size: i64,
    csv_page_size: i64,
}

impl AdminService {
    pub fn new(store: RecordStore, listing_page_size: i64, csv_page_size: i64) -> Self {
        Self {
            store,
            listing_page_size,
            csv_page_size,
        }
    }

    pub fn listing_page_size(&self) -> i64 {
        self.listing_page_size
    }

    pub fn csv_page_size(&self) -> i64 {
        self.csv_page_size
    }

    /// `list` and `count` are independent reads and run side by side. A page
    /// past the end gives no rows but still reports the real total.
    pub async fn render_listing(&self, page: i64, size: i64) -> Result<Listing, StoreError> {
        let window = PageWindow::clamped(page, size);
        let (rows, total) = tokio::try_join!(self.store.list(window), self.store.count())?;

        Ok(Listing {
            rows,
            page: window.page,
            size: window.size,
            total,
            page_count: window.page_count(total),
        })
    }

    pub async fn export_csv(&self, page: i64, size: i64) -> Result<String, DeskError> {
        let listing = self.render_listing(page, size).await?;
        records_to_csv(&listing.rows).map_err(|err| DeskError::Export(err.to_string()))
    }

    /// Rejects ids that are not positive integers before storage is touched.
    pub async fn delete_one(&self, raw_id: &str) -> Result<DeleteOutcome, DeskError> {
        let id = parse_record_id(raw_id)?;
        let deleted = self.store.delete(id).await?;
        Ok(DeleteOutcome { deleted })
    }
}

pub fn parse_record_id(raw_id: &str) -> Result<i64, DeskError> {
    match raw_id.trim().parse::<i64>() {
        Ok(id) if id > 0 => Ok(id),
        _ => Err(DeskError::validation(format!(
            "id must be a positive integer, got {raw_id:?}"
        ))),
    }
}

/// Resolves optional `page`/`size` query values. Absent or blank values take
/// the defaults; anything else must be an integer. Range clamping is left to
/// [`PageWindow`].
pub fn resolve_page_params(
    params: &PageParams,
    default_size: i64,
) -> Result<(i64, i64), DeskError> {
    let page = parse_optional_int("page", params.page.as_deref())?.unwrap_or(DEFAULT_PAGE);
    let size = parse_optional_int("size", params.size.as_deref())?.unwrap_or(default_size);
    Ok((page, size))
}

fn parse_optional_int(name: &str, raw: Option<&str>) -> Result<Option<i64>, DeskError> {
    let Some(raw) = raw.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(None);
    };
    raw.parse::<i64>()
        .map(Some)
        .map_err(|_| DeskError::validation(format!("{name} must be an integer, got {raw:?}")))
}

pub fn records_to_csv(rows: &[BookingRecord]) -> Result<String, csv::Error> {
    let mut writer = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for row in rows {
        writer.write_record([
            row.id.to_string(),
            row.last_name.clone(),
            row.booking_number.clone(),
            row.created_at_iso(),
        ])?;
    }

    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    String::from_utf8(bytes).map_err(|err| {
        csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })
}
