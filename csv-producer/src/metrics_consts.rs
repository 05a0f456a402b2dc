pub const FILES_PROCESSED: &str = "csv_producer_files_processed_total";
pub const ROWS_EXTRACTED: &str = "csv_producer_rows_extracted_total";
pub const MESSAGES_PUBLISHED: &str = "csv_producer_messages_published_total";
pub const DISCOVERY_PASSES: &str = "csv_producer_passes_total";
pub const LISTING_FAILURES: &str = "csv_producer_listing_failures_total";
