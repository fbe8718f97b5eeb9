pub mod data_report;
pub mod row_key;
pub mod weather_record;
