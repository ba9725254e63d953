pub mod bucket_summary;
pub mod deal_list;
pub mod filter_panel;
pub mod header;
pub mod upload_area;
