//! HTTP API handlers for pcat-server

pub mod audit;
pub mod buildinfo;
pub mod classify;
pub mod containment;
pub mod health;
pub mod import;
pub mod items;
pub mod sellables;
pub mod tags;

pub use audit::list_audit_logs;
pub use buildinfo::get_build_info;
pub use classify::classify;
pub use containment::get_containment;
pub use health::health_routes;
pub use import::{export_csv, import_csv, validate_csv};
pub use items::{
    attach_child, create_item, delete_item, get_item, list_items, move_item, retag_item,
    set_price,
};
pub use sellables::list_sellables;
pub use tags::list_tags;
