pub mod header;
pub mod reservation_panel;
pub mod stage;
pub mod transport;
