// UI module organization
pub mod charts;
pub mod components;
pub mod layout;
pub mod panels;

// Re-export the main UI function
pub use layout::render_ui;
