pub mod html;
pub mod sanitize;
