pub mod chat_area;
pub mod input_bar;
pub mod sidebar;
pub mod sign_in;
pub mod sign_up;
pub mod topbar;
