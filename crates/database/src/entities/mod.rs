pub mod folders;
pub mod materials;
pub mod session_attendees;
pub mod session_materials;
pub mod sessions;
pub mod shares;
pub mod users;
