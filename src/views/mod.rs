pub mod chat;
pub mod landing;
pub mod shared;
pub mod visualize;

pub use chat::ChatView;
pub use landing::LandingView;
pub use visualize::VisualizeView;
