pub mod catalog;
pub mod reservation;
pub mod rule;
pub mod settings;
pub mod slide;
pub mod types;
pub mod user;

pub use catalog::*;
pub use reservation::*;
pub use rule::*;
pub use settings::*;
pub use slide::*;
pub use types::*;
pub use user::*;
