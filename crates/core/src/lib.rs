pub mod binding;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod parse;
pub mod presenter;
pub mod query;
pub mod session;
pub mod volume;

pub mod prelude {
    pub use crate::binding::{RowBinder, RowSlot};
    pub use crate::dispatch::{UiHandle, UiQueue};
    pub use crate::error::*;
    pub use crate::presenter::{ListObserver, NoopObserver, VolumeListPresenter};
    pub use crate::session::BookListing;
    pub use crate::volume::*;
}
