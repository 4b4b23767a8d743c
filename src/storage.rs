mod models;
mod postgres;
mod reading_lists;
mod saved_posts;

pub mod categories;
pub mod comments;
pub mod posts;
pub mod users;

pub use self::{
    models::*,
    postgres::{Db, init_db, migrate, new_db_pool},
    reading_lists::{DUPLICATE_LIST_NAME, ReadingListStore, update_list_query},
    saved_posts::{ALREADY_SAVED, SavedPostStore, update_saved_query},
};
