mod compose;
mod filter;
mod page;

pub use self::{
    compose::{Bind, Join, ListSpec, Predicate, Projection, fetch_one, fetch_page},
    filter::{
        CategoryFilter, CommentFilter, DEFAULT_PAGE_SIZE, DEFAULT_SORT, Includes, ListParams,
        MAX_PAGE, MAX_PAGE_SIZE, Pagination, PostFilter, UserFilter,
    },
    page::{Page, PageMeta, total_pages},
};
