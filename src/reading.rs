//! 阅读列表与保存文章
//!
//! [`ReadingLists`] 维护“每个用户恰好一个默认列表”，
//! [`SavedPosts`] 维护 `(用户, 文章, 列表)` 唯一以及已读状态迁移。
//! 两者都对存储接口泛型，便于脱离数据库测试。

mod lists;
mod saved;

#[cfg(test)]
mod memory;

use serde::{Deserialize, Deserializer};

pub use self::{
    lists::{CreateReadingList, DEFAULT_LIST_NAME, ReadingLists, UpdateReadingList},
    saved::{CreateSavedPost, SavedPosts, UpdateSavedPost},
};

pub(crate) const NO_CHANGES: &str = "no fields to update";
pub(crate) const LIST_NOT_FOUND: &str = "reading list not found";

/// 区分“字段缺失”与“显式传入 null”
///
/// 配合 `#[serde(default)]` 使用：缺失为 `None`，`null` 为 `Some(None)`。
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
