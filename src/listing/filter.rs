use serde::Deserialize;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;
pub const DEFAULT_SORT: &str = "created_at desc";
/// 页码上限，保证 `offset` 不溢出
pub const MAX_PAGE: i64 = i64::MAX / MAX_PAGE_SIZE;

/// 列表接口的原始查询参数
///
/// 所有字段都按字符串接收，由 [`ListParams`] 的各个 `*_filter` 方法宽松解析：
/// 缺失、空串或无法解析的值都视为“未设置”。
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct ListParams {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
    pub includes: Option<String>,

    pub title: Option<String>,
    pub category_id: Option<String>,
    pub author_id: Option<String>,
    pub status: Option<String>,

    pub name: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Option<String>,

    pub parent_id: Option<String>,
}

/// 分页信息，`page >= 1`，`page_size` 位于 `[1, 100]`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub page_size: i64,
    pub sort: String,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: DEFAULT_SORT.to_string(),
        }
    }
}

impl Pagination {
    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

/// 可选关联数据
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Includes {
    pub author: bool,
    pub category: bool,
    pub likes: bool,
    pub comments: bool,
}

impl Includes {
    /// 解析逗号分隔的 `includes` 参数，未知项忽略
    pub fn parse(raw: &str) -> Self {
        let mut includes = Self::default();
        for item in raw.split(',').map(str::trim) {
            match item {
                "author" => includes.author = true,
                "category" => includes.category = true,
                "likes" => includes.likes = true,
                "comments" => includes.comments = true,
                _ => {}
            }
        }
        includes
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostFilter {
    pub title: Option<String>,
    pub category_id: Option<i64>,
    pub author_id: Option<i64>,
    pub status: Option<i16>,
    pub includes: Includes,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub email: Option<String>,
    pub username: Option<String>,
    pub role: Option<i16>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryFilter {
    pub name: Option<String>,
    pub pagination: Pagination,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentFilter {
    pub post_id: i64,
    pub parent_id: Option<i64>,
    pub pagination: Pagination,
}

impl ListParams {
    pub fn pagination(&self) -> Pagination {
        let page = parse_number::<i64>(&self.page)
            .unwrap_or(1)
            .clamp(1, MAX_PAGE);
        let page_size = parse_number::<i64>(&self.page_size)
            .map(|size| size.clamp(1, MAX_PAGE_SIZE))
            .unwrap_or(DEFAULT_PAGE_SIZE);
        let sort = non_empty(&self.sort).unwrap_or_else(|| DEFAULT_SORT.to_string());

        Pagination {
            page,
            page_size,
            sort,
        }
    }

    pub fn includes(&self) -> Includes {
        self.includes
            .as_deref()
            .map(Includes::parse)
            .unwrap_or_default()
    }

    pub fn post_filter(&self) -> PostFilter {
        PostFilter {
            title: non_empty(&self.title),
            category_id: non_zero(&self.category_id),
            author_id: non_zero(&self.author_id),
            status: non_zero(&self.status),
            includes: self.includes(),
            pagination: self.pagination(),
        }
    }

    pub fn user_filter(&self) -> UserFilter {
        UserFilter {
            email: non_empty(&self.email),
            username: non_empty(&self.username),
            role: non_zero(&self.role),
            pagination: self.pagination(),
        }
    }

    pub fn category_filter(&self) -> CategoryFilter {
        CategoryFilter {
            name: non_empty(&self.name),
            pagination: self.pagination(),
        }
    }

    pub fn comment_filter(&self, post_id: i64) -> CommentFilter {
        CommentFilter {
            post_id,
            parent_id: non_zero(&self.parent_id),
            pagination: self.pagination(),
        }
    }
}

fn parse_number<T: std::str::FromStr>(raw: &Option<String>) -> Option<T> {
    raw.as_deref().and_then(|v| v.trim().parse().ok())
}

/// 零值视为未设置
fn non_zero<T>(raw: &Option<String>) -> Option<T>
where
    T: std::str::FromStr + Default + PartialEq,
{
    parse_number::<T>(raw).filter(|v| *v != T::default())
}

fn non_empty(raw: &Option<String>) -> Option<String> {
    raw.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
