use serde::{Serialize, Serializer, ser::SerializeMap};

/// 分页元信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

/// 分页结果包装
///
/// 序列化为 `{<field>: [...], meta: {...}}`，`field` 由调用方决定，例如 `"posts"`、`"users"`。
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub field: &'static str,
    pub data: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn wrap(data: Vec<T>, total: i64, page: i64, page_size: i64, field: &'static str) -> Self {
        Self {
            field,
            data,
            meta: PageMeta {
                total,
                page,
                page_size,
                total_pages: total_pages(total, page_size),
            },
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            field: self.field,
            data: self.data.into_iter().map(f).collect(),
            meta: self.meta,
        }
    }
}

/// `ceil(total / page_size)`
pub fn total_pages(total: i64, page_size: i64) -> i64 {
    if page_size <= 0 || total <= 0 {
        return 0;
    }
    (total + page_size - 1) / page_size
}

impl<T: Serialize> Serialize for Page<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let field = if self.field.is_empty() {
            "data"
        } else {
            self.field
        };

        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(field, &self.data)?;
        map.serialize_entry("meta", &self.meta)?;
        map.end()
    }
}
