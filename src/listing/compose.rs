use std::borrow::Cow;

use sqlx::{FromRow, Postgres, QueryBuilder, postgres::PgRow};
use tracing::instrument;

use super::{Page, Pagination};
use crate::{
    error::{Error, Result},
    storage::Db,
};

/// 绑定参数
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bind {
    Int(i64),
    SmallInt(i16),
    Text(String),
}

impl From<i64> for Bind {
    fn from(v: i64) -> Self {
        Bind::Int(v)
    }
}

impl From<i16> for Bind {
    fn from(v: i16) -> Self {
        Bind::SmallInt(v)
    }
}

impl From<String> for Bind {
    fn from(v: String) -> Self {
        Bind::Text(v)
    }
}

impl From<&str> for Bind {
    fn from(v: &str) -> Self {
        Bind::Text(v.to_string())
    }
}

/// WHERE 条件，只允许引用主表列
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq { column: &'static str, value: Bind },
    /// 大小写不敏感的子串匹配
    Contains { column: &'static str, needle: String },
    IsNull { column: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: &'static str,
    pub alias: &'static str,
    pub on: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    pub expr: Cow<'static, str>,
    pub alias: Option<Cow<'static, str>>,
}

/// 声明式列表查询
///
/// 只描述“查什么”：投影列、LEFT JOIN、WHERE 条件、排序和分页窗口。
/// 由 [`ListSpec::count_query`] / [`ListSpec::page_query`] 生成 SQL，
/// 由 [`fetch_page`] / [`fetch_one`] 执行。
///
/// ```ignore
/// let spec = ListSpec::new("posts", "p")
///     .columns(&["id", "title"])
///     .eq("category_id", Some(5_i64))
///     .paginate(&pagination);
/// let page: Page<PostRow> = fetch_page(&db, &spec, "posts").await?;
/// ```
#[derive(Debug, Clone)]
pub struct ListSpec {
    table: &'static str,
    alias: &'static str,
    projections: Vec<Projection>,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    pagination: Pagination,
    limit: Option<i64>,
}

impl ListSpec {
    pub fn new(table: &'static str, alias: &'static str) -> Self {
        Self {
            table,
            alias,
            projections: Vec::new(),
            joins: Vec::new(),
            predicates: Vec::new(),
            pagination: Pagination::default(),
            limit: None,
        }
    }

    /// 主表列，自动加表别名前缀
    pub fn columns(mut self, columns: &[&'static str]) -> Self {
        for column in columns {
            self.projections.push(Projection {
                expr: format!("{}.{column}", self.alias).into(),
                alias: None,
            });
        }
        self
    }

    pub fn project(
        mut self,
        expr: impl Into<Cow<'static, str>>,
        alias: impl Into<Cow<'static, str>>,
    ) -> Self {
        self.projections.push(Projection {
            expr: expr.into(),
            alias: Some(alias.into()),
        });
        self
    }

    /// LEFT JOIN 关联表，并以 `<prefix>_<column>` 为别名投影其列
    ///
    /// 例如 `prefix = "AuthorDetail"` 时投影 `"AuthorDetail_name"`，便于还原嵌套对象。
    pub fn left_join(
        mut self,
        join: Join,
        prefix: &'static str,
        columns: &[&'static str],
    ) -> Self {
        for column in columns {
            self.projections.push(Projection {
                expr: format!("{}.{column}", join.alias).into(),
                alias: Some(format!("{prefix}_{column}").into()),
            });
        }
        self.joins.push(join);
        self
    }

    /// 值为 `None` 时不添加条件
    pub fn eq<T: Into<Bind>>(mut self, column: &'static str, value: Option<T>) -> Self {
        if let Some(value) = value {
            self.predicates.push(Predicate::Eq {
                column,
                value: value.into(),
            });
        }
        self
    }

    /// 值为 `None` 或空串时不添加条件
    pub fn contains(mut self, column: &'static str, needle: Option<&str>) -> Self {
        if let Some(needle) = needle.filter(|n| !n.is_empty()) {
            self.predicates.push(Predicate::Contains {
                column,
                needle: needle.to_string(),
            });
        }
        self
    }

    pub fn is_null(mut self, column: &'static str) -> Self {
        self.predicates.push(Predicate::IsNull { column });
        self
    }

    pub fn paginate(mut self, pagination: &Pagination) -> Self {
        self.pagination = pagination.clone();
        self
    }

    /// 单条查询使用，忽略分页偏移
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn table(&self) -> &'static str {
        self.table
    }

    pub fn pagination(&self) -> &Pagination {
        &self.pagination
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn projections(&self) -> &[Projection] {
        &self.projections
    }

    /// 计数查询：只包含 WHERE 条件，不含 JOIN、排序和分页
    pub fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut builder = QueryBuilder::new(format!(
            "SELECT COUNT(*) FROM {} {}",
            self.table, self.alias
        ));
        self.push_where(&mut builder);
        builder
    }

    /// 分页查询：投影、JOIN、WHERE、ORDER BY、LIMIT/OFFSET
    ///
    /// 排序子句原样透传，但必须由列名与 `asc`/`desc` 组成，否则返回 [`Error::BadRequest`]。
    pub fn page_query(&self) -> Result<QueryBuilder<'static, Postgres>> {
        let order = self.order_clause()?;

        let mut builder = QueryBuilder::new("SELECT ");
        self.push_projections(&mut builder);
        builder.push(format!(" FROM {} {}", self.table, self.alias));

        for join in &self.joins {
            builder.push(format!(
                " LEFT JOIN {} {} ON {}",
                join.table, join.alias, join.on
            ));
        }

        self.push_where(&mut builder);

        if let Some(order) = order {
            builder.push(" ORDER BY ").push(order);
        }

        match self.limit {
            Some(limit) => {
                builder.push(" LIMIT ").push_bind(limit);
            }
            None => {
                builder.push(" LIMIT ").push_bind(self.pagination.page_size);
                builder.push(" OFFSET ").push_bind(self.pagination.offset());
            }
        }

        Ok(builder)
    }

    fn push_projections(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        if self.projections.is_empty() {
            builder.push(format!("{}.*", self.alias));
            return;
        }

        let mut separated = builder.separated(", ");
        for projection in &self.projections {
            match &projection.alias {
                Some(alias) => separated.push(format!("{} AS \"{alias}\"", projection.expr)),
                None => separated.push(&projection.expr),
            };
        }
    }

    fn push_where(&self, builder: &mut QueryBuilder<'static, Postgres>) {
        for (i, predicate) in self.predicates.iter().enumerate() {
            builder.push(if i == 0 { " WHERE " } else { " AND " });

            match predicate {
                Predicate::Eq { column, value } => {
                    builder.push(format!("{}.{column} = ", self.alias));
                    match value {
                        Bind::Int(v) => builder.push_bind(*v),
                        Bind::SmallInt(v) => builder.push_bind(*v),
                        Bind::Text(v) => builder.push_bind(v.clone()),
                    };
                }
                Predicate::Contains { column, needle } => {
                    builder
                        .push(format!("{}.{column} ILIKE ", self.alias))
                        .push_bind(format!("%{}%", escape_like(needle)));
                }
                Predicate::IsNull { column } => {
                    builder.push(format!("{}.{column} IS NULL", self.alias));
                }
            }
        }
    }

    /// 校验并补全排序子句
    ///
    /// 未带表别名的列名补上主表别名；与投影别名同名的列按别名引用。
    fn order_clause(&self) -> Result<Option<String>> {
        let sort = self.pagination.sort.trim();
        if sort.is_empty() {
            return Ok(None);
        }

        let mut items = Vec::new();
        for item in sort.split(',') {
            let Some(rendered) = self.order_item(item) else {
                tracing::warn!(sort, table = self.table, "rejected sort clause");
                return Err(Error::bad_request("invalid sort clause"));
            };
            items.push(rendered);
        }
        Ok(Some(items.join(", ")))
    }

    fn order_item(&self, item: &str) -> Option<String> {
        let mut words = item.split_whitespace().peekable();
        let column = words.next()?;
        if !is_column_ref(column) {
            return None;
        }

        let direction = match words.peek() {
            Some(d) if d.eq_ignore_ascii_case("asc") => Some("ASC"),
            Some(d) if d.eq_ignore_ascii_case("desc") => Some("DESC"),
            _ => None,
        };
        if direction.is_some() {
            words.next();
        }

        // 可选的 `NULLS FIRST|LAST`
        let nulls = match words.next() {
            None => None,
            Some(n) if n.eq_ignore_ascii_case("nulls") => match words.next() {
                Some(w) if w.eq_ignore_ascii_case("first") => Some("NULLS FIRST"),
                Some(w) if w.eq_ignore_ascii_case("last") => Some("NULLS LAST"),
                _ => return None,
            },
            Some(_) => return None,
        };
        if words.next().is_some() {
            return None;
        }

        let is_alias = self
            .projections
            .iter()
            .any(|p| p.alias.as_deref() == Some(column));

        let column = if is_alias {
            format!("\"{column}\"")
        } else if column.contains('.') {
            column.to_string()
        } else {
            format!("{}.{column}", self.alias)
        };

        let mut rendered = column;
        for part in [direction, nulls].into_iter().flatten() {
            rendered.push(' ');
            rendered.push_str(part);
        }
        Some(rendered)
    }
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// `column` 或 `alias.column`
fn is_column_ref(s: &str) -> bool {
    match s.split_once('.') {
        Some((table, column)) => is_identifier(table) && is_identifier(column),
        None => is_identifier(s),
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// 执行列表查询：先计数，再取当前页
///
/// 两条语句相互独立，不在同一快照内执行；并发写入时 `total` 可能与返回的数据不一致。
#[instrument(name = "list query", skip_all, fields(table = spec.table()))]
pub async fn fetch_page<T>(db: &Db, spec: &ListSpec, field: &'static str) -> Result<Page<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut page_query = spec.page_query()?;
    let mut count_query = spec.count_query();

    let total = count_query
        .build_query_scalar::<i64>()
        .fetch_one(db)
        .await?;
    let data = page_query.build_query_as::<T>().fetch_all(db).await?;

    let pagination = spec.pagination();
    Ok(Page::wrap(
        data,
        total,
        pagination.page,
        pagination.page_size,
        field,
    ))
}

/// 执行单条查询，使用 [`ListSpec::limit`] 为 1 的查询
pub async fn fetch_one<T>(db: &Db, spec: &ListSpec) -> Result<Option<T>>
where
    T: for<'r> FromRow<'r, PgRow> + Send + Unpin,
{
    let mut query = spec.page_query()?;
    Ok(query.build_query_as::<T>().fetch_optional(db).await?)
}
