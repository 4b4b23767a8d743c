//! 请求身份
//!
//! 凭证的签发与校验由上游认证服务完成，本服务只读取其写入的请求头：
//! `X-User-Id` 与 `X-User-Role`。

use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::Error;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i16)]
pub enum Role {
    Reader = 0,
    Editor = 1,
    Author = 2,
    Admin = 3,
}

impl TryFrom<i16> for Role {
    type Error = i16;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Reader,
            1 => Self::Editor,
            2 => Self::Author,
            3 => Self::Admin,
            other => return Err(other),
        })
    }
}

/// 当前请求的用户
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claims {
    pub user_id: i64,
    pub role: Role,
}

impl Claims {
    /// 编辑或管理员可以维护分类
    pub fn can_manage_categories(&self) -> bool {
        matches!(self.role, Role::Editor | Role::Admin)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Claims {
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        };

        let user_id = header(USER_ID_HEADER)
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|id| *id > 0)
            .ok_or(Error::Unauthorized)?;

        // 未携带角色时按普通读者处理
        let role = match header(USER_ROLE_HEADER) {
            None => Role::Reader,
            Some(raw) => raw
                .parse::<i16>()
                .ok()
                .and_then(|r| Role::try_from(r).ok())
                .ok_or(Error::Unauthorized)?,
        };

        Ok(Claims { user_id, role })
    }
}
