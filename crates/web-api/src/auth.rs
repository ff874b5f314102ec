//! JWT 校验模块
//!
//! 身份（用户ID + 角色）由外部身份服务签发，本服务只校验签名
//! 并信任其内容。`issue_token` 供测试和本地开发签发等价 token。

use axum::http::HeaderMap;
use config::JwtConfig;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use domain::{UserId, UserRole};

use crate::error::ApiError;

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// 用户ID
    pub sub: Uuid,
    /// 角色：customer / provider / admin
    pub role: String,
    /// 过期时间 (Unix timestamp)
    pub exp: i64,
}

/// 从 token 中解出的连接身份。
/// 注意：身份按用户唯一，但同一用户可以带着同一身份建立多条连接。
#[derive(Debug, Clone, Copy)]
pub struct Identity {
    pub user_id: UserId,
    pub role: UserRole,
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 签发 token（测试与本地开发用；线上由身份服务签发）
    pub fn issue_token(&self, user_id: UserId, role: UserRole) -> Result<String, ApiError> {
        let now = chrono::Utc::now();
        let exp = now + chrono::Duration::hours(self.config.expiration_hours);

        let claims = Claims {
            sub: Uuid::from(user_id),
            role: role.as_str().to_string(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApiError::unauthorized(format!("token generation failed: {}", err)))
    }

    /// 校验并解析 token
    pub fn verify_token(&self, token: &str) -> Result<Identity, ApiError> {
        let claims = decode::<Claims>(token, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| ApiError::unauthorized(format!("invalid token: {}", err)))?;

        let role = UserRole::parse(&claims.role)
            .ok_or_else(|| ApiError::unauthorized(format!("unknown role: {}", claims.role)))?;

        Ok(Identity {
            user_id: UserId::from(claims.sub),
            role,
        })
    }

    /// 从 Authorization 头中提取并校验身份
    pub fn identity_from_headers(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let auth_header = headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|header| header.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("invalid authorization header format"))?;

        self.verify_token(token)
    }
}
