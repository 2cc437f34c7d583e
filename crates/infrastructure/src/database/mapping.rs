//! 行映射辅助函数
//!
//! SQLite 没有原生JSON列，作业配置、实时日志和事件载荷都以文本存储，
//! 这里统一处理它们的解析和序列化。

use coordinator_core::{CoordinatorError, CoordinatorResult};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::{sqlite::SqliteRow, Row};

pub struct MappingHelpers;

impl MappingHelpers {
    pub fn parse_json_sqlite<T: DeserializeOwned>(
        row: &SqliteRow,
        field_name: &str,
    ) -> CoordinatorResult<T> {
        let json_str: String = row.try_get(field_name)?;
        serde_json::from_str(&json_str).map_err(|e| {
            CoordinatorError::Serialization(format!("解析字段 {field_name} 失败: {e}"))
        })
    }

    /// 空值和空字符串都当作缺失
    pub fn parse_optional_json_sqlite<T: DeserializeOwned>(
        row: &SqliteRow,
        field_name: &str,
    ) -> CoordinatorResult<Option<T>> {
        match row.try_get::<Option<String>, _>(field_name)? {
            Some(json_str) if !json_str.is_empty() => serde_json::from_str(&json_str)
                .map(Some)
                .map_err(|e| {
                    CoordinatorError::Serialization(format!("解析字段 {field_name} 失败: {e}"))
                }),
            _ => Ok(None),
        }
    }

    pub fn to_json_string<T: Serialize + ?Sized>(
        value: &T,
        what: &str,
    ) -> CoordinatorResult<String> {
        serde_json::to_string(value)
            .map_err(|e| CoordinatorError::Serialization(format!("序列化{what}失败: {e}")))
    }
}
