//! # 数据模型
//!
//! 协调服务的核心数据结构：Worker会话、作业、研究批次、实时状态和进度上报。
//!
//! ## 核心模型
//!
//! ### WorkerSession - Worker会话
//! 一台机器的一个连接周期。同一网络标识下任意时刻至多一个非过期会话，
//! 过期会话只追加保留，用于历史关联。
//!
//! ### Assignment - 作业
//! 研究批次中的一个工作单元，带稳定序号。`RUNNING` 状态的作业持有一个会话租约。
//!
//! ### SuperStudy - 研究批次
//! 一组作业的聚合，`completed_assignments`、`master_progress`、`status` 均为派生字段。
//!
//! ### LiveState - 实时状态
//! 每个活跃会话一份，按需创建，保存阶段、进度和有界日志。
//!
//! ## 状态流转
//!
//! ```text
//! 会话:   IDLE → RUNNING → IDLE / ERROR        (超时或被取代时 is_stale = true)
//! 作业:   PENDING → RUNNING → COMPLETED / FAILED
//!                     ↓
//!                  PENDING  (Worker丢失或显式解除分配)
//! 批次:   PENDING → RUNNING → COMPLETED
//! ```
//!
//! ## 数据库映射
//!
//! 枚举字段以大写文本存储（`IDLE`、`RUNNING` ...），与传输层的JSON取值一致。

/// 为文本枚举生成 `as_str`、`FromStr`、`Display` 以及 SQLite 编解码实现
macro_rules! impl_text_enum {
    ($ty:ident, $label:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl std::str::FromStr for $ty {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    _ => Err(format!(concat!("无效的", $label, ": {}"), s)),
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl sqlx::Type<sqlx::Sqlite> for $ty {
            fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
                <str as sqlx::Type<sqlx::Sqlite>>::type_info()
            }
        }

        impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for $ty {
            fn decode(
                value: sqlx::sqlite::SqliteValueRef<'r>,
            ) -> Result<Self, sqlx::error::BoxDynError> {
                let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
                s.parse::<$ty>().map_err(Into::into)
            }
        }

        impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for $ty {
            fn encode_by_ref(
                &self,
                buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
            }
        }
    };
}

pub mod assignment;
pub mod live_state;
pub mod progress;
pub mod super_study;
pub mod worker;

pub use assignment::*;
pub use live_state::*;
pub use progress::*;
pub use super_study::*;
pub use worker::*;
