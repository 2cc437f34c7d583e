use thiserror::Error;

/// 协调器错误类型定义
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("数据库操作错误: {0}")]
    DatabaseOperation(String),

    #[error("Worker会话未找到: {id}")]
    WorkerNotFound { id: String },

    #[error("作业未找到: {id}")]
    AssignmentNotFound { id: String },

    #[error("研究批次未找到: {id}")]
    SuperStudyNotFound { id: String },

    #[error("参数校验失败: {0}")]
    Validation(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

/// 错误分类，决定传输层如何向调用方呈现
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// 实体不存在，调用方不应重试
    NotFound,
    /// 输入缺失或非法，调用方需要修正请求
    Validation,
    /// 存储层I/O失败，调用方可以原样重发
    TransientStore,
    /// 其他内部错误
    Internal,
}

impl CoordinatorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoordinatorError::Database(_) | CoordinatorError::DatabaseOperation(_) => {
                ErrorKind::TransientStore
            }
            CoordinatorError::WorkerNotFound { .. }
            | CoordinatorError::AssignmentNotFound { .. }
            | CoordinatorError::SuperStudyNotFound { .. } => ErrorKind::NotFound,
            CoordinatorError::Validation(_) => ErrorKind::Validation,
            CoordinatorError::Serialization(_)
            | CoordinatorError::Configuration(_)
            | CoordinatorError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// 是否允许调用方重发同一请求
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::TransientStore
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CoordinatorError::Validation(message.into())
    }
}

impl From<serde_json::Error> for CoordinatorError {
    fn from(err: serde_json::Error) -> Self {
        CoordinatorError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, CoordinatorError>;
