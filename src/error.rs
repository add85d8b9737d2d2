//! 错误处理模块
//! 定义了所有应用级别的错误类型

use std::fmt;

/// 应用主错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppError {
    /// 缓存连接克隆失败或数据库连接失败
    Connection(String),
    /// 点查询语句准备失败
    Statement(String),
    /// 缓存操作返回失败状态
    Cache(String),
    /// 数据库查询执行失败
    Store(String),
    /// 配置错误
    Config(String),
    /// 工作线程异常退出
    Worker(String),
    /// Zipf分布创建错误
    Zipf(String),
    /// IO错误
    Io(String),
}

impl AppError {
    /// 是否属于启动阶段的致命错误
    pub fn is_fatal_setup(&self) -> bool {
        matches!(
            self,
            AppError::Connection(_) | AppError::Statement(_) | AppError::Config(_)
        )
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Connection(msg) => write!(f, "Connection error: {}", msg),
            AppError::Statement(msg) => write!(f, "Statement error: {}", msg),
            AppError::Cache(msg) => write!(f, "Cache operation error: {}", msg),
            AppError::Store(msg) => write!(f, "Backing store error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Worker(msg) => write!(f, "Worker error: {}", msg),
            AppError::Zipf(msg) => write!(f, "Zipf distribution create error: {}", msg),
            AppError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, AppError>;

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

/// 错误上下文扩展trait
pub trait ErrorContext<T> {
    /// 添加上下文信息
    fn with_context(self, context: &str) -> Result<T>;
}

impl<T> ErrorContext<T> for Result<T> {
    fn with_context(self, context: &str) -> Result<T> {
        self.map_err(|e| {
            let wrap = |msg: String| format!("{}: {}", context, msg);
            match e {
                AppError::Connection(msg) => AppError::Connection(wrap(msg)),
                AppError::Statement(msg) => AppError::Statement(wrap(msg)),
                AppError::Cache(msg) => AppError::Cache(wrap(msg)),
                AppError::Store(msg) => AppError::Store(wrap(msg)),
                AppError::Config(msg) => AppError::Config(wrap(msg)),
                AppError::Worker(msg) => AppError::Worker(wrap(msg)),
                AppError::Zipf(msg) => AppError::Zipf(wrap(msg)),
                AppError::Io(msg) => AppError::Io(wrap(msg)),
            }
        })
    }
}
