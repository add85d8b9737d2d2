//! Key池模块
//! 生成固定、可复现的Key序列，构造完成后只读

use crate::config::{KEY_DIGITS, KEY_PREFIX, VALUE_DIGITS, VALUE_PREFIX};
use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// 缓存与数据库中的值
pub type Value = Arc<[u8]>;

/// 不可变的Key字节串，克隆只增加引用计数
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Arc<[u8]>);

impl Key {
    pub fn new(bytes: impl AsRef<[u8]>) -> Self {
        Self(Arc::from(bytes.as_ref()))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Borrow<[u8]> for Key {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Key({})", String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// 下标对应的Key，如 `KEY_00000000042`
pub fn key_for(index: usize) -> Key {
    Key::new(format!("{}{:0width$}", KEY_PREFIX, index, width = KEY_DIGITS))
}

/// 下标对应的数据库值，如 `VALUE_0000000000000000000000042`
pub fn value_for(index: usize) -> Value {
    Value::from(format!("{}{:0width$}", VALUE_PREFIX, index, width = VALUE_DIGITS).as_bytes())
}

/// 有序的Key池，下标 0..N-1
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPool {
    keys: Box<[Key]>,
}

impl KeyPool {
    /// 生成 `count` 个互不相同的Key，顺序与下标一致
    pub fn generate(count: usize) -> Self {
        let keys = (0..count).map(key_for).collect();
        Self { keys }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> Option<&Key> {
        self.keys.get(index)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &Key> {
        self.keys.iter()
    }
}

impl std::ops::Index<usize> for KeyPool {
    type Output = Key;

    #[inline]
    fn index(&self, index: usize) -> &Key {
        &self.keys[index]
    }
}
