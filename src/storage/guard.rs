// 条目名称守卫
//
// 私有文件系统的每个条目名都是单个路径分段，拒绝分隔符与穿越序列

use super::types::{StorageError, StorageErrorCode};

/// 默认条目名最大长度（字节）
pub const DEFAULT_MAX_NAME_LEN: usize = 255;

/// 写入临时文件的保留后缀，用户条目不能以此结尾
pub const TEMP_FILE_SUFFIX: &str = ".crswap";

/// 条目名称守卫
#[derive(Debug, Clone)]
pub struct NameGuard {
    max_len: usize,
}

impl Default for NameGuard {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_NAME_LEN)
    }
}

impl NameGuard {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }

    /// 校验条目名，返回原名称
    pub fn check<'a>(&self, name: &'a str) -> Result<&'a str, StorageError> {
        let invalid = |reason: &str| {
            Err(StorageError::new(StorageErrorCode::InvalidName)
                .with_name(name)
                .with_message(format!("条目名称无效（{}）", reason)))
        };

        if name.is_empty() {
            return invalid("名称为空");
        }
        if name.len() > self.max_len {
            return invalid("名称过长");
        }
        if name == "." || name == ".." {
            return invalid("保留名称");
        }
        if name.contains(['/', '\\', '\0']) {
            return invalid("包含路径分隔符");
        }
        if self.contains_encoded_traversal(name) {
            return invalid("包含穿越序列");
        }
        if is_temp_name(name) {
            return invalid("保留后缀");
        }

        Ok(name)
    }

    /// 检查 URL 编码的穿越序列
    fn contains_encoded_traversal(&self, name: &str) -> bool {
        let patterns = [
            "%2e%2e",     // URL 编码
            "%252e%252e", // 双重 URL 编码
            "%2f",
            "%5c",
        ];

        let lower = name.to_lowercase();
        patterns.iter().any(|p| lower.contains(p))
    }
}

/// 是否为写入过程使用的临时文件名
pub fn is_temp_name(name: &str) -> bool {
    name.ends_with(TEMP_FILE_SUFFIX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid_names() {
        let guard = NameGuard::default();
        assert_eq!(guard.check("a.txt").unwrap(), "a.txt");
        assert!(guard.check(".hidden").is_ok());
        assert!(guard.check("笔记 2024.md").is_ok());
    }

    #[test]
    fn test_rejected_names() {
        let guard = NameGuard::default();
        for name in ["", ".", "..", "a/b", "a\\b", "nul\0", "%2e%2e", "x%2Fy", ".a.txt.crswap"] {
            let err = guard.check(name).unwrap_err();
            assert_eq!(err.code, StorageErrorCode::InvalidName, "name={:?}", name);
        }
    }

    #[test]
    fn test_max_len() {
        let guard = NameGuard::new(4);
        assert!(guard.check("abcd").is_ok());
        assert!(guard.check("abcde").is_err());
    }

    proptest! {
        #[test]
        fn prop_plain_names_accepted(name in "[A-Za-z0-9_-][A-Za-z0-9_. -]{0,40}") {
            prop_assume!(name != "." && name != "..");
            prop_assert!(NameGuard::default().check(&name).is_ok());
        }

        #[test]
        fn prop_separators_rejected(a in "[a-z]{1,8}", b in "[a-z]{1,8}") {
            let guard = NameGuard::default();
            let slash = format!("{}/{}", a, b);
            let backslash = format!("{}\\{}", a, b);
            prop_assert!(guard.check(&slash).is_err());
            prop_assert!(guard.check(&backslash).is_err());
        }
    }
}
