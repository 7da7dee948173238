// 内存索引
//
// 记录本实例观察到的目录名与文件名。只是尽力而为的缓存，不保证与真实存储一致：
// 初始化时只采集目录名，目录内的文件列表随本实例的创建操作逐步填充。

use std::collections::BTreeMap;

/// 目录索引 + 根目录文件列表
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageIndex {
    /// 目录名 -> 已知文件名（按创建顺序）
    directories: BTreeMap<String, Vec<String>>,
    /// 根目录下的已知文件名（按创建顺序）
    root_files: Vec<String>,
}

impl StorageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_directory(&self, dir_name: &str) -> bool {
        self.directories.contains_key(dir_name)
    }

    /// 登记目录，已存在时保留原有文件列表并返回 false
    pub fn insert_directory(&mut self, dir_name: &str) -> bool {
        if self.directories.contains_key(dir_name) {
            return false;
        }
        self.directories.insert(dir_name.to_string(), Vec::new());
        true
    }

    pub fn remove_directory(&mut self, dir_name: &str) -> bool {
        self.directories.remove(dir_name).is_some()
    }

    /// 向已登记的目录追加文件名
    ///
    /// 目录未登记返回 false；文件名已存在时不重复追加
    pub fn push_file(&mut self, dir_name: &str, file_name: &str) -> bool {
        match self.directories.get_mut(dir_name) {
            Some(files) => {
                push_unique(files, file_name);
                true
            }
            None => false,
        }
    }

    pub fn remove_file(&mut self, dir_name: &str, file_name: &str) -> bool {
        match self.directories.get_mut(dir_name) {
            Some(files) => remove_name(files, file_name),
            None => false,
        }
    }

    pub fn push_root_file(&mut self, file_name: &str) {
        push_unique(&mut self.root_files, file_name);
    }

    pub fn remove_root_file(&mut self, file_name: &str) -> bool {
        remove_name(&mut self.root_files, file_name)
    }

    pub fn files_in(&self, dir_name: &str) -> Option<&[String]> {
        self.directories.get(dir_name).map(Vec::as_slice)
    }

    pub fn root_files(&self) -> &[String] {
        &self.root_files
    }

    /// 已登记的目录名（按名称排序）
    pub fn directory_names(&self) -> Vec<String> {
        self.directories.keys().cloned().collect()
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

fn remove_name(list: &mut Vec<String>, name: &str) -> bool {
    let before = list.len();
    list.retain(|n| n != name);
    list.len() != before
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_lifecycle() {
        let mut index = StorageIndex::new();
        assert!(index.insert_directory("docs"));
        assert!(!index.insert_directory("docs"));
        assert!(index.has_directory("docs"));
        assert_eq!(index.files_in("docs"), Some(&[][..]));

        assert!(index.remove_directory("docs"));
        assert!(!index.remove_directory("docs"));
        assert!(index.files_in("docs").is_none());
    }

    #[test]
    fn test_reinsert_keeps_files() {
        let mut index = StorageIndex::new();
        index.insert_directory("docs");
        index.push_file("docs", "a.txt");
        index.insert_directory("docs");
        assert_eq!(index.files_in("docs").unwrap(), ["a.txt".to_string()]);
    }

    #[test]
    fn test_files_in_directory() {
        let mut index = StorageIndex::new();
        assert!(!index.push_file("docs", "a.txt"));

        index.insert_directory("docs");
        assert!(index.push_file("docs", "a.txt"));
        assert!(index.push_file("docs", "b.txt"));
        assert!(index.push_file("docs", "a.txt"));
        assert_eq!(
            index.files_in("docs").unwrap(),
            ["a.txt".to_string(), "b.txt".to_string()]
        );

        assert!(index.remove_file("docs", "a.txt"));
        assert!(!index.remove_file("docs", "a.txt"));
        assert_eq!(index.files_in("docs").unwrap(), ["b.txt".to_string()]);
    }

    #[test]
    fn test_root_files() {
        let mut index = StorageIndex::new();
        index.push_root_file("a.txt");
        index.push_root_file("b.txt");
        index.push_root_file("a.txt");
        assert_eq!(index.root_files(), ["a.txt".to_string(), "b.txt".to_string()]);

        assert!(index.remove_root_file("a.txt"));
        assert_eq!(index.root_files(), ["b.txt".to_string()]);
    }

    #[test]
    fn test_directory_names_sorted() {
        let mut index = StorageIndex::new();
        index.insert_directory("zeta");
        index.insert_directory("alpha");
        assert_eq!(index.directory_names(), vec!["alpha", "zeta"]);
    }
}
