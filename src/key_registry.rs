/// 有序键注册表
///
/// 所有语言文件共享的键顺序的唯一来源。键按字典序排列且不重复，
/// 查找为 O(log n)，插入/删除为 O(n)（数组移动）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyRegistry {
    keys: Vec<String>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// 从任意键集合构建（排序并去重）
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut keys: Vec<String> = keys.into_iter().map(Into::into).collect();
        keys.sort();
        keys.dedup();
        Self { keys }
    }

    /// 插入位置
    ///
    /// # 返回
    /// 键不存在时返回 `Some(插入位置)`，已存在时返回 `None`
    pub fn sorted_index_of(&self, key: &str) -> Option<usize> {
        match self.keys.binary_search_by(|probe| probe.as_str().cmp(key)) {
            Ok(_) => None,
            Err(position) => Some(position),
        }
    }

    /// 在 `position` 处插入键
    ///
    /// 调用方必须先用 `sorted_index_of` 取得位置，插入重复键或破坏顺序属于编程错误。
    pub fn insert(&mut self, position: usize, key: impl Into<String>) {
        let key = key.into();
        debug_assert!(
            position == 0 || self.keys[position - 1] < key,
            "insert would break ordering"
        );
        debug_assert!(
            position == self.keys.len() || key < self.keys[position],
            "insert would duplicate or break ordering"
        );
        self.keys.insert(position, key);
    }

    /// 插入键（若不存在），返回是否插入
    pub fn add(&mut self, key: &str) -> bool {
        match self.sorted_index_of(key) {
            Some(position) => {
                self.keys.insert(position, key.to_string());
                true
            }
            None => false,
        }
    }

    /// 删除键，存在并删除时返回 true
    pub fn remove(&mut self, key: &str) -> bool {
        match self.index_of(key) {
            Some(position) => {
                self.keys.remove(position);
                true
            }
            None => false,
        }
    }

    /// 键的位置，未找到返回 `None`
    pub fn index_of(&self, key: &str) -> Option<usize> {
        self.keys
            .binary_search_by(|probe| probe.as_str().cmp(key))
            .ok()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.index_of(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.keys
    }
}
