//! 排队引擎
//!
//! 维护两个互不相交的有序序列：
//! - `waiting`：尚未叫号的患者，先进先出，插入顺序即排队顺序
//! - `called`：已叫号患者的历史，按叫号时间追加，最近叫号的在末尾
//!
//! 同一标识符任一时刻最多出现在其中一个序列；出现在 `called` 中的标识符只能
//! 来自 `call_next` 从 `waiting` 的移出（或重启时的 `initialize_from`）。
//! 引擎不做文件访问，也不做存在性校验，所有操作都不会失败。

use clinic_core::PatientId;
use std::collections::VecDeque;

/// 排队引擎
#[derive(Debug, Clone)]
pub struct QueueEngine<I = PatientId> {
    waiting: VecDeque<I>,
    called: VecDeque<I>,
}

impl<I> QueueEngine<I>
where
    I: Clone + PartialEq,
{
    /// 创建空引擎
    pub fn new() -> Self {
        Self {
            waiting: VecDeque::new(),
            called: VecDeque::new(),
        }
    }

    /// 加入等候队尾。重复加入由调用方在存储层检查。
    pub fn enqueue(&mut self, id: I) {
        self.waiting.push_back(id);
    }

    /// 叫下一位：移出等候队首并追加到已叫号末尾；队列为空时返回 `None`
    pub fn call_next(&mut self) -> Option<I> {
        let id = self.waiting.pop_front()?;
        self.called.push_back(id.clone());
        Some(id)
    }

    /// 最近一次叫号的患者
    pub fn last_called(&self) -> Option<&I> {
        self.called.back()
    }

    /// 从等候序列移除第一次出现的标识符，返回是否发生了移除
    pub fn remove_from_waiting(&mut self, id: &I) -> bool {
        remove_first(&mut self.waiting, id)
    }

    /// 从已叫号序列移除第一次出现的标识符，返回是否发生了移除
    pub fn remove_from_called(&mut self, id: &I) -> bool {
        remove_first(&mut self.called, id)
    }

    /// 从两个序列中移除，返回是否有任一序列发生了移除
    pub fn remove(&mut self, id: &I) -> bool {
        let from_waiting = self.remove_from_waiting(id);
        let from_called = self.remove_from_called(id);
        from_waiting || from_called
    }

    /// 撤销最近一次叫号：仅当 `id` 是已叫号末尾时，把它放回等候队首
    pub fn revert_call(&mut self, id: &I) -> bool {
        if self.called.back() != Some(id) {
            return false;
        }
        if let Some(id) = self.called.pop_back() {
            self.waiting.push_front(id);
        }
        true
    }

    /// 清空两个序列
    pub fn reset(&mut self) {
        self.waiting.clear();
        self.called.clear();
    }

    /// 用给定序列整体替换当前内容，保持给定顺序。重启后重建的唯一途径。
    pub fn initialize_from<W, C>(&mut self, waiting: W, called: C)
    where
        W: IntoIterator<Item = I>,
        C: IntoIterator<Item = I>,
    {
        self.waiting = waiting.into_iter().collect();
        self.called = called.into_iter().collect();
    }

    pub fn waiting(&self) -> impl DoubleEndedIterator<Item = &I> + ExactSizeIterator {
        self.waiting.iter()
    }

    pub fn called(&self) -> impl DoubleEndedIterator<Item = &I> + ExactSizeIterator {
        self.called.iter()
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn called_len(&self) -> usize {
        self.called.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty() && self.called.is_empty()
    }

    pub fn is_waiting(&self, id: &I) -> bool {
        self.waiting.contains(id)
    }

    pub fn is_called(&self, id: &I) -> bool {
        self.called.contains(id)
    }

    /// 在等候序列中的位置（从1开始）
    pub fn waiting_position(&self, id: &I) -> Option<usize> {
        self.waiting.iter().position(|x| x == id).map(|pos| pos + 1)
    }
}

impl<I> Default for QueueEngine<I>
where
    I: Clone + PartialEq,
{
    fn default() -> Self {
        Self::new()
    }
}

fn remove_first<I: PartialEq>(seq: &mut VecDeque<I>, id: &I) -> bool {
    match seq.iter().position(|x| x == id) {
        Some(pos) => seq.remove(pos).is_some(),
        None => false,
    }
}
