/// 有界阻塞队列
/// Bounded blocking FIFO queue used between pipeline stages
///
/// 一把互斥锁 + 两个条件变量 (非空 / 未满)。
/// - `push` 在队列满时阻塞 (背压), 容量为0表示无界
/// - `pop` 在队列空时阻塞, 唤醒后循环重新检查条件, 拒绝虚假唤醒
/// - `close` 是"流结束"哨兵: 消费者取完剩余元素后看到关闭
/// - `abort` 是取消: 丢弃剩余元素, 立刻唤醒所有阻塞的生产者和消费者
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct State<T> {
    items: VecDeque<T>,
    closed: bool,
}

pub struct BoundedQueue<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

/// 向已关闭队列推送, 元素原样返还
pub struct PushError<T>(pub T);

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PushError(..)")
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("push on a closed queue")
    }
}

impl<T> std::error::Error for PushError<T> {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PopError {
    #[error("queue closed")]
    Closed,
    #[error("timed out waiting for an item")]
    Timeout,
}

impl<T> BoundedQueue<T> {
    /// `capacity == 0` 表示不限容量 (生产者永不阻塞)
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(State {
                items: VecDeque::new(),
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        // 持锁线程panic不会破坏队列结构, 继续使用
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_full(&self, state: &State<T>) -> bool {
        self.capacity != 0 && state.items.len() >= self.capacity
    }

    /// 入队, 满时阻塞直到有空位或队列关闭
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let guard = self.lock();
        let mut state = self
            .not_full
            .wait_while(guard, |s| !s.closed && self.is_full(s))
            .unwrap_or_else(PoisonError::into_inner);
        if state.closed {
            return Err(PushError(item));
        }
        state.items.push_back(item);
        drop(state);
        self.not_empty.notify_one();
        Ok(())
    }

    /// 出队, 空时阻塞直到有元素或队列关闭
    pub fn pop(&self) -> Result<T, PopError> {
        let guard = self.lock();
        let state = self
            .not_empty
            .wait_while(guard, |s| s.items.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        self.take(state)
    }

    /// 带超时的出队, 供看门狗使用
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopError> {
        let guard = self.lock();
        let (state, result) = self
            .not_empty
            .wait_timeout_while(guard, timeout, |s| s.items.is_empty() && !s.closed)
            .unwrap_or_else(PoisonError::into_inner);
        if result.timed_out() && state.items.is_empty() && !state.closed {
            return Err(PopError::Timeout);
        }
        self.take(state)
    }

    fn take(&self, mut state: MutexGuard<'_, State<T>>) -> Result<T, PopError> {
        match state.items.pop_front() {
            Some(item) => {
                drop(state);
                self.not_full.notify_one();
                Ok(item)
            }
            None => Err(PopError::Closed),
        }
    }

    /// 流结束: 已入队的元素仍可被取出
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// 取消: 丢弃所有待处理元素并唤醒所有等待者
    pub fn abort(&self) {
        let dropped = {
            let mut state = self.lock();
            state.closed = true;
            std::mem::take(&mut state.items)
        };
        self.not_empty.notify_all();
        self.not_full.notify_all();
        drop(dropped);
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> Option<usize> {
        (self.capacity != 0).then_some(self.capacity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn test_fifo_order() {
        let q = BoundedQueue::new(0);
        for i in 0..10 {
            q.push(i).unwrap();
        }
        for i in 0..10 {
            assert_eq!(q.pop().unwrap(), i);
        }
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let q = Arc::new(BoundedQueue::new(4));
        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(50));
                q.push(42u32).unwrap();
            })
        };
        let start = Instant::now();
        assert_eq!(q.pop().unwrap(), 42);
        assert!(start.elapsed() >= Duration::from_millis(40));
        producer.join().unwrap();
    }

    #[test]
    fn test_push_blocks_when_full() {
        let q = Arc::new(BoundedQueue::new(1));
        q.push(1u32).unwrap();
        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                q.push(2).unwrap();
            })
        };
        thread::sleep(Duration::from_millis(50));
        // 生产者仍阻塞在满队列上
        assert_eq!(q.len(), 1);
        assert_eq!(q.pop().unwrap(), 1);
        producer.join().unwrap();
        assert_eq!(q.pop().unwrap(), 2);
    }

    #[test]
    fn test_close_drains_then_reports_closed() {
        let q = BoundedQueue::new(0);
        q.push("a").unwrap();
        q.push("b").unwrap();
        q.close();
        assert!(q.push("c").is_err());
        assert_eq!(q.pop(), Ok("a"));
        assert_eq!(q.pop(), Ok("b"));
        assert_eq!(q.pop(), Err(PopError::Closed));
    }

    #[test]
    fn test_abort_wakes_blocked_consumer() {
        let q = Arc::new(BoundedQueue::<u32>::new(2));
        let consumer = {
            let q = q.clone();
            thread::spawn(move || q.pop())
        };
        thread::sleep(Duration::from_millis(30));
        q.abort();
        assert_eq!(consumer.join().unwrap(), Err(PopError::Closed));
    }

    #[test]
    fn test_abort_wakes_blocked_producer_and_drops_items() {
        let q = Arc::new(BoundedQueue::new(1));
        q.push(1u32).unwrap();
        let producer = {
            let q = q.clone();
            thread::spawn(move || q.push(2).map_err(|PushError(v)| v))
        };
        thread::sleep(Duration::from_millis(30));
        q.abort();
        assert_eq!(producer.join().unwrap(), Err(2));
        assert!(q.is_empty());
        assert_eq!(q.pop(), Err(PopError::Closed));
    }

    #[test]
    fn test_pop_timeout() {
        let q = BoundedQueue::<u8>::new(1);
        assert_eq!(
            q.pop_timeout(Duration::from_millis(20)),
            Err(PopError::Timeout)
        );
        q.push(7).unwrap();
        assert_eq!(q.pop_timeout(Duration::from_millis(20)), Ok(7));
    }

    #[test]
    fn test_concurrent_producer_consumer_keeps_order() {
        let q = Arc::new(BoundedQueue::new(3));
        let producer = {
            let q = q.clone();
            thread::spawn(move || {
                for i in 0..1000u32 {
                    q.push(i).unwrap();
                }
                q.close();
            })
        };
        let mut seen = Vec::new();
        while let Ok(v) = q.pop() {
            seen.push(v);
        }
        producer.join().unwrap();
        assert_eq!(seen, (0..1000).collect::<Vec<_>>());
    }

    #[test]
    fn test_capacity() {
        assert_eq!(BoundedQueue::<u8>::new(0).capacity(), None);
        assert_eq!(BoundedQueue::<u8>::new(8).capacity(), Some(8));
    }
}
