//! 启动闸门模块
//! 一次性的原子标志：Driver 打开后所有线程同时进入测量阶段

use std::sync::atomic::{AtomicU8, Ordering};

const CLOSED: u8 = 0;
const OPEN: u8 = 1;
const ABORTED: u8 = 2;

/// 自旋等待的启动闸门，只能从关闭状态转换一次
#[derive(Debug, Default)]
pub struct StartBarrier {
    state: AtomicU8,
}

impl StartBarrier {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(CLOSED),
        }
    }

    /// 放行所有线程。返回 false 表示闸门已经被打开或中止。
    pub fn release(&self) -> bool {
        self.transition(OPEN)
    }

    /// 中止：等待中的线程直接退出，不进入测量阶段
    pub fn abort(&self) -> bool {
        self.transition(ABORTED)
    }

    fn transition(&self, to: u8) -> bool {
        self.state
            .compare_exchange(CLOSED, to, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn is_open(&self) -> bool {
        self.state.load(Ordering::Acquire) == OPEN
    }

    /// 忙等直到闸门状态确定，每轮让出一次CPU。
    /// 返回 true 表示放行，false 表示中止。
    pub fn wait(&self) -> bool {
        loop {
            match self.state.load(Ordering::Acquire) {
                CLOSED => std::thread::yield_now(),
                state => return state == OPEN,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn single_use() {
        let barrier = StartBarrier::new();
        assert!(!barrier.is_open());
        assert!(barrier.release());
        assert!(!barrier.release());
        assert!(!barrier.abort());
        assert!(barrier.is_open());
        assert!(barrier.wait());
    }

    #[test]
    fn abort_releases_waiters_as_failed() {
        let barrier = StartBarrier::new();
        std::thread::scope(|s| {
            let h = s.spawn(|| barrier.wait());
            barrier.abort();
            assert!(!h.join().unwrap());
        });
    }

    #[test]
    fn no_waiter_passes_before_release() {
        let barrier = StartBarrier::new();
        let before = AtomicUsize::new(0);
        let passed = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    if barrier.wait() {
                        // 放行前写入的值必须可见
                        assert_eq!(before.load(Ordering::Relaxed), 42);
                        passed.fetch_add(1, Ordering::Relaxed);
                    }
                });
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
            assert_eq!(passed.load(Ordering::Relaxed), 0);
            before.store(42, Ordering::Relaxed);
            barrier.release();
        });
        assert_eq!(passed.load(Ordering::Relaxed), 4);
    }
}
