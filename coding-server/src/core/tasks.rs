//! 后台任务管理
//!
//! 打印流程中所有工作者任务的注册、启动和等待。
//!
//! # 任务类型
//!
//! - [`TaskKind::Worker`] - 流水线工作者（打码机、数据库）
//! - [`TaskKind::Periodic`] - 定时任务（状态推送）

use futures::FutureExt;
use std::fmt;
use std::panic::AssertUnwindSafe;
use tokio::task::JoinHandle;

/// 任务类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// 流水线工作者
    Worker,
    /// 定时任务
    Periodic,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Worker => write!(f, "Worker"),
            TaskKind::Periodic => write!(f, "Periodic"),
        }
    }
}

/// 任务结束方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskExit {
    Completed,
    Panicked(String),
}

/// 已注册的后台任务
struct RegisteredTask {
    name: &'static str,
    kind: TaskKind,
    handle: JoinHandle<TaskExit>,
}

/// 后台任务管理器
///
/// 任务被包装以捕获 panic：单个工作者崩溃只记录错误日志，不会拖垮进程。
///
/// ```ignore
/// let mut tasks = BackgroundTasks::new();
/// tasks.spawn("printer_worker", TaskKind::Worker, async move { worker.run().await });
/// tasks.spawn("db_worker", TaskKind::Worker, async move { db.run().await });
///
/// // 等待全部结束
/// tasks.join().await;
/// ```
pub struct BackgroundTasks {
    tasks: Vec<RegisteredTask>,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// 注册并启动一个后台任务
    pub fn spawn<F>(&mut self, name: &'static str, kind: TaskKind, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let wrapped_future = async move {
            let result: Result<(), Box<dyn std::any::Any + Send>> =
                AssertUnwindSafe(future).catch_unwind().await;
            match result {
                Ok(()) => {
                    tracing::debug!(task = %name, kind = %kind, "Background task completed");
                    TaskExit::Completed
                }
                Err(panic_info) => {
                    let panic_msg: String = if let Some(s) = panic_info.downcast_ref::<&str>() {
                        (*s).to_string()
                    } else if let Some(s) = panic_info.downcast_ref::<String>() {
                        s.clone()
                    } else {
                        "Unknown panic".to_string()
                    };
                    tracing::error!(
                        task = %name,
                        kind = %kind,
                        panic = %panic_msg,
                        "Background task panicked! This is a bug that should be reported."
                    );
                    TaskExit::Panicked(panic_msg)
                }
            }
        };

        let handle = tokio::spawn(wrapped_future);
        tracing::debug!(task = %name, kind = %kind, "Registered background task");
        self.tasks.push(RegisteredTask { name, kind, handle });
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// 等待所有任务结束，返回每个任务的结束方式
    pub async fn join(self) -> Vec<(&'static str, TaskExit)> {
        let mut exits = Vec::with_capacity(self.tasks.len());
        for task in self.tasks {
            let exit = match task.handle.await {
                Ok(exit) => exit,
                Err(e) => {
                    tracing::error!(task = %task.name, kind = %task.kind, error = ?e, "Task join failed");
                    TaskExit::Panicked(e.to_string())
                }
            };
            exits.push((task.name, exit));
        }
        tracing::debug!("All background tasks stopped");
        exits
    }
}

impl Default for BackgroundTasks {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_join_reports_each_exit() {
        let mut tasks = BackgroundTasks::new();
        tasks.spawn("ok", TaskKind::Worker, async {});
        tasks.spawn("boom", TaskKind::Worker, async { panic!("worker exploded") });
        assert_eq!(tasks.len(), 2);

        let exits = tasks.join().await;
        assert_eq!(exits[0], ("ok", TaskExit::Completed));
        assert_eq!(
            exits[1],
            ("boom", TaskExit::Panicked("worker exploded".to_string()))
        );
    }

    #[tokio::test]
    async fn test_periodic_task_runs_until_flag_clears() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

        let running = Arc::new(AtomicBool::new(true));
        let ticks = Arc::new(AtomicUsize::new(0));
        let mut tasks = BackgroundTasks::new();
        let (flag, count) = (running.clone(), ticks.clone());
        tasks.spawn("status_publisher", TaskKind::Periodic, async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(5));
            while flag.load(Ordering::SeqCst) {
                ticker.tick().await;
                count.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        running.store(false, Ordering::SeqCst);
        let exits = tasks.join().await;

        assert_eq!(exits, vec![("status_publisher", TaskExit::Completed)]);
        assert!(ticks.load(Ordering::SeqCst) >= 1);
    }
}
