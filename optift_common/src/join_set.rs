use anyhow::Result;
use std::future::Future;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Joins a set of spawned tasks, stopping at the first failure.
pub struct JoinSet<T> {
    joins: Vec<JoinHandle<Result<T>>>,
}
impl<T: Send + Sync + 'static> JoinSet<T> {
    pub fn new() -> Self {
        JoinSet { joins: Vec::new() }
    }

    pub fn spawn(&mut self, fut: impl Future<Output = Result<T>> + Send + Sync + 'static) {
        self.joins.push(tokio::spawn(fut.in_current_span()));
    }

    pub async fn join(self) -> Result<Vec<T>> {
        let mut result = Vec::new();
        for join in self.joins {
            result.push(join.await??)
        }
        Ok(result)
    }
}
impl<T: Send + Sync + 'static> JoinSet<Vec<T>> {
    pub async fn join_vec(self) -> Result<Vec<T>> {
        let mut result = Vec::new();
        for join in self.joins {
            result.extend(join.await??)
        }
        Ok(result)
    }
}
impl<T: Send + Sync + 'static> Default for JoinSet<T> {
    fn default() -> Self {
        Self::new()
    }
}
