use futures::stream::{self, StreamExt};
use std::future::Future;

/// 并发执行一组任务，同时运行的数量不超过 `max_parallels`
///
/// 结果顺序与输入顺序一致。
pub async fn do_parallel_with_limit<F, T>(futures: Vec<F>, max_parallels: usize) -> Vec<T>
where
    F: Future<Output = T>,
{
    stream::iter(futures)
        .buffered(max_parallels.max(1))
        .collect()
        .await
}
