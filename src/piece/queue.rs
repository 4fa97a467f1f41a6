use super::PieceWork;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::Notify;

/// Shared FIFO of pieces still to be fetched. Every piece sits either in
/// the queue or with exactly one worker; workers put back what they
/// could not finish.
#[derive(Debug)]
pub struct WorkQueue {
    items: Mutex<VecDeque<PieceWork>>,
    notify: Notify,
}

impl WorkQueue {
    pub fn new(works: Vec<PieceWork>) -> Self {
        let mut items = VecDeque::with_capacity(works.len());
        items.extend(works);
        Self {
            items: Mutex::new(items),
            notify: Notify::new(),
        }
    }

    pub fn push(&self, work: PieceWork) {
        self.lock().push_back(work);
        self.notify.notify_one();
    }

    pub fn try_pop(&self) -> Option<PieceWork> {
        self.lock().pop_front()
    }

    /// Wait until a piece is available and take it
    pub async fn pop(&self) -> PieceWork {
        loop {
            if let Some(work) = self.try_pop() {
                return work;
            }
            self.notify.notified().await;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<PieceWork>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn work(index: usize) -> PieceWork {
        PieceWork {
            index,
            hash: [0; 20],
            length: 10,
        }
    }

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new(vec![work(0), work(1)]);
        queue.push(work(2));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.try_pop().map(|w| w.index), Some(0));
        assert_eq!(queue.try_pop().map(|w| w.index), Some(1));
        assert_eq!(queue.try_pop().map(|w| w.index), Some(2));
        assert!(queue.try_pop().is_none());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(WorkQueue::new(Vec::new()));

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        queue.push(work(7));
        let popped = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(popped.index, 7);
    }
}
