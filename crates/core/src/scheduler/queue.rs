use std::collections::VecDeque;

use courier_domain::{Priority, RequestId};

use super::entry::QueueEntry;

/// Waiting entries ordered HIGH > NORMAL > LOW, FIFO within a level.
#[derive(Debug, Default)]
pub(crate) struct RequestQueue {
    entries: VecDeque<QueueEntry>,
}

impl RequestQueue {
    /// Insert before the first entry of strictly lower priority.
    pub(crate) fn push(&mut self, entry: QueueEntry) {
        let priority = entry.effective_priority;
        let position = self
            .entries
            .iter()
            .position(|queued| queued.effective_priority < priority)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);
    }

    /// Next entry to dispatch. With `skip_high` the first non-HIGH entry is
    /// taken instead of the head, when one is waiting.
    pub(crate) fn pop_next(&mut self, skip_high: bool) -> Option<QueueEntry> {
        if skip_high {
            if let Some(index) =
                self.entries.iter().position(|entry| entry.effective_priority != Priority::High)
            {
                return self.entries.remove(index);
            }
        }
        self.entries.pop_front()
    }

    pub(crate) fn remove(&mut self, id: RequestId) -> Option<QueueEntry> {
        let index = self.entries.iter().position(|entry| entry.id() == id)?;
        self.entries.remove(index)
    }

    pub(crate) fn drain(&mut self) -> impl Iterator<Item = QueueEntry> + '_ {
        self.entries.drain(..)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &QueueEntry> {
        self.entries.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Utc;
    use courier_domain::{Method, RequestDescriptor};
    use tokio::sync::oneshot;

    use super::*;

    fn entry(url: &str, priority: Priority) -> QueueEntry {
        let request =
            RequestDescriptor::builder(Method::Get, url).priority(priority).build().unwrap();
        let (tx, _rx) = oneshot::channel();
        QueueEntry::new(Arc::new(request), Utc::now(), tx)
    }

    fn urls(queue: &RequestQueue) -> Vec<String> {
        queue.iter().map(|entry| entry.request.url().to_string()).collect()
    }

    /// Validates `RequestQueue::push` behavior for the mixed priority
    /// scenario.
    ///
    /// Assertions:
    /// - Confirms HIGH entries precede NORMAL and LOW.
    /// - Confirms arrival order is kept within a priority level.
    #[test]
    fn test_push_orders_by_priority_then_arrival() {
        let mut queue = RequestQueue::default();
        queue.push(entry("low-1", Priority::Low));
        queue.push(entry("high-1", Priority::High));
        queue.push(entry("normal-1", Priority::Normal));
        queue.push(entry("high-2", Priority::High));
        queue.push(entry("low-2", Priority::Low));

        assert_eq!(urls(&queue), vec!["high-1", "high-2", "normal-1", "low-1", "low-2"]);
    }

    #[test]
    fn test_skip_high_takes_first_lower_entry() {
        let mut queue = RequestQueue::default();
        queue.push(entry("high", Priority::High));
        queue.push(entry("low", Priority::Low));

        assert_eq!(queue.pop_next(true).unwrap().request.url(), "low");
        // only HIGH left: taken anyway
        assert_eq!(queue.pop_next(true).unwrap().request.url(), "high");
        assert!(queue.pop_next(false).is_none());
    }

    #[test]
    fn test_remove_by_id() {
        let mut queue = RequestQueue::default();
        let target = entry("b", Priority::Normal);
        let id = target.id();
        queue.push(entry("a", Priority::Normal));
        queue.push(target);

        assert_eq!(queue.remove(id).map(|e| e.id()), Some(id));
        assert!(queue.remove(id).is_none());
        assert_eq!(queue.len(), 1);
    }
}
