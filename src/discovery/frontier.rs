//! Breadth-first crawl frontier for one site.

use std::collections::{HashSet, VecDeque};

use crate::utils::url::{host_of, normalize_url};

/// A URL waiting to be visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: u32,
}

/// FIFO queue plus visited set, bounded by depth and page budget.
///
/// Containment: nothing outside the seed host is ever queued or returned.
#[derive(Debug)]
pub struct Frontier {
    queue: VecDeque<FrontierEntry>,
    visited: HashSet<String>,
    seed_host: Option<String>,
    max_depth: u32,
    max_pages: usize,
}

impl Frontier {
    /// Seed the frontier with `root` at depth 0.
    pub fn new(root: &str, max_depth: u32, max_pages: usize) -> Self {
        let mut frontier = Self {
            queue: VecDeque::new(),
            visited: HashSet::new(),
            seed_host: host_of(root),
            max_depth,
            max_pages,
        };
        frontier.enqueue(root, 0);
        frontier
    }

    /// Queue a URL. Returns false when it is cross-host, too deep or already visited.
    pub fn enqueue(&mut self, url: &str, depth: u32) -> bool {
        if depth > self.max_depth {
            return false;
        }
        if self.seed_host.is_none() || host_of(url) != self.seed_host {
            return false;
        }
        let url = normalize_url(url);
        if self.visited.contains(&url) {
            return false;
        }
        self.queue.push_back(FrontierEntry { url, depth });
        true
    }

    /// Dequeue the next unvisited entry and mark it visited.
    ///
    /// Returns `None` when the queue is empty or the page budget is spent.
    pub fn next(&mut self) -> Option<FrontierEntry> {
        while self.visited.len() < self.max_pages {
            let entry = self.queue.pop_front()?;
            if self.visited.insert(entry.url.clone()) {
                return Some(entry);
            }
        }
        None
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let mut f = Frontier::new("https://a.example/", 3, 10);
        let root = f.next().unwrap();
        assert_eq!(root.depth, 0);
        f.enqueue("https://a.example/b", 1);
        f.enqueue("https://a.example/c", 1);
        assert_eq!(f.next().unwrap().url, "https://a.example/b");
        assert_eq!(f.next().unwrap().url, "https://a.example/c");
        assert!(f.next().is_none());
    }

    #[test]
    fn test_rejects_cross_host_and_depth() {
        let mut f = Frontier::new("https://a.example/", 1, 10);
        assert!(!f.enqueue("https://b.example/x", 1));
        assert!(!f.enqueue("https://a.example/deep", 2));
        assert!(f.enqueue("https://a.example/ok", 1));
    }

    #[test]
    fn test_visited_once_ignoring_fragment() {
        let mut f = Frontier::new("https://a.example/", 3, 10);
        f.next();
        assert!(!f.enqueue("https://a.example/#top", 1));
        f.enqueue("https://a.example/x#a", 1);
        f.enqueue("https://a.example/x#b", 1);
        assert_eq!(f.next().unwrap().url, "https://a.example/x");
        assert!(f.next().is_none());
        assert_eq!(f.visited_count(), 2);
    }

    #[test]
    fn test_page_budget() {
        let mut f = Frontier::new("https://a.example/", 3, 2);
        f.next();
        for i in 0..5 {
            f.enqueue(&format!("https://a.example/p{}", i), 1);
        }
        assert!(f.next().is_some());
        assert!(f.next().is_none());
        assert_eq!(f.visited_count(), 2);
    }
}
