/// Decides how a commit lands in history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Append the committed state as a new entry.
    #[default]
    Push,
    /// Overwrite the newest entry, merging multi-step work into one undo step.
    Replace,
    /// Leave history untouched.
    Skip,
}

/// What an `on_push_to_history` hook gets to look at.
#[derive(Debug)]
pub struct PushContext<'a, S> {
    pub previous: &'a S,
    pub next: &'a S,
    /// Joined key of the transition being committed, if any.
    pub transition: Option<&'a str>,
}

/// Snapshot stack with a parallel redo stack.
#[derive(Debug, Clone)]
pub struct History<S> {
    entries: Vec<S>,
    redo: Vec<S>,
    limit: Option<usize>,
}

impl<S: Clone> Default for History<S> {
    fn default() -> Self {
        Self::new(None)
    }
}

impl<S: Clone> History<S> {
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            entries: Vec::new(),
            redo: Vec::new(),
            limit: limit.map(|limit| limit.max(1)),
        }
    }

    pub fn push(&mut self, entry: S) {
        self.entries.push(entry);
        if let Some(limit) = self.limit {
            if self.entries.len() > limit {
                let overflow = self.entries.len() - limit;
                self.entries.drain(..overflow);
            }
        }
    }

    /// Records a committed write. Any write invalidates redo.
    pub fn record(&mut self, entry: S, policy: HistoryPolicy) {
        self.redo.clear();
        match policy {
            HistoryPolicy::Push => self.push(entry),
            HistoryPolicy::Replace => match self.entries.last_mut() {
                Some(last) => *last = entry,
                None => self.push(entry),
            },
            HistoryPolicy::Skip => {}
        }
    }

    /// Steps back one entry. `current` goes onto the redo stack so `redo`
    /// restores exactly what was visible before the undo.
    pub fn undo(&mut self, current: S) -> Option<S> {
        if self.entries.len() < 2 {
            return None;
        }
        self.entries.pop();
        self.redo.push(current);
        self.entries.last().cloned()
    }

    pub fn redo(&mut self) -> Option<S> {
        let next = self.redo.pop()?;
        self.push(next.clone());
        Some(next)
    }

    pub fn can_undo(&self) -> bool {
        self.entries.len() > 1
    }

    pub fn can_redo(&self) -> bool {
        !self.redo.is_empty()
    }

    pub fn entries(&self) -> &[S] {
        &self.entries
    }

    pub fn redo_entries(&self) -> &[S] {
        &self.redo
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
