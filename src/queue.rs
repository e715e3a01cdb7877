// Fixed-capacity, rank-ordered list of borrowed tasks
// NOTE: No dynamic allocation; slots past `len` are always None.
//
// Order is settled once, at insertion, by an insertion-sort step that
// walks the new task leftward past every neighbour it outranks.
// Nothing else ever moves a slot.

use crate::task::{Task, TaskInfo};

pub struct TaskQueue<'t, 'r, const N: usize> {
    slots: [Option<&'t mut Task<'r>>; N],
    len: usize,
}

impl<'t, 'r, const N: usize> TaskQueue<'t, 'r, N> {
    pub const fn new() -> Self {
        Self {
            slots: [const { None }; N],
            len: 0,
        }
    }

    /// Insert in rank order and return the slot it landed in.
    /// A full queue hands the task back untouched.
    pub fn insert(&mut self, task: &'t mut Task<'r>) -> Result<usize, &'t mut Task<'r>> {
        if self.len >= N {
            return Err(task);
        }

        let mut i = self.len;
        self.slots[i] = Some(task);
        self.len += 1;

        while i > 0 && self.outranks_left(i) {
            self.slots.swap(i, i - 1);
            i -= 1;
        }
        Ok(i)
    }

    fn outranks_left(&self, i: usize) -> bool {
        match (&self.slots[i], &self.slots[i - 1]) {
            (Some(incoming), Some(left)) => incoming.info.outranks(&left.info),
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len >= N
    }

    pub const fn capacity(&self) -> usize {
        N
    }

    pub fn get(&self, slot: usize) -> Option<&Task<'r>> {
        self.slots.get(slot)?.as_deref()
    }

    pub fn get_mut(&mut self, slot: usize) -> Option<&mut Task<'r>> {
        self.slots.get_mut(slot)?.as_deref_mut()
    }

    /// Tasks in dispatch order.
    pub fn iter(&self) -> impl Iterator<Item = &TaskInfo> + '_ {
        self.slots[..self.len].iter().flatten().map(|t| &t.info)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Task<'r>> + '_ {
        self.slots[..self.len].iter_mut().flatten().map(|t| &mut **t)
    }
}

impl<const N: usize> Default for TaskQueue<'_, '_, N> {
    fn default() -> Self {
        Self::new()
    }
}
